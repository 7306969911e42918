//! BullyScale - Bully Leader Election Node
//!
//! Operator entry point: loads the static cluster configuration, binds the
//! node's listener and drives coordinator check-ins.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bullyscale::config::BullyConfig;
use bullyscale::election::RoundOutcome;
use bullyscale::error::{Error, Result};
use bullyscale::network::{NetworkClient, NetworkServer, PeerTransport};
use bullyscale::node::BullyNode;
use bullyscale::state::NodeId;

/// BullyScale - Bully Leader Election Node
#[derive(Parser)]
#[command(name = "bullyscale")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "bullyscale.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to [logging].level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node
    Start {
        /// Node id (overrides node.id from the config file)
        #[arg(long)]
        id: Option<NodeId>,

        /// Node is recovering from a failure: run an election right away
        #[arg(long)]
        recover: bool,

        /// Check the coordinator on every line read from stdin instead of on a timer
        #[arg(long)]
        interactive: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "bullyscale.toml")]
        output: PathBuf,

        /// Node ID
        #[arg(long, default_value_t = 1)]
        node_id: NodeId,
    },

    /// Validate configuration file
    Validate,

    /// Show node information
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config-driven log level only applies if the file loads
    let level = match &cli.log_level {
        Some(level) => level.clone(),
        None => BullyConfig::from_file(&cli.config)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
    };
    init_logging(&level);

    let result = match cli.command {
        Commands::Start { id, recover, interactive } => {
            run_start(cli.config, id, recover, interactive).await
        }
        Commands::Init { output, node_id } => run_init(output, node_id),
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Exit status for a failed command: 2 when the node could never have run
/// (bad configuration, listener unavailable), 1 otherwise
fn exit_code(error: &Error) -> i32 {
    if error.is_fatal() {
        2
    } else {
        1
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Start the node
async fn run_start(
    config_path: PathBuf,
    id: Option<NodeId>,
    recover: bool,
    interactive: bool,
) -> Result<()> {
    let config = match BullyConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            return Err(e);
        }
    };
    let config = match id {
        Some(id) => config.with_node_id(id)?,
        None => config,
    };
    tracing::info!("Loaded configuration for node {}", config.node.id);

    let client: Arc<dyn PeerTransport> = Arc::new(NetworkClient::new(
        config.connect_timeout(),
        config.request_timeout(),
    ));
    let node = Arc::new(BullyNode::from_config(&config, client)?);
    tracing::info!(
        "Cluster of {} nodes, assuming coordinator {}",
        node.directory().len(),
        node.coordinator().await
    );

    // Without a listener peers cannot reach us for elections
    let bind_address = config.bind_address()?;
    let server = Arc::new(match NetworkServer::bind(&bind_address, node.clone()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Node {} cannot serve peers: {}", config.node.id, e);
            return Err(e);
        }
    });
    let running = Arc::clone(&server);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = running.start().await {
            tracing::error!("Network server error: {}", e);
        }
    });

    if recover {
        tracing::info!("Recovering from failure, invoking election");
        log_round(&node.run_election().await);
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if interactive {
        let console_node = Arc::clone(&node);
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            println!("Press enter for {} to communicate with the coordinator.", console_node.id());
            while let Ok(Some(_)) = lines.next_line().await {
                console_node.check_coordinator().await;
                println!("Press enter for {} to communicate with the coordinator.", console_node.id());
            }
            tracing::info!("Console closed");
        });
    } else {
        let detector = node.detector().clone();
        let interval = config.heartbeat_interval();
        tokio::spawn(async move { detector.run(interval, shutdown_rx).await });
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);
    server.stop();
    let _ = server_handle.await;

    tracing::info!("BullyScale node {} shutdown complete", node.id());
    Ok(())
}

fn log_round(outcome: &RoundOutcome) {
    match outcome {
        RoundOutcome::Skipped => tracing::info!("Election already running"),
        RoundOutcome::Deferred { acked_by } => {
            tracing::info!("Deferred to higher-ranked nodes {:?}", acked_by)
        }
        RoundOutcome::SelfPromoted(report) => tracing::info!(
            "Became coordinator; announced to {:?}, unreachable {:?}",
            report.delivered,
            report.unreachable
        ),
    }
}

/// Generate a configuration file
fn run_init(output: PathBuf, node_id: NodeId) -> Result<()> {
    let config_content = format!(r#"# BullyScale Configuration
# Generated configuration file. The [[cluster.members]] list must be
# identical on every node.

[node]
id = {node_id}
# bind_address = "0.0.0.0:3000"

[cluster]
initial_coordinator = 5
heartbeat_interval_ms = 2000
connect_timeout_ms = 500
request_timeout_ms = 1000
fanout = "sequential"

[[cluster.members]]
id = 1
address = "127.0.0.1:3000"

[[cluster.members]]
id = 2
address = "127.0.0.1:3001"

[[cluster.members]]
id = 3
address = "127.0.0.1:3002"

[[cluster.members]]
id = 4
address = "127.0.0.1:3003"

[[cluster.members]]
id = 5
address = "127.0.0.1:3004"

[logging]
level = "info"
"#);

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the member list to match your cluster.");
    println!("Then start with: bullyscale --config {} start", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match BullyConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Node ID: {}", config.node.id);
            println!("  Bind Address: {}", config.bind_address()?);
            println!("  Members: {}", config.cluster.members.len());
            println!("  Initial Coordinator: {}", config.initial_coordinator()?);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show node information
fn run_info(config_path: PathBuf) -> Result<()> {
    let config = BullyConfig::from_file(&config_path)?;
    let directory = config.directory()?;

    println!("BullyScale Node Information");
    println!("===========================");
    println!();
    println!("Node ID:          {}", config.node.id);
    println!("Bind Address:     {}", config.bind_address()?);
    println!();
    println!("Cluster Configuration:");
    println!("  Coordinator:    {} (initial)", config.initial_coordinator()?);
    println!("  Heartbeat:      {} ms", config.cluster.heartbeat_interval_ms);
    println!("  Connect:        {} ms", config.cluster.connect_timeout_ms);
    println!("  Request:        {} ms", config.cluster.request_timeout_ms);
    println!("  Fan-out:        {:?}", config.cluster.fanout);
    println!();
    println!("Members:");
    for (id, address) in directory.members() {
        let marker = if id == config.node.id { " (this node)" } else { "" };
        println!("  {:<4} {}{}", id, address, marker);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_error_kind() {
        let bind = Error::Bind {
            address: "127.0.0.1:3000".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(exit_code(&bind), 2);
        assert_eq!(exit_code(&Error::Config("no members".into())), 2);
        assert_eq!(exit_code(&Error::ConnectionTimeout("127.0.0.1:3004".into())), 1);
    }
}

//! BullyCtl - Command line tool for inspecting BullyScale clusters
//!
//! Usage:
//!   bullyctl status --address HOST:PORT   - Show a node's view of the cluster
//!   bullyctl probe --address HOST:PORT    - Send a liveness probe
//!   bullyctl members                      - List the configured directory

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bullyscale::config::BullyConfig;
use bullyscale::error::Error;
use bullyscale::network::{Message, NetworkClient};
use bullyscale::state::{ElectionPhase, NodeId};

/// BullyScale Cluster Control Tool
#[derive(Parser)]
#[command(name = "bullyctl")]
#[command(about = "Inspect BullyScale clusters", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "bullyscale.toml")]
    config: PathBuf,

    /// Per-call timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show status of a node
    Status {
        /// Node address (host:port)
        #[arg(short, long)]
        address: String,
    },
    /// Send a HandleCommunication probe to a node
    Probe {
        /// Node address (host:port)
        #[arg(short, long)]
        address: String,
        /// Id to present as the caller
        #[arg(long, default_value_t = 0)]
        from: NodeId,
    },
    /// List the membership directory and each member's status
    Members,
}

#[derive(Debug, Serialize)]
struct MemberStatus {
    id: NodeId,
    address: String,
    reachable: bool,
    coordinator_id: Option<NodeId>,
    phase: Option<ElectionPhase>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.timeout_ms);
    let client = NetworkClient::new(timeout, timeout);

    let result = match &cli.command {
        Commands::Status { address } => show_status(&client, address, cli.json).await,
        Commands::Probe { address, from } => probe(&client, address, *from).await,
        Commands::Members => list_members(&client, &cli.config, cli.json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ============ Commands ============

async fn show_status(
    client: &NetworkClient,
    address: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match client.send(address, Message::StatusRequest).await? {
        Message::StatusResponse { node_id, coordinator_id, phase, members } => {
            if json {
                let status = MemberStatus {
                    id: node_id,
                    address: address.to_string(),
                    reachable: true,
                    coordinator_id: Some(coordinator_id),
                    phase: Some(phase),
                };
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }

            println!();
            println!("Node Status");
            println!("===========");
            println!();
            println!("Node ID:      {}", node_id);
            println!("Role:         {}", if node_id == coordinator_id { "COORDINATOR" } else { "Subordinate" });
            println!("Coordinator:  {}", coordinator_id);
            println!("Phase:        {}", phase);
            println!("Cluster Size: {}", members);
            println!();
            Ok(())
        }
        other => Err(Error::UnexpectedResponse {
            request: "StatusRequest",
            response: other.type_name(),
        }
        .into()),
    }
}

async fn probe(
    client: &NetworkClient,
    address: &str,
    from: NodeId,
) -> Result<(), Box<dyn std::error::Error>> {
    match client.send(address, Message::HandleCommunication { node_id: from }).await {
        Ok(Message::Ok) => {
            println!("✓ {} answered OK", address);
            Ok(())
        }
        Ok(other) => Err(Error::UnexpectedResponse {
            request: "HandleCommunication",
            response: other.type_name(),
        }
        .into()),
        Err(e) => Err(format!("{} is unreachable: {}", address, e).into()),
    }
}

async fn list_members(
    client: &NetworkClient,
    config_path: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = BullyConfig::from_file(config_path)?;
    let directory = config.directory()?;

    let mut rows = Vec::new();
    for (id, address) in directory.members() {
        let mut row = MemberStatus {
            id,
            address: address.to_string(),
            reachable: false,
            coordinator_id: None,
            phase: None,
        };
        if let Ok(Message::StatusResponse { coordinator_id, phase, .. }) =
            client.send(address, Message::StatusRequest).await
        {
            row.reachable = true;
            row.coordinator_id = Some(coordinator_id);
            row.phase = Some(phase);
        }
        rows.push(row);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("BullyScale Members (bullyctl v{})", env!("CARGO_PKG_VERSION"));
    println!("=================================");
    println!();
    println!("{:<6} {:<25} {:<10} {:<12} {:<22}", "ID", "ADDRESS", "STATUS", "COORDINATOR", "PHASE");
    println!("{}", "-".repeat(78));

    for row in &rows {
        // Pad before adding color codes
        let status_padded = format!("{:<10}", if row.reachable { "UP" } else { "DOWN" });
        let status_colored = if row.reachable {
            format!("\x1b[32m{}\x1b[0m", status_padded)
        } else {
            format!("\x1b[31m{}\x1b[0m", status_padded)
        };
        let coordinator = row
            .coordinator_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let phase = row.phase.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());

        println!("{:<6} {:<25} {} {:<12} {:<22}", row.id, row.address, status_colored, coordinator, phase);
    }
    println!();

    Ok(())
}

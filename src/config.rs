//! BullyScale Configuration
//!
//! Static node and cluster configuration loaded once at startup. The
//! `[[cluster.members]]` table is the membership directory and must be
//! identical on every node.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::election::{ElectionConfig, FanOut};
use crate::state::{MembershipDirectory, NodeId};

/// Main BullyScale configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BullyConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Cluster configuration
    pub cluster: ClusterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's id (can be overridden on the command line)
    pub id: NodeId,

    /// Address to bind for inbound calls; defaults to the directory address
    #[serde(default)]
    pub bind_address: Option<String>,
}

/// A single entry of the membership directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub id: NodeId,
    pub address: String,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Fixed membership, id -> address
    #[serde(default)]
    pub members: Vec<MemberConfig>,

    /// Coordinator assumed at startup (defaults to the highest member id)
    #[serde(default)]
    pub initial_coordinator: Option<NodeId>,

    /// Interval between coordinator check-ins in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-call request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How election requests are fanned out to higher-ranked peers
    #[serde(default)]
    pub fanout: FanOut,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_heartbeat_interval_ms() -> u64 {
    2000
}

fn default_connect_timeout_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            initial_coordinator: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            fanout: FanOut::default(),
        }
    }
}

impl BullyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: BullyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let directory = self.directory()?;

        if !directory.contains(self.node.id) {
            return Err(crate::Error::Config(format!(
                "node.id {} is not listed in cluster.members",
                self.node.id
            )));
        }

        if let Some(seed) = self.cluster.initial_coordinator {
            if !directory.contains(seed) {
                return Err(crate::Error::Config(format!(
                    "cluster.initial_coordinator {} is not listed in cluster.members",
                    seed
                )));
            }
        }

        if self.cluster.heartbeat_interval_ms == 0 {
            return Err(crate::Error::Config("cluster.heartbeat_interval_ms must be > 0".into()));
        }
        if self.cluster.connect_timeout_ms == 0 || self.cluster.request_timeout_ms == 0 {
            return Err(crate::Error::Config("cluster timeouts must be > 0".into()));
        }

        Ok(())
    }

    /// Build the membership directory from `cluster.members`
    pub fn directory(&self) -> crate::Result<MembershipDirectory> {
        MembershipDirectory::from_members(
            self.cluster.members.iter().map(|m| (m.id, m.address.clone())),
        )
    }

    /// Coordinator assumed before any election has run
    pub fn initial_coordinator(&self) -> crate::Result<NodeId> {
        match self.cluster.initial_coordinator {
            Some(id) => Ok(id),
            None => self
                .directory()?
                .highest_id()
                .ok_or_else(|| crate::Error::Config("cluster.members cannot be empty".into())),
        }
    }

    /// Address the listener binds to
    pub fn bind_address(&self) -> crate::Result<String> {
        if let Some(addr) = &self.node.bind_address {
            return Ok(addr.clone());
        }
        self.directory()?
            .lookup(self.node.id)
            .map(str::to_string)
            .ok_or(crate::Error::UnknownNode(self.node.id))
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.cluster.heartbeat_interval_ms)
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.connect_timeout_ms)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.request_timeout_ms)
    }

    /// Election engine settings derived from the cluster section
    pub fn election_config(&self) -> ElectionConfig {
        ElectionConfig {
            // A call may spend the full connect budget before the request budget starts
            call_timeout: self.connect_timeout() + self.request_timeout(),
            fanout: self.cluster.fanout,
        }
    }

    /// Override the node id (operator input) and re-validate
    pub fn with_node_id(mut self, id: NodeId) -> crate::Result<Self> {
        self.node.id = id;
        self.validate()?;
        Ok(self)
    }
}

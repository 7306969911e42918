//! BullyScale - Bully Leader Election
//!
//! Elects a single coordinator among a fixed, known set of nodes and
//! re-elects when the coordinator becomes unreachable.
//!
//! # Architecture
//!
//! Every node runs the same process. The live node with the highest id
//! always wins: a node that finds its coordinator unreachable asks every
//! higher-ranked node whether it is alive, defers if any of them is, and
//! otherwise announces itself as the new coordinator.
//!
//! # Features
//!
//! - Bully election rounds with sequential or parallel fan-out
//! - At most one outbound round per node at a time
//! - Best-effort coordinator announcements
//! - Heartbeat client that triggers elections on coordinator failure
//! - Length-prefixed, checksummed TCP protocol
//! - In-process transport for simulations

pub mod config;
pub mod election;
pub mod error;
pub mod network;
pub mod node;
pub mod state;

pub use config::BullyConfig;
pub use error::{Error, Result};
pub use node::BullyNode;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::BullyConfig;
    pub use crate::election::{ElectionConfig, FanOut, ProbeOutcome, RoundOutcome};
    pub use crate::error::{Error, Result};
    pub use crate::network::{Message, NetworkClient, NetworkServer, PeerTransport};
    pub use crate::node::BullyNode;
    pub use crate::state::{MembershipDirectory, NodeId, NodeState};
}

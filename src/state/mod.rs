//! State Management Module
//!
//! The static membership directory and the mutable per-node election state.

mod membership;
mod node;

pub use membership::MembershipDirectory;
pub use node::{ElectionPhase, NodeSnapshot, NodeState};

/// Node identifier. Bully ordering is plain numeric ordering on this value.
pub type NodeId = u64;

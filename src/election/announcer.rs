//! Coordinator Announcer
//!
//! Best-effort broadcast of a new coordinator to the whole directory. No
//! retries and no acknowledgement requirement: a peer that misses the
//! announcement will find out through its next failed coordinator probe.

use std::sync::Arc;

use super::{fan_out, ElectionConfig};
use crate::network::{Message, PeerTransport};
use crate::state::{MembershipDirectory, NodeId, NodeState};

/// Result of one announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceReport {
    pub coordinator_id: NodeId,
    /// Nodes that received the announcement, self included
    pub delivered: Vec<NodeId>,
    /// Nodes that could not be reached
    pub unreachable: Vec<NodeId>,
}

#[derive(Clone)]
pub struct CoordinatorAnnouncer {
    state: Arc<NodeState>,
    directory: Arc<MembershipDirectory>,
    transport: Arc<dyn PeerTransport>,
    config: ElectionConfig,
}

impl CoordinatorAnnouncer {
    pub fn new(
        state: Arc<NodeState>,
        directory: Arc<MembershipDirectory>,
        transport: Arc<dyn PeerTransport>,
        config: ElectionConfig,
    ) -> Self {
        Self {
            state,
            directory,
            transport,
            config,
        }
    }

    /// Tell every member that `winner` is the coordinator.
    ///
    /// The local node is updated directly, without a network round-trip.
    pub async fn announce(&self, winner: NodeId) -> AnnounceReport {
        let self_id = self.state.self_id();
        self.state.set_coordinator(winner).await;
        tracing::info!("{} is now the coordinator", winner);

        let targets: Vec<(NodeId, String)> = self
            .directory
            .others(self_id)
            .map(|(id, addr)| (id, addr.to_string()))
            .collect();

        let message = Message::NewCoordinator {
            coordinator_id: winner,
        };
        let replies = fan_out(self.transport.as_ref(), &self.config, &targets, &message).await;

        let mut report = AnnounceReport {
            coordinator_id: winner,
            delivered: vec![self_id],
            unreachable: Vec::new(),
        };
        for (peer, reply) in replies {
            match reply {
                Ok(_) => report.delivered.push(peer),
                Err(e) => {
                    tracing::warn!("Could not announce coordinator {} to {}: {}", winner, peer, e);
                    report.unreachable.push(peer);
                }
            }
        }

        report.delivered.sort_unstable();
        tracing::debug!(
            "Announcement of {} delivered to {}/{} nodes",
            winner,
            report.delivered.len(),
            self.directory.len()
        );
        report
    }
}

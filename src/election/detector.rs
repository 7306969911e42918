//! Failure Detector
//!
//! Heartbeat client for the current coordinator. Any failure to get an OK
//! back is treated as the coordinator being down and starts an election.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::{call_peer, ElectionConfig, ElectionEngine, RoundOutcome};
use crate::error::Error;
use crate::network::{Message, PeerTransport};
use crate::state::{MembershipDirectory, NodeId, NodeState};

/// Result of one coordinator check-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Coordinator answered OK
    Alive { coordinator_id: NodeId },
    /// Coordinator did not answer OK; an election was run before returning
    CoordinatorDown {
        coordinator_id: NodeId,
        election: RoundOutcome,
    },
}

#[derive(Clone)]
pub struct FailureDetector {
    state: Arc<NodeState>,
    directory: Arc<MembershipDirectory>,
    transport: Arc<dyn PeerTransport>,
    engine: ElectionEngine,
    config: ElectionConfig,
}

impl FailureDetector {
    pub fn new(
        state: Arc<NodeState>,
        directory: Arc<MembershipDirectory>,
        transport: Arc<dyn PeerTransport>,
        engine: ElectionEngine,
        config: ElectionConfig,
    ) -> Self {
        Self {
            state,
            directory,
            transport,
            engine,
            config,
        }
    }

    /// Contact the believed coordinator once
    pub async fn check_coordinator(&self) -> ProbeOutcome {
        let self_id = self.state.self_id();
        let coordinator_id = self.state.coordinator().await;

        if coordinator_id == self_id {
            tracing::debug!("Node {} is the coordinator", self_id);
            return ProbeOutcome::Alive { coordinator_id };
        }

        let alive = match self.directory.lookup(coordinator_id) {
            Some(address) => {
                tracing::debug!("Contacting coordinator {} at {}", coordinator_id, address);
                let probe = Message::HandleCommunication { node_id: self_id };
                let reply = call_peer(self.transport.as_ref(), address, probe, self.config.call_timeout)
                    .await
                    .and_then(|reply| match reply {
                        Message::Ok => Ok(()),
                        other => Err(Error::UnexpectedResponse {
                            request: "HandleCommunication",
                            response: other.type_name(),
                        }),
                    });
                match reply {
                    Ok(()) => true,
                    Err(e) if e.is_peer_unreachable() => {
                        tracing::warn!("Coordinator {} is unreachable: {}", coordinator_id, e);
                        false
                    }
                    Err(e) => {
                        tracing::warn!("Communication with coordinator {} failed: {}", coordinator_id, e);
                        false
                    }
                }
            }
            None => {
                tracing::warn!("Coordinator {} is not in the membership directory", coordinator_id);
                false
            }
        };

        if alive {
            tracing::info!("Coordinator {} is alive", coordinator_id);
            return ProbeOutcome::Alive { coordinator_id };
        }

        tracing::info!("Invoking election");
        let election = self.engine.run_election().await;
        ProbeOutcome::CoordinatorDown {
            coordinator_id,
            election,
        }
    }

    /// Check the coordinator every `interval` until `shutdown` flips to true
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Heartbeat loop started ({:?} interval)", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_coordinator().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Heartbeat loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    /// Every peer is reachable but answers Ack to everything
    struct AlwaysAck;

    #[async_trait::async_trait]
    impl PeerTransport for AlwaysAck {
        async fn call(&self, _address: &str, _message: Message) -> Result<Message> {
            Ok(Message::Ack)
        }
    }

    #[tokio::test]
    async fn test_wrong_reply_counts_as_coordinator_down() {
        let directory = Arc::new(
            MembershipDirectory::from_members((1..=5).map(|id| (id, format!("n{}", id)))).unwrap(),
        );
        let state = Arc::new(NodeState::new(4, 5));
        let transport: Arc<dyn PeerTransport> = Arc::new(AlwaysAck);
        let config = ElectionConfig {
            call_timeout: Duration::from_millis(100),
            ..ElectionConfig::default()
        };
        let engine = ElectionEngine::new(
            Arc::clone(&state),
            Arc::clone(&directory),
            Arc::clone(&transport),
            config.clone(),
        );
        let detector = FailureDetector::new(Arc::clone(&state), directory, transport, engine, config);

        match detector.check_coordinator().await {
            ProbeOutcome::CoordinatorDown { coordinator_id, election } => {
                assert_eq!(coordinator_id, 5);
                // Ack from 5 is not an OK either, so 4 takes over
                assert!(matches!(election, RoundOutcome::SelfPromoted(_)));
            }
            other => panic!("expected coordinator down, got {:?}", other),
        }
        assert_eq!(state.coordinator().await, 4);
    }
}

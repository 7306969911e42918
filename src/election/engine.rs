//! Election Engine
//!
//! One outbound Bully round: ask every higher-ranked peer whether it is
//! alive, defer if any of them answers OK, otherwise take over as
//! coordinator and announce it.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{fan_out, AnnounceReport, CoordinatorAnnouncer, ElectionConfig};
use crate::network::{Message, PeerTransport};
use crate::state::{MembershipDirectory, NodeId, NodeState};

/// How a round ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Another round was already running on this node
    Skipped,
    /// A higher-ranked peer is alive and will carry the election upward
    Deferred { acked_by: Vec<NodeId> },
    /// No higher-ranked peer answered; this node announced itself
    SelfPromoted(AnnounceReport),
}

/// Drives election rounds for the local node
#[derive(Clone)]
pub struct ElectionEngine {
    state: Arc<NodeState>,
    directory: Arc<MembershipDirectory>,
    transport: Arc<dyn PeerTransport>,
    announcer: CoordinatorAnnouncer,
    config: ElectionConfig,
}

impl ElectionEngine {
    pub fn new(
        state: Arc<NodeState>,
        directory: Arc<MembershipDirectory>,
        transport: Arc<dyn PeerTransport>,
        config: ElectionConfig,
    ) -> Self {
        let announcer = CoordinatorAnnouncer::new(
            Arc::clone(&state),
            Arc::clone(&directory),
            Arc::clone(&transport),
            config.clone(),
        );

        Self {
            state,
            directory,
            transport,
            announcer,
            config,
        }
    }

    /// Start a round unless one is already running on this node
    pub async fn run_election(&self) -> RoundOutcome {
        if !self.state.try_begin_election().await {
            tracing::debug!("Election already in progress on node {}", self.state.self_id());
            return RoundOutcome::Skipped;
        }
        self.run_claimed_round().await
    }

    /// Run a round in the background; the caller must already hold the claim
    pub fn spawn_claimed_round(&self) -> JoinHandle<RoundOutcome> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run_claimed_round().await })
    }

    /// Run a round whose claim was taken with `NodeState::try_begin_election`.
    ///
    /// The claim is released when the round ends, whatever the outcome.
    pub async fn run_claimed_round(&self) -> RoundOutcome {
        let self_id = self.state.self_id();
        let higher: Vec<(NodeId, String)> = self
            .directory
            .higher_than(self_id)
            .map(|(id, addr)| (id, addr.to_string()))
            .collect();

        tracing::info!(
            "Node {} starting election against {} higher-ranked peers",
            self_id,
            higher.len()
        );

        let message = Message::Election { invoker_id: self_id };
        let replies = fan_out(self.transport.as_ref(), &self.config, &higher, &message).await;

        let mut acked_by = Vec::new();
        for (peer, reply) in replies {
            match reply {
                Ok(Message::Ok) => {
                    tracing::info!("Received OK from {}", peer);
                    self.state.record_superior_ack().await;
                    acked_by.push(peer);
                }
                Ok(other) => {
                    tracing::debug!("Node {} answered election with {}", peer, other.type_name());
                }
                Err(e) if e.is_remote_call_failure() => {
                    tracing::warn!("Election call to {} failed: {}", peer, e);
                }
                Err(e) => {
                    tracing::info!("Node {} is not available: {}", peer, e);
                }
            }
        }

        let outcome = if self.state.superior_acked().await {
            tracing::info!("Node {} defers to higher-ranked nodes {:?}", self_id, acked_by);
            RoundOutcome::Deferred { acked_by }
        } else {
            tracing::info!("No higher-ranked node answered, node {} takes over", self_id);
            RoundOutcome::SelfPromoted(self.announcer.announce(self_id).await)
        };

        self.state.finish_election().await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Replies from a fixed script; missing addresses are unreachable
    #[derive(Default)]
    struct ScriptedTransport {
        replies: HashMap<String, Message>,
        calls: Mutex<Vec<(String, Message)>>,
    }

    impl ScriptedTransport {
        fn with(replies: &[(&str, Message)]) -> Self {
            Self {
                replies: replies.iter().map(|(a, m)| (a.to_string(), m.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl PeerTransport for ScriptedTransport {
        async fn call(&self, address: &str, message: Message) -> Result<Message> {
            self.calls.lock().await.push((address.to_string(), message));
            self.replies
                .get(address)
                .cloned()
                .ok_or_else(|| Error::ConnectionFailed {
                    address: address.to_string(),
                    reason: "refused".into(),
                })
        }
    }

    fn engine(self_id: NodeId, transport: Arc<ScriptedTransport>) -> (ElectionEngine, Arc<NodeState>) {
        let directory = Arc::new(
            MembershipDirectory::from_members((1..=5).map(|id| (id, format!("n{}", id)))).unwrap(),
        );
        let state = Arc::new(NodeState::new(self_id, 5));
        let config = ElectionConfig {
            call_timeout: Duration::from_millis(100),
            ..ElectionConfig::default()
        };
        (
            ElectionEngine::new(Arc::clone(&state), directory, transport, config),
            state,
        )
    }

    #[tokio::test]
    async fn test_only_higher_peers_are_contacted() {
        let transport = Arc::new(ScriptedTransport::with(&[("n4", Message::Ok), ("n5", Message::Ok)]));
        let (engine, _state) = engine(3, Arc::clone(&transport));

        engine.run_election().await;

        let calls = transport.calls.lock().await;
        let contacted: Vec<&str> = calls.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(contacted, vec!["n4", "n5"]);
        assert!(calls.iter().all(|(_, m)| *m == Message::Election { invoker_id: 3 }));
    }

    #[tokio::test]
    async fn test_single_ok_defers() {
        let transport = Arc::new(ScriptedTransport::with(&[("n3", Message::NotOk), ("n4", Message::Ok)]));
        let (engine, state) = engine(2, transport);

        assert_eq!(engine.run_election().await, RoundOutcome::Deferred { acked_by: vec![4] });
        assert_eq!(state.coordinator().await, 5);
        assert!(!state.election_in_progress().await);
        assert!(!state.superior_acked().await);
    }

    #[tokio::test]
    async fn test_no_ok_promotes_even_if_peers_answer() {
        // Reachable peers that do not say OK do not count
        let transport = Arc::new(ScriptedTransport::with(&[
            ("n3", Message::NotOk),
            ("n4", Message::Ack),
            ("n1", Message::Ack),
        ]));
        let (engine, state) = engine(2, transport);

        match engine.run_election().await {
            RoundOutcome::SelfPromoted(report) => {
                assert_eq!(report.coordinator_id, 2);
                assert_eq!(report.delivered, vec![1, 2, 3, 4]);
                assert_eq!(report.unreachable, vec![5]);
            }
            other => panic!("expected self-promotion, got {:?}", other),
        }
        assert_eq!(state.coordinator().await, 2);
        assert!(!state.election_in_progress().await);
    }

    #[tokio::test]
    async fn test_highest_node_promotes_without_calls() {
        let transport = Arc::new(ScriptedTransport::default());
        let (engine, state) = engine(5, Arc::clone(&transport));
        state.set_coordinator(1).await;

        match engine.run_election().await {
            RoundOutcome::SelfPromoted(report) => {
                assert_eq!(report.delivered, vec![5]);
                assert_eq!(report.unreachable, vec![1, 2, 3, 4]);
            }
            other => panic!("expected self-promotion, got {:?}", other),
        }
        assert_eq!(state.coordinator().await, 5);

        // Only announcements went out
        let calls = transport.calls.lock().await;
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(_, m)| *m == Message::NewCoordinator { coordinator_id: 5 }));
    }

    #[tokio::test]
    async fn test_spawned_round_releases_claim() {
        let transport = Arc::new(ScriptedTransport::with(&[("n5", Message::Ok)]));
        let (engine, state) = engine(4, transport);

        assert!(state.try_begin_election().await);
        let outcome = engine.spawn_claimed_round().await.unwrap();
        assert_eq!(outcome, RoundOutcome::Deferred { acked_by: vec![5] });
        assert!(!state.election_in_progress().await);
    }
}

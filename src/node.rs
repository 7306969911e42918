//! Bully Node
//!
//! Owns a node's state and wires it to the election engine, the announcer
//! and the failure detector. Also answers the inbound side of the
//! protocol: `Election`, `NewCoordinator`, `HandleCommunication` and the
//! operator `StatusRequest`.

use std::sync::Arc;

use crate::config::BullyConfig;
use crate::election::{ElectionConfig, ElectionEngine, FailureDetector, ProbeOutcome, RoundOutcome};
use crate::error::{Error, Result};
use crate::network::{Message, MessageHandler, PeerTransport};
use crate::state::{MembershipDirectory, NodeId, NodeSnapshot, NodeState};

pub struct BullyNode {
    state: Arc<NodeState>,
    directory: Arc<MembershipDirectory>,
    engine: ElectionEngine,
    detector: FailureDetector,
}

impl BullyNode {
    /// Create a node. `self_id` must be a member of `directory`.
    pub fn new(
        self_id: NodeId,
        initial_coordinator: NodeId,
        directory: Arc<MembershipDirectory>,
        transport: Arc<dyn PeerTransport>,
        config: ElectionConfig,
    ) -> Result<Self> {
        if !directory.contains(self_id) {
            return Err(Error::UnknownNode(self_id));
        }

        let state = Arc::new(NodeState::new(self_id, initial_coordinator));
        let engine = ElectionEngine::new(
            Arc::clone(&state),
            Arc::clone(&directory),
            Arc::clone(&transport),
            config.clone(),
        );
        let detector = FailureDetector::new(
            Arc::clone(&state),
            Arc::clone(&directory),
            transport,
            engine.clone(),
            config,
        );

        Ok(Self {
            state,
            directory,
            engine,
            detector,
        })
    }

    /// Create a node from a validated configuration
    pub fn from_config(config: &BullyConfig, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        Self::new(
            config.node.id,
            config.initial_coordinator()?,
            Arc::new(config.directory()?),
            transport,
            config.election_config(),
        )
    }

    pub fn id(&self) -> NodeId {
        self.state.self_id()
    }

    pub fn directory(&self) -> &MembershipDirectory {
        &self.directory
    }

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        self.state.snapshot().await
    }

    pub async fn coordinator(&self) -> NodeId {
        self.state.coordinator().await
    }

    /// Contest for coordinator, e.g. after recovering from a crash
    pub async fn run_election(&self) -> RoundOutcome {
        self.engine.run_election().await
    }

    /// Probe the coordinator once, electing a new one if it is down
    pub async fn check_coordinator(&self) -> ProbeOutcome {
        self.detector.check_coordinator().await
    }

    /// Inbound `Election(invoker_id)`.
    ///
    /// Answers OK to lower-ranked invokers and carries the election upward
    /// in the background if no round is running here yet. The reply never
    /// waits on that round.
    pub async fn handle_election(&self, invoker_id: NodeId) -> Message {
        let self_id = self.id();
        tracing::info!("Receiving election from {}", invoker_id);

        if invoker_id >= self_id {
            tracing::warn!(
                "Ignoring election from {}, which does not rank below {}",
                invoker_id,
                self_id
            );
            return Message::NotOk;
        }

        if self.state.try_begin_election().await {
            // Detached: the invoker only waits for the OK
            let _ = self.engine.spawn_claimed_round();
        }

        tracing::info!("Sending OK to {}", invoker_id);
        Message::Ok
    }

    /// Inbound `NewCoordinator(coordinator_id)`: unconditional overwrite
    pub async fn handle_new_coordinator(&self, coordinator_id: NodeId) -> Message {
        let previous = self.state.set_coordinator(coordinator_id).await;
        if previous != coordinator_id {
            tracing::info!("{} is now the new coordinator (was {})", coordinator_id, previous);
        }
        Message::Ack
    }

    /// Inbound `HandleCommunication(node_id)`: liveness probe
    pub async fn handle_communication(&self, node_id: NodeId) -> Message {
        tracing::debug!("Receiving communication from {}", node_id);
        Message::Ok
    }

    /// Inbound `StatusRequest`
    pub async fn status(&self) -> Message {
        let snap = self.snapshot().await;
        Message::StatusResponse {
            node_id: snap.node_id,
            coordinator_id: snap.coordinator_id,
            phase: snap.phase(),
            members: self.directory.len(),
        }
    }
}

#[async_trait::async_trait]
impl MessageHandler for BullyNode {
    async fn handle(&self, peer_addr: &str, message: Message) -> Message {
        match message {
            Message::Election { invoker_id } => self.handle_election(invoker_id).await,
            Message::NewCoordinator { coordinator_id } => {
                self.handle_new_coordinator(coordinator_id).await
            }
            Message::HandleCommunication { node_id } => self.handle_communication(node_id).await,
            Message::StatusRequest => self.status().await,
            other => {
                tracing::debug!("Unexpected {} from {}", other.type_name(), peer_addr);
                Message::Error {
                    message: format!("{} is not a request", other.type_name()),
                }
            }
        }
    }
}

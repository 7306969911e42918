//! Node State
//!
//! Mutable election state owned by the local node. Every read and write
//! goes through a single per-node lock, so the election-in-progress claim
//! is one atomic check-and-set.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::NodeId;

/// Where this node is in the election cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionPhase {
    /// No outbound round running
    Idle,
    /// An outbound round is contacting higher-ranked peers
    ElectionInProgress,
}

impl std::fmt::Display for ElectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionPhase::Idle => write!(f, "IDLE"),
            ElectionPhase::ElectionInProgress => write!(f, "ELECTION_IN_PROGRESS"),
        }
    }
}

/// Point-in-time copy of a node's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    pub coordinator_id: NodeId,
    pub election_in_progress: bool,
    pub superior_acked: bool,
}

impl NodeSnapshot {
    pub fn phase(&self) -> ElectionPhase {
        if self.election_in_progress {
            ElectionPhase::ElectionInProgress
        } else {
            ElectionPhase::Idle
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.node_id == self.coordinator_id
    }
}

#[derive(Debug)]
struct Inner {
    coordinator_id: NodeId,
    election_in_progress: bool,
    superior_acked: bool,
}

/// Per-node election state
#[derive(Debug)]
pub struct NodeState {
    /// This node's ID
    self_id: NodeId,
    inner: Mutex<Inner>,
}

impl NodeState {
    /// Create state for `self_id` with a seeded coordinator
    pub fn new(self_id: NodeId, coordinator_id: NodeId) -> Self {
        Self {
            self_id,
            inner: Mutex::new(Inner {
                coordinator_id,
                election_in_progress: false,
                superior_acked: false,
            }),
        }
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    /// Currently believed coordinator
    pub async fn coordinator(&self) -> NodeId {
        self.inner.lock().await.coordinator_id
    }

    /// Overwrite the believed coordinator, returning the previous value
    pub async fn set_coordinator(&self, id: NodeId) -> NodeId {
        let mut inner = self.inner.lock().await;
        std::mem::replace(&mut inner.coordinator_id, id)
    }

    /// Claim the right to run an outbound round.
    ///
    /// Returns `false` if a round is already running; the caller must not
    /// start another one.
    pub async fn try_begin_election(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.election_in_progress {
            return false;
        }
        inner.election_in_progress = true;
        inner.superior_acked = false;
        true
    }

    /// A higher-ranked peer answered OK during the current round
    pub async fn record_superior_ack(&self) {
        self.inner.lock().await.superior_acked = true;
    }

    pub async fn superior_acked(&self) -> bool {
        self.inner.lock().await.superior_acked
    }

    pub async fn election_in_progress(&self) -> bool {
        self.inner.lock().await.election_in_progress
    }

    /// End the current round, clearing both round flags
    pub async fn finish_election(&self) {
        let mut inner = self.inner.lock().await;
        inner.superior_acked = false;
        inner.election_in_progress = false;
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        let inner = self.inner.lock().await;
        NodeSnapshot {
            node_id: self.self_id,
            coordinator_id: inner.coordinator_id,
            election_in_progress: inner.election_in_progress,
            superior_acked: inner.superior_acked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_initial_state() {
        let state = NodeState::new(2, 5);
        let snap = state.snapshot().await;
        assert_eq!(snap.node_id, 2);
        assert_eq!(snap.coordinator_id, 5);
        assert_eq!(snap.phase(), ElectionPhase::Idle);
        assert!(!snap.is_coordinator());
    }

    #[tokio::test]
    async fn test_second_claim_is_refused() {
        let state = NodeState::new(1, 5);
        assert!(state.try_begin_election().await);
        assert!(!state.try_begin_election().await);
        assert_eq!(state.snapshot().await.phase(), ElectionPhase::ElectionInProgress);

        state.finish_election().await;
        assert!(state.try_begin_election().await);
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let state = Arc::new(NodeState::new(1, 5));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move { state.try_begin_election().await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_finish_resets_round_flags() {
        let state = NodeState::new(1, 5);
        assert!(state.try_begin_election().await);
        state.record_superior_ack().await;
        assert!(state.superior_acked().await);

        state.finish_election().await;
        assert!(!state.superior_acked().await);
        assert!(!state.election_in_progress().await);
    }

    #[tokio::test]
    async fn test_set_coordinator_is_idempotent() {
        let state = NodeState::new(1, 5);
        assert_eq!(state.set_coordinator(4).await, 5);
        let before = state.snapshot().await;
        assert_eq!(state.set_coordinator(4).await, 4);
        assert_eq!(state.snapshot().await, before);
    }
}

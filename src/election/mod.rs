//! Bully Election
//!
//! Outbound side of the protocol: the election round against higher-ranked
//! peers, the coordinator announcement, and the coordinator liveness probe
//! that triggers new rounds.

mod announcer;
mod detector;
mod engine;

pub use announcer::{AnnounceReport, CoordinatorAnnouncer};
pub use detector::{FailureDetector, ProbeOutcome};
pub use engine::{ElectionEngine, RoundOutcome};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::network::{Message, PeerTransport};
use crate::state::NodeId;

/// How a node contacts a set of peers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// One peer at a time in ascending id order; a round takes at most
    /// `call_timeout * peers`
    #[default]
    Sequential,
    /// All peers at once; a round takes at most one `call_timeout`
    Parallel,
}

/// Election configuration
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    /// Upper bound on a single remote call, dial included
    pub call_timeout: Duration,
    /// Fan-out strategy for elections and announcements
    pub fanout: FanOut,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(1500),
            fanout: FanOut::Sequential,
        }
    }
}

/// One remote call bounded by `call_timeout`
pub(crate) async fn call_peer(
    transport: &dyn PeerTransport,
    address: &str,
    message: Message,
    call_timeout: Duration,
) -> Result<Message> {
    match tokio::time::timeout(call_timeout, transport.call(address, message)).await {
        Ok(result) => result,
        Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
    }
}

/// Send `message` to every target and collect the replies in target order
pub(crate) async fn fan_out(
    transport: &dyn PeerTransport,
    config: &ElectionConfig,
    targets: &[(NodeId, String)],
    message: &Message,
) -> Vec<(NodeId, Result<Message>)> {
    match config.fanout {
        FanOut::Sequential => {
            let mut replies = Vec::with_capacity(targets.len());
            for (id, address) in targets {
                let reply = call_peer(transport, address, message.clone(), config.call_timeout).await;
                replies.push((*id, reply));
            }
            replies
        }
        FanOut::Parallel => {
            let calls = targets.iter().map(|(id, address)| async move {
                let reply = call_peer(transport, address, message.clone(), config.call_timeout).await;
                (*id, reply)
            });
            futures::future::join_all(calls).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Never answers
    struct BlackHole;

    #[async_trait::async_trait]
    impl PeerTransport for BlackHole {
        async fn call(&self, _address: &str, _message: Message) -> Result<Message> {
            futures::future::pending().await
        }
    }

    fn targets(n: NodeId) -> Vec<(NodeId, String)> {
        (1..=n).map(|id| (id, format!("node-{}", id))).collect()
    }

    #[tokio::test]
    async fn test_parallel_round_bounded_by_one_timeout() {
        let config = ElectionConfig {
            call_timeout: Duration::from_millis(100),
            fanout: FanOut::Parallel,
        };

        let started = Instant::now();
        let replies = fan_out(&BlackHole, &config, &targets(4), &Message::Election { invoker_id: 0 }).await;

        assert_eq!(replies.len(), 4);
        assert!(replies.iter().all(|(_, r)| matches!(r, Err(Error::ConnectionTimeout(_)))));
        assert!(started.elapsed() < Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_sequential_keeps_target_order() {
        let config = ElectionConfig {
            call_timeout: Duration::from_millis(20),
            fanout: FanOut::Sequential,
        };

        let started = Instant::now();
        let replies = fan_out(&BlackHole, &config, &targets(3), &Message::Ack).await;
        let elapsed = started.elapsed();

        let order: Vec<NodeId> = replies.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![1, 2, 3]);
        // One call_timeout per peer, one after another
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(250));
    }

    #[test]
    fn test_fanout_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            fanout: FanOut,
        }
        let parsed: Wrapper = toml::from_str("fanout = \"parallel\"").unwrap();
        assert_eq!(parsed.fanout, FanOut::Parallel);
        assert_eq!(FanOut::default(), FanOut::Sequential);
    }
}

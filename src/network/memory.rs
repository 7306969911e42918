//! In-process transport
//!
//! Routes calls straight to registered handlers by address. Addresses can
//! be taken offline to simulate a crashed peer; handlers are held weakly so
//! nodes and the transport they share do not keep each other alive.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

use super::{Message, MessageHandler, PeerTransport};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct InMemoryTransport {
    handlers: RwLock<HashMap<String, Weak<dyn MessageHandler>>>,
    offline: RwLock<HashSet<String>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `address` with `handler`
    pub async fn register(&self, address: impl Into<String>, handler: &Arc<dyn MessageHandler>) {
        self.handlers
            .write()
            .await
            .insert(address.into(), Arc::downgrade(handler));
    }

    /// Make `address` unreachable
    pub async fn disconnect(&self, address: &str) {
        self.offline.write().await.insert(address.to_string());
    }

    /// Make `address` reachable again
    pub async fn reconnect(&self, address: &str) {
        self.offline.write().await.remove(address);
    }

    pub async fn is_online(&self, address: &str) -> bool {
        !self.offline.read().await.contains(address)
    }
}

#[async_trait::async_trait]
impl PeerTransport for InMemoryTransport {
    async fn call(&self, address: &str, message: Message) -> Result<Message> {
        let unreachable = || Error::ConnectionFailed {
            address: address.to_string(),
            reason: "connection refused".into(),
        };

        if !self.is_online(address).await {
            return Err(unreachable());
        }

        let handler = self
            .handlers
            .read()
            .await
            .get(address)
            .and_then(Weak::upgrade)
            .ok_or_else(unreachable)?;

        Ok(handler.handle("in-memory", message).await)
    }
}

use std::collections::HashMap;

use axum::extract::ws::{close_code, CloseFrame, Message};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Outbound frame queue depth per connection.
pub const OUTBOUND_BUFFER: usize = 100;

/// Tracks at most one live connection per client id. The registry owns
/// the map exclusively; other components only see `register`, `remove`
/// and `broadcast`.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, mpsc::Sender<Message>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. An existing connection under the same
    /// client id is closed with a normal-closure frame first; the swap
    /// itself is atomic under the map lock.
    pub async fn register(&self, client_id: &str, sender: mpsc::Sender<Message>) {
        let previous = {
            let mut connections = self.connections.lock().await;
            connections.insert(client_id.to_string(), sender)
        };

        if let Some(previous) = previous {
            debug!(client_id, "replacing existing connection");
            let close = Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "New connection from same client".into(),
            }));
            let _ = previous.send(close).await;
        }
    }

    /// Remove a registration, but only if it still belongs to the given
    /// sender. A stale session ending must not evict its replacement.
    pub async fn remove(&self, client_id: &str, sender: &mpsc::Sender<Message>) {
        let mut connections = self.connections.lock().await;
        if let Some(current) = connections.get(client_id) {
            if current.same_channel(sender) {
                connections.remove(client_id);
            }
        }
    }

    pub async fn client_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Send a JSON message to every connection registered at call time.
    /// Connections whose channel has gone away are pruned; a full queue
    /// drops this frame for that client only.
    pub async fn broadcast(&self, message: &Value) {
        let payload = message.to_string();

        let snapshot: Vec<(String, mpsc::Sender<Message>)> = {
            let connections = self.connections.lock().await;
            if connections.is_empty() {
                return;
            }
            connections
                .iter()
                .map(|(id, tx)| (id.clone(), tx.clone()))
                .collect()
        };

        let mut stale = Vec::new();
        for (client_id, sender) in snapshot {
            match sender.try_send(Message::Text(payload.clone())) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(client_id = %client_id, "outbound queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push((client_id, sender)),
            }
        }

        if !stale.is_empty() {
            let mut connections = self.connections.lock().await;
            for (client_id, sender) in stale {
                if let Some(current) = connections.get(&client_id) {
                    if current.same_channel(&sender) {
                        debug!(client_id = %client_id, "pruning dead connection");
                        connections.remove(&client_id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_count() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(OUTBOUND_BUFFER);

        registry.register("client-1", tx).await;
        assert_eq!(registry.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_and_keeps_one_entry() {
        let registry = ConnectionRegistry::new();
        let (old_tx, mut old_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (new_tx, _new_rx) = mpsc::channel(OUTBOUND_BUFFER);

        registry.register("client-1", old_tx).await;
        registry.register("client-1", new_tx).await;

        assert_eq!(registry.client_count().await, 1);
        let frame = old_rx.recv().await.unwrap();
        assert!(matches!(frame, Message::Close(Some(ref f)) if f.code == close_code::NORMAL));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_connections() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(OUTBOUND_BUFFER);
        let (tx_b, mut rx_b) = mpsc::channel(OUTBOUND_BUFFER);
        registry.register("a", tx_a).await;
        registry.register("b", tx_b).await;

        registry.broadcast(&json!({"type": "test"})).await;

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.recv().await.unwrap() {
                Message::Text(text) => assert!(text.contains("\"type\":\"test\"")),
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_broadcast_with_no_connections_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.broadcast(&json!({"type": "test"})).await;
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_prunes_closed_connections() {
        let registry = ConnectionRegistry::new();
        let (dead_tx, dead_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (live_tx, mut live_rx) = mpsc::channel(OUTBOUND_BUFFER);
        registry.register("dead", dead_tx).await;
        registry.register("live", live_tx).await;
        drop(dead_rx);

        registry.broadcast(&json!({"n": 1})).await;

        assert_eq!(registry.client_count().await, 1);
        assert!(live_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_remove_ignores_stale_sender() {
        let registry = ConnectionRegistry::new();
        let (old_tx, _old_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (new_tx, _new_rx) = mpsc::channel(OUTBOUND_BUFFER);

        registry.register("client-1", old_tx.clone()).await;
        registry.register("client-1", new_tx.clone()).await;

        // the evicted session cleaning up after itself must not touch
        // the replacement
        registry.remove("client-1", &old_tx).await;
        assert_eq!(registry.client_count().await, 1);

        registry.remove("client-1", &new_tx).await;
        assert_eq!(registry.client_count().await, 0);
    }
}

use std::sync::Arc;

use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::registry::ConnectionRegistry;

/// Subject carrying every catalog event, published and subscribed.
pub const ITEMS_SUBJECT: &str = "items.updates";

/// Thin NATS wrapper. A failed connection at startup is not fatal: the
/// service keeps running with bus publishing disabled, matching the
/// best-effort notification contract.
#[derive(Clone, Default)]
pub struct BusClient {
    client: Option<async_nats::Client>,
}

impl BusClient {
    pub async fn connect(url: &str) -> Self {
        match async_nats::connect(url).await {
            Ok(client) => {
                info!(url, "connected to NATS");
                Self {
                    client: Some(client),
                }
            }
            Err(e) => {
                warn!(url, error = %e, "failed to connect to NATS, bus publishing disabled");
                Self { client: None }
            }
        }
    }

    /// A bus client that never publishes; used in tests and when the
    /// broker is unreachable.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Best-effort publish: failures are logged, never propagated.
    pub async fn publish(&self, subject: &str, payload: &Value) {
        let Some(client) = &self.client else {
            return;
        };

        let bytes = payload.to_string().into_bytes();
        if let Err(e) = client.publish(subject.to_string(), bytes.into()).await {
            error!(subject, error = %e, "failed to publish bus event");
            return;
        }
        if let Err(e) = client.flush().await {
            error!(subject, error = %e, "failed to flush bus connection");
        }
    }

    /// One-directional bridge: inbound bus events are re-broadcast to
    /// live connections as `nats_event` messages. Runs until the
    /// subscription ends; fully decoupled from the publish path.
    pub async fn run_bridge(&self, registry: Arc<ConnectionRegistry>) {
        let Some(client) = &self.client else {
            return;
        };

        let mut subscriber = match client.subscribe(ITEMS_SUBJECT).await {
            Ok(subscriber) => {
                info!(subject = ITEMS_SUBJECT, "subscribed to bus");
                subscriber
            }
            Err(e) => {
                error!(subject = ITEMS_SUBJECT, error = %e, "failed to subscribe to bus");
                return;
            }
        };

        while let Some(message) = subscriber.next().await {
            let data: Value = match serde_json::from_slice(&message.payload) {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "ignoring non-JSON bus message");
                    continue;
                }
            };

            registry
                .broadcast(&json!({
                    "type": "nats_event",
                    "source": "NATS",
                    "subject": message.subject.to_string(),
                    "data": data,
                }))
                .await;
        }
    }
}

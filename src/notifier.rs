use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::bus::{BusClient, ITEMS_SUBJECT};
use crate::models::{CreatedSummary, CycleResult, Product, UpdatedSummary};
use crate::registry::ConnectionRegistry;

/// Batch events carry at most this many summaries; the count field
/// still reports the full batch size.
pub const PREVIEW_LIMIT: usize = 10;

fn preview<T: Serialize>(items: &[T]) -> &[T] {
    &items[..items.len().min(PREVIEW_LIMIT)]
}

pub fn batch_created_payload(created: &[CreatedSummary]) -> Value {
    json!({
        "action": "batch_created",
        "count": created.len(),
        "products": preview(created),
    })
}

pub fn batch_updated_payload(updated: &[UpdatedSummary]) -> Value {
    json!({
        "action": "batch_updated",
        "count": updated.len(),
        "products": preview(updated),
    })
}

/// Fans reconciliation results out to the message bus and to live
/// connections. The two channels are independent and best-effort: a
/// failure on one never blocks or suppresses the other.
#[derive(Clone)]
pub struct Notifier {
    bus: BusClient,
    registry: Arc<ConnectionRegistry>,
}

impl Notifier {
    pub fn new(bus: BusClient, registry: Arc<ConnectionRegistry>) -> Self {
        Self { bus, registry }
    }

    /// Publish one cycle's deltas, batched per channel.
    pub async fn notify_cycle(&self, result: &CycleResult) {
        if !result.created.is_empty() {
            self.bus
                .publish(ITEMS_SUBJECT, &batch_created_payload(&result.created))
                .await;
            self.registry
                .broadcast(&json!({
                    "type": "products_batch_created",
                    "data": {
                        "count": result.created.len(),
                        "products": preview(&result.created),
                    },
                }))
                .await;
        }

        if !result.updated.is_empty() {
            self.bus
                .publish(ITEMS_SUBJECT, &batch_updated_payload(&result.updated))
                .await;
            self.registry
                .broadcast(&json!({
                    "type": "products_batch_updated",
                    "data": {
                        "count": result.updated.len(),
                        "products": preview(&result.updated),
                    },
                }))
                .await;
        }
    }

    pub async fn product_created(&self, product: &Product) {
        self.bus
            .publish(
                ITEMS_SUBJECT,
                &json!({
                    "action": "created",
                    "product_id": product.id,
                    "product_name": product.name,
                    "price": product.price,
                }),
            )
            .await;
        self.registry
            .broadcast(&json!({
                "type": "product_created",
                "data": { "id": product.id, "name": product.name, "price": product.price },
            }))
            .await;
    }

    pub async fn product_updated(&self, product: &Product) {
        self.bus
            .publish(
                ITEMS_SUBJECT,
                &json!({
                    "action": "updated",
                    "product_id": product.id,
                    "product_name": product.name,
                    "price": product.price,
                }),
            )
            .await;
        self.registry
            .broadcast(&json!({
                "type": "product_updated",
                "data": { "id": product.id, "name": product.name, "price": product.price },
            }))
            .await;
    }

    pub async fn product_deleted(&self, product_id: i64) {
        self.bus
            .publish(
                ITEMS_SUBJECT,
                &json!({ "action": "deleted", "product_id": product_id }),
            )
            .await;
        self.registry
            .broadcast(&json!({
                "type": "product_deleted",
                "data": { "id": product_id },
            }))
            .await;
    }

    pub async fn all_products_deleted(&self, count: u64) {
        self.bus
            .publish(
                ITEMS_SUBJECT,
                &json!({ "action": "deleted_all", "count": count }),
            )
            .await;
        self.registry
            .broadcast(&json!({
                "type": "all_products_deleted",
                "data": {
                    "count": count,
                    "message": format!("All {} products have been deleted", count),
                },
            }))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn created_batch(n: usize) -> Vec<CreatedSummary> {
        (0..n)
            .map(|i| CreatedSummary {
                id: i as i64 + 1,
                name: format!("product-{}", i),
                price: 1000.0 + i as f64,
            })
            .collect()
    }

    #[test]
    fn test_batch_created_preview_is_capped_at_ten() {
        let payload = batch_created_payload(&created_batch(37));

        assert_eq!(payload["action"], "batch_created");
        assert_eq!(payload["count"], 37);
        assert_eq!(payload["products"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_small_batch_preview_is_not_padded() {
        let payload = batch_created_payload(&created_batch(3));

        assert_eq!(payload["count"], 3);
        assert_eq!(payload["products"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_batch_updated_payload_carries_old_and_new_price() {
        let updated = vec![UpdatedSummary {
            id: 7,
            name: "iphone-15".to_string(),
            price: 74990.0,
            old_price: 79990.0,
        }];
        let payload = batch_updated_payload(&updated);

        assert_eq!(payload["action"], "batch_updated");
        assert_eq!(payload["products"][0]["price"], 74990.0);
        assert_eq!(payload["products"][0]["old_price"], 79990.0);
    }

    #[tokio::test]
    async fn test_notify_cycle_broadcasts_capped_preview() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = mpsc::channel(crate::registry::OUTBOUND_BUFFER);
        registry.register("monitor", tx).await;

        let notifier = Notifier::new(BusClient::disabled(), Arc::clone(&registry));
        let result = CycleResult {
            created: created_batch(15),
            updated: vec![],
        };
        notifier.notify_cycle(&result).await;

        let Message::Text(text) = rx.recv().await.unwrap() else {
            panic!("expected text frame");
        };
        let message: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(message["type"], "products_batch_created");
        assert_eq!(message["data"]["count"], 15);
        assert_eq!(message["data"]["products"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_empty_cycle_sends_nothing() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = mpsc::channel(crate::registry::OUTBOUND_BUFFER);
        registry.register("monitor", tx).await;

        let notifier = Notifier::new(BusClient::disabled(), Arc::clone(&registry));
        notifier.notify_cycle(&CycleResult::default()).await;

        assert!(rx.try_recv().is_err());
    }
}

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, warn};

use crate::models::{CandidateProduct, CreatedSummary, CycleResult, Product, UpdatedSummary};
use crate::utils::error::Result;

/// Compares a candidate batch against persisted state by product URL
/// and applies the resulting writes. The whole batch commits as one
/// transaction; the returned result only describes committed changes.
pub struct Reconciler {
    pool: SqlitePool,
}

impl Reconciler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn reconcile(&self, candidates: &[CandidateProduct]) -> Result<CycleResult> {
        let mut tx = self.pool.begin().await?;
        let mut result = CycleResult::default();

        for candidate in candidates {
            // a bad record must not abort the rest of the batch
            if let Err(e) = reconcile_one(&mut tx, candidate, &mut result).await {
                warn!(url = %candidate.url, error = %e, "skipping product after reconcile error");
            }
        }

        tx.commit().await?;
        Ok(result)
    }
}

async fn reconcile_one(
    tx: &mut Transaction<'_, Sqlite>,
    candidate: &CandidateProduct,
    result: &mut CycleResult,
) -> Result<()> {
    let existing = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE url = ?")
        .bind(&candidate.url)
        .fetch_optional(&mut **tx)
        .await?;

    match existing {
        Some(existing) => {
            if existing.price != candidate.price {
                // the site sometimes carries its own strike-through price;
                // prefer it, otherwise keep the price we are replacing
                let old_price = candidate.old_price.unwrap_or(existing.price);
                sqlx::query(
                    "UPDATE products SET price = ?, old_price = ?, updated_at = ? WHERE id = ?",
                )
                .bind(candidate.price)
                .bind(old_price)
                .bind(Utc::now())
                .bind(existing.id)
                .execute(&mut **tx)
                .await?;

                debug!(
                    id = existing.id,
                    old = existing.price,
                    new = candidate.price,
                    "price changed"
                );
                result.updated.push(UpdatedSummary {
                    id: existing.id,
                    name: existing.name,
                    price: candidate.price,
                    old_price: existing.price,
                });
            }
        }
        None => {
            let id = sqlx::query(
                "INSERT INTO products (name, price, old_price, url, image_url, availability, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&candidate.name)
            .bind(candidate.price)
            .bind(candidate.old_price)
            .bind(&candidate.url)
            .bind(&candidate.image_url)
            .bind(&candidate.availability)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?
            .last_insert_rowid();

            result.created.push(CreatedSummary {
                id,
                name: candidate.name.clone(),
                price: candidate.price,
            });
        }
    }

    Ok(())
}

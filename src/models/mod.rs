use serde::{Deserialize, Serialize};

pub mod product;

pub use product::{NewProduct, Product, UpdateProduct};

/// Stock state derived from the listing markup: a card with a purchase
/// affordance is `Available`, anything else is `OutOfStock`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum Availability {
    #[sqlx(rename = "available")]
    Available,
    #[sqlx(rename = "out_of_stock")]
    OutOfStock,
}

impl Default for Availability {
    fn default() -> Self {
        Availability::Available
    }
}

/// A freshly parsed listing card, not yet reconciled against the store.
/// Discarded at the end of the cycle that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateProduct {
    pub name: String,
    pub price: f64,
    pub old_price: Option<f64>,
    /// Absolute product URL; the natural key across cycles.
    pub url: String,
    pub image_url: Option<String>,
    pub availability: Availability,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedSummary {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdatedSummary {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub old_price: f64,
}

/// Outcome of one reconciliation batch. Only constructed from changes
/// that have already been committed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleResult {
    pub created: Vec<CreatedSummary>,
    pub updated: Vec<UpdatedSummary>,
}

impl CycleResult {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

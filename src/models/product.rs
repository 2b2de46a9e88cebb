use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::Availability;

/// A persisted catalog record. Created on the first sighting of a
/// product URL, mutated in place when its price changes, and only ever
/// deleted through the manual CRUD surface.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub old_price: Option<f64>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub old_price: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub availability: Availability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub old_price: Option<f64>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub availability: Option<Availability>,
}

impl Product {
    /// Apply a partial update; absent fields are left untouched.
    pub fn apply(&mut self, update: UpdateProduct) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(old_price) = update.old_price {
            self.old_price = Some(old_price);
        }
        if let Some(url) = update.url {
            self.url = Some(url);
        }
        if let Some(image_url) = update.image_url {
            self.image_url = Some(image_url);
        }
        if let Some(availability) = update.availability {
            self.availability = availability;
        }
        self.updated_at = Some(Utc::now());
    }
}

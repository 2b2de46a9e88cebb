use chrono::Utc;
use sqlx::sqlite::SqlitePool;

use crate::models::{NewProduct, Product, UpdateProduct};
use crate::utils::error::{AppError, Result};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price REAL NOT NULL,
    old_price REAL,
    url TEXT,
    image_url TEXT,
    availability TEXT NOT NULL DEFAULT 'available',
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP
)
"#;

const CREATE_URL_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_products_url ON products (url)";

/// Persistence boundary for catalog records. The reconciler runs its
/// batches in its own transaction directly on the pool; everything else
/// goes through here.
#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_URL_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Product>> {
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(skip)
                .fetch_all(&self.pool)
                .await?;
        Ok(products)
    }

    pub async fn get(&self, id: i64) -> Result<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound {
                resource: format!("product {}", id),
            })
    }

    pub async fn create(&self, new: NewProduct) -> Result<Product> {
        let result = sqlx::query(
            "INSERT INTO products (name, price, old_price, url, image_url, availability, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(new.price)
        .bind(new.old_price)
        .bind(&new.url)
        .bind(&new.image_url)
        .bind(&new.availability)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn update(&self, id: i64, update: UpdateProduct) -> Result<Product> {
        let mut product = self.get(id).await?;
        product.apply(update);

        sqlx::query(
            "UPDATE products SET name = ?, price = ?, old_price = ?, url = ?, image_url = ?, \
             availability = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.old_price)
        .bind(&product.url)
        .bind(&product.image_url)
        .bind(&product.availability)
        .bind(product.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        // 404 before delete, matching the read path
        self.get(id).await?;
        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM products").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Availability;

    async fn test_store() -> ProductStore {
        // in-memory sqlite is per-connection, keep the pool at one
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = ProductStore::new(pool);
        store.ensure_schema().await.unwrap();
        store
    }

    fn new_product(name: &str, price: f64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            price,
            old_price: None,
            url: Some(format!("https://best-magazin.com/{}", name)),
            image_url: None,
            availability: Availability::Available,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = test_store().await;

        let created = store.create(new_product("iphone-15", 79990.0)).await.unwrap();
        assert!(created.id > 0);
        assert!(created.updated_at.is_none());

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = test_store().await;

        let err = store.get(999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = test_store().await;
        for i in 0..5 {
            store
                .create(new_product(&format!("item-{}", i), 1000.0 + i as f64))
                .await
                .unwrap();
        }

        let page = store.list(2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "item-2");
    }

    #[tokio::test]
    async fn test_update_touches_updated_at() {
        let store = test_store().await;
        let created = store.create(new_product("ipad", 45000.0)).await.unwrap();

        let updated = store
            .update(
                created.id,
                UpdateProduct {
                    price: Some(42000.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.price, 42000.0);
        assert!(updated.updated_at.is_some());

        let fetched = store.get(created.id).await.unwrap();
        assert_eq!(fetched.price, 42000.0);
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let store = test_store().await;
        let a = store.create(new_product("a", 1.0)).await.unwrap();
        store.create(new_product("b", 2.0)).await.unwrap();

        store.delete(a.id).await.unwrap();
        assert!(matches!(
            store.delete(a.id).await.unwrap_err(),
            AppError::NotFound { .. }
        ));

        let deleted = store.delete_all().await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }
}

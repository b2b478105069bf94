use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;

use orderly_core::catalog::{best_name_match, CatalogError, CatalogLookup};
use orderly_core::domain::product::{ProductRecord, Sku};

use super::RepositoryError;
use crate::DbPool;

/// Catalog store backed by the `product` table. Reads are never cached.
#[derive(Clone)]
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn fetch_by_sku(&self, sku: &Sku) -> Result<Option<ProductRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT sku, name, price, min_order_qty, inventory FROM product WHERE sku = ?",
        )
        .bind(sku.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch_all(&self) -> Result<Vec<ProductRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT sku, name, price, min_order_qty, inventory FROM product ORDER BY sku",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product").fetch_one(&self.pool).await?;
        Ok(count)
    }

    pub async fn upsert(&self, product: &ProductRecord) -> Result<(), RepositoryError> {
        self.upsert_many(std::slice::from_ref(product)).await.map(|_| ())
    }

    /// Inserts or replaces every record in one transaction.
    pub async fn upsert_many(&self, products: &[ProductRecord]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for product in products {
            sqlx::query(
                "INSERT INTO product (sku, name, price, min_order_qty, inventory, updated_at)
                 VALUES (?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                 ON CONFLICT(sku) DO UPDATE SET
                     name = excluded.name,
                     price = excluded.price,
                     min_order_qty = excluded.min_order_qty,
                     inventory = excluded.inventory,
                     updated_at = excluded.updated_at",
            )
            .bind(product.sku.as_str())
            .bind(&product.name)
            .bind(product.price.to_string())
            .bind(i64::from(product.min_order_qty))
            .bind(i64::from(product.inventory))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            event_name = "catalog.upsert.completed",
            correlation_id = "catalog-import",
            count = products.len(),
            "catalog records upserted"
        );
        Ok(products.len())
    }

    pub async fn set_inventory(&self, sku: &Sku, inventory: u32) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE product SET inventory = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
             WHERE sku = ?",
        )
        .bind(i64::from(inventory))
        .bind(sku.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, sku: &Sku) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM product WHERE sku = ?")
            .bind(sku.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<ProductRecord, RepositoryError> {
    let sku: String = row.try_get("sku").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let min_order_qty: i64 =
        row.try_get("min_order_qty").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let inventory: i64 =
        row.try_get("inventory").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = Decimal::from_str(price_str.trim()).map_err(|e| {
        RepositoryError::Decode(format!("invalid price `{price_str}` for {sku}: {e}"))
    })?;
    let min_order_qty = u32::try_from(min_order_qty).map_err(|_| {
        RepositoryError::Decode(format!("invalid min_order_qty {min_order_qty} for {sku}"))
    })?;
    let inventory = u32::try_from(inventory)
        .map_err(|_| RepositoryError::Decode(format!("invalid inventory {inventory} for {sku}")))?;

    Ok(ProductRecord { sku: Sku(sku), name, price, min_order_qty, inventory })
}

#[async_trait]
impl CatalogLookup for SqlCatalogRepository {
    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<ProductRecord>, CatalogError> {
        Ok(self.fetch_by_sku(sku).await?)
    }

    async fn find_by_name(&self, mention: &str) -> Result<Option<ProductRecord>, CatalogError> {
        // SQLite's lower() only folds ASCII, so ranking happens in Rust.
        if mention.trim().is_empty() {
            return Ok(None);
        }
        let products = self.fetch_all().await?;
        Ok(best_name_match(&products, mention).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ProductRecord>, CatalogError> {
        Ok(self.fetch_all().await?)
    }
}

//! Read-only catalog contract consumed by validation and extraction.
//!
//! Implementations must be safe under concurrent reads and must not cache
//! records between calls: confirmation relies on seeing live inventory.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::{ProductRecord, Sku};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
    #[error("catalog query failed: {0}")]
    Query(String),
    #[error("catalog record could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<ProductRecord>, CatalogError>;

    /// Case-insensitive substring match ranked by [`best_name_match`].
    async fn find_by_name(&self, mention: &str) -> Result<Option<ProductRecord>, CatalogError>;

    /// All records ordered by SKU.
    async fn list_all(&self) -> Result<Vec<ProductRecord>, CatalogError>;
}

pub fn normalize_name(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Picks the single catalog record a mention resolves to.
///
/// Candidates are records whose lowercased name contains the lowercased,
/// trimmed mention. Among candidates an exact name match wins, then the
/// shortest name, then the lowest SKU. A blank mention resolves to nothing.
pub fn best_name_match<'a, I>(products: I, mention: &str) -> Option<&'a ProductRecord>
where
    I: IntoIterator<Item = &'a ProductRecord>,
{
    let needle = normalize_name(mention);
    if needle.is_empty() {
        return None;
    }

    products
        .into_iter()
        .filter_map(|product| {
            let name = normalize_name(&product.name);
            name.contains(&needle).then(|| (product, name == needle))
        })
        .min_by(|(left, left_exact), (right, right_exact)| {
            right_exact
                .cmp(left_exact)
                .then_with(|| left.name.chars().count().cmp(&right.name.chars().count()))
                .then_with(|| left.sku.cmp(&right.sku))
        })
        .map(|(product, _)| product)
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<BTreeMap<String, ProductRecord>>,
}

impl InMemoryCatalog {
    pub fn new(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let products =
            products.into_iter().map(|product| (product.sku.0.clone(), product)).collect();
        Self { products: RwLock::new(products) }
    }

    pub fn upsert(&self, product: ProductRecord) {
        let mut products = match self.products.write() {
            Ok(products) => products,
            Err(poisoned) => poisoned.into_inner(),
        };
        products.insert(product.sku.0.clone(), product);
    }

    /// Returns false when the SKU is unknown.
    pub fn set_inventory(&self, sku: &Sku, inventory: u32) -> bool {
        let mut products = match self.products.write() {
            Ok(products) => products,
            Err(poisoned) => poisoned.into_inner(),
        };
        match products.get_mut(&sku.0) {
            Some(product) => {
                product.inventory = inventory;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, sku: &Sku) -> Option<ProductRecord> {
        let mut products = match self.products.write() {
            Ok(products) => products,
            Err(poisoned) => poisoned.into_inner(),
        };
        products.remove(&sku.0)
    }

    fn snapshot(&self) -> Vec<ProductRecord> {
        match self.products.read() {
            Ok(products) => products.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        }
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn find_by_sku(&self, sku: &Sku) -> Result<Option<ProductRecord>, CatalogError> {
        let products = match self.products.read() {
            Ok(products) => products,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(products.get(&sku.0).cloned())
    }

    async fn find_by_name(&self, mention: &str) -> Result<Option<ProductRecord>, CatalogError> {
        let products = self.snapshot();
        Ok(best_name_match(&products, mention).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ProductRecord>, CatalogError> {
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::catalog::{best_name_match, CatalogLookup, InMemoryCatalog};
    use crate::domain::product::{ProductRecord, Sku};

    fn product(sku: &str, name: &str) -> ProductRecord {
        ProductRecord::new(sku, name, Decimal::new(1_000, 2), 1, 10)
    }

    #[test]
    fn name_match_is_case_insensitive_substring() {
        let products = vec![product("DSK-19", "Desk TRÄNHOLM 19"), product("CHR-01", "Chair")];

        let found = best_name_match(&products, "  desk tränholm ").expect("match");
        assert_eq!(found.sku.as_str(), "DSK-19");
        assert!(best_name_match(&products, "sofa").is_none());
    }

    #[test]
    fn blank_mention_matches_nothing() {
        let products = vec![product("CHR-01", "Chair")];
        assert!(best_name_match(&products, "").is_none());
        assert!(best_name_match(&products, "   ").is_none());
    }

    #[test]
    fn exact_name_beats_shorter_and_lower_sku() {
        let products = vec![
            product("A-1", "Hoodie Black XL"),
            product("B-1", "Hoodie"),
            product("C-1", "Hoodies"),
        ];
        assert_eq!(best_name_match(&products, "hoodie").expect("match").sku.as_str(), "B-1");
    }

    #[test]
    fn shortest_name_then_lowest_sku_breaks_ties() {
        let products = vec![
            product("Z-9", "Black Hoodie L"),
            product("B-2", "Black Hoodie M"),
            product("Q-3", "Black Hoodie XXL"),
        ];
        assert_eq!(best_name_match(&products, "black").expect("match").sku.as_str(), "B-2");

        let reversed: Vec<_> = products.iter().rev().cloned().collect();
        assert_eq!(best_name_match(&reversed, "black").expect("match").sku.as_str(), "B-2");
    }

    #[tokio::test]
    async fn in_memory_catalog_reflects_restocking_immediately() {
        let catalog = InMemoryCatalog::new(vec![product("DSK-19", "Desk")]);
        let sku = Sku("DSK-19".to_string());

        assert!(catalog.set_inventory(&sku, 2));
        let found = catalog.find_by_sku(&sku).await.expect("lookup").expect("present");
        assert_eq!(found.inventory, 2);

        assert!(!catalog.set_inventory(&Sku("NOPE".to_string()), 1));
        catalog.remove(&sku);
        assert!(catalog.find_by_name("desk").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn list_all_is_ordered_by_sku() {
        let catalog =
            InMemoryCatalog::new(vec![product("C-1", "Chair"), product("A-1", "Armchair")]);
        let skus: Vec<_> = catalog
            .list_all()
            .await
            .expect("list")
            .into_iter()
            .map(|product| product.sku.0)
            .collect();
        assert_eq!(skus, vec!["A-1".to_string(), "C-1".to_string()]);
    }
}

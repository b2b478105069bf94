use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sku(pub String);

impl Sku {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authoritative catalog entry. Owned by the catalog store and never mutated by validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: Sku,
    pub name: String,
    pub price: Decimal,
    pub min_order_qty: u32,
    pub inventory: u32,
}

impl ProductRecord {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        min_order_qty: u32,
        inventory: u32,
    ) -> Self {
        Self { sku: Sku(sku.into()), name: name.into(), price, min_order_qty, inventory }
    }
}

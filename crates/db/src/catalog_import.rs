//! CSV catalog import.
//!
//! Accepts the export headers (`Product_Code`, `Product_Name`, `Price`,
//! `Min_Order_Quantity`, `Available_in_Stock`) or the column names of the
//! `product` table. Unknown columns such as `Description` are ignored. Rows
//! that do not describe a valid record are skipped and reported.

use std::io;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use orderly_core::domain::product::ProductRecord;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("catalog csv could not be read: {0}")]
    Csv(#[from] csv::Error),
    #[error("catalog csv is missing required column `{0}`")]
    MissingColumn(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogImport {
    pub products: Vec<ProductRecord>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Product_Code", alias = "sku")]
    sku: String,
    #[serde(rename = "Product_Name", alias = "name")]
    name: String,
    #[serde(rename = "Price", alias = "price")]
    price: String,
    #[serde(rename = "Min_Order_Quantity", alias = "min_order_qty")]
    min_order_qty: String,
    #[serde(rename = "Available_in_Stock", alias = "inventory")]
    inventory: String,
}

const REQUIRED_COLUMNS: [(&str, &str); 5] = [
    ("Product_Code", "sku"),
    ("Product_Name", "name"),
    ("Price", "price"),
    ("Min_Order_Quantity", "min_order_qty"),
    ("Available_in_Stock", "inventory"),
];

pub fn parse_catalog_csv<R: io::Read>(input: R) -> Result<CatalogImport, ImportError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

    let headers = reader.headers()?.clone();
    for (export_name, column_name) in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == export_name || header == column_name) {
            return Err(ImportError::MissingColumn(export_name));
        }
    }

    let mut import = CatalogImport::default();
    for result in reader.deserialize::<CatalogRow>() {
        match result {
            Ok(row) => {
                let line = import.products.len() as u64 + import.skipped.len() as u64 + 2;
                match row_to_product(row) {
                    Ok(product) => import.products.push(product),
                    Err(reason) => import.skipped.push(SkippedRow { line, reason }),
                }
            }
            Err(error) => {
                let line = error
                    .position()
                    .map(csv::Position::line)
                    .unwrap_or(import.products.len() as u64 + import.skipped.len() as u64 + 2);
                import.skipped.push(SkippedRow { line, reason: error.to_string() });
            }
        }
    }

    for skipped in &import.skipped {
        tracing::warn!(
            event_name = "catalog.import.row_skipped",
            correlation_id = "catalog-import",
            line = skipped.line,
            reason = %skipped.reason,
            "catalog row skipped"
        );
    }
    Ok(import)
}

fn row_to_product(row: CatalogRow) -> Result<ProductRecord, String> {
    if row.sku.is_empty() {
        return Err("product code is empty".to_string());
    }
    if row.name.is_empty() {
        return Err(format!("product name is empty for {}", row.sku));
    }

    let price = Decimal::from_str(&row.price)
        .map_err(|e| format!("invalid price `{}` for {}: {e}", row.price, row.sku))?;
    if price.is_sign_negative() {
        return Err(format!("negative price for {}", row.sku));
    }
    let min_order_qty = row
        .min_order_qty
        .parse::<u32>()
        .map_err(|_| format!("invalid min order quantity `{}` for {}", row.min_order_qty, row.sku))?;
    if min_order_qty == 0 {
        return Err(format!("min order quantity must be at least 1 for {}", row.sku));
    }
    let inventory = row
        .inventory
        .parse::<u32>()
        .map_err(|_| format!("invalid stock level `{}` for {}", row.inventory, row.sku))?;

    Ok(ProductRecord::new(row.sku, row.name, price, min_order_qty, inventory))
}

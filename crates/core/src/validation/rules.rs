use crate::catalog::CatalogError;
use crate::domain::order::{Issue, IssueType, MentionedItem, ValidatedItem};
use crate::domain::product::ProductRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckPhase {
    Initial,
    Confirm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuantityViolation {
    BelowMinimum { requested: i64, minimum: u32 },
    ExceedsInventory { requested: i64, available: u32 },
}

/// Minimum order quantity is checked before inventory; only one violation is ever reported.
pub fn check_quantity(product: &ProductRecord, requested: i64) -> Result<u32, QuantityViolation> {
    let minimum = product.min_order_qty.max(1);
    if requested < i64::from(minimum) {
        return Err(QuantityViolation::BelowMinimum { requested, minimum });
    }

    let exceeds = QuantityViolation::ExceedsInventory { requested, available: product.inventory };
    if requested > i64::from(product.inventory) {
        return Err(exceeds);
    }

    u32::try_from(requested).map_err(|_| exceeds)
}

pub fn product_not_found(item: &MentionedItem, alternatives: &[String], total: usize) -> Issue {
    let suggestion = if alternatives.is_empty() {
        "Please check our product catalog for available items".to_string()
    } else if total > alternatives.len() {
        format!("Available products: {}...", alternatives.join(", "))
    } else {
        format!("Available products: {}", alternatives.join(", "))
    };

    Issue {
        item_mentioned: item.product_name_mentioned.clone(),
        issue_type: IssueType::ProductNotFound,
        message: format!(
            "Product '{}' does not exist in our catalog",
            item.product_name_mentioned
        ),
        suggestion,
        item_description: item.item_description.clone(),
    }
}

pub fn quantity_issue(
    item_mentioned: impl Into<String>,
    item_description: impl Into<String>,
    product: &ProductRecord,
    violation: QuantityViolation,
    phase: CheckPhase,
) -> Issue {
    let (issue_type, message, suggestion) = match (violation, phase) {
        (QuantityViolation::BelowMinimum { requested, minimum }, CheckPhase::Initial) => (
            IssueType::MoqNotMet,
            format!(
                "Requested quantity ({requested}) is below minimum order quantity ({minimum})"
            ),
            format!("Minimum order quantity for {} is {minimum}", product.name),
        ),
        (QuantityViolation::ExceedsInventory { requested, available }, CheckPhase::Initial) => (
            IssueType::InsufficientInventory,
            format!("Requested quantity ({requested}) exceeds available inventory ({available})"),
            format!("Maximum available quantity for {} is {available}", product.name),
        ),
        (QuantityViolation::BelowMinimum { requested, minimum }, CheckPhase::Confirm) => (
            IssueType::MoqNotMetOnConfirm,
            format!(
                "Minimum order quantity not met for {}. Requested: {requested}, Required: {minimum}",
                product.sku
            ),
            format!("Minimum order quantity: {minimum}"),
        ),
        (QuantityViolation::ExceedsInventory { requested, available }, CheckPhase::Confirm) => (
            IssueType::InsufficientInventoryOnConfirm,
            format!(
                "Insufficient inventory for {}. Requested: {requested}, Available: {available}",
                product.sku
            ),
            format!("Maximum available quantity: {available}"),
        ),
    };

    Issue {
        item_mentioned: item_mentioned.into(),
        issue_type,
        message,
        suggestion,
        item_description: item_description.into(),
    }
}

pub fn sku_vanished(item: &ValidatedItem) -> Issue {
    Issue {
        item_mentioned: item.sku.0.clone(),
        issue_type: IssueType::ProductNotFoundOnConfirm,
        message: format!("Product {} no longer exists in our catalog", item.sku),
        suggestion: "Please check the product catalog for available items".to_string(),
        item_description: item.item_description.clone(),
    }
}

pub fn lookup_failed(
    item_mentioned: impl Into<String>,
    item_description: impl Into<String>,
    error: &CatalogError,
) -> Issue {
    Issue {
        item_mentioned: item_mentioned.into(),
        issue_type: IssueType::ValidationError,
        message: format!("Error validating item: {error}"),
        suggestion: "Please try again or contact support".to_string(),
        item_description: item_description.into(),
    }
}

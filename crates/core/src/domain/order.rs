use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::product::Sku;

/// One item as the extraction capability reported it. Nothing here is trusted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionedItem {
    #[serde(default, deserialize_with = "string_or_null")]
    pub product_name_mentioned: String,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity_mentioned: i64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub item_description: String,
}

impl MentionedItem {
    pub fn new(
        product_name_mentioned: impl Into<String>,
        quantity_mentioned: i64,
        item_description: impl Into<String>,
    ) -> Self {
        Self {
            product_name_mentioned: product_name_mentioned.into(),
            quantity_mentioned,
            item_description: item_description.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    ProductNotFound,
    MoqNotMet,
    InsufficientInventory,
    ValidationError,
    ProductNotFoundOnConfirm,
    MoqNotMetOnConfirm,
    InsufficientInventoryOnConfirm,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::MoqNotMet => "MOQ_NOT_MET",
            Self::InsufficientInventory => "INSUFFICIENT_INVENTORY",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ProductNotFoundOnConfirm => "PRODUCT_NOT_FOUND_ON_CONFIRM",
            Self::MoqNotMetOnConfirm => "MOQ_NOT_MET_ON_CONFIRM",
            Self::InsufficientInventoryOnConfirm => "INSUFFICIENT_INVENTORY_ON_CONFIRM",
        }
    }

    pub fn is_confirm_check(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFoundOnConfirm
                | Self::MoqNotMetOnConfirm
                | Self::InsufficientInventoryOnConfirm
        )
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub item_mentioned: String,
    pub issue_type: IssueType,
    pub message: String,
    pub suggestion: String,
    #[serde(default)]
    pub item_description: String,
}

/// A line that passed every rule. Identity and price come from the catalog record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedItem {
    pub sku: Sku,
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default)]
    pub item_description: String,
}

impl ValidatedItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Exactly one of these exists per mentioned item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemOutcome {
    Validated(ValidatedItem),
    Issue(Issue),
}

impl ItemOutcome {
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedOrder {
    #[serde(default)]
    pub validated_items: Vec<ValidatedItem>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub delivery_preference: String,
    #[serde(default)]
    pub customer_notes: String,
}

impl ValidatedOrder {
    pub fn new(delivery_preference: impl Into<String>, customer_notes: impl Into<String>) -> Self {
        Self {
            validated_items: Vec::new(),
            issues: Vec::new(),
            delivery_preference: delivery_preference.into(),
            customer_notes: customer_notes.into(),
        }
    }

    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = ItemOutcome>,
        delivery_preference: impl Into<String>,
        customer_notes: impl Into<String>,
    ) -> Self {
        let mut order = Self::new(delivery_preference, customer_notes);
        for outcome in outcomes {
            order.push(outcome);
        }
        order
    }

    pub fn push(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Validated(item) => self.validated_items.push(item),
            ItemOutcome::Issue(issue) => self.issues.push(issue),
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.validated_items.iter().map(ValidatedItem::line_total).sum()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn outcome_count(&self) -> usize {
        self.validated_items.len() + self.issues.len()
    }
}

pub(crate) fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Integer(i64),
    Float(f64),
    Text(String),
}

// Model output sometimes quotes numbers or emits `3.0`. Anything that is not a
// whole number decodes as 0 so the item fails MOQ on its own.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let quantity = match Option::<RawQuantity>::deserialize(deserializer)? {
        None => 0,
        Some(RawQuantity::Integer(value)) => value,
        Some(RawQuantity::Float(value)) if value.is_finite() && value.fract() == 0.0 => {
            value as i64
        }
        Some(RawQuantity::Float(_)) => 0,
        Some(RawQuantity::Text(text)) => text.trim().parse::<i64>().unwrap_or(0),
    };
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::domain::order::{
        Issue, IssueType, ItemOutcome, MentionedItem, ValidatedItem, ValidatedOrder,
    };
    use crate::domain::product::Sku;

    #[test]
    fn mentioned_item_accepts_quoted_and_missing_fields() {
        let item: MentionedItem = serde_json::from_value(json!({
            "product_name_mentioned": "black hoodie",
            "quantity_mentioned": "12",
        }))
        .expect("lenient decode");

        assert_eq!(item.quantity_mentioned, 12);
        assert_eq!(item.item_description, "");

        let item: MentionedItem = serde_json::from_value(json!({
            "product_name_mentioned": null,
            "quantity_mentioned": 4.0,
            "item_description": "the tall ones"
        }))
        .expect("null name and float quantity");
        assert_eq!(item.product_name_mentioned, "");
        assert_eq!(item.quantity_mentioned, 4);
    }

    #[test]
    fn mentioned_item_decodes_unreadable_quantity_as_zero() {
        let item: MentionedItem = serde_json::from_value(json!({
            "product_name_mentioned": "desk",
            "quantity_mentioned": "a dozen",
        }))
        .expect("text quantity still decodes");
        assert_eq!(item.product_name_mentioned, "desk");
        assert_eq!(item.quantity_mentioned, 0);

        let item: MentionedItem = serde_json::from_value(json!({
            "product_name_mentioned": "desk",
            "quantity_mentioned": 2.5,
        }))
        .expect("fractional quantity still decodes");
        assert_eq!(item.quantity_mentioned, 0);
    }

    #[test]
    fn issue_type_uses_wire_names() {
        let value = serde_json::to_value(IssueType::InsufficientInventoryOnConfirm).expect("ser");
        assert_eq!(value, json!("INSUFFICIENT_INVENTORY_ON_CONFIRM"));
        assert_eq!(IssueType::MoqNotMet.to_string(), "MOQ_NOT_MET");
        assert!(IssueType::MoqNotMetOnConfirm.is_confirm_check());
        assert!(!IssueType::ValidationError.is_confirm_check());
    }

    #[test]
    fn order_subtotal_sums_line_totals() {
        let order = ValidatedOrder::from_outcomes(
            vec![
                ItemOutcome::Validated(ValidatedItem {
                    sku: Sku("DSK-19".to_string()),
                    name: "Desk TRÄNHOLM 19".to_string(),
                    quantity: 2,
                    price: Decimal::new(19_950, 2),
                    item_description: String::new(),
                }),
                ItemOutcome::Issue(Issue {
                    item_mentioned: "lamp".to_string(),
                    issue_type: IssueType::ProductNotFound,
                    message: "missing".to_string(),
                    suggestion: String::new(),
                    item_description: String::new(),
                }),
                ItemOutcome::Validated(ValidatedItem {
                    sku: Sku("HOOD-BLK".to_string()),
                    name: "Hoodie Black".to_string(),
                    quantity: 10,
                    price: Decimal::new(2_500, 2),
                    item_description: String::new(),
                }),
            ],
            "",
            "",
        );

        assert_eq!(order.subtotal(), Decimal::new(64_900, 2));
        assert_eq!(order.outcome_count(), 3);
        assert!(order.has_issues());
    }

    #[test]
    fn validated_order_serializes_sku_as_plain_string() {
        let order = ValidatedOrder::from_outcomes(
            vec![ItemOutcome::Validated(ValidatedItem {
                sku: Sku("DSK-19".to_string()),
                name: "Desk".to_string(),
                quantity: 1,
                price: Decimal::new(1000, 2),
                item_description: "one desk".to_string(),
            })],
            "before friday",
            "",
        );
        let value = serde_json::to_value(&order).expect("ser");
        assert_eq!(value["validated_items"][0]["sku"], json!("DSK-19"));
        assert_eq!(value["delivery_preference"], json!("before friday"));
        assert_eq!(value["issues"], json!([]));
    }
}

//! Reconciles extracted order items against the live catalog.
//!
//! Every mentioned item produces exactly one [`ItemOutcome`]. Business-rule
//! failures and per-item lookup failures both become issues, so validation
//! itself never fails.

pub mod rules;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::catalog::CatalogLookup;
use crate::domain::order::{ItemOutcome, MentionedItem, ValidatedItem, ValidatedOrder};

use self::rules::{check_quantity, CheckPhase};

pub const DEFAULT_MAX_SUGGESTIONS: usize = 3;

pub struct OrderValidator {
    catalog: Arc<dyn CatalogLookup>,
    max_suggestions: usize,
}

impl OrderValidator {
    pub fn new(catalog: Arc<dyn CatalogLookup>) -> Self {
        Self { catalog, max_suggestions: DEFAULT_MAX_SUGGESTIONS }
    }

    pub fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    pub async fn validate(
        &self,
        items: &[MentionedItem],
        delivery_preference: &str,
        customer_notes: &str,
    ) -> ValidatedOrder {
        let outcomes = self.validate_outcomes(items).await;
        let order = ValidatedOrder::from_outcomes(outcomes, delivery_preference, customer_notes);

        info!(
            event_name = "validation.batch.completed",
            mentioned = items.len(),
            validated = order.validated_items.len(),
            issues = order.issues.len(),
            "order validation completed"
        );
        order
    }

    /// One outcome per input item, in input order.
    pub async fn validate_outcomes(&self, items: &[MentionedItem]) -> Vec<ItemOutcome> {
        let mut alternatives = None;
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.validate_item(item, &mut alternatives).await);
        }
        outcomes
    }

    async fn validate_item(
        &self,
        item: &MentionedItem,
        alternatives: &mut Option<(Vec<String>, usize)>,
    ) -> ItemOutcome {
        let product = match self.catalog.find_by_name(&item.product_name_mentioned).await {
            Ok(Some(product)) => product,
            Ok(None) => {
                if alternatives.is_none() {
                    *alternatives = Some(self.alternative_names().await);
                }
                let (names, total) = alternatives
                    .as_ref()
                    .map(|(names, total)| (names.as_slice(), *total))
                    .unwrap_or_default();
                debug!(
                    event_name = "validation.item.not_found",
                    mention = %item.product_name_mentioned,
                    "mentioned product not found"
                );
                return ItemOutcome::Issue(rules::product_not_found(item, names, total));
            }
            Err(error) => {
                warn!(
                    event_name = "validation.item.lookup_failed",
                    mention = %item.product_name_mentioned,
                    error = %error,
                    "catalog lookup failed for item"
                );
                return ItemOutcome::Issue(rules::lookup_failed(
                    item.product_name_mentioned.clone(),
                    item.item_description.clone(),
                    &error,
                ));
            }
        };

        match check_quantity(&product, item.quantity_mentioned) {
            Ok(quantity) => {
                debug!(
                    event_name = "validation.item.validated",
                    sku = %product.sku,
                    quantity,
                    "item validated"
                );
                ItemOutcome::Validated(ValidatedItem {
                    sku: product.sku,
                    name: product.name,
                    quantity,
                    price: product.price,
                    item_description: item.item_description.clone(),
                })
            }
            Err(violation) => {
                debug!(
                    event_name = "validation.item.rejected",
                    sku = %product.sku,
                    violation = ?violation,
                    "item failed quantity rules"
                );
                ItemOutcome::Issue(rules::quantity_issue(
                    item.product_name_mentioned.clone(),
                    item.item_description.clone(),
                    &product,
                    violation,
                    CheckPhase::Initial,
                ))
            }
        }
    }

    async fn alternative_names(&self) -> (Vec<String>, usize) {
        match self.catalog.list_all().await {
            Ok(products) => {
                let total = products.len();
                let names = products
                    .into_iter()
                    .take(self.max_suggestions)
                    .map(|product| product.name)
                    .collect();
                (names, total)
            }
            Err(error) => {
                warn!(
                    event_name = "validation.suggestions.unavailable",
                    error = %error,
                    "could not list catalog for suggestions"
                );
                (Vec::new(), 0)
            }
        }
    }

    /// Re-checks already validated lines by SKU against the live catalog.
    ///
    /// Lines that no longer pass move to `issues` with `_ON_CONFIRM` types;
    /// passing lines are refreshed from the current record. Existing issues
    /// are kept ahead of any new ones.
    pub async fn confirm(&self, order: ValidatedOrder) -> ValidatedOrder {
        let ValidatedOrder { validated_items, issues, delivery_preference, customer_notes } = order;
        let rechecked = validated_items.len();

        let mut confirmed = ValidatedOrder {
            validated_items: Vec::with_capacity(rechecked),
            issues,
            delivery_preference,
            customer_notes,
        };
        for item in validated_items {
            confirmed.push(self.confirm_item(item).await);
        }

        info!(
            event_name = "validation.confirm.completed",
            rechecked,
            kept = confirmed.validated_items.len(),
            issues = confirmed.issues.len(),
            "order confirmation re-check completed"
        );
        confirmed
    }

    async fn confirm_item(&self, item: ValidatedItem) -> ItemOutcome {
        let product = match self.catalog.find_by_sku(&item.sku).await {
            Ok(Some(product)) => product,
            Ok(None) => return ItemOutcome::Issue(rules::sku_vanished(&item)),
            Err(error) => {
                warn!(
                    event_name = "validation.confirm.lookup_failed",
                    sku = %item.sku,
                    error = %error,
                    "catalog lookup failed during confirmation"
                );
                return ItemOutcome::Issue(rules::lookup_failed(
                    item.sku.0,
                    item.item_description,
                    &error,
                ));
            }
        };

        match check_quantity(&product, i64::from(item.quantity)) {
            Ok(quantity) => ItemOutcome::Validated(ValidatedItem {
                sku: product.sku,
                name: product.name,
                quantity,
                price: product.price,
                item_description: item.item_description,
            }),
            Err(violation) => ItemOutcome::Issue(rules::quantity_issue(
                item.sku.0,
                item.item_description,
                &product,
                violation,
                CheckPhase::Confirm,
            )),
        }
    }
}

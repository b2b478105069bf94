use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use orderly_core::domain::product::ProductRecord;
use orderly_core::pipeline::{ExtractionError, ExtractionOutput, Extractor};

use crate::llm::LlmClient;

/// Extracts order lines from free-form email text with a language model.
///
/// The model only reports what the customer mentioned. Nothing it returns is
/// trusted until the validator has reconciled it with the catalog.
pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct CatalogEntry<'a> {
    name: &'a str,
    price: Decimal,
    min_order_qty: u32,
    inventory: u32,
}

/// SKU-keyed catalog context for the prompt.
pub fn catalog_snapshot(catalog: &[ProductRecord]) -> String {
    let entries: BTreeMap<&str, CatalogEntry<'_>> = catalog
        .iter()
        .map(|product| {
            (
                product.sku.as_str(),
                CatalogEntry {
                    name: &product.name,
                    price: product.price,
                    min_order_qty: product.min_order_qty,
                    inventory: product.inventory,
                },
            )
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "{}".to_string())
}

pub fn extraction_prompt(email_content: &str, catalog: &[ProductRecord]) -> String {
    format!(
        r#"You are an order processing assistant. Extract the order details from the customer email below and answer with a single JSON object.

Product catalog for reference:
```json
{catalog}
```

Email content:
---
{email_content}
---

Instructions:
1. Identify every requested item and its quantity.
2. Capture delivery preferences or deadlines.
3. Capture any other customer comments or questions.

Answer with JSON in exactly this shape:
{{
  "items": [
    {{
      "product_name_mentioned": "the product name as written in the email",
      "quantity_mentioned": 0,
      "item_description": "how the item was described in the email"
    }}
  ],
  "delivery_preference": "",
  "customer_notes": ""
}}

Rules:
- Use the product names the customer wrote, for example "desk TRÄNHOLM 19" or "black hoodies".
- Do not check availability, prices or minimum quantities.
- If a SKU is mentioned, put it in item_description and keep the product name in product_name_mentioned.
- quantity_mentioned must be an integer."#,
        catalog = catalog_snapshot(catalog),
    )
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decodes a model reply into [`ExtractionOutput`].
///
/// Falls back to the outermost `{...}` span when the model wraps the object
/// in prose. A reply without an `items` array is malformed.
pub fn parse_extraction(reply: &str) -> Result<ExtractionOutput, ExtractionError> {
    let cleaned = strip_code_fences(reply);
    match serde_json::from_str::<ExtractionOutput>(cleaned) {
        Ok(output) => Ok(output),
        Err(first_error) => {
            let embedded = cleaned
                .find('{')
                .zip(cleaned.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &cleaned[start..=end]);

            match embedded {
                Some(object) if object.len() < cleaned.len() => {
                    serde_json::from_str::<ExtractionOutput>(object)
                        .map_err(|error| ExtractionError::MalformedOutput(error.to_string()))
                }
                _ => Err(ExtractionError::MalformedOutput(first_error.to_string())),
            }
        }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(
        &self,
        raw_text: &str,
        catalog: &[ProductRecord],
    ) -> Result<ExtractionOutput, ExtractionError> {
        if raw_text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let prompt = extraction_prompt(raw_text, catalog);
        let reply = self
            .client
            .complete(&prompt)
            .await
            .map_err(|error| ExtractionError::Unavailable(format!("{error:#}")))?;

        let output = parse_extraction(&reply)?;
        debug!(
            event_name = "extraction.items.parsed",
            correlation_id = "extraction",
            items = output.items.len(),
            catalog_size = catalog.len(),
            "extraction reply parsed"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use orderly_core::domain::product::ProductRecord;
    use orderly_core::pipeline::{ExtractionError, Extractor};
    use orderly_core::{InMemoryCatalog, IssueType, OrderValidator};

    use super::{catalog_snapshot, parse_extraction, strip_code_fences, LlmExtractor};
    use crate::llm::LlmClient;

    struct ScriptedLlm {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            self.reply.clone().map_err(|error| anyhow!(error))
        }
    }

    fn catalog() -> Vec<ProductRecord> {
        vec![
            ProductRecord::new("DSK-19", "Desk TRÄNHOLM 19", Decimal::new(19_900, 2), 5, 10),
            ProductRecord::new("HOD-01", "Black Hoodie", Decimal::new(4_550, 2), 2, 30),
        ]
    }

    #[test]
    fn fences_are_stripped_with_or_without_language_tag() {
        assert_eq!(strip_code_fences("```json\n{\"items\": []}\n```"), "{\"items\": []}");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("```json{}```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn lenient_fields_decode_with_defaults() {
        let output = parse_extraction(
            r#"```json
{
  "items": [
    {"product_name_mentioned": "black hoodies", "quantity_mentioned": "12"},
    {"product_name_mentioned": "desk", "quantity_mentioned": 7.0, "item_description": null}
  ],
  "delivery_preference": "before Friday"
}
```"#,
        )
        .expect("parse");

        assert_eq!(output.items.len(), 2);
        assert_eq!(output.items[0].quantity_mentioned, 12);
        assert_eq!(output.items[0].item_description, "");
        assert_eq!(output.items[1].quantity_mentioned, 7);
        assert_eq!(output.delivery_preference, "before Friday");
        assert_eq!(output.customer_notes, "");
    }

    #[test]
    fn object_wrapped_in_prose_is_recovered() {
        let output = parse_extraction("Sure! Here is the order:\n{\"items\": []}\nThanks.")
            .expect("embedded object");
        assert!(output.items.is_empty());
    }

    #[test]
    fn non_json_or_missing_items_is_malformed() {
        assert!(matches!(
            parse_extraction("I could not find an order in this email."),
            Err(ExtractionError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_extraction(r#"{"delivery_preference": "asap"}"#),
            Err(ExtractionError::MalformedOutput(_))
        ));
    }

    #[test]
    fn unreadable_quantity_keeps_the_rest_of_the_batch() {
        let output = parse_extraction(
            r#"{"items": [{"product_name_mentioned": "mug", "quantity_mentioned": 4}, {"product_name_mentioned": "desk", "quantity_mentioned": "a dozen"}]}"#,
        )
        .expect("one unreadable quantity must not fail the reply");

        assert_eq!(output.items.len(), 2);
        assert_eq!(output.items[0].quantity_mentioned, 4);
        assert_eq!(output.items[1].product_name_mentioned, "desk");
        assert_eq!(output.items[1].quantity_mentioned, 0);
    }

    #[tokio::test]
    async fn unreadable_quantity_becomes_a_single_issue() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{"items": [
                {"product_name_mentioned": "black hoodie", "quantity_mentioned": 4},
                {"product_name_mentioned": "desk", "quantity_mentioned": "a dozen"}
            ]}"#,
        ));
        let extractor = LlmExtractor::new(llm);
        let output = extractor.extract("4 hoodies and a dozen desks", &catalog()).await.expect("extract");

        let validator = OrderValidator::new(Arc::new(InMemoryCatalog::new(catalog())));
        let order = validator.validate(&output.items, "", "").await;

        assert_eq!(order.validated_items.len(), 1);
        assert_eq!(order.validated_items[0].sku.as_str(), "HOD-01");
        assert_eq!(order.validated_items[0].quantity, 4);
        assert_eq!(order.issues.len(), 1);
        assert_eq!(order.issues[0].item_mentioned, "desk");
        assert_eq!(order.issues[0].issue_type, IssueType::MoqNotMet);
    }

    #[test]
    fn catalog_snapshot_is_keyed_by_sku() {
        let snapshot: serde_json::Value =
            serde_json::from_str(&catalog_snapshot(&catalog())).expect("json");
        assert_eq!(snapshot["DSK-19"]["name"], "Desk TRÄNHOLM 19");
        assert_eq!(snapshot["HOD-01"]["min_order_qty"], 2);
        assert_eq!(snapshot["HOD-01"]["inventory"], 30);
    }

    #[tokio::test]
    async fn extractor_sends_email_and_catalog_in_prompt() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{"items": [{"product_name_mentioned": "desk", "quantity_mentioned": 7}]}"#,
        ));
        let extractor = LlmExtractor::new(llm.clone());

        let output =
            extractor.extract("Please send 7 desks by Friday", &catalog()).await.expect("extract");
        assert_eq!(output.items[0].product_name_mentioned, "desk");

        let prompts = llm.prompts.lock().expect("lock");
        assert!(prompts[0].contains("Please send 7 desks by Friday"));
        assert!(prompts[0].contains("\"DSK-19\""));
    }

    #[tokio::test]
    async fn blank_email_is_rejected_without_calling_the_model() {
        let llm = Arc::new(ScriptedLlm::replying("{}"));
        let extractor = LlmExtractor::new(llm.clone());

        let error = extractor.extract("   \n", &catalog()).await.expect_err("empty");
        assert_eq!(error, ExtractionError::EmptyInput);
        assert!(llm.prompts.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_reported_as_unavailable() {
        let llm = Arc::new(ScriptedLlm {
            reply: Err("connection refused".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let extractor = LlmExtractor::new(llm);

        let error = extractor.extract("7 desks", &catalog()).await.expect_err("unavailable");
        assert!(matches!(error, ExtractionError::Unavailable(ref m) if m.contains("refused")));
    }
}

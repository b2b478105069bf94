use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tera::{Context, Tera};

use orderly_core::domain::order::ValidatedOrder;
use orderly_core::pipeline::{RenderError, Renderer};

use crate::llm::LlmClient;

const RESPONSE_TEMPLATE: &str = "response.txt.tera";

/// Writes the customer reply with a language model.
pub struct LlmRenderer {
    client: Arc<dyn LlmClient>,
}

impl LlmRenderer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

pub fn response_prompt(order: &ValidatedOrder) -> String {
    let order_json =
        serde_json::to_string_pretty(order).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"You are a professional customer service representative. Write a friendly, helpful reply to a customer's order request based on the validated order data below.

Validated order data:
```json
{order_json}
```

Instructions:
1. Thank the customer for their order.
2. List every item that can be fulfilled, with quantity and price.
3. Explain each issue politely and include its suggestion.
4. Address the delivery preference if one is given.
5. Respond to the customer's notes or questions.
6. Give clear next steps.

Do not promise any item that is not listed under validated_items.
Tone: professional, friendly and solution-oriented. Length: 2-4 paragraphs. Format: plain text email."#
    )
}

#[async_trait]
impl Renderer for LlmRenderer {
    async fn render(&self, order: &ValidatedOrder) -> Result<String, RenderError> {
        let reply = self
            .client
            .complete(&response_prompt(order))
            .await
            .map_err(|error| RenderError::Unavailable(format!("{error:#}")))?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(RenderError::Failed("model returned an empty reply".to_string()));
        }
        Ok(reply.to_string())
    }
}

#[derive(Serialize)]
struct ItemView<'a> {
    sku: &'a str,
    name: &'a str,
    quantity: u32,
    price: String,
    line_total: String,
}

/// Deterministic reply rendered from an embedded tera template.
#[derive(Clone, Debug)]
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, RenderError> {
        Self::from_source(include_str!("../../../templates/orders/response.txt.tera"))
    }

    pub fn from_source(source: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(RESPONSE_TEMPLATE, source)
            .map_err(|error| RenderError::Failed(format!("invalid response template: {error}")))?;
        Ok(Self { tera })
    }

    pub fn render_order(&self, order: &ValidatedOrder) -> Result<String, RenderError> {
        let items: Vec<ItemView<'_>> = order
            .validated_items
            .iter()
            .map(|item| ItemView {
                sku: item.sku.as_str(),
                name: &item.name,
                quantity: item.quantity,
                price: format!("{:.2}", item.price),
                line_total: format!("{:.2}", item.line_total()),
            })
            .collect();

        let mut context = Context::new();
        context.insert("items", &items);
        context.insert("issues", &order.issues);
        context.insert("subtotal", &format!("{:.2}", order.subtotal()));
        context.insert("delivery_preference", order.delivery_preference.trim());
        context.insert("customer_notes", order.customer_notes.trim());

        self.tera
            .render(RESPONSE_TEMPLATE, &context)
            .map(|text| text.trim().to_string())
            .map_err(|error| RenderError::Failed(format!("{error:?}")))
    }
}

#[async_trait]
impl Renderer for TemplateRenderer {
    async fn render(&self, order: &ValidatedOrder) -> Result<String, RenderError> {
        self.render_order(order)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use orderly_core::domain::order::{Issue, IssueType, ValidatedItem, ValidatedOrder};
    use orderly_core::domain::product::Sku;
    use orderly_core::pipeline::{RenderError, Renderer};

    use super::{response_prompt, LlmRenderer, TemplateRenderer};
    use crate::llm::LlmClient;

    struct FixedReply(Option<&'static str>);

    #[async_trait]
    impl LlmClient for FixedReply {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.0.map(str::to_string).ok_or_else(|| anyhow!("timeout"))
        }
    }

    fn order() -> ValidatedOrder {
        let mut order = ValidatedOrder::new("next Tuesday", "Is gift wrap available?");
        order.validated_items.push(ValidatedItem {
            sku: Sku("DSK-19".to_string()),
            name: "Desk TRÄNHOLM 19".to_string(),
            quantity: 3,
            price: Decimal::new(19_900, 2),
            item_description: "oak desks".to_string(),
        });
        order.issues.push(Issue {
            item_mentioned: "sofa".to_string(),
            issue_type: IssueType::ProductNotFound,
            message: "Product 'sofa' does not exist in our catalog".to_string(),
            suggestion: "Available products: Desk TRÄNHOLM 19".to_string(),
            item_description: String::new(),
        });
        order
    }

    #[test]
    fn template_lists_items_totals_and_issues() {
        let renderer = TemplateRenderer::new().expect("template");
        let text = renderer.render_order(&order()).expect("render");

        assert!(text.starts_with("Dear Customer,"));
        assert!(text.contains("- 3 x Desk TRÄNHOLM 19 (DSK-19) at 199.00 each: 597.00"));
        assert!(text.contains("Subtotal: 597.00"));
        assert!(text.contains("- sofa: Product 'sofa' does not exist in our catalog"));
        assert!(text.contains("\"next Tuesday\""));
        assert!(text.contains("Is gift wrap available?"));
        assert!(text.contains("Please reply with any changes"));
    }

    #[test]
    fn template_handles_order_without_items() {
        let renderer = TemplateRenderer::new().expect("template");
        let text = renderer.render_order(&ValidatedOrder::default()).expect("render");

        assert!(text.contains("could not confirm any of the requested items"));
        assert!(!text.contains("Subtotal"));
        assert!(!text.contains("Delivery:"));
        assert!(text.contains("Please reply to confirm"));
    }

    #[test]
    fn broken_template_source_is_rejected() {
        assert!(matches!(
            TemplateRenderer::from_source("{% for x in %}"),
            Err(RenderError::Failed(_))
        ));
    }

    #[test]
    fn response_prompt_embeds_order_json() {
        let prompt = response_prompt(&order());
        assert!(prompt.contains("\"validated_items\""));
        assert!(prompt.contains("PRODUCT_NOT_FOUND"));
    }

    #[tokio::test]
    async fn llm_renderer_trims_reply_and_maps_failures() {
        let renderer = LlmRenderer::new(Arc::new(FixedReply(Some("  Hello there.\n"))));
        assert_eq!(renderer.render(&order()).await.expect("render"), "Hello there.");

        let renderer = LlmRenderer::new(Arc::new(FixedReply(Some("   "))));
        assert!(matches!(renderer.render(&order()).await, Err(RenderError::Failed(_))));

        let renderer = LlmRenderer::new(Arc::new(FixedReply(None)));
        assert!(matches!(renderer.render(&order()).await, Err(RenderError::Unavailable(_))));
    }
}

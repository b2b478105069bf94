use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use orderly_agent::{LlmClient, LlmExtractor, TemplateRenderer};
use orderly_core::audit::InMemoryAuditSink;
use orderly_core::config::{AppConfig, RendererKind};
use orderly_core::pipeline::PipelineContext;
use orderly_db::{DbPool, SqlCatalogRepository};

use crate::bootstrap::{bootstrap_with_client, Application};

pub const EXTRACTION_REPLY: &str = r#"```json
{
  "items": [
    {"product_name_mentioned": "Desk TRÄNHOLM", "quantity_mentioned": 3, "item_description": "oak finish"},
    {"product_name_mentioned": "chair alvik", "quantity_mentioned": "9", "item_description": ""}
  ],
  "delivery_preference": "next week",
  "customer_notes": null
}
```"#;

pub struct ScriptedLlm {
    reply: String,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// Bootstrapped application over in-memory SQLite with the template renderer.
pub async fn scripted_app(reply: &str) -> Application {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.llm.renderer = RendererKind::Template;

    match bootstrap_with_client(config, Arc::new(ScriptedLlm { reply: reply.to_string() })).await {
        Ok(app) => app,
        Err(error) => panic!("bootstrap should succeed: {error}"),
    }
}

pub fn context_over(pool: DbPool) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::new(
        Arc::new(SqlCatalogRepository::new(pool)),
        Arc::new(LlmExtractor::new(Arc::new(ScriptedLlm {
            reply: EXTRACTION_REPLY.to_string(),
        }))),
        Arc::new(TemplateRenderer::new().expect("bundled template should parse")),
        Arc::new(InMemoryAuditSink::default()),
    ))
}

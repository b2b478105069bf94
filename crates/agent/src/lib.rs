//! Language-model capabilities for the order pipeline.
//!
//! - `extraction` turns raw email text into mentioned items
//! - `rendering` turns a validated order into a customer reply
//! - `llm` is the provider-neutral completion client both are built on
//!
//! The model is a translator only. Catalog facts such as prices, minimums and
//! stock are decided by the validator, never by model output.

use std::sync::Arc;

use orderly_core::config::{LlmConfig, RendererKind};
use orderly_core::pipeline::{Extractor, RenderError, Renderer};

pub mod extraction;
pub mod llm;
pub mod rendering;

pub use extraction::LlmExtractor;
pub use llm::{HttpLlmClient, LlmClient};
pub use rendering::{LlmRenderer, TemplateRenderer};

pub struct Capabilities {
    pub extractor: Arc<dyn Extractor>,
    pub renderer: Arc<dyn Renderer>,
}

/// Wires both capabilities onto one shared completion client.
pub fn capabilities(
    config: &LlmConfig,
    client: Arc<dyn LlmClient>,
) -> Result<Capabilities, RenderError> {
    let renderer: Arc<dyn Renderer> = match config.renderer {
        RendererKind::Llm => Arc::new(LlmRenderer::new(client.clone())),
        RendererKind::Template => Arc::new(TemplateRenderer::new()?),
    };
    Ok(Capabilities { extractor: Arc::new(LlmExtractor::new(client)), renderer })
}

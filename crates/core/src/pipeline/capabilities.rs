use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::{string_or_null, MentionedItem, ValidatedOrder};
use crate::domain::product::ProductRecord;

/// Structured result of the extraction capability. `items` is required; the
/// free-text fields default to empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub items: Vec<MentionedItem>,
    #[serde(default, deserialize_with = "string_or_null")]
    pub delivery_preference: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub customer_notes: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("email content is empty")]
    EmptyInput,
    #[error("extraction capability unreachable: {0}")]
    Unavailable(String),
    #[error("extraction produced malformed output: {0}")]
    MalformedOutput(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("rendering capability unreachable: {0}")]
    Unavailable(String),
    #[error("rendering failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        raw_text: &str,
        catalog: &[ProductRecord],
    ) -> Result<ExtractionOutput, ExtractionError>;
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, order: &ValidatedOrder) -> Result<String, RenderError>;
}

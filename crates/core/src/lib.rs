pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pipeline;
pub mod validation;

pub use catalog::{best_name_match, CatalogError, CatalogLookup, InMemoryCatalog};
pub use domain::order::{
    Issue, IssueType, ItemOutcome, MentionedItem, ValidatedItem, ValidatedOrder,
};
pub use domain::product::{ProductRecord, Sku};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pipeline::{
    ExtractionError, ExtractionOutput, Extractor, FailureKind, OrderPipeline, PipelineContext,
    PipelineFailure, ProcessedOrder, RenderError, Renderer,
};
pub use validation::{OrderValidator, DEFAULT_MAX_SUGGESTIONS};

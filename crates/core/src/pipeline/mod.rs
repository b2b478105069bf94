pub mod capabilities;
pub mod engine;
pub mod orchestrator;
pub mod states;

pub use capabilities::{ExtractionError, ExtractionOutput, Extractor, RenderError, Renderer};
pub use engine::{PipelineFlow, PipelineRun, PipelineTransitionError};
pub use orchestrator::{
    FailureKind, OrderPipeline, PipelineContext, PipelineFailure, ProcessedOrder,
};
pub use states::{PipelineEvent, PipelineState, TransitionOutcome};

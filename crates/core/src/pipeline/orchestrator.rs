use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::CatalogLookup;
use crate::domain::order::ValidatedOrder;
use crate::pipeline::capabilities::{Extractor, Renderer};
use crate::pipeline::engine::{PipelineFlow, PipelineRun};
use crate::pipeline::states::{PipelineEvent, PipelineState};
use crate::validation::{OrderValidator, DEFAULT_MAX_SUGGESTIONS};

const PIPELINE_ACTOR: &str = "order-pipeline";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExtractionFailure,
    RenderingFailure,
    InfrastructureFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractionFailure => "extraction_failure",
            Self::RenderingFailure => "rendering_failure",
            Self::InfrastructureFailure => "infrastructure_failure",
        }
    }
}

/// Uniform failure payload. A failed request never carries a partial order.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}: {detail}", kind.as_str())]
pub struct PipelineFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl PipelineFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedOrder {
    pub email_response: String,
    pub order_summary: ValidatedOrder,
}

/// Capability handles built once at startup and shared by every request.
pub struct PipelineContext {
    catalog: Arc<dyn CatalogLookup>,
    extractor: Arc<dyn Extractor>,
    renderer: Arc<dyn Renderer>,
    audit: Arc<dyn AuditSink>,
    validator: OrderValidator,
    ready: AtomicBool,
}

impl PipelineContext {
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        extractor: Arc<dyn Extractor>,
        renderer: Arc<dyn Renderer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::with_max_suggestions(catalog, extractor, renderer, audit, DEFAULT_MAX_SUGGESTIONS)
    }

    pub fn with_max_suggestions(
        catalog: Arc<dyn CatalogLookup>,
        extractor: Arc<dyn Extractor>,
        renderer: Arc<dyn Renderer>,
        audit: Arc<dyn AuditSink>,
        max_suggestions: usize,
    ) -> Self {
        let validator = OrderValidator::new(catalog.clone()).with_max_suggestions(max_suggestions);
        Self { catalog, extractor, renderer, audit, validator, ready: AtomicBool::new(true) }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Stops accepting new requests. In-flight requests finish normally.
    pub fn shutdown(&self) {
        if self.ready.swap(false, Ordering::SeqCst) {
            info!(
                event_name = "pipeline.context.shutdown",
                correlation_id = "shutdown",
                "pipeline context shut down"
            );
        }
    }

    pub fn validator(&self) -> &OrderValidator {
        &self.validator
    }
}

pub struct OrderPipeline {
    context: Arc<PipelineContext>,
    flow: PipelineFlow,
}

impl OrderPipeline {
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self { context, flow: PipelineFlow }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    /// Extract, validate, render. Either every stage succeeds or one failure is returned.
    pub async fn process_order(
        &self,
        raw_email_text: &str,
        correlation_id: &str,
    ) -> Result<ProcessedOrder, PipelineFailure> {
        let audit = AuditContext::new(correlation_id, PIPELINE_ACTOR);
        let mut run = PipelineRun::start(self.flow);
        self.ensure_ready(&mut run, &audit)?;

        let catalog = match self.context.catalog.list_all().await {
            Ok(catalog) => catalog,
            Err(error) => {
                return Err(self.fail(
                    &mut run,
                    &audit,
                    FailureKind::InfrastructureFailure,
                    format!("catalog snapshot unavailable: {error}"),
                ));
            }
        };

        let extraction = match self.context.extractor.extract(raw_email_text, &catalog).await {
            Ok(extraction) => extraction,
            Err(error) => {
                return Err(self.fail(
                    &mut run,
                    &audit,
                    FailureKind::ExtractionFailure,
                    error.to_string(),
                ));
            }
        };
        self.advance(&mut run, &audit, PipelineEvent::ItemsExtracted, AuditCategory::Extraction)?;

        let order = self
            .context
            .validator
            .validate(
                &extraction.items,
                &extraction.delivery_preference,
                &extraction.customer_notes,
            )
            .await;
        self.advance(&mut run, &audit, PipelineEvent::OrderValidated, AuditCategory::Validation)?;

        let email_response = match self.context.renderer.render(&order).await {
            Ok(response) => response,
            Err(error) => {
                return Err(self.fail(
                    &mut run,
                    &audit,
                    FailureKind::RenderingFailure,
                    error.to_string(),
                ));
            }
        };
        self.advance(&mut run, &audit, PipelineEvent::ResponseRendered, AuditCategory::Rendering)?;

        Ok(ProcessedOrder { email_response, order_summary: order })
    }

    /// Second validation pass for an order about to be finalized.
    pub async fn confirm_order(
        &self,
        order: ValidatedOrder,
        correlation_id: &str,
    ) -> Result<ValidatedOrder, PipelineFailure> {
        let audit = AuditContext::new(correlation_id, PIPELINE_ACTOR);
        if !self.context.is_ready() {
            return Err(PipelineFailure::new(
                FailureKind::InfrastructureFailure,
                "pipeline context is not initialized",
            ));
        }

        let rechecked = order.validated_items.len();
        let confirmed = self.context.validator.confirm(order).await;
        self.context.audit.emit(
            AuditEvent::new(
                &audit,
                "pipeline.order_confirmed",
                AuditCategory::Validation,
                AuditOutcome::Success,
            )
            .with_metadata("rechecked", rechecked.to_string())
            .with_metadata("kept", confirmed.validated_items.len().to_string()),
        );
        Ok(confirmed)
    }

    fn ensure_ready(
        &self,
        run: &mut PipelineRun,
        audit: &AuditContext,
    ) -> Result<(), PipelineFailure> {
        if self.context.is_ready() {
            return Ok(());
        }
        Err(self.fail(
            run,
            audit,
            FailureKind::InfrastructureFailure,
            "pipeline context is not initialized".to_string(),
        ))
    }

    fn advance(
        &self,
        run: &mut PipelineRun,
        audit: &AuditContext,
        event: PipelineEvent,
        category: AuditCategory,
    ) -> Result<(), PipelineFailure> {
        let outcome = run.advance(event).map_err(|error| {
            PipelineFailure::new(FailureKind::InfrastructureFailure, error.to_string())
        })?;

        info!(
            event_name = "pipeline.stage.completed",
            correlation_id = %audit.correlation_id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            "pipeline stage completed"
        );
        self.context.audit.emit(
            AuditEvent::new(audit, "pipeline.stage_completed", category, AuditOutcome::Success)
                .with_metadata("from", outcome.from.as_str())
                .with_metadata("to", outcome.to.as_str()),
        );
        Ok(())
    }

    fn fail(
        &self,
        run: &mut PipelineRun,
        audit: &AuditContext,
        kind: FailureKind,
        detail: String,
    ) -> PipelineFailure {
        let stage = run.state();
        if let Err(error) = run.advance(PipelineEvent::StageFailed) {
            warn!(
                event_name = "pipeline.transition.rejected",
                correlation_id = %audit.correlation_id,
                error = %error,
                "pipeline failure transition rejected"
            );
        }

        warn!(
            event_name = "pipeline.failed",
            correlation_id = %audit.correlation_id,
            stage = stage.as_str(),
            kind = kind.as_str(),
            detail = %detail,
            "order pipeline failed"
        );
        self.context.audit.emit(
            AuditEvent::new(audit, "pipeline.failed", stage_category(stage), AuditOutcome::Failed)
                .with_metadata("stage", stage.as_str())
                .with_metadata("kind", kind.as_str())
                .with_metadata("detail", detail.clone()),
        );

        PipelineFailure::new(kind, detail)
    }
}

fn stage_category(stage: PipelineState) -> AuditCategory {
    match stage {
        PipelineState::Extracting => AuditCategory::Extraction,
        PipelineState::Validating => AuditCategory::Validation,
        PipelineState::Rendering => AuditCategory::Rendering,
        PipelineState::Done | PipelineState::Failed => AuditCategory::System,
    }
}

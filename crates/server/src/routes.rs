use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use orderly_core::errors::InterfaceError;
use orderly_core::pipeline::{OrderPipeline, ProcessedOrder};
use orderly_core::ValidatedOrder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
const MAX_CORRELATION_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<OrderPipeline>,
}

/// Request-scoped id, taken from `x-correlation-id` or freshly generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProcessOrderRequest {
    #[serde(default)]
    pub email_content: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConfirmOrderRequest {
    pub order_summary: ValidatedOrder,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConfirmOrderResponse {
    pub order_summary: ValidatedOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    pub kind: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self.0 {
            InterfaceError::Internal { .. } => self.0.user_message().to_string(),
            other => other.to_string(),
        };
        warn!(
            event_name = "http.request.failed",
            correlation_id = %self.0.correlation_id(),
            kind = self.0.kind(),
            status = status.as_u16(),
            error = %self.0,
            "request failed"
        );
        let body = ErrorBody {
            error: self.0.user_message().to_string(),
            details,
            kind: self.0.kind().to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/process-order", post(process_order))
        .route("/api/extract-order", post(process_order))
        .route("/api/confirm-order", post(confirm_order))
        .with_state(state)
        .layer(middleware::from_fn(assign_correlation_id))
}

async fn assign_correlation_id(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= MAX_CORRELATION_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(CorrelationId(correlation_id.clone()));
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

pub async fn process_order(
    State(state): State<ApiState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    payload: Result<Json<ProcessOrderRequest>, JsonRejection>,
) -> Result<Json<ProcessedOrder>, ApiError> {
    let email_content = payload
        .ok()
        .and_then(|Json(request)| request.email_content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| {
            ApiError(InterfaceError::bad_request("email_content is required", &correlation_id))
        })?;

    let processed = state
        .pipeline
        .process_order(&email_content, &correlation_id)
        .await
        .map_err(|failure| ApiError(InterfaceError::from_pipeline(failure, &correlation_id)))?;

    info!(
        event_name = "http.process_order.completed",
        correlation_id = %correlation_id,
        validated_items = processed.order_summary.validated_items.len(),
        issues = processed.order_summary.issues.len(),
        "order processed"
    );
    Ok(Json(processed))
}

pub async fn confirm_order(
    State(state): State<ApiState>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    payload: Result<Json<ConfirmOrderRequest>, JsonRejection>,
) -> Result<Json<ConfirmOrderResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError(InterfaceError::bad_request(
            format!("order_summary is required: {}", rejection.body_text()),
            &correlation_id,
        ))
    })?;

    let order_summary = state
        .pipeline
        .confirm_order(request.order_summary, &correlation_id)
        .await
        .map_err(|failure| ApiError(InterfaceError::from_pipeline(failure, &correlation_id)))?;

    info!(
        event_name = "http.confirm_order.completed",
        correlation_id = %correlation_id,
        validated_items = order_summary.validated_items.len(),
        issues = order_summary.issues.len(),
        "order confirmed"
    );
    Ok(Json(ConfirmOrderResponse { order_summary }))
}

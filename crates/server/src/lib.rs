pub mod bootstrap;
pub mod health;
pub mod routes;
pub mod telemetry;

#[cfg(test)]
mod test_support;

use axum::Router;

use crate::bootstrap::Application;
use crate::health::HealthState;
use crate::routes::ApiState;

/// Health and order routes on one listener.
pub fn router(app: &Application) -> Router {
    health::router(HealthState { db_pool: app.db_pool.clone(), context: app.context.clone() })
        .merge(routes::router(ApiState { pipeline: app.pipeline.clone() }))
}

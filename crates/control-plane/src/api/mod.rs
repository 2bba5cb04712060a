// HTTP API routes
//
// This module contains all HTTP route handlers for the public API.
// Each submodule handles a specific resource type with its own AppState.

pub mod alerts;
pub mod audit;
pub mod common;
pub mod devices;
pub mod floors;

use axum::Router;
use paperwatch_core::{FloorRegistry, ReconciliationEngine};
use std::sync::Arc;

// Re-export common types
pub use common::{ErrorResponse, ListResponse};

/// All API routes, unprefixed
pub fn routes(engine: ReconciliationEngine, floors: Arc<dyn FloorRegistry>) -> Router {
    Router::new()
        .merge(floors::routes(floors::AppState::new(floors)))
        .merge(devices::routes(devices::AppState::new(engine.clone())))
        .merge(alerts::routes(alerts::AppState::new(engine.clone())))
        .merge(audit::routes(audit::AppState::new(engine)))
}

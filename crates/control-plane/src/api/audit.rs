// Audit log HTTP routes

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use paperwatch_core::{AuditLogEntry, ReconciliationEngine};
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::{engine_error, ApiError, ErrorResponse, ListResponse};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for listing audit entries
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListAuditQuery {
    /// Maximum entries to return (default: 100, max: 1000).
    pub limit: Option<usize>,
}

/// App state for audit routes
#[derive(Clone)]
pub struct AppState {
    pub engine: ReconciliationEngine,
}

impl AppState {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }
}

/// Create audit log routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/audit-logs", get(list_audit_logs))
        .with_state(state)
}

/// GET /v1/audit-logs - Most recent audit entries first
#[utoipa::path(
    get,
    path = "/v1/audit-logs",
    params(ListAuditQuery),
    responses(
        (status = 200, description = "Audit log entries", body = ListResponse<AuditLogEntry>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<ListResponse<AuditLogEntry>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = state
        .engine
        .stores()
        .audit
        .list(limit)
        .await
        .map_err(|e| engine_error("Failed to list audit logs", e.into()))?;

    Ok(Json(ListResponse::new(entries)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use paperwatch_core::{
        AlertDraft, AuditAction, EngineConfig, InMemoryLocationDirectory, InMemoryStore, Stores,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_limit_is_applied() {
        let store = Arc::new(InMemoryStore::new());
        let alert = AlertDraft::reported_theft().into_alert("D1", "L".into(), chrono::Utc::now());
        for minutes in 0..5 {
            store.seed_audit(AuditLogEntry::for_alert(
                &alert,
                AuditAction::Created,
                alert.created_at + chrono::Duration::minutes(minutes),
                chrono::Duration::days(30),
            ));
        }
        let stores = Stores::from_backend(store, Arc::new(InMemoryLocationDirectory::new()));
        let app = routes(AppState::new(ReconciliationEngine::new(
            stores,
            EngineConfig::default(),
        )));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/audit-logs?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["action"], "created");
        assert!(data[0]["timestamp"].as_str() > data[1]["timestamp"].as_str());
    }
}

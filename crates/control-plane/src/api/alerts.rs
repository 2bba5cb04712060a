// Alert HTTP routes: listing and operator resolution

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use paperwatch_core::{Alert, AlertFilter, ReconciliationEngine};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{engine_error, ApiError, ErrorResponse, ListResponse};

/// Query parameters for listing alerts
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListAlertsQuery {
    /// Only alerts for this device.
    pub device_id: Option<String>,
    /// Include resolved alerts (default: false).
    #[serde(default)]
    pub include_resolved: bool,
}

/// App state for alert routes
#[derive(Clone)]
pub struct AppState {
    pub engine: ReconciliationEngine,
}

impl AppState {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }
}

/// Create alert routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/alerts", get(list_alerts))
        .route("/v1/alerts/:alert_id/resolve", post(resolve_alert))
        .with_state(state)
}

/// GET /v1/alerts - List alerts, newest first
#[utoipa::path(
    get,
    path = "/v1/alerts",
    params(ListAlertsQuery),
    responses(
        (status = 200, description = "List of alerts", body = ListResponse<Alert>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<ListResponse<Alert>>, ApiError> {
    let filter = AlertFilter {
        device_id: query.device_id,
        include_resolved: query.include_resolved,
    };
    let alerts = state
        .engine
        .stores()
        .alerts
        .list(filter)
        .await
        .map_err(|e| engine_error("Failed to list alerts", e.into()))?;

    Ok(Json(ListResponse::new(alerts)))
}

/// POST /v1/alerts/{alert_id}/resolve - Resolve an alert
///
/// Resolving a theft or malfunction alert returns the device to normal.
#[utoipa::path(
    post,
    path = "/v1/alerts/{alert_id}/resolve",
    params(
        ("alert_id" = Uuid, Path, description = "Alert ID")
    ),
    responses(
        (status = 200, description = "Alert resolved", body = Alert),
        (status = 404, description = "Alert not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<Alert>, ApiError> {
    let alert = state
        .engine
        .resolve_alert(alert_id)
        .await
        .map_err(|e| engine_error("Failed to resolve alert", e))?;

    Ok(Json(alert))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use paperwatch_core::{
        AlertDraft, DeviceStatus, EngineConfig, InMemoryLocationDirectory, InMemoryStore,
        ManualScheduler, Stores, TelemetryReport,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn engine() -> (Arc<InMemoryStore>, ReconciliationEngine) {
        let store = Arc::new(InMemoryStore::new());
        let stores = Stores::from_backend(store.clone(), Arc::new(InMemoryLocationDirectory::new()));
        let engine = ReconciliationEngine::new(stores, EngineConfig::default())
            .with_scheduler(Arc::new(ManualScheduler::new()));
        (store, engine)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_filters_by_device_and_resolution() {
        let (store, engine) = engine();
        let now = chrono::Utc::now();
        store.seed_alert(AlertDraft::reported_theft().into_alert("D1", "L".into(), now));
        store.seed_alert(AlertDraft::reported_malfunction().into_alert("D2", "L".into(), now));
        let mut resolved = AlertDraft::reported_malfunction().into_alert("D1", "L".into(), now);
        resolved.resolved = true;
        store.seed_alert(resolved);

        let app = routes(AppState::new(engine));
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/alerts?device_id=D1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/alerts?device_id=D1&include_resolved=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_resets_theft_device() {
        let (store, engine) = engine();
        let outcome = engine
            .ingest(TelemetryReport {
                device_id: "D1".into(),
                paper_present: true,
                reserve_count: Some(2),
                status: Some(DeviceStatus::Theft),
                name: None,
            })
            .await
            .unwrap();
        let alert_id = outcome.alerts_opened[0].id;

        let app = routes(AppState::new(engine.clone()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/alerts/{alert_id}/resolve"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["resolved"], true);

        let device = paperwatch_core::DeviceStore::get(store.as_ref(), "D1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(device.status, DeviceStatus::Normal);
    }

    #[tokio::test]
    async fn test_resolve_unknown_alert_is_404() {
        let (_, engine) = engine();
        let response = routes(AppState::new(engine))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/alerts/{}/resolve", Uuid::now_v7()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

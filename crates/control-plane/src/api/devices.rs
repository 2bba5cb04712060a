// Device HTTP routes: telemetry ingress, reads, location assignment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use paperwatch_core::{
    Device, DeviceStatus, EngineError, LocationRef, ReconcileOutcome, ReconciliationEngine,
    TelemetryReport,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{engine_error, ApiError, ErrorResponse, ListResponse};

/// Telemetry sent by a dispenser
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TelemetryRequest {
    /// Whether the main roll has paper.
    #[schema(example = false)]
    pub paper_present: bool,
    /// Reserve rolls left, when the firmware measures it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 1)]
    pub reserve_count: Option<u32>,
    /// Self-reported status. Only "theft" and "malfunction" have an effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "normal")]
    pub status: Option<String>,
    /// Stall label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Stall 3")]
    pub name: Option<String>,
}

impl TelemetryRequest {
    fn into_report(self, device_id: String) -> TelemetryReport {
        TelemetryReport {
            device_id,
            paper_present: self.paper_present,
            reserve_count: self.reserve_count,
            status: self.status.as_deref().map(DeviceStatus::from),
            name: self.name,
        }
    }
}

/// App state for device routes
#[derive(Clone)]
pub struct AppState {
    pub engine: ReconciliationEngine,
}

impl AppState {
    pub fn new(engine: ReconciliationEngine) -> Self {
        Self { engine }
    }
}

/// Create device routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/devices", get(list_devices))
        .route("/v1/devices/:device_id", get(get_device))
        .route("/v1/devices/:device_id/telemetry", post(ingest_telemetry))
        .route(
            "/v1/devices/:device_id/location",
            put(assign_location).delete(unassign_location),
        )
        .with_state(state)
}

/// POST /v1/devices/{device_id}/telemetry - Reconcile a telemetry report
#[utoipa::path(
    post,
    path = "/v1/devices/{device_id}/telemetry",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    request_body = TelemetryRequest,
    responses(
        (status = 200, description = "Report reconciled", body = ReconcileOutcome),
        (status = 400, description = "Invalid telemetry", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "devices"
)]
pub async fn ingest_telemetry(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(req): Json<TelemetryRequest>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let outcome = state
        .engine
        .ingest(req.into_report(device_id))
        .await
        .map_err(|e| engine_error("Failed to reconcile telemetry", e))?;

    Ok(Json(outcome))
}

/// GET /v1/devices - List all devices
#[utoipa::path(
    get,
    path = "/v1/devices",
    responses(
        (status = 200, description = "List of devices", body = ListResponse<Device>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "devices"
)]
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Device>>, ApiError> {
    let devices = state
        .engine
        .stores()
        .devices
        .list()
        .await
        .map_err(|e| engine_error("Failed to list devices", e.into()))?;

    Ok(Json(ListResponse::new(devices)))
}

/// GET /v1/devices/{device_id} - Get device by ID
#[utoipa::path(
    get,
    path = "/v1/devices/{device_id}",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Device found", body = Device),
        (status = 404, description = "Device not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "devices"
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    state
        .engine
        .stores()
        .devices
        .get(&device_id)
        .await
        .map_err(|e| engine_error("Failed to get device", e.into()))?
        .map(Json)
        .ok_or_else(|| engine_error("", EngineError::DeviceNotFound(device_id)))
}

/// PUT /v1/devices/{device_id}/location - Assign a device to a floor and area
#[utoipa::path(
    put,
    path = "/v1/devices/{device_id}/location",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    request_body = LocationRef,
    responses(
        (status = 200, description = "Location assigned", body = Device),
        (status = 404, description = "Device not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "devices"
)]
pub async fn assign_location(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(location): Json<LocationRef>,
) -> Result<Json<Device>, ApiError> {
    let device = state
        .engine
        .set_location(&device_id, Some(location))
        .await
        .map_err(|e| engine_error("Failed to assign location", e))?;

    Ok(Json(device))
}

/// DELETE /v1/devices/{device_id}/location - Unassign a device; its state is kept
#[utoipa::path(
    delete,
    path = "/v1/devices/{device_id}/location",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Location cleared", body = Device),
        (status = 404, description = "Device not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "devices"
)]
pub async fn unassign_location(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    let device = state
        .engine
        .set_location(&device_id, None)
        .await
        .map_err(|e| engine_error("Failed to clear location", e))?;

    Ok(Json(device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use paperwatch_core::{
        EngineConfig, InMemoryLocationDirectory, InMemoryStore, ManualScheduler, Stores,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(InMemoryStore::new());
        let stores = Stores::from_backend(store, Arc::new(InMemoryLocationDirectory::new()));
        let engine = ReconciliationEngine::new(stores, EngineConfig::default())
            .with_scheduler(Arc::new(ManualScheduler::new()));
        routes(AppState::new(engine))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_telemetry_creates_device() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/devices/D1/telemetry",
                serde_json::json!({"paper_present": true, "reserve_count": 2, "status": "whatever"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["device"]["id"], "D1");
        assert_eq!(body["device"]["status"], "normal");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/devices/D1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_theft_report_returns_alert() {
        let app = app();
        let response = app
            .oneshot(post_json(
                "/v1/devices/D1/telemetry",
                serde_json::json!({"paper_present": true, "status": "theft"}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["alerts_opened"][0]["alert_type"], "theft");
        assert_eq!(body["alerts_opened"][0]["severity"], "critical");
    }

    #[tokio::test]
    async fn test_unknown_device_is_404() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/v1/devices/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_location_assign_and_clear() {
        let app = app();
        app.clone()
            .oneshot(post_json(
                "/v1/devices/D1/telemetry",
                serde_json::json!({"paper_present": true}),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/v1/devices/D1/location")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"floor_id":"f1","area_id":"a1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["location"]["floor_id"], "f1");

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/devices/D1/location")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["location"].is_null());
    }
}

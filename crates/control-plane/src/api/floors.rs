// Floor HTTP routes: the facility layout behind alert location names

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use paperwatch_core::{Area, Floor, FloorRegistry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::common::{engine_error, ApiError, ErrorResponse, ListResponse};

/// Request to create or replace a floor
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PutFloorRequest {
    /// Display name of the floor.
    #[schema(example = "1F")]
    pub name: String,
    /// Restroom areas on this floor.
    #[serde(default)]
    pub areas: Vec<Area>,
}

/// App state for floor routes
#[derive(Clone)]
pub struct AppState {
    pub floors: Arc<dyn FloorRegistry>,
}

impl AppState {
    pub fn new(floors: Arc<dyn FloorRegistry>) -> Self {
        Self { floors }
    }
}

/// Create floor routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/floors", get(list_floors))
        .route("/v1/floors/:floor_id", put(put_floor))
        .with_state(state)
}

/// GET /v1/floors - List floors with their areas
#[utoipa::path(
    get,
    path = "/v1/floors",
    responses(
        (status = 200, description = "List of floors", body = ListResponse<Floor>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "floors"
)]
pub async fn list_floors(
    State(state): State<AppState>,
) -> Result<Json<ListResponse<Floor>>, ApiError> {
    let floors = state
        .floors
        .list_floors()
        .await
        .map_err(|e| engine_error("Failed to list floors", e.into()))?;

    Ok(Json(ListResponse::new(floors)))
}

/// PUT /v1/floors/{floor_id} - Create or replace a floor
#[utoipa::path(
    put,
    path = "/v1/floors/{floor_id}",
    params(
        ("floor_id" = String, Path, description = "Floor ID")
    ),
    request_body = PutFloorRequest,
    responses(
        (status = 200, description = "Floor stored", body = Floor),
        (status = 400, description = "Invalid floor", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "floors"
)]
pub async fn put_floor(
    State(state): State<AppState>,
    Path(floor_id): Path<String>,
    Json(req): Json<PutFloorRequest>,
) -> Result<Json<Floor>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ErrorResponse::new("Floor name must not be empty")
            .into_response(StatusCode::BAD_REQUEST));
    }

    let floor = Floor {
        id: floor_id,
        name: req.name,
        areas: req.areas,
    };
    state
        .floors
        .put_floor(floor.clone())
        .await
        .map_err(|e| engine_error("Failed to store floor", e.into()))?;
    tracing::info!(floor_id = %floor.id, areas = floor.areas.len(), "Floor stored");

    Ok(Json(floor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use paperwatch_core::InMemoryLocationDirectory;
    use tower::ServiceExt;

    fn put(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_then_list() {
        let app = routes(AppState::new(Arc::new(InMemoryLocationDirectory::new())));

        let response = app
            .clone()
            .oneshot(put(
                "/v1/floors/f1",
                serde_json::json!({ "name": "1F", "areas": [{ "id": "a1", "name": "Lobby" }] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/v1/floors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["data"][0]["id"], "f1");
        assert_eq!(body["data"][0]["areas"][0]["name"], "Lobby");
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let app = routes(AppState::new(Arc::new(InMemoryLocationDirectory::new())));
        let response = app
            .oneshot(put("/v1/floors/f1", serde_json::json!({ "name": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

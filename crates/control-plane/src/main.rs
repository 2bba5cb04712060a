// PaperWatch API server
// Decision: One process hosts telemetry ingress, operator APIs, sweep loops and notification dispatch
// Decision: Theft confirmations run in-process and are drained on shutdown

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Json, Router};
use paperwatch_control_plane::api;
use paperwatch_control_plane::config::ServerConfig;
use paperwatch_control_plane::openapi::ApiDoc;
use paperwatch_control_plane::sweeps::{SweepIntervals, SweepRunner};
use paperwatch_control_plane::webhook::WebhookNotifier;
use paperwatch_core::{
    init_telemetry, ChannelAlertEmitter, EngineConfig, Floor, FloorRegistry,
    InMemoryLocationDirectory, InMemoryStore, LogNotifier, NotificationDispatcher, Notifier,
    ReconciliationEngine, RetryPolicy, StaticRecipients, Stores, TelemetryConfig, TokioScheduler,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "paperwatch_core=info,tower_http=info")
    // - LOG_FORMAT: "json" for JSON lines
    let mut telemetry_config =
        TelemetryConfig::from_env().with_service_name("paperwatch-control-plane");
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter =
            Some("info,paperwatch_core=info,tower_http=info".to_string());
    }
    init_telemetry(telemetry_config).context("Failed to initialize logging")?;

    tracing::info!("paperwatch-control-plane starting...");

    let engine_config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let server_config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        empty_alert_delay_secs = engine_config.empty_alert_delay.num_seconds(),
        offline_threshold_secs = engine_config.offline_threshold.num_seconds(),
        retention_days = engine_config.retention_window.num_days(),
        "Engine configured"
    );

    // Stores
    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(InMemoryLocationDirectory::new());
    if let Some(path) = &server_config.floors_file {
        let floors = load_floors(path).await?;
        tracing::info!(path = %path.display(), floors = floors.len(), "Loaded floor layout");
        for floor in floors {
            directory.put_floor(floor).await?;
        }
    }
    let stores = Stores::from_backend(store, directory.clone());
    tracing::info!("Using in-memory stores");

    // Notification pipeline
    let (emitter, alert_rx) = ChannelAlertEmitter::channel();
    let notifier: Arc<dyn Notifier> = match &server_config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Webhook notifications enabled");
            Arc::new(WebhookNotifier::new(url.clone()).context("Failed to build webhook client")?)
        }
        None => {
            tracing::info!("NOTIFY_WEBHOOK_URL not set, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };
    let recipients = StaticRecipients::from_list(&server_config.notify_recipients);
    if recipients.is_empty() {
        tracing::warn!("NOTIFY_RECIPIENTS is empty, alerts will not be marked notified");
    }
    let dispatcher = Arc::new(
        NotificationDispatcher::new(stores.clone(), Arc::new(recipients), notifier)
            .with_retry(
                RetryPolicy::exponential().with_max_attempts(server_config.notify_max_attempts),
            )
            .with_retention(engine_config.retention_window),
    );

    // Engine
    let scheduler = Arc::new(TokioScheduler::new());
    let engine = ReconciliationEngine::new(stores, engine_config)
        .with_scheduler(scheduler.clone())
        .with_emitter(Arc::new(emitter));

    // Background tasks. The dispatcher stops last so confirmations that
    // fire during the drain still get delivered.
    let (sweeps_tx, sweeps_rx) = watch::channel(false);
    let (dispatch_tx, dispatch_rx) = watch::channel(false);
    let dispatcher_handle = tokio::spawn(dispatcher.run(alert_rx, dispatch_rx));
    let sweeps = SweepRunner::start(
        engine.clone(),
        SweepIntervals::from(&server_config),
        sweeps_rx,
    );

    let app = build_app(engine, directory, &server_config);

    let listener = tokio::net::TcpListener::bind(server_config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", server_config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Received shutdown signal");
        })
        .await
        .context("Server error")?;

    let _ = sweeps_tx.send(true);
    sweeps.join().await;
    tracing::info!(
        in_flight = scheduler.in_flight(),
        "Draining pending theft confirmations"
    );
    scheduler.drain().await;
    let _ = dispatch_tx.send(true);
    if let Err(e) = dispatcher_handle.await {
        tracing::error!(error = %e, "Notification dispatcher panicked");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Read a JSON array of floors
async fn load_floors(path: &Path) -> Result<Vec<Floor>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read floors file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid floors file {}", path.display()))
}

/// Assemble routes, docs and middleware
fn build_app(
    engine: ReconciliationEngine,
    floors: Arc<dyn FloorRegistry>,
    config: &ServerConfig,
) -> Router {
    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    // Health is never prefixed
    let app = Router::new()
        .route("/health", get(health))
        .merge(mount_api(api::routes(engine, floors), &config.api_prefix))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let app = if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    };

    app.layer(TraceLayer::new_for_http())
}

/// API routes under `API_PREFIX`; an empty prefix mounts them at the root
fn mount_api(routes: Router, prefix: &str) -> Router {
    match prefix.trim_end_matches('/') {
        "" => routes,
        prefix => Router::new().nest(prefix, routes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use paperwatch_core::ManualScheduler;
    use tower::ServiceExt;

    fn app_with_prefix(prefix: &str) -> Router {
        let stores = Stores::from_backend(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryLocationDirectory::new()),
        );
        let engine = ReconciliationEngine::new(stores, EngineConfig::default())
            .with_scheduler(Arc::new(ManualScheduler::new()));
        let config = ServerConfig {
            api_prefix: prefix.to_string(),
            ..Default::default()
        };
        build_app(engine, Arc::new(InMemoryLocationDirectory::new()), &config)
    }

    async fn status_of(app: &Router, uri: &str) -> StatusCode {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_routes_unprefixed_by_default() {
        let app = app_with_prefix("");
        assert_eq!(status_of(&app, "/v1/devices").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/v1/floors").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/api/v1/devices").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_prefix_nests_api_but_not_health() {
        let app = app_with_prefix("/api");
        assert_eq!(status_of(&app, "/api/v1/alerts").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/v1/alerts").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(&app, "/health").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/api/health").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let response = app_with_prefix("")
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_trailing_slash_in_prefix_is_ignored() {
        let app = app_with_prefix("/api/");
        assert_eq!(status_of(&app, "/api/v1/devices").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let app = app_with_prefix("");
        assert_eq!(status_of(&app, "/api-doc/openapi.json").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_load_floors() {
        let path = std::env::temp_dir().join(format!("paperwatch-floors-{}.json", std::process::id()));
        tokio::fs::write(
            &path,
            r#"[{"id": "f1", "name": "1F", "areas": [{"id": "lobby", "name": "Lobby"}]}]"#,
        )
        .await
        .unwrap();
        let floors = load_floors(&path).await.unwrap();
        assert_eq!(floors.len(), 1);
        assert_eq!(floors[0].areas[0].name, "Lobby");

        tokio::fs::write(&path, "{not json").await.unwrap();
        assert!(load_floors(&path).await.is_err());
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(load_floors(&path).await.is_err());
    }
}

// OpenAPI document generation
//
// This module defines the OpenAPI document for the PaperWatch API.
// It can be used by both the main API server (for Swagger UI)
// and the export-openapi binary (for static document generation).

use crate::api;
use crate::api::{ErrorResponse, ListResponse};
use paperwatch_core::{
    Alert, AlertSeverity, AlertType, Area, AuditAction, AuditLogEntry, Device, DeviceStatus,
    Floor, LocationRef, ReconcileOutcome, TheftCheck,
};
use utoipa::OpenApi;

/// OpenAPI documentation for the PaperWatch API
#[derive(OpenApi)]
#[openapi(
    paths(
        api::devices::ingest_telemetry,
        api::devices::list_devices,
        api::devices::get_device,
        api::devices::assign_location,
        api::devices::unassign_location,
        api::alerts::list_alerts,
        api::alerts::resolve_alert,
        api::audit::list_audit_logs,
        api::floors::list_floors,
        api::floors::put_floor,
    ),
    components(
        schemas(
            Device, DeviceStatus, LocationRef,
            Alert, AlertType, AlertSeverity,
            AuditLogEntry, AuditAction,
            Floor, Area,
            api::floors::PutFloorRequest,
            ReconcileOutcome, TheftCheck,
            api::devices::TelemetryRequest,
            ErrorResponse,
            ListResponse<Device>,
            ListResponse<Alert>,
            ListResponse<AuditLogEntry>,
            ListResponse<Floor>,
        )
    ),
    tags(
        (name = "devices", description = "Telemetry ingress and device state"),
        (name = "alerts", description = "Alert listing and resolution"),
        (name = "audit", description = "Alert lifecycle audit log"),
        (name = "floors", description = "Facility layout used for alert locations")
    ),
    info(
        title = "PaperWatch API",
        version = "0.1.0",
        description = "Supply alerting for networked paper dispensers",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI document as a pretty-printed JSON string
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}

//! Device-state reconciliation engine
//!
//! Consumes telemetry updates and scheduled ticks, decides whether a device's
//! status must change, and opens, suppresses or auto-resolves alerts.
//!
//! ```text
//! telemetry ──► ingest ──► plan_update (pure) ──► one WriteBatch ──► commit
//!                                   │                                  │
//!                                   └── TheftCheck ──► run_after ──► confirm (fresh read)
//!
//! tick ──► offline_sweep / stale_empty_sweep / retention_sweep
//! ```
//!
//! Every alert-opening path goes through the dedup helpers in `alerts`, so at
//! most one unresolved alert exists per `(device_id, alert_type)`.

mod alerts;
mod confirmation;
mod rules;
mod sweep;

pub use confirmation::{ConfirmationOutcome, TheftCheck};
pub use rules::{is_offline_due, plan_update, stale_empty_draft, UpdatePlan};
pub use sweep::SweepReport;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::alert::Alert;
use crate::config::EngineConfig;
use crate::device::{Device, DevicePatch, TelemetryReport};
use crate::error::{EngineError, Result};
use crate::notify::{AlertEmitter, NoopAlertEmitter};
use crate::scheduler::{DeferredScheduler, TokioScheduler};
use crate::traits::{Clock, Stores, SystemClock, WriteBatch, WriteOp};

/// Result of one reconciliation pass
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReconcileOutcome {
    /// Device state after the pass
    pub device: Device,
    /// Alerts created by this pass
    pub alerts_opened: Vec<Alert>,
    /// Alerts auto-resolved by this pass
    pub alerts_resolved: Vec<Uuid>,
    /// Theft confirmation scheduled by this pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<TheftCheck>,
}

/// The alerting state machine
///
/// Cheap to clone: every dependency is shared. Deferred confirmations hold a
/// clone of the engine.
#[derive(Clone)]
pub struct ReconciliationEngine {
    stores: Stores,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn DeferredScheduler>,
    emitter: Arc<dyn AlertEmitter>,
}

impl ReconciliationEngine {
    /// Create an engine with wall-clock time, tokio-backed confirmations and
    /// no notification emitter.
    pub fn new(stores: Stores, config: EngineConfig) -> Self {
        Self {
            stores,
            config,
            clock: Arc::new(SystemClock),
            scheduler: Arc::new(TokioScheduler::new()),
            emitter: Arc::new(NoopAlertEmitter),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn DeferredScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn AlertEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Handle an incoming telemetry report.
    ///
    /// Unknown devices are created on first sighting.
    #[instrument(skip(self, report), fields(device_id = %report.device_id))]
    pub async fn ingest(&self, report: TelemetryReport) -> Result<ReconcileOutcome> {
        if report.device_id.trim().is_empty() {
            return Err(EngineError::InvalidTelemetry(
                "device_id must not be empty".to_string(),
            ));
        }

        let now = self.clock.now();
        let old = match self.stores.devices.get(&report.device_id).await? {
            Some(device) => device,
            None => {
                debug!("First sighting, creating device record");
                Device::first_sighting(&report, now)
            }
        };
        let new = old.with_report(&report, now);
        self.reconcile(&old, new).await
    }

    /// Run the reconciliation rules for an `(old, new)` state pair and commit
    /// the result as one batch.
    ///
    /// Callable from any ingress that already has both states (for example a
    /// store change feed). Replaying the same pair opens no duplicate alerts.
    #[instrument(skip(self, old, new), fields(device_id = %new.id))]
    pub async fn reconcile(&self, old: &Device, new: Device) -> Result<ReconcileOutcome> {
        let now = self.clock.now();
        let plan = plan_update(old, &new, now, &self.config);

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutDevice(plan.device.clone()));
        for draft in plan.open {
            self.stage_open_alert(&mut batch, &plan.device, draft, now)
                .await?;
        }
        for alert_type in plan.resolve {
            self.stage_auto_resolve(&mut batch, &plan.device.id, alert_type, now)
                .await?;
        }

        let outcome = self.commit(batch).await?;

        // Only after the pass is durable: a slow confirmation must never hold
        // back or reorder the writes above.
        if let Some(check) = plan.theft_check.clone() {
            self.schedule_confirmation(check);
        }

        Ok(ReconcileOutcome {
            device: plan.device,
            alerts_opened: outcome.created_alerts,
            alerts_resolved: outcome.resolved_alerts,
            confirmation: plan.theft_check,
        })
    }

    /// Assign or unassign a device's location without touching its state.
    pub async fn set_location(
        &self,
        device_id: &str,
        location: Option<crate::device::LocationRef>,
    ) -> Result<Device> {
        self.stores
            .devices
            .upsert(
                device_id,
                DevicePatch {
                    location: Some(location),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| EngineError::DeviceNotFound(device_id.to_string()))
    }
}

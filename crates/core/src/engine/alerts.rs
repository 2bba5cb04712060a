// Alert lifecycle helpers shared by every engine path
//
// Opening always goes through find_open first; the batch writer re-checks the
// same condition at commit time, so a concurrent duplicate is skipped rather
// than inserted.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ReconciliationEngine;
use crate::alert::{Alert, AlertDraft, AlertType};
use crate::audit::{AuditAction, AuditLogEntry};
use crate::device::{Device, DevicePatch, DeviceStatus};
use crate::error::{EngineError, Result};
use crate::traits::{BatchOutcome, WriteBatch, WriteOp};

impl ReconciliationEngine {
    /// Stage a new alert unless one of the same type is already open.
    ///
    /// Returns whether an open op was staged.
    pub(crate) async fn stage_open_alert(
        &self,
        batch: &mut WriteBatch,
        device: &Device,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if let Some(existing) = self
            .stores
            .alerts
            .find_open(&device.id, draft.alert_type)
            .await?
        {
            debug!(
                device_id = %device.id,
                alert_type = %draft.alert_type,
                existing_alert_id = %existing.id,
                "Alert suppressed, one is already open"
            );
            return Ok(false);
        }

        let location = self.location_label(device).await;
        let alert = draft.into_alert(&device.id, location, now);
        let audit = AuditLogEntry::for_alert(
            &alert,
            AuditAction::Created,
            now,
            self.config.retention_window,
        );
        batch.push(WriteOp::OpenAlert { alert, audit });
        Ok(true)
    }

    /// Place name for alert text, falling back to the device name and then
    /// its id. Lookup failures never block alert creation.
    async fn location_label(&self, device: &Device) -> String {
        match self.stores.locations.resolve(device).await {
            Ok(Some(label)) if !label.trim().is_empty() => label,
            Ok(_) => device.display_name().to_string(),
            Err(e) => {
                warn!(
                    device_id = %device.id,
                    error = %e,
                    "Location lookup failed, using device name"
                );
                device.display_name().to_string()
            }
        }
    }

    /// Stage resolution of the open alert of `alert_type`, if there is one.
    pub(crate) async fn stage_auto_resolve(
        &self,
        batch: &mut WriteBatch,
        device_id: &str,
        alert_type: AlertType,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(alert) = self.stores.alerts.find_open(device_id, alert_type).await? {
            let audit = AuditLogEntry::for_alert(
                &alert,
                AuditAction::Resolved,
                now,
                self.config.retention_window,
            );
            batch.push(WriteOp::ResolveAlert {
                id: alert.id,
                at: now,
                audit,
            });
        }
        Ok(())
    }

    /// Commit a batch and hand every created alert to the emitter.
    pub(crate) async fn commit(&self, batch: WriteBatch) -> Result<BatchOutcome> {
        let outcome = self.stores.batch.commit(batch).await?;

        for alert in &outcome.created_alerts {
            info!(
                alert_id = %alert.id,
                device_id = %alert.device_id,
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                "Alert opened"
            );
            self.emitter.alert_created(alert);
        }
        for id in &outcome.resolved_alerts {
            info!(alert_id = %id, "Alert resolved");
        }
        if !outcome.skipped_alerts.is_empty() {
            debug!(
                skipped = outcome.skipped_alerts.len(),
                "Duplicate alerts skipped at commit"
            );
        }

        Ok(outcome)
    }

    /// Operator resolution of an alert.
    ///
    /// Resolving a theft or malfunction alert also returns the device to
    /// normal if it is still in that fault state. Resolving twice is a no-op.
    #[instrument(skip(self))]
    pub async fn resolve_alert(&self, alert_id: Uuid) -> Result<Alert> {
        let alert = self
            .stores
            .alerts
            .get(alert_id)
            .await?
            .ok_or(EngineError::AlertNotFound(alert_id))?;

        if alert.resolved {
            debug!("Alert already resolved");
            return Ok(alert);
        }

        let now = self.clock.now();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::ResolveAlert {
            id: alert.id,
            at: now,
            audit: AuditLogEntry::for_alert(
                &alert,
                AuditAction::Resolved,
                now,
                self.config.retention_window,
            ),
        });

        // Only the fault this alert reports is cleared; another open fault keeps its status
        if let Some(fault) = alert.alert_type.fault_status() {
            if let Some(device) = self.stores.devices.get(&alert.device_id).await? {
                if device.status == fault {
                    batch.push(WriteOp::PatchDevice {
                        id: device.id,
                        patch: DevicePatch::status(DeviceStatus::Normal),
                    });
                }
            }
        }

        self.commit(batch).await?;

        self.stores
            .alerts
            .get(alert_id)
            .await?
            .ok_or(EngineError::AlertNotFound(alert_id))
    }
}

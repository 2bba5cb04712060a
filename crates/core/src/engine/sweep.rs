// Scheduled sweeps
//
// Each sweep scans devices (or audit rows) and reconciles them one at a time.
// A failure on one device is logged and counted; the sweep moves on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::rules::{is_offline_due, stale_empty_draft};
use super::ReconciliationEngine;
use crate::alert::AlertDraft;
use crate::device::{Device, DevicePatch, DeviceStatus};
use crate::error::Result;
use crate::traits::{WriteBatch, WriteOp};

/// Counters for one sweep run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SweepReport {
    /// Records examined
    pub scanned: usize,
    /// Devices whose status changed
    pub updated: usize,
    pub alerts_opened: usize,
    /// Devices that could not be reconciled this run
    pub failed: usize,
    /// Audit rows deleted
    pub purged: usize,
}

impl ReconciliationEngine {
    /// Mark devices offline whose last report is older than the threshold.
    #[instrument(skip(self))]
    pub async fn offline_sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let devices = self.stores.devices.list().await?;
        let mut report = SweepReport {
            scanned: devices.len(),
            ..Default::default()
        };

        for device in devices {
            if !is_offline_due(&device, now, &self.config) {
                continue;
            }
            let draft = AlertDraft::communication_lost(self.config.offline_threshold);
            let patch = DevicePatch {
                online: Some(false),
                status: Some(DeviceStatus::Offline),
                ..Default::default()
            };
            self.apply_sweep_change(&device, patch, draft, now, &mut report)
                .await;
        }

        info!(
            scanned = report.scanned,
            updated = report.updated,
            alerts_opened = report.alerts_opened,
            failed = report.failed,
            "Offline sweep complete"
        );
        Ok(report)
    }

    /// Open Empty alerts for devices that stayed out of paper past the dwell
    /// time without any new report.
    #[instrument(skip(self))]
    pub async fn stale_empty_sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let devices = self.stores.devices.list().await?;
        let mut report = SweepReport {
            scanned: devices.len(),
            ..Default::default()
        };

        for device in devices {
            let Some(draft) = stale_empty_draft(&device, now, &self.config) else {
                continue;
            };
            let patch = DevicePatch::status(DeviceStatus::Empty);
            self.apply_sweep_change(&device, patch, draft, now, &mut report)
                .await;
        }

        info!(
            scanned = report.scanned,
            updated = report.updated,
            alerts_opened = report.alerts_opened,
            failed = report.failed,
            "Stale-empty sweep complete"
        );
        Ok(report)
    }

    /// Delete audit rows older than the retention window, bounded per run.
    #[instrument(skip(self))]
    pub async fn retention_sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub_signed(self.config.retention_window) else {
            debug!("Retention window reaches past the earliest timestamp, nothing to purge");
            return Ok(SweepReport::default());
        };
        let limit = self.config.retention_purge_limit;

        let purged = self.stores.audit.delete_older_than(cutoff, limit).await?;
        if purged >= limit {
            info!(purged, %cutoff, "Retention limit reached, more rows remain for the next run");
        } else {
            info!(purged, %cutoff, "Retention sweep complete");
        }

        Ok(SweepReport {
            scanned: purged,
            purged,
            ..Default::default()
        })
    }

    async fn apply_sweep_change(
        &self,
        device: &Device,
        patch: DevicePatch,
        draft: AlertDraft,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) {
        let alert_type = draft.alert_type;
        match self.sweep_one(device, patch, draft, now).await {
            Ok(opened) => {
                report.updated += 1;
                report.alerts_opened += opened;
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    device_id = %device.id,
                    alert_type = %alert_type,
                    error = %e,
                    "Sweep could not reconcile device"
                );
            }
        }
    }

    async fn sweep_one(
        &self,
        device: &Device,
        patch: DevicePatch,
        draft: AlertDraft,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PatchDevice {
            id: device.id.clone(),
            patch,
        });
        self.stage_open_alert(&mut batch, device, draft, now)
            .await?;
        let outcome = self.commit(batch).await?;
        Ok(outcome.created_alerts.len())
    }
}

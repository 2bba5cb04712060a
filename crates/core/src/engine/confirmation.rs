// Delayed theft confirmation
//
// A reserve drop is only a theft candidate. The confirmation runs after a fixed
// delay, re-reads the device and re-evaluates the predicate against what is
// true now. There is no cancel path: a confirmation that fires after the
// condition cleared is a no-op.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::ReconciliationEngine;
use crate::alert::{Alert, AlertDraft};
use crate::config::EngineConfig;
use crate::device::{Device, DevicePatch, DeviceStatus};
use crate::error::Result;
use crate::traits::{WriteBatch, WriteOp};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// A suspected theft waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TheftCheck {
    /// Reserve dropped while the main roll was empty
    MainSupplyEmpty { device_id: String },
    /// Reserve dropped while paper was still available
    UnreturnedReserve {
        device_id: String,
        /// Reserve count before the drop
        baseline_reserve: u32,
    },
}

impl TheftCheck {
    pub fn device_id(&self) -> &str {
        match self {
            TheftCheck::MainSupplyEmpty { device_id }
            | TheftCheck::UnreturnedReserve { device_id, .. } => device_id,
        }
    }

    pub fn delay(&self, config: &EngineConfig) -> Duration {
        match self {
            TheftCheck::MainSupplyEmpty { .. } => config.theft_confirm_delay_short,
            TheftCheck::UnreturnedReserve { .. } => config.theft_confirm_delay_long,
        }
    }

    /// Whether the freshly read device still matches the suspicion
    pub fn still_suspicious(&self, device: &Device) -> bool {
        match self {
            TheftCheck::MainSupplyEmpty { .. } => !device.paper_present,
            TheftCheck::UnreturnedReserve {
                baseline_reserve, ..
            } => device.paper_present && device.reserve_count < *baseline_reserve,
        }
    }

    fn draft(&self) -> AlertDraft {
        match self {
            TheftCheck::MainSupplyEmpty { .. } => AlertDraft::reserve_taken_while_empty(),
            TheftCheck::UnreturnedReserve { .. } => AlertDraft::unreturned_reserve(),
        }
    }
}

/// Result of running a confirmation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    /// Suspicion held; device set to theft. `alert` is `None` when an open
    /// theft alert already existed.
    Confirmed { alert: Option<Alert> },
    /// Condition no longer holds
    Cleared,
    /// Device was already in theft status
    AlreadyTheft,
    /// Device record no longer exists
    DeviceMissing,
}

impl ReconciliationEngine {
    /// Queue a confirmation on the deferred scheduler.
    ///
    /// Called only after the triggering pass has committed.
    pub fn schedule_confirmation(&self, check: TheftCheck) {
        let delay = check.delay(&self.config);
        info!(
            device_id = %check.device_id(),
            delay_secs = delay.as_secs(),
            check = ?check,
            "Theft candidate, confirmation scheduled"
        );

        let engine = self.clone();
        self.scheduler.run_after(
            delay,
            Box::pin(async move {
                let device_id = check.device_id().to_string();
                if let Err(e) = engine.confirm(check).await {
                    warn!(%device_id, error = %e, "Theft confirmation failed");
                }
            }),
        );
    }

    /// Re-read the device and open a theft alert if the suspicion still holds.
    #[instrument(skip(self), fields(device_id = %check.device_id()))]
    pub async fn confirm(&self, check: TheftCheck) -> Result<ConfirmationOutcome> {
        let Some(device) = self.stores.devices.get(check.device_id()).await? else {
            info!("Device gone before confirmation, nothing to do");
            return Ok(ConfirmationOutcome::DeviceMissing);
        };

        if device.status == DeviceStatus::Theft {
            return Ok(ConfirmationOutcome::AlreadyTheft);
        }

        if !check.still_suspicious(&device) {
            info!(
                paper_present = device.paper_present,
                reserve_count = device.reserve_count,
                "Theft suspicion cleared"
            );
            return Ok(ConfirmationOutcome::Cleared);
        }

        let now = self.clock.now();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PatchDevice {
            id: device.id.clone(),
            patch: DevicePatch::status(DeviceStatus::Theft),
        });
        self.stage_open_alert(&mut batch, &device, check.draft(), now)
            .await?;

        let outcome = self.commit(batch).await?;
        Ok(ConfirmationOutcome::Confirmed {
            alert: outcome.created_alerts.into_iter().next(),
        })
    }
}

// Pure rule evaluation for one telemetry update
//
// Rules run in a fixed order and several can fire on the same update. Nothing
// here touches a store: the engine turns an UpdatePlan into reads and writes.

use chrono::{DateTime, Utc};

use super::confirmation::TheftCheck;
use crate::alert::{AlertDraft, AlertType};
use crate::config::EngineConfig;
use crate::device::{Device, DeviceStatus};

/// Decisions derived from an `(old, new)` device pair
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// Device state to persist
    pub device: Device,
    /// Alerts to open (dedup-checked by the engine)
    pub open: Vec<AlertDraft>,
    /// Alert types to auto-resolve for this device
    pub resolve: Vec<AlertType>,
    /// Deferred theft confirmation to schedule after the commit
    pub theft_check: Option<TheftCheck>,
}

/// Evaluate the reconciliation rules for one update.
pub fn plan_update(
    old: &Device,
    new: &Device,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> UpdatePlan {
    let mut device = new.clone();
    let mut open = Vec::new();
    let mut resolve = Vec::new();

    // Only fault self-reports travel in `new.status`; anything else keeps the
    // stored status and is left to the rules below.
    if !new.status.is_self_reported_fault() {
        device.status = old.status;
    }

    // 1. Explicit report
    if new.status.is_self_reported_fault() && new.status != old.status {
        open.push(match new.status {
            DeviceStatus::Theft => AlertDraft::reported_theft(),
            _ => AlertDraft::reported_malfunction(),
        });
    }

    // 2. Paper-empty onset starts the dwell clock
    if !device.paper_present && (old.paper_present || device.paper_empty_since.is_none()) {
        device.paper_empty_since = Some(now);
    }

    // 3. Stale empty
    if let Some(draft) = stale_empty_draft(&device, now, config) {
        device.status = DeviceStatus::Empty;
        open.push(draft);
    }

    // 4. Replenishment
    if device.paper_present {
        device.paper_empty_since = None;
        if !old.paper_present || old.status == DeviceStatus::Empty {
            resolve.push(AlertType::Empty);
        }
        if device.status == DeviceStatus::Empty {
            device.status = DeviceStatus::Normal;
        }
    }

    // 5. Offline self-heal: any fresh report counts as recovery
    if old.status == DeviceStatus::Offline || !old.online {
        device.online = true;
        if device.status == DeviceStatus::Offline {
            device.status = DeviceStatus::Normal;
        }
        resolve.push(AlertType::Offline);
    }

    // 6 & 7. Reserve depleted: confirm later against a fresh read
    let theft_check = if new.reserve_count < old.reserve_count {
        Some(if device.paper_present {
            TheftCheck::UnreturnedReserve {
                device_id: device.id.clone(),
                baseline_reserve: old.reserve_count,
            }
        } else {
            TheftCheck::MainSupplyEmpty {
                device_id: device.id.clone(),
            }
        })
    } else {
        None
    };

    UpdatePlan {
        device,
        open,
        resolve,
        theft_check,
    }
}

/// Empty alert for a device whose paper has been out too long, if due.
///
/// Due when the main roll is out, no reserve is left, the dwell time has
/// elapsed and the device is not already in a status that outranks Empty.
pub fn stale_empty_draft(
    device: &Device,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Option<AlertDraft> {
    if device.paper_present || device.reserve_count > 0 {
        return None;
    }
    if matches!(
        device.status,
        DeviceStatus::Empty | DeviceStatus::Theft | DeviceStatus::Malfunction | DeviceStatus::Offline
    ) {
        return None;
    }
    let empty_for = now - device.paper_empty_since?;
    (empty_for >= config.empty_alert_delay).then(|| AlertDraft::out_of_paper(empty_for))
}

/// Whether the offline sweep should mark this device offline.
pub fn is_offline_due(device: &Device, now: DateTime<Utc>, config: &EngineConfig) -> bool {
    device.online
        && device.status != DeviceStatus::Offline
        && now - device.last_seen > config.offline_threshold
}

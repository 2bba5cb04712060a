// Device domain types
//
// A device is one paper dispenser (one per stall). The record is created on the
// first telemetry report and is never hard-deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Reserve rolls assumed when the first report does not carry a count.
pub const DEFAULT_RESERVE_COUNT: u32 = 2;

/// Device supply status.
/// - `normal`: paper and reserve are fine
/// - `empty`: paper has been out with no reserve for longer than the dwell time
/// - `theft`: reserve stock is suspected stolen
/// - `malfunction`: the device reported a hardware fault
/// - `offline`: no telemetry within the offline threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Normal,
    Empty,
    Theft,
    #[serde(alias = "error")]
    Malfunction,
    Offline,
}

impl DeviceStatus {
    /// Statuses a device may self-report that open an alert on their own.
    pub fn is_self_reported_fault(&self) -> bool {
        matches!(self, DeviceStatus::Theft | DeviceStatus::Malfunction)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Normal => write!(f, "normal"),
            DeviceStatus::Empty => write!(f, "empty"),
            DeviceStatus::Theft => write!(f, "theft"),
            DeviceStatus::Malfunction => write!(f, "malfunction"),
            DeviceStatus::Offline => write!(f, "offline"),
        }
    }
}

impl From<&str> for DeviceStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "empty" => DeviceStatus::Empty,
            "theft" => DeviceStatus::Theft,
            // Older firmware reports hardware faults as "error"
            "malfunction" | "error" => DeviceStatus::Malfunction,
            "offline" => DeviceStatus::Offline,
            _ => DeviceStatus::Normal,
        }
    }
}

/// Placement of a device on the facility map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LocationRef {
    /// Floor the device is mounted on.
    pub floor_id: String,
    /// Area (restroom) within the floor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
}

/// Current state of a paper dispenser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Device {
    /// Stable device identifier assigned at provisioning.
    pub id: String,
    /// Human-readable stall label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Where the device is installed. `None` when unassigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationRef>,
    /// Whether the main roll has paper.
    pub paper_present: bool,
    /// Number of reserve rolls in the holder.
    pub reserve_count: u32,
    /// Current supply status.
    pub status: DeviceStatus,
    /// False once the offline sweep has marked the device unreachable.
    pub online: bool,
    /// Set while the main roll has been continuously empty since this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_empty_since: Option<DateTime<Utc>>,
    /// Timestamp of the latest telemetry report.
    pub last_seen: DateTime<Utc>,
    /// Timestamp of the first telemetry report.
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Build the record for a device reporting for the first time.
    pub fn first_sighting(report: &TelemetryReport, now: DateTime<Utc>) -> Self {
        Self {
            id: report.device_id.clone(),
            name: report.name.clone(),
            location: None,
            paper_present: report.paper_present,
            reserve_count: report.reserve_count.unwrap_or(DEFAULT_RESERVE_COUNT),
            status: DeviceStatus::Normal,
            online: true,
            paper_empty_since: if report.paper_present { None } else { Some(now) },
            last_seen: now,
            created_at: now,
        }
    }

    /// Candidate state after applying a telemetry report to this record.
    ///
    /// Only `theft` and `malfunction` reports replace the stored status; every
    /// other status value is decided by the reconciliation rules.
    pub fn with_report(&self, report: &TelemetryReport, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.paper_present = report.paper_present;
        if let Some(count) = report.reserve_count {
            next.reserve_count = count;
        }
        if let Some(status) = report.status.filter(DeviceStatus::is_self_reported_fault) {
            next.status = status;
        }
        if report.name.is_some() {
            next.name = report.name.clone();
        }
        next.last_seen = now;
        next
    }

    /// Label used when no location can be resolved.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &DevicePatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(online) = patch.online {
            self.online = online;
        }
        if let Some(location) = &patch.location {
            self.location = location.clone();
        }
        if let Some(since) = patch.paper_empty_since {
            self.paper_empty_since = since;
        }
    }
}

/// Incoming report of current device readings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TelemetryReport {
    /// Reporting device.
    pub device_id: String,
    /// Whether the main roll has paper (or the sensor's threshold says so).
    pub paper_present: bool,
    /// Reserve roll count, when the firmware measures it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_count: Option<u32>,
    /// Explicit status report from the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
    /// Stall label, sent by firmware that knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Partial device update. Only provided fields are written.
///
/// Nested options distinguish "leave unchanged" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
    pub status: Option<DeviceStatus>,
    pub online: Option<bool>,
    pub location: Option<Option<LocationRef>>,
    pub paper_empty_since: Option<Option<DateTime<Utc>>>,
}

impl DevicePatch {
    pub fn status(status: DeviceStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.online.is_none()
            && self.location.is_none()
            && self.paper_empty_since.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn report(paper_present: bool, reserve_count: Option<u32>) -> TelemetryReport {
        TelemetryReport {
            device_id: "D1".to_string(),
            paper_present,
            reserve_count,
            status: None,
            name: None,
        }
    }

    #[test]
    fn test_first_sighting_defaults() {
        let device = Device::first_sighting(&report(true, None), at(0));
        assert_eq!(device.status, DeviceStatus::Normal);
        assert!(device.online);
        assert_eq!(device.reserve_count, DEFAULT_RESERVE_COUNT);
        assert_eq!(device.paper_empty_since, None);
        assert_eq!(device.last_seen, at(0));
    }

    #[test]
    fn test_first_sighting_without_paper_starts_dwell_clock() {
        let device = Device::first_sighting(&report(false, Some(0)), at(5));
        assert_eq!(device.reserve_count, 0);
        assert_eq!(device.paper_empty_since, Some(at(5)));
    }

    #[test]
    fn test_with_report_ignores_non_fault_status() {
        let device = Device::first_sighting(&report(true, Some(2)), at(0));

        let mut offline = report(true, Some(1));
        offline.status = Some(DeviceStatus::Offline);
        let next = device.with_report(&offline, at(10));
        assert_eq!(next.status, DeviceStatus::Normal);
        assert_eq!(next.reserve_count, 1);
        assert_eq!(next.last_seen, at(10));

        let mut theft = report(true, None);
        theft.status = Some(DeviceStatus::Theft);
        let next = device.with_report(&theft, at(20));
        assert_eq!(next.status, DeviceStatus::Theft);
        assert_eq!(next.reserve_count, 2);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(DeviceStatus::from("theft"), DeviceStatus::Theft);
        assert_eq!(DeviceStatus::from("error"), DeviceStatus::Malfunction);
        assert_eq!(DeviceStatus::from("OFFLINE"), DeviceStatus::Offline);
        assert_eq!(DeviceStatus::from("whatever"), DeviceStatus::Normal);
        assert_eq!(DeviceStatus::Malfunction.to_string(), "malfunction");
    }

    #[test]
    fn test_patch_clears_paper_empty_since() {
        let mut device = Device::first_sighting(&report(false, Some(0)), at(0));
        device.apply(&DevicePatch {
            paper_empty_since: Some(None),
            ..Default::default()
        });
        assert_eq!(device.paper_empty_since, None);
        assert!(DevicePatch::default().is_empty());
    }
}

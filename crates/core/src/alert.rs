// Alert domain types
//
// At most one unresolved alert exists per (device_id, alert_type) pair. Alerts
// are created by the engine, resolved by an operator or by auto-recovery, and
// never mutated otherwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceStatus;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Problem an alert reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    Theft,
    Malfunction,
    Empty,
    Offline,
    LowStock,
}

impl AlertType {
    /// Device status that resolving an alert of this type clears back to `normal`.
    pub fn fault_status(&self) -> Option<DeviceStatus> {
        match self {
            AlertType::Theft => Some(DeviceStatus::Theft),
            AlertType::Malfunction => Some(DeviceStatus::Malfunction),
            AlertType::Empty | AlertType::Offline | AlertType::LowStock => None,
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Theft => write!(f, "theft"),
            AlertType::Malfunction => write!(f, "malfunction"),
            AlertType::Empty => write!(f, "empty"),
            AlertType::Offline => write!(f, "offline"),
            AlertType::LowStock => write!(f, "low-stock"),
        }
    }
}

/// Alert urgency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Critical => write!(f, "critical"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Info => write!(f, "info"),
        }
    }
}

/// Operator-facing alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Alert {
    /// Unique identifier for the alert.
    pub id: Uuid,
    /// Device the alert is about.
    pub device_id: String,
    /// Problem category.
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    /// Short headline shown to operators.
    pub title: String,
    /// Longer explanation.
    pub description: String,
    /// Place name resolved when the alert was created.
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Set by the notification dispatcher once a message went out.
    pub notified: bool,
}

/// The engine's intent to open an alert, before location enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
}

impl AlertDraft {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Device self-reported a suspected theft.
    pub fn reported_theft() -> Self {
        Self::new(
            AlertType::Theft,
            AlertSeverity::Critical,
            "Theft detected",
            "The device reported that reserve rolls may have been stolen.",
        )
    }

    /// Device self-reported a hardware fault.
    pub fn reported_malfunction() -> Self {
        Self::new(
            AlertType::Malfunction,
            AlertSeverity::Warning,
            "Device malfunction",
            "The device reported a hardware fault.",
        )
    }

    /// Reserve dropped while the main roll was already empty.
    pub fn reserve_taken_while_empty() -> Self {
        Self::new(
            AlertType::Theft,
            AlertSeverity::Critical,
            "Theft suspected",
            "A reserve roll was removed while the main roll stayed empty.",
        )
    }

    /// Reserve dropped while the main roll was fine and was never put back.
    pub fn unreturned_reserve() -> Self {
        Self::new(
            AlertType::Theft,
            AlertSeverity::Critical,
            "Unreturned reserve roll",
            "A reserve roll was removed while paper was still available and has not been returned.",
        )
    }

    /// Paper has been out with no reserve for longer than the dwell time.
    pub fn out_of_paper(empty_for: chrono::Duration) -> Self {
        Self::new(
            AlertType::Empty,
            AlertSeverity::Critical,
            "Out of paper",
            format!(
                "Paper has been out for {} minutes or more with no reserve left.",
                empty_for.num_minutes()
            ),
        )
    }

    /// No telemetry within the offline threshold.
    pub fn communication_lost(threshold: chrono::Duration) -> Self {
        Self::new(
            AlertType::Offline,
            AlertSeverity::Warning,
            "Communication lost",
            format!(
                "No response from the sensor for more than {} minutes.",
                threshold.num_minutes()
            ),
        )
    }

    /// Materialize the draft into an unresolved, unnotified alert.
    pub fn into_alert(self, device_id: &str, location: String, now: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::now_v7(),
            device_id: device_id.to_string(),
            alert_type: self.alert_type,
            severity: self.severity,
            title: self.title,
            description: self.description,
            location,
            created_at: now,
            resolved: false,
            resolved_at: None,
            notified: false,
        }
    }
}

/// Filter for listing alerts.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub device_id: Option<String>,
    pub include_resolved: bool,
}

impl AlertFilter {
    /// Unresolved alerts across all devices.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if !self.include_resolved && alert.resolved {
            return false;
        }
        match &self.device_id {
            Some(id) => &alert.device_id == id,
            None => true,
        }
    }
}

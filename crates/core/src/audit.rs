// Audit log entries
//
// Append-only record of every alert lifecycle transition. Rows are removed only
// by the retention sweep.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::alert::{Alert, AlertSeverity, AlertType};

/// Lifecycle transition recorded in the audit log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Created,
    Resolved,
    Notified,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Created => write!(f, "created"),
            AuditAction::Resolved => write!(f, "resolved"),
            AuditAction::Notified => write!(f, "notified"),
        }
    }
}

/// Immutable audit log row with the alert fields denormalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub alert_id: Uuid,
    pub device_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub location: String,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    /// Retention horizon for stores that expire rows natively.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<DateTime<Utc>>,
}

impl AuditLogEntry {
    pub fn for_alert(
        alert: &Alert,
        action: AuditAction,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            alert_id: alert.id,
            device_id: alert.device_id.clone(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            title: alert.title.clone(),
            description: alert.description.clone(),
            location: alert.location.clone(),
            action,
            timestamp: now,
            expire_at: now.checked_add_signed(retention),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDraft;

    #[test]
    fn test_expire_at_follows_retention() {
        let now = Utc::now();
        let alert = AlertDraft::reported_theft().into_alert("D1", "2F".into(), now);
        let entry = AuditLogEntry::for_alert(&alert, AuditAction::Created, now, Duration::days(30));
        assert_eq!(entry.expire_at, Some(now + Duration::days(30)));
        assert_eq!(entry.location, "2F");
    }

    #[test]
    fn test_unrepresentable_expiry_is_left_unset() {
        let now = Utc::now();
        let alert = AlertDraft::reported_theft().into_alert("D1", "2F".into(), now);
        let entry = AuditLogEntry::for_alert(
            &alert,
            AuditAction::Created,
            now,
            Duration::days(100_000_000),
        );
        assert_eq!(entry.expire_at, None);
        assert_eq!(entry.timestamp, now);
    }
}

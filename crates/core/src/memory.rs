// In-memory implementations for the dev server and testing
//
// These implementations keep all data in memory, making them a fit for:
// - Unit and integration tests of the alerting state machine
// - Running the control plane without a document database
//
// Decision: one lock over all tables so a WriteBatch commits atomically

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use uuid::Uuid;

use crate::alert::{Alert, AlertFilter, AlertType};
use crate::audit::{AuditAction, AuditLogEntry};
use crate::device::{Device, DevicePatch};
use crate::error::StoreError;
use crate::location::Floor;
use crate::scheduler::{DeferredScheduler, DeferredTask};
use crate::traits::{
    AlertStore, AuditLogStore, BatchOutcome, BatchWriter, Clock, DeviceStore, FloorRegistry,
    LocationDirectory, WriteBatch, WriteOp,
};

// ============================================================================
// InMemoryStore - Devices, alerts and audit log
// ============================================================================

#[derive(Default)]
struct Tables {
    devices: HashMap<String, Device>,
    alerts: HashMap<Uuid, Alert>,
    audit: Vec<AuditLogEntry>,
}

impl Tables {
    fn has_open_alert(&self, device_id: &str, alert_type: AlertType) -> bool {
        self.alerts
            .values()
            .any(|a| !a.resolved && a.device_id == device_id && a.alert_type == alert_type)
    }

    fn check(&self, op: &WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::PatchDevice { id, .. } if !self.devices.contains_key(id) => {
                Err(StoreError::DeviceNotFound(id.clone()))
            }
            WriteOp::ResolveAlert { id, .. } | WriteOp::MarkNotified { id, .. }
                if !self.alerts.contains_key(id) =>
            {
                Err(StoreError::AlertNotFound(*id))
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, op: WriteOp, outcome: &mut BatchOutcome) {
        match op {
            WriteOp::PutDevice(device) => {
                self.devices.insert(device.id.clone(), device);
            }
            WriteOp::PatchDevice { id, patch } => {
                if let Some(device) = self.devices.get_mut(&id) {
                    device.apply(&patch);
                }
            }
            WriteOp::OpenAlert { alert, audit } => {
                if self.has_open_alert(&alert.device_id, alert.alert_type) {
                    outcome.skipped_alerts.push(alert.id);
                    return;
                }
                self.audit.push(audit);
                outcome.created_alerts.push(alert.clone());
                self.alerts.insert(alert.id, alert);
            }
            WriteOp::ResolveAlert { id, at, audit } => {
                if let Some(alert) = self.alerts.get_mut(&id) {
                    if !alert.resolved {
                        alert.resolved = true;
                        alert.resolved_at = Some(at);
                        self.audit.push(audit);
                        outcome.resolved_alerts.push(id);
                    }
                }
            }
            WriteOp::MarkNotified { id, audit } => {
                if let Some(alert) = self.alerts.get_mut(&id) {
                    if !alert.notified {
                        alert.notified = true;
                        self.audit.push(audit);
                    }
                }
            }
        }
    }
}

/// In-memory document store
///
/// Implements every store trait plus [`BatchWriter`]. All data is lost on
/// restart.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a device (useful for testing)
    pub fn seed_device(&self, device: Device) {
        self.tables
            .write()
            .devices
            .insert(device.id.clone(), device);
    }

    /// Pre-populate an alert (useful for testing)
    pub fn seed_alert(&self, alert: Alert) {
        self.tables.write().alerts.insert(alert.id, alert);
    }

    /// Pre-populate an audit entry (useful for testing)
    pub fn seed_audit(&self, entry: AuditLogEntry) {
        self.tables.write().audit.push(entry);
    }

    /// Number of unresolved alerts for a device and type
    pub fn open_alert_count(&self, device_id: &str, alert_type: AlertType) -> usize {
        self.tables
            .read()
            .alerts
            .values()
            .filter(|a| !a.resolved && a.device_id == device_id && a.alert_type == alert_type)
            .count()
    }

    /// Number of audit entries for an alert with the given action
    pub fn audit_count(&self, alert_id: Uuid, action: AuditAction) -> usize {
        self.tables
            .read()
            .audit
            .iter()
            .filter(|e| e.alert_id == alert_id && e.action == action)
            .count()
    }

    pub fn audit_len(&self) -> usize {
        self.tables.read().audit.len()
    }
}

#[async_trait]
impl DeviceStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Device>, StoreError> {
        Ok(self.tables.read().devices.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Device>, StoreError> {
        let mut devices: Vec<_> = self.tables.read().devices.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    async fn upsert(&self, id: &str, patch: DevicePatch) -> Result<Option<Device>, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables.devices.get_mut(id).map(|device| {
            device.apply(&patch);
            device.clone()
        }))
    }

    async fn put(&self, device: Device) -> Result<(), StoreError> {
        self.seed_device(device);
        Ok(())
    }
}

#[async_trait]
impl AlertStore for InMemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        Ok(self.tables.read().alerts.get(&id).cloned())
    }

    async fn find_open(
        &self,
        device_id: &str,
        alert_type: AlertType,
    ) -> Result<Option<Alert>, StoreError> {
        Ok(self
            .tables
            .read()
            .alerts
            .values()
            .find(|a| !a.resolved && a.device_id == device_id && a.alert_type == alert_type)
            .cloned())
    }

    async fn list(&self, filter: AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let mut alerts: Vec<_> = self
            .tables
            .read()
            .alerts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(alerts)
    }

    async fn create(&self, alert: Alert) -> Result<(), StoreError> {
        self.seed_alert(alert);
        Ok(())
    }

    async fn resolve(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Alert>, StoreError> {
        let mut tables = self.tables.write();
        Ok(tables.alerts.get_mut(&id).map(|alert| {
            if !alert.resolved {
                alert.resolved = true;
                alert.resolved_at = Some(at);
            }
            alert.clone()
        }))
    }

    async fn mark_notified(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let alert = tables
            .alerts
            .get_mut(&id)
            .ok_or(StoreError::AlertNotFound(id))?;
        alert.notified = true;
        Ok(())
    }
}

#[async_trait]
impl AuditLogStore for InMemoryStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        self.seed_audit(entry);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError> {
        let mut entries = self.tables.read().audit.clone();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();

        let mut expired: Vec<(DateTime<Utc>, Uuid)> = tables
            .audit
            .iter()
            .filter(|e| e.timestamp < cutoff)
            .map(|e| (e.timestamp, e.id))
            .collect();
        expired.sort();
        expired.truncate(limit);

        let doomed: std::collections::HashSet<Uuid> =
            expired.into_iter().map(|(_, id)| id).collect();
        tables.audit.retain(|e| !doomed.contains(&e.id));
        Ok(doomed.len())
    }
}

#[async_trait]
impl BatchWriter for InMemoryStore {
    async fn commit(&self, batch: WriteBatch) -> Result<BatchOutcome, StoreError> {
        let mut tables = self.tables.write();

        // Validate everything first so a failing op leaves no partial writes
        for op in batch.ops() {
            tables.check(op)?;
        }

        let mut outcome = BatchOutcome::default();
        for op in batch.into_ops() {
            tables.apply(op, &mut outcome);
        }
        Ok(outcome)
    }
}

// ============================================================================
// InMemoryLocationDirectory - Floors and areas
// ============================================================================

/// Floor/area table held in memory
#[derive(Default)]
pub struct InMemoryLocationDirectory {
    floors: RwLock<HashMap<String, Floor>>,
}

impl InMemoryLocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floors(floors: impl IntoIterator<Item = Floor>) -> Self {
        let directory = Self::new();
        for floor in floors {
            directory.add_floor(floor);
        }
        directory
    }

    pub fn add_floor(&self, floor: Floor) {
        self.floors.write().insert(floor.id.clone(), floor);
    }

}

#[async_trait]
impl FloorRegistry for InMemoryLocationDirectory {
    async fn put_floor(&self, floor: Floor) -> Result<(), StoreError> {
        self.add_floor(floor);
        Ok(())
    }

    async fn list_floors(&self) -> Result<Vec<Floor>, StoreError> {
        let mut floors: Vec<_> = self.floors.read().values().cloned().collect();
        floors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(floors)
    }
}

#[async_trait]
impl LocationDirectory for InMemoryLocationDirectory {
    async fn resolve(&self, device: &Device) -> Result<Option<String>, StoreError> {
        let Some(location) = &device.location else {
            return Ok(None);
        };
        Ok(self
            .floors
            .read()
            .get(&location.floor_id)
            .map(|floor| floor.describe(device)))
    }
}

// ============================================================================
// ManualClock - Settable time for tests
// ============================================================================

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// ManualScheduler - Deferred tasks run on demand
// ============================================================================

/// Scheduler that queues deferred tasks until the test runs them
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<(std::time::Duration, DeferredTask)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Delays of the queued tasks, in scheduling order
    pub fn delays(&self) -> Vec<std::time::Duration> {
        self.queue.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Run every queued task in scheduling order. Returns how many ran.
    pub async fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let tasks: Vec<_> = std::mem::take(&mut *self.queue.lock());
            if tasks.is_empty() {
                return ran;
            }
            for (_, task) in tasks {
                task.await;
                ran += 1;
            }
        }
    }
}

impl DeferredScheduler for ManualScheduler {
    fn run_after(&self, delay: std::time::Duration, task: DeferredTask) {
        self.queue.lock().push((delay, task));
    }
}

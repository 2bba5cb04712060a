// Core traits for pluggable backends
//
// These traits keep the reconciliation engine independent of the document
// store behind it:
// - In-memory implementations for tests and the dev server
// - Database implementations for production deployments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::alert::{Alert, AlertFilter, AlertType};
use crate::audit::AuditLogEntry;
use crate::device::{Device, DevicePatch};
use crate::error::StoreError;
use crate::location::Floor;

// ============================================================================
// DeviceStore - Current device state
// ============================================================================

#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Snapshot read of one device
    async fn get(&self, id: &str) -> Result<Option<Device>, StoreError>;

    /// All known devices, ordered by id
    async fn list(&self) -> Result<Vec<Device>, StoreError>;

    /// Apply a partial update, returning the updated record
    async fn upsert(&self, id: &str, patch: DevicePatch) -> Result<Option<Device>, StoreError>;

    /// Replace the whole record
    async fn put(&self, device: Device) -> Result<(), StoreError>;
}

// ============================================================================
// AlertStore - Open and resolved alerts
// ============================================================================

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Alert>, StoreError>;

    /// The unresolved alert for `(device_id, alert_type)`, if any
    async fn find_open(
        &self,
        device_id: &str,
        alert_type: AlertType,
    ) -> Result<Option<Alert>, StoreError>;

    /// Alerts matching the filter, newest first
    async fn list(&self, filter: AlertFilter) -> Result<Vec<Alert>, StoreError>;

    async fn create(&self, alert: Alert) -> Result<(), StoreError>;

    /// Mark resolved. Returns the alert as stored after the call.
    async fn resolve(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Alert>, StoreError>;

    async fn mark_notified(&self, id: Uuid) -> Result<(), StoreError>;
}

// ============================================================================
// AuditLogStore - Append-only lifecycle log
// ============================================================================

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<(), StoreError>;

    /// Most recent entries first
    async fn list(&self, limit: usize) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Delete up to `limit` entries with `timestamp < cutoff`, oldest first.
    /// Returns the number of rows deleted.
    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<usize, StoreError>;
}

// ============================================================================
// BatchWriter - Atomic multi-record writes
// ============================================================================

/// One write inside a [`WriteBatch`]
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Replace a device record
    PutDevice(Device),
    /// Partially update an existing device
    PatchDevice { id: String, patch: DevicePatch },
    /// Create an alert with its Created audit entry.
    ///
    /// Skipped (with its audit entry) when an unresolved alert for the same
    /// device and type already exists at commit time.
    OpenAlert {
        alert: Alert,
        audit: AuditLogEntry,
    },
    /// Resolve an alert with its Resolved audit entry. No-op when already resolved.
    ResolveAlert {
        id: Uuid,
        at: DateTime<Utc>,
        audit: AuditLogEntry,
    },
    /// Flag an alert as notified with its Notified audit entry
    MarkNotified { id: Uuid, audit: AuditLogEntry },
}

/// Writes belonging to one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// What a committed batch actually did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Alerts inserted by this batch
    pub created_alerts: Vec<Alert>,
    /// Alert ids skipped because an open alert of the same type already existed
    pub skipped_alerts: Vec<Uuid>,
    /// Alert ids transitioned to resolved by this batch
    pub resolved_alerts: Vec<Uuid>,
}

#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Apply every op of the batch or none of them
    async fn commit(&self, batch: WriteBatch) -> Result<BatchOutcome, StoreError>;
}

// ============================================================================
// LocationDirectory - Device to place name
// ============================================================================

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    /// Human-readable place name (floor, area, stall) for the device.
    ///
    /// `Ok(None)` means the device is unassigned or its floor is unknown.
    async fn resolve(&self, device: &Device) -> Result<Option<String>, StoreError>;
}

/// Editable floor table behind a [`LocationDirectory`]
#[async_trait]
pub trait FloorRegistry: Send + Sync {
    /// Insert or replace a floor with its areas
    async fn put_floor(&self, floor: Floor) -> Result<(), StoreError>;

    /// All floors, ordered by id
    async fn list_floors(&self) -> Result<Vec<Floor>, StoreError>;
}

// ============================================================================
// Clock - Injectable time source
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Stores - Explicit dependency bundle for the engine
// ============================================================================

/// Every store the engine reads or writes
#[derive(Clone)]
pub struct Stores {
    pub devices: Arc<dyn DeviceStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub audit: Arc<dyn AuditLogStore>,
    pub batch: Arc<dyn BatchWriter>,
    pub locations: Arc<dyn LocationDirectory>,
}

impl Stores {
    /// Use one backend for every record store
    pub fn from_backend<B>(backend: Arc<B>, locations: Arc<dyn LocationDirectory>) -> Self
    where
        B: DeviceStore + AlertStore + AuditLogStore + BatchWriter + 'static,
    {
        Self {
            devices: backend.clone(),
            alerts: backend.clone(),
            audit: backend.clone(),
            batch: backend,
            locations,
        }
    }
}

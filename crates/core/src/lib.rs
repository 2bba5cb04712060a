// Paper-dispenser supply alerting
//
// This crate holds every alerting decision and stays independent of the
// document store and transport around it.
//
// Key design decisions:
// - Uses traits (DeviceStore, AlertStore, AuditLogStore, BatchWriter) for pluggable backends
// - Rule evaluation is a pure function over (old, new) device state
// - One reconciliation pass commits as one atomic WriteBatch
// - At most one unresolved alert per (device, alert type), checked before insert and again at commit
// - Theft suspicions are confirmed later against a fresh read, never cancelled
// - Time and deferred execution are injected (Clock, DeferredScheduler) for deterministic tests

// Domain types
pub mod alert;
pub mod audit;
pub mod device;
pub mod location;

pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod retry;
pub mod scheduler;
pub mod telemetry;
pub mod traits;

// In-memory implementations for the dev server and testing
pub mod memory;

pub use alert::{Alert, AlertDraft, AlertFilter, AlertSeverity, AlertType};
pub use audit::{AuditAction, AuditLogEntry};
pub use config::EngineConfig;
pub use device::{Device, DevicePatch, DeviceStatus, LocationRef, TelemetryReport};
pub use engine::{
    ConfirmationOutcome, ReconcileOutcome, ReconciliationEngine, SweepReport, TheftCheck,
};
pub use error::{ConfigError, EngineError, NotifyError, Result, StoreError};
pub use location::{Area, Floor};
pub use memory::{InMemoryLocationDirectory, InMemoryStore, ManualClock, ManualScheduler};
pub use notify::{
    AlertEmitter, ChannelAlertEmitter, DispatchOutcome, LogNotifier, NoopAlertEmitter,
    NotificationDispatcher, Notifier, Recipient, RecipientDirectory, StaticRecipients,
};
pub use retry::RetryPolicy;
pub use scheduler::{run_every, DeferredScheduler, TokioScheduler};
pub use telemetry::{init_telemetry, TelemetryConfig};
pub use traits::{
    AlertStore, AuditLogStore, BatchOutcome, BatchWriter, Clock, DeviceStore, FloorRegistry,
    LocationDirectory, Stores, SystemClock, WriteBatch, WriteOp,
};

// Notification dispatch
//
// The engine only emits "alert created" events; delivery happens elsewhere and
// never feeds back into reconciliation. The dispatcher consumes the events,
// sends with bounded retries and records the Notified transition.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::alert::Alert;
use crate::audit::{AuditAction, AuditLogEntry};
use crate::error::NotifyError;
use crate::retry::RetryPolicy;
use crate::traits::{Clock, Stores, SystemClock, WriteBatch, WriteOp};

// ============================================================================
// AlertEmitter - Engine side of the event stream
// ============================================================================

/// Receives every alert the engine actually created.
///
/// Must not block: called inline after a batch commits.
pub trait AlertEmitter: Send + Sync {
    fn alert_created(&self, alert: &Alert);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlertEmitter;

impl AlertEmitter for NoopAlertEmitter {
    fn alert_created(&self, _alert: &Alert) {}
}

/// Forwards events to an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelAlertEmitter {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertEmitter for ChannelAlertEmitter {
    fn alert_created(&self, alert: &Alert) {
        if self.tx.send(alert.clone()).is_err() {
            warn!(alert_id = %alert.id, "Notification channel closed, event dropped");
        }
    }
}

// ============================================================================
// Recipients
// ============================================================================

/// Someone who gets told about new alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
}

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn recipients_for(&self, alert: &Alert) -> Result<Vec<Recipient>, NotifyError>;
}

/// Same recipient list for every alert
#[derive(Debug, Clone, Default)]
pub struct StaticRecipients {
    recipients: Vec<Recipient>,
}

impl StaticRecipients {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self { recipients }
    }

    /// Parse a comma-separated address list, ignoring blanks
    pub fn from_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|address| Recipient {
                    address: address.to_string(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

#[async_trait]
impl RecipientDirectory for StaticRecipients {
    async fn recipients_for(&self, _alert: &Alert) -> Result<Vec<Recipient>, NotifyError> {
        Ok(self.recipients.clone())
    }
}

// ============================================================================
// Notifier - Delivery transport
// ============================================================================

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &Alert, recipients: &[Recipient]) -> Result<(), NotifyError>;
}

/// Writes the notification to the log instead of sending it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: &Alert, recipients: &[Recipient]) -> Result<(), NotifyError> {
        info!(
            alert_id = %alert.id,
            device_id = %alert.device_id,
            severity = %alert.severity,
            title = %alert.title,
            location = %alert.location,
            recipients = recipients.len(),
            "Notification"
        );
        Ok(())
    }
}

// ============================================================================
// NotificationDispatcher
// ============================================================================

/// What a dispatch attempt ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    /// Alert was resolved, already notified or gone
    Skipped,
}

pub struct NotificationDispatcher {
    stores: Stores,
    recipients: Arc<dyn RecipientDirectory>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    retention: ChronoDuration,
}

impl NotificationDispatcher {
    pub fn new(
        stores: Stores,
        recipients: Arc<dyn RecipientDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            stores,
            recipients,
            notifier,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            retention: ChronoDuration::days(30),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Retention window stamped on Notified audit entries
    pub fn with_retention(mut self, retention: ChronoDuration) -> Self {
        self.retention = retention;
        self
    }

    /// Deliver one alert and record it as notified.
    #[instrument(skip(self, alert), fields(alert_id = %alert.id, device_id = %alert.device_id))]
    pub async fn dispatch(&self, alert: &Alert) -> Result<DispatchOutcome, NotifyError> {
        // The event may be stale by the time it is consumed
        let Some(current) = self.stores.alerts.get(alert.id).await? else {
            debug!("Alert no longer exists, skipping notification");
            return Ok(DispatchOutcome::Skipped);
        };
        if current.resolved || current.notified {
            debug!(
                resolved = current.resolved,
                notified = current.notified,
                "Skipping notification"
            );
            return Ok(DispatchOutcome::Skipped);
        }

        let recipients = self.recipients.recipients_for(&current).await?;
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients(current.id));
        }

        let attempts = self.send_with_retry(&current, &recipients).await?;

        let now = self.clock.now();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::MarkNotified {
            id: current.id,
            audit: AuditLogEntry::for_alert(&current, AuditAction::Notified, now, self.retention),
        });
        self.stores.batch.commit(batch).await?;

        info!(attempts, recipients = recipients.len(), "Alert notified");
        Ok(DispatchOutcome::Delivered { attempts })
    }

    async fn send_with_retry(
        &self,
        alert: &Alert,
        recipients: &[Recipient],
    ) -> Result<u32, NotifyError> {
        let mut attempt = 1;
        loop {
            match self.notifier.send(alert, recipients).await {
                Ok(()) => return Ok(attempt),
                Err(e) if self.retry.has_attempts_remaining(attempt) => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Notification failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consume emitted alerts until the channel closes or shutdown is signalled.
    ///
    /// On shutdown the channel is closed and alerts already queued are still
    /// delivered before returning.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<Alert>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Notification dispatcher started");
        loop {
            tokio::select! {
                maybe_alert = rx.recv() => {
                    let Some(alert) = maybe_alert else {
                        debug!("Notification channel closed");
                        break;
                    };
                    self.dispatch_logged(&alert).await;
                }
                _ = shutdown.changed() => {
                    debug!("Notification dispatcher: shutdown requested");
                    rx.close();
                    while let Some(alert) = rx.recv().await {
                        self.dispatch_logged(&alert).await;
                    }
                    break;
                }
            }
        }
        info!("Notification dispatcher stopped");
    }

    async fn dispatch_logged(&self, alert: &Alert) {
        if let Err(e) = self.dispatch(alert).await {
            error!(alert_id = %alert.id, error = %e, "Notification dispatch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertDraft;
    use crate::memory::{InMemoryLocationDirectory, InMemoryStore};
    use crate::traits::AlertStore;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(uuid::Uuid, usize)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, alert: &Alert, recipients: &[Recipient]) -> Result<(), NotifyError> {
            self.sent.lock().push((alert.id, recipients.len()));
            Ok(())
        }
    }

    /// Fails the first `failures` sends
    struct FlakyNotifier {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, _alert: &Alert, _recipients: &[Recipient]) -> Result<(), NotifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(NotifyError::Delivery(format!("attempt {call} refused")))
            } else {
                Ok(())
            }
        }
    }

    fn setup(notifier: Arc<dyn Notifier>) -> (Arc<InMemoryStore>, NotificationDispatcher, Alert) {
        let store = Arc::new(InMemoryStore::new());
        let alert = AlertDraft::reported_theft().into_alert("D1", "Lobby".into(), Utc::now());
        store.seed_alert(alert.clone());
        let stores = Stores::from_backend(store.clone(), Arc::new(InMemoryLocationDirectory::new()));
        let dispatcher = NotificationDispatcher::new(
            stores,
            Arc::new(StaticRecipients::from_list("ops@example.com, facilities@example.com")),
            notifier,
        )
        .with_retry(RetryPolicy::fixed(Duration::from_millis(10), 3));
        (store, dispatcher, alert)
    }

    #[test]
    fn test_static_recipients_parsing() {
        let recipients = StaticRecipients::from_list(" a@x.io, ,b@x.io,");
        assert_eq!(recipients.len(), 2);
        assert!(StaticRecipients::from_list("").is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_marks_notified_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (store, dispatcher, alert) = setup(notifier.clone());

        let outcome = dispatcher.dispatch(&alert).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 1 });
        assert_eq!(notifier.sent.lock().as_slice(), &[(alert.id, 2)]);

        let stored = AlertStore::get(store.as_ref(), alert.id).await.unwrap().unwrap();
        assert!(stored.notified);
        assert_eq!(store.audit_count(alert.id, AuditAction::Notified), 1);

        // Replayed event is skipped
        assert_eq!(
            dispatcher.dispatch(&alert).await.unwrap(),
            DispatchOutcome::Skipped
        );
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_retries_transient_failures() {
        let notifier = Arc::new(FlakyNotifier {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let (store, dispatcher, alert) = setup(notifier);

        let outcome = dispatcher.dispatch(&alert).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 3 });
        assert_eq!(store.audit_count(alert.id, AuditAction::Notified), 1);
    }

    #[tokio::test]
    async fn test_dispatch_gives_up_without_touching_alert() {
        let notifier = Arc::new(FlakyNotifier {
            failures: 10,
            calls: AtomicU32::new(0),
        });
        let (store, dispatcher, alert) = setup(notifier.clone());

        let err = dispatcher.dispatch(&alert).await.unwrap_err();
        assert!(matches!(err, NotifyError::Delivery(_)));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);

        let stored = AlertStore::get(store.as_ref(), alert.id).await.unwrap().unwrap();
        assert!(!stored.notified);
        assert!(!stored.resolved);
        assert_eq!(store.audit_count(alert.id, AuditAction::Notified), 0);
    }

    #[tokio::test]
    async fn test_resolved_alert_is_not_notified() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (store, dispatcher, alert) = setup(notifier.clone());
        AlertStore::resolve(store.as_ref(), alert.id, Utc::now())
            .await
            .unwrap();

        assert_eq!(
            dispatcher.dispatch(&alert).await.unwrap(),
            DispatchOutcome::Skipped
        );
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_channel_until_shutdown() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (store, dispatcher, alert) = setup(notifier.clone());
        let (emitter, rx) = ChannelAlertEmitter::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(Arc::new(dispatcher).run(rx, shutdown_rx));
        emitter.alert_created(&alert);

        for _ in 0..50 {
            if store.audit_count(alert.id, AuditAction::Notified) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(notifier.sent.lock().len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_delivers_queued_alerts_on_shutdown() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (store, dispatcher, alert) = setup(notifier.clone());
        let (emitter, rx) = ChannelAlertEmitter::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Queued before the loop ever polls, then shutdown lands first
        emitter.alert_created(&alert);
        shutdown_tx.send(true).unwrap();
        Arc::new(dispatcher).run(rx, shutdown_rx).await;

        assert_eq!(notifier.sent.lock().as_slice(), &[(alert.id, 2)]);
        assert_eq!(store.audit_count(alert.id, AuditAction::Notified), 1);

        // Late emits after shutdown are dropped without panicking
        emitter.alert_created(&alert);
    }
}

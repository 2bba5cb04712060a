// Deferred and periodic task scheduling
//
// Confirmations run as independent deferred tasks: the scheduling call returns
// immediately and the task re-reads everything it needs when it fires. Sweeps
// run on fixed intervals until shutdown is signalled.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// A unit of deferred work
pub type DeferredTask = BoxFuture<'static, ()>;

/// Runs a task once after a delay
pub trait DeferredScheduler: Send + Sync {
    fn run_after(&self, delay: Duration, task: DeferredTask);
}

/// Tokio-backed scheduler. Each task sleeps on the runtime timer, holding no
/// locks while it waits.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    tracker: TaskTracker,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Number of tasks still waiting or running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new tasks and wait for the in-flight ones to finish
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl DeferredScheduler for TokioScheduler {
    fn run_after(&self, delay: Duration, task: DeferredTask) {
        self.tracker.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
    }
}

/// Invoke `handler` every `interval` until `shutdown` flips to true.
///
/// The first tick fires immediately.
pub fn run_every<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    handler().await;
                }
                _ = shutdown.changed() => {
                    debug!(loop_name = name, "Periodic loop: shutdown requested");
                    break;
                }
            }
        }

        debug!(loop_name = name, "Periodic loop exited");
    })
}

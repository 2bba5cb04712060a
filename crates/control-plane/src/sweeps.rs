// Periodic sweep loops
//
// One interval loop per sweep. Each tick runs the sweep to completion before
// the next one is considered; a failed run is logged and retried on the next
// tick.

use paperwatch_core::{run_every, ReconciliationEngine, SweepReport};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ServerConfig;

/// Sweep cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepIntervals {
    pub offline: Duration,
    pub stale_empty: Duration,
    pub retention: Duration,
}

impl From<&ServerConfig> for SweepIntervals {
    fn from(config: &ServerConfig) -> Self {
        Self {
            offline: config.offline_sweep_interval,
            stale_empty: config.stale_empty_sweep_interval,
            retention: config.retention_sweep_interval,
        }
    }
}

pub struct SweepRunner {
    handles: Vec<JoinHandle<()>>,
}

impl SweepRunner {
    /// Spawn the offline, stale-empty and retention loops.
    pub fn start(
        engine: ReconciliationEngine,
        intervals: SweepIntervals,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        info!(
            offline_secs = intervals.offline.as_secs(),
            stale_empty_secs = intervals.stale_empty.as_secs(),
            retention_secs = intervals.retention.as_secs(),
            "Starting sweep loops"
        );

        let offline = {
            let engine = engine.clone();
            run_every("offline_sweep", intervals.offline, shutdown.clone(), move || {
                let engine = engine.clone();
                async move { log_report("offline", engine.offline_sweep().await) }
            })
        };

        let stale_empty = {
            let engine = engine.clone();
            run_every(
                "stale_empty_sweep",
                intervals.stale_empty,
                shutdown.clone(),
                move || {
                    let engine = engine.clone();
                    async move { log_report("stale_empty", engine.stale_empty_sweep().await) }
                },
            )
        };

        let retention = run_every("retention_sweep", intervals.retention, shutdown, move || {
            let engine = engine.clone();
            async move { log_report("retention", engine.retention_sweep().await) }
        });

        Self {
            handles: vec![offline, stale_empty, retention],
        }
    }

    /// Wait for every loop to exit after shutdown was signalled
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Sweep loop panicked");
            }
        }
    }
}

fn log_report(sweep: &'static str, result: paperwatch_core::Result<SweepReport>) {
    match result {
        Ok(report) if report == SweepReport::default() => {
            debug!(sweep, "Sweep found nothing to do");
        }
        Ok(report) => {
            info!(
                sweep,
                scanned = report.scanned,
                updated = report.updated,
                alerts_opened = report.alerts_opened,
                failed = report.failed,
                purged = report.purged,
                "Sweep run"
            );
        }
        Err(e) => {
            error!(sweep, error = %e, "Sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use paperwatch_core::{
        AlertType, EngineConfig, InMemoryLocationDirectory, InMemoryStore, ManualClock,
        ManualScheduler, Stores, TelemetryReport,
    };
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_loops_run_and_stop() {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let stores = Stores::from_backend(store.clone(), Arc::new(InMemoryLocationDirectory::new()));
        let engine = ReconciliationEngine::new(
            stores,
            EngineConfig::default().with_offline_threshold(chrono::Duration::minutes(10)),
        )
        .with_clock(clock.clone())
        .with_scheduler(Arc::new(ManualScheduler::new()));

        engine
            .ingest(TelemetryReport {
                device_id: "D1".into(),
                paper_present: true,
                reserve_count: Some(2),
                status: None,
                name: None,
            })
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(15));

        let (tx, rx) = watch::channel(false);
        let runner = SweepRunner::start(
            engine,
            SweepIntervals {
                offline: Duration::from_secs(60),
                stale_empty: Duration::from_secs(60),
                retention: Duration::from_secs(3600),
            },
            rx,
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.open_alert_count("D1", AlertType::Offline), 1);

        tx.send(true).unwrap();
        runner.join().await;
    }
}

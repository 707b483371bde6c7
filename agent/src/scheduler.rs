//! Scheduler - runs passes once or on a fixed interval.

use crate::error::Result;
use crate::store::{LocalTables, RemoteTables};
use crate::sync::Reconciler;
use std::time::Duration;
use tablesync_engine::{PassReport, RunMode};
use tokio::sync::watch;

/// Drives a [`Reconciler`] in single-shot or continuous mode.
pub struct Runner<L, R> {
    reconciler: Reconciler<L, R>,
    interval: Duration,
}

impl<L: LocalTables, R: RemoteTables> Runner<L, R> {
    /// `interval` is the pause between the end of one pass and the start of
    /// the next.
    pub fn new(reconciler: Reconciler<L, R>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<L, R> {
        &self.reconciler
    }

    /// Run a single pass.
    pub async fn run_once(&self) -> Result<PassReport> {
        self.reconciler.run_pass(RunMode::SingleShot).await
    }

    /// Run passes until `shutdown` turns true or its sender is dropped.
    ///
    /// A pass that fails to start is logged and the loop carries on. Shutdown
    /// is only observed between passes. Returns the number of passes run.
    pub async fn run_continuous(&self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut passes = 0;
        tracing::info!(
            "Continuous sync every {}s after each pass",
            self.interval.as_secs_f64()
        );

        while !*shutdown.borrow() {
            match self.reconciler.run_pass(RunMode::Continuous).await {
                Ok(report) => {
                    let failed = report.summary().tables_failed;
                    if failed > 0 {
                        tracing::warn!("{} table(s) failed this pass", failed);
                    }
                }
                Err(e) => tracing::error!("Sync pass aborted: {}", e),
            }
            passes += 1;

            if !wait(&mut shutdown, self.interval).await {
                break;
            }
        }

        tracing::info!("Sync loop stopped after {} pass(es)", passes);
        passes
    }
}

/// Sleep for `interval`. Returns false if shutdown was requested meanwhile.
async fn wait(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return !*shutdown.borrow(),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

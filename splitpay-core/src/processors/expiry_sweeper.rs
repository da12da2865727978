//! ExpirySweeper processor.
//!
//! Every `sweep_interval` the sweeper lists pending split requests past their
//! deadline and expires them through the ledger's conditional write. A
//! payment that lands first wins that write, so the sweep never overrides a
//! completed payment.

use crate::config::{ConfigStore, ConfigWatcher, ExpiryConfig};
use crate::ledger::{LedgerError, MarkExpiredOutcome, SplitLedger};
use crate::store::SplitStore;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct ExpirySweeper<S> {
    ledger: SplitLedger<S>,
}

impl<S: SplitStore> ExpirySweeper<S> {
    pub fn new(ledger: SplitLedger<S>) -> Self {
        Self { ledger }
    }

    /// Expire up to `batch` overdue requests; returns how many this call
    /// expired.
    pub async fn sweep(&self, batch: i64) -> Result<usize, LedgerError> {
        let overdue = self
            .ledger
            .overdue_requests(time::OffsetDateTime::now_utc(), batch)
            .await?;
        let mut expired = 0;
        for request_id in overdue {
            match self.ledger.mark_expired(request_id).await {
                Ok(MarkExpiredOutcome::Expired(_)) => expired += 1,
                Ok(MarkExpiredOutcome::AlreadyTerminal(request)) => {
                    debug!(
                        request_id = %request_id,
                        status = %request.status,
                        "Overdue request settled before sweep"
                    );
                }
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Failed to expire request");
                }
            }
        }
        Ok(expired)
    }

    /// Run the sweep loop until shutdown is signaled.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        config_store: ConfigStore<ExpiryConfig>,
        mut config_watcher: ConfigWatcher,
    ) {
        let mut config = config_store.snapshot().await;
        info!(
            interval_secs = config.sweep_interval.as_secs(),
            batch = config.sweep_batch,
            "ExpirySweeper started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("ExpirySweeper received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    config = config_store.snapshot().await;
                    info!(
                        interval_secs = config.sweep_interval.as_secs(),
                        batch = config.sweep_batch,
                        "ExpirySweeper config updated"
                    );
                }

                _ = tokio::time::sleep(config.sweep_interval) => {
                    match self.sweep(config.sweep_batch).await {
                        Ok(0) => {}
                        Ok(expired) => info!(expired = expired, "Expired overdue split requests"),
                        Err(e) => error!(error = %e, "Expiry sweep failed"),
                    }
                }
            }
        }

        info!("ExpirySweeper shutdown complete");
    }
}

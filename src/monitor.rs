//! Background polling of live blend readings for one batch.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::{BatchRepository, Snapshot};
use crate::catalog::ReferenceCatalog;
use crate::clock::Clock;
use crate::simulator::{self, BlendReading, ProcessSimulator};

/// Default time between two readings.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// Readings nobody picked up yet; further ticks are dropped while it is full.
const READING_BUFFER: usize = 16;

/// Everything the poll loop needs, detached from the repository that owns it.
pub struct MonitorConfig {
    pub batch_id: String,
    pub simulator: ProcessSimulator,
    pub interval: Duration,
}

/// Handle to a running poll loop.
///
/// The loop ends when the token from [`BlendMonitor::cancel_token`] is
/// cancelled, on [`BlendMonitor::stop`], or once the handle is dropped and
/// nobody is left to receive readings.
pub struct BlendMonitor {
    cancel: CancellationToken,
    readings: mpsc::Receiver<BlendReading>,
    handle: JoinHandle<()>,
}

impl BlendMonitor {
    /// Next reading, or `None` once the loop has stopped and the buffer is drained.
    pub async fn next_reading(&mut self) -> Option<BlendReading> {
        self.readings.recv().await
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            debug!("blend monitor task ended abnormally: {e}");
        }
    }
}

/// Spawns the poll loop on the current tokio runtime.
///
/// Each tick reads the latest published snapshot, so commands applied to the
/// repository after the loop starts show up in the next reading.
pub fn start(
    snapshots: watch::Receiver<Snapshot>,
    catalog: Arc<dyn ReferenceCatalog>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    mut rng: StdRng,
) -> BlendMonitor {
    let cancel = CancellationToken::new();
    let (tx, readings) = mpsc::channel(READING_BUFFER);
    let interval = config.interval.max(Duration::from_millis(1));

    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let batch_id = config.batch_id;
            info!(batch_id = %batch_id, "blend monitor started (interval={interval:?})");
            loop {
                let snapshot = Arc::clone(&*snapshots.borrow());
                let reading = simulator::blending_progress(
                    &snapshot,
                    catalog.as_ref(),
                    &batch_id,
                    &config.simulator,
                    clock.now(),
                    &mut rng,
                );

                match tx.try_send(reading) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => debug!("reading buffer full, tick skipped"),
                    Err(TrySendError::Closed(_)) => {
                        info!(batch_id = %batch_id, "blend monitor receiver gone");
                        break;
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(batch_id = %batch_id, "blend monitor stopped");
                        break;
                    }
                    _ = tx.closed() => {
                        info!(batch_id = %batch_id, "blend monitor receiver gone");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        })
    };

    BlendMonitor {
        cancel,
        readings,
        handle,
    }
}

impl BatchRepository {
    /// Starts polling simulated readings for `batch_id` every `interval`.
    pub fn watch_blending(
        &self,
        batch_id: &str,
        simulator: ProcessSimulator,
        interval: Duration,
        rng: StdRng,
    ) -> BlendMonitor {
        start(
            self.subscribe(),
            self.shared_catalog(),
            self.clock(),
            MonitorConfig {
                batch_id: batch_id.to_string(),
                simulator,
                interval,
            },
            rng,
        )
    }
}

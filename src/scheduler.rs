use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::Pipeline;

/// Drives the recurring ingestion loop: one full open-ended cycle, a
/// fixed delay, repeat. A new cycle only starts after the previous one
/// fully completes.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval_seconds: u64, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            interval: Duration::from_secs(interval_seconds),
            shutdown,
        }
    }

    /// Runs until the shutdown token fires. Cancellation mid-cycle
    /// abandons in-flight I/O; writes the reconciler already committed
    /// stand. A failed cycle is logged and the loop waits for the next
    /// tick.
    pub async fn run(self) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "background cycle loop started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.pipeline.run(1, None) => match result {
                    Ok(stats) => info!(
                        parsed = stats.parsed_count,
                        created = stats.created_count,
                        updated = stats.updated_count,
                        "scheduled cycle completed"
                    ),
                    Err(e) => error!(error = %e, "scheduled cycle failed"),
                },
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("background cycle loop stopped");
    }
}

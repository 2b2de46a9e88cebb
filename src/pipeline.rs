use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::fetcher::PageFetcher;
use crate::notifier::Notifier;
use crate::reconciler::Reconciler;
use crate::utils::error::{AppError, Result};

/// Counts reported back to whoever triggered the cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleStats {
    pub parsed_count: usize,
    pub created_count: usize,
    pub updated_count: usize,
}

/// One full Fetcher -> Reconciler -> Notifier cycle. Runs are
/// serialized behind a single lock so a scheduled cycle and an
/// on-demand trigger never interleave their writes.
pub struct Pipeline {
    fetcher: PageFetcher,
    reconciler: Reconciler,
    notifier: Notifier,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(fetcher: PageFetcher, reconciler: Reconciler, notifier: Notifier) -> Self {
        Self {
            fetcher,
            reconciler,
            notifier,
            run_lock: Mutex::new(()),
        }
    }

    /// Execute one cycle over the given page range. The range is
    /// validated before any fetch happens; an empty parse is a normal
    /// zero-count outcome, not an error.
    pub async fn run(&self, start_page: u32, end_page: Option<u32>) -> Result<CycleStats> {
        if start_page < 1 {
            return Err(AppError::Validation("start_page must be >= 1".to_string()));
        }
        if let Some(end_page) = end_page {
            if end_page < start_page {
                return Err(AppError::Validation(
                    "end_page must be greater than or equal to start_page".to_string(),
                ));
            }
        }

        let _guard = self.run_lock.lock().await;

        let outcome = self.fetcher.fetch_pages(start_page, end_page).await;
        if outcome.products.is_empty() {
            return Ok(CycleStats::default());
        }

        let result = self.reconciler.reconcile(&outcome.products).await?;
        self.notifier.notify_cycle(&result).await;

        let stats = CycleStats {
            parsed_count: outcome.products.len(),
            created_count: result.created.len(),
            updated_count: result.updated.len(),
        };
        info!(
            parsed = stats.parsed_count,
            created = stats.created_count,
            updated = stats.updated_count,
            "cycle completed"
        );
        Ok(stats)
    }
}

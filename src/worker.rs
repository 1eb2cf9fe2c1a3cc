use std::ops::AddAssign;

use log::{error, info, warn};

use crate::config::{HarvesterConfig, SiteConfig};
use crate::coordinator::{WorkCoordinator, WorkerStatus};
use crate::crawler::{CrawlSummary, PageProcessor};
use crate::delay_manager;
use crate::error::CrawlError;
use crate::models::SearchCategory;
use crate::pagination::PaginationSession;
use crate::sink::CaseSink;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub pages_completed: u64,
    pub pages_failed: u64,
    /// Pages finished after the lease had already moved to another worker.
    pub leases_lost: u64,
    pub records: CrawlSummary,
}

impl AddAssign<CrawlSummary> for WorkerSummary {
    fn add_assign(&mut self, records: CrawlSummary) {
        self.records += records;
    }
}

/// Identity a worker registers under.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub hostname: String,
}

impl WorkerIdentity {
    pub fn new(worker_id: impl Into<String>, hostname: impl Into<String>) -> Self {
        WorkerIdentity { worker_id: worker_id.into(), hostname: hostname.into() }
    }

    /// `{hostname}-{8 hex chars}`.
    pub fn generate(hostname: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        WorkerIdentity::new(format!("{}-{}", hostname, &suffix[..8]), hostname)
    }
}

/// Leases pages of `category` from the coordinator until none are pending.
///
/// One pagination session is kept across pages. A lease ahead of it is
/// reached by advancing; a lease behind it costs a replay from page 1.
pub fn run_worker<T: Transport, S: CaseSink>(
    coordinator: &WorkCoordinator,
    transport: &T,
    site: &SiteConfig,
    config: &HarvesterConfig,
    sink: S,
    identity: &WorkerIdentity,
    category: SearchCategory,
) -> Result<WorkerSummary, CrawlError> {
    let worker_id = identity.worker_id.as_str();
    coordinator.register_worker(worker_id, &identity.hostname)?;
    info!("Worker {} on {} started for {}", worker_id, identity.hostname, category);

    let mut processor = PageProcessor::new(transport, site, config, sink);
    let mut session = PaginationSession::new(transport, site, category, &config.search_criteria);
    let mut summary = WorkerSummary::default();

    while let Some(page) = coordinator.get_next_page(category, worker_id)? {
        info!("Worker {}: Processing page {}", worker_id, page);

        let positioned = session.seek(page).map(|m| m.map(str::to_owned));
        match positioned {
            Ok(Some(markup)) => {
                let outcome = processor.process_page(category, page, &markup, None);
                summary += outcome.summary;
                if coordinator.mark_page_complete(category, page, worker_id)? {
                    summary.pages_completed += 1;
                    info!(
                        "Worker {}: Completed page {} (Total: {})",
                        worker_id, page, summary.pages_completed
                    );
                } else {
                    summary.leases_lost += 1;
                }
            }
            Ok(None) => {
                warn!("Worker {}: {} page {} is past the end of the listing", worker_id, category, page);
                coordinator.mark_page_failed(category, page, worker_id)?;
                coordinator.heartbeat(worker_id)?;
                summary.pages_failed += 1;
            }
            Err(e) => {
                error!("Worker {}: Error on page {}: {}", worker_id, page, e);
                coordinator.mark_page_failed(category, page, worker_id)?;
                coordinator.heartbeat(worker_id)?;
                summary.pages_failed += 1;
                session = PaginationSession::new(transport, site, category, &config.search_criteria);
            }
        }
        delay_manager::page_delay(config.page_delay);
    }

    coordinator.set_worker_status(worker_id, WorkerStatus::Idle)?;
    info!(
        "Worker {} finished: {} pages completed, {} failed, {} records stored",
        worker_id, summary.pages_completed, summary.pages_failed, summary.records.stored
    );
    Ok(summary)
}

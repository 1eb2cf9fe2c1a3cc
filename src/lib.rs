pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod crawler;
pub mod daily;
pub mod date_utils;
pub mod delay_manager;
pub mod error;
pub mod extractor;
pub mod logger;
pub mod markup;
pub mod models;
pub mod pagination;
pub mod postback;
pub mod record_fetcher;
pub mod sink;
pub mod transport;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

// Exporting types for convenience
pub use checkpoint::{CategoryProgress, DailyDocketProgress, ResumeCheckpoint};
pub use config::{HarvesterConfig, SiteConfig};
pub use coordinator::{PageStatus, PageWorkItem, Progress, WorkCoordinator, WorkerRegistration, WorkerStatus};
pub use crawler::{CrawlSummary, Crawler};
pub use daily::{DailyDocketCrawler, DailySummary};
pub use error::CrawlError;
pub use extractor::{Extraction, RecordExtractor};
pub use models::{CaseRecord, ChargeRecord, ConvictionRecord, PendingRecord, SearchCategory};
pub use pagination::PaginationSession;
pub use sink::{CaseSink, CsvSink};
pub use transport::{HttpTransport, RetryPolicy, RetryingTransport, Transport};
pub use worker::{run_worker, WorkerIdentity, WorkerSummary};

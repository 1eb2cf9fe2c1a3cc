use std::ops::AddAssign;

use log::{debug, error, info, warn};

use crate::checkpoint::ResumeCheckpoint;
use crate::config::{HarvesterConfig, SiteConfig};
use crate::delay_manager;
use crate::error::CrawlError;
use crate::extractor::RecordExtractor;
use crate::models::SearchCategory;
use crate::pagination::PaginationSession;
use crate::postback::{has_page_marker, parse_listing};
use crate::record_fetcher::RecordFetcher;
use crate::sink::CaseSink;
use crate::transport::Transport;

/// Running counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: u64,
    pub stored: u64,
    pub sealed: u64,
    /// Records whose page could not be fetched.
    pub skipped: u64,
    /// Records stored in degraded form.
    pub extraction_errors: u64,
    pub sink_errors: u64,
    pub failed_categories: u64,
}

impl CrawlSummary {
    /// Listing entries handled in any way.
    pub fn records_seen(&self) -> u64 {
        self.stored + self.sealed + self.skipped + self.sink_errors
    }

    /// Entries that were fetched or attempted. Sealed ones are not counted.
    pub fn records_attempted(&self) -> u64 {
        self.stored + self.skipped + self.sink_errors
    }
}

impl AddAssign for CrawlSummary {
    fn add_assign(&mut self, other: CrawlSummary) {
        self.pages += other.pages;
        self.stored += other.stored;
        self.sealed += other.sealed;
        self.skipped += other.skipped;
        self.extraction_errors += other.extraction_errors;
        self.sink_errors += other.sink_errors;
        self.failed_categories += other.failed_categories;
    }
}

/// What one results page produced.
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    pub summary: CrawlSummary,
    pub last_item_ref: Option<String>,
    pub limit_reached: bool,
}

/// Fetch, extract and store every record linked from one results page.
/// Failures are counted per record and never abort the page.
pub struct PageProcessor<'a, T: Transport, S: CaseSink> {
    fetcher: RecordFetcher<'a, T>,
    extractor: RecordExtractor,
    sink: S,
    config: &'a HarvesterConfig,
}

impl<'a, T: Transport, S: CaseSink> PageProcessor<'a, T, S> {
    pub fn new(transport: &'a T, site: &'a SiteConfig, config: &'a HarvesterConfig, sink: S) -> Self {
        PageProcessor {
            fetcher: RecordFetcher::new(transport, site, config.record_retry_policy()),
            extractor: RecordExtractor::new(),
            sink,
            config,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// `budget` caps the records attempted on this page. Sealed entries
    /// do not use it up.
    pub fn process_page(
        &mut self,
        category: SearchCategory,
        page: u32,
        markup: &str,
        budget: Option<usize>,
    ) -> PageOutcome {
        let entries = parse_listing(markup);
        info!("{} page {}: {} records listed", category, page, entries.len());

        let mut outcome = PageOutcome::default();
        outcome.summary.pages = 1;
        let mut handled = 0usize;

        for entry in entries {
            if budget.map_or(false, |b| handled >= b) {
                outcome.limit_reached = true;
                break;
            }
            outcome.last_item_ref = Some(entry.href.clone());

            if entry.sealed {
                debug!("Skipping sealed record: {}", entry.title);
                outcome.summary.sealed += 1;
                continue;
            }
            handled += 1;

            let fetched = match self.fetcher.fetch(&entry.href) {
                Ok(f) => f,
                Err(e) => {
                    warn!("Skipping record {}: {}", entry.href, e);
                    outcome.summary.skipped += 1;
                    continue;
                }
            };
            if fetched.kind != category {
                debug!("{} listed under {} but is a {} record", entry.href, category, fetched.kind);
            }

            let extraction = self.extractor.extract(&fetched.body, fetched.kind, &fetched.url);
            if extraction.is_degraded() {
                outcome.summary.extraction_errors += 1;
            }

            match self.sink.store(&extraction.record) {
                Ok(()) => {
                    outcome.summary.stored += 1;
                    debug!("Stored {}", extraction.record.identity().docket_number());
                }
                Err(e) => {
                    error!("Failed to store {}: {}", entry.href, e);
                    outcome.summary.sink_errors += 1;
                }
            }
            delay_manager::record_delay(self.config.record_delay);
        }

        if budget.map_or(false, |b| handled >= b) {
            outcome.limit_reached = true;
        }
        outcome
    }
}

/// Standalone traversal driven by the resume checkpoint.
pub struct Crawler<'a, T: Transport, S: CaseSink> {
    transport: &'a T,
    site: &'a SiteConfig,
    config: &'a HarvesterConfig,
    checkpoint: &'a mut ResumeCheckpoint,
    processor: PageProcessor<'a, T, S>,
}

impl<'a, T: Transport, S: CaseSink> Crawler<'a, T, S> {
    pub fn new(
        transport: &'a T,
        site: &'a SiteConfig,
        config: &'a HarvesterConfig,
        checkpoint: &'a mut ResumeCheckpoint,
        sink: S,
    ) -> Self {
        Crawler {
            transport,
            site,
            config,
            checkpoint,
            processor: PageProcessor::new(transport, site, config, sink),
        }
    }

    pub fn into_sink(self) -> S {
        self.processor.into_sink()
    }

    /// Crawls each category in turn. A category that fails is logged and
    /// counted; the next one still runs.
    pub fn run(&mut self, categories: &[SearchCategory]) -> CrawlSummary {
        let mut total = CrawlSummary::default();
        for &category in categories {
            match self.crawl_category(category) {
                Ok(summary) => {
                    info!(
                        "{} done: {} pages, {} stored, {} sealed, {} skipped, {} degraded, {} not stored",
                        category,
                        summary.pages,
                        summary.stored,
                        summary.sealed,
                        summary.skipped,
                        summary.extraction_errors,
                        summary.sink_errors
                    );
                    total += summary;
                }
                Err(e) => {
                    error!("{} crawl stopped: {}", category, e);
                    total.failed_categories += 1;
                }
            }
        }
        self.save_checkpoint();
        total
    }

    /// Writes progress made since the last cadence flush.
    fn save_checkpoint(&mut self) {
        if let Err(e) = self.checkpoint.persist() {
            error!("Failed to save checkpoint {:?}: {}", self.checkpoint.path(), e);
        }
    }

    pub fn crawl_category(&mut self, category: SearchCategory) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::default();
        if self.checkpoint.should_skip(category) {
            info!("Skipping {} search - already completed", category);
            return Ok(summary);
        }

        let config = self.config;
        let resume = self.checkpoint.resume_page(category);
        let mut total_processed = self.checkpoint.progress(category).total_processed;
        let mut session = PaginationSession::new(self.transport, self.site, category, &config.search_criteria);

        let opened = if resume > 1 {
            info!("Resuming {} from page {}", category, resume);
            session.seek(resume).map(|m| m.is_some())
        } else {
            session.fetch_first_page().map(|_| true)
        };
        let positioned = opened.map_err(|source| CrawlError::Search { category, source })?;
        if !positioned {
            warn!("{} listing ends before checkpoint page {}", category, resume);
            self.checkpoint.mark_complete(category);
            return Ok(summary);
        }

        let mut handled = 0usize;
        loop {
            let page = session.current_index();
            let Some(markup) = session.current_markup() else { break };
            if !has_page_marker(markup, page) {
                info!("No {} results on page {}", category, page);
                break;
            }

            let budget = config.record_limit.map(|limit| limit.saturating_sub(handled));
            let outcome = self.processor.process_page(category, page, markup, budget);
            handled += outcome.summary.records_attempted() as usize;
            total_processed += outcome.summary.records_seen();
            summary += outcome.summary;

            self.checkpoint
                .update_progress(category, page, outcome.last_item_ref, total_processed);

            if outcome.limit_reached {
                info!("Record limit reached for {} at page {}", category, page);
                self.save_checkpoint();
                return Ok(summary);
            }

            delay_manager::page_delay(config.page_delay);
            if session.advance()?.is_none() {
                break;
            }
        }

        self.checkpoint.mark_complete(category);
        Ok(summary)
    }
}

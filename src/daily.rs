//! The daily docket: today's scheduled cases, listed one court at a time.
//!
//! The court picker is fetched once; each court is then posted with the
//! picker's hidden state and its listing is processed like a results page.
//! Finished courts are kept in the checkpoint so a rerun picks up at the
//! first unfinished one.

use std::collections::HashSet;

use log::{error, info, warn};
use scraper::{Html, Selector};

use crate::checkpoint::ResumeCheckpoint;
use crate::config::{HarvesterConfig, SiteConfig, COURT_FIELD};
use crate::crawler::{CrawlSummary, PageProcessor};
use crate::delay_manager;
use crate::error::CrawlError;
use crate::models::SearchCategory;
use crate::postback::{build_postback_form, scrape_hidden_fields};
use crate::sink::CaseSink;
use crate::transport::{Request, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Court {
    pub code: String,
    pub name: String,
}

/// Courts offered by the picker, in page order. The blank placeholder
/// option is not a court.
pub fn parse_court_codes(markup: &str) -> Vec<Court> {
    let document = Html::parse_document(markup);
    let Ok(options) = Selector::parse("option[value]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut courts = Vec::new();
    for option in document.select(&options) {
        let code = option.value().attr("value").unwrap_or_default().trim();
        if code.is_empty() || !seen.insert(code.to_string()) {
            continue;
        }
        courts.push(Court {
            code: code.to_string(),
            name: option.text().collect::<String>().trim().to_string(),
        });
    }
    courts
}

/// The case count a court listing announces.
pub fn record_count(markup: &str) -> Option<u32> {
    let document = Html::parse_document(markup);
    let label = Selector::parse("span#cphBody_lblRecordCount").ok()?;
    let text = document.select(&label).next()?.text().collect::<String>();
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailySummary {
    pub courts_completed: u64,
    pub courts_skipped: u64,
    pub courts_failed: u64,
    pub records: CrawlSummary,
}

pub struct DailyDocketCrawler<'a, T: Transport, S: CaseSink> {
    transport: &'a T,
    site: &'a SiteConfig,
    config: &'a HarvesterConfig,
    checkpoint: &'a mut ResumeCheckpoint,
    processor: PageProcessor<'a, T, S>,
}

impl<'a, T: Transport, S: CaseSink> DailyDocketCrawler<'a, T, S> {
    pub fn new(
        transport: &'a T,
        site: &'a SiteConfig,
        config: &'a HarvesterConfig,
        checkpoint: &'a mut ResumeCheckpoint,
        sink: S,
    ) -> Self {
        DailyDocketCrawler {
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

    /// Crawls every court, or only the codes in `only` when it is not empty.
    /// A court that fails is logged and left unfinished; the rest still run.
    /// The docket is marked complete only after a full, clean pass.
    pub fn run(&mut self, only: &[String]) -> Result<DailySummary, CrawlError> {
        let mut summary = DailySummary::default();
        if only.is_empty() && self.checkpoint.daily_progress().completed {
            info!("Skipping daily docket - already completed");
            return Ok(summary);
        }

        let url = self.site.daily_docket_url();
        info!("Loading daily docket court list...");
        let picker = self.transport.exchange(&Request::get(url.clone()))?;
        if picker.status != 200 {
            warn!("Daily docket page returned HTTP {}", picker.status);
        }

        let mut courts = parse_court_codes(&picker.body);
        if !only.is_empty() {
            courts.retain(|c| only.contains(&c.code));
            for code in only.iter().filter(|code| !courts.iter().any(|c| &c.code == *code)) {
                warn!("Court {} is not offered by the daily docket", code);
            }
        }
        if courts.is_empty() {
            warn!("No courts found on the daily docket page");
        }
        let hidden = scrape_hidden_fields(&picker.body);

        let mut handled = 0usize;
        for court in &courts {
            if self.checkpoint.should_skip_court(&court.code) {
                info!("Skipping court {} - already completed", court.code);
                summary.courts_skipped += 1;
                continue;
            }

            let mut criteria = self.config.search_criteria.clone();
            criteria.insert(COURT_FIELD.to_string(), court.code.clone());
            let form = build_postback_form(&hidden, &criteria, None);
            let listing = match self
                .transport
                .exchange(&Request::post_form(url.clone(), form).with_referer(url.clone()))
            {
                Ok(resp) if resp.status == 200 => resp.body,
                Ok(resp) => {
                    error!("Daily docket for court {} returned HTTP {}", court.code, resp.status);
                    summary.courts_failed += 1;
                    continue;
                }
                Err(e) => {
                    error!("Daily docket for court {} failed: {}", court.code, e);
                    summary.courts_failed += 1;
                    continue;
                }
            };

            match record_count(&listing) {
                Some(count) => info!("Court {} ({}): {} cases on the docket", court.code, court.name, count),
                None => warn!("Court {} ({}): no record count on the listing", court.code, court.name),
            }

            let budget = self.config.record_limit.map(|limit| limit.saturating_sub(handled));
            let outcome = self.processor.process_page(SearchCategory::Pending, 1, &listing, budget);
            handled += outcome.summary.records_attempted() as usize;
            summary.records += outcome.summary;

            if outcome.limit_reached {
                info!("Record limit reached in court {}", court.code);
                self.save_checkpoint();
                return Ok(summary);
            }

            self.checkpoint.mark_court_complete(&court.code);
            summary.courts_completed += 1;
            delay_manager::page_delay(self.config.page_delay);
        }

        if only.is_empty() && summary.courts_failed == 0 {
            self.checkpoint.mark_daily_complete();
        } else {
            self.save_checkpoint();
        }
        info!(
            "Daily docket: {} courts done, {} skipped, {} failed, {} records stored",
            summary.courts_completed, summary.courts_skipped, summary.courts_failed, summary.records.stored
        );
        Ok(summary)
    }

    fn save_checkpoint(&mut self) {
        if let Err(e) = self.checkpoint.persist() {
            error!("Failed to save checkpoint {:?}: {}", self.checkpoint.path(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_POSTBACK_PREFIX;
    use crate::testing::{quiet_config, DailyCourt, GridSite, ScriptedPortal, VecSink};

    fn site() -> SiteConfig {
        SiteConfig::new("https://portal.test/crdockets/", DEFAULT_POSTBACK_PREFIX).unwrap()
    }

    fn portal() -> ScriptedPortal {
        ScriptedPortal::new(GridSite::new(1, 1).with_record_kind(SearchCategory::Pending)).with_courts(vec![
            DailyCourt::new("G14H", "Hartford GA 14", 2),
            DailyCourt::new("K10K", "Danielson GA 11", 1),
            DailyCourt::new("H12H", "Manchester GA 12", 2),
        ])
    }

    #[test]
    fn court_options_skip_the_placeholder() {
        let markup = r#"<select><option value="">Select a court</option>
<option value="G14H"> Hartford GA 14 </option><option value="K10K">Danielson GA 11</option>
<option value="G14H">Hartford GA 14</option></select>"#;
        let courts = parse_court_codes(markup);
        assert_eq!(
            courts,
            vec![
                Court { code: "G14H".into(), name: "Hartford GA 14".into() },
                Court { code: "K10K".into(), name: "Danielson GA 11".into() },
            ]
        );
    }

    #[test]
    fn listing_record_count() {
        assert_eq!(record_count(r#"<span id="cphBody_lblRecordCount">1,204</span>"#), Some(1204));
        assert_eq!(record_count("<span>12</span>"), None);
    }

    #[test]
    fn every_court_is_crawled_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let portal = portal();
        let site = site();
        let config = quiet_config();
        let mut checkpoint = ResumeCheckpoint::load(&path, 10);
        let mut sink = VecSink::default();

        let summary = DailyDocketCrawler::new(&portal, &site, &config, &mut checkpoint, &mut sink)
            .run(&[])
            .unwrap();

        assert_eq!(summary.courts_completed, 3);
        assert_eq!(summary.records.stored, 5);
        assert_eq!(portal.daily_posts(), vec!["G14H", "K10K", "H12H"]);
        assert_eq!(sink.dockets(), vec!["G14H-1", "G14H-2", "K10K-1", "H12H-1", "H12H-2"]);

        let reloaded = ResumeCheckpoint::load(&path, 10);
        assert!(reloaded.daily_progress().completed);
        assert_eq!(reloaded.daily_progress().last_court_code.as_deref(), Some("H12H"));
    }

    #[test]
    fn finished_courts_are_not_posted_again() {
        let dir = tempfile::tempdir().unwrap();
        let portal = portal();
        let site = site();
        let config = quiet_config();
        let mut checkpoint = ResumeCheckpoint::load(dir.path().join("c.json"), 10);
        checkpoint.mark_court_complete("G14H");
        let mut sink = VecSink::default();

        let summary = DailyDocketCrawler::new(&portal, &site, &config, &mut checkpoint, &mut sink)
            .run(&[])
            .unwrap();

        assert_eq!(summary.courts_skipped, 1);
        assert_eq!(portal.daily_posts(), vec!["K10K", "H12H"]);
        assert!(!portal.record_requests().iter().any(|d| d.starts_with("G14H")));
    }

    #[test]
    fn failed_court_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let portal = portal();
        portal.fail_court("K10K");
        let site = site();
        let config = quiet_config();
        let mut checkpoint = ResumeCheckpoint::load(dir.path().join("c.json"), 10);

        let summary = DailyDocketCrawler::new(&portal, &site, &config, &mut checkpoint, VecSink::default())
            .run(&[])
            .unwrap();

        assert_eq!(summary.courts_failed, 1);
        assert_eq!(summary.courts_completed, 2);
        assert!(!checkpoint.should_skip_court("K10K"));
        assert!(checkpoint.should_skip_court("H12H"));
        assert!(!checkpoint.daily_progress().completed);
    }

    #[test]
    fn selected_courts_only() {
        let dir = tempfile::tempdir().unwrap();
        let portal = portal();
        let site = site();
        let config = quiet_config();
        let mut checkpoint = ResumeCheckpoint::load(dir.path().join("c.json"), 10);
        let mut sink = VecSink::default();

        let summary = DailyDocketCrawler::new(&portal, &site, &config, &mut checkpoint, &mut sink)
            .run(&["H12H".to_string(), "X99X".to_string()])
            .unwrap();

        assert_eq!(summary.courts_completed, 1);
        assert_eq!(sink.dockets(), vec!["H12H-1", "H12H-2"]);
        // a partial pass does not finish the docket
        assert!(!checkpoint.daily_progress().completed);
    }

    #[test]
    fn record_limit_leaves_the_court_unfinished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let portal = portal();
        let site = site();
        let mut config = quiet_config();
        config.record_limit = Some(3);
        let mut checkpoint = ResumeCheckpoint::load(&path, 10);
        let mut sink = VecSink::default();

        DailyDocketCrawler::new(&portal, &site, &config, &mut checkpoint, &mut sink)
            .run(&[])
            .unwrap();

        assert_eq!(sink.dockets(), vec!["G14H-1", "G14H-2", "K10K-1"]);
        let reloaded = ResumeCheckpoint::load(&path, 10);
        assert_eq!(reloaded.daily_progress().completed_courts, vec!["G14H"]);
        assert!(!reloaded.daily_progress().completed);
    }
}

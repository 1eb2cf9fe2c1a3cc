use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::models::SearchCategory;
use crate::transport::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://www.jud2.ct.gov/crdockets/";
pub const DEFAULT_POSTBACK_PREFIX: &str = "_ctl0$cphBody$grdDockets$_ctl54$";
pub const SEARCH_BUTTON_FIELD: &str = "_ctl0:cphBody:btnSearch";
pub const COURT_FIELD: &str = "_ctl0:cphBody:ddlCourts";
pub const DEFAULT_DAILY_DOCKET_PATH: &str = "DailyDocket.aspx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const NONE: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub base_url: String,
    pub checkpoint_path: PathBuf,
    pub coordinator_path: PathBuf,
    /// Stop a category after this many records. Meant for bounded debug runs.
    pub record_limit: Option<usize>,
    pub checkpoint_flush_every: u32,
    pub transport_retry_delay_secs: u64,
    /// `None` retries transient failures forever.
    pub transport_max_attempts: Option<u32>,
    pub record_fetch_attempts: u32,
    pub record_retry_delay_secs: u64,
    pub page_delay: DelayRange,
    pub record_delay: DelayRange,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub postback_prefix: String,
    pub search_criteria: BTreeMap<String, String>,
    /// Page of the daily docket form, relative to `base_url`.
    pub daily_docket_path: String,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        let mut search_criteria = BTreeMap::new();
        search_criteria.insert("_ctl0:cphBody:txtDefendantFullName".to_string(), "_".to_string());
        for field in [
            "_ctl0:cphBody:txtFirstNameInitial",
            "_ctl0:cphBody:txtBirthYear",
            "_ctl0:cphBody:txtBirthYearRange",
            COURT_FIELD,
            "_ctl0:cphBody:ddlCaseType",
        ] {
            search_criteria.insert(field.to_string(), String::new());
        }

        HarvesterConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            checkpoint_path: PathBuf::from("scraping_checkpoint.json"),
            coordinator_path: PathBuf::from("scraping_coordinator.db"),
            record_limit: None,
            checkpoint_flush_every: 10,
            transport_retry_delay_secs: 60,
            transport_max_attempts: None,
            record_fetch_attempts: 3,
            record_retry_delay_secs: 5,
            page_delay: DelayRange { min_ms: 500, max_ms: 1500 },
            record_delay: DelayRange { min_ms: 200, max_ms: 800 },
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            postback_prefix: DEFAULT_POSTBACK_PREFIX.to_string(),
            search_criteria,
            daily_docket_path: DEFAULT_DAILY_DOCKET_PATH.to_string(),
        }
    }
}

impl HarvesterConfig {
    /// Reads a JSON config. A missing file is not an error: defaults apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {:?}. Using defaults.", path);
            return Ok(HarvesterConfig::default());
        }

        let content = fs::read_to_string(path)?;
        let config: HarvesterConfig = serde_json::from_str(&content)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn transport_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.transport_max_attempts,
            delay: Duration::from_secs(self.transport_retry_delay_secs),
        }
    }

    pub fn record_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::bounded(
            self.record_fetch_attempts.max(1),
            Duration::from_secs(self.record_retry_delay_secs),
        )
    }

    pub fn site(&self) -> Result<SiteConfig, ConfigError> {
        Ok(SiteConfig::new(&self.base_url, &self.postback_prefix)?.with_daily_docket_path(&self.daily_docket_path))
    }
}

/// Resolved endpoints of the docket portal.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    base: Url,
    pub postback_prefix: String,
    daily_docket_path: String,
}

impl SiteConfig {
    pub fn new(base_url: &str, postback_prefix: &str) -> Result<Self, ConfigError> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|source| ConfigError::Url {
            url: base_url.to_string(),
            source,
        })?;
        Ok(SiteConfig {
            base,
            postback_prefix: postback_prefix.to_string(),
            daily_docket_path: DEFAULT_DAILY_DOCKET_PATH.to_string(),
        })
    }

    pub fn with_daily_docket_path(mut self, path: &str) -> Self {
        self.daily_docket_path = path.trim_start_matches('/').to_string();
        self
    }

    fn join(&self, page: &str) -> String {
        match self.base.join(page) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base, page),
        }
    }

    /// The search form. Posting the criteria here yields page 1.
    pub fn search_url(&self, category: SearchCategory) -> String {
        match category {
            SearchCategory::Pending => self.join("parm1.aspx"),
            SearchCategory::Conviction => self.join("SearchByDefDisp.aspx"),
        }
    }

    /// Where "next page" postbacks are submitted.
    pub fn results_url(&self, category: SearchCategory) -> String {
        match category {
            SearchCategory::Pending => self.join("SearchResultsPending.aspx"),
            SearchCategory::Conviction => self.join("SearchResultsDisp.aspx"),
        }
    }

    /// Court picker of the daily docket. Posting a court here lists its cases.
    pub fn daily_docket_url(&self) -> String {
        self.join(&self.daily_docket_path)
    }

    pub fn record_referer(&self) -> String {
        self.join("SearchByCourt.aspx")
    }

    pub fn record_url(&self, href: &str) -> Result<Url, url::ParseError> {
        self.base.join(href.trim())
    }
}

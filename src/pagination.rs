use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::SiteConfig;
use crate::error::TransportError;
use crate::models::SearchCategory;
use crate::postback::{build_postback_form, derive_postback_target, has_page_marker, scrape_hidden_fields};
use crate::transport::{Request, Transport};

struct CurrentPage {
    index: u32,
    markup: String,
}

/// Walks one category's result grid through postbacks.
///
/// Page N can only be requested with state read out of page N-1, so the
/// session always holds the page it is on and only ever moves forward by
/// one. Reaching page N from scratch replays pages 1..N.
pub struct PaginationSession<'a, T: Transport> {
    transport: &'a T,
    site: &'a SiteConfig,
    category: SearchCategory,
    criteria: &'a BTreeMap<String, String>,
    current: Option<CurrentPage>,
    finished: bool,
}

impl<'a, T: Transport> PaginationSession<'a, T> {
    pub fn new(
        transport: &'a T,
        site: &'a SiteConfig,
        category: SearchCategory,
        criteria: &'a BTreeMap<String, String>,
    ) -> Self {
        PaginationSession {
            transport,
            site,
            category,
            criteria,
            current: None,
            finished: false,
        }
    }

    pub fn category(&self) -> SearchCategory {
        self.category
    }

    /// Index of the page held, 0 before the first fetch.
    pub fn current_index(&self) -> u32 {
        self.current.as_ref().map_or(0, |p| p.index)
    }

    pub fn current_markup(&self) -> Option<&str> {
        self.current.as_ref().map(|p| p.markup.as_str())
    }

    /// True once a page past the end was requested or no forward control exists.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Loads the search form for its hidden state and submits the criteria.
    /// Returns page 1's markup.
    pub fn fetch_first_page(&mut self) -> Result<&str, TransportError> {
        let search_url = self.site.search_url(self.category);
        info!("Loading {} search page...", self.category);

        let form_page = self.transport.exchange(&Request::get(search_url.clone()))?;
        if form_page.status != 200 {
            warn!("Search form for {} returned HTTP {}", self.category, form_page.status);
        }
        let hidden = scrape_hidden_fields(&form_page.body);
        let form = build_postback_form(&hidden, self.criteria, None);

        let resp = self
            .transport
            .exchange(&Request::post_form(search_url.clone(), form).with_referer(search_url))?;
        if resp.status != 200 {
            warn!("Search results for {} returned HTTP {}", self.category, resp.status);
        }

        self.finished = !has_page_marker(&resp.body, 1);
        if self.finished {
            info!("No result pages for {}", self.category);
        }
        let current = self.current.insert(CurrentPage { index: 1, markup: resp.body });
        Ok(current.markup.as_str())
    }

    /// Requests the page after `page_index` using state read from
    /// `current_markup`. `None` means there is no forward control: the grid
    /// ends at `page_index`.
    pub fn advance_from(&self, current_markup: &str, page_index: u32) -> Result<Option<String>, TransportError> {
        let Some(target) = derive_postback_target(current_markup, page_index, &self.site.postback_prefix) else {
            debug!("No postback control after page {} of {}", page_index, self.category);
            return Ok(None);
        };
        let hidden = scrape_hidden_fields(current_markup);
        let form = build_postback_form(&hidden, self.criteria, Some(&target));

        let results_url = self.site.results_url(self.category);
        let resp = self
            .transport
            .exchange(&Request::post_form(results_url.clone(), form).with_referer(results_url))?;
        if resp.status != 200 {
            warn!("Page {} of {} returned HTTP {}", page_index + 1, self.category, resp.status);
        }
        Ok(Some(resp.body))
    }

    fn step(&mut self) -> Result<bool, TransportError> {
        if self.finished {
            return Ok(false);
        }
        let Some(current) = self.current.as_ref() else {
            self.fetch_first_page()?;
            return Ok(!self.finished);
        };

        let next_index = current.index + 1;
        match self.advance_from(&current.markup, current.index)? {
            Some(markup) if has_page_marker(&markup, next_index) => {
                self.current = Some(CurrentPage { index: next_index, markup });
                Ok(true)
            }
            Some(_) => {
                info!("Page {} of {} has no page marker; listing exhausted", next_index, self.category);
                self.finished = true;
                Ok(false)
            }
            None => {
                self.finished = true;
                Ok(false)
            }
        }
    }

    /// Moves to the next page. `None` once the listing is exhausted.
    pub fn advance(&mut self) -> Result<Option<&str>, TransportError> {
        if !self.step()? {
            return Ok(None);
        }
        Ok(self.current_markup())
    }

    /// Positions the session on `page`, replaying every page in between.
    /// Going backwards restarts from page 1. `None` if the listing ends first.
    pub fn seek(&mut self, page: u32) -> Result<Option<&str>, TransportError> {
        let page = page.max(1);
        if self.current.is_none() || self.current_index() > page {
            self.finished = false;
            self.fetch_first_page()?;
            if self.finished {
                return Ok(None);
            }
        }

        let start = self.current_index();
        if page > start {
            info!("Replaying {} pages {}..={} to reach page {}", self.category, start + 1, page, page);
        }
        while self.current_index() < page {
            if !self.step()? {
                return Ok(None);
            }
        }
        Ok(self.current_markup())
    }
}

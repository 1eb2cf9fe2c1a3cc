use log::{debug, warn};

use crate::config::SiteConfig;
use crate::error::RecordFetchError;
use crate::extractor::detect_record_kind;
use crate::models::SearchCategory;
use crate::transport::{Request, RetryPolicy, Transport};

/// Anything shorter is an error stub, not a record page.
pub const MIN_BODY_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct FetchedRecord {
    pub url: String,
    pub kind: SearchCategory,
    pub body: String,
}

/// Loads single record pages. Retries here are about the portal answering
/// with the wrong page, on top of the transport's own retries.
pub struct RecordFetcher<'a, T: Transport> {
    transport: &'a T,
    site: &'a SiteConfig,
    policy: RetryPolicy,
}

impl<'a, T: Transport> RecordFetcher<'a, T> {
    pub fn new(transport: &'a T, site: &'a SiteConfig, policy: RetryPolicy) -> Self {
        RecordFetcher { transport, site, policy }
    }

    pub fn fetch(&self, href: &str) -> Result<FetchedRecord, RecordFetchError> {
        let url = self.site.record_url(href).map_err(|source| RecordFetchError::Url {
            href: href.to_string(),
            source,
        })?;
        let request = Request::get(url.as_str()).with_referer(self.site.record_referer());

        let mut attempt = 1;
        loop {
            match self.attempt(href, &request) {
                Ok(record) => return Ok(record),
                Err(e @ (RecordFetchError::Status { .. } | RecordFetchError::InvalidBody { .. })) => {
                    if !self.policy.allows_another(attempt) {
                        warn!("{} (attempt {}). Giving up on {}", e, attempt, href);
                        return Err(RecordFetchError::Exhausted { href: href.to_string(), attempts: attempt });
                    }
                    warn!("{} (attempt {}). Retrying...", e, attempt);
                    self.policy.pause();
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn attempt(&self, href: &str, request: &Request) -> Result<FetchedRecord, RecordFetchError> {
        let resp = self.transport.exchange(request)?;
        if resp.status != 200 {
            return Err(RecordFetchError::Status { href: href.to_string(), status: resp.status });
        }
        if resp.body.contains("Session Timeout") {
            return Err(RecordFetchError::InvalidBody {
                href: href.to_string(),
                reason: "session timeout page".to_string(),
            });
        }
        if resp.body.len() < MIN_BODY_LEN {
            return Err(RecordFetchError::InvalidBody {
                href: href.to_string(),
                reason: format!("only {} bytes", resp.body.len()),
            });
        }

        let kind = detect_record_kind(&resp.body)
            .ok_or_else(|| RecordFetchError::UnknownRecordType { href: href.to_string() })?;
        debug!("Fetched {} record {}", kind, href);
        Ok(FetchedRecord {
            url: request.url.clone(),
            kind,
            body: resp.body,
        })
    }
}

use std::thread;
use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER, USER_AGENT};

use crate::config::HarvesterConfig;
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    PostForm(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: Method,
    pub referer: Option<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Request { url: url.into(), method: Method::Get, referer: None }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Request { url: url.into(), method: Method::PostForm(form), referer: None }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Value of a posted form field, if this is a form post.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match &self.method {
            Method::PostForm(form) => form.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str()),
            Method::Get => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Response { status: 200, body: body.into() }
    }
}

/// One HTTP exchange. Status codes are data, not errors.
pub trait Transport {
    fn exchange(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).exchange(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).exchange(request)
    }
}

/// Cookie-keeping blocking client; the portal ties pagination to the session.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HarvesterConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| TransportError::Fatal(format!("invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(HttpTransport { client })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Transient(err.to_string())
    } else {
        TransportError::Fatal(err.to_string())
    }
}

impl Transport for HttpTransport {
    fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = match &request.method {
            Method::Get => self.client.get(&request.url),
            Method::PostForm(form) => self.client.post(&request.url).form(form),
        };
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer.as_str());
        }

        let resp = builder.send().map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(classify)?;
        Ok(Response { status, body })
    }
}

/// How often and how patiently to repeat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. `None` means no limit.
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        RetryPolicy { max_attempts: None, delay }
    }

    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy { max_attempts: Some(max_attempts), delay }
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_another(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    pub fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

/// Repeats transient failures of the inner transport per its policy.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        RetryingTransport { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl<T: Transport> Transport for RetryingTransport<T> {
    fn exchange(&self, request: &Request) -> Result<Response, TransportError> {
        let mut attempt = 1;
        loop {
            match self.inner.exchange(request) {
                Ok(resp) => return Ok(resp),
                Err(TransportError::Transient(msg)) => {
                    if !self.policy.allows_another(attempt) {
                        return Err(TransportError::Exhausted { attempts: attempt, last: msg });
                    }
                    warn!(
                        "{} (attempt {}). Waiting {} seconds before re-attempt...",
                        msg,
                        attempt,
                        self.policy.delay.as_secs()
                    );
                    self.policy.pause();
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

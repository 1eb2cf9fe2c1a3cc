use thiserror::Error;

use crate::models::SearchCategory;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, timeout, reset. Worth another attempt.
    #[error("transient transport failure: {0}")]
    Transient(String),
    #[error("transport failure: {0}")]
    Fatal(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[derive(Debug, Error)]
pub enum RecordFetchError {
    #[error("HTTP {status} for {href}")]
    Status { href: String, status: u16 },
    #[error("invalid response body for {href}: {reason}")]
    InvalidBody { href: String, reason: String },
    #[error("{href} is not a known record type")]
    UnknownRecordType { href: String },
    #[error("bad record link {href}: {source}")]
    Url { href: String, source: url::ParseError },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to get record {href} after {attempts} attempts")]
    Exhausted { href: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("table {0} not found")]
    TableNotFound(String),
    #[error("record markup has no {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("coordinator database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("bad timestamp {value:?} in coordinator ledger: {source}")]
    Timestamp { value: String, source: chrono::ParseError },
    #[error("unknown {kind} status {value:?} in coordinator ledger")]
    UnknownStatus { kind: &'static str, value: String },
    #[error("unknown search category {0:?} in coordinator ledger")]
    UnknownCategory(String),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("csv output error: {0}")]
    Csv(#[from] csv::Error),
    #[error("output file error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid base url {url:?}: {source}")]
    Url { url: String, source: url::ParseError },
}

/// Failures that stop a whole category run. Everything smaller is counted
/// in the summary instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("could not open {category} search: {source}")]
    Search { category: SearchCategory, source: TransportError },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
}

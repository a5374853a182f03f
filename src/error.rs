use crate::schema::SchemaViolation;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by flows, the chat agent and their backends.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider answers with a non-success status. Nothing in this crate
    /// retries on it; `retry_after` is surfaced so the caller can decide.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 500).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The model answered a structured call with something that is not JSON.
    #[error("Call '{call}' returned malformed output: {reason}")]
    MalformedOutput { call: String, reason: String },

    /// Structured output was JSON but did not conform to the declared schema.
    #[error("Call '{call}' violated its output schema: {violation}")]
    SchemaViolation {
        call: String,
        #[source]
        violation: SchemaViolation,
    },

    /// An array-framed call returned a different number of records than requested.
    #[error("Call '{call}' returned {actual} records, expected {expected}")]
    CountMismatch {
        call: String,
        expected: usize,
        actual: usize,
    },

    /// The call or turn was cancelled via the cancellation flag.
    #[error("Call was cancelled")]
    Cancelled,

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

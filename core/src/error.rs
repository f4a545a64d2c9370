//! Error types for the sync core.
//!
//! # Design
//! Errors are split by scope. `ApiError` and `ValidationError` describe one
//! failed call or one bad input entry; `SyncError` is what the engine turns
//! into a `failed` result for a single record. `RunError` is the only error
//! that escapes a run, and it is always raised before any record is touched.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by the remote client adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with an unexpected status.
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Server-signalled wait from a `Retry-After` header, if any.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connect, DNS, timeout, I/O).
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response was well-formed but lacked something the call needs.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    /// Whether another attempt at the same call could plausibly succeed.
    ///
    /// Rate limiting (429), server errors (5xx) and transport failures are
    /// transient. Authentication (401/403), bad identifiers (404) and every
    /// other client error are not, and neither are local encode/decode
    /// failures.
    pub fn is_retriable(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            ApiError::Transport(_) => true,
            ApiError::Deserialization(_)
            | ApiError::Serialization(_)
            | ApiError::UnexpectedResponse(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A malformed input entry or field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task content is missing or empty")]
    MissingContent,

    #[error("unsupported task entry: {0}")]
    UnsupportedEntry(String),

    #[error("field `{field}` is not a YYYY-MM-DD date: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Why a single record ended up `failed`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("invalid task: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: ApiError },
}

/// Errors that abort a whole run before any record is processed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("could not load existing tasks for duplicate detection: {0}")]
    IndexFetch(SyncError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ApiError {
        ApiError::Http {
            status,
            body: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn throttling_and_server_errors_are_retriable() {
        for status in [429, 500, 502, 503, 504, 599] {
            assert!(http(status).is_retriable(), "{status}");
        }
        assert!(ApiError::Transport("timed out".into()).is_retriable());
    }

    #[test]
    fn client_errors_are_not_retriable() {
        for status in [400, 401, 403, 404, 422] {
            assert!(!http(status).is_retriable(), "{status}");
        }
        assert!(!ApiError::Deserialization("eof".into()).is_retriable());
    }

    #[test]
    fn retry_exhausted_mentions_attempts_and_cause() {
        let err = SyncError::RetryExhausted {
            attempts: 3,
            last: http(503),
        };
        assert_eq!(err.to_string(), "gave up after 3 attempts: HTTP 503: ");
    }
}

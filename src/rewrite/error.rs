//! Error types of the rewrite engine.

use thiserror::Error;

/// Failure to build a middleware instance from its settings.
///
/// Fatal: no partially constructed instance is ever returned.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A rewrite pattern does not compile.
    #[error("error compiling regex {pattern:?} (rewrite #{index}): {source}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A trusted client-address header name is not a valid header name.
    #[error("invalid client ip header name {0:?}")]
    InvalidHeaderName(String),
}

/// A `Location` value that cannot be parsed or emitted.
///
/// Reported to the client as `500 Internal Server Error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed location {location:?}: {reason}")]
pub struct MalformedLocationError {
    pub location: String,
    pub reason: String,
}

impl MalformedLocationError {
    pub fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

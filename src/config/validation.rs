//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, URLs and value ranges
//! - Compile every rewrite pattern before the server starts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;
use regex::Regex;
use url::Url;

use crate::config::schema::AppConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            "upstream.url",
            format!("unsupported scheme {:?}, expected \"http\"", url.scheme()),
        )),
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("upstream.url", "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "upstream.url",
            format!("invalid URL {:?}: {}", config.upstream.url, e),
        )),
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let redirect = &config.redirect;
    if redirect.name.trim().is_empty() {
        errors.push(ValidationError::new("redirect.name", "must not be empty"));
    }
    for (i, rewrite) in redirect.rewrites.iter().enumerate() {
        if let Err(e) = Regex::new(&rewrite.regex) {
            errors.push(ValidationError::new(
                format!("redirect.rewrites[{}].regex", i),
                format!("error compiling regex {:?}: {}", rewrite.regex, e),
            ));
        }
    }
    for (i, name) in redirect.client_ip_headers.iter().enumerate() {
        if HeaderName::from_bytes(name.trim().as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("redirect.client_ip_headers[{}]", i),
                format!("invalid header name {:?}", name),
            ));
        }
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! redirect sidecar. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the redirect sidecar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Backend the sidecar forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Redirect middleware settings.
    pub redirect: RedirectConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "[::]:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the backend (e.g., "http://127.0.0.1:3000").
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Settings of one redirect middleware instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RedirectConfig {
    /// Instance name, attached to every log line of this instance.
    pub name: String,

    /// Enable forwarded-prefix reconciliation of the backend `Location`.
    pub default: bool,

    /// Ordered rewrite rules applied to the request URL.
    pub rewrites: Vec<RewriteConfig>,

    /// Which clients the rewrite rules apply to.
    pub scope: ClientScope,

    /// Single-address headers trusted when `X-Forwarded-For` is absent,
    /// checked in order.
    pub client_ip_headers: Vec<String>,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            name: "redirect-ipv6".to_string(),
            default: false,
            rewrites: Vec::new(),
            scope: ClientScope::default(),
            client_ip_headers: vec!["cf-connecting-ip".to_string(), "x-real-ip".to_string()],
        }
    }
}

/// One `(regex, replacement)` pair.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewriteConfig {
    /// Pattern matched against the absolute request URL.
    pub regex: String,

    /// Replacement template; supports `$1` and `${name}` references.
    pub replacement: String,
}

impl RewriteConfig {
    pub fn new(regex: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            replacement: replacement.into(),
        }
    }
}

/// Client population the rewrite rules target.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientScope {
    /// Only clients classified as IPv6.
    #[default]
    Ipv6,
    /// Every client, regardless of address family.
    Any,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

//! IPv6 redirect location middleware.
//!
//! Rewrites the `Location` header of backend responses for clients behind a
//! reverse proxy: restores stripped path prefixes and applies ordered regex
//! rewrites for IPv6 clients, promoting rewritten redirects to 301.

pub mod client;
pub mod config;
pub mod http;
pub mod net;
pub mod observability;
pub mod rewrite;

pub use config::schema::{AppConfig, RedirectConfig};
pub use http::{redirect_location_middleware, HttpServer, RedirectLocation};
pub use rewrite::{ConfigurationError, MalformedLocationError, RuleSet};

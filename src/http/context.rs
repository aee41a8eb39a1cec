//! Per-request view over the inbound request.
//!
//! Captured before the request is handed to the next handler, so the
//! rewrite decision sees what the client sent, not what the backend saw.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{header, uri::Scheme, HeaderMap, HeaderName, Request};

use crate::net::tls::TlsConnection;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PREFIX: HeaderName = HeaderName::from_static("x-forwarded-prefix");

/// Client address candidates, forwarded headers and the absolute request URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Socket peer, when the server recorded `ConnectInfo`.
    pub peer: Option<SocketAddr>,

    /// Every `X-Forwarded-For` entry, in header order, untrimmed.
    pub forwarded_for: Vec<String>,

    /// Values of the trusted single-address headers, in configured order.
    pub trusted_addresses: Vec<(HeaderName, String)>,

    /// `X-Forwarded-Host`, empty when absent.
    pub forwarded_host: String,

    /// `X-Forwarded-Prefix`, empty when absent.
    pub forwarded_prefix: String,

    /// `scheme://host/target` as the client requested it.
    pub request_url: String,
}

impl RequestContext {
    /// Capture the context of `req`.
    pub fn capture<B>(req: &Request<B>, trusted_headers: &[HeaderName]) -> Self {
        let headers = req.headers();

        let forwarded_for = headers
            .get_all(&X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::to_string)
            .collect();

        let trusted_addresses = trusted_headers
            .iter()
            .filter_map(|name| {
                header_str(headers, name).map(|value| (name.clone(), value.trim().to_string()))
            })
            .collect();

        Self {
            peer: req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
            forwarded_for,
            trusted_addresses,
            forwarded_host: header_str(headers, &X_FORWARDED_HOST)
                .unwrap_or_default()
                .trim()
                .to_string(),
            forwarded_prefix: header_str(headers, &X_FORWARDED_PREFIX)
                .unwrap_or_default()
                .trim()
                .to_string(),
            request_url: request_url(req),
        }
    }
}

/// Reconstruct the absolute URL of `req`.
///
/// The scheme follows the inbound connection; host and target are taken
/// verbatim from the request line and `Host` header.
pub fn request_url<B>(req: &Request<B>) -> String {
    let tls = req.extensions().get::<TlsConnection>().is_some()
        || req.uri().scheme() == Some(&Scheme::HTTPS);
    let scheme = if tls { "https" } else { "http" };

    let host = header_str(req.headers(), &header::HOST)
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default();

    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    format!("{scheme}://{host}{target}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (redirect rewriting, timeout, tracing, TLS tagging)
//! - Forward requests to the upstream backend
//! - Swap the redirect middleware instance on config reload
//! - Serve plain HTTP or TLS with graceful shutdown

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        uri::{Authority, Scheme},
        StatusCode, Uri, Version,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Extension, Router,
};
use arc_swap::ArcSwap;
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, RedirectConfig};
use crate::http::middleware::RedirectLocation;
use crate::net::tls::TlsConnection;
use crate::rewrite::ConfigurationError;

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid redirect configuration: {0}")]
    Redirect(#[from] ConfigurationError),

    #[error("invalid upstream URL {url:?}: {reason}")]
    Upstream { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Scheme, authority and base path of the backend.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
}

impl Upstream {
    pub fn from_url(url: &str) -> Result<Self, ServerError> {
        let invalid = |reason: &str| ServerError::Upstream {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|e: axum::http::uri::InvalidUri| invalid(&e.to_string()))?;
        let parts = uri.into_parts();
        let scheme = parts.scheme.ok_or_else(|| invalid("missing scheme"))?;
        let authority = parts.authority.ok_or_else(|| invalid("missing host"))?;
        let base_path = parts
            .path_and_query
            .map(|pq| pq.path().trim_end_matches('/').to_string())
            .unwrap_or_default();

        Ok(Self {
            scheme,
            authority,
            base_path,
        })
    }

    /// Target URI on the backend for an inbound request URI.
    pub fn uri_for(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let target = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(format!("{}{}", self.base_path, target))
            .build()
    }
}

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Arc<Upstream>,
}

/// Shared, swappable redirect middleware instance.
#[derive(Clone)]
pub struct RedirectHandle(Arc<ArcSwap<RedirectLocation>>);

impl RedirectHandle {
    pub fn new(redirect: RedirectLocation) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(redirect)))
    }

    /// The instance new requests will use.
    pub fn current(&self) -> Arc<RedirectLocation> {
        self.0.load_full()
    }

    /// Build a fresh instance from `config` and swap it in.
    ///
    /// On error the current instance stays in place.
    pub fn reload(&self, config: &RedirectConfig) -> Result<(), ConfigurationError> {
        let redirect = RedirectLocation::new(config)?;
        self.0.store(Arc::new(redirect));
        tracing::info!(instance = %config.name, "Redirect middleware reloaded");
        Ok(())
    }
}

/// HTTP server for the redirect sidecar.
pub struct HttpServer {
    config: AppConfig,
    state: AppState,
    redirect: RedirectHandle,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, ServerError> {
        let redirect = RedirectHandle::new(RedirectLocation::new(&config.redirect)?);
        let upstream = Arc::new(Upstream::from_url(&config.upstream.url)?);

        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Ok(Self {
            state: AppState { client, upstream },
            redirect,
            config,
        })
    }

    /// Handle used to reload the redirect middleware while serving.
    pub fn redirect_handle(&self) -> RedirectHandle {
        self.redirect.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(&self, tls: bool) -> Router {
        let router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(self.state.clone())
            .layer(middleware::from_fn_with_state(
                self.redirect.clone(),
                reloadable_redirect_middleware,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http());

        if tls {
            router.layer(Extension(TlsConnection))
        } else {
            router
        }
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), ServerError> {
        self.run_with_shutdown(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` completes.
    pub async fn run_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        let app = self.build_router(false).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS until Ctrl+C.
    pub async fn run_tls(self, addr: SocketAddr, tls: RustlsConfig) -> Result<(), ServerError> {
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        let app = self.build_router(true).into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Runs the redirect middleware instance current at request start.
async fn reloadable_redirect_middleware(
    State(redirect): State<RedirectHandle>,
    req: Request<Body>,
    next: Next,
) -> Response {
    redirect.current().handle(req, next).await
}

/// Forwards the request to the upstream backend.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    parts.uri = match state.upstream.uri_for(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, uri = %parts.uri, "Cannot build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        }
    };
    parts.version = Version::HTTP_11;

    tracing::debug!(method = %parts.method, uri = %parts.uri, "Proxying request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;

    #[test]
    fn test_upstream_uri_keeps_target() {
        let upstream = Upstream::from_url("http://127.0.0.1:3000").unwrap();
        let uri = upstream.uri_for(&"/a/b?c=d".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:3000/a/b?c=d");
    }

    #[test]
    fn test_upstream_base_path_is_prepended() {
        let upstream = Upstream::from_url("http://backend:8080/internal/").unwrap();
        let uri = upstream.uri_for(&"/login".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://backend:8080/internal/login");
    }

    #[test]
    fn test_upstream_requires_authority() {
        assert!(matches!(
            Upstream::from_url("/relative"),
            Err(ServerError::Upstream { .. })
        ));
    }

    #[test]
    fn test_reload_swaps_instance() {
        let handle = RedirectHandle::new(RedirectLocation::new(&RedirectConfig::default()).unwrap());
        assert!(handle.current().rules().is_empty());

        let config = RedirectConfig {
            rewrites: vec![RewriteConfig::new("a", "b")],
            ..Default::default()
        };
        handle.reload(&config).unwrap();
        assert_eq!(handle.current().rules().len(), 1);
    }

    #[test]
    fn test_failed_reload_keeps_instance() {
        let config = RedirectConfig {
            rewrites: vec![RewriteConfig::new("a", "b")],
            ..Default::default()
        };
        let handle = RedirectHandle::new(RedirectLocation::new(&config).unwrap());

        let broken = RedirectConfig {
            rewrites: vec![RewriteConfig::new("(", "b")],
            ..Default::default()
        };
        assert!(handle.reload(&broken).is_err());
        assert_eq!(handle.current().rules().len(), 1);
    }
}

//! Redirect location middleware.
//! Fixes the `Location` header of responses for IPv6 clients.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::client::AddressFamily;
use crate::config::{ClientScope, RedirectConfig};
use crate::http::context::RequestContext;
use crate::http::interceptor::RedirectInterceptor;
use crate::observability::{RedirectObserver, TracingObserver};
use crate::rewrite::{ConfigurationError, RuleSet};

/// One configured middleware instance.
///
/// Built once, then shared read-only by every request it handles.
pub struct RedirectLocation {
    name: String,
    rules: Arc<RuleSet>,
    scope: ClientScope,
    client_ip_headers: Vec<HeaderName>,
    observer: Arc<dyn RedirectObserver>,
}

impl RedirectLocation {
    /// Build an instance that logs through `tracing`.
    pub fn new(config: &RedirectConfig) -> Result<Self, ConfigurationError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Build an instance reporting to `observer`.
    pub fn with_observer(
        config: &RedirectConfig,
        observer: Arc<dyn RedirectObserver>,
    ) -> Result<Self, ConfigurationError> {
        let rules = RuleSet::from_config(config)?;
        let client_ip_headers = config
            .client_ip_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.trim().as_bytes())
                    .map_err(|_| ConfigurationError::InvalidHeaderName(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            instance = %config.name,
            default_handling = rules.default_handling(),
            rewrites = rules.len(),
            scope = ?config.scope,
            "Redirect middleware created"
        );

        Ok(Self {
            name: config.name.clone(),
            rules: Arc::new(rules),
            scope: config.scope,
            client_ip_headers,
            observer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn observer(&self) -> &dyn RedirectObserver {
        self.observer.as_ref()
    }

    pub fn scope_includes(&self, family: AddressFamily) -> bool {
        match self.scope {
            ClientScope::Ipv6 => family == AddressFamily::Ipv6,
            ClientScope::Any => true,
        }
    }

    /// Capture the request, run `next`, then commit the response head.
    pub async fn handle(&self, req: Request, next: Next) -> Response {
        let context = RequestContext::capture(&req, &self.client_ip_headers);
        let mut interceptor = RedirectInterceptor::open(self, context);

        let response = next.run(req).await;

        let (mut head, body) = response.into_parts();
        match interceptor.commit(&mut head) {
            Ok(()) => Response::from_parts(head, body),
            Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        }
    }
}

impl std::fmt::Debug for RedirectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectLocation")
            .field("name", &self.name)
            .field("rules", &self.rules)
            .field("scope", &self.scope)
            .field("client_ip_headers", &self.client_ip_headers)
            .finish_non_exhaustive()
    }
}

/// Axum entry point; install with `middleware::from_fn_with_state`.
pub async fn redirect_location_middleware(
    State(redirect): State<Arc<RedirectLocation>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    redirect.handle(req, next).await
}

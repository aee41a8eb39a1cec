//! Header-commit hook of the redirect middleware.
//!
//! # Lifecycle
//! ```text
//! Open           interceptor created with the captured RequestContext,
//!                request handed to the next handler
//! HeaderPending  next handler returned its response head (PendingResponse),
//!                not yet forwarded
//! Committed      commit() ran once; head is frozen
//! ```
//!
//! # Design Decisions
//! - Only the head is intercepted; the body streams through untouched
//! - Default handling and rule application are independent stages
//! - A second commit is a no-op

use axum::http::{header, response, HeaderValue, StatusCode};

use crate::client::{classify, ClientAddress};
use crate::http::context::RequestContext;
use crate::http::middleware::RedirectLocation;
use crate::rewrite::{reconcile_prefix, MalformedLocationError};

/// The status and headers the wrapped handler intends to send.
pub type PendingResponse = response::Parts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Committed,
}

/// Per-request decorator deciding the final `Location` and status.
pub struct RedirectInterceptor<'a> {
    instance: &'a RedirectLocation,
    context: RequestContext,
    phase: Phase,
}

impl<'a> RedirectInterceptor<'a> {
    pub fn open(instance: &'a RedirectLocation, context: RequestContext) -> Self {
        Self {
            instance,
            context,
            phase: Phase::Open,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Finalize `head`: reconcile the prefix, then apply the rewrite rules.
    ///
    /// On error the head must not be sent; the caller answers 500 instead.
    pub fn commit(&mut self, head: &mut PendingResponse) -> Result<(), MalformedLocationError> {
        if self.phase == Phase::Committed {
            return Ok(());
        }
        self.phase = Phase::Committed;

        let result = self.finalize(head);
        if let Err(err) = &result {
            self.instance
                .observer()
                .malformed_location(self.instance.name(), err);
        }
        result
    }

    fn finalize(&self, head: &mut PendingResponse) -> Result<(), MalformedLocationError> {
        if self.instance.rules().default_handling() {
            self.reconcile_location(head)?;
        }

        let client = classify(&self.context);
        self.instance
            .observer()
            .client_classified(self.instance.name(), &client);

        if self.rules_apply_to(&client) {
            self.rewrite_location(head)?;
        }
        Ok(())
    }

    fn rules_apply_to(&self, client: &ClientAddress) -> bool {
        !self.instance.rules().is_empty() && self.instance.scope_includes(client.family)
    }

    fn reconcile_location(&self, head: &mut PendingResponse) -> Result<(), MalformedLocationError> {
        let Some(value) = head.headers.get(header::LOCATION) else {
            return Ok(());
        };
        // Raw UTF-8 (obs-text) is accepted; anything else is malformed.
        let location = std::str::from_utf8(value.as_bytes()).map_err(|err| {
            MalformedLocationError::new(String::from_utf8_lossy(value.as_bytes()), err.to_string())
        })?;

        let reconciled = reconcile_prefix(
            location,
            &self.context.forwarded_host,
            &self.context.forwarded_prefix,
        )?;
        if reconciled != location {
            self.instance
                .observer()
                .prefix_reconciled(self.instance.name(), location, &reconciled);
            head.headers.insert(header::LOCATION, location_value(&reconciled)?);
        }
        Ok(())
    }

    fn rewrite_location(&self, head: &mut PendingResponse) -> Result<(), MalformedLocationError> {
        let original = &self.context.request_url;
        let outcome = self.instance.rules().apply(original);

        for substitution in &outcome.substitutions {
            self.instance
                .observer()
                .location_rewritten(self.instance.name(), substitution);
        }

        if outcome.changed(original) {
            head.headers
                .insert(header::LOCATION, location_value(&outcome.location)?);
            head.status = StatusCode::MOVED_PERMANENTLY;
        }
        Ok(())
    }
}

fn location_value(location: &str) -> Result<HeaderValue, MalformedLocationError> {
    HeaderValue::from_bytes(location.as_bytes())
        .map_err(|err| MalformedLocationError::new(location, err.to_string()))
}

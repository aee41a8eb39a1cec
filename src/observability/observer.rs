//! Diagnostic sink of the redirect middleware.
//!
//! The interceptor never logs directly; it reports to the observer it was
//! constructed with. [`TracingObserver`] is the production sink.

use crate::client::ClientAddress;
use crate::observability::metrics;
use crate::rewrite::{MalformedLocationError, Substitution};

/// Receives the decision points of one middleware instance.
pub trait RedirectObserver: Send + Sync {
    /// The client of a request was classified.
    fn client_classified(&self, instance: &str, client: &ClientAddress);

    /// Default handling changed the backend `Location`.
    fn prefix_reconciled(&self, instance: &str, from: &str, to: &str);

    /// A rewrite rule changed the location.
    fn location_rewritten(&self, instance: &str, substitution: &Substitution);

    /// A response was replaced with a 500 because of its `Location`.
    fn malformed_location(&self, instance: &str, error: &MalformedLocationError);
}

/// Emits `tracing` events and bumps the redirect counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RedirectObserver for TracingObserver {
    fn client_classified(&self, instance: &str, client: &ClientAddress) {
        tracing::debug!(
            instance = %instance,
            client = %client.address,
            source = %client.source,
            family = %client.family,
            "Client classified"
        );
        metrics::record_client(client.family);
    }

    fn prefix_reconciled(&self, instance: &str, from: &str, to: &str) {
        tracing::info!(
            instance = %instance,
            from = %from,
            to = %to,
            "Changed location path"
        );
        metrics::record_rewrite(metrics::STAGE_PREFIX);
    }

    fn location_rewritten(&self, instance: &str, substitution: &Substitution) {
        tracing::info!(
            instance = %instance,
            rule = substitution.rule,
            from = %substitution.before,
            to = %substitution.after,
            "Changed location"
        );
        metrics::record_rewrite(metrics::STAGE_RULE);
    }

    fn malformed_location(&self, instance: &str, error: &MalformedLocationError) {
        tracing::error!(
            instance = %instance,
            location = %error.location,
            reason = %error.reason,
            "Malformed redirect location"
        );
        metrics::record_malformed_location();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every event as a line, for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().expect("observer mutex poisoned").clone()
        }

        fn push(&self, event: String) {
            self.events.lock().expect("observer mutex poisoned").push(event);
        }
    }

    impl RedirectObserver for RecordingObserver {
        fn client_classified(&self, instance: &str, client: &ClientAddress) {
            self.push(format!("{instance} client {} {}", client.address, client.family));
        }

        fn prefix_reconciled(&self, instance: &str, from: &str, to: &str) {
            self.push(format!("{instance} prefix {from} -> {to}"));
        }

        fn location_rewritten(&self, instance: &str, substitution: &Substitution) {
            self.push(format!(
                "{instance} rule#{} {} -> {}",
                substitution.rule, substitution.before, substitution.after
            ));
        }

        fn malformed_location(&self, instance: &str, error: &MalformedLocationError) {
            self.push(format!("{instance} malformed {}", error.location));
        }
    }
}

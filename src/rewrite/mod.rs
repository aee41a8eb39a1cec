//! Redirect rewriting engine.
//!
//! # Data Flow
//! ```text
//! RedirectConfig
//!     → rules.rs (compile once into RuleSet)
//!     → shared via Arc by every request of the instance
//!
//! At header commit:
//!     backend Location → prefix.rs (default handling, optional)
//!     request URL      → rules.rs (ordered substitutions)
//! ```
//!
//! # Design Decisions
//! - Both stages are pure functions over strings; no I/O
//! - Configuration errors are fatal, per-request errors stay per-request

pub mod error;
pub mod prefix;
pub mod rules;

pub use error::{ConfigurationError, MalformedLocationError};
pub use prefix::reconcile_prefix;
pub use rules::{RewriteOutcome, RewriteRule, RuleSet, Substitution};

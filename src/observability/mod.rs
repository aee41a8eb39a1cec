//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! RedirectInterceptor decision points
//!     → observer.rs (RedirectObserver, injected per instance)
//!     → TracingObserver: tracing events + metrics.rs counters
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
pub mod observer;

pub use observer::{RedirectObserver, TracingObserver};

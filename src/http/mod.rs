//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, TLS tagging, timeouts, tracing)
//!     → middleware (capture RequestContext, run next handler)
//!     → server.rs proxy handler (forward to upstream)
//!     → interceptor.rs (commit response head: prefix, rules, status)
//!     → Send to client
//! ```

pub mod context;
pub mod interceptor;
pub mod middleware;
pub mod server;

pub use context::RequestContext;
pub use interceptor::{PendingResponse, RedirectInterceptor};
pub use middleware::{redirect_location_middleware, RedirectLocation};
pub use server::HttpServer;

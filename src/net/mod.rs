//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → plain: axum::serve with ConnectInfo<SocketAddr>
//!     → TLS:   axum-server rustls acceptor (tls.rs)
//!     → requests tagged with TlsConnection
//!     → Hand off to HTTP layer
//! ```

pub mod tls;

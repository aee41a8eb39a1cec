//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, regex compilation)
//!     → AppConfig (validated, immutable)
//!     → RedirectConfig handed to the middleware constructor
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new middleware instance built and swapped in atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::AppConfig;
pub use schema::ClientScope;
pub use schema::ListenerConfig;
pub use schema::RedirectConfig;
pub use schema::RewriteConfig;

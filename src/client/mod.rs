//! Client address classification.
//!
//! # Precedence
//! ```text
//! X-Forwarded-For (rightmost non-empty entry)
//!     → trusted single-address headers (CF-Connecting-IP, X-Real-Ip, ...)
//!     → socket peer (port stripped)
//!     → Unknown
//! ```
//!
//! # Design Decisions
//! - The rightmost forwarded entry was appended by the closest proxy and is
//!   the hardest for a client to spoof in a single-proxy setup
//! - Family detection is a colon heuristic, not a full address parse

pub mod address;

pub use address::{classify, AddressFamily, AddressSource, ClientAddress};

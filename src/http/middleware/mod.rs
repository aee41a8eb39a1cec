//! Response middleware.

pub mod redirect_location;

pub use redirect_location::{redirect_location_middleware, RedirectLocation};

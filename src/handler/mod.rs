//! Request handler module
//!
//! Routes requests to the image handler and the health probe.

pub mod image;
pub mod router;

// Re-export main entry point
pub use router::handle_request;

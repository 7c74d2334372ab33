//! HTTP protocol layer module
//!
//! MIME lookup, cache headers and response builders, independent of the
//! image lookup logic.

pub mod cache;
pub mod mime;
pub mod response;

pub use response::{
    build_404_response, build_405_response, build_health_response, build_image_response,
    build_json_error, full_body, ResponseBody,
};

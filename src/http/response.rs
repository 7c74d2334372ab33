//! HTTP response building module
//!
//! Builders for every response the server produces. Builders never panic: a
//! failed build is logged and replaced by a bare response with the intended
//! status.

use std::io;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::cache::{CachePolicy, IMAGE_CACHE_POLICY};

/// Body type shared by buffered and streamed responses
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, io::Error>;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Buffered body from in-memory bytes
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// JSON error payload, `{"error": "..."}`
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Build a JSON error response with a single `error` field
pub fn build_json_error(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let json = serde_json::to_vec(&ErrorBody { error: message }).unwrap_or_else(|e| {
        crate::logger::log_error(&format!("Failed to serialize error body: {e}"));
        br#"{"error":"internal server error"}"#.to_vec()
    });

    Response::builder()
        .status(status)
        .header("Content-Type", JSON_CONTENT_TYPE)
        .body(full_body(json))
        .unwrap_or_else(|e| fallback(status, &e))
}

/// Build 405 Method Not Allowed response
///
/// Plain body and no `Content-Type`, unlike the JSON errors.
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Allow", "GET")
        .body(full_body("Method Not Allowed"))
        .unwrap_or_else(|e| fallback(StatusCode::METHOD_NOT_ALLOWED, &e))
}

/// Build 404 response for paths outside the image route
pub fn build_404_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/plain")
        .body(full_body("404 Not Found"))
        .unwrap_or_else(|e| fallback(StatusCode::NOT_FOUND, &e))
}

/// Build health check response
pub fn build_health_response(status: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .header("Cache-Control", CachePolicy::NoStore.to_header_value())
        .body(full_body(status.to_string()))
        .unwrap_or_else(|e| fallback(StatusCode::OK, &e))
}

/// Build 200 response around a (possibly streamed) image body
pub fn build_image_response(
    body: ResponseBody,
    content_type: &str,
    content_length: u64,
) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("Cache-Control", IMAGE_CACHE_POLICY.to_header_value())
        .body(body)
        .unwrap_or_else(|e| fallback(StatusCode::INTERNAL_SERVER_ERROR, &e))
}

fn fallback(status: StatusCode, error: &hyper::http::Error) -> Response<ResponseBody> {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
    let mut resp = Response::new(full_body(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

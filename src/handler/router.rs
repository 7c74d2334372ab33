//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, panic
//! containment and access logging.

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode, Version};

use crate::config::AppState;
use crate::handler::image::{self, INTERNAL_ERROR};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();
    let (parts, _) = req.into_parts();

    let response = contain(route_request(&parts, &state)).await;

    if state.config.logging.access_log {
        let entry = access_entry(&parts, peer_addr, &response, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and configuration
async fn route_request(parts: &Parts, state: &AppState) -> Response<ResponseBody> {
    let path = parts.uri.path();
    let health = &state.config.health;

    if health.enabled && path == health.path {
        return http::build_health_response("ok");
    }

    if path == state.config.images.route {
        return image::serve_image(&parts.method, parts.uri.query(), &state.images_dir).await;
    }

    http::build_404_response()
}

/// Turn a panic anywhere in request handling into a 500
///
/// Each request ends with exactly one response whatever happens below.
async fn contain<F>(handler: F) -> Response<ResponseBody>
where
    F: Future<Output = Response<ResponseBody>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(resp) => resp,
        Err(panic) => {
            logger::log_error(&format!(
                "Request handler panicked: {}",
                panic_message(panic.as_ref())
            ));
            http::build_json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn access_entry(
    parts: &Parts,
    peer_addr: SocketAddr,
    response: &Response<ResponseBody>,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    entry.user_agent = parts
        .headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;
    use hyper::Method;
    use tempfile::TempDir;

    fn state_with(files: &[(&str, &[u8])]) -> (TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let mut cfg = Config::defaults().unwrap();
        cfg.logging.access_log = false;
        let state = AppState::with_images_dir(&cfg, dir.path().to_path_buf());
        (dir, Arc::new(state))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    async fn send(state: &Arc<AppState>, method: Method, uri: &str) -> Response<ResponseBody> {
        let req = Request::builder().method(method).uri(uri).body(()).unwrap();
        handle_request(req, Arc::clone(state), peer()).await.unwrap()
    }

    async fn body_string(resp: Response<ResponseBody>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_image_route() {
        let (_dir, state) = state_with(&[("42.webp", b"RIFF....WEBP")]);
        let resp = send(&state, Method::GET, "/api/image?itemid=42").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["Content-Type"], "image/webp");
        assert_eq!(body_string(resp).await, "RIFF....WEBP");
    }

    #[tokio::test]
    async fn test_image_route_errors() {
        let (_dir, state) = state_with(&[]);

        let resp = send(&state, Method::GET, "/api/image?itemid=abc").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_string(resp).await,
            r#"{"error":"invalid itemid. use digits only."}"#
        );

        let resp = send(&state, Method::GET, "/api/image?itemid=42").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&state, Method::POST, "/api/image?itemid=42").await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["Allow"], "GET");
    }

    #[tokio::test]
    async fn test_other_paths() {
        let (_dir, state) = state_with(&[("1.png", b"png")]);

        let resp = send(&state, Method::GET, "/healthz").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "ok");

        for uri in ["/", "/api/image/1", "/api/images?itemid=1", "/1.png"] {
            let resp = send(&state, Method::GET, uri).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_string(resp).await, "404 Not Found");
        }
    }

    #[tokio::test]
    async fn test_health_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::defaults().unwrap();
        cfg.logging.access_log = false;
        cfg.health.enabled = false;
        let state = Arc::new(AppState::with_images_dir(&cfg, dir.path().to_path_buf()));

        let resp = send(&state, Method::GET, "/healthz").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let resp = contain(async {
            if true {
                panic!("boom");
            }
            http::build_404_response()
        })
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(resp).await,
            r#"{"error":"internal server error"}"#
        );
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_access_entry() {
        let (_dir, state) = state_with(&[("3.gif", b"GIF89a")]);
        let req = Request::builder()
            .uri("/api/image?itemid=3")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();
        let resp = route_request(&parts, &state).await;

        let entry = access_entry(&parts, peer(), &resp, Instant::now());
        assert_eq!(entry.remote_addr, "127.0.0.1");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/api/image");
        assert_eq!(entry.query.as_deref(), Some("itemid=3"));
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body_bytes, 6);
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
    }
}

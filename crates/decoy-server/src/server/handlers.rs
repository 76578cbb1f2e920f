//! Request handlers for admin routes and stubbed traffic.
//!
//! Service calls may block on the document store, so they run on the blocking
//! thread pool.

use super::types::*;
use super::AppState;
use crate::mapping::{MappingRequest, MockRequest, Response as MockResponse, ResponseBody};
use crate::metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{error, warn};

/// GET {prefix}/health
pub fn handle_health() -> Response<Full<Bytes>> {
    build_response(StatusCode::OK, "OK")
}

/// GET {prefix}/metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics::collect_metrics(),
    )
}

/// POST {prefix}/mappings - Register a mapping
pub async fn handle_register(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let request: MappingRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            metrics::record_registration("rejected");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid mapping JSON: {e}"),
            );
        }
    };

    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.register(request)).await {
        Ok(Ok(mapping)) => json_response(StatusCode::OK, &mapping),
        Ok(Err(e)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => internal_error(e),
    }
}

/// GET {prefix}/mappings - List mappings
pub async fn handle_list(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.list()).await {
        Ok(mappings) => json_response(
            StatusCode::OK,
            &serde_json::json!({ "mappings": mappings }),
        ),
        Err(e) => internal_error(e),
    }
}

/// DELETE {prefix}/mappings - Remove every mapping
pub async fn handle_reset(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.reset()).await {
        Ok(deleted) => json_response(StatusCode::OK, &serde_json::json!({ "deleted": deleted })),
        Err(e) => internal_error(e),
    }
}

/// POST {prefix}/mappings:record - Perform a request and return the recording
pub async fn handle_record(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    match state.recorder.record_payload(&body).await {
        Ok(recording) => json_response(StatusCode::OK, &recording),
        Err(e) => {
            warn!("Recording failed: {}", e);
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, &e.to_string())
        }
    }
}

/// Any non-admin request - reply with the winning mapping's response
pub async fn handle_stub(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let headers = req.headers().clone();
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => {
            warn!("{} {}: {}", method, uri.path(), e);
            metrics::record_request("bad_request");
            return no_match();
        }
    };

    let request = MockRequest::from_parts(&method, &uri, &headers, body);
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.match_request(&request)).await {
        Ok(Some(response)) => stub_response(&response),
        Ok(None) => no_match(),
        Err(e) => internal_error(e),
    }
}

fn no_match() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "No mapping matches the request")
}

fn internal_error(e: tokio::task::JoinError) -> Response<Full<Bytes>> {
    error!("Service task failed: {}", e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Render a mapping response. Headers that are not valid HTTP are dropped with
/// a warning rather than failing the whole response.
pub fn stub_response(mock: &MockResponse) -> Response<Full<Bytes>> {
    let (body, default_content_type) = match mock.body() {
        ResponseBody::Empty => (Bytes::new(), None),
        ResponseBody::Text(text) => (Bytes::from(text.to_owned()), None),
        ResponseBody::Json(value) => (
            Bytes::from(serde_json::to_vec(value).unwrap_or_default()),
            Some("application/json"),
        ),
        ResponseBody::Bytes(bytes) => (Bytes::from(bytes.to_vec()), None),
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = StatusCode::from_u16(mock.status_code).unwrap_or_else(|_| {
        warn!("Invalid status code {} in mapping", mock.status_code);
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let headers = response.headers_mut();
    for (name, values) in &mock.headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("Dropping invalid response header name {:?}", name);
            continue;
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.append(name.clone(), value);
                }
                Err(_) => warn!("Dropping invalid value for response header {}", name),
            }
        }
    }

    let content_type = if mock.content_type.is_empty() {
        default_content_type.map(str::to_string)
    } else {
        Some(mock.content_type.clone())
    };
    if let Some(content_type) = content_type {
        match HeaderValue::from_str(&content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => warn!("Dropping invalid content type {:?}", content_type),
        }
    }

    response
}

//! Route dispatch.
//!
//! Paths under the admin prefix are admin routes; everything else is stubbed
//! traffic matched against the registered mappings.

use super::handlers;
use super::types::not_found;
use super::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::debug;

/// Admin endpoints below the prefix
#[derive(Debug, PartialEq, Eq)]
enum AdminRoute {
    Health,
    Metrics,
    Mappings,
    Record,
    Unknown,
}

impl AdminRoute {
    fn parse(rest: &str) -> Self {
        match rest {
            "/health" => AdminRoute::Health,
            "/metrics" => AdminRoute::Metrics,
            "/mappings" => AdminRoute::Mappings,
            "/mappings:record" => AdminRoute::Record,
            _ => AdminRoute::Unknown,
        }
    }
}

/// Path below the admin prefix, or `None` for stubbed traffic.
fn admin_path<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match admin_path(&state.admin_prefix, &path) {
        Some(rest) => {
            debug!("Admin: {} {}", method, path);
            route_admin(&method, AdminRoute::parse(rest), req, state).await
        }
        None => handlers::handle_stub(req, state).await,
    };
    Ok(response)
}

async fn route_admin(
    method: &Method,
    route: AdminRoute,
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    match (method, route) {
        (&Method::GET, AdminRoute::Health) => handlers::handle_health(),
        (&Method::GET, AdminRoute::Metrics) => handlers::handle_metrics(),
        (&Method::GET, AdminRoute::Mappings) => handlers::handle_list(state).await,
        (&Method::POST, AdminRoute::Mappings) => handlers::handle_register(req, state).await,
        (&Method::DELETE, AdminRoute::Mappings) => handlers::handle_reset(state).await,
        (&Method::POST, AdminRoute::Record) => handlers::handle_record(req, state).await,
        _ => not_found(),
    }
}

// # ddns-control-http
//
// HTTP surface of the control plane.
//
// ## Routes
//
// | Path      | Permission | Body                                 | Success body            |
// |-----------|------------|--------------------------------------|-------------------------|
// | `/UPDATE` | update     | `{"Domain":"..","Ip":".."}`          | `UPDATE RECORD SUCCESS` |
// | `/DELETE` | delete     | `{"Domain":"..","Type":"A"}`         | `DELETE RECORD SUCCESS` |
// | other     | none       |                                      | always 403              |
//
// ## Status Codes
//
// - 403 `Forbidden`: missing/unknown key, wrong permission, unreadable
//   body or unknown path. The body is not read until the key checks out.
// - 200 with the error text as body: the store or callback failed. Old
//   clients match on the body, so failures keep the 200 status.
//
// Every response carries `Cache-control: no-cache`.

pub mod server;
pub mod tls;
pub mod webhook;

use axum::body::to_bytes;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde_json::from_slice;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use ddns_core::{ControlPlane, DeleteRequest, Permission, UpdateRequest};

pub use server::{serve_http, serve_https};
pub use tls::{load_tls_config, tls_acceptor};
pub use tokio_rustls::TlsAcceptor;
pub use webhook::WebhookNotifier;

/// Header carrying the caller's API key
pub const API_KEY_HEADER: &str = "API-Key";

pub const UPDATE_SUCCESS: &str = "UPDATE RECORD SUCCESS";
pub const DELETE_SUCCESS: &str = "DELETE RECORD SUCCESS";

/// Request bodies above this size are refused
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the control API router
///
/// Handlers read the caller address from `ConnectInfo<SocketAddr>`, so the
/// router must be served with connect info (see [`serve_http`]).
pub fn router(plane: Arc<ControlPlane>) -> Router {
    Router::new()
        .route("/UPDATE", any(update_record))
        .route("/DELETE", any(delete_record))
        .fallback(forbidden_path)
        .layer(middleware::map_response(no_cache))
        .with_state(plane)
}

async fn update_record(
    State(plane): State<Arc<ControlPlane>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    if plane
        .authorize(api_key(request.headers()), Permission::Update)
        .is_err()
    {
        return forbidden();
    }

    let Some(body) = read_json::<UpdateRequest>(request).await else {
        return forbidden();
    };

    match plane.update(&body, peer.ip()).await {
        Ok(report) => {
            info!(
                "UPDATE from {}: {} -> {}",
                peer,
                report.record.name(),
                report.record.address()
            );
            (StatusCode::OK, UPDATE_SUCCESS).into_response()
        }
        Err(e) => {
            info!("UPDATE from {} failed: {}", peer, e);
            (StatusCode::OK, e.to_string()).into_response()
        }
    }
}

async fn delete_record(
    State(plane): State<Arc<ControlPlane>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    if plane
        .authorize(api_key(request.headers()), Permission::Delete)
        .is_err()
    {
        return forbidden();
    }

    let Some(body) = read_json::<DeleteRequest>(request).await else {
        return forbidden();
    };

    match plane.delete(&body).await {
        Ok(()) => {
            info!("DELETE from {}: {} {}", peer, body.domain, body.record_type);
            (StatusCode::OK, DELETE_SUCCESS).into_response()
        }
        Err(e) => {
            info!("DELETE from {} failed: {}", peer, e);
            (StatusCode::OK, e.to_string()).into_response()
        }
    }
}

async fn forbidden_path(request: Request) -> Response {
    debug!("Refusing request for {}", request.uri().path());
    forbidden()
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

async fn no_cache(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
}

async fn read_json<T: serde::de::DeserializeOwned>(request: Request) -> Option<T> {
    let bytes = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Unreadable request body: {}", e);
            return None;
        }
    };

    from_slice(&bytes)
        .inspect_err(|e| debug!("Malformed request body: {}", e))
        .ok()
}

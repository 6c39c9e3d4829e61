//! Serves a [`Dispatcher`] over HTTP under a fixed base path.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{self, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use axum::Router;
use serde_json::Value;

use super::Dispatcher;
use crate::envelope::ResponseEnvelope;
use crate::relay::Method;

/// Builds the router. Every path below `base_path` goes to the dispatcher.
pub fn router(dispatcher: Arc<Dispatcher>, base_path: &str) -> Router {
    let base = base_path.trim_end_matches('/');
    Router::new()
        .route(&format!("{base}/{{*path}}"), any(dispatch))
        .with_state(dispatcher)
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    dispatcher: Arc<Dispatcher>,
    base_path: &str,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, base_path, "Route listener started");
    axum::serve(listener, router(dispatcher, base_path))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn dispatch(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: http::Method,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    let method = match method {
        http::Method::GET => Method::Get,
        http::Method::POST => Method::Post,
        other => {
            return envelope_response(&ResponseEnvelope::error(
                405,
                format!("Method {other} not allowed"),
            ))
        }
    };

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return envelope_response(&ResponseEnvelope::error(
                    400,
                    format!("Invalid JSON body: {e}"),
                ))
            }
        }
    };

    let path = format!("/{path}");
    tracing::debug!(method = method.as_str(), path = %path, "Route request");

    // Handlers call into the host synchronously and may touch the filesystem.
    let envelope =
        match tokio::task::spawn_blocking(move || dispatcher.dispatch(method, &path, body)).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "Route handler panicked");
                ResponseEnvelope::error(500, format!("Handler failed: {e}"))
            }
        };

    envelope_response(&envelope)
}

fn envelope_response(envelope: &ResponseEnvelope) -> Response {
    let status =
        StatusCode::from_u16(envelope.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope.to_json())).into_response()
}

//! HTTP transport: one JSON-RPC message per `POST /mcp`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use uuid::Uuid;

use crate::mcp::protocol::{parse_message, Reply};
use crate::mcp::server::McpServer;

/// Header carrying the session id issued on initialize.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Builds the MCP router.
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post))
        .with_state(server)
}

/// Binds `addr` and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    server: Arc<McpServer>,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "MCP HTTP listener started");
    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_post(State(server): State<Arc<McpServer>>, body: String) -> Response {
    let message = match parse_message(&body) {
        Ok(message) => message,
        Err(error) => return (StatusCode::BAD_REQUEST, Json(Reply::Error(error))).into_response(),
    };

    let is_initialize = message.id().is_some() && message.method() == "initialize";

    let Some(reply) = server.handle_message(message).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let issue_session = is_initialize && reply.is_success();
    let mut response = Json(reply).into_response();
    if issue_session {
        let session_id = Uuid::new_v4().to_string();
        tracing::debug!(session_id = %session_id, "Issued MCP session");
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::server::Lifecycle;
    use crate::relay::RelayClient;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let relay = RelayClient::new("http://127.0.0.1:9/revit_mcp").unwrap();
        router(Arc::new(McpServer::new(relay, Lifecycle::Stateless)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn initialize_issues_session_id() {
        let resp = app()
            .oneshot(post_json(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let session = resp.headers().get(SESSION_HEADER).unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(session).is_ok());
    }

    #[tokio::test]
    async fn notification_is_accepted() {
        let resp = app()
            .oneshot(post_json(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let resp = app().oneshot(post_json("nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn tools_list_without_session() {
        let resp = app()
            .oneshot(post_json(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(SESSION_HEADER).is_none());
    }
}

// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, CORS, and shared state for the command and realtime
//! surfaces.

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use greenroom_core::GreenroomError;
use greenroom_core::traits::broker::Broker;
use greenroom_session::SessionHandle;

use crate::broadcast::Broadcaster;
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Handle into the session manager for status and commands.
    pub session: SessionHandle,
    /// Broker for enqueueing outbound messages.
    pub broker: Arc<dyn Broker>,
    /// Realtime fanout, shared with the event pump.
    pub broadcaster: Arc<Broadcaster>,
    /// Process start time for uptime reporting.
    pub start_time: std::time::Instant,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Realtime origin allowed by CORS; permissive when unset (local dev).
    pub allowed_origin: Option<String>,
}

/// Build the router serving the command and realtime surfaces.
pub fn build_router(state: GatewayState, allowed_origin: Option<&str>) -> Router {
    let cors = match allowed_origin {
        Some(origin) => {
            let origin = origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost"));
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/session/status", get(handlers::get_session_status))
        .route("/session/connect", post(handlers::post_session_connect))
        .route(
            "/session/disconnect",
            post(handlers::post_session_disconnect),
        )
        .route("/messages/send", post(handlers::post_messages_send))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the gateway HTTP/WebSocket server and serve until shutdown.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), GreenroomError> {
    let app = build_router(state, config.allowed_origin.as_deref());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GreenroomError::Transport {
            message: format!("failed to bind gateway to {addr}"),
            source: Some(Box::new(e)),
        })?;

    info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| GreenroomError::Transport {
            message: "gateway server error".to_string(),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use greenroom_core::traits::broker::{EXCHANGE_MESSAGES, RK_OUTBOUND};
    use greenroom_core::ChatTransport;
    use greenroom_core::types::{MessageEnvelope, SessionStatus};
    use greenroom_session::{ReconnectPolicy, SessionManager};
    use greenroom_test_utils::{MockBroker, MockTransport};
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct Fixture {
        router: Router,
        broker: Arc<MockBroker>,
        transport: Arc<MockTransport>,
        shutdown: CancellationToken,
    }

    fn start() -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let broker = Arc::new(MockBroker::new());
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
        let (manager, session) = SessionManager::new(
            transport.clone(),
            broker.clone(),
            events_tx,
            inbound_tx,
            ReconnectPolicy::default(),
        );
        let shutdown = CancellationToken::new();
        tokio::spawn(manager.run(shutdown.clone()));

        let state = GatewayState {
            session: session.clone(),
            broker: broker.clone(),
            broadcaster: Arc::new(Broadcaster::new(session)),
            start_time: std::time::Instant::now(),
        };
        Fixture {
            router: build_router(state, None),
            broker,
            transport,
            shutdown,
        }
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn health_is_public_and_ok() {
        let fx = start();
        let response = fx
            .router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn session_status_returns_snapshot() {
        let fx = start();
        let response = fx
            .router
            .oneshot(
                Request::builder()
                    .uri("/session/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "disconnected");
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn connect_command_reaches_the_session_manager() {
        let fx = start();
        let response = fx
            .router
            .clone()
            .oneshot(json_request("POST", "/session/connect", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        settle().await;
        assert_eq!(fx.transport.connect_calls(), 1);
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn disconnect_with_logout_reason_clears_credentials() {
        let fx = start();
        fx.transport.set_credentials(true);

        let response = fx
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/session/disconnect",
                serde_json::json!({"reason": "logout"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        settle().await;
        assert_eq!(fx.transport.logout_calls(), 1);
        assert!(!fx.transport.has_credentials());
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn send_enqueues_an_outbound_envelope() {
        let fx = start();
        let response = fx
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/messages/send",
                serde_json::json!({
                    "to": "chat-1",
                    "content": "hello",
                    "clientMessageId": "c-1"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["clientMessageId"], "c-1");
        assert_eq!(json["status"], "pending");
        assert!(json["externalId"].as_str().is_some());

        let published = fx.broker.published_to(EXCHANGE_MESSAGES, RK_OUTBOUND).await;
        assert_eq!(published.len(), 1);
        let envelope: MessageEnvelope = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(envelope.chat_id.as_str(), "chat-1");
        assert_eq!(envelope.client_message_id.as_deref(), Some("c-1"));
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn send_validation_rejects_without_state_mutation() {
        let fx = start();

        for body in [
            serde_json::json!({"to": "", "content": "hello"}),
            serde_json::json!({"to": "chat-1", "content": "  "}),
            serde_json::json!({"to": "chat-1", "content": "x", "type": "sticker"}),
        ] {
            let response = fx
                .router
                .clone()
                .oneshot(json_request("POST", "/messages/send", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert!(json["error"].as_str().is_some());
        }
        assert!(fx.broker.published().await.is_empty());
        assert_eq!(fx.transport.connect_calls(), 0);
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn send_reports_broker_outage() {
        let fx = start();
        fx.broker.fail_publishes(true);

        let response = fx
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/messages/send",
                serde_json::json!({"to": "chat-1", "content": "hello"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        fx.shutdown.cancel();
    }

    #[tokio::test]
    async fn status_reflects_connected_session() {
        let fx = start();
        fx.transport
            .inject_event(greenroom_core::events::TransportEvent::ConnectionOpened)
            .await;
        settle().await;

        let response = fx
            .router
            .oneshot(
                Request::builder()
                    .uri("/session/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], SessionStatus::Connected.to_string());
        assert!(json["sessionId"].as_str().is_some());
        fx.shutdown.cancel();
    }
}

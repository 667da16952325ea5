// SPDX-FileCopyrightText: 2026 Greenroom Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway command surface.
//!
//! Handles GET /health, GET /session/status, POST /session/connect,
//! POST /session/disconnect, POST /messages/send.

use std::str::FromStr;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use greenroom_core::traits::broker::{EXCHANGE_MESSAGES, RK_OUTBOUND};
use greenroom_core::types::{ChatId, ContentType, MessageEnvelope};

use crate::server::GatewayState;

/// Request body for POST /session/disconnect.
#[derive(Debug, Default, Deserialize)]
pub struct DisconnectRequest {
    /// Optional teardown reason; `"logout"` additionally clears credentials.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for POST /messages/send.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Destination chat identifier.
    pub to: String,
    /// Message text.
    pub content: String,
    /// Content type, defaults to text.
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    /// Caller correlation id, echoed in status events.
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// Response body for POST /messages/send: the send was attempted, not
/// necessarily delivered.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub client_message_id: Option<String>,
    pub external_id: String,
    pub status: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn unprocessable(message: impl Into<String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /session/status
pub async fn get_session_status(State(state): State<GatewayState>) -> Response {
    Json(state.session.snapshot().await).into_response()
}

/// POST /session/connect
pub async fn post_session_connect(State(state): State<GatewayState>) -> Response {
    match state.session.connect() {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "accepted": true })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "connect command failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/disconnect
pub async fn post_session_disconnect(
    State(state): State<GatewayState>,
    body: Option<Json<DisconnectRequest>>,
) -> Response {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    info!(reason = ?request.reason, "disconnect requested");

    match state.session.disconnect(request.reason) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "accepted": true })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /messages/send
///
/// Validates the request, queues the envelope on the outbound exchange, and
/// acks synchronously that the send was attempted.
pub async fn post_messages_send(
    State(state): State<GatewayState>,
    Json(body): Json<SendMessageRequest>,
) -> Response {
    if body.to.trim().is_empty() {
        return unprocessable("`to` must not be empty");
    }
    if body.content.trim().is_empty() {
        return unprocessable("`content` must not be empty");
    }
    let content_type = match body.content_type.as_deref() {
        None => ContentType::Text,
        Some(raw) => match ContentType::from_str(raw) {
            Ok(ct) => ct,
            Err(_) => return unprocessable(format!("unknown message type `{raw}`")),
        },
    };

    let envelope = MessageEnvelope::outbound(
        ChatId::new(body.to),
        content_type,
        body.content,
        body.client_message_id,
    );

    let payload = match serde_json::to_vec(&envelope) {
        Ok(payload) => payload,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    if let Err(e) = state
        .broker
        .publish(EXCHANGE_MESSAGES, RK_OUTBOUND, &payload)
        .await
    {
        warn!(error = %e, "outbound enqueue failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "broker unavailable".to_string(),
            }),
        )
            .into_response();
    }

    info!(
        external_id = %envelope.external_id,
        chat_id = %envelope.chat_id,
        "outbound message queued"
    );
    (
        StatusCode::ACCEPTED,
        Json(SendMessageResponse {
            client_message_id: envelope.client_message_id,
            external_id: envelope.external_id.as_str().to_string(),
            status: "pending".to_string(),
        }),
    )
        .into_response()
}

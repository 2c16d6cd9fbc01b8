// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP/WebSocket request handlers for the presenter surface.

use crate::{AppState, DeviceTarget};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// API error response.
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// GET /api/v1/health
pub async fn health() -> Response {
    let body = serde_json::json!({
        "name": "hifictl-daemon",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/v1/state — a point-in-time snapshot of the AVR's derived state.
pub async fn state(State(state): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, Json(state.presenter.snapshot())).into_response()
}

/// Body of a POST to `/api/v1/command`.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

/// POST /api/v1/command — route a textual command (`"avr vol+"`,
/// `"hdmi 2"`, ...) to the matching driver.
pub async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> Result<Response, ApiError> {
    let routed = state.router.route(&req.command);
    let target = match routed.key.as_str() {
        "avr" => DeviceTarget::Avr,
        "hdmi" => DeviceTarget::Hdmi,
        _ => {
            return Err(ApiError {
                error: format!("no handler for command {:?}", req.command),
                code: 400,
            })
        }
    };

    let result = match target {
        DeviceTarget::Avr => state.avr.send(routed.remainder.clone()).await,
        DeviceTarget::Hdmi => state.hdmi.send(routed.remainder.clone()).await,
    };

    result.map_err(|err| ApiError {
        error: err.to_string(),
        code: 503,
    })?;

    debug!(command = %req.command, "command dispatched");
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({"ok": true}))).into_response())
}

/// GET /api/v1/events — upgrade to a WebSocket streaming state snapshots:
/// one on attach, then one per change.
pub async fn events(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.presenter.subscribe();

    let attach = state.presenter.snapshot();
    if send_snapshot(&mut socket, &attach).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {} // inbound messages aren't part of this surface
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket read error");
                        return;
                    }
                }
            }
            snapshot = rx.recv() => {
                match snapshot {
                    Ok(snapshot) => {
                        if send_snapshot(&mut socket, &snapshot).await.is_err() {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket subscriber lagged, resuming");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}

async fn send_snapshot(
    socket: &mut WebSocket,
    snapshot: &hifictl::StateSnapshot,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text)).await
}

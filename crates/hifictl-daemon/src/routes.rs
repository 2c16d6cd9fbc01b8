// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route table for the presenter's minimal JSON/WebSocket surface.
//!
//! Deliberately does not serve any static assets — that's left to whatever
//! external front end a deployment chooses to pair with this daemon.

use crate::{handlers, AppState};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/state", get(handlers::state))
        .route("/api/v1/command", post(handlers::command))
        .route("/api/v1/events", get(handlers::events))
}

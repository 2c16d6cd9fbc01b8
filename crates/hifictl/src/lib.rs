// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core library for driving a home-theater receiver and an HDMI switch over
//! serial, deriving a unified state model, and exposing it to external
//! presenters.
//!
//! This crate is transport-agnostic: it owns the serial sessions and the
//! state/control logic, but never speaks HTTP or WebSocket itself. See
//! `hifictl-daemon` for a thin binary that exposes [`presenter::Presenter`]
//! over the network.

pub mod config;
pub mod control;
pub mod driver;
pub mod error;
pub mod presenter;
pub mod proto;
pub mod router;
pub mod state;

pub use config::RuntimeConfig;
pub use error::{HifictlError, Result};
pub use presenter::{Presenter, StateSnapshot};
pub use router::CommandRouter;
pub use state::AvrState;

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial-port drivers: pure framing/session state machines plus the
//! `tokio_serial`-backed loops that drive them.

pub mod avr;
pub mod framer;
pub mod hdmi;
pub mod throttle;

pub use avr::{AvrDriver, AvrHandle};
pub use hdmi::{HdmiDriver, HdmiHandle, HdmiSession};

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pure write-throttle state machine: decides how long a caller must wait
//! before the next command may go out to the receiver.
//!
//! Modeled as explicit ticks rather than a real clock so it can be driven
//! deterministically from tests; [`crate::driver::avr::AvrDriver`] is the
//! only caller that feeds it real elapsed time.

use std::time::Duration;

/// Minimum spacing between two sends issued in quick succession.
const ACTIVE_SPACING: Duration = Duration::from_millis(300);

/// Spacing used after the receiver has been quiet for a while — gives it
/// time to wake up and settle before accepting another keypress.
const IDLE_WAKE_SPACING: Duration = Duration::from_secs(1);

/// Above this much time since the last send, treat the receiver as idle.
const IDLE_THRESHOLD: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    /// No spacing requirement outstanding; a send may go immediately.
    Idle,
    /// A command was just sent; this much time must still elapse.
    Armed(Duration),
}

/// Tracks whether enough time has passed since the last command for another
/// one to be sent.
pub struct ThrottleGate {
    state: GateState,
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
        }
    }

    /// Advance the gate's clock by `elapsed`, shrinking any outstanding wait.
    pub fn tick(&mut self, elapsed: Duration) {
        if let GateState::Armed(remaining) = self.state {
            self.state = if elapsed >= remaining {
                GateState::Idle
            } else {
                GateState::Armed(remaining - elapsed)
            };
        }
    }

    /// Time still owed before the next send is allowed.
    pub fn remaining(&self) -> Duration {
        match self.state {
            GateState::Idle => Duration::ZERO,
            GateState::Armed(remaining) => remaining,
        }
    }

    /// `true` once [`ThrottleGate::remaining`] has decayed to zero.
    pub fn is_ready(&self) -> bool {
        self.state == GateState::Idle
    }

    /// Record that a command was just sent, `since_last_send` after the
    /// previous one (`None` for the very first send), and re-arm for the
    /// next one with the appropriate spacing.
    pub fn record_send(&mut self, since_last_send: Option<Duration>) {
        let spacing = match since_last_send {
            Some(d) if d <= IDLE_THRESHOLD => ACTIVE_SPACING,
            _ => IDLE_WAKE_SPACING,
        };
        self.state = GateState::Armed(spacing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_ready() {
        let gate = ThrottleGate::new();
        assert!(gate.is_ready());
        assert_eq!(gate.remaining(), Duration::ZERO);
    }

    #[test]
    fn first_send_uses_idle_wake_spacing() {
        let mut gate = ThrottleGate::new();
        gate.record_send(None);
        assert_eq!(gate.remaining(), IDLE_WAKE_SPACING);
        assert!(!gate.is_ready());
    }

    #[test]
    fn rapid_send_uses_active_spacing() {
        let mut gate = ThrottleGate::new();
        gate.record_send(Some(Duration::from_millis(500)));
        assert_eq!(gate.remaining(), ACTIVE_SPACING);
    }

    #[test]
    fn send_after_long_silence_uses_idle_wake_spacing() {
        let mut gate = ThrottleGate::new();
        gate.record_send(Some(Duration::from_secs(6)));
        assert_eq!(gate.remaining(), IDLE_WAKE_SPACING);
    }

    #[test]
    fn exactly_at_threshold_counts_as_active() {
        let mut gate = ThrottleGate::new();
        gate.record_send(Some(IDLE_THRESHOLD));
        assert_eq!(gate.remaining(), ACTIVE_SPACING);
    }

    #[test]
    fn tick_counts_down_and_clamps_to_idle() {
        let mut gate = ThrottleGate::new();
        gate.record_send(Some(Duration::from_millis(100)));
        assert_eq!(gate.remaining(), ACTIVE_SPACING);
        gate.tick(Duration::from_millis(100));
        assert_eq!(gate.remaining(), Duration::from_millis(200));
        gate.tick(Duration::from_secs(10));
        assert!(gate.is_ready());
        assert_eq!(gate.remaining(), Duration::ZERO);
    }

    #[test]
    fn ticking_an_idle_gate_is_a_no_op() {
        let mut gate = ThrottleGate::new();
        gate.tick(Duration::from_secs(100));
        assert!(gate.is_ready());
    }
}

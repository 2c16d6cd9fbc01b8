// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Policy that reacts to state transitions by enqueuing commands to satisfy
//! invariants the receiver can't reach on its own (it only exposes relative
//! keypresses, never an absolute target).

use crate::state::AvrState;

/// Volume threshold (dB) above which a single `VOL DOWN` is issued as a
/// precaution.
const VOLUME_WARN_DB: i32 = -20;

/// Volume threshold (dB) above which the receiver is shut down outright —
/// this receiver has "episodes" where volume increases on its own.
const VOLUME_PANIC_DB: i32 = -15;

/// Evaluate the rules of the control loop for one state transition.
///
/// Returns the commands to enqueue, in order. Callers are expected to
/// enqueue and let the first one drain (so a wake-up and an elicited
/// display update within the same transition don't race each other) before
/// re-evaluating on the next transition — see
/// [`crate::driver::avr::AvrDriver`].
///
/// Per spec: all of the rules below are suppressed while `queue_len > 0`.
pub fn on_transition(prev: &AvrState, new: &AvrState, queue_len: usize) -> Vec<&'static str> {
    if queue_len > 0 {
        return Vec::new();
    }

    // Wake from standby: only right after we were off, lest we re-trigger
    // every time a standby frame repeats.
    if prev.off && new.standby {
        return vec!["POWER ON"];
    }

    if new.off || new.standby || new.muted {
        return Vec::new();
    }

    if new.volume.is_none() {
        return vec!["VOL DOWN"]; // trigger volume display, not a real change
    }
    if new.digital.is_none() {
        return vec!["DIGITAL"]; // trigger digital display
    }

    if let Some(volume) = new.volume {
        if volume > VOLUME_PANIC_DB {
            return vec!["POWER OFF"];
        }
        if volume > VOLUME_WARN_DB {
            return vec!["VOL DOWN"];
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AvrState {
        AvrState {
            off: false,
            standby: false,
            muted: false,
            volume: Some(-40),
            digital: Some("OPT1".into()),
            ..AvrState::default()
        }
    }

    /// Scenario: from initial off, the first standby frame causes exactly
    /// one POWER ON, and no more until the state leaves standby and
    /// re-enters.
    #[test]
    fn wake_from_standby_fires_once() {
        let off = AvrState::initial();
        let mut standby = off.clone();
        standby.off = false;
        standby.standby = true;

        assert_eq!(on_transition(&off, &standby, 0), vec!["POWER ON"]);
        // Repeating the same standby frame (prev == new, both standby, prev not off) fires nothing.
        assert_eq!(on_transition(&standby, &standby, 0), Vec::<&str>::new());
    }

    #[test]
    fn unknown_volume_triggers_vol_down() {
        let prev = base();
        let mut new = base();
        new.volume = None;
        assert_eq!(on_transition(&prev, &new, 0), vec!["VOL DOWN"]);
    }

    #[test]
    fn unknown_digital_triggers_digital_probe() {
        let prev = base();
        let mut new = base();
        new.digital = None;
        assert_eq!(on_transition(&prev, &new, 0), vec!["DIGITAL"]);
    }

    /// Scenario B: volume runaway guard.
    #[test]
    fn volume_runaway_guard_shuts_down() {
        let prev = base();
        let mut new = base();
        new.volume = Some(-14);
        assert_eq!(on_transition(&prev, &new, 0), vec!["POWER OFF"]);
    }

    #[test]
    fn volume_warn_threshold_decreases_volume() {
        let prev = base();
        let mut new = base();
        new.volume = Some(-18);
        assert_eq!(on_transition(&prev, &new, 0), vec!["VOL DOWN"]);
    }

    #[test]
    fn nothing_fires_while_queue_is_non_empty() {
        let off = AvrState::initial();
        let mut standby = off.clone();
        standby.off = false;
        standby.standby = true;
        assert_eq!(on_transition(&off, &standby, 1), Vec::<&str>::new());
    }

    #[test]
    fn nothing_fires_while_muted() {
        let prev = base();
        let mut new = base();
        new.muted = true;
        new.volume = None;
        assert_eq!(on_transition(&prev, &new, 0), Vec::<&str>::new());
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The AVR's derived state model and the reducer that folds status frames
//! into it.

use crate::proto::status::{Channel, SourceTag, SpeakerSlot, SurroundMode};
use crate::proto::AvrStatus;
use std::collections::BTreeSet;
use std::fmt;

/// Authoritative, monotonically-updated view of the receiver.
///
/// `volume`/`source`/`digital`/`channels`/`surround`/`speakers` only ever
/// *replace* when an incoming status frame carries meaningful content for
/// that field — a transient blank frame never erases a previously observed
/// value. See [`AvrState::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvrState {
    pub off: bool,
    pub standby: bool,
    pub muted: bool,
    pub volume: Option<i32>,
    pub source: Option<SourceTag>,
    pub digital: Option<String>,
    pub surround: BTreeSet<SurroundMode>,
    pub channels: BTreeSet<Channel>,
    pub speakers: BTreeSet<SpeakerSlot>,
    pub line1: Option<String>,
    pub line2: Option<String>,
}

impl AvrState {
    /// The initial state before any status frame has ever been observed:
    /// off, nothing known.
    pub fn initial() -> Self {
        Self {
            off: true,
            ..Self::default()
        }
    }

    /// Fold a freshly decoded status frame into this state, returning the
    /// new state and whether anything observable changed.
    ///
    /// Invariants upheld here: `off` is always cleared on receipt of any
    /// status frame (silence, not a frame, is what sets `off` — see
    /// [`crate::driver::avr::AvrDriver`]); `standby` tracks the incoming
    /// frame directly; `line1` is not overwritten by a blank value while
    /// `muted`; all other optional/set fields are "sticky" — they keep
    /// their prior value when the incoming frame has nothing to say about
    /// them.
    pub fn apply(&self, status: &AvrStatus) -> (Self, bool) {
        let mut next = self.clone();
        next.off = false;
        next.standby = status.standby();
        next.muted = status.muted();

        if let Some(v) = status.volume() {
            next.volume = Some(v);
        }
        if let Some(s) = status.source() {
            next.source = Some(s);
        }
        if let Some(d) = status.digital() {
            next.digital = Some(d);
        }
        let channels = status.channels();
        if !channels.is_empty() {
            next.channels = channels;
        }
        let surround = status.surround();
        if !surround.is_empty() {
            next.surround = surround;
        }
        let speakers = status.speakers();
        if !speakers.is_empty() {
            next.speakers = speakers;
        }

        if !(next.muted && status.line1.trim().is_empty()) {
            next.line1 = Some(status.line1.clone());
        }
        if !status.line2.trim().is_empty() {
            next.line2 = Some(status.line2.clone());
        }

        let changed = next != *self;
        (next, changed)
    }

    /// Set `off`, as emitted on connection loss. Other fields are left
    /// alone: a reconnect will re-adopt them as soon as a frame arrives.
    pub fn mark_off(&self) -> (Self, bool) {
        if self.off {
            return (self.clone(), false);
        }
        let mut next = self.clone();
        next.off = true;
        (next, true)
    }
}

impl fmt::Display for AvrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.off {
            return write!(f, "<AvrState off>");
        }
        if self.standby {
            return write!(f, "<AvrState standby>");
        }
        write!(
            f,
            "<AvrState {}{}dB {:?}/{:?} \"{}\"/\"{}\">",
            if self.muted { "muted " } else { "" },
            self.volume
                .map(|v| v.to_string())
                .unwrap_or_else(|| "???".to_string()),
            self.source,
            self.digital,
            self.line1.as_deref().unwrap_or(""),
            self.line2.as_deref().unwrap_or(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::status::AvrStatus;

    fn make_payload(line1: &str, line2: &str, icons: [u8; 14]) -> Vec<u8> {
        let mut data = vec![0xF0];
        data.extend_from_slice(line1.as_bytes());
        data.push(0x00);
        data.push(0xF1);
        data.extend_from_slice(line2.as_bytes());
        data.push(0x00);
        data.push(0xF2);
        data.extend_from_slice(&icons);
        data.push(0x00);
        data
    }

    fn status(line1: &str, line2: &str, icons: [u8; 14]) -> AvrStatus {
        AvrStatus::parse(&make_payload(line1, line2, icons)).unwrap()
    }

    #[test]
    fn standby_frame_sets_standby_without_erasing_lines() {
        let populated = status("DVD           ", "DOLBY DIGITAL ", [1; 14]);
        let (s1, changed1) = AvrState::initial().apply(&populated);
        assert!(changed1);
        assert_eq!(s1.line1.as_deref(), Some("DVD           "));

        let blank = status("              ", "              ", [0; 14]);
        let (s2, changed2) = s1.apply(&blank);
        assert!(changed2);
        assert!(s2.standby);
        assert_eq!(s2.line1.as_deref(), Some("DVD           "));
        assert_eq!(s2.line2.as_deref(), Some("DOLBY DIGITAL "));
    }

    #[test]
    fn volume_is_sticky_across_frames_without_it() {
        let with_vol = status("DVD           ", "  VOL -30 dB  ", [1; 14]);
        let (s1, _) = AvrState::initial().apply(&with_vol);
        assert_eq!(s1.volume, Some(-30));

        let without_vol = status("DVD           ", "DOLBY DIGITAL ", [1; 14]);
        let (s2, _) = s1.apply(&without_vol);
        assert_eq!(s2.volume, Some(-30));
    }

    #[test]
    fn line1_not_overwritten_by_blank_while_muted() {
        let muted_populated = status("MUTE          ", "              ", [1; 14]);
        let (s1, _) = AvrState::initial().apply(&muted_populated);
        assert_eq!(s1.muted, true);
        assert_eq!(s1.line1.as_deref(), Some("MUTE          "));

        let muted_blank = status("              ", "              ", [1; 14]);
        let (s2, _) = s1.apply(&muted_blank);
        assert!(s2.muted);
        // Still "not overwritten by an all-blank value while muted"
        assert_eq!(s2.line1.as_deref(), Some("MUTE          "));
    }

    #[test]
    fn changed_is_false_for_identical_consecutive_frames() {
        let frame = status("DVD           ", "DOLBY DIGITAL ", [1; 14]);
        let (s1, changed1) = AvrState::initial().apply(&frame);
        assert!(changed1);
        let (_, changed2) = s1.apply(&frame);
        assert!(!changed2);
    }
}

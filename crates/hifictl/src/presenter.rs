// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot and change-event fan-out surface for external UIs (an HTTP/WS
//! gateway, a CLI, a script). The core never speaks HTTP or WebSocket
//! itself — see `hifictl-daemon` for a thin consumer of this interface.

use crate::proto::status::{channels_labels, channels_string, speakers_labels, speakers_string,
    speakers_string_short, surround_labels, surround_string, surround_string_short};
use crate::state::AvrState;
use serde::Serialize;
use tokio::sync::broadcast;

/// JSON-serializable snapshot of the AVR state, per the protocol's state
/// schema.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StateSnapshot {
    pub off: bool,
    pub standby: bool,
    pub muted: bool,
    pub volume: Option<i32>,
    pub source: Option<&'static str>,
    pub digital: Option<String>,
    pub surround: Vec<&'static str>,
    pub surround_string: String,
    pub surround_string_short: String,
    pub channels: Vec<&'static str>,
    pub channels_string: String,
    pub speakers: Vec<String>,
    pub speakers_string: String,
    pub speakers_string_short: String,
    pub line1: Option<String>,
    pub line2: Option<String>,
}

impl From<&AvrState> for StateSnapshot {
    fn from(s: &AvrState) -> Self {
        Self {
            off: s.off,
            standby: s.standby,
            muted: s.muted,
            volume: s.volume,
            source: s.source.map(|t| t.as_str()),
            digital: s.digital.clone(),
            surround: surround_labels(&s.surround),
            surround_string: surround_string(&s.surround),
            surround_string_short: surround_string_short(&s.surround, 3),
            channels: channels_labels(&s.channels),
            channels_string: channels_string(&s.channels),
            speakers: speakers_labels(&s.speakers),
            speakers_string: speakers_string(&s.speakers),
            speakers_string_short: speakers_string_short(&s.speakers),
            line1: s.line1.clone(),
            line2: s.line2.clone(),
        }
    }
}

/// Bounded fan-out of state snapshots. Slow subscribers are dropped (lagged)
/// rather than allowed to stall the driver — `broadcast` discards the
/// oldest buffered messages for a lagging receiver instead of blocking the
/// sender.
pub struct Presenter {
    current: std::sync::RwLock<AvrState>,
    tx: broadcast::Sender<StateSnapshot>,
}

/// Default bound on buffered-but-unconsumed snapshots per subscriber.
const CHANGE_QUEUE_DEPTH: usize = 16;

impl Presenter {
    pub fn new(initial: AvrState) -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_QUEUE_DEPTH);
        Self {
            current: std::sync::RwLock::new(initial),
            tx,
        }
    }

    /// A point-in-time snapshot of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from(&*self.current.read().unwrap())
    }

    /// Subscribe to future change events. The subscriber does not
    /// automatically get a snapshot on attach from this call alone — callers
    /// should pair it with [`Presenter::snapshot`] to get the "snapshot on
    /// attach, then one per change" behavior the protocol specifies.
    pub fn subscribe(&self) -> broadcast::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    /// Record a new authoritative state and, if anything changed, publish
    /// it to subscribers. Never blocks: a full subscriber channel just
    /// drops its oldest entry.
    pub fn publish(&self, new_state: AvrState, changed: bool) {
        *self.current.write().unwrap() = new_state.clone();
        if changed {
            let _ = self.tx.send(StateSnapshot::from(&new_state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_gets_snapshot_on_attach_and_on_change() {
        let presenter = Presenter::new(AvrState::initial());
        let mut rx = presenter.subscribe();

        let attach_snapshot = presenter.snapshot();
        assert!(attach_snapshot.off);

        let mut next = AvrState::initial();
        next.off = false;
        next.standby = true;
        presenter.publish(next, true);

        let event = rx.recv().await.unwrap();
        assert!(!event.off);
        assert!(event.standby);
    }

    #[tokio::test]
    async fn unchanged_publish_does_not_emit() {
        let presenter = Presenter::new(AvrState::initial());
        let mut rx = presenter.subscribe();
        presenter.publish(AvrState::initial(), false);
        assert!(rx.try_recv().is_err());
    }
}

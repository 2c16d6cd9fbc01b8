// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! I/O-free byte-stream framer: accumulates bytes, resyncs on the expected
//! datagram prefix, and yields decoded payloads (or protocol errors) one
//! frame at a time.
//!
//! Kept independent of any transport so it can be driven directly by tests
//! (see the module tests, and [`crate::driver::avr::AvrDriver`] which feeds
//! it bytes read from the serial port).

use crate::error::HifictlError;
use crate::proto::datagram::{self, DatagramSpec};

/// One outcome of feeding more bytes to the framer.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameEvent {
    /// A complete, checksum-valid payload.
    Payload(Vec<u8>),
    /// A complete frame-length's worth of bytes was found at the expected
    /// prefix, but failed to decode. The caller should log and continue;
    /// the framer has already resumed searching.
    Error(HifictlError),
}

/// Accumulates a byte stream and extracts `spec`-shaped datagrams from it.
pub struct Framer {
    spec: DatagramSpec,
    prefix: Vec<u8>,
    frame_len: usize,
    buffer: Vec<u8>,
}

impl Framer {
    pub fn new(spec: DatagramSpec) -> Self {
        let prefix = datagram::expected_prefix(&spec);
        let frame_len = datagram::frame_length(&spec);
        Self {
            spec,
            prefix,
            frame_len,
            buffer: Vec::new(),
        }
    }

    /// Append freshly read bytes and extract as many complete frames as
    /// are now available.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<FrameEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        loop {
            if self.buffer.len() < self.prefix.len() {
                break;
            }
            match find_subsequence(&self.buffer, &self.prefix) {
                None => {
                    // No prefix anywhere in the buffer. Keep only enough
                    // trailing bytes to catch a prefix straddling the next
                    // read's boundary.
                    let keep_from = self
                        .buffer
                        .len()
                        .saturating_sub(self.prefix.len() - 1);
                    self.buffer.drain(0..keep_from);
                    break;
                }
                Some(pos) => {
                    if pos > 0 {
                        self.buffer.drain(0..pos);
                    }
                    if self.buffer.len() < self.frame_len {
                        break; // wait for the rest of the frame
                    }
                    let candidate = self.buffer[..self.frame_len].to_vec();
                    match datagram::decode(&candidate, &self.spec) {
                        Ok(payload) => {
                            self.buffer.drain(0..self.frame_len);
                            events.push(FrameEvent::Payload(payload.to_vec()));
                        }
                        Err(err) => {
                            events.push(FrameEvent::Error(err));
                            // This prefix match was a false positive (or the
                            // frame behind it is corrupt). Drop just the
                            // prefix and keep searching — a genuine frame
                            // may still be embedded further into the buffer.
                            self.buffer.drain(0..self.prefix.len());
                        }
                    }
                }
            }
        }

        events
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::datagram::{encode, AVR_PC_STATUS};

    fn sample_frame(fill: u8) -> Vec<u8> {
        encode(&[fill; 48], &AVR_PC_STATUS).unwrap()
    }

    #[test]
    fn yields_nothing_until_a_full_frame_is_buffered() {
        let mut framer = Framer::new(AVR_PC_STATUS);
        let frame = sample_frame(0x11);
        assert!(framer.feed(&frame[..frame.len() - 1]).is_empty());
        let events = framer.feed(&frame[frame.len() - 1..]);
        assert_eq!(events, vec![FrameEvent::Payload(vec![0x11; 48])]);
    }

    /// Framer resync: garbage || frame1 || garbage || frame2 -> [frame1, frame2].
    #[test]
    fn resyncs_across_interleaved_garbage() {
        let mut framer = Framer::new(AVR_PC_STATUS);
        let frame1 = sample_frame(0xAA);
        let frame2 = sample_frame(0xBB);
        let mut stream = vec![1, 2, 3, 4, 5]; // garbage, does not contain the prefix
        stream.extend_from_slice(&frame1);
        stream.extend_from_slice(&[9, 8, 7]);
        stream.extend_from_slice(&frame2);

        let events = framer.feed(&stream);
        assert_eq!(
            events,
            vec![
                FrameEvent::Payload(vec![0xAA; 48]),
                FrameEvent::Payload(vec![0xBB; 48]),
            ]
        );
    }

    /// Scenario F: 7 random bytes, valid frame, truncated 30-byte
    /// prefix-matching fragment, valid frame -> two decoded payloads in order.
    #[test]
    fn scenario_f_recovers_frame_after_truncated_fragment() {
        let mut framer = Framer::new(AVR_PC_STATUS);
        let frame1 = sample_frame(0x11);
        let frame2 = sample_frame(0x22);
        let fragment = &frame1[..30]; // starts with a real prefix, then cuts off

        let mut stream = vec![1, 2, 3, 4, 5, 6, 7]; // garbage, no prefix inside
        stream.extend_from_slice(&frame1);
        stream.extend_from_slice(fragment);
        stream.extend_from_slice(&frame2);

        let events = framer.feed(&stream);
        let payloads: Vec<&Vec<u8>> = events
            .iter()
            .filter_map(|e| match e {
                FrameEvent::Payload(p) => Some(p),
                FrameEvent::Error(_) => None,
            })
            .collect();
        assert_eq!(payloads, vec![&vec![0x11; 48], &vec![0x22; 48]]);
    }

    #[test]
    fn incremental_feed_across_many_small_reads() {
        let mut framer = Framer::new(AVR_PC_STATUS);
        let frame = sample_frame(0x33);
        let mut events = Vec::new();
        for chunk in frame.chunks(3) {
            events.extend(framer.feed(chunk));
        }
        assert_eq!(events, vec![FrameEvent::Payload(vec![0x33; 48])]);
    }
}

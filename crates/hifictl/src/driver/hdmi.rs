// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDMI-switch driver: a line-oriented prompt protocol, much simpler than
//! the AVR's binary datagrams. [`HdmiSession`] is the pure state machine
//! (independently testable); [`HdmiDriver`] wires it to a real serial port.

use crate::error::{HifictlError, Result};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

const HDMI_BAUD: u32 = 19_200;
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const READ_CHUNK: usize = 128;
const COMMAND_QUEUE_DEPTH: usize = 8;
const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_millis(250);
const RECONNECT_BACKOFF_CAP: Duration = Duration::from_secs(5);

const BANNER_MARKER: &str = "Marmitek BV, The Netherlands.";
const PROMPT_TERMINATOR: &[u8] = b"\n\r>";

/// Symbolic key -> single-character wire code. `on`/`off`/`on/off` all share
/// the same toggle keypress: the switch exposes no separate power states.
const HDMI_COMMANDS: &[(&str, u8)] = &[
    ("1", b'1'),
    ("2", b'2'),
    ("3", b'3'),
    ("4", b'4'),
    ("5", b'5'),
    ("on", b'5'),
    ("off", b'5'),
    ("on/off", b'5'),
    ("version", b'v'),
    ("help", b'?'),
];

fn lookup(key: &str) -> Option<u8> {
    HDMI_COMMANDS.iter().find(|(k, _)| *k == key).map(|(_, c)| *c)
}

/// Wrap a single command character in `"\n\r"` on both sides, per the wire
/// format.
fn encode_command(code: u8) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5);
    frame.extend_from_slice(b"\n\r");
    frame.push(code);
    frame.extend_from_slice(b"\n\r");
    frame
}

/// Outcome of feeding more bytes into an [`HdmiSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HdmiEvent {
    /// Startup banner recognized; the session is now ready to send.
    BannerSeen,
    /// Text preceding a prompt character: typically the echo of the last
    /// command plus any reply text.
    Response(String),
    /// A lone `NUL` byte arrived: the switch has gone to standby.
    EnteredStandby,
    /// A byte arrived that didn't fit the current phase's expectations.
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Ready,
}

/// Pure, I/O-free state machine for the HDMI switch's line protocol.
pub struct HdmiSession {
    phase: Phase,
    ready: bool,
    buffer: Vec<u8>,
}

impl Default for HdmiSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HdmiSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Init,
            ready: false,
            buffer: Vec::new(),
        }
    }

    /// `true` once the switch may accept another command.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Clear ready-to-send immediately after a command is written.
    pub fn record_sent(&mut self) {
        self.ready = false;
    }

    /// Feed freshly read bytes and return whatever events they produced.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<HdmiEvent> {
        let mut events = Vec::new();
        for &b in bytes {
            if b == 0x00 {
                self.buffer.clear();
                self.ready = false;
                events.push(HdmiEvent::EnteredStandby);
                continue;
            }

            self.buffer.push(b);
            match self.phase {
                Phase::Init => {
                    if self.buffer.ends_with(PROMPT_TERMINATOR) {
                        let text = String::from_utf8_lossy(&self.buffer).into_owned();
                        self.buffer.clear();
                        if text.contains(BANNER_MARKER) {
                            self.phase = Phase::Ready;
                            self.ready = true;
                            events.push(HdmiEvent::BannerSeen);
                        } else {
                            events.push(HdmiEvent::Unknown(b));
                        }
                    }
                }
                Phase::Ready => {
                    if b == b'>' {
                        let text =
                            String::from_utf8_lossy(&self.buffer[..self.buffer.len() - 1]).into_owned();
                        self.buffer.clear();
                        self.ready = true;
                        events.push(HdmiEvent::Response(text));
                    }
                }
            }
        }
        events
    }
}

/// Handle used by the command router to submit symbolic keys to the HDMI
/// switch.
#[derive(Clone)]
pub struct HdmiHandle {
    tx: mpsc::Sender<String>,
}

impl HdmiHandle {
    pub async fn send(&self, key: impl Into<String>) -> Result<()> {
        self.tx
            .send(key.into())
            .await
            .map_err(|_| HifictlError::ConnectionLost {
                reason: "hdmi driver task has ended".into(),
            })
    }
}

/// Owns the HDMI switch's serial session: reconnect loop plus the
/// [`HdmiSession`] wiring.
pub struct HdmiDriver {
    device_path: String,
    commands: mpsc::Receiver<String>,
    /// Last response text seen, exposed for diagnostics/tests.
    last_response: Arc<Mutex<Option<String>>>,
}

impl HdmiDriver {
    pub fn new(device_path: impl Into<String>) -> (Self, HdmiHandle, Arc<Mutex<Option<String>>>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let last_response = Arc::new(Mutex::new(None));
        let driver = Self {
            device_path: device_path.into(),
            commands: rx,
            last_response: last_response.clone(),
        };
        (driver, HdmiHandle { tx }, last_response)
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = RECONNECT_BACKOFF_INITIAL;
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.session(&mut shutdown).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(error = %err, path = %self.device_path, "hdmi session ended, reconnecting");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                    backoff = (backoff * 2).min(RECONNECT_BACKOFF_CAP);
                }
            }
        }
    }

    async fn session(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let mut port = open_port(&self.device_path).await?;
        info!(path = %self.device_path, "hdmi serial port open");

        let mut hdmi = HdmiSession::new();
        let mut last_activity = Instant::now();
        let mut buf = [0u8; READ_CHUNK];
        let mut auto_toggled = false;

        loop {
            let idle_deadline = last_activity + READ_IDLE_TIMEOUT;

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }

                _ = tokio::time::sleep_until(idle_deadline) => {
                    return Err(HifictlError::ConnectionLost {
                        reason: "no hdmi activity within 10s".into(),
                    });
                }

                read = port.read(&mut buf) => {
                    let n = read.map_err(HifictlError::TransientIo)?;
                    if n == 0 {
                        return Err(HifictlError::ConnectionLost {
                            reason: "EOF on hdmi serial port".into(),
                        });
                    }
                    last_activity = Instant::now();
                    for event in hdmi.feed(&buf[..n]) {
                        match event {
                            HdmiEvent::BannerSeen => {
                                info!("hdmi banner recognized");
                                if !auto_toggled {
                                    auto_toggled = true;
                                    if let Some(code) = lookup("on/off") {
                                        port.write_all(&encode_command(code)).await.map_err(HifictlError::TransientIo)?;
                                        hdmi.record_sent();
                                    }
                                }
                            }
                            HdmiEvent::Response(text) => {
                                debug!(response = %text, "hdmi response");
                                *self.last_response.lock().await = Some(text);
                            }
                            HdmiEvent::EnteredStandby => info!("hdmi switch entered standby"),
                            HdmiEvent::Unknown(byte) => warn!(byte, "unexpected hdmi byte during init"),
                        }
                    }
                }

                Some(key) = self.commands.recv(), if hdmi.is_ready() => {
                    match lookup(&key) {
                        Some(code) => {
                            port.write_all(&encode_command(code)).await.map_err(HifictlError::TransientIo)?;
                            hdmi.record_sent();
                            debug!(command = %key, "hdmi command sent");
                        }
                        None => warn!(command = %key, "unknown hdmi command"),
                    }
                }
            }
        }
    }
}

async fn open_port(path: &str) -> Result<SerialStream> {
    let mut port = tokio_serial::new(path, HDMI_BAUD)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|err| HifictlError::Fatal {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::Other, err),
        })?;

    let _ = port.write_request_to_send(true);
    let _ = port.write_request_to_send(false);

    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_startup_banner_and_becomes_ready() {
        let mut session = HdmiSession::new();
        let banner = b"\n\rMarmitek BV, The Netherlands.\n\r>";
        let events = session.feed(banner);
        assert_eq!(events, vec![HdmiEvent::BannerSeen]);
        assert!(session.is_ready());
    }

    #[test]
    fn prompt_delimited_response_after_a_command() {
        let mut session = HdmiSession::new();
        session.feed(b"\n\rMarmitek BV, The Netherlands.\n\r>");
        session.record_sent();
        assert!(!session.is_ready());

        let events = session.feed(b"1 OK>");
        assert_eq!(events, vec![HdmiEvent::Response("1 OK".to_string())]);
        assert!(session.is_ready());
    }

    #[test]
    fn nul_byte_marks_standby_and_clears_ready() {
        let mut session = HdmiSession::new();
        session.feed(b"\n\rMarmitek BV, The Netherlands.\n\r>");
        assert!(session.is_ready());

        let events = session.feed(&[0x00]);
        assert_eq!(events, vec![HdmiEvent::EnteredStandby]);
        assert!(!session.is_ready());
    }

    #[test]
    fn on_and_off_encode_to_the_same_toggle_code() {
        assert_eq!(lookup("on"), Some(b'5'));
        assert_eq!(lookup("off"), Some(b'5'));
        assert_eq!(lookup("on/off"), Some(b'5'));
    }

    #[test]
    fn command_is_wrapped_in_crlr_on_both_sides() {
        let frame = encode_command(b'1');
        assert_eq!(frame, b"\n\r1\n\r");
    }

    #[test]
    fn unknown_command_key_has_no_code() {
        assert_eq!(lookup("not a real command"), None);
    }
}

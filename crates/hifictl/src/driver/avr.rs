// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Full-duplex session driver for the AVR's serial port: framing, status
//! decoding, the control loop, and the write throttle all meet here.

use crate::control;
use crate::driver::framer::{FrameEvent, Framer};
use crate::driver::throttle::ThrottleGate;
use crate::error::{HifictlError, Result};
use crate::presenter::Presenter;
use crate::proto::datagram::{self, AVR_PC_STATUS, PC_AVR_COMMAND};
use crate::proto::{catalogue, AvrStatus};
use crate::state::AvrState;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

const AVR_BAUD: u32 = 38_400;
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const THROTTLE_TICK: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 256;
const COMMAND_QUEUE_DEPTH: usize = 16;
const RECONNECT_BACKOFF_INITIAL: Duration = Duration::from_millis(250);
const RECONNECT_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Handle used by the command router to submit symbolic keys to the AVR.
#[derive(Clone)]
pub struct AvrHandle {
    tx: mpsc::Sender<String>,
}

impl AvrHandle {
    pub async fn send(&self, key: impl Into<String>) -> Result<()> {
        self.tx
            .send(key.into())
            .await
            .map_err(|_| HifictlError::ConnectionLost {
                reason: "avr driver task has ended".into(),
            })
    }
}

/// Owns the AVR serial session: reconnect loop, framer, throttle, and the
/// state reducer/control loop hookup.
pub struct AvrDriver {
    device_path: String,
    presenter: Arc<Presenter>,
    commands: mpsc::Receiver<String>,
    state: AvrState,
}

impl AvrDriver {
    pub fn new(device_path: impl Into<String>, presenter: Arc<Presenter>) -> (Self, AvrHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let driver = Self {
            device_path: device_path.into(),
            presenter,
            commands: rx,
            state: AvrState::initial(),
        };
        (driver, AvrHandle { tx })
    }

    /// Run the reconnect loop until `shutdown` is signaled. Never returns an
    /// error: connection loss is handled internally by reconnecting with
    /// bounded exponential backoff.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = RECONNECT_BACKOFF_INITIAL;
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.session(&mut shutdown).await {
                Ok(()) => return, // shutdown requested mid-session
                Err(err) => {
                    warn!(error = %err, path = %self.device_path, "avr session ended, reconnecting");
                    let (next, changed) = self.state.mark_off();
                    self.state = next;
                    self.presenter.publish(self.state.clone(), changed);

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
        info!(path = %self.device_path, "avr serial port open");

        let mut framer = Framer::new(AVR_PC_STATUS);
        let mut throttle = ThrottleGate::new();
        let mut last_frame_at = Instant::now();
        let mut last_send_at: Option<Instant> = None;
        let mut buf = [0u8; READ_CHUNK];
        // Commands awaiting a throttle slot: externally submitted keys and
        // ones the control loop enqueues in reaction to a state transition
        // share this queue, so a wake-up and its follow-up probe never race.
        let mut pending: VecDeque<String> = VecDeque::new();

        loop {
            let idle_deadline = last_frame_at + READ_IDLE_TIMEOUT;

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }

                _ = tokio::time::sleep_until(idle_deadline) => {
                    return Err(HifictlError::ConnectionLost {
                        reason: "no status frame within 10s".into(),
                    });
                }

                _ = tokio::time::sleep(THROTTLE_TICK), if !throttle.is_ready() => {
                    throttle.tick(THROTTLE_TICK);
                }

                read = port.read(&mut buf) => {
                    let n = read.map_err(HifictlError::TransientIo)?;
                    if n == 0 {
                        return Err(HifictlError::ConnectionLost {
                            reason: "EOF on avr serial port".into(),
                        });
                    }
                    last_frame_at = Instant::now();
                    self.handle_bytes(&mut framer, &buf[..n], &mut pending);
                }

                Some(key) = self.commands.recv() => {
                    pending.push_back(key);
                }
            }

            if throttle.is_ready() && !self.state.off {
                if let Some(key) = pending.pop_front() {
                    match encode_command(&key) {
                        Ok(frame) => {
                            port.write_all(&frame).await.map_err(HifictlError::TransientIo)?;
                            let since = last_send_at.map(|t| t.elapsed());
                            throttle.record_send(since);
                            last_send_at = Some(Instant::now());
                            debug!(command = %key, "avr command sent");
                        }
                        Err(err) => warn!(error = %err, command = %key, "dropping avr command"),
                    }
                }
            }
        }
    }

    fn handle_bytes(&mut self, framer: &mut Framer, bytes: &[u8], pending: &mut VecDeque<String>) {
        for event in framer.feed(bytes) {
            match event {
                FrameEvent::Payload(payload) => match AvrStatus::parse(&payload) {
                    Ok(status) => self.handle_status(&status, pending),
                    Err(err) => warn!(error = %err, "malformed avr status payload"),
                },
                FrameEvent::Error(err) => warn!(error = %err, "avr framer decode error"),
            }
        }
    }

    fn handle_status(&mut self, status: &AvrStatus, pending: &mut VecDeque<String>) {
        let (next, changed) = self.state.apply(status);
        let queued = control::on_transition(&self.state, &next, pending.len());
        self.state = next;
        self.presenter.publish(self.state.clone(), changed);
        for cmd in queued {
            pending.push_back(cmd.to_string());
        }
    }
}

/// External command vocabulary accepted over the router (`"avr vol+"`,
/// `"avr source vid1"`, ...), mapped to the native remote-keypress name
/// `catalogue` understands. `vol?`/`dig?` don't read anything back directly;
/// they press a button that makes the receiver emit a status frame with the
/// value filled in.
const VOCABULARY: &[(&str, &str)] = &[
    ("on", "POWER ON"),
    ("off", "POWER OFF"),
    ("mute", "MUTE"),
    ("vol+", "VOL UP"),
    ("vol-", "VOL DOWN"),
    ("vol?", "VOL DOWN"),
    ("source vid1", "VID1"),
    ("source vid2", "VID2"),
    ("surround 6ch", "6CH/8CH"),
    ("surround dolby", "DOLBY"),
    ("surround dts", "DTS"),
    ("surround stereo", "STEREO"),
    ("dig+", "DIGITAL UP"),
    ("dig-", "DIGITAL DOWN"),
    ("dig?", "DIGITAL"),
];

/// Translate an external vocabulary key to its native catalogue name. Keys
/// the control loop enqueues directly (`"POWER ON"`, `"VOL DOWN"`, ...) are
/// already catalogue names and pass through unchanged.
fn translate(key: &str) -> &str {
    VOCABULARY
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, native)| *native)
        .unwrap_or(key)
}

/// Encode a symbolic remote key into a wire frame. Pure and independently
/// testable without a serial port.
fn encode_command(key: &str) -> Result<Vec<u8>> {
    let native = translate(key);
    let code = catalogue::lookup(native).ok_or_else(|| HifictlError::CommandError(key.to_string()))?;
    datagram::encode(&code, &PC_AVR_COMMAND)
}

async fn open_port(path: &str) -> Result<SerialStream> {
    let mut port = tokio_serial::new(path, AVR_BAUD)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|err| HifictlError::Fatal {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::Other, err),
        })?;

    // Adapter quirk: toggle RTS/CTS on then immediately off to coax the
    // adapter into reliable operation.
    let _ = port.write_request_to_send(true);
    let _ = port.write_request_to_send(false);

    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_command_rejects_unknown_key() {
        let err = encode_command("NOT A REAL KEY").unwrap_err();
        assert!(matches!(err, HifictlError::CommandError(_)));
    }

    #[test]
    fn encode_command_produces_a_14_byte_frame() {
        let frame = encode_command("POWER ON").unwrap();
        assert_eq!(frame.len(), 14);
        assert!(frame.starts_with(b"PCSEND"));
    }

    #[test]
    fn encode_command_translates_external_vocabulary() {
        assert_eq!(encode_command("vol+").unwrap(), encode_command("VOL UP").unwrap());
        assert_eq!(
            encode_command("source vid1").unwrap(),
            encode_command("VID1").unwrap()
        );
        assert_eq!(
            encode_command("surround dolby").unwrap(),
            encode_command("DOLBY").unwrap()
        );
    }

    #[test]
    fn encode_command_accepts_catalogue_keys_issued_by_the_control_loop() {
        assert!(encode_command("POWER OFF").is_ok());
        assert!(encode_command("DIGITAL").is_ok());
    }

    #[tokio::test]
    async fn avr_handle_reports_error_once_driver_is_gone() {
        let presenter = Arc::new(Presenter::new(AvrState::initial()));
        let (driver, handle) = AvrDriver::new("/dev/null", presenter);
        drop(driver);
        assert!(handle.send("POWER ON").await.is_err());
    }
}

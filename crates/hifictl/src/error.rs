// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared across the protocol, state, and driver layers.

use thiserror::Error;

/// Result alias used throughout `hifictl`.
pub type Result<T> = std::result::Result<T, HifictlError>;

/// Errors raised while encoding, decoding, or driving the two devices.
///
/// Protocol errors are local and recoverable: the caller logs them at
/// `warn` and resumes framing from the next prefix search. `ConnectionLost`
/// and `Fatal` are the only variants that should ever change process-level
/// behavior (reconnect loop, or process exit respectively).
#[derive(Debug, Error)]
pub enum HifictlError {
    /// Encode/decode was asked to operate on a payload of the wrong length.
    #[error("bad payload length: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    /// Decoded frame did not start with the spec's keyword/type/length prefix.
    #[error("bad datagram prefix")]
    BadPrefix,

    /// The type byte in the frame did not match the spec.
    #[error("bad datagram type: expected {expected:#04x}, got {actual:#04x}")]
    BadType { expected: u8, actual: u8 },

    /// The declared length byte in the frame did not match the spec.
    #[error("bad declared length: expected {expected}, got {actual}")]
    BadDeclaredLength { expected: u8, actual: u8 },

    /// XOR checksum did not match the payload.
    #[error("checksum mismatch")]
    BadChecksum,

    /// A 48-byte status payload did not have the three expected marker bytes.
    #[error("malformed status payload: {reason}")]
    MalformedStatus { reason: String },

    /// A read on the serial port returned `EAGAIN`/`EIO`-equivalent; safe to retry.
    #[error("transient I/O error: {0}")]
    TransientIo(#[source] std::io::Error),

    /// EOF, or a read-idle watchdog expired. The driver will reconnect.
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// A symbolic command key was not found in the device's command catalogue.
    #[error("unknown command: {0:?}")]
    CommandError(String),

    /// Could not open the configured serial port at startup; unrecoverable.
    #[error("failed to open serial port {path:?}: {source}")]
    Fatal {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Wraps any other I/O failure (config loading, etc).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration — the options enumerated in the protocol spec's
//! "Configuration options" section.
//!
//! Static constants (baud rates, timeouts) live next to the code that uses
//! them; this module only holds the handful of values that legitimately
//! vary per deployment.

use serde::{Deserialize, Serialize};

fn default_avr_device_path() -> String {
    "/dev/ttyUSB1".to_string()
}

fn default_hdmi_device_path() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_host() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    8000
}

/// Deployment configuration: serial device paths, log verbosity, and the
/// presenter's listen address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Filesystem path to the AVR serial port.
    pub avr_device_path: String,
    /// Filesystem path to the HDMI switch serial port.
    pub hdmi_device_path: String,
    /// One of `debug`, `info`, `warning`, `error`.
    pub log_level: String,
    /// Bind address for the external presenter.
    pub listen_host: String,
    /// Bind port for the external presenter.
    pub listen_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            avr_device_path: default_avr_device_path(),
            hdmi_device_path: default_hdmi_device_path(),
            log_level: default_log_level(),
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a `RuntimeConfig` from TOML text, falling back to defaults for
    /// any field the document omits.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.avr_device_path, "/dev/ttyUSB1");
        assert_eq!(cfg.hdmi_device_path, "/dev/ttyUSB0");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.listen_port, 8000);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg = RuntimeConfig::from_toml_str("avr_device_path = \"/dev/ttyS0\"\n").unwrap();
        assert_eq!(cfg.avr_device_path, "/dev/ttyS0");
        assert_eq!(cfg.hdmi_device_path, "/dev/ttyUSB0");
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `hifictl-daemon` — thin wiring around `hifictl`: parses CLI arguments,
//! installs logging and a Ctrl+C handler, opens both serial ports, and
//! exposes the presenter over a small JSON/WebSocket surface.
//!
//! This binary deliberately carries no engineering of its own beyond
//! wiring; the protocol, state, and driver logic all live in `hifictl`.

mod handlers;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use hifictl::driver::{AvrDriver, HdmiDriver};
use hifictl::{CommandRouter, Presenter, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Which driver a routed command should be forwarded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTarget {
    Avr,
    Hdmi,
}

/// Shared application state handed to every axum handler.
pub struct AppState {
    pub presenter: Arc<Presenter>,
    pub router: CommandRouter<DeviceTarget>,
    pub avr: hifictl::driver::AvrHandle,
    pub hdmi: hifictl::driver::HdmiHandle,
    pub hdmi_last_response: Arc<Mutex<Option<String>>>,
}

#[derive(Parser, Debug)]
#[command(name = "hifictl-daemon")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AVR + HDMI-switch control daemon")]
struct Cli {
    /// Optional TOML configuration file. CLI flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port for the receiver.
    #[arg(long)]
    avr_device: Option<String>,

    /// Serial port for the HDMI switch.
    #[arg(long)]
    hdmi_device: Option<String>,

    /// One of `debug`, `info`, `warning`, `error`.
    #[arg(long)]
    log_level: Option<String>,

    /// HTTP bind address.
    #[arg(long)]
    listen_host: Option<String>,

    /// HTTP bind port.
    #[arg(long)]
    listen_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = build_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(normalize_log_level(&cfg.log_level)))
        .with_target(false)
        .init();

    info!(
        avr = %cfg.avr_device_path,
        hdmi = %cfg.hdmi_device_path,
        "starting hifictl-daemon"
    );

    let presenter = Arc::new(Presenter::new(hifictl::AvrState::initial()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (avr_driver, avr_handle) = AvrDriver::new(cfg.avr_device_path.clone(), presenter.clone());
    let (hdmi_driver, hdmi_handle, hdmi_last_response) = HdmiDriver::new(cfg.hdmi_device_path.clone());

    let avr_task = tokio::spawn(avr_driver.run(shutdown_rx.clone()));
    let hdmi_task = tokio::spawn(hdmi_driver.run(shutdown_rx.clone()));

    ctrlc_handler(shutdown_tx);

    let mut router = CommandRouter::new();
    router.register("avr", DeviceTarget::Avr);
    router.register("hdmi", DeviceTarget::Hdmi);

    let state = Arc::new(AppState {
        presenter,
        router,
        avr: avr_handle,
        hdmi: hdmi_handle,
        hdmi_last_response,
    });

    let app = build_router(state);
    let addr = format!("{}:{}", cfg.listen_host, cfg.listen_port);
    info!(%addr, "http presenter listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let mut http_shutdown = shutdown_rx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = http_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("presenter http server error")?;

    let _ = tokio::join!(avr_task, hdmi_task);
    Ok(())
}

/// `tracing_subscriber::EnvFilter` only recognizes the level name `warn`;
/// the config's documented spelling is `warning`.
fn normalize_log_level(level: &str) -> String {
    if level.eq_ignore_ascii_case("warning") {
        "warn".to_string()
    } else {
        level.to_string()
    }
}

fn build_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            RuntimeConfig::from_toml_str(&text).with_context(|| "failed to parse config file")?
        }
        None => RuntimeConfig::default(),
    };

    if let Some(ref v) = cli.avr_device {
        cfg.avr_device_path = v.clone();
    }
    if let Some(ref v) = cli.hdmi_device {
        cfg.hdmi_device_path = v.clone();
    }
    if let Some(ref v) = cli.log_level {
        cfg.log_level = v.clone();
    }
    if let Some(ref v) = cli.listen_host {
        cfg.listen_host = v.clone();
    }
    if let Some(v) = cli.listen_port {
        cfg.listen_port = v;
    }

    Ok(cfg)
}

fn build_router(state: Arc<AppState>) -> Router {
    routes::api_routes()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn ctrlc_handler(shutdown_tx: watch::Sender<bool>) {
    let _ = ctrlc::set_handler(move || {
        tracing::info!("received Ctrl+C, shutting down");
        let _ = shutdown_tx.send(true);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_is_normalized_to_warn() {
        assert_eq!(normalize_log_level("warning"), "warn");
        assert_eq!(normalize_log_level("WARNING"), "warn");
    }

    #[test]
    fn other_levels_pass_through() {
        assert_eq!(normalize_log_level("debug"), "debug");
        assert_eq!(normalize_log_level("info"), "info");
        assert_eq!(normalize_log_level("error"), "error");
    }
}

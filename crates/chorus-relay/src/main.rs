//! # chorus-relay
//!
//! Relay binary: connects the shared upstream session, then serves browser
//! clients over WebSocket until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chorus_core::constants::VERSION;
use chorus_live::{LiveConfig, LiveSession};
use chorus_server::config::ServerConfig;
use chorus_server::server::RelayServer;
use chorus_settings::{RelaySettings, UpstreamSettings};
use clap::Parser;

/// Shared Gemini Live session relay.
#[derive(Parser, Debug)]
#[command(name = "chorus-relay", version, about = "Shared Gemini Live session relay")]
struct Cli {
    /// Settings file (default `~/.chorus/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Directory with the browser client page.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `chorus_server=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply flags on top of loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn live_config(upstream: &UpstreamSettings) -> LiveConfig {
    LiveConfig {
        base_url: upstream.base_url.clone(),
        api_key: upstream.api_key.clone(),
        model: upstream.model.clone(),
        response_modalities: upstream.response_modalities.clone(),
        voice_name: upstream.voice_name.clone(),
        system_instruction: upstream.system_instruction.clone(),
        tools: upstream.tools.clone(),
        connect_timeout: Duration::from_millis(upstream.connect_timeout_ms),
        command_queue_capacity: upstream.command_queue_capacity,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(chorus_settings::settings_path);
    let mut settings = chorus_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    cli.apply(&mut settings);

    chorus_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    tracing::info!(version = VERSION, settings = %settings_path.display(), "starting chorus relay");

    let metrics_handle = chorus_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    // The one upstream session, established before any client is accepted
    let (session, events) = LiveSession::connect(live_config(&settings.upstream))
        .await
        .context("Failed to connect upstream session")?;
    let session = Arc::new(session);

    let server = RelayServer::new(
        ServerConfig::from(&settings.server),
        session.clone(),
        metrics_handle,
    );
    let bridge_handle = tokio::spawn(server.upstream_bridge(events).run(server.shutdown().token()));

    let (addr, serve_handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("chorus relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    session.close().await;
    let report = server
        .shutdown()
        .graceful_shutdown(server.registry(), vec![serve_handle, bridge_handle], None)
        .await;

    tracing::info!(
        clients = report.clients_at_start,
        clients_remaining = report.clients_remaining,
        dropped_upstream_commands = session.dropped_commands(),
        "Shutdown complete"
    );
    Ok(())
}

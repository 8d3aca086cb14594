// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `prefs-host`: headless preferences host on a Unix socket.

use anyhow::{Context, Result};
use clap::Parser;
use prefs_app_core::{BlobStore, DocumentService};
use prefs_config_fs::FsBlobStore;
use prefs_session_service::{demo, open_store, HostEvents, HostPorts, HostSettings, Hub};
use std::path::PathBuf;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "prefs-host",
    about = "Serve the canonical preferences document to UI replicas"
)]
struct Args {
    /// Unix socket path (overrides the stored setting)
    #[arg(long)]
    socket: Option<PathBuf>,
    /// Directory holding preferences.json, schema.json, ... (defaults to the platform config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Debounce window served to replicas, in milliseconds
    #[arg(long)]
    debounce: Option<u64>,
}

fn blob_store(args: &Args) -> Result<FsBlobStore> {
    let store = match &args.config_dir {
        Some(dir) => FsBlobStore::at(dir),
        None => FsBlobStore::new(),
    };
    store.context("opening config directory")
}

fn theme_of(doc: &prefs_app_core::Preferences) -> &str {
    doc.value("theme", "theme")
        .and_then(|v| v.as_str())
        .unwrap_or("system")
}

/// Re-read preferences.json on every SIGHUP and push it when it changed.
async fn reload_on_hangup<S>(hub: Hub<S>) -> Result<()>
where
    S: BlobStore + Send + Sync + 'static,
{
    let mut hangups = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    while hangups.recv().await.is_some() {
        match hub.reload_preferences().await {
            Ok(true) => info!("preferences reloaded from disk"),
            Ok(false) => debug!("preferences unchanged on disk"),
            Err(err) => warn!(?err, "reload failed; keeping current document"),
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let blobs = blob_store(&args)?;
    info!(dir = %blobs.base().display(), "using config directory");

    let docs = DocumentService::new(blobs);
    let mut settings = HostSettings::load_or_init(&docs)?;
    if let Some(ms) = args.debounce {
        settings.config.debounce = ms;
    }
    let socket_path = args
        .socket
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.socket_path));

    let store = open_store(docs, &settings)?;
    info!(theme = theme_of(store.preferences()), "initial theme");

    let mut events = HostEvents::new();
    events.on_save(|doc| info!(theme = theme_of(doc), "preferences saved"));
    events.on_click(|channel| {
        if channel == demo::DEMO_BUTTON_CHANNEL {
            info!("button clicked in a preferences window");
        }
    });
    let ports = HostPorts {
        events,
        ..HostPorts::default()
    };
    let hub = Hub::new(store, ports, settings.echo_to_origin);

    // Remove stale socket if present
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding {}", socket_path.display()))?;
    info!(socket = %socket_path.display(), "preferences host listening");

    let reloader = hub.clone();
    tokio::spawn(async move {
        if let Err(err) = reload_on_hangup(reloader).await {
            warn!(?err, "disk reload disabled");
        }
    });

    tokio::select! {
        res = hub.serve(listener) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            let _ = std::fs::remove_file(&socket_path);
            Ok(())
        }
    }
}

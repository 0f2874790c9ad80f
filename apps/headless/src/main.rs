use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{
    config::validate_ws_url, load_settings, GestureRuntime, SharedCamera, WebSocketSource,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod map_camera;

use map_camera::{InMemoryMapCamera, MapView};

/// Drives an in-memory map camera from a gesture producer and prints every
/// status change as a JSON line.
#[derive(Parser, Debug)]
struct Args {
    /// Producer endpoint; overrides the settings file and environment.
    #[arg(long)]
    ws_url: Option<String>,
    /// Settings file; defaults to ./gesture_control.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(ws_url) = args.ws_url {
        validate_ws_url(&ws_url)?;
        settings.ws_url = ws_url;
    }
    info!(ws_url = %settings.ws_url, "starting gesture control");

    let camera = Arc::new(Mutex::new(InMemoryMapCamera::new(MapView::default())));
    let shared: SharedCamera = camera.clone();
    let (runtime, handle) = GestureRuntime::new(settings, WebSocketSource);
    handle.attach_camera(&shared);
    let mut status = handle.subscribe();
    let runtime_task = tokio::spawn(runtime.run());
    handle.connect()?;

    loop {
        tokio::select! {
            changed = status.recv() => match changed {
                Ok(status) => println!("{}", serde_json::to_string(&status)?),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "status output fell behind"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("shutting down");
                break;
            }
        }
    }

    if handle.destroy().is_err() {
        warn!("runtime already stopped");
    }
    runtime_task.await?;

    let view = camera
        .lock()
        .map_err(|_| anyhow!("camera lock poisoned"))?
        .view();
    info!(
        lng = view.center[0],
        lat = view.center[1],
        zoom = view.zoom,
        pitch = view.pitch,
        bearing = view.bearing,
        "final camera view"
    );
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task;
use tracing_subscriber::EnvFilter;

use handbridge_core::GestureRecognizer;
use handbridge_hw::Camera;

mod config;
mod draw;
mod engine;
mod hub;
mod listener;
mod preview;

use config::{Args, Config};
use engine::Engine;
use hub::BroadcastHub;
use preview::Preview;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_args(Args::parse());
    tracing::info!(
        port = config.port,
        camera = config.camera_index,
        model_dir = %config.model_dir.display(),
        preview = config.preview,
        "handbridged starting"
    );

    // Fail fast: camera and models are opened before any client can
    // connect, so a misconfigured host exits with a clear diagnostic.
    let camera = Camera::open(config.camera_index, config.capture)
        .with_context(|| format!("failed to open camera /dev/video{}", config.camera_index))?;
    tracing::info!(
        width = camera.width,
        height = camera.height,
        "camera opened"
    );

    let recognizer = GestureRecognizer::load(&config.model_dir_str(), config.recognizer)
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let local = task::LocalSet::new();

    local.block_on(&runtime, async move {
        let tcp = TcpListener::bind(("127.0.0.1", config.port))
            .await
            .with_context(|| format!("failed to bind 127.0.0.1:{}", config.port))?;
        tracing::info!(port = config.port, "listening");

        let hub = BroadcastHub::new();
        let server = task::spawn_local(listener::serve(tcp, hub.clone()));

        let shutdown = Rc::new(Cell::new(false));
        let flag = shutdown.clone();
        task::spawn_local(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                flag.set(true);
            }
        });

        let preview = if config.preview {
            match Preview::open(camera.width, camera.height) {
                Ok(preview) => Some(preview),
                Err(e) => {
                    tracing::warn!(error = %e, "could not open preview window, continuing without");
                    None
                }
            }
        } else {
            None
        };

        let stream = camera.stream().context("failed to start camera stream")?;
        let engine = Engine::new(
            stream,
            recognizer,
            hub,
            preview,
            Duration::from_millis(config.frame_interval_ms),
            shutdown,
        );

        engine.run().await;

        // Stop accepting before the socket drops so clients see a clean close
        server.abort();
        Ok::<(), anyhow::Error>(())
    })?;

    tracing::info!("handbridged stopped");
    Ok(())
}

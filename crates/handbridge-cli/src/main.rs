use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use handbridge_hw::{Camera, CaptureConfig, FrameSource};

#[derive(Parser)]
#[command(name = "handbridge", about = "Handbridge diagnostics CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available camera devices
    Cameras,
    /// Open a camera, grab one frame, and report what came back
    Probe {
        /// Camera device index (/dev/videoN)
        #[arg(long, default_value_t = 0)]
        camera: u32,
        /// Save the captured frame as a PNG
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Connect to a running daemon and print its frame records
    Tail {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8765)]
        port: u16,
        /// Pretty-print each record instead of raw lines
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cameras => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No camera devices found");
            }
            for info in devices {
                println!("[{}] {} — {} ({})", info.index, info.path, info.name, info.driver);
            }
        }
        Commands::Probe { camera, save } => {
            let cam = Camera::open(camera, CaptureConfig::default())
                .with_context(|| format!("failed to open /dev/video{camera}"))?;
            println!("Opened /dev/video{camera}: {}x{}", cam.width, cam.height);

            let mut stream = cam.stream().context("failed to start stream")?;
            let frame = stream.read().context("failed to capture a frame")?;
            println!(
                "Captured frame: {}x{}, {} bytes RGB",
                frame.width,
                frame.height,
                frame.data.len()
            );

            if let Some(path) = save {
                let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data)
                    .context("frame buffer does not match its dimensions")?;
                img.save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Saved {}", path.display());
            }
        }
        Commands::Tail { host, port, pretty } => {
            let addr = format!("{host}:{port}");
            let stream = TcpStream::connect(&addr)
                .await
                .with_context(|| format!("failed to connect to {addr}"))?;
            eprintln!("Connected to {addr}");

            let mut lines = BufReader::new(stream).lines();
            while let Some(line) = lines.next_line().await? {
                if pretty {
                    match serde_json::from_str::<serde_json::Value>(&line) {
                        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                        Err(_) => println!("{line}"),
                    }
                } else {
                    println!("{line}");
                }
            }
            eprintln!("Stream closed by daemon");
        }
    }

    Ok(())
}

use clap::Parser;
use handbridge_core::RecognizerOptions;
use handbridge_hw::CaptureConfig;
use std::path::PathBuf;

/// Webcam hand tracking bridge: detects hands and gestures and broadcasts
/// per-frame JSON records over a local TCP socket.
#[derive(Parser, Debug)]
#[command(name = "handbridged", version)]
pub struct Args {
    /// TCP port to listen on (loopback only).
    #[arg(long, default_value_t = 8765)]
    pub port: u16,

    /// Camera device index (/dev/videoN).
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Directory containing the ONNX model files.
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Show a local preview window with the skeleton overlay.
    #[arg(long)]
    pub preview: bool,
}

/// Daemon configuration: CLI flags merged with `HANDBRIDGE_*` environment
/// variables for the tuning knobs.
pub struct Config {
    pub port: u16,
    pub camera_index: u32,
    pub model_dir: PathBuf,
    pub preview: bool,
    /// Target capture interval in milliseconds (~30 fps by default).
    pub frame_interval_ms: u64,
    /// Resolution and rate hints passed to the camera driver.
    pub capture: CaptureConfig,
    pub recognizer: RecognizerOptions,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let model_dir = args
            .model_dir
            .or_else(|| std::env::var("HANDBRIDGE_MODEL_DIR").map(PathBuf::from).ok())
            .unwrap_or_else(default_model_dir);

        let defaults = RecognizerOptions::default();
        let recognizer = RecognizerOptions {
            max_hands: env_usize("HANDBRIDGE_MAX_HANDS", defaults.max_hands),
            min_detection_confidence: env_f32(
                "HANDBRIDGE_MIN_DETECTION_CONFIDENCE",
                defaults.min_detection_confidence,
            ),
            min_presence_confidence: env_f32(
                "HANDBRIDGE_MIN_PRESENCE_CONFIDENCE",
                defaults.min_presence_confidence,
            ),
            min_tracking_confidence: env_f32(
                "HANDBRIDGE_MIN_TRACKING_CONFIDENCE",
                defaults.min_tracking_confidence,
            ),
        };

        let capture_defaults = CaptureConfig::default();
        let capture = CaptureConfig {
            width: env_u32("HANDBRIDGE_FRAME_WIDTH", capture_defaults.width),
            height: env_u32("HANDBRIDGE_FRAME_HEIGHT", capture_defaults.height),
            fps: env_u32("HANDBRIDGE_FRAME_FPS", capture_defaults.fps),
        };

        Self {
            port: args.port,
            camera_index: args.camera,
            model_dir,
            preview: args.preview,
            frame_interval_ms: env_u64("HANDBRIDGE_FRAME_INTERVAL_MS", 33),
            capture,
            recognizer,
        }
    }

    pub fn model_dir_str(&self) -> String {
        self.model_dir.to_string_lossy().into_owned()
    }
}

fn default_model_dir() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_dir.join("handbridge/models")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["handbridged"]);
        assert_eq!(args.port, 8765);
        assert_eq!(args.camera, 0);
        assert!(!args.preview);
    }

    #[test]
    fn test_flag_overrides() {
        let args = Args::parse_from([
            "handbridged",
            "--port",
            "9000",
            "--camera",
            "2",
            "--preview",
        ]);
        let config = Config::from_args(args);
        assert_eq!(config.port, 9000);
        assert_eq!(config.camera_index, 2);
        assert!(config.preview);
    }
}

//! handbridge-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access by device index, RGB frame
//! conversion, and the horizontal mirroring used for selfie-view capture.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CaptureConfig, FrameSource};
pub use frame::Frame;

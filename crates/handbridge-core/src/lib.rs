//! handbridge-core — Hand detection and gesture classification engine.
//!
//! Uses an SSD palm detector to find hand regions and a landmark model to
//! recover the 21-point hand skeleton, both running via ONNX Runtime for
//! CPU inference. Gestures are classified from landmark geometry, and the
//! frame processor shapes everything into the per-frame record the daemon
//! broadcasts.

pub mod gesture;
pub mod landmarker;
pub mod palm;
pub mod processor;
pub mod recognizer;
pub mod topology;
pub mod types;

pub use processor::FrameProcessor;
pub use recognizer::{GestureRecognizer, HandRecognizer, RecognizerError, RecognizerOptions};
pub use types::{FrameResult, Gesture, HandObservation, Handedness, Landmark, RawHand};

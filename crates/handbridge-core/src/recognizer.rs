//! Two-stage gesture recognizer: palm detection, then per-hand landmarks.

use thiserror::Error;

use crate::gesture;
use crate::landmarker::{CropTransform, HandLandmarker, LandmarkError};
use crate::palm::{crop_from_region, PalmDetector, PalmError};
use crate::types::{Handedness, RawHand};

/// File names expected inside the model directory.
pub const PALM_MODEL_FILE: &str = "palm_detection.onnx";
pub const LANDMARK_MODEL_FILE: &str = "hand_landmark.onnx";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error(transparent)]
    Palm(#[from] PalmError),
    #[error(transparent)]
    Landmark(#[from] LandmarkError),
}

/// Tunable thresholds for the recognition pipeline.
#[derive(Debug, Clone, Copy)]
pub struct RecognizerOptions {
    /// Maximum number of hands reported per frame.
    pub max_hands: usize,
    /// Minimum palm detection score to consider a region.
    pub min_detection_confidence: f32,
    /// Minimum landmark-model presence score to keep a hand.
    pub min_presence_confidence: f32,
    /// Accepted for configuration parity; unused because every frame is
    /// processed independently, with no cross-frame tracking.
    pub min_tracking_confidence: f32,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_presence_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Per-frame hand recognition. The engine only needs this surface, which
/// keeps the ONNX pipeline swappable in tests.
pub trait HandRecognizer {
    /// Recognize hands in an RGB frame. Coordinates in the returned hands
    /// are normalized to the frame.
    fn recognize(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawHand>, RecognizerError>;
}

/// The production recognizer: SSD palm detector feeding the 21-point
/// landmark model, with gestures classified from landmark geometry.
pub struct GestureRecognizer {
    palm: PalmDetector,
    landmarker: HandLandmarker,
    options: RecognizerOptions,
}

impl GestureRecognizer {
    /// Load both models from a directory containing `palm_detection.onnx`
    /// and `hand_landmark.onnx`.
    pub fn load(model_dir: &str, options: RecognizerOptions) -> Result<Self, RecognizerError> {
        let palm_path = format!("{model_dir}/{PALM_MODEL_FILE}");
        let landmark_path = format!("{model_dir}/{LANDMARK_MODEL_FILE}");

        let palm = PalmDetector::load(&palm_path)?;
        let landmarker = HandLandmarker::load(&landmark_path)?;

        tracing::info!(
            model_dir,
            max_hands = options.max_hands,
            min_detection_confidence = options.min_detection_confidence,
            "gesture recognizer ready"
        );

        Ok(Self {
            palm,
            landmarker,
            options,
        })
    }
}

impl HandRecognizer for GestureRecognizer {
    fn recognize(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<RawHand>, RecognizerError> {
        let regions = self
            .palm
            .detect(rgb, width, height, self.options.min_detection_confidence)?;

        let mut hands = Vec::new();
        for region in regions.iter().take(self.options.max_hands) {
            let (center, side, angle) = crop_from_region(region);
            let transform = CropTransform {
                center,
                side,
                angle,
                orig_w: width,
                orig_h: height,
            };

            let output = match self.landmarker.infer(rgb, &transform) {
                Ok(output) => output,
                Err(e) => {
                    // One bad crop should not take down the whole frame
                    tracing::warn!(error = %e, "landmark inference failed for region");
                    continue;
                }
            };

            if output.presence < self.options.min_presence_confidence {
                tracing::debug!(
                    presence = output.presence,
                    score = region.score,
                    "dropping low-presence hand"
                );
                continue;
            }

            let handedness = if output.is_right {
                Handedness::Right
            } else {
                Handedness::Left
            };

            hands.push(RawHand {
                handedness,
                score: region.score * output.presence,
                gesture: gesture::classify(&output.landmarks),
                landmarks: output.landmarks,
            });
        }

        tracing::trace!(regions = regions.len(), hands = hands.len(), "frame recognized");
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = RecognizerOptions::default();
        assert_eq!(opts.max_hands, 2);
        assert!((opts.min_detection_confidence - 0.5).abs() < 1e-6);
        assert!((opts.min_presence_confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_models() {
        let err = GestureRecognizer::load("/nonexistent/models", RecognizerOptions::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RecognizerError::Palm(PalmError::ModelNotFound(_))
        ));
    }
}

//! Hand landmark model via ONNX Runtime.
//!
//! Takes an oriented square crop around a detected palm, runs the
//! landmark model on it, and maps the 21 predicted keypoints back into
//! normalized frame coordinates.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::topology::LANDMARK_COUNT;

const LANDMARK_INPUT_SIZE: usize = 224;
/// Handedness output at or above this value means an anatomical right hand.
const RIGHT_HAND_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("model file not found: {0} — place the hand landmark model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Raw output of one landmark inference, in normalized frame coordinates.
#[derive(Debug, Clone)]
pub struct LandmarkOutput {
    /// [x, y, z] per keypoint; x and y normalized to the frame, z relative.
    pub landmarks: [[f32; 3]; LANDMARK_COUNT],
    /// Confidence that a hand is actually present in the crop.
    pub presence: f32,
    /// True if the model labelled the crop an anatomical right hand.
    pub is_right: bool,
}

/// Mapping between the rotated model crop and the original frame.
#[derive(Debug, Clone, Copy)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    /// Rotation applied to the crop, radians, counter-clockwise.
    pub angle: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl CropTransform {
    /// Map crop-pixel coordinates (in the model's input space) back to
    /// frame pixels.
    pub fn project(&self, crop_x: f32, crop_y: f32) -> (f32, f32) {
        let half = LANDMARK_INPUT_SIZE as f32 / 2.0;
        let scale = self.side / LANDMARK_INPUT_SIZE as f32;
        let dx = (crop_x - half) * scale;
        let dy = (crop_y - half) * scale;

        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }
}

/// The 21-point hand landmark model.
pub struct HandLandmarker {
    session: Session,
}

impl HandLandmarker {
    /// Load the hand landmark ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, LandmarkError> {
        if !Path::new(model_path).exists() {
            return Err(LandmarkError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded hand landmark model"
        );

        if num_outputs < 3 {
            return Err(LandmarkError::InferenceFailed(format!(
                "landmark model requires landmark, presence and handedness outputs, got {num_outputs}"
            )));
        }

        Ok(Self { session })
    }

    /// Run the landmark model over an oriented crop of the frame.
    pub fn infer(
        &mut self,
        rgb: &[u8],
        transform: &CropTransform,
    ) -> Result<LandmarkOutput, LandmarkError> {
        let input = prepare_rotated_crop(rgb, transform)
            .ok_or_else(|| LandmarkError::InferenceFailed("frame buffer too short".into()))?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_landmarks) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("landmarks: {e}")))?;
        let (_, presence) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("presence: {e}")))?;
        let (_, handedness) = outputs[2]
            .try_extract_tensor::<f32>()
            .map_err(|e| LandmarkError::InferenceFailed(format!("handedness: {e}")))?;

        if raw_landmarks.len() < LANDMARK_COUNT * 3 || presence.is_empty() || handedness.is_empty()
        {
            return Err(LandmarkError::InferenceFailed(format!(
                "unexpected landmark output sizes: {} landmarks, {} presence, {} handedness",
                raw_landmarks.len(),
                presence.len(),
                handedness.len()
            )));
        }

        let mut landmarks = [[0.0f32; 3]; LANDMARK_COUNT];
        let crop_scale = transform.side / LANDMARK_INPUT_SIZE as f32;
        for (i, lm) in landmarks.iter_mut().enumerate() {
            let crop_x = raw_landmarks[i * 3];
            let crop_y = raw_landmarks[i * 3 + 1];
            let (frame_x, frame_y) = transform.project(crop_x, crop_y);

            lm[0] = (frame_x / transform.orig_w as f32).clamp(0.0, 1.0);
            lm[1] = (frame_y / transform.orig_h as f32).clamp(0.0, 1.0);
            // Depth scales with the crop, normalized against frame width
            lm[2] = raw_landmarks[i * 3 + 2] * crop_scale / transform.orig_w as f32;
        }

        Ok(LandmarkOutput {
            landmarks,
            presence: presence[0],
            is_right: handedness[0] >= RIGHT_HAND_THRESHOLD,
        })
    }
}

/// Extract a rotated square crop from the frame as an NHWC float tensor
/// in [0, 1], bilinear-sampled, with out-of-frame pixels black.
fn prepare_rotated_crop(rgb: &[u8], transform: &CropTransform) -> Option<Array4<f32>> {
    let w = transform.orig_w as usize;
    let h = transform.orig_h as usize;
    if rgb.len() < w * h * 3 {
        return None;
    }

    let size = LANDMARK_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));

    for y in 0..size {
        for x in 0..size {
            let (src_x, src_y) = transform.project(x as f32 + 0.5, y as f32 + 0.5);
            if let Some(pixel) = sample_rgb(rgb, w, h, src_x, src_y) {
                tensor[[0, y, x, 0]] = pixel[0] / 255.0;
                tensor[[0, y, x, 1]] = pixel[1] / 255.0;
                tensor[[0, y, x, 2]] = pixel[2] / 255.0;
            }
        }
    }

    Some(tensor)
}

/// Bilinear RGB sample at fractional frame coordinates, `None` outside.
fn sample_rgb(rgb: &[u8], w: usize, h: usize, x: f32, y: f32) -> Option<[f32; 3]> {
    if x < 0.0 || y < 0.0 || x > (w - 1) as f32 || y > (h - 1) as f32 {
        return None;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = [0.0f32; 3];
    for (ch, v) in out.iter_mut().enumerate() {
        let tl = rgb[(y0 * w + x0) * 3 + ch] as f32;
        let tr = rgb[(y0 * w + x1) * 3 + ch] as f32;
        let bl = rgb[(y1 * w + x0) * 3 + ch] as f32;
        let br = rgb[(y1 * w + x1) * 3 + ch] as f32;
        *v = tl * (1.0 - fx) * (1.0 - fy)
            + tr * fx * (1.0 - fy)
            + bl * (1.0 - fx) * fy
            + br * fx * fy;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_transform() -> CropTransform {
        CropTransform {
            center: (112.0, 112.0),
            side: LANDMARK_INPUT_SIZE as f32,
            angle: 0.0,
            orig_w: 224,
            orig_h: 224,
        }
    }

    #[test]
    fn test_project_identity() {
        let t = identity_transform();
        // Unrotated, unscaled, centred crop: projection is the identity
        let (x, y) = t.project(112.0, 112.0);
        assert!((x - 112.0).abs() < 1e-4);
        assert!((y - 112.0).abs() < 1e-4);
        let (x, y) = t.project(0.0, 0.0);
        assert!(x.abs() < 1e-4);
        assert!(y.abs() < 1e-4);
    }

    #[test]
    fn test_project_scales_around_center() {
        let t = CropTransform {
            center: (320.0, 240.0),
            side: 448.0,
            angle: 0.0,
            orig_w: 640,
            orig_h: 480,
        };
        // side/input = 2: crop pixels map to 2x frame pixels from center
        let (x, y) = t.project(112.0 + 10.0, 112.0);
        assert!((x - 340.0).abs() < 1e-3);
        assert!((y - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_project_quarter_turn() {
        let t = CropTransform {
            center: (100.0, 100.0),
            side: LANDMARK_INPUT_SIZE as f32,
            angle: std::f32::consts::FRAC_PI_2,
            orig_w: 640,
            orig_h: 480,
        };
        // A point 10px right of crop center rotates to 10px below center
        let (x, y) = t.project(122.0, 112.0);
        assert!((x - 100.0).abs() < 1e-3);
        assert!((y - 110.0).abs() < 1e-3);
    }

    #[test]
    fn test_sample_rgb_exact_pixel() {
        // 2x2 frame: top-left red, rest black
        let mut rgb = vec![0u8; 2 * 2 * 3];
        rgb[0] = 255;
        let pixel = sample_rgb(&rgb, 2, 2, 0.0, 0.0).unwrap();
        assert!((pixel[0] - 255.0).abs() < 1e-4);
        assert!(pixel[1].abs() < 1e-4);
    }

    #[test]
    fn test_sample_rgb_out_of_bounds() {
        let rgb = vec![0u8; 2 * 2 * 3];
        assert!(sample_rgb(&rgb, 2, 2, -0.5, 0.0).is_none());
        assert!(sample_rgb(&rgb, 2, 2, 0.0, 5.0).is_none());
    }

    #[test]
    fn test_sample_rgb_interpolates() {
        // 2x1 frame: black then white; midpoint interpolates to gray
        let rgb = vec![0, 0, 0, 255, 255, 255];
        let pixel = sample_rgb(&rgb, 2, 1, 0.5, 0.0).unwrap();
        assert!((pixel[0] - 127.5).abs() < 1e-3);
    }

    #[test]
    fn test_prepare_crop_shape_and_range() {
        let rgb = vec![200u8; 64 * 64 * 3];
        let t = CropTransform {
            center: (32.0, 32.0),
            side: 40.0,
            angle: 0.3,
            orig_w: 64,
            orig_h: 64,
        };
        let tensor = prepare_rotated_crop(&rgb, &t).unwrap();
        assert_eq!(
            tensor.shape(),
            &[1, LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE, 3]
        );
        let mid = LANDMARK_INPUT_SIZE / 2;
        assert!((tensor[[0, mid, mid, 0]] - 200.0 / 255.0).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_crop_short_buffer() {
        let t = identity_transform();
        assert!(prepare_rotated_crop(&[0u8; 8], &t).is_none());
    }
}

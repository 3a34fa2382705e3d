//! SSD palm detector via ONNX Runtime.
//!
//! Runs a single-shot palm detection model over the full frame, decoding
//! anchor-relative boxes and seven palm keypoints, and derives the
//! oriented square crop that feeds the landmark model.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const PALM_INPUT_SIZE: usize = 192;
/// SSD feature-map strides; the three repeated stride-16 layers each
/// contribute their own anchor pass.
const PALM_STRIDES: [usize; 4] = [8, 16, 16, 16];
const PALM_ANCHORS_PER_CELL: usize = 2;
/// Total anchors: 24*24*2 + 3 * (12*12*2).
pub const PALM_ANCHOR_COUNT: usize = 2016;
const PALM_KEYPOINTS: usize = 7;
/// Box features per anchor: cx, cy, w, h + 7 keypoint (x, y) pairs.
const PALM_BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;
const PALM_NMS_THRESHOLD: f32 = 0.3;
/// Crop expansion around the palm so fingers are not clipped away.
const CROP_EXPANSION: f32 = 2.4;
const MIN_CROP_SIDE: f32 = 80.0;

#[derive(Error, Debug)]
pub enum PalmError {
    #[error("model file not found: {0} — place the palm detection model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// An oriented hand region in original-frame pixel coordinates.
#[derive(Debug, Clone)]
pub struct HandRegion {
    /// [x1, y1, x2, y2] in frame pixels.
    pub bbox: [f32; 4],
    /// Seven palm keypoints in frame pixels.
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone)]
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    orig_w: u32,
    orig_h: u32,
}

/// SSD-based palm detector.
pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
}

impl PalmDetector {
    /// Load the palm detection ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, PalmError> {
        if !Path::new(model_path).exists() {
            return Err(PalmError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded palm detection model"
        );

        if num_outputs < 2 {
            return Err(PalmError::InferenceFailed(format!(
                "palm model requires box and score outputs, got {num_outputs}"
            )));
        }

        Ok(Self {
            session,
            anchors: generate_anchors(),
        })
    }

    /// Detect palm regions in an RGB frame, highest score first.
    pub fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        min_confidence: f32,
    ) -> Result<Vec<HandRegion>, PalmError> {
        let (input, letterbox) = preprocess(rgb, width, height)
            .ok_or_else(|| PalmError::InferenceFailed("frame buffer too short".into()))?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, boxes) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PalmError::InferenceFailed(format!("palm boxes: {e}")))?;
        let (_, scores) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| PalmError::InferenceFailed(format!("palm scores: {e}")))?;

        if boxes.len() < PALM_ANCHOR_COUNT * PALM_BOX_FEATURES || scores.len() < PALM_ANCHOR_COUNT {
            return Err(PalmError::InferenceFailed(format!(
                "unexpected palm output sizes: {} boxes, {} scores",
                boxes.len(),
                scores.len()
            )));
        }

        let candidates = decode_regions(boxes, scores, &self.anchors, &letterbox, min_confidence);
        let mut regions = nms(candidates, PALM_NMS_THRESHOLD);
        regions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(regions)
    }
}

/// Generate the fixed SSD anchor grid (normalized center coordinates).
fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(PALM_ANCHOR_COUNT);
    for &stride in PALM_STRIDES.iter() {
        let grid = PALM_INPUT_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                for _ in 0..PALM_ANCHORS_PER_CELL {
                    anchors.push([
                        (x as f32 + 0.5) / grid as f32,
                        (y as f32 + 0.5) / grid as f32,
                    ]);
                }
            }
        }
    }
    anchors
}

/// Preprocess an RGB frame into a letterboxed NHWC float tensor in [0, 1].
fn preprocess(rgb: &[u8], width: u32, height: u32) -> Option<(Array4<f32>, LetterboxInfo)> {
    let w = width as usize;
    let h = height as usize;
    if rgb.len() < w * h * 3 {
        return None;
    }

    let target = PALM_INPUT_SIZE;
    let scale = target as f32 / w.max(h) as f32;
    let new_w = ((w as f32 * scale).round() as usize).max(1);
    let new_h = ((h as f32 * scale).round() as usize).max(1);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let mut tensor = Array4::<f32>::zeros((1, target, target, 3));
    let inv_scale = 1.0 / scale;

    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for ch in 0..3 {
                let tl = rgb[(y0 * w + x0) * 3 + ch] as f32;
                let tr = rgb[(y0 * w + x1) * 3 + ch] as f32;
                let bl = rgb[(y1 * w + x0) * 3 + ch] as f32;
                let br = rgb[(y1 * w + x1) * 3 + ch] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                tensor[[0, pad_y + y, pad_x + x, ch]] = val / 255.0;
            }
        }
    }

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: width,
        orig_h: height,
    };

    Some((tensor, letterbox))
}

/// Decode anchor-relative boxes and keypoints into frame-pixel regions.
fn decode_regions(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[[f32; 2]],
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<HandRegion> {
    let input = PALM_INPUT_SIZE as f32;
    let mut regions = Vec::new();

    for (anchor_idx, anchor) in anchors.iter().enumerate() {
        let score = sigmoid(scores[anchor_idx]);
        if score < threshold {
            continue;
        }

        let off = anchor_idx * PALM_BOX_FEATURES;
        let anchor_cx = anchor[0] * input;
        let anchor_cy = anchor[1] * input;

        // Box deltas are in input-space pixels relative to the anchor center.
        let cx = boxes[off] + anchor_cx;
        let cy = boxes[off + 1] + anchor_cy;
        let hw = boxes[off + 2] / 2.0;
        let hh = boxes[off + 3] / 2.0;

        let mut x1 = (cx - hw - letterbox.pad_x) / letterbox.scale;
        let mut y1 = (cy - hh - letterbox.pad_y) / letterbox.scale;
        let mut x2 = (cx + hw - letterbox.pad_x) / letterbox.scale;
        let mut y2 = (cy + hh - letterbox.pad_y) / letterbox.scale;

        if x2 <= x1 || y2 <= y1 {
            continue;
        }
        clamp_box(&mut x1, &mut y1, &mut x2, &mut y2, letterbox.orig_w, letterbox.orig_h);

        let mut keypoints = Vec::with_capacity(PALM_KEYPOINTS);
        for k in 0..PALM_KEYPOINTS {
            let kx = boxes[off + 4 + k * 2] + anchor_cx;
            let ky = boxes[off + 4 + k * 2 + 1] + anchor_cy;
            keypoints.push((
                (kx - letterbox.pad_x) / letterbox.scale,
                (ky - letterbox.pad_y) / letterbox.scale,
            ));
        }

        regions.push(HandRegion {
            bbox: [x1, y1, x2, y2],
            keypoints,
            score,
        });
    }

    regions
}

/// Derive the oriented square crop for the landmark model from a region:
/// (center, side length, rotation angle), all in frame pixels/radians.
pub fn crop_from_region(region: &HandRegion) -> ((f32, f32), f32, f32) {
    let center = if region.keypoints.is_empty() {
        (
            (region.bbox[0] + region.bbox[2]) * 0.5,
            (region.bbox[1] + region.bbox[3]) * 0.5,
        )
    } else {
        let (sum_x, sum_y) = region
            .keypoints
            .iter()
            .fold((0.0f32, 0.0f32), |acc, p| (acc.0 + p.0, acc.1 + p.1));
        (
            sum_x / region.keypoints.len() as f32,
            sum_y / region.keypoints.len() as f32,
        )
    };

    let base_w = (region.bbox[2] - region.bbox[0]).abs();
    let base_h = (region.bbox[3] - region.bbox[1]).abs();
    let keypoint_span = if region.keypoints.is_empty() {
        0.0
    } else {
        let (min_x, max_x, min_y, max_y) = region
            .keypoints
            .iter()
            .fold((f32::MAX, f32::MIN, f32::MAX, f32::MIN), |acc, (x, y)| {
                (acc.0.min(*x), acc.1.max(*x), acc.2.min(*y), acc.3.max(*y))
            });
        (max_x - min_x).max(max_y - min_y)
    };

    let side = base_w
        .max(base_h)
        .max(keypoint_span)
        .max(MIN_CROP_SIDE)
        * CROP_EXPANSION;

    (center, side, estimate_orientation(region))
}

/// Estimate palm orientation from the principal direction of the
/// keypoints, rotated so the hand faces roughly upward for the landmark
/// model.
fn estimate_orientation(region: &HandRegion) -> f32 {
    if region.keypoints.len() < 2 {
        return 0.0;
    }

    let n = region.keypoints.len() as f32;
    let (sx, sy) = region
        .keypoints
        .iter()
        .fold((0.0f32, 0.0f32), |acc, (x, y)| (acc.0 + x, acc.1 + y));
    let mean = (sx / n, sy / n);

    let mut cov_xx = 0.0;
    let mut cov_xy = 0.0;
    let mut cov_yy = 0.0;
    for (x, y) in &region.keypoints {
        let dx = x - mean.0;
        let dy = y - mean.1;
        cov_xx += dx * dx;
        cov_xy += dx * dy;
        cov_yy += dy * dy;
    }
    cov_xx /= n;
    cov_xy /= n;
    cov_yy /= n;

    let trace = cov_xx + cov_yy;
    let det = cov_xx * cov_yy - cov_xy * cov_xy;
    let lambda1 = (trace * 0.5 + ((trace * 0.5).powi(2) - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if cov_xy.abs() > 1e-6 {
        (lambda1 - cov_yy, cov_xy)
    } else if cov_xx >= cov_yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - std::f32::consts::FRAC_PI_2
}

/// Non-Maximum Suppression: remove overlapping regions, keeping the best.
fn nms(mut regions: Vec<HandRegion>, iou_threshold: f32) -> Vec<HandRegion> {
    regions.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<HandRegion> = Vec::new();
    for region in regions {
        if keep.iter().all(|k| iou(&k.bbox, &region.bbox) < iou_threshold) {
            keep.push(region);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp_box(x1: &mut f32, y1: &mut f32, x2: &mut f32, y2: &mut f32, w: u32, h: u32) {
    let max_w = (w.saturating_sub(1)) as f32;
    let max_h = (h.saturating_sub(1)) as f32;
    *x1 = x1.clamp(0.0, max_w);
    *y1 = y1.clamp(0.0, max_h);
    *x2 = x2.clamp(0.0, max_w);
    *y2 = y2.clamp(0.0, max_h);
}

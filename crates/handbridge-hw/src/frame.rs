//! Frame type and pixel plumbing — YUYV conversion and selfie mirroring.

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    /// Driver-assigned capture sequence (not the broadcast sequence).
    pub sequence: u32,
}

impl Frame {
    /// Mirror the frame horizontally in place (selfie view).
    ///
    /// The capture shows a mirror image of the user, so the frame is
    /// flipped before inference to make reported handedness meaningful
    /// in the user's physical coordinate system.
    pub fn mirror_horizontal(&mut self) {
        mirror_rgb(&mut self.data, self.width, self.height);
    }
}

/// Mirror a packed RGB buffer around its vertical axis, row by row.
pub fn mirror_rgb(rgb: &mut [u8], width: u32, height: u32) {
    let w = width as usize;
    let h = height as usize;
    if rgb.len() < w * h * 3 {
        return;
    }
    for row in 0..h {
        let base = row * w * 3;
        for col in 0..w / 2 {
            let left = base + col * 3;
            let right = base + (w - 1 - col) * 3;
            for ch in 0..3 {
                rgb.swap(left + ch, right + ch);
            }
        }
    }
}

/// Convert packed YUYV (4:2:2) to packed RGB using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V], with the chroma
/// pair shared by both pixels.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for &y in &[quad[0], quad[2]] {
            let y = y as f32;
            let r = y + 1.402 * v;
            let g = y - 0.344136 * u - 0.714136 * v;
            let b = y + 1.772 * u;
            rgb.push(r.round().clamp(0.0, 255.0) as u8);
            rgb.push(g.round().clamp(0.0, 255.0) as u8);
            rgb.push(b.round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_rgb_neutral_chroma() {
        // U = V = 128 means zero chroma: R = G = B = Y
        let yuyv = vec![100, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
    }

    #[test]
    fn test_yuyv_to_rgb_length() {
        // 4x2 image = 8 pixels, 16 YUYV bytes, 24 RGB bytes
        let yuyv = vec![128u8; 16];
        let rgb = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(rgb.len(), 24);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_yuyv_red_pixel() {
        // Full V excursion pushes red up and green down.
        let yuyv = vec![128, 128, 128, 255];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > 200, "red should saturate upward, got {}", rgb[0]);
        assert!(rgb[1] < 60, "green should be suppressed, got {}", rgb[1]);
    }

    #[test]
    fn test_mirror_swaps_columns() {
        // 3x1 RGB: pixels A, B, C -> C, B, A
        let mut rgb = vec![
            1, 2, 3, // A
            4, 5, 6, // B
            7, 8, 9, // C
        ];
        mirror_rgb(&mut rgb, 3, 1);
        assert_eq!(rgb, vec![7, 8, 9, 4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn test_mirror_involution() {
        let original: Vec<u8> = (0..4 * 2 * 3).collect();
        let mut rgb = original.clone();
        mirror_rgb(&mut rgb, 4, 2);
        assert_ne!(rgb, original);
        mirror_rgb(&mut rgb, 4, 2);
        assert_eq!(rgb, original);
    }

    #[test]
    fn test_mirror_rows_independent() {
        // 2x2: rows must mirror independently, not across rows
        let mut rgb = vec![
            10, 11, 12, 20, 21, 22, // row 0: A B
            30, 31, 32, 40, 41, 42, // row 1: C D
        ];
        mirror_rgb(&mut rgb, 2, 2);
        assert_eq!(
            rgb,
            vec![20, 21, 22, 10, 11, 12, 40, 41, 42, 30, 31, 32]
        );
    }

    #[test]
    fn test_mirror_short_buffer_untouched() {
        let mut rgb = vec![1, 2, 3];
        mirror_rgb(&mut rgb, 4, 4);
        assert_eq!(rgb, vec![1, 2, 3]);
    }
}

//! Optional local preview window with the hand skeleton overlay.
//!
//! Purely diagnostic; any failure here disables the preview and leaves
//! the broadcast path untouched.

use minifb::{Key, Window, WindowOptions};
use std::time::Duration;

use handbridge_core::topology::CONNECTIONS;
use handbridge_core::{FrameResult, Gesture, HandObservation};
use handbridge_hw::Frame;

use crate::draw;

const LEFT_COLOR: u32 = 0x0038BDF8;
const RIGHT_COLOR: u32 = 0x00F87138;
const JOINT_COLOR: u32 = 0x00F8F8F8;
const TEXT_COLOR: u32 = 0x00FFFFFF;
const BANNER_COLOR: u32 = 0x0022C55E;
const CATCH_COLOR: u32 = 0x00FFFF00;
const LINE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 3;

pub struct Preview {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    disabled: bool,
}

impl Preview {
    pub fn open(width: u32, height: u32) -> Result<Self, minifb::Error> {
        let (width, height) = (width as usize, height as usize);
        let mut window = Window::new(
            "handbridge preview",
            width,
            height,
            WindowOptions::default(),
        )?;
        window.limit_update_rate(Some(Duration::from_millis(16)));

        Ok(Self {
            window,
            buffer: vec![0u32; width * height],
            width,
            height,
            disabled: false,
        })
    }

    /// True once the user has closed the preview window or pressed `q`.
    pub fn wants_close(&self) -> bool {
        !self.disabled && (!self.window.is_open() || self.window.is_key_down(Key::Q))
    }

    /// Draw the frame with overlays. A failed window update disables the
    /// preview for the rest of the run.
    pub fn render(&mut self, frame: &Frame, result: &FrameResult, clients: usize) {
        if self.disabled {
            return;
        }
        if frame.width as usize != self.width || frame.height as usize != self.height {
            tracing::warn!(
                frame_width = frame.width,
                frame_height = frame.height,
                "frame size does not match preview window, disabling preview"
            );
            self.disabled = true;
            return;
        }

        for (dst, px) in self.buffer.iter_mut().zip(frame.data.chunks_exact(3)) {
            *dst = draw::pack_rgb(px[0], px[1], px[2]);
        }

        if let Some(hand) = &result.left_hand {
            self.draw_hand(hand, LEFT_COLOR);
        }
        if let Some(hand) = &result.right_hand {
            self.draw_hand(hand, RIGHT_COLOR);
        }

        let status = format!("HANDS:{} CLIENTS:{}", result.num_hands, clients);
        draw::draw_text(&mut self.buffer, self.width, self.height, 8, 8, &status, TEXT_COLOR, 2);

        let gestures = format!(
            "L:{} R:{}",
            result.gestures.left.label(),
            result.gestures.right.label(),
        );
        draw::draw_text(&mut self.buffer, self.width, self.height, 8, 28, &gestures, TEXT_COLOR, 2);

        if let Some((text, color)) = banner(result) {
            draw::draw_text(&mut self.buffer, self.width, self.height, 8, 52, text, color, 3);
        }

        if let Err(e) = self
            .window
            .update_with_buffer(&self.buffer, self.width, self.height)
        {
            tracing::warn!(error = %e, "preview update failed, disabling preview");
            self.disabled = true;
        }
    }

    fn draw_hand(&mut self, hand: &HandObservation, color: u32) {
        let to_px = |lm: &handbridge_core::Landmark| {
            (
                (lm.x * self.width as f32) as i32,
                (lm.y * self.height as f32) as i32,
            )
        };

        for &(a, b) in CONNECTIONS {
            if let (Some(pa), Some(pb)) = (hand.landmarks.get(a), hand.landmarks.get(b)) {
                draw::draw_line(
                    &mut self.buffer,
                    self.width,
                    self.height,
                    to_px(pa),
                    to_px(pb),
                    color,
                    LINE_THICKNESS,
                );
            }
        }

        for lm in &hand.landmarks {
            draw::draw_circle(
                &mut self.buffer,
                self.width,
                self.height,
                to_px(lm),
                JOINT_RADIUS,
                JOINT_COLOR,
            );
        }
    }
}

/// Overlay banner for the current frame: the composite catch beats the
/// single-palm pass, which beats nothing.
fn banner(result: &FrameResult) -> Option<(&'static str, u32)> {
    if result.two_open_palms {
        Some(("CATCH! 2 PALMS", CATCH_COLOR))
    } else if result.gestures.left == Gesture::OpenPalm
        || result.gestures.right == Gesture::OpenPalm
    {
        Some(("1 HAND PASS", BANNER_COLOR))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handbridge_core::types::GestureSummary;

    fn frame_result(left: Gesture, right: Gesture, two_open_palms: bool) -> FrameResult {
        FrameResult {
            timestamp: 1,
            left_hand: None,
            right_hand: None,
            num_hands: 0,
            gestures: GestureSummary { left, right },
            two_open_palms,
        }
    }

    #[test]
    fn test_banner_catch_on_two_palms() {
        let result = frame_result(Gesture::OpenPalm, Gesture::OpenPalm, true);
        assert_eq!(banner(&result).unwrap().0, "CATCH! 2 PALMS");
    }

    #[test]
    fn test_banner_pass_on_single_palm() {
        let left_only = frame_result(Gesture::OpenPalm, Gesture::None, false);
        assert_eq!(banner(&left_only).unwrap().0, "1 HAND PASS");

        let right_only = frame_result(Gesture::ClosedFist, Gesture::OpenPalm, false);
        assert_eq!(banner(&right_only).unwrap().0, "1 HAND PASS");
    }

    #[test]
    fn test_banner_absent_without_open_palm() {
        let result = frame_result(Gesture::Victory, Gesture::ThumbUp, false);
        assert!(banner(&result).is_none());
    }
}

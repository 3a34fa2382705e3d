//! Shapes raw detections into the per-frame record broadcast to clients.

use crate::topology::LANDMARK_COUNT;
use crate::types::{
    FrameResult, Gesture, GestureSummary, HandObservation, Handedness, Landmark, RawHand,
};

/// Coordinates are rounded to this many decimal places on the wire.
const COORD_DECIMALS: i32 = 4;

/// Turns per-frame raw detections into `FrameResult`s, correcting the
/// mirrored handedness and numbering the frames that actually produced a
/// result.
#[derive(Debug, Default)]
pub struct FrameProcessor {
    produced: u64,
}

impl FrameProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the record for one frame. The sequence number starts at 1
    /// and only advances for frames that reach this point, so skipped
    /// camera reads leave no gap markers.
    pub fn process(&mut self, raw_hands: Vec<RawHand>) -> FrameResult {
        self.produced += 1;

        let mut left_hand: Option<HandObservation> = None;
        let mut right_hand: Option<HandObservation> = None;
        let mut gestures = GestureSummary::default();

        for raw in raw_hands {
            // The frame was mirrored before inference, so the model's
            // label is the opposite of the user's physical hand.
            let corrected = raw.handedness.flipped();
            let slot = match corrected {
                Handedness::Left => &mut left_hand,
                Handedness::Right => &mut right_hand,
            };
            if slot.is_some() {
                // First detection wins for each side
                tracing::debug!(side = corrected.as_str(), "duplicate handedness, discarding");
                continue;
            }

            *slot = Some(observe(corrected, &raw.landmarks));
            match corrected {
                Handedness::Left => gestures.left = raw.gesture,
                Handedness::Right => gestures.right = raw.gesture,
            }
        }

        let num_hands = left_hand.is_some() as u8 + right_hand.is_some() as u8;
        let two_open_palms =
            num_hands == 2 && gestures.left == Gesture::OpenPalm && gestures.right == Gesture::OpenPalm;

        FrameResult {
            timestamp: self.produced,
            left_hand,
            right_hand,
            num_hands,
            gestures,
            two_open_palms,
        }
    }
}

fn observe(handedness: Handedness, landmarks: &[[f32; 3]; LANDMARK_COUNT]) -> HandObservation {
    HandObservation {
        handedness,
        landmarks: landmarks
            .iter()
            .enumerate()
            .map(|(id, lm)| Landmark {
                id: id as u8,
                x: round(lm[0]),
                y: round(lm[1]),
                z: round(lm[2]),
            })
            .collect(),
    }
}

fn round(value: f32) -> f32 {
    let factor = 10f32.powi(COORD_DECIMALS);
    (value * factor).round() / factor
}

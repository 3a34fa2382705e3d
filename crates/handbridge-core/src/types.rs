use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::topology::LANDMARK_COUNT;

/// Left/right label for a detected hand.
///
/// Inside a `RawHand` this is the label as reported by the landmark model
/// on the mirrored frame; inside a `HandObservation` it has already been
/// corrected to the user's physical left/right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }

    /// The mirror correction: a hand reported as anatomical left in a
    /// mirrored frame is the user's physical right hand, and vice versa.
    pub fn flipped(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

/// Classified hand pose, using the canonical recognizer vocabulary.
/// `None` means no confident classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Gesture {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "Closed_Fist")]
    ClosedFist,
    #[serde(rename = "Open_Palm")]
    OpenPalm,
    #[serde(rename = "Pointing_Up")]
    PointingUp,
    #[serde(rename = "Thumb_Down")]
    ThumbDown,
    #[serde(rename = "Thumb_Up")]
    ThumbUp,
    #[serde(rename = "Victory")]
    Victory,
    #[serde(rename = "ILoveYou")]
    ILoveYou,
}

impl Gesture {
    /// Wire token for this gesture (the serde rename).
    pub fn label(self) -> &'static str {
        match self {
            Gesture::None => "None",
            Gesture::ClosedFist => "Closed_Fist",
            Gesture::OpenPalm => "Open_Palm",
            Gesture::PointingUp => "Pointing_Up",
            Gesture::ThumbDown => "Thumb_Down",
            Gesture::ThumbUp => "Thumb_Up",
            Gesture::Victory => "Victory",
            Gesture::ILoveYou => "ILoveYou",
        }
    }
}

/// One of the 21 fixed anatomical hand keypoints.
///
/// `x` and `y` are normalized frame-relative coordinates in [0, 1];
/// `z` is a relative depth estimate with the wrist near zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmark {
    pub id: u8,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A detected hand with corrected handedness, published to clients.
#[derive(Debug, Clone, Serialize)]
pub struct HandObservation {
    pub handedness: Handedness,
    /// Exactly 21 landmarks in fixed anatomical index order.
    pub landmarks: Vec<Landmark>,
}

/// A raw per-hand detection from the inference adapter, before the
/// mirrored-handedness correction.
#[derive(Debug, Clone)]
pub struct RawHand {
    /// Handedness as reported by the model (mirrored relative to the user).
    pub handedness: Handedness,
    /// Combined detection/presence confidence in [0, 1].
    pub score: f32,
    /// Frame-normalized [x, y, z] per landmark, anatomical order.
    pub landmarks: [[f32; 3]; LANDMARK_COUNT],
    pub gesture: Gesture,
}

/// Per-hand gesture summary, defaulting to `None` for unobserved hands.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GestureSummary {
    pub left: Gesture,
    pub right: Gesture,
}

/// The canonical per-frame record broadcast to every connected client.
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    /// Monotonic frame sequence number, starting at 1. Skipped ticks
    /// consume no number.
    pub timestamp: u64,
    #[serde(serialize_with = "hand_or_empty")]
    pub left_hand: Option<HandObservation>,
    #[serde(serialize_with = "hand_or_empty")]
    pub right_hand: Option<HandObservation>,
    pub num_hands: u8,
    pub gestures: GestureSummary,
    /// True iff both hands are present and both gestures are `Open_Palm`.
    pub two_open_palms: bool,
}

/// Absent hands serialize as `{}` rather than `null`, matching the
/// downstream consumer's contract.
fn hand_or_empty<S: Serializer>(
    hand: &Option<HandObservation>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match hand {
        Some(h) => h.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

//! Rule-based gesture classification from hand landmark geometry.
//!
//! Each finger is classified as extended, half-bent, or folded from
//! bbox-normalized landmark distances and segment straightness; the
//! five-finger state pattern then maps onto the canonical gesture
//! vocabulary. Image coordinates: y grows downward.

use crate::topology::{
    INDEX_MCP, LANDMARK_COUNT, MIDDLE_MCP, PINKY_MCP, RING_MCP, THUMB_CMC, THUMB_IP, THUMB_MCP,
    THUMB_TIP, WRIST,
};
use crate::types::Gesture;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FingerState {
    Extended,
    HalfBent,
    Folded,
}

/// Joint chains for the four non-thumb fingers, base to tip.
const INDEX_CHAIN: [usize; 4] = [5, 6, 7, 8];
const MIDDLE_CHAIN: [usize; 4] = [9, 10, 11, 12];
const RING_CHAIN: [usize; 4] = [13, 14, 15, 16];
const PINKY_CHAIN: [usize; 4] = [17, 18, 19, 20];

/// Classify the pose of a full 21-landmark hand.
pub fn classify(landmarks: &[[f32; 3]; LANDMARK_COUNT]) -> Gesture {
    let (normalized, _span) = normalize_landmarks(landmarks);
    let fingers = finger_states(&normalized);
    gesture_from_states(&fingers, landmarks)
}

/// Per-digit states: [thumb, index, middle, ring, pinky].
pub fn finger_states(normalized: &[[f32; 3]; LANDMARK_COUNT]) -> [FingerState; 5] {
    [
        classify_thumb(normalized),
        classify_finger(normalized, INDEX_CHAIN),
        classify_finger(normalized, MIDDLE_CHAIN),
        classify_finger(normalized, RING_CHAIN),
        classify_finger(normalized, PINKY_CHAIN),
    ]
}

/// Map a finger-state pattern onto a gesture label.
///
/// Raw landmarks are consulted only for orientation (thumb up vs. down,
/// index pointing up); everything else is pattern matching. Ambiguous
/// poses fall through to `None`.
pub fn gesture_from_states(
    fingers: &[FingerState; 5],
    landmarks: &[[f32; 3]; LANDMARK_COUNT],
) -> Gesture {
    use FingerState::*;
    let [thumb, index, middle, ring, pinky] = *fingers;

    if [thumb, index, middle, ring, pinky].iter().all(|&f| f == Extended) {
        return Gesture::OpenPalm;
    }

    if thumb == Extended
        && index == Extended
        && pinky == Extended
        && middle == Folded
        && ring == Folded
    {
        return Gesture::ILoveYou;
    }

    if index == Extended && middle == Extended && ring == Folded && pinky == Folded
        && thumb != Extended
    {
        return Gesture::Victory;
    }

    if index == Extended
        && middle == Folded
        && ring == Folded
        && pinky == Folded
        && thumb != Extended
    {
        // Pointing only counts when the fingertip actually rises above the wrist.
        if landmarks[INDEX_CHAIN[3]][1] < landmarks[WRIST][1] {
            return Gesture::PointingUp;
        }
        return Gesture::None;
    }

    if thumb == Extended
        && index == Folded
        && middle == Folded
        && ring == Folded
        && pinky == Folded
    {
        return if landmarks[THUMB_TIP][1] < landmarks[THUMB_MCP][1] {
            Gesture::ThumbUp
        } else {
            Gesture::ThumbDown
        };
    }

    if index == Folded && middle == Folded && ring == Folded && pinky == Folded
        && thumb != Extended
    {
        return Gesture::ClosedFist;
    }

    Gesture::None
}

/// Normalize landmarks into the hand's own bounding square so the state
/// thresholds are scale-invariant.
fn normalize_landmarks(points: &[[f32; 3]; LANDMARK_COUNT]) -> ([[f32; 3]; LANDMARK_COUNT], f32) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;

    for [x, y, _z] in points {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }

    let span = (max_x - min_x).max(max_y - min_y).max(1e-3);
    let mut normalized = [[0.0f32; 3]; LANDMARK_COUNT];
    for (dst, [x, y, z]) in normalized.iter_mut().zip(points.iter()) {
        *dst = [(*x - min_x) / span, (*y - min_y) / span, *z / span];
    }

    (normalized, span)
}

fn classify_finger(points: &[[f32; 3]; LANDMARK_COUNT], idx: [usize; 4]) -> FingerState {
    let wrist = points[WRIST];
    let mcp = points[idx[0]];
    let pip = points[idx[1]];
    let dip = points[idx[2]];
    let tip = points[idx[3]];

    let dist_tip = distance3(tip, wrist);
    let dist_pip = distance3(pip, wrist);
    let dist_mcp = distance3(mcp, wrist);

    let straightness = average_straightness(sub(pip, mcp), sub(dip, pip), sub(tip, dip));

    let extension = dist_tip - dist_pip;
    let reach = dist_tip - dist_mcp;

    if extension > 0.15 && straightness > 0.40 && reach > 0.06 {
        FingerState::Extended
    } else if extension < 0.08 || straightness < 0.18 || reach < 0.05 {
        FingerState::Folded
    } else {
        FingerState::HalfBent
    }
}

/// The thumb needs its own rules: folding brings the tip toward the palm
/// rather than toward the wrist.
fn classify_thumb(points: &[[f32; 3]; LANDMARK_COUNT]) -> FingerState {
    let wrist = points[WRIST];
    let cmc = points[THUMB_CMC];
    let mcp = points[THUMB_MCP];
    let ip = points[THUMB_IP];
    let tip = points[THUMB_TIP];
    let index_mcp = points[INDEX_MCP];
    let pinky_mcp = points[PINKY_MCP];

    let dist_tip_wrist = distance3(tip, wrist);
    let dist_ip_wrist = distance3(ip, wrist);
    let dist_mcp_wrist = distance3(mcp, wrist);

    let straightness = average_straightness(sub(mcp, cmc), sub(ip, mcp), sub(tip, ip));

    // Distance to the nearest finger base indicates how close the thumb
    // lies against the palm.
    let spread = distance3(tip, index_mcp).min(distance3(tip, pinky_mcp));

    let extension = dist_tip_wrist - dist_ip_wrist;
    let reach = dist_tip_wrist - dist_mcp_wrist;

    if spread < 0.25 && (straightness < 0.28 || reach < 0.15) {
        FingerState::Folded
    } else if dist_tip_wrist > 0.30 && straightness > 0.28 && extension > 0.08 {
        FingerState::Extended
    } else {
        FingerState::HalfBent
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

fn average_straightness(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> f32 {
    let ab = dot(normalize(a), normalize(b));
    let bc = dot(normalize(b), normalize(c));
    ((ab + bc) / 2.0).clamp(-1.0, 1.0)
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len < 1e-5 {
        [0.0, 0.0, 0.0]
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_hand() -> [[f32; 3]; LANDMARK_COUNT] {
        [[0.0; 3]; LANDMARK_COUNT]
    }

    /// Straight finger chain radiating upward from a base point.
    fn straight_chain(hand: &mut [[f32; 3]; LANDMARK_COUNT], idx: [usize; 4], x: f32, base_y: f32) {
        let ys = [base_y, base_y - 0.12, base_y - 0.22, base_y - 0.32];
        for (i, &j) in idx.iter().enumerate() {
            hand[j] = [x, ys[i], 0.0];
        }
    }

    /// Curled finger chain: the tip bends back toward the wrist.
    fn curled_chain(hand: &mut [[f32; 3]; LANDMARK_COUNT], idx: [usize; 4], x: f32, base_y: f32) {
        hand[idx[0]] = [x, base_y, 0.0];
        hand[idx[1]] = [x, base_y - 0.08, 0.0];
        hand[idx[2]] = [x + 0.02, base_y, 0.0];
        hand[idx[3]] = [x + 0.04, base_y + 0.08, 0.0];
    }

    fn open_palm_hand() -> [[f32; 3]; LANDMARK_COUNT] {
        let mut hand = blank_hand();
        hand[WRIST] = [0.5, 0.9, 0.0];
        // Thumb angled out to the side, colinear joints
        hand[THUMB_CMC] = [0.40, 0.82, 0.0];
        hand[THUMB_MCP] = [0.34, 0.74, 0.0];
        hand[THUMB_IP] = [0.28, 0.66, 0.0];
        hand[THUMB_TIP] = [0.22, 0.58, 0.0];
        straight_chain(&mut hand, INDEX_CHAIN, 0.38, 0.60);
        straight_chain(&mut hand, MIDDLE_CHAIN, 0.46, 0.58);
        straight_chain(&mut hand, RING_CHAIN, 0.54, 0.60);
        straight_chain(&mut hand, PINKY_CHAIN, 0.62, 0.64);
        hand
    }

    fn fist_hand() -> [[f32; 3]; LANDMARK_COUNT] {
        let mut hand = blank_hand();
        hand[WRIST] = [0.5, 0.9, 0.0];
        // Thumb wrapped across the curled fingers
        hand[THUMB_CMC] = [0.42, 0.80, 0.0];
        hand[THUMB_MCP] = [0.38, 0.72, 0.0];
        hand[THUMB_IP] = [0.42, 0.68, 0.0];
        hand[THUMB_TIP] = [0.44, 0.64, 0.0];
        curled_chain(&mut hand, INDEX_CHAIN, 0.40, 0.60);
        curled_chain(&mut hand, MIDDLE_CHAIN, 0.46, 0.58);
        curled_chain(&mut hand, RING_CHAIN, 0.52, 0.60);
        curled_chain(&mut hand, PINKY_CHAIN, 0.58, 0.62);
        hand
    }

    #[test]
    fn test_straight_chain_is_extended() {
        let hand = open_palm_hand();
        let (normalized, _) = normalize_landmarks(&hand);
        assert_eq!(classify_finger(&normalized, INDEX_CHAIN), FingerState::Extended);
        assert_eq!(classify_finger(&normalized, MIDDLE_CHAIN), FingerState::Extended);
    }

    #[test]
    fn test_curled_chain_is_folded() {
        let hand = fist_hand();
        let (normalized, _) = normalize_landmarks(&hand);
        for chain in [INDEX_CHAIN, MIDDLE_CHAIN, RING_CHAIN, PINKY_CHAIN] {
            assert_eq!(classify_finger(&normalized, chain), FingerState::Folded);
        }
    }

    #[test]
    fn test_classify_open_palm() {
        assert_eq!(classify(&open_palm_hand()), Gesture::OpenPalm);
    }

    #[test]
    fn test_classify_fist() {
        assert_eq!(classify(&fist_hand()), Gesture::ClosedFist);
    }

    #[test]
    fn test_normalize_span_scale_invariance() {
        // Scaling all coordinates must not change the classification.
        let mut hand = open_palm_hand();
        for p in hand.iter_mut() {
            p[0] *= 0.25;
            p[1] *= 0.25;
        }
        assert_eq!(classify(&hand), Gesture::OpenPalm);
    }

    #[test]
    fn test_pattern_victory() {
        use FingerState::*;
        let mut hand = blank_hand();
        hand[WRIST] = [0.5, 0.9, 0.0];
        let fingers = [HalfBent, Extended, Extended, Folded, Folded];
        assert_eq!(gesture_from_states(&fingers, &hand), Gesture::Victory);
    }

    #[test]
    fn test_pattern_pointing_up_requires_raised_tip() {
        use FingerState::*;
        let fingers = [Folded, Extended, Folded, Folded, Folded];

        let mut raised = blank_hand();
        raised[WRIST] = [0.5, 0.9, 0.0];
        raised[INDEX_CHAIN[3]] = [0.5, 0.3, 0.0];
        assert_eq!(gesture_from_states(&fingers, &raised), Gesture::PointingUp);

        // Tip below the wrist: pointing sideways/down is not Pointing_Up
        let mut lowered = blank_hand();
        lowered[WRIST] = [0.5, 0.3, 0.0];
        lowered[INDEX_CHAIN[3]] = [0.5, 0.9, 0.0];
        assert_eq!(gesture_from_states(&fingers, &lowered), Gesture::None);
    }

    #[test]
    fn test_pattern_thumb_up_down() {
        use FingerState::*;
        let fingers = [Extended, Folded, Folded, Folded, Folded];

        let mut up = blank_hand();
        up[THUMB_MCP] = [0.5, 0.6, 0.0];
        up[THUMB_TIP] = [0.5, 0.3, 0.0];
        assert_eq!(gesture_from_states(&fingers, &up), Gesture::ThumbUp);

        let mut down = blank_hand();
        down[THUMB_MCP] = [0.5, 0.3, 0.0];
        down[THUMB_TIP] = [0.5, 0.6, 0.0];
        assert_eq!(gesture_from_states(&fingers, &down), Gesture::ThumbDown);
    }

    #[test]
    fn test_pattern_i_love_you() {
        use FingerState::*;
        let fingers = [Extended, Extended, Folded, Folded, Extended];
        assert_eq!(
            gesture_from_states(&fingers, &blank_hand()),
            Gesture::ILoveYou
        );
    }

    #[test]
    fn test_pattern_ambiguous_is_none() {
        use FingerState::*;
        let fingers = [HalfBent, HalfBent, Extended, Folded, HalfBent];
        assert_eq!(gesture_from_states(&fingers, &blank_hand()), Gesture::None);
    }

    #[test]
    fn test_degenerate_hand_is_not_open_palm() {
        // All landmarks at one point must not classify as anything.
        let mut hand = blank_hand();
        for p in hand.iter_mut() {
            *p = [0.5, 0.5, 0.0];
        }
        assert_ne!(classify(&hand), Gesture::OpenPalm);
    }
}

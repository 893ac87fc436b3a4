//! Gesture classification
//!
//! A coarse single-frame heuristic over fingertip/joint heights. There
//! is no smoothing and no handedness correction; the landmark source is
//! expected to have mirrored the image already.
//!
//! A finger is "open" when its tip is strictly higher in the image
//! (strictly smaller y) than the proximal joint below it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{HandLandmark, LandmarkFrame};

/// Discrete gesture symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GestureSymbol {
    /// No confident classification this frame. Never emitted.
    #[default]
    None,
    OpenPalm,
    ClosedFist,
    ThumbUp,
}

impl GestureSymbol {
    /// Payload name sent on the `gesture` topic
    pub fn as_str(self) -> &'static str {
        match self {
            GestureSymbol::None => "None",
            GestureSymbol::OpenPalm => "Open_Palm",
            GestureSymbol::ClosedFist => "Closed_Fist",
            GestureSymbol::ThumbUp => "Thumb_Up",
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self == GestureSymbol::None
    }
}

impl fmt::Display for GestureSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (tip, proximal joint) for the four non-thumb fingers
const FINGERS: [(HandLandmark, HandLandmark); 4] = [
    (HandLandmark::IndexTip, HandLandmark::IndexPip),
    (HandLandmark::MiddleTip, HandLandmark::MiddlePip),
    (HandLandmark::RingTip, HandLandmark::RingPip),
    (HandLandmark::PinkyTip, HandLandmark::PinkyPip),
];

#[inline]
fn is_above(frame: &LandmarkFrame, upper: HandLandmark, lower: HandLandmark) -> bool {
    frame.point(upper).y < frame.point(lower).y
}

/// Openness of index, middle, ring and pinky, in that order
pub fn finger_openness(frame: &LandmarkFrame) -> [bool; 4] {
    FINGERS.map(|(tip, joint)| is_above(frame, tip, joint))
}

/// Classify one hand. Pure and total: anything unrecognized is `None`.
pub fn classify(frame: &LandmarkFrame) -> GestureSymbol {
    let open = finger_openness(frame);

    if open.iter().all(|&o| o) {
        return GestureSymbol::OpenPalm;
    }

    if open.iter().all(|&o| !o) {
        let thumb_up = is_above(frame, HandLandmark::ThumbTip, HandLandmark::ThumbIp)
            && is_above(frame, HandLandmark::ThumbTip, HandLandmark::IndexTip);
        return if thumb_up {
            GestureSymbol::ThumbUp
        } else {
            GestureSymbol::ClosedFist
        };
    }

    GestureSymbol::None
}

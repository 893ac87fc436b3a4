//! Hand landmarks - 21 tracked points per hand
//!
//! Coordinates are normalized to the image: x and y in [0, 1], y grows
//! downward. Depth (z) is optional and unused by classification.

use lisa_core::{LisaError, LisaResult};
use serde::{Deserialize, Serialize};

/// Landmark index on the hand skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandLandmark {
    Wrist = 0,

    // Thumb
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,

    // Index finger
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,

    // Middle finger
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,

    // Ring finger
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,

    // Pinky
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    /// Number of landmarks per hand
    pub const COUNT: usize = 21;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One landmark position (normalized image coordinates)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The landmarks of one tracked hand in one video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LandmarkPoint>", into = "Vec<LandmarkPoint>")]
pub struct LandmarkFrame {
    points: [LandmarkPoint; HandLandmark::COUNT],
}

impl LandmarkFrame {
    /// Build a frame; exactly 21 points are required
    pub fn new(points: Vec<LandmarkPoint>) -> LisaResult<Self> {
        let actual = points.len();
        let points: [LandmarkPoint; HandLandmark::COUNT] =
            points.try_into().map_err(|_| {
                LisaError::InvalidInput(format!(
                    "hand needs {} landmarks, got {}",
                    HandLandmark::COUNT,
                    actual
                ))
            })?;
        Ok(LandmarkFrame { points })
    }

    pub fn from_array(points: [LandmarkPoint; HandLandmark::COUNT]) -> Self {
        LandmarkFrame { points }
    }

    #[inline]
    pub fn point(&self, landmark: HandLandmark) -> LandmarkPoint {
        self.points[landmark.index()]
    }

    pub fn set_point(&mut self, landmark: HandLandmark, point: LandmarkPoint) {
        self.points[landmark.index()] = point;
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }
}

impl TryFrom<Vec<LandmarkPoint>> for LandmarkFrame {
    type Error = LisaError;

    fn try_from(points: Vec<LandmarkPoint>) -> Result<Self, Self::Error> {
        LandmarkFrame::new(points)
    }
}

impl From<LandmarkFrame> for Vec<LandmarkPoint> {
    fn from(frame: LandmarkFrame) -> Self {
        frame.points.to_vec()
    }
}

/// All hands the landmark source reported for one video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandsFrame {
    #[serde(default)]
    pub hands: Vec<LandmarkFrame>,
}

impl HandsFrame {
    pub fn new(hands: Vec<LandmarkFrame>) -> Self {
        Self { hands }
    }

    /// Only the first detected hand is classified
    pub fn primary(&self) -> Option<&LandmarkFrame> {
        self.hands.first()
    }
}

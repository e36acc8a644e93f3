//! Landmark data model
//!
//! Normalized 2D keypoints (0-1 per axis) with per-point confidence,
//! grouped per hand and stamped with the capture time of the camera frame.

use serde::{Deserialize, Serialize};

// ============================================================================
// HAND LANDMARK INDICES (21-point hand layout)
// ============================================================================

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Landmarks per hand
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Floats per landmark in the flat JS layout: x, y, confidence
pub const VALUES_PER_LANDMARK: usize = 3;

// ============================================================================
// POINT
// ============================================================================

/// A 2D position. Normalized unless a function says otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance measured in pixels for a viewport of `width` x `height`
    pub fn pixel_distance_to(&self, other: Point, width: f32, height: f32) -> f32 {
        let dx = (other.x - self.x) * width;
        let dy = (other.y - self.y) * height;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset_to(&self, other: Point) -> (f32, f32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn translate(&self, offset: (f32, f32)) -> Point {
        Point::new(self.x + offset.0, self.y + offset.1)
    }

    pub fn lerp(&self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Point {
    fn from(value: (f32, f32)) -> Self {
        Point::new(value.0, value.1)
    }
}

// ============================================================================
// LANDMARKS
// ============================================================================

/// A single tracked keypoint with detector confidence in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// True when the detector is at least `floor` confident about this point
    pub fn is_valid(&self, floor: f32) -> bool {
        self.confidence >= floor && self.x.is_finite() && self.y.is_finite()
    }
}

/// All 21 landmarks of one detected hand
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub landmarks: [Landmark; HAND_LANDMARK_COUNT],
}

impl Default for HandLandmarks {
    fn default() -> Self {
        Self {
            landmarks: [Landmark::default(); HAND_LANDMARK_COUNT],
        }
    }
}

impl HandLandmarks {
    pub fn new(landmarks: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn wrist(&self) -> Landmark {
        self.landmarks[WRIST]
    }

    pub fn thumb_tip(&self) -> Landmark {
        self.landmarks[THUMB_TIP]
    }

    pub fn index_tip(&self) -> Landmark {
        self.landmarks[INDEX_TIP]
    }

    /// Wrist to middle-finger knuckle distance, a proxy for apparent hand size.
    /// Returns `None` when the two points coincide.
    pub fn scale(&self) -> Option<f32> {
        let wrist = self.landmarks[WRIST].point();
        let knuckle = self.landmarks[MIDDLE_MCP].point();
        let scale = wrist.distance_to(knuckle);
        if scale.is_finite() && scale > 1e-4 {
            Some(scale)
        } else {
            None
        }
    }
}

/// One detector result: zero or more hands captured at `timestamp_ms`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkFrame {
    pub hands: Vec<HandLandmarks>,
    pub timestamp_ms: f64,
}

impl LandmarkFrame {
    pub fn new(hands: Vec<HandLandmarks>, timestamp_ms: f64) -> Self {
        Self { hands, timestamp_ms }
    }

    /// Empty detection ("no hands this frame"), not an error
    pub fn empty(timestamp_ms: f64) -> Self {
        Self {
            hands: Vec::new(),
            timestamp_ms,
        }
    }

    /// Decode the flat layout produced by the JS side:
    /// `num_hands` x 21 landmarks x (x, y, confidence).
    ///
    /// Hands whose data is truncated are dropped.
    pub fn from_flat(data: &[f32], num_hands: usize, timestamp_ms: f64) -> Self {
        let stride = HAND_LANDMARK_COUNT * VALUES_PER_LANDMARK;
        // `num_hands` comes from JS; never trust it past what the data holds
        let available = data.len() / stride;
        if num_hands > available {
            log::warn!(
                "Landmark data truncated: {} values for {} hands",
                data.len(),
                num_hands
            );
        }
        let mut hands = Vec::with_capacity(num_hands.min(available));

        for chunk in data.chunks_exact(stride).take(num_hands) {
            let mut landmarks = [Landmark::default(); HAND_LANDMARK_COUNT];
            for (i, lm) in landmarks.iter_mut().enumerate() {
                let v = &chunk[i * VALUES_PER_LANDMARK..(i + 1) * VALUES_PER_LANDMARK];
                *lm = Landmark::new(v[0], v[1], v[2]);
            }
            hands.push(HandLandmarks::new(landmarks));
        }

        Self { hands, timestamp_ms }
    }

    pub fn is_empty(&self) -> bool {
        self.hands.is_empty()
    }
}

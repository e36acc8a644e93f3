//! Two-hand presence gate
//!
//! Reports `is_active` once both hands have been seen together for enough of
//! a recent time window, with their index tips averaged over that window.
//! Coarse presence only: no per-finger gesture recognition.

use std::collections::VecDeque;

use crate::config::TwoHandConfig;
use crate::landmarks::{HandLandmarks, Point};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TwoHandState {
    pub is_active: bool,
    /// Stabilized index tip of the hand on the left half of the image
    pub left: Option<Point>,
    pub right: Option<Point>,
}

pub struct TwoHandDetector {
    config: TwoHandConfig,
    left: VecDeque<(f64, Point)>,
    right: VecDeque<(f64, Point)>,
}

impl TwoHandDetector {
    pub fn new(config: TwoHandConfig) -> Self {
        Self {
            config,
            left: VecDeque::new(),
            right: VecDeque::new(),
        }
    }

    pub fn update(&mut self, hands: &[HandLandmarks], timestamp_ms: f64) -> TwoHandState {
        if !self.config.enabled || hands.len() < 2 {
            self.reset();
            return TwoHandState::default();
        }

        let mut left = None;
        let mut right = None;
        for hand in hands {
            let slot = if hand.wrist().x < 0.5 { &mut left } else { &mut right };
            if slot.is_none() {
                *slot = Some(hand.index_tip().point());
            }
        }

        // Both hands on the same side cannot be told apart
        let (Some(left), Some(right)) = (left, right) else {
            self.reset();
            return TwoHandState::default();
        };

        Self::push(&mut self.left, timestamp_ms, left, self.config.window_ms);
        Self::push(&mut self.right, timestamp_ms, right, self.config.window_ms);

        let overlap = self.left.len().min(self.right.len());
        if overlap < self.config.required_frames() {
            return TwoHandState::default();
        }

        TwoHandState {
            is_active: true,
            left: Self::average(&self.left),
            right: Self::average(&self.right),
        }
    }

    fn push(history: &mut VecDeque<(f64, Point)>, timestamp_ms: f64, point: Point, window_ms: f64) {
        history.push_back((timestamp_ms, point));
        while let Some(&(t, _)) = history.front() {
            if timestamp_ms - t > window_ms {
                history.pop_front();
            } else {
                break;
            }
        }
    }

    fn average(history: &VecDeque<(f64, Point)>) -> Option<Point> {
        if history.is_empty() {
            return None;
        }
        let n = history.len() as f32;
        let (sx, sy) = history
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (_, p)| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

//! Velocity tracking over a short time window
//!
//! Keeps recent timestamped positions and reports speed between the oldest
//! and newest sample. Used by the pen machine to loosen pinch thresholds
//! during quick strokes.

use std::collections::VecDeque;

use crate::landmarks::Point;

/// Samples older than this are dropped
pub const VELOCITY_WINDOW_MS: f64 = 100.0;

/// Speeds below this (normalized units/s) read as zero
pub const DEAD_ZONE: f32 = 0.02;

pub struct VelocityTracker {
    history: VecDeque<(f64, Point)>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(8),
        }
    }

    /// Add a sample, returns the current speed in normalized units per second
    pub fn update(&mut self, pos: Point, timestamp_ms: f64) -> f32 {
        // Out-of-order samples would produce negative spans
        if let Some(&(last_t, _)) = self.history.back() {
            if timestamp_ms < last_t {
                return self.speed();
            }
        }

        self.history.push_back((timestamp_ms, pos));
        while let Some(&(t, _)) = self.history.front() {
            if timestamp_ms - t > VELOCITY_WINDOW_MS && self.history.len() > 2 {
                self.history.pop_front();
            } else {
                break;
            }
        }

        self.speed()
    }

    pub fn speed(&self) -> f32 {
        let (Some(&(t0, old)), Some(&(t1, new))) = (self.history.front(), self.history.back())
        else {
            return 0.0;
        };
        let span = ((t1 - t0) / 1000.0) as f32;
        if span <= 0.0 {
            return 0.0;
        }

        let speed = old.distance_to(new) / span;
        if speed < DEAD_ZONE {
            0.0
        } else {
            speed
        }
    }

    /// Clear history (tracking loss)
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_constant_speed() {
        let mut v = VelocityTracker::new();
        let mut speed = 0.0;
        for i in 0..10 {
            speed = v.update(Point::new(0.01 * i as f32, 0.5), i as f64 * 20.0);
        }
        // 0.01 per 20ms = 0.5 per second
        assert!((speed - 0.5).abs() < 1e-3, "speed = {speed}");
    }

    #[test]
    fn jitter_falls_in_dead_zone() {
        let mut v = VelocityTracker::new();
        v.update(Point::new(0.5, 0.5), 0.0);
        let speed = v.update(Point::new(0.5001, 0.5), 50.0);
        assert_eq!(speed, 0.0);
    }

    #[test]
    fn single_sample_has_no_speed() {
        let mut v = VelocityTracker::new();
        assert_eq!(v.update(Point::new(0.1, 0.1), 0.0), 0.0);
    }
}

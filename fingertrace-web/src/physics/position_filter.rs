//! Two-stage positional filter for one tracked point
//!
//! Stage A (One Euro) removes jitter, stage B (Kalman) follows the smoothed
//! signal so `predict` can extrapolate a few milliseconds ahead for drawing.
//! Predictions are for rendering only and never feed scoring.

use super::kalman::KalmanFilter;
use super::one_euro::OneEuroFilter2D;
use crate::config::{FilterConfig, FilterProfile};
use crate::landmarks::Point;

pub struct PositionFilter {
    config: FilterConfig,
    profile: FilterProfile,
    smoother: OneEuroFilter2D,
    predictor: KalmanFilter,
    last_filtered: Option<Point>,
    last_timestamp: f64,
}

impl PositionFilter {
    pub fn new(config: FilterConfig, profile: FilterProfile) -> Self {
        let tuning = config.tuning(profile);
        Self {
            smoother: OneEuroFilter2D::new(tuning, config.min_dt_ms),
            predictor: KalmanFilter::new(
                config.process_noise_pos,
                config.process_noise_vel,
                config.measurement_noise,
            ),
            config,
            profile,
            last_filtered: None,
            last_timestamp: 0.0,
        }
    }

    /// Feed a raw sample, returns the smoothed point
    pub fn update(&mut self, raw_x: f32, raw_y: f32, timestamp_ms: f64) -> Point {
        let (x, y) = self.smoother.filter(timestamp_ms, (raw_x, raw_y));

        let dt_ms = match self.last_filtered {
            Some(_) => (timestamp_ms - self.last_timestamp).max(self.config.min_dt_ms),
            None => 0.0,
        };
        self.predictor.step(x, y, (dt_ms / 1000.0) as f32);

        let filtered = Point::new(x, y);
        self.last_filtered = Some(filtered);
        self.last_timestamp = self.last_timestamp.max(timestamp_ms);
        filtered
    }

    /// Extrapolate `ahead_ms` into the future for a `viewport_w` x `viewport_h`
    /// pixel surface.
    ///
    /// If the extrapolation would move further than the configured maximum,
    /// the last filtered point is returned unchanged.
    pub fn predict(&self, ahead_ms: f64, viewport_w: f32, viewport_h: f32) -> Option<Point> {
        let filtered = self.last_filtered?;
        if !self.predictor.is_initialized() {
            return Some(filtered);
        }

        let (vx, vy) = self.predictor.velocity();
        let ahead = (ahead_ms.max(0.0) / 1000.0) as f32;
        let predicted = filtered.translate((vx * ahead, vy * ahead));

        if !predicted.is_finite() {
            return Some(filtered);
        }

        let distance_px = filtered.pixel_distance_to(predicted, viewport_w, viewport_h);
        if distance_px > self.config.max_extrapolation_px {
            Some(filtered)
        } else {
            Some(predicted)
        }
    }

    /// Prediction using the configured default horizon
    pub fn predict_default(&self, viewport_w: f32, viewport_h: f32) -> Option<Point> {
        self.predict(self.config.lookahead_ms, viewport_w, viewport_h)
    }

    pub fn last_filtered(&self) -> Option<Point> {
        self.last_filtered
    }

    /// Smoothed speed in normalized units per second (stage B estimate)
    pub fn speed(&self) -> f32 {
        let (vx, vy) = self.predictor.velocity();
        (vx * vx + vy * vy).sqrt()
    }

    pub fn profile(&self) -> FilterProfile {
        self.profile
    }

    /// Switch tuning; clears state so the new profile starts clean
    pub fn set_profile(&mut self, profile: FilterProfile) {
        self.profile = profile;
        self.smoother.set_tuning(self.config.tuning(profile));
        self.reset();
    }

    pub fn reset(&mut self) {
        self.smoother.reset();
        self.predictor.reset();
        self.last_filtered = None;
        self.last_timestamp = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PositionFilter {
        PositionFilter::new(FilterConfig::default(), FilterProfile::Tracing)
    }

    #[test]
    fn converges_on_repeated_point() {
        let mut f = filter();
        f.update(0.1, 0.9, 0.0);
        let mut out = Point::default();
        for i in 1..500 {
            out = f.update(0.6, 0.3, i as f64 * 16.0);
        }
        assert!((out.x - 0.6).abs() < 1e-4);
        assert!((out.y - 0.3).abs() < 1e-4);
    }

    #[test]
    fn no_prediction_before_first_sample() {
        assert!(filter().predict(30.0, 800.0, 600.0).is_none());
    }

    #[test]
    fn prediction_never_exceeds_max_extrapolation() {
        let config = FilterConfig::default();
        let max_px = config.max_extrapolation_px;
        let mut f = PositionFilter::new(config, FilterProfile::Pointer);

        // Very fast sweep, then ask for a long horizon
        for i in 0..40 {
            f.update(0.02 * i as f32, 0.5, i as f64 * 16.0);
            for ahead in [10.0, 30.0, 100.0, 500.0] {
                let filtered = f.last_filtered().unwrap();
                let predicted = f.predict(ahead, 1280.0, 720.0).unwrap();
                let d = filtered.pixel_distance_to(predicted, 1280.0, 720.0);
                assert!(d <= max_px + 1e-3, "extrapolated {d}px");
            }
        }
    }

    #[test]
    fn clamped_prediction_returns_filtered_point() {
        let mut f = filter();
        for i in 0..40 {
            f.update(0.02 * i as f32, 0.5, i as f64 * 16.0);
        }
        let filtered = f.last_filtered().unwrap();
        assert_eq!(f.predict(10_000.0, 1280.0, 720.0), Some(filtered));
    }

    #[test]
    fn moving_point_is_extrapolated_forward() {
        let mut f = filter();
        for i in 0..60 {
            f.update(0.1 + 0.002 * i as f32, 0.5, i as f64 * 16.0);
        }
        let filtered = f.last_filtered().unwrap();
        let predicted = f.predict(30.0, 800.0, 600.0).unwrap();
        assert!(predicted.x > filtered.x);
    }

    #[test]
    fn reset_clears_everything() {
        let mut f = filter();
        f.update(0.4, 0.4, 0.0);
        f.reset();
        assert!(f.last_filtered().is_none());
        assert!(f.predict(30.0, 800.0, 600.0).is_none());
        assert_eq!(f.update(0.9, 0.1, 50.0), Point::new(0.9, 0.1));
    }
}

//! One Euro Filter - adaptive low-pass filter for fingertip jitter
//!
//! Smooth when slow (steady tracing), responsive when fast (quick strokes).
//! Stage A of the positional filter.

use std::f32::consts::PI;

use crate::config::OneEuroTuning;

/// Adaptive low-pass filter: smooth at rest, responsive during motion
#[derive(Clone, Debug)]
pub struct OneEuroFilter {
    tuning: OneEuroTuning,
    /// Elapsed-time floor in seconds (duplicate timestamps)
    min_dt: f32,

    // State
    x_prev: f32,
    dx_prev: f32,
    t_prev: f64,
    initialized: bool,
}

impl OneEuroFilter {
    pub fn new(tuning: OneEuroTuning, min_dt_ms: f64) -> Self {
        Self {
            tuning,
            min_dt: (min_dt_ms.max(1.0) / 1000.0) as f32,
            x_prev: 0.0,
            dx_prev: 0.0,
            t_prev: 0.0,
            initialized: false,
        }
    }

    /// Calculate smoothing factor alpha
    fn smoothing_factor(t_e: f32, cutoff: f32) -> f32 {
        let r = 2.0 * PI * cutoff * t_e;
        r / (r + 1.0)
    }

    /// Filter a single value
    ///
    /// - `t_ms`: timestamp in milliseconds
    /// - `x`: raw input value
    /// Returns: filtered value
    pub fn filter(&mut self, t_ms: f64, x: f32) -> f32 {
        if !self.initialized {
            self.x_prev = x;
            self.dx_prev = 0.0;
            self.t_prev = t_ms;
            self.initialized = true;
            return x;
        }

        // Out-of-order or duplicate timestamps still advance by min_dt
        let t_e = (((t_ms - self.t_prev) / 1000.0) as f32).max(self.min_dt);

        // 1. Estimate derivative (velocity)
        let a_d = Self::smoothing_factor(t_e, self.tuning.d_cutoff);
        let dx = (x - self.x_prev) / t_e;
        let dx_hat = a_d * dx + (1.0 - a_d) * self.dx_prev;

        // 2. Adaptive cutoff: more smoothing when slow, less when fast
        let cutoff = self.tuning.min_cutoff + self.tuning.beta * dx_hat.abs();
        let a = Self::smoothing_factor(t_e, cutoff);

        // 3. Apply filter
        let x_hat = a * x + (1.0 - a) * self.x_prev;

        self.x_prev = x_hat;
        self.dx_prev = dx_hat;
        self.t_prev = self.t_prev.max(t_ms);

        x_hat
    }

    pub fn set_tuning(&mut self, tuning: OneEuroTuning) {
        self.tuning = tuning;
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.initialized = false;
        self.dx_prev = 0.0;
    }
}

/// Pair of One Euro Filters for 2D position
#[derive(Clone, Debug)]
pub struct OneEuroFilter2D {
    pub x: OneEuroFilter,
    pub y: OneEuroFilter,
}

impl OneEuroFilter2D {
    pub fn new(tuning: OneEuroTuning, min_dt_ms: f64) -> Self {
        Self {
            x: OneEuroFilter::new(tuning, min_dt_ms),
            y: OneEuroFilter::new(tuning, min_dt_ms),
        }
    }

    pub fn filter(&mut self, t_ms: f64, pos: (f32, f32)) -> (f32, f32) {
        (self.x.filter(t_ms, pos.0), self.y.filter(t_ms, pos.1))
    }

    pub fn set_tuning(&mut self, tuning: OneEuroTuning) {
        self.x.set_tuning(tuning);
        self.y.set_tuning(tuning);
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

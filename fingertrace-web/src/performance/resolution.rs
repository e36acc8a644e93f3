//! Dynamic resolution controller
//!
//! Watches render/detect throughput and detector latency over a rolling
//! window and steps the detector input resolution down when performance
//! suffers, back up when it recovers. Down is quick, up is slow: scale-up
//! needs twice the sustained good performance and twice the cooldown.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::ResolutionConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One reading from the performance sampler
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceSample {
    pub render_fps: f32,
    pub detect_fps: f32,
    pub detection_latency_ms: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleDirection {
    Down,
    Up,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolutionChange {
    pub from: Resolution,
    pub to: Resolution,
    pub direction: ScaleDirection,
}

/// Window averages, for diagnostics overlays
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceSnapshot {
    pub render_fps: f32,
    pub detect_fps: f32,
    pub detection_latency_ms: f32,
    pub samples: usize,
}

pub struct ResolutionController {
    config: ResolutionConfig,
    /// Coarsest to finest, never empty
    levels: Vec<Resolution>,
    index: usize,
    history: VecDeque<(f64, PerformanceSample)>,
    last_change: Option<f64>,
    poor_since: Option<f64>,
    good_since: Option<f64>,
}

impl ResolutionController {
    pub fn new(config: ResolutionConfig) -> Self {
        let levels = if config.levels.is_empty() {
            log::warn!("Empty resolution ladder, falling back to defaults");
            ResolutionConfig::default().levels
        } else {
            config.levels.clone()
        };
        let index = levels.len() - 1;

        Self {
            config,
            levels,
            index,
            history: VecDeque::new(),
            last_change: None,
            poor_since: None,
            good_since: None,
        }
    }

    /// Record a sample taken at `timestamp_ms`; returns the change, if any
    pub fn record(&mut self, sample: PerformanceSample, timestamp_ms: f64) -> Option<ResolutionChange> {
        self.history.push_back((timestamp_ms, sample));
        while let Some(&(t, _)) = self.history.front() {
            if timestamp_ms - t > self.config.window_ms {
                self.history.pop_front();
            } else {
                break;
            }
        }

        let snapshot = self.snapshot();
        let poor = snapshot.render_fps < self.config.fps_floor
            || snapshot.detection_latency_ms > self.config.latency_ceiling_ms;
        let good = snapshot.render_fps >= self.config.fps_restore
            && snapshot.detection_latency_ms <= self.config.latency_restore_ms;

        self.poor_since = if poor { Some(self.poor_since.unwrap_or(timestamp_ms)) } else { None };
        self.good_since = if good { Some(self.good_since.unwrap_or(timestamp_ms)) } else { None };

        let since_change = self
            .last_change
            .map_or(f64::INFINITY, |t| timestamp_ms - t);

        if let Some(start) = self.poor_since {
            if timestamp_ms - start >= self.config.sustain_ms
                && since_change >= self.config.cooldown_ms
                && self.index > 0
            {
                return Some(self.step(ScaleDirection::Down, timestamp_ms));
            }
        }

        if let Some(start) = self.good_since {
            if timestamp_ms - start >= self.config.sustain_ms * 2.0
                && since_change >= self.config.cooldown_ms * 2.0
                && self.index + 1 < self.levels.len()
            {
                return Some(self.step(ScaleDirection::Up, timestamp_ms));
            }
        }

        None
    }

    fn step(&mut self, direction: ScaleDirection, timestamp_ms: f64) -> ResolutionChange {
        let from = self.levels[self.index];
        self.index = match direction {
            ScaleDirection::Down => self.index - 1,
            ScaleDirection::Up => self.index + 1,
        };
        let to = self.levels[self.index];

        // Measure the new level on its own samples
        self.history.clear();
        self.poor_since = None;
        self.good_since = None;
        self.last_change = Some(timestamp_ms);

        log::info!(
            "Detection resolution {:?}: {}x{} -> {}x{}",
            direction,
            from.width,
            from.height,
            to.width,
            to.height
        );
        ResolutionChange { from, to, direction }
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        if self.history.is_empty() {
            return PerformanceSnapshot::default();
        }
        let n = self.history.len() as f32;
        let (render, detect, latency) = self.history.iter().fold(
            (0.0, 0.0, 0.0),
            |(r, d, l): (f32, f32, f32), (_, s)| {
                (r + s.render_fps, d + s.detect_fps, l + s.detection_latency_ms)
            },
        );
        PerformanceSnapshot {
            render_fps: render / n,
            detect_fps: detect / n,
            detection_latency_ms: latency / n,
            samples: self.history.len(),
        }
    }

    pub fn detection_resolution(&self) -> Resolution {
        self.levels[self.index]
    }

    /// Current width relative to the finest level
    pub fn scale_factor(&self) -> f32 {
        let finest = self.levels[self.levels.len() - 1];
        if finest.width == 0 {
            return 1.0;
        }
        self.levels[self.index].width as f32 / finest.width as f32
    }

    pub fn level_index(&self) -> usize {
        self.index
    }

    /// Back to the finest level with no history (tracking restart)
    pub fn reset(&mut self) {
        self.index = self.levels.len() - 1;
        self.history.clear();
        self.last_change = None;
        self.poor_since = None;
        self.good_since = None;
    }
}

//! JS handle for the dynamic resolution controller

use wasm_bindgen::prelude::*;

use crate::config::TrackerConfig;
use crate::performance::{PerformanceSample, ResolutionController};

#[wasm_bindgen]
pub struct ResolutionGovernor {
    controller: ResolutionController,
}

#[wasm_bindgen]
impl ResolutionGovernor {
    /// `config_json` is a full tracker config; only its `resolution` section is used
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ResolutionGovernor, JsValue> {
        let config = match config_json {
            Some(json) => TrackerConfig::from_json(&json)?,
            None => TrackerConfig::default(),
        };
        Ok(Self {
            controller: ResolutionController::new(config.resolution),
        })
    }

    /// Record a sample stamped with the current time. Returns true if the
    /// detection resolution changed.
    pub fn record_sample(&mut self, render_fps: f32, detect_fps: f32, latency_ms: f32) -> bool {
        self.record_sample_at(render_fps, detect_fps, latency_ms, js_sys::Date::now())
    }

    pub fn record_sample_at(
        &mut self,
        render_fps: f32,
        detect_fps: f32,
        latency_ms: f32,
        timestamp_ms: f64,
    ) -> bool {
        let sample = PerformanceSample {
            render_fps,
            detect_fps,
            detection_latency_ms: latency_ms,
        };
        self.controller.record(sample, timestamp_ms).is_some()
    }

    pub fn width(&self) -> u32 {
        self.controller.detection_resolution().width
    }

    pub fn height(&self) -> u32 {
        self.controller.detection_resolution().height
    }

    pub fn scale_factor(&self) -> f32 {
        self.controller.scale_factor()
    }

    /// Window averages as `[render_fps, detect_fps, latency_ms, samples]`
    pub fn snapshot(&self) -> Vec<f32> {
        let s = self.controller.snapshot();
        vec![s.render_fps, s.detect_fps, s.detection_latency_ms, s.samples as f32]
    }

    pub fn reset(&mut self) {
        self.controller.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_samples_shrink_resolution() {
        let mut governor = ResolutionGovernor::new(None).unwrap();
        assert_eq!((governor.width(), governor.height()), (640, 480));

        let changed = (0..20).any(|i| governor.record_sample_at(12.0, 10.0, 30.0, i as f64 * 100.0));
        assert!(changed);
        assert_eq!(governor.width(), 480);
        assert!(governor.scale_factor() < 1.0);
    }
}

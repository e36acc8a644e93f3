//! Tracker configuration
//!
//! Every threshold the algorithms use lives here with its default.
//! All structs accept partial JSON: missing keys keep their defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::performance::Resolution;

// ============================================================================
// ROOT
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub filter: FilterConfig,
    pub occlusion: OcclusionConfig,
    pub pen: PenConfig,
    pub two_hand: TwoHandConfig,
    pub resolution: ResolutionConfig,
    pub progress: ProgressConfig,
    /// Which detected hand drives the pen
    pub drawing_hand: HandPreference,
}

impl TrackerConfig {
    /// Parse a (possibly partial) JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.occlusion.validate()?;
        self.pen.validate()?;
        self.two_hand.validate()?;
        self.resolution.validate()?;
        self.progress.validate()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandPreference {
    /// First hand reported by the detector
    #[default]
    First,
    Left,
    Right,
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} is outside [0, 1]")))
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} must be positive")))
    }
}

// ============================================================================
// POSITIONAL FILTER
// ============================================================================

/// One Euro tuning pair (plus derivative cutoff)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneEuroTuning {
    /// Minimum cutoff frequency (Hz) - lower = smoother at rest
    pub min_cutoff: f32,
    /// Speed coefficient - higher = less lag during fast motion
    pub beta: f32,
    /// Derivative cutoff frequency (Hz)
    pub d_cutoff: f32,
}

impl OneEuroTuning {
    pub const fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff: 1.0,
        }
    }
}

/// Interaction modes with their own smoothing tuning
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterProfile {
    /// Guided path tracing: heavy smoothing at rest
    #[default]
    Tracing,
    /// Free drawing: a bit more responsive
    FreeDraw,
    /// Menu pointing: snappy, light smoothing
    Pointer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub tracing: OneEuroTuning,
    pub free_draw: OneEuroTuning,
    pub pointer: OneEuroTuning,
    /// Lower bound for elapsed time between samples
    pub min_dt_ms: f64,
    /// Prediction horizon used for rendering
    pub lookahead_ms: f64,
    /// Extrapolations longer than this (pixels) fall back to the filtered point
    pub max_extrapolation_px: f32,
    pub process_noise_pos: f32,
    pub process_noise_vel: f32,
    pub measurement_noise: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            tracing: OneEuroTuning::new(1.2, 0.8),
            free_draw: OneEuroTuning::new(1.0, 0.5),
            pointer: OneEuroTuning::new(2.0, 0.3),
            min_dt_ms: 1.0,
            lookahead_ms: 30.0,
            max_extrapolation_px: 40.0,
            process_noise_pos: 1e-4,
            process_noise_vel: 5e-2,
            measurement_noise: 1e-3,
        }
    }
}

impl FilterConfig {
    pub fn tuning(&self, profile: FilterProfile) -> OneEuroTuning {
        match profile {
            FilterProfile::Tracing => self.tracing,
            FilterProfile::FreeDraw => self.free_draw,
            FilterProfile::Pointer => self.pointer,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, tuning) in [
            ("filter.tracing", self.tracing),
            ("filter.free_draw", self.free_draw),
            ("filter.pointer", self.pointer),
        ] {
            if tuning.min_cutoff <= 0.0 || tuning.d_cutoff <= 0.0 || tuning.beta < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    "cutoffs must be positive and beta non-negative",
                ));
            }
        }
        check_positive("filter.min_dt_ms", self.min_dt_ms)?;
        check_positive("filter.max_extrapolation_px", self.max_extrapolation_px as f64)?;
        check_positive("filter.measurement_noise", self.measurement_noise as f64)?;
        Ok(())
    }
}

// ============================================================================
// OCCLUSION RECOVERY
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    pub confidence_floor: f32,
    /// How long a cached offset may stand in for a hidden thumb
    pub grace_ms: f64,
    /// Max normalized distance between inferred and last real thumb
    pub max_inference_distance: f32,
    /// Consecutive valid frames needed before an offset is trusted
    pub stable_frames: u32,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            grace_ms: 200.0,
            max_inference_distance: 0.08,
            stable_frames: 2,
        }
    }
}

impl OcclusionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_unit("occlusion.confidence_floor", self.confidence_floor)?;
        check_positive("occlusion.grace_ms", self.grace_ms)?;
        check_positive(
            "occlusion.max_inference_distance",
            self.max_inference_distance as f64,
        )?;
        if self.stable_frames == 0 {
            return Err(ConfigError::invalid("occlusion.stable_frames", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// PEN STATE MACHINE
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenConfig {
    pub confidence_floor: f32,
    /// Low-confidence frames tolerated before the pen is forced up
    pub dropout_frames: u32,
    /// Pinch must close below this (x hand scale) to start a stroke
    pub pinch_start: f32,
    /// Pinch must open beyond this (x hand scale) to end a stroke
    pub pinch_end: f32,
    pub debounce_frames: u32,
    /// Jumps beyond this (x hand scale) while down break the stroke
    pub teleport_factor: f32,
    /// Moves smaller than this (x hand scale) while down are ignored
    pub min_movement: f32,
    /// Speeds (normalized units/s) bounding the threshold boost ramp
    pub slow_velocity: f32,
    pub fast_velocity: f32,
    /// Max fractional loosening of pinch thresholds at high speed
    pub max_velocity_boost: f32,
    /// Used when the frame provides no usable hand scale
    pub default_hand_scale: f32,
}

impl Default for PenConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.6,
            dropout_frames: 3,
            pinch_start: 0.35,
            pinch_end: 0.50,
            debounce_frames: 2,
            teleport_factor: 1.5,
            min_movement: 0.02,
            slow_velocity: 0.5,
            fast_velocity: 2.0,
            max_velocity_boost: 0.25,
            default_hand_scale: 0.15,
        }
    }
}

impl PenConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_unit("pen.confidence_floor", self.confidence_floor)?;
        if self.pinch_start >= self.pinch_end {
            return Err(ConfigError::invalid(
                "pen.pinch_start",
                format!(
                    "start threshold {} must be below end threshold {}",
                    self.pinch_start, self.pinch_end
                ),
            ));
        }
        if self.debounce_frames == 0 {
            return Err(ConfigError::invalid("pen.debounce_frames", "must be at least 1"));
        }
        if self.dropout_frames == 0 {
            return Err(ConfigError::invalid("pen.dropout_frames", "must be at least 1"));
        }
        if self.fast_velocity <= self.slow_velocity {
            return Err(ConfigError::invalid(
                "pen.fast_velocity",
                "must be greater than slow_velocity",
            ));
        }
        check_unit("pen.max_velocity_boost", self.max_velocity_boost)?;
        check_positive("pen.default_hand_scale", self.default_hand_scale as f64)?;
        Ok(())
    }
}

// ============================================================================
// TWO-HAND DETECTOR
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoHandConfig {
    pub enabled: bool,
    pub window_ms: f64,
    pub expected_fps: f32,
    /// Fraction of expected frames both hands must share in the window
    pub required_fraction: f32,
}

impl Default for TwoHandConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_ms: 500.0,
            expected_fps: 30.0,
            required_fraction: 0.6,
        }
    }
}

impl TwoHandConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("two_hand.window_ms", self.window_ms)?;
        check_positive("two_hand.expected_fps", self.expected_fps as f64)?;
        check_unit("two_hand.required_fraction", self.required_fraction)
    }

    /// Frames both hands must share inside the window
    pub fn required_frames(&self) -> usize {
        let expected = self.window_ms / 1000.0 * self.expected_fps as f64;
        (expected * self.required_fraction as f64).ceil().max(1.0) as usize
    }
}

// ============================================================================
// DYNAMIC RESOLUTION
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Coarsest to finest
    pub levels: Vec<Resolution>,
    pub window_ms: f64,
    pub fps_floor: f32,
    /// Fps needed before quality is restored (above `fps_floor`)
    pub fps_restore: f32,
    pub latency_ceiling_ms: f32,
    /// Latency needed before quality is restored (below the ceiling)
    pub latency_restore_ms: f32,
    /// How long poor performance must last before scaling down
    pub sustain_ms: f64,
    /// Minimum time between scale-downs; scale-up waits twice this
    pub cooldown_ms: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            levels: vec![
                Resolution::new(320, 240),
                Resolution::new(480, 360),
                Resolution::new(640, 480),
            ],
            window_ms: 2000.0,
            fps_floor: 24.0,
            fps_restore: 40.0,
            latency_ceiling_ms: 80.0,
            latency_restore_ms: 50.0,
            sustain_ms: 1000.0,
            cooldown_ms: 3000.0,
        }
    }
}

impl ResolutionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::invalid("resolution.levels", "at least one level required"));
        }
        if self.fps_restore <= self.fps_floor {
            return Err(ConfigError::invalid(
                "resolution.fps_restore",
                "must be above fps_floor",
            ));
        }
        if self.latency_restore_ms >= self.latency_ceiling_ms {
            return Err(ConfigError::invalid(
                "resolution.latency_restore_ms",
                "must be below latency_ceiling_ms",
            ));
        }
        check_positive("resolution.window_ms", self.window_ms)?;
        check_positive("resolution.cooldown_ms", self.cooldown_ms)?;
        Ok(())
    }
}

// ============================================================================
// PATH PROGRESS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Pen-up time tolerated before the session pauses
    pub pen_up_grace_ms: f64,
    pub min_update_interval_ms: f64,
    /// Max progress gained in a single update
    pub max_step: f32,
    /// Minimum forward arc-length gain for an update
    pub min_forward: f32,
    /// Base physical movement (pixels) required between accepted points
    pub movement_floor_px: f32,
    pub low_confidence: f32,
    pub low_confidence_floor_scale: f32,
    /// Speeds in pixels per millisecond
    pub slow_speed_px_per_ms: f32,
    pub slow_floor_scale: f32,
    pub fast_speed_px_per_ms: f32,
    pub fast_floor_scale: f32,
    pub off_path_decay_delay_ms: f64,
    pub decay_per_second: f32,
    /// Decay never takes back more than this fraction of peak progress
    pub max_decay_fraction: f32,
    /// Fraction of the completion target above which decay stops
    pub decay_guard_ratio: f32,
    /// Projected position beyond which the finish is forgiven
    pub end_zone: f32,
    /// Tolerance multiplier inside the end zone
    pub end_forgiveness: f32,
    /// Progress (as a fraction of the completion target) needed to use the end zone
    pub end_min_progress_ratio: f32,
    pub streak_build_per_second: f32,
    pub streak_decay_per_second: f32,
    pub difficulty_multiplier: f32,
    pub forgiveness_multiplier: f32,
    /// Assist reaches out to this many tolerances from the path
    pub assist_radius_factor: f32,
    pub idle_ms: f64,
    pub hint_cooldown_ms: f64,
    /// Larger gaps between ticks are not counted as tracing time
    pub max_tick_gap_ms: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            pen_up_grace_ms: 200.0,
            min_update_interval_ms: 16.0,
            max_step: 0.05,
            min_forward: 0.002,
            movement_floor_px: 3.0,
            low_confidence: 0.7,
            low_confidence_floor_scale: 0.5,
            slow_speed_px_per_ms: 0.05,
            slow_floor_scale: 0.75,
            fast_speed_px_per_ms: 3.0,
            fast_floor_scale: 1.5,
            off_path_decay_delay_ms: 800.0,
            decay_per_second: 0.02,
            max_decay_fraction: 0.25,
            decay_guard_ratio: 0.9,
            end_zone: 0.97,
            end_forgiveness: 1.5,
            end_min_progress_ratio: 0.75,
            streak_build_per_second: 0.5,
            streak_decay_per_second: 0.25,
            difficulty_multiplier: 1.0,
            forgiveness_multiplier: 1.0,
            assist_radius_factor: 2.0,
            idle_ms: 3000.0,
            hint_cooldown_ms: 5000.0,
            max_tick_gap_ms: 250.0,
        }
    }
}

impl ProgressConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_unit("progress.max_step", self.max_step)?;
        check_unit("progress.max_decay_fraction", self.max_decay_fraction)?;
        check_unit("progress.end_zone", self.end_zone)?;
        check_positive("progress.difficulty_multiplier", self.difficulty_multiplier as f64)?;
        check_positive("progress.forgiveness_multiplier", self.forgiveness_multiplier as f64)?;
        if self.end_forgiveness < 1.0 {
            return Err(ConfigError::invalid(
                "progress.end_forgiveness",
                "must not shrink the tolerance",
            ));
        }
        Ok(())
    }
}

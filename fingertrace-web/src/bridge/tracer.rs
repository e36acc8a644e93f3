//! JS handle for the tracking pipeline and the active tracing session
//!
//! The page owns one `FingerTracer` per drawing surface. Per frame it hands
//! over the flat landmark array and gets back a JSON report; the canvas
//! layer draws from that report and never touches tracker state directly.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::{FilterProfile, ProgressConfig, TrackerConfig};
use crate::error::ConfigError;
use crate::gesture::PenEvent;
use crate::landmarks::{LandmarkFrame, Point};
use crate::progress::{MemoryStore, PathPack, Progression, TraceInput, TraceTick, TracingPath, TracingSession};
use crate::tracker::{FingerTracker, TrackerOutput};

// ============================================================================
// FRAME REPORT (serialized for JS)
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventReport {
    kind: &'static str,
    point: Option<Point>,
    confidence: Option<f32>,
}

impl From<&PenEvent> for EventReport {
    fn from(event: &PenEvent) -> Self {
        let (point, confidence) = match *event {
            PenEvent::StrokeStart { point, confidence } | PenEvent::StrokeContinue { point, confidence } => {
                (Some(point), Some(confidence))
            }
            PenEvent::StrokeEnd { point } => (point, None),
        };
        Self {
            kind: event.name(),
            point,
            confidence,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressReport {
    progress: f32,
    projected_t: f32,
    on_path: bool,
    paused: bool,
    accuracy: f32,
    streak: f32,
    assisted_point: Option<Point>,
    completed: bool,
    hint: Option<&'static str>,
}

impl From<&TraceTick> for ProgressReport {
    fn from(tick: &TraceTick) -> Self {
        Self {
            progress: tick.progress,
            projected_t: tick.projected_t,
            on_path: tick.on_path,
            paused: tick.paused,
            accuracy: tick.accuracy,
            streak: tick.streak,
            assisted_point: tick.assisted_point,
            completed: tick.completed,
            hint: tick.hint.map(|h| h.as_str()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameReport {
    timestamp_ms: f64,
    filtered: Option<Point>,
    predicted: Option<Point>,
    pen_down: bool,
    events: Vec<EventReport>,
    hand_lost: bool,
    thumb_occluded: bool,
    two_hand_active: bool,
    left_hand: Option<Point>,
    right_hand: Option<Point>,
    progress: Option<ProgressReport>,
}

impl FrameReport {
    fn new(output: &TrackerOutput, tick: Option<&TraceTick>) -> Self {
        Self {
            timestamp_ms: output.timestamp_ms,
            filtered: output.filtered,
            predicted: output.predicted,
            pen_down: output.pen_down,
            events: output.pen_events.iter().map(EventReport::from).collect(),
            hand_lost: output.hand_lost,
            thumb_occluded: output.thumb_occluded,
            two_hand_active: output.two_hand.is_active,
            left_hand: output.two_hand.left,
            right_hand: output.two_hand.right,
            progress: tick.map(ProgressReport::from),
        }
    }
}

// ============================================================================
// WASM CLASS
// ============================================================================

#[wasm_bindgen]
pub struct FingerTracer {
    tracker: FingerTracker,
    progress_config: ProgressConfig,
    session: Option<TracingSession>,
    pack: Option<PathPack>,
    progression: Progression<MemoryStore>,
    last_output: TrackerOutput,
}

#[wasm_bindgen]
impl FingerTracer {
    /// `config_json` may be partial; missing fields take defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>, viewport_w: f32, viewport_h: f32) -> Result<FingerTracer, JsValue> {
        let config = match config_json {
            Some(json) => TrackerConfig::from_json(&json)?,
            None => TrackerConfig::default(),
        };
        Ok(Self::with_config(config, viewport_w, viewport_h))
    }

    /// Feed one detector result: `num_hands` x 21 x (x, y, confidence).
    /// Returns the frame report as JSON.
    pub fn process_frame(&mut self, flat: &[f32], num_hands: usize, timestamp_ms: f64) -> String {
        let frame = LandmarkFrame::from_flat(flat, num_hands, timestamp_ms);
        self.step(Some(&frame))
    }

    /// Detector produced nothing this tick
    pub fn process_timeout(&mut self) -> String {
        self.step(None)
    }

    /// Start a session on a path given as JSON
    pub fn load_path(&mut self, path_json: &str) -> Result<(), JsValue> {
        let path = TracingPath::from_json(path_json).map_err(ConfigError::from)?;
        self.start_session(path);
        Ok(())
    }

    /// Pack the following paths belong to, for unlock bookkeeping
    pub fn load_pack(&mut self, pack_json: &str) -> Result<(), JsValue> {
        let pack: PathPack = serde_json::from_str(pack_json).map_err(ConfigError::from)?;
        self.pack = Some(pack);
        Ok(())
    }

    pub fn progress(&self) -> f32 {
        self.session.as_ref().map_or(0.0, |s| s.progress())
    }

    pub fn is_completed(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_completed())
    }

    /// Returns true if a stroke was ended
    pub fn force_up(&mut self) -> bool {
        self.tracker.force_up().is_some()
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        if let Some(session) = self.session.as_mut() {
            session.reset();
        }
        self.last_output = TrackerOutput::default();
    }

    pub fn set_viewport(&mut self, viewport_w: f32, viewport_h: f32) {
        self.tracker.set_viewport(viewport_w, viewport_h);
        if let Some(session) = self.session.as_mut() {
            session.set_viewport(viewport_w, viewport_h);
        }
    }

    /// "tracing", "free_draw" or "pointer"
    pub fn set_profile(&mut self, profile: &str) -> Result<(), JsValue> {
        let profile: FilterProfile =
            serde_json::from_value(serde_json::Value::String(profile.to_string())).map_err(ConfigError::from)?;
        self.tracker.set_profile(profile);
        Ok(())
    }

    pub fn filtered_point(&self) -> Option<Vec<f32>> {
        self.last_output.filtered.map(|p| vec![p.x, p.y])
    }

    pub fn predicted_point(&self) -> Option<Vec<f32>> {
        self.last_output.predicted.map(|p| vec![p.x, p.y])
    }

    pub fn guide_point(&self) -> Option<Vec<f32>> {
        self.session
            .as_ref()
            .and_then(|s| s.guide_point())
            .map(|p| vec![p.x, p.y])
    }

    /// Store the current attempt; returns the updated record as JSON
    pub fn finish_attempt(&mut self, now_ms: f64) -> Result<Option<String>, JsValue> {
        let Some(session) = self.session.as_ref() else {
            return Ok(None);
        };
        let record = self
            .progression
            .record_attempt(&session.summary(), self.pack.as_ref(), now_ms)?;
        let json = serde_json::to_string(&record).map_err(crate::error::StoreError::from)?;
        Ok(Some(json))
    }

    pub fn unlocked_packs(&self) -> u32 {
        self.progression.unlocked_packs()
    }

    pub fn export_progress(&self) -> Result<String, JsValue> {
        Ok(self.progression.store().to_json()?)
    }

    /// Replace stored progress; unreadable data starts fresh
    pub fn import_progress(&mut self, json: &str) {
        self.progression = Progression::new(MemoryStore::from_json(json));
    }
}

impl FingerTracer {
    pub fn with_config(config: TrackerConfig, viewport_w: f32, viewport_h: f32) -> Self {
        log::info!(
            "Finger tracer ready ({}x{}, hand {:?})",
            viewport_w,
            viewport_h,
            config.drawing_hand
        );
        Self {
            progress_config: config.progress.clone(),
            tracker: FingerTracker::new(config, viewport_w, viewport_h),
            session: None,
            pack: None,
            progression: Progression::new(MemoryStore::new()),
            last_output: TrackerOutput::default(),
        }
    }

    pub fn start_session(&mut self, path: TracingPath) {
        let (w, h) = self.tracker.viewport();
        log::info!("Tracing path {} ({} points)", path.id, path.points.len());
        self.session = Some(TracingSession::new(path, self.progress_config.clone(), w, h));
    }

    fn step(&mut self, frame: Option<&LandmarkFrame>) -> String {
        let output = self.tracker.process(frame);
        let tick = self.session.as_mut().map(|session| {
            session.update(TraceInput {
                point: output.filtered,
                pen_down: output.pen_down,
                confidence: output.confidence,
                timestamp_ms: output.timestamp_ms,
            })
        });

        let report = FrameReport::new(&output, tick.as_ref());
        self.last_output = output;
        serde_json::to_string(&report).unwrap_or_else(|e| {
            log::error!("Frame report serialization failed: {}", e);
            String::from("{}")
        })
    }
}

//! Tracing session - forward-only progress along one path
//!
//! Each tick projects the filtered fingertip onto the path and decides
//! whether progress may advance. Progress only moves forward, by at most
//! `max_step` per update, never past the projected position, and only for
//! real movement while the pen is down and on the path. Staying off the
//! path for a while lets progress drift back gently.
//!
//! Completion is reported exactly once, as `completed: true` on a tick.

use super::assist::apply_assist;
use super::path::{PathGeometry, Projection, TracingPath};
use crate::config::ProgressConfig;
use crate::landmarks::Point;

/// Per-tick input. `point` is the filtered fingertip, normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceInput {
    pub point: Option<Point>,
    pub pen_down: bool,
    pub confidence: f32,
    pub timestamp_ms: f64,
}

/// Nudges for the learner, rate-limited by a cooldown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hint {
    /// No accepted movement for a while
    Idle,
    /// Pen down but away from the path for a while
    OffPath,
}

impl Hint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hint::Idle => "idle",
            Hint::OffPath => "off_path",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceTick {
    pub progress: f32,
    /// Arc-length fraction of the nearest path point this tick
    pub projected_t: f32,
    pub distance_px: f32,
    pub on_path: bool,
    pub paused: bool,
    pub accuracy: f32,
    pub streak: f32,
    /// Point after magnetic assist, for rendering
    pub assisted_point: Option<Point>,
    /// True on the single tick where the path was completed
    pub completed: bool,
    pub hint: Option<Hint>,
}

/// Outcome of one attempt, for persistence
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptSummary {
    pub path_id: String,
    pub progress: f32,
    pub accuracy: f32,
    pub completed: bool,
    pub elapsed_ms: f64,
}

pub struct TracingSession {
    config: ProgressConfig,
    path: TracingPath,
    geometry: PathGeometry,

    progress: f32,
    peak_progress: f32,
    on_path: bool,
    paused: bool,
    completed: bool,
    streak: f32,

    on_path_ms: f64,
    total_ms: f64,

    started_at: Option<f64>,
    last_tick: Option<f64>,
    /// Last point accepted as real movement
    last_point: Option<Point>,
    last_update_at: Option<f64>,
    pen_up_since: Option<f64>,
    off_path_since: Option<f64>,
    last_activity: Option<f64>,
    last_hint_at: Option<f64>,
}

impl TracingSession {
    pub fn new(path: TracingPath, config: ProgressConfig, viewport_w: f32, viewport_h: f32) -> Self {
        let geometry = PathGeometry::new(&path.points, viewport_w, viewport_h);
        Self {
            config,
            path,
            geometry,
            progress: 0.0,
            peak_progress: 0.0,
            on_path: false,
            paused: true,
            completed: false,
            streak: 0.0,
            on_path_ms: 0.0,
            total_ms: 0.0,
            started_at: None,
            last_tick: None,
            last_point: None,
            last_update_at: None,
            pen_up_since: None,
            off_path_since: None,
            last_activity: None,
            last_hint_at: None,
        }
    }

    pub fn update(&mut self, input: TraceInput) -> TraceTick {
        let now = input.timestamp_ms;

        // Frames older than the last one processed carry no new information
        if let Some(last) = self.last_tick {
            if now < last {
                return self.tick(None, None, false, None);
            }
        }
        let dt = self
            .last_tick
            .map_or(0.0, |t| (now - t).clamp(0.0, self.config.max_tick_gap_ms));
        self.last_tick = Some(now);
        self.started_at.get_or_insert(now);

        let pen_active = self.update_pen(input.pen_down, now);
        if !self.completed {
            self.total_ms += dt;
        }

        let Some(raw) = input.point.filter(|p| p.is_finite()) else {
            self.on_path = false;
            self.update_streak(false, dt);
            let hint = self.next_hint(now);
            return self.tick(None, None, false, hint);
        };

        let tolerance = self.tolerance_px();
        let raw_projection = self.geometry.project(raw);
        let point = apply_assist(
            raw,
            &raw_projection,
            self.path.assist_strength,
            tolerance * self.config.assist_radius_factor,
        );
        let projection = if point == raw {
            raw_projection
        } else {
            self.geometry.project(point)
        };
        self.on_path = projection.distance_px <= tolerance;

        if pen_active && !self.completed {
            if self.on_path {
                self.on_path_ms += dt;
            }
            self.advance(point, &projection, input.confidence, now, dt);
            self.decay_off_path(now, dt);
        } else {
            self.off_path_since = None;
        }

        self.update_streak(pen_active && self.on_path, dt);

        let completed_now = self.check_completion(&projection, tolerance, pen_active);
        let hint = self.next_hint(now);
        self.tick(Some(&projection), Some(point), completed_now, hint)
    }

    /// Pen-up starts a grace window; once it runs out the session pauses.
    /// Returns whether the pen counts as down this tick.
    fn update_pen(&mut self, pen_down: bool, now: f64) -> bool {
        if pen_down {
            self.pen_up_since = None;
            if self.paused {
                // Fresh movement segment: no velocity carried across the gap
                self.paused = false;
                self.last_point = None;
            }
            return true;
        }

        let since = *self.pen_up_since.get_or_insert(now);
        if !self.paused && now - since >= self.config.pen_up_grace_ms {
            log::debug!("Tracing paused after {:.0}ms pen-up", now - since);
            self.paused = true;
        }
        !self.paused
    }

    fn advance(&mut self, point: Point, projection: &Projection, confidence: f32, now: f64, dt: f64) {
        let Some(last) = self.last_point else {
            self.last_point = Some(point);
            self.last_activity = Some(now);
            return;
        };

        let (w, h) = self.geometry.viewport();
        let movement = last.pixel_distance_to(point, w, h);
        let speed = if dt > 0.0 { movement / dt as f32 } else { 0.0 };
        if movement <= self.movement_floor(confidence, speed) {
            return;
        }
        self.last_point = Some(point);
        self.last_activity = Some(now);

        if !self.on_path {
            return;
        }
        let forward = projection.overall_t - self.progress;
        if forward < self.config.min_forward {
            return;
        }
        if let Some(t) = self.last_update_at {
            if now - t < self.config.min_update_interval_ms {
                return;
            }
        }

        self.progress = (self.progress + self.config.max_step).min(projection.overall_t);
        self.peak_progress = self.peak_progress.max(self.progress);
        self.last_update_at = Some(now);
    }

    /// Required movement in pixels: lower for noisy or slow input, higher for very fast
    fn movement_floor(&self, confidence: f32, speed_px_per_ms: f32) -> f32 {
        let c = &self.config;
        let mut floor = c.movement_floor_px;
        if confidence < c.low_confidence {
            floor *= c.low_confidence_floor_scale;
        }
        if speed_px_per_ms < c.slow_speed_px_per_ms {
            floor *= c.slow_floor_scale;
        } else if speed_px_per_ms > c.fast_speed_px_per_ms {
            floor *= c.fast_floor_scale;
        }
        floor
    }

    fn decay_off_path(&mut self, now: f64, dt: f64) {
        if self.on_path {
            self.off_path_since = None;
            return;
        }
        let since = *self.off_path_since.get_or_insert(now);
        if now - since <= self.config.off_path_decay_delay_ms {
            return;
        }
        if self.progress >= self.path.completion_percent * self.config.decay_guard_ratio {
            return;
        }

        let floor = self.peak_progress * (1.0 - self.config.max_decay_fraction);
        let decayed = self.progress - self.config.decay_per_second * (dt / 1000.0) as f32;
        self.progress = decayed.max(floor).min(self.progress);
    }

    fn update_streak(&mut self, building: bool, dt: f64) {
        let dt_s = (dt / 1000.0) as f32;
        self.streak = if building {
            (self.streak + self.config.streak_build_per_second * dt_s).min(1.0)
        } else {
            (self.streak - self.config.streak_decay_per_second * dt_s).max(0.0)
        };
    }

    fn check_completion(&mut self, projection: &Projection, tolerance: f32, pen_active: bool) -> bool {
        if self.completed || self.geometry.is_degenerate() {
            return false;
        }

        let target = self.completion_target();
        let reached = self.progress >= target;
        let near_end = pen_active
            && projection.overall_t >= self.config.end_zone
            && projection.distance_px <= tolerance * self.config.end_forgiveness
            && self.progress >= target * self.config.end_min_progress_ratio;

        if !(reached || near_end) {
            return false;
        }

        self.completed = true;
        self.progress = self.progress.max(target);
        self.peak_progress = self.peak_progress.max(self.progress);
        log::info!(
            "Path {} complete: progress {:.2}, accuracy {:.2}",
            self.path.id,
            self.progress,
            self.accuracy()
        );
        true
    }

    fn next_hint(&mut self, now: f64) -> Option<Hint> {
        if self.completed {
            return None;
        }
        if let Some(t) = self.last_hint_at {
            if now - t < self.config.hint_cooldown_ms {
                return None;
            }
        }

        let off_path_long = self
            .off_path_since
            .is_some_and(|since| now - since > self.config.off_path_decay_delay_ms);
        let idle_long = self
            .last_activity
            .or(self.started_at)
            .is_some_and(|since| now - since >= self.config.idle_ms);

        let hint = if off_path_long {
            Some(Hint::OffPath)
        } else if idle_long {
            Some(Hint::Idle)
        } else {
            None
        };
        if hint.is_some() {
            self.last_hint_at = Some(now);
        }
        hint
    }

    fn tick(
        &self,
        projection: Option<&Projection>,
        assisted_point: Option<Point>,
        completed: bool,
        hint: Option<Hint>,
    ) -> TraceTick {
        TraceTick {
            progress: self.progress,
            projected_t: projection.map_or(0.0, |p| p.overall_t),
            distance_px: projection.map_or(f32::INFINITY, |p| p.distance_px),
            on_path: self.on_path,
            paused: self.paused,
            accuracy: self.accuracy(),
            streak: self.streak,
            assisted_point,
            completed,
            hint,
        }
    }

    /// Effective tolerance after difficulty and forgiveness scaling
    pub fn tolerance_px(&self) -> f32 {
        self.path.tolerance_px * self.config.difficulty_multiplier * self.config.forgiveness_multiplier
    }

    fn completion_target(&self) -> f32 {
        if self.path.completion_percent.is_finite() {
            self.path.completion_percent.clamp(0.01, 1.0)
        } else {
            1.0
        }
    }

    /// Pen-down on-path time over all session time until completion,
    /// paused time included. Each tick contributes at most `max_tick_gap_ms`.
    pub fn accuracy(&self) -> f32 {
        if self.total_ms <= 0.0 {
            0.0
        } else {
            (self.on_path_ms / self.total_ms) as f32
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn streak(&self) -> f32 {
        self.streak
    }

    pub fn path(&self) -> &TracingPath {
        &self.path
    }

    /// Where the learner should head next
    pub fn guide_point(&self) -> Option<Point> {
        self.geometry.point_at(self.progress)
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            path_id: self.path.id.clone(),
            progress: self.progress,
            accuracy: self.accuracy(),
            completed: self.completed,
            elapsed_ms: match (self.started_at, self.last_tick) {
                (Some(start), Some(last)) => last - start,
                _ => 0.0,
            },
        }
    }

    /// Canvas resized: rebuild pixel geometry, keep progress
    pub fn set_viewport(&mut self, viewport_w: f32, viewport_h: f32) {
        self.geometry = PathGeometry::new(&self.path.points, viewport_w, viewport_h);
    }

    /// Start over on the same path
    pub fn reset(&mut self) {
        let (w, h) = self.geometry.viewport();
        *self = Self::new(self.path.clone(), self.config.clone(), w, h);
    }

    /// Swap in a new path; all progress state starts over
    pub fn load_path(&mut self, path: TracingPath) {
        let (w, h) = self.geometry.viewport();
        *self = Self::new(path, self.config.clone(), w, h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: f32 = 800.0;
    const H: f32 = 600.0;
    const DT: f64 = 33.0;

    fn horizontal() -> TracingPath {
        TracingPath::new("line", vec![Point::new(0.0, 0.5), Point::new(1.0, 0.5)])
    }

    fn session() -> TracingSession {
        TracingSession::new(horizontal(), ProgressConfig::default(), W, H)
    }

    fn down(x: f32, y: f32, t: f64) -> TraceInput {
        TraceInput {
            point: Some(Point::new(x, y)),
            pen_down: true,
            confidence: 0.9,
            timestamp_ms: t,
        }
    }

    fn up(x: f32, y: f32, t: f64) -> TraceInput {
        TraceInput {
            pen_down: false,
            ..down(x, y, t)
        }
    }

    /// Walk along the line at `px` pixels per tick from `from_x` for `ticks`
    fn walk(s: &mut TracingSession, from_x: f32, px: f32, ticks: usize, t0: f64) -> Vec<TraceTick> {
        (0..ticks)
            .map(|i| s.update(down(from_x + px * i as f32 / W, 0.5, t0 + i as f64 * DT)))
            .collect()
    }

    #[test]
    fn walking_the_line_advances_progress() {
        let mut s = session();
        let ticks = walk(&mut s, 0.0, 10.0, 20, 0.0);
        let last = ticks.last().unwrap();
        assert!(last.progress > 0.2);
        assert!(last.on_path);
        assert!(last.progress <= last.projected_t + 1e-6);
    }

    #[test]
    fn progress_never_passes_projection_and_never_drops_on_path() {
        let mut s = session();
        let mut prev = 0.0;
        for tick in walk(&mut s, 0.0, 10.0, 60, 0.0) {
            assert!(tick.progress >= prev);
            assert!(tick.progress <= tick.projected_t + 1e-6);
            prev = tick.progress;
        }
    }

    #[test]
    fn per_update_gain_is_capped() {
        let mut s = session();
        s.update(down(0.0, 0.5, 0.0));
        // 200px jump along the path in one tick
        let tick = s.update(down(0.25, 0.5, DT));
        assert!((tick.progress - ProgressConfig::default().max_step).abs() < 1e-6);
    }

    #[test]
    fn jitter_in_place_does_not_advance() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 10, 0.0);
        let before = s.progress();
        for i in 0..30 {
            let wobble = if i % 2 == 0 { 1.0 } else { -1.0 } / W;
            s.update(down(0.1125 + wobble, 0.5, 400.0 + i as f64 * DT));
        }
        assert!((s.progress() - before).abs() < 0.003);
    }

    #[test]
    fn moving_backwards_keeps_progress() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 20, 0.0);
        let reached = s.progress();
        for i in 0..10 {
            s.update(down(0.2 - 0.0125 * i as f32, 0.5, 700.0 + i as f64 * DT));
        }
        assert_eq!(s.progress(), reached);
    }

    #[test]
    fn rate_limited_updates() {
        let mut s = session();
        s.update(down(0.0, 0.5, 0.0));
        s.update(down(0.02, 0.5, 33.0));
        let first = s.progress();
        // 5ms later: movement is real but too soon
        s.update(down(0.04, 0.5, 38.0));
        assert_eq!(s.progress(), first);
    }

    #[test]
    fn off_path_movement_gives_nothing() {
        let mut s = session();
        s.update(down(0.0, 0.8, 0.0));
        for i in 1..20 {
            let tick = s.update(down(0.0125 * i as f32, 0.8, i as f64 * DT));
            assert!(!tick.on_path);
        }
        assert_eq!(s.progress(), 0.0);
        assert_eq!(s.accuracy(), 0.0);
    }

    #[test]
    fn off_path_decay_is_gentle_and_bounded() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 40, 0.0);
        let reached = s.progress();
        assert!(reached > 0.3);

        let mut t = 40.0 * DT;
        let mut prev = reached;
        for _ in 0..600 {
            t += DT;
            let tick = s.update(down(0.5, 0.9, t));
            assert!(tick.progress <= prev);
            prev = tick.progress;
        }
        let floor = reached * (1.0 - ProgressConfig::default().max_decay_fraction);
        assert!(s.progress() < reached);
        assert!(s.progress() >= floor - 1e-6);
        assert!(s.progress() > 0.0);
    }

    #[test]
    fn short_excursion_does_not_decay() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 30, 0.0);
        let reached = s.progress();
        for i in 0..10 {
            s.update(down(0.36, 0.9, 1000.0 + i as f64 * DT));
        }
        assert_eq!(s.progress(), reached);
    }

    #[test]
    fn pen_up_grace_then_pause() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 5, 0.0);
        assert!(!s.update(up(0.0625, 0.5, 200.0)).paused);
        assert!(!s.update(up(0.0625, 0.5, 350.0)).paused);
        assert!(s.update(up(0.0625, 0.5, 400.0)).paused);
    }

    #[test]
    fn resume_starts_fresh_segment() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 10, 0.0);
        s.update(up(0.1125, 0.5, 400.0));
        s.update(up(0.1125, 0.5, 700.0));
        assert!(s.is_paused());
        let before = s.progress();

        // First point after resume only anchors the segment
        s.update(down(0.3, 0.5, 800.0));
        assert_eq!(s.progress(), before);
        s.update(down(0.3125, 0.5, 833.0));
        assert!(s.progress() > before);
    }

    #[test]
    fn accuracy_counts_on_path_share() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 11, 0.0);
        for i in 0..10 {
            s.update(down(0.14 + 0.0125 * i as f32, 0.9, 363.0 + i as f64 * DT));
        }
        let accuracy = s.accuracy();
        assert!(accuracy > 0.4 && accuracy < 0.6, "accuracy {accuracy}");
    }

    #[test]
    fn paused_time_counts_against_accuracy() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 11, 0.0);
        assert_eq!(s.accuracy(), 1.0);

        for i in 1..=10 {
            s.update(TraceInput {
                point: None,
                pen_down: false,
                confidence: 0.0,
                timestamp_ms: 330.0 + i as f64 * DT,
            });
        }
        assert!(s.is_paused());
        assert!((s.accuracy() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn completion_fires_once() {
        let mut s = session();
        let ticks = walk(&mut s, 0.0, 10.0, 81, 0.0);
        let completions = ticks.iter().filter(|t| t.completed).count();
        assert_eq!(completions, 1);
        assert!(s.is_completed());
        assert!(s.progress() >= 0.82);

        // Further ticks at the finish do not fire again
        for i in 0..10 {
            assert!(!s.update(down(1.0, 0.5, 3000.0 + i as f64 * DT)).completed);
        }
    }

    #[test]
    fn finish_is_forgiven_near_the_end() {
        let path = horizontal();
        let config = ProgressConfig::default();
        let mut s = TracingSession::new(path, config, W, H);
        // Trace to ~0.7, then arrive at the very end slightly wide of the line
        walk(&mut s, 0.0, 10.0, 57, 0.0);
        assert!(s.progress() >= 0.615 && s.progress() < 0.82);
        let tick = s.update(down(0.985, 0.5 + 30.0 / H, 57.0 * DT));
        assert!(tick.completed);
    }

    #[test]
    fn jumping_to_the_end_without_tracing_does_not_complete() {
        let mut s = session();
        s.update(down(0.0, 0.5, 0.0));
        let tick = s.update(down(0.99, 0.5, DT));
        assert!(!tick.completed);
    }

    #[test]
    fn assist_pulls_near_points_on_path() {
        let path = horizontal().with_tolerance(10.0).with_assist(0.8);
        let mut s = TracingSession::new(path, ProgressConfig::default(), W, H);
        // 12px off a 10px tolerance: only on-path thanks to assist
        let tick = s.update(down(0.2, 0.5 + 12.0 / H, 0.0));
        assert!(tick.on_path);
        assert!(tick.assisted_point.unwrap().y < 0.5 + 12.0 / H);
    }

    #[test]
    fn empty_path_is_a_no_op() {
        let path = TracingPath::new("empty", Vec::new());
        let mut s = TracingSession::new(path, ProgressConfig::default(), W, H);
        for i in 0..20 {
            let tick = s.update(down(0.05 * i as f32, 0.5, i as f64 * DT));
            assert!(!tick.on_path);
            assert!(tick.distance_px.is_infinite());
            assert!(!tick.completed);
        }
        assert_eq!(s.progress(), 0.0);
    }

    #[test]
    fn streak_builds_and_decays() {
        let mut s = session();
        let ticks = walk(&mut s, 0.0, 10.0, 30, 0.0);
        let built = ticks.last().unwrap().streak;
        assert!(built > 0.4);
        for i in 0..30 {
            s.update(down(0.4, 0.9, 1000.0 + i as f64 * DT));
        }
        assert!(s.streak() < built);
        assert!(s.streak() >= 0.0);
    }

    #[test]
    fn idle_hint_respects_cooldown() {
        let mut s = session();
        s.update(down(0.1, 0.5, 0.0));
        let mut hints = Vec::new();
        for i in 1..400 {
            if let Some(hint) = s.update(down(0.1, 0.5, i as f64 * DT)).hint {
                hints.push((i as f64 * DT, hint));
            }
        }
        assert!(!hints.is_empty());
        assert!(hints.iter().all(|(_, h)| *h == Hint::Idle));
        for pair in hints.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= ProgressConfig::default().hint_cooldown_ms);
        }
    }

    #[test]
    fn out_of_order_frames_are_ignored() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 10, 0.0);
        let before = s.progress();
        s.update(down(0.5, 0.5, 100.0));
        assert_eq!(s.progress(), before);
    }

    #[test]
    fn sessions_are_independent() {
        let mut a = session();
        let b = session();
        walk(&mut a, 0.0, 10.0, 20, 0.0);
        assert!(a.progress() > 0.0);
        assert_eq!(b.progress(), 0.0);
    }

    #[test]
    fn reset_and_summary() {
        let mut s = session();
        walk(&mut s, 0.0, 10.0, 20, 0.0);
        let summary = s.summary();
        assert_eq!(summary.path_id, "line");
        assert!(summary.progress > 0.0);
        assert!((summary.elapsed_ms - 19.0 * DT).abs() < 1e-6);

        s.reset();
        assert_eq!(s.progress(), 0.0);
        assert!(s.is_paused());
        assert_eq!(s.summary().elapsed_ms, 0.0);
    }
}

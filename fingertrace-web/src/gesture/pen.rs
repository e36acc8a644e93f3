//! Pen state machine - pinch gesture to stroke events
//!
//! Index and thumb tips closer than a hand-scale-relative threshold mean
//! "pen down". Different thresholds to start and to end a pinch (hysteresis),
//! a debounce window before any change is committed, a dropout counter for
//! low-confidence frames and a teleport check that breaks strokes on jumps.

use crate::config::PenConfig;
use crate::landmarks::Point;
use crate::physics::VelocityTracker;

/// Committed pen position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PenState {
    Up,
    Down,
}

impl PenState {
    pub fn opposite(self) -> Self {
        match self {
            PenState::Up => PenState::Down,
            PenState::Down => PenState::Up,
        }
    }
}

/// Machine phase, including a candidate change waiting out the debounce
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PenPhase {
    Up,
    Down,
    /// Committed state is `target.opposite()` until `frames_held` reaches the debounce
    PendingTransition { target: PenState, frames_held: u32 },
}

impl PenPhase {
    pub fn committed(&self) -> PenState {
        match *self {
            PenPhase::Up => PenState::Up,
            PenPhase::Down => PenState::Down,
            PenPhase::PendingTransition { target, .. } => target.opposite(),
        }
    }
}

impl From<PenState> for PenPhase {
    fn from(state: PenState) -> Self {
        match state {
            PenState::Up => PenPhase::Up,
            PenState::Down => PenPhase::Down,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PenEvent {
    StrokeStart { point: Point, confidence: f32 },
    StrokeContinue { point: Point, confidence: f32 },
    /// `point` is the last accepted stroke position, if any
    StrokeEnd { point: Option<Point> },
}

impl PenEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PenEvent::StrokeStart { .. } => "stroke_start",
            PenEvent::StrokeContinue { .. } => "stroke_continue",
            PenEvent::StrokeEnd { .. } => "stroke_end",
        }
    }
}

/// Per-frame pen input. Tips are `None` when not tracked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenInput {
    pub index_tip: Option<Point>,
    pub thumb_tip: Option<Point>,
    /// Apparent hand size; non-positive values fall back to the configured default
    pub hand_scale: f32,
    pub confidence: f32,
    pub timestamp_ms: f64,
}

pub struct PenStateMachine {
    config: PenConfig,
    phase: PenPhase,
    last_accepted: Option<Point>,
    dropout_frames: u32,
    velocity: VelocityTracker,
}

impl PenStateMachine {
    pub fn new(config: PenConfig) -> Self {
        Self {
            config,
            phase: PenPhase::Up,
            last_accepted: None,
            dropout_frames: 0,
            velocity: VelocityTracker::new(),
        }
    }

    /// Process one frame. An empty result is the "no event" case; a teleport
    /// can yield `StrokeEnd` followed by `StrokeStart` in the same tick.
    pub fn update(&mut self, input: PenInput) -> Vec<PenEvent> {
        let mut events = Vec::new();

        let (index, thumb) = match (input.index_tip, input.thumb_tip) {
            (Some(index), Some(thumb))
                if input.confidence >= self.config.confidence_floor
                    && index.is_finite()
                    && thumb.is_finite() =>
            {
                (index, thumb)
            }
            _ => {
                self.handle_dropout(&mut events);
                return events;
            }
        };
        self.dropout_frames = 0;

        let scale = if input.hand_scale.is_finite() && input.hand_scale > 0.0 {
            input.hand_scale
        } else {
            self.config.default_hand_scale
        };
        let speed = self.velocity.update(index, input.timestamp_ms);

        if self.phase.committed() == PenState::Down {
            if let Some(last) = self.last_accepted {
                let jump = last.distance_to(index);
                if jump > self.config.teleport_factor * scale {
                    log::debug!("Pen teleport {jump:.3} > {:.3}, breaking stroke", self.config.teleport_factor * scale);
                    events.push(PenEvent::StrokeEnd { point: Some(last) });
                    self.phase = PenPhase::Up;
                    self.last_accepted = None;
                }
            }
        }

        let desired = self.desired_state(index.distance_to(thumb), scale, speed);
        self.advance(desired, index, scale, input.confidence, &mut events);
        events
    }

    /// Pinch test with hysteresis and speed-dependent loosening
    fn desired_state(&self, pinch_distance: f32, scale: f32, speed: f32) -> PenState {
        let base = match self.phase.committed() {
            PenState::Up => self.config.pinch_start,
            PenState::Down => self.config.pinch_end,
        };
        let threshold = base * scale * self.velocity_boost(speed);

        if pinch_distance < threshold {
            PenState::Down
        } else {
            PenState::Up
        }
    }

    /// 1.0 when slow, up to 1.0 + max boost when fast
    fn velocity_boost(&self, speed: f32) -> f32 {
        let span = self.config.fast_velocity - self.config.slow_velocity;
        let t = if span > 0.0 {
            ((speed - self.config.slow_velocity) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        1.0 + t * self.config.max_velocity_boost
    }

    fn advance(
        &mut self,
        desired: PenState,
        index: Point,
        scale: f32,
        confidence: f32,
        events: &mut Vec<PenEvent>,
    ) {
        let committed = self.phase.committed();

        if desired == committed {
            // Any pending change was noise
            self.phase = committed.into();
            if committed == PenState::Down {
                self.continue_stroke(index, scale, confidence, events);
            }
            return;
        }

        let frames_held = match self.phase {
            PenPhase::PendingTransition { target, frames_held } if target == desired => frames_held + 1,
            _ => 1,
        };

        if frames_held < self.config.debounce_frames {
            self.phase = PenPhase::PendingTransition {
                target: desired,
                frames_held,
            };
            return;
        }

        match desired {
            PenState::Down => {
                self.phase = PenPhase::Down;
                self.last_accepted = Some(index);
                events.push(PenEvent::StrokeStart {
                    point: index,
                    confidence,
                });
            }
            PenState::Up => {
                self.phase = PenPhase::Up;
                events.push(PenEvent::StrokeEnd {
                    point: self.last_accepted.take(),
                });
            }
        }
    }

    fn continue_stroke(&mut self, index: Point, scale: f32, confidence: f32, events: &mut Vec<PenEvent>) {
        if let Some(last) = self.last_accepted {
            if last.distance_to(index) < self.config.min_movement * scale {
                return;
            }
        }
        self.last_accepted = Some(index);
        events.push(PenEvent::StrokeContinue {
            point: index,
            confidence,
        });
    }

    fn handle_dropout(&mut self, events: &mut Vec<PenEvent>) {
        self.dropout_frames = self.dropout_frames.saturating_add(1);
        if self.dropout_frames < self.config.dropout_frames {
            return;
        }

        if self.phase.committed() == PenState::Down {
            log::debug!("Pen dropout after {} frames, lifting", self.dropout_frames);
            events.push(PenEvent::StrokeEnd {
                point: self.last_accepted,
            });
        }
        self.phase = PenPhase::Up;
        self.last_accepted = None;
        self.velocity.clear();
    }

    /// Lift the pen now, bypassing debounce (mode exits)
    pub fn force_up(&mut self) -> Option<PenEvent> {
        let was_down = self.phase.committed() == PenState::Down;
        let last = self.last_accepted.take();
        self.phase = PenPhase::Up;
        was_down.then_some(PenEvent::StrokeEnd { point: last })
    }

    pub fn is_down(&self) -> bool {
        self.phase.committed() == PenState::Down
    }

    pub fn phase(&self) -> PenPhase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = PenPhase::Up;
        self.last_accepted = None;
        self.dropout_frames = 0;
        self.velocity.clear();
    }
}

//! Per-frame tracking pipeline
//!
//! One landmark frame in, one `TrackerOutput` out:
//! 1. pick the drawing hand
//! 2. recover an occluded thumb from the wrist
//! 3. smooth the index tip (stage A) and estimate velocity (stage B)
//! 4. run the pen state machine on the smoothed index tip and the thumb
//! 5. optionally look for a second hand
//!
//! Every stage owns its own state; nothing is shared between trackers.

use crate::config::{FilterProfile, HandPreference, TrackerConfig};
use crate::gesture::{PenEvent, PenInput, PenStateMachine, TwoHandDetector, TwoHandState};
use crate::landmarks::{HandLandmarks, LandmarkFrame, Point};
use crate::physics::{OcclusionRecovery, PositionFilter};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackerOutput {
    /// Smoothed index tip, for scoring
    pub filtered: Option<Point>,
    /// Extrapolated index tip, for drawing only
    pub predicted: Option<Point>,
    pub pen_events: Vec<PenEvent>,
    pub pen_down: bool,
    /// Confidence handed to the pen gate this frame
    pub confidence: f32,
    pub hand_lost: bool,
    pub thumb_occluded: bool,
    pub two_hand: TwoHandState,
    pub timestamp_ms: f64,
}

pub struct FingerTracker {
    config: TrackerConfig,
    filter: PositionFilter,
    occlusion: OcclusionRecovery,
    pen: PenStateMachine,
    two_hand: TwoHandDetector,
    viewport: (f32, f32),
    last_timestamp: Option<f64>,
}

impl FingerTracker {
    pub fn new(config: TrackerConfig, viewport_w: f32, viewport_h: f32) -> Self {
        Self {
            filter: PositionFilter::new(config.filter.clone(), FilterProfile::default()),
            occlusion: OcclusionRecovery::new(config.occlusion.clone()),
            pen: PenStateMachine::new(config.pen.clone()),
            two_hand: TwoHandDetector::new(config.two_hand.clone()),
            config,
            viewport: (viewport_w, viewport_h),
            last_timestamp: None,
        }
    }

    /// Process one detector result. `None` means the detector gave nothing
    /// this tick (timeout) and counts as a dropout frame.
    pub fn process(&mut self, frame: Option<&LandmarkFrame>) -> TrackerOutput {
        let Some(frame) = frame else {
            let ts = self.last_timestamp.unwrap_or(0.0);
            return self.dropout(ts);
        };

        // Late frames are older than what we already used
        if let Some(last) = self.last_timestamp {
            if frame.timestamp_ms < last {
                log::debug!("Skipping stale frame {:.0}ms < {:.0}ms", frame.timestamp_ms, last);
                return self.idle_output(last);
            }
        }
        let ts = frame.timestamp_ms;
        self.last_timestamp = Some(ts);

        let two_hand = if self.config.two_hand.enabled {
            self.two_hand.update(&frame.hands, ts)
        } else {
            TwoHandState::default()
        };

        // No drawing hand in the frame is a full hand loss
        let Some(hand) = self.select_hand(&frame.hands) else {
            return self.hand_lost(ts, two_hand);
        };

        let thumb = hand.thumb_tip();
        let index = hand.index_tip();
        let occlusion = self.occlusion.process(thumb, index, hand.wrist(), ts);

        if occlusion.hand_lost {
            return self.hand_lost(ts, two_hand);
        }

        let index_ok = index.is_valid(self.config.occlusion.confidence_floor);
        let filtered = if index_ok {
            let p = index.point();
            Some(self.filter.update(p.x, p.y, ts))
        } else {
            self.filter.last_filtered()
        };

        let confidence = match occlusion.inferred_thumb {
            None => 0.0,
            Some(_) if occlusion.thumb_occluded => index.confidence,
            Some(_) => index.confidence.min(thumb.confidence),
        };

        let events = self.pen.update(PenInput {
            index_tip: if index_ok { filtered } else { None },
            thumb_tip: occlusion.inferred_thumb,
            hand_scale: hand.scale().unwrap_or(0.0),
            confidence,
            timestamp_ms: ts,
        });

        TrackerOutput {
            filtered,
            predicted: self.predicted(),
            pen_events: events,
            pen_down: self.pen.is_down(),
            confidence,
            hand_lost: false,
            thumb_occluded: occlusion.thumb_occluded,
            two_hand,
            timestamp_ms: ts,
        }
    }

    fn select_hand<'a>(&self, hands: &'a [HandLandmarks]) -> Option<&'a HandLandmarks> {
        match self.config.drawing_hand {
            HandPreference::First => hands.first(),
            // Image-space halves; the caller decides whether the feed is mirrored
            HandPreference::Left => hands.iter().find(|h| h.wrist().x < 0.5),
            HandPreference::Right => hands.iter().find(|h| h.wrist().x >= 0.5),
        }
    }

    /// Clear everything cached about the hand; the pen still sees a dropout
    fn hand_lost(&mut self, ts: f64, two_hand: TwoHandState) -> TrackerOutput {
        self.filter.reset();
        self.occlusion.reset();
        let mut output = self.dropout(ts);
        output.hand_lost = true;
        output.two_hand = two_hand;
        output
    }

    fn dropout(&mut self, ts: f64) -> TrackerOutput {
        let events = self.pen.update(PenInput {
            index_tip: None,
            thumb_tip: None,
            hand_scale: 0.0,
            confidence: 0.0,
            timestamp_ms: ts,
        });
        TrackerOutput {
            filtered: self.filter.last_filtered(),
            predicted: self.predicted(),
            pen_events: events,
            pen_down: self.pen.is_down(),
            timestamp_ms: ts,
            ..TrackerOutput::default()
        }
    }

    fn idle_output(&self, ts: f64) -> TrackerOutput {
        TrackerOutput {
            filtered: self.filter.last_filtered(),
            predicted: self.predicted(),
            pen_down: self.pen.is_down(),
            timestamp_ms: ts,
            ..TrackerOutput::default()
        }
    }

    fn predicted(&self) -> Option<Point> {
        let (w, h) = self.viewport;
        self.filter.predict_default(w, h)
    }

    /// Lift the pen immediately (leaving a drawing mode)
    pub fn force_up(&mut self) -> Option<PenEvent> {
        self.pen.force_up()
    }

    pub fn is_pen_down(&self) -> bool {
        self.pen.is_down()
    }

    pub fn set_profile(&mut self, profile: FilterProfile) {
        self.filter.set_profile(profile);
    }

    pub fn profile(&self) -> FilterProfile {
        self.filter.profile()
    }

    pub fn set_viewport(&mut self, viewport_w: f32, viewport_h: f32) {
        self.viewport = (viewport_w, viewport_h);
    }

    pub fn viewport(&self) -> (f32, f32) {
        self.viewport
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.occlusion.reset();
        self.pen.reset();
        self.two_hand.reset();
        self.last_timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, HAND_LANDMARK_COUNT, INDEX_TIP, MIDDLE_MCP, THUMB_TIP, WRIST};

    /// Open or pinched hand with the wrist at (wx, 0.7)
    fn hand(wx: f32, index: (f32, f32), pinched: bool, confidence: f32) -> HandLandmarks {
        let mut lms = [Landmark::new(wx, 0.6, confidence); HAND_LANDMARK_COUNT];
        lms[WRIST] = Landmark::new(wx, 0.7, confidence);
        lms[MIDDLE_MCP] = Landmark::new(wx, 0.5, confidence);
        lms[INDEX_TIP] = Landmark::new(index.0, index.1, confidence);
        let thumb = if pinched { (index.0 + 0.01, index.1) } else { (index.0 + 0.15, index.1) };
        lms[THUMB_TIP] = Landmark::new(thumb.0, thumb.1, confidence);
        HandLandmarks::new(lms)
    }

    fn frame(hands: Vec<HandLandmarks>, ts: f64) -> LandmarkFrame {
        LandmarkFrame::new(hands, ts)
    }

    fn tracker() -> FingerTracker {
        FingerTracker::new(TrackerConfig::default(), 800.0, 600.0)
    }

    #[test]
    fn pinch_starts_stroke_after_debounce() {
        let mut t = tracker();
        let first = t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), true, 0.9)], 0.0)));
        assert!(first.pen_events.is_empty());
        let second = t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), true, 0.9)], 33.0)));
        assert!(matches!(second.pen_events[..], [PenEvent::StrokeStart { .. }]));
        assert!(second.pen_down);
        assert!(second.filtered.is_some());
    }

    #[test]
    fn missing_frames_lift_the_pen() {
        let mut t = tracker();
        for i in 0..3 {
            t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), true, 0.9)], i as f64 * 33.0)));
        }
        assert!(t.is_pen_down());
        assert!(t.process(None).pen_events.is_empty());
        assert!(t.process(Some(&frame(Vec::new(), 130.0))).pen_events.is_empty());
        let third = t.process(None);
        assert!(matches!(third.pen_events[..], [PenEvent::StrokeEnd { .. }]));
        assert!(!third.pen_down);
    }

    #[test]
    fn hand_lost_resets_filter() {
        let mut t = tracker();
        t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), false, 0.9)], 0.0)));
        let out = t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), false, 0.1)], 33.0)));
        assert!(out.hand_lost);
        assert!(out.filtered.is_none());
    }

    #[test]
    fn empty_frame_forgets_the_hand() {
        let mut t = tracker();
        for i in 0..3 {
            t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), false, 0.9)], i as f64 * 33.0)));
        }

        let gap = t.process(Some(&LandmarkFrame::empty(100.0)));
        assert!(gap.hand_lost);
        assert!(gap.filtered.is_none());

        // Thumb hidden on return: no offset to infer from yet
        let mut h = hand(0.8, (0.8, 0.4), false, 0.9);
        h.landmarks[THUMB_TIP].confidence = 0.3;
        let back = t.process(Some(&frame(vec![h], 133.0)));
        assert!(!back.thumb_occluded);
        assert!((back.filtered.unwrap().x - 0.8).abs() < 1e-5);
    }

    #[test]
    fn missing_preferred_hand_is_hand_loss() {
        let mut config = TrackerConfig::default();
        config.drawing_hand = HandPreference::Left;
        let mut t = FingerTracker::new(config, 800.0, 600.0);

        t.process(Some(&frame(vec![hand(0.2, (0.2, 0.4), false, 0.9)], 0.0)));
        let out = t.process(Some(&frame(vec![hand(0.8, (0.8, 0.4), false, 0.9)], 33.0)));
        assert!(out.hand_lost);
        assert!(out.filtered.is_none());
    }

    #[test]
    fn stroke_points_are_the_smoothed_tip() {
        let mut t = tracker();
        let mut strokes = 0;
        for i in 0..40 {
            let jitter = if i % 2 == 0 { 0.008 } else { -0.008 };
            let x = 0.4 + jitter;
            let out = t.process(Some(&frame(vec![hand(x, (x, 0.4), true, 0.9)], i as f64 * 33.0)));
            for event in &out.pen_events {
                let point = match *event {
                    PenEvent::StrokeStart { point, .. } | PenEvent::StrokeContinue { point, .. } => point,
                    PenEvent::StrokeEnd { .. } => continue,
                };
                assert_eq!(Some(point), out.filtered);
                strokes += 1;
            }
        }
        assert!(strokes > 0);
    }

    #[test]
    fn occluded_thumb_keeps_confidence_from_index() {
        let mut t = tracker();
        for i in 0..3 {
            t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), false, 0.9)], i as f64 * 33.0)));
        }
        let mut h = hand(0.4, (0.4, 0.4), false, 0.9);
        h.landmarks[THUMB_TIP].confidence = 0.1;
        let out = t.process(Some(&frame(vec![h], 100.0)));
        assert!(out.thumb_occluded);
        assert_eq!(out.confidence, 0.9);
    }

    #[test]
    fn right_hand_preference_skips_left_hand() {
        let mut config = TrackerConfig::default();
        config.drawing_hand = HandPreference::Right;
        let mut t = FingerTracker::new(config, 800.0, 600.0);

        let hands = vec![hand(0.2, (0.2, 0.4), false, 0.9), hand(0.8, (0.8, 0.4), false, 0.9)];
        let out = t.process(Some(&frame(hands, 0.0)));
        let p = out.filtered.unwrap();
        assert!((p.x - 0.8).abs() < 1e-5);
    }

    #[test]
    fn stale_frames_are_skipped() {
        let mut t = tracker();
        t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), false, 0.9)], 100.0)));
        let out = t.process(Some(&frame(vec![hand(0.4, (0.9, 0.9), false, 0.9)], 50.0)));
        let p = out.filtered.unwrap();
        assert!((p.x - 0.4).abs() < 1e-5);
        assert_eq!(out.timestamp_ms, 100.0);
    }

    #[test]
    fn two_hands_reported_when_enabled() {
        let mut config = TrackerConfig::default();
        config.two_hand.enabled = true;
        let mut t = FingerTracker::new(config, 800.0, 600.0);

        let mut active = false;
        for i in 0..15 {
            let hands = vec![hand(0.2, (0.2, 0.5), false, 0.9), hand(0.8, (0.8, 0.5), false, 0.9)];
            active = t.process(Some(&frame(hands, i as f64 * 33.0))).two_hand.is_active;
        }
        assert!(active);
    }

    #[test]
    fn force_up_and_reset() {
        let mut t = tracker();
        for i in 0..3 {
            t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), true, 0.9)], i as f64 * 33.0)));
        }
        assert!(matches!(t.force_up(), Some(PenEvent::StrokeEnd { .. })));
        assert!(t.force_up().is_none());

        t.reset();
        let out = t.process(Some(&frame(vec![hand(0.4, (0.4, 0.4), false, 0.9)], 0.0)));
        assert!(!out.pen_down);
        assert!(out.filtered.is_some());
    }
}

//! Occlusion recovery - infer a hidden thumb tip from the wrist
//!
//! While thumb and wrist are both visible we cache the wrist→thumb offset.
//! When the thumb drops out but index and wrist stay visible, the thumb is
//! placed at `wrist + offset` for a short grace window, as long as that stays
//! close to where the thumb was last seen.

use crate::config::OcclusionConfig;
use crate::landmarks::{Landmark, Point};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OcclusionResult {
    /// Real thumb when visible, inferred thumb when occluded, else `None`
    pub inferred_thumb: Option<Point>,
    /// True only when `inferred_thumb` came from the cached offset
    pub thumb_occluded: bool,
    /// Thumb, index and wrist all invalid this frame
    pub hand_lost: bool,
}

impl OcclusionResult {
    fn visible(thumb: Point) -> Self {
        Self {
            inferred_thumb: Some(thumb),
            thumb_occluded: false,
            hand_lost: false,
        }
    }

    fn unavailable() -> Self {
        Self {
            inferred_thumb: None,
            thumb_occluded: false,
            hand_lost: false,
        }
    }

    fn lost() -> Self {
        Self {
            inferred_thumb: None,
            thumb_occluded: false,
            hand_lost: true,
        }
    }
}

/// Cached geometry from the last stable frames
#[derive(Clone, Debug, Default)]
struct OcclusionMemory {
    last_thumb: Option<Point>,
    last_wrist: Option<Point>,
    /// wrist → thumb
    offset: Option<(f32, f32)>,
    /// Consecutive frames with both thumb and wrist valid
    stable_frames: u32,
    occlusion_start: Option<f64>,
    hand_lost_since: Option<f64>,
}

pub struct OcclusionRecovery {
    config: OcclusionConfig,
    memory: OcclusionMemory,
}

impl OcclusionRecovery {
    pub fn new(config: OcclusionConfig) -> Self {
        Self {
            config,
            memory: OcclusionMemory::default(),
        }
    }

    pub fn process(
        &mut self,
        thumb: Landmark,
        index: Landmark,
        wrist: Landmark,
        timestamp_ms: f64,
    ) -> OcclusionResult {
        let floor = self.config.confidence_floor;
        let thumb_ok = thumb.is_valid(floor);
        let index_ok = index.is_valid(floor);
        let wrist_ok = wrist.is_valid(floor);

        if !thumb_ok && !index_ok && !wrist_ok {
            if self.memory.hand_lost_since.is_none() {
                log::debug!("Hand lost at {timestamp_ms:.0}ms, clearing occlusion cache");
            }
            let since = self.memory.hand_lost_since.unwrap_or(timestamp_ms);
            self.memory = OcclusionMemory {
                hand_lost_since: Some(since),
                ..OcclusionMemory::default()
            };
            return OcclusionResult::lost();
        }
        self.memory.hand_lost_since = None;

        if wrist_ok {
            self.memory.last_wrist = Some(wrist.point());
        }

        if thumb_ok {
            self.memory.occlusion_start = None;
            self.memory.last_thumb = Some(thumb.point());

            if wrist_ok {
                self.memory.stable_frames = self.memory.stable_frames.saturating_add(1);
                if self.memory.stable_frames >= self.config.stable_frames {
                    self.memory.offset = Some(wrist.point().offset_to(thumb.point()));
                }
            } else {
                self.memory.stable_frames = 0;
            }
            return OcclusionResult::visible(thumb.point());
        }

        self.memory.stable_frames = 0;

        if !(index_ok && wrist_ok) {
            return OcclusionResult::unavailable();
        }
        let (Some(offset), Some(last_thumb)) = (self.memory.offset, self.memory.last_thumb) else {
            return OcclusionResult::unavailable();
        };

        let start = *self.memory.occlusion_start.get_or_insert(timestamp_ms);
        if timestamp_ms - start > self.config.grace_ms {
            return OcclusionResult::unavailable();
        }

        let inferred = wrist.point().translate(offset);
        if inferred.distance_to(last_thumb) > self.config.max_inference_distance {
            // Wrist moved too far for the cached offset to be trusted
            return OcclusionResult::unavailable();
        }

        OcclusionResult {
            inferred_thumb: Some(inferred),
            thumb_occluded: true,
            hand_lost: false,
        }
    }

    /// Whether a wrist→thumb offset is currently cached
    pub fn has_offset(&self) -> bool {
        self.memory.offset.is_some()
    }

    pub fn last_wrist(&self) -> Option<Point> {
        self.memory.last_wrist
    }

    pub fn reset(&mut self) {
        self.memory = OcclusionMemory::default();
    }
}

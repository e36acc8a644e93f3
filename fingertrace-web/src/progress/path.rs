//! Target paths and polyline projection
//!
//! Paths are authored in normalized coordinates. Projection happens in pixel
//! space so tolerances measured in pixels stay round on non-square canvases.

use serde::{Deserialize, Serialize};

use crate::landmarks::Point;

/// Segments shorter than this (pixels) are skipped
const MIN_SEGMENT_PX: f32 = 1e-3;

fn default_tolerance_px() -> f32 {
    24.0
}

fn default_completion_percent() -> f32 {
    0.82
}

/// A path to trace, as authored in level data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TracingPath {
    pub id: String,
    pub points: Vec<Point>,
    #[serde(default = "default_tolerance_px")]
    pub tolerance_px: f32,
    /// Progress fraction that counts as finished
    #[serde(default = "default_completion_percent")]
    pub completion_percent: f32,
    /// 0 = no magnetic assist, 1 = full pull onto the path
    #[serde(default)]
    pub assist_strength: f32,
}

impl TracingPath {
    pub fn new(id: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            points,
            tolerance_px: default_tolerance_px(),
            completion_percent: default_completion_percent(),
            assist_strength: 0.0,
        }
    }

    pub fn with_tolerance(mut self, tolerance_px: f32) -> Self {
        self.tolerance_px = tolerance_px;
        self
    }

    pub fn with_assist(mut self, strength: f32) -> Self {
        self.assist_strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_unlock_threshold() -> usize {
    3
}

/// Ordered group of paths; finishing enough of them unlocks the next pack
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathPack {
    pub id: u32,
    pub paths: Vec<TracingPath>,
    /// Distinct completed paths needed to unlock pack `id + 1`
    #[serde(default = "default_unlock_threshold")]
    pub unlock_threshold: usize,
}

impl PathPack {
    pub fn contains(&self, path_id: &str) -> bool {
        self.paths.iter().any(|p| p.id == path_id)
    }
}

/// Closest point on the path to a query point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Foot of the perpendicular, normalized
    pub point: Point,
    /// Perpendicular distance in pixels; infinite for degenerate paths
    pub distance_px: f32,
    /// Arc-length fraction of `point` along the whole path
    pub overall_t: f32,
    pub segment: usize,
}

impl Projection {
    fn none(query: Point) -> Self {
        Self {
            point: query,
            distance_px: f32::INFINITY,
            overall_t: 0.0,
            segment: 0,
        }
    }
}

/// Pixel-space polyline with precomputed arc lengths
#[derive(Clone, Debug)]
pub struct PathGeometry {
    points: Vec<(f32, f32)>,
    /// Arc length at the start of each point
    cumulative: Vec<f32>,
    total_length: f32,
    width: f32,
    height: f32,
}

impl PathGeometry {
    pub fn new(points: &[Point], width: f32, height: f32) -> Self {
        let points: Vec<(f32, f32)> = points
            .iter()
            .filter(|p| p.is_finite())
            .map(|p| (p.x * width, p.y * height))
            .collect();

        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                let prev = points[i - 1];
                total += ((p.0 - prev.0).powi(2) + (p.1 - prev.1).powi(2)).sqrt();
            }
            cumulative.push(total);
        }

        if points.len() < 2 || total < MIN_SEGMENT_PX {
            log::warn!(
                "Degenerate tracing path ({} points, {:.1}px long); nothing to trace",
                points.len(),
                total
            );
        }

        Self {
            points,
            cumulative,
            total_length: total,
            width,
            height,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2 || self.total_length < MIN_SEGMENT_PX
    }

    pub fn viewport(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Nearest point on the polyline. Degenerate paths give an infinite distance.
    pub fn project(&self, query: Point) -> Projection {
        if self.is_degenerate() || !query.is_finite() {
            return Projection::none(query);
        }

        let q = (query.x * self.width, query.y * self.height);
        let mut best: Option<(f32, usize, f32, (f32, f32))> = None;

        for i in 0..self.points.len() - 1 {
            let a = self.points[i];
            let b = self.points[i + 1];
            let ab = (b.0 - a.0, b.1 - a.1);
            let len_sq = ab.0 * ab.0 + ab.1 * ab.1;
            if len_sq < MIN_SEGMENT_PX * MIN_SEGMENT_PX {
                continue;
            }

            let t = (((q.0 - a.0) * ab.0 + (q.1 - a.1) * ab.1) / len_sq).clamp(0.0, 1.0);
            let foot = (a.0 + ab.0 * t, a.1 + ab.1 * t);
            let d = ((q.0 - foot.0).powi(2) + (q.1 - foot.1).powi(2)).sqrt();

            if best.map_or(true, |(best_d, ..)| d < best_d) {
                best = Some((d, i, t, foot));
            }
        }

        let Some((distance, segment, t, foot)) = best else {
            return Projection::none(query);
        };

        let segment_len = self.cumulative[segment + 1] - self.cumulative[segment];
        let arc = self.cumulative[segment] + t * segment_len;

        Projection {
            point: Point::new(foot.0 / self.width, foot.1 / self.height),
            distance_px: distance,
            overall_t: (arc / self.total_length).clamp(0.0, 1.0),
            segment,
        }
    }

    /// Normalized position at arc-length fraction `t`
    pub fn point_at(&self, t: f32) -> Option<Point> {
        if self.is_degenerate() {
            return None;
        }
        let target = t.clamp(0.0, 1.0) * self.total_length;
        let i = match self.cumulative.iter().position(|&c| c >= target) {
            Some(0) => return Some(Point::new(self.points[0].0 / self.width, self.points[0].1 / self.height)),
            Some(i) => i,
            None => self.points.len() - 1,
        };
        let span = self.cumulative[i] - self.cumulative[i - 1];
        let local = if span > 0.0 {
            (target - self.cumulative[i - 1]) / span
        } else {
            0.0
        };
        let a = self.points[i - 1];
        let b = self.points[i];
        Some(Point::new(
            (a.0 + (b.0 - a.0) * local) / self.width,
            (a.1 + (b.1 - a.1) * local) / self.height,
        ))
    }
}

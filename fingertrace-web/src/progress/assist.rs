//! Magnetic assist - pulls a point near the path toward it
//!
//! The pull fades linearly from `strength` at the path to zero at the edge
//! of the assist radius, so points far away are left alone.

use super::path::Projection;
use crate::landmarks::Point;

pub fn apply_assist(point: Point, nearest: &Projection, strength: f32, radius_px: f32) -> Point {
    if strength <= 0.0 || radius_px <= 0.0 || !nearest.distance_px.is_finite() {
        return point;
    }
    if nearest.distance_px >= radius_px {
        return point;
    }

    let falloff = 1.0 - nearest.distance_px / radius_px;
    point.lerp(nearest.point, (strength * falloff).clamp(0.0, 1.0))
}

//! Physics module - filtering, prediction and occlusion recovery
//!
//! Re-exports only. All logic in submodules.

mod one_euro;
mod kalman;
mod position_filter;
mod occlusion;
mod velocity;

pub use one_euro::{OneEuroFilter, OneEuroFilter2D};
pub use kalman::KalmanFilter;
pub use position_filter::PositionFilter;
pub use occlusion::{OcclusionRecovery, OcclusionResult};
pub use velocity::{VelocityTracker, VELOCITY_WINDOW_MS, DEAD_ZONE};

//! Fingertrace - fingertip pen tracking for guided tracing
//!
//! Entry point for WASM module. Only contains:
//! - Module declarations
//! - wasm_bindgen entry points that delegate to submodules

mod bridge;
pub mod config;
pub mod error;
pub mod gesture;
pub mod landmarks;
pub mod performance;
pub mod physics;
pub mod progress;
pub mod tracker;

use wasm_bindgen::prelude::*;

pub use bridge::{FingerTracer, ResolutionGovernor};
pub use config::{FilterProfile, HandPreference, TrackerConfig};
pub use error::{ConfigError, StoreError};
pub use landmarks::{HandLandmarks, Landmark, LandmarkFrame, Point};
pub use tracker::{FingerTracker, TrackerOutput};

// ============================================================================
// WASM ENTRY POINTS
// ============================================================================

/// Called automatically when WASM module loads
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    bridge::init_logging(log::LevelFilter::Info);
}

/// Switch console verbosity: "error", "warn", "info", "debug" or "trace"
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    let filter = level.parse().unwrap_or(log::LevelFilter::Info);
    bridge::init_logging(filter);
}

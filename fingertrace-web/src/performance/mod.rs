//! Performance module - detector resolution governed by throughput
//!
//! Re-exports only. All logic in submodules.

mod resolution;

pub use resolution::{
    PerformanceSample, PerformanceSnapshot, Resolution, ResolutionChange, ResolutionController,
    ScaleDirection,
};

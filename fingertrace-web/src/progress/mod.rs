//! Progress module - guided path tracing and long-term progression
//!
//! Re-exports only. All logic in submodules.

mod assist;
mod path;
mod session;
mod store;

pub use assist::apply_assist;
pub use path::{PathGeometry, PathPack, Projection, TracingPath};
pub use session::{AttemptSummary, Hint, TraceInput, TraceTick, TracingSession};
pub use store::{MemoryStore, ProgressRecord, ProgressStore, Progression};

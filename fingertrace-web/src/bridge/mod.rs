//! Bridge module - JS ↔ Rust communication
//!
//! All #[wasm_bindgen] entry points live here.
//! Re-exports only in mod.rs, logic in submodules.

mod console_log;
mod governor;
mod tracer;

pub use console_log::init_logging;
pub use governor::ResolutionGovernor;
pub use tracer::FingerTracer;

// The generative core: roles, scales, pattern packs and the per-track engine.

mod engine;
pub mod pack;
mod role;
pub mod scale;

pub use engine::{PatternEngine, TrackConfig, MAX_ROOT, MIN_ROOT};
pub use role::Role;

//! Core data models for zone completion tracking.

mod catalog;
mod ids;
mod stats;
mod tier;
mod zone;

pub use catalog::*;
pub use ids::*;
pub use stats::*;
pub use tier::*;
pub use zone::*;

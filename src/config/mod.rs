//! # Engine Configuration
//!
//! Centralizes the engine's tuning constants. Constants with
//! interdependencies are co-located and guarded by compile-time assertions
//! so a change to one cannot silently invalidate another.

pub mod constants;
pub use constants::*;

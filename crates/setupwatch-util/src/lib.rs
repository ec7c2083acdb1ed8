//! Shared utilities for setupwatch
//!
//! This crate provides:
//! - ID types (HostId, CycleId)
//! - Time utilities (monotonic cycle timing, wall-clock formatting)
//! - Default paths for config and report files

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;

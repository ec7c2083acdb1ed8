//! Snapshot types shared across setupwatch crates
//!
//! This crate defines the data produced by one poll cycle:
//! - Classification values (occupancy, idle bucket, resolved user)
//! - Outlet port states
//! - Per-host and fleet-wide snapshots

mod snapshot;
mod types;

pub use snapshot::*;
pub use types::*;

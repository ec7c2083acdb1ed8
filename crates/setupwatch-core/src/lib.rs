//! Core poll engine for setupwatchd
//!
//! This crate is the heart of setupwatchd, containing:
//! - Remote session probing (reachability, session listing, client name)
//! - Classification of session text into occupancy, idle bucket and user
//! - The pure power-off decision
//! - The per-host poll cycle (the failure boundary for one host)
//! - The fleet scheduler (Idle -> Polling -> Idle, bounded fan-out, ordered join)

mod classifier;
mod decision;
mod outlets;
mod poll;
mod prober;
mod scheduler;

pub use classifier::*;
pub use decision::*;
pub use outlets::*;
pub use poll::*;
pub use prober::*;
pub use scheduler::*;

//! Capability interfaces for setupwatch
//!
//! This crate defines the seams between the polling core and the outside
//! world: reachability probing, remote command execution on workstations,
//! and switched-outlet control. It contains no network code itself.

mod mock;
mod target;
mod traits;

pub use mock::*;
pub use target::*;
pub use traits::*;

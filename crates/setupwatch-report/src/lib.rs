//! Report publication for setupwatch
//!
//! Provides:
//! - The `ReportSink` seam the fleet scheduler publishes through
//! - An HTML file sink (whole-file replacement, browser auto-refresh)
//! - An in-memory sink for tests and embedding

mod html;
mod memory;
mod traits;

pub use html::*;
pub use memory::*;
pub use traits::*;

use thiserror::Error;

/// Report errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid report path: {0}")]
    InvalidPath(String),
}

pub type ReportResult<T> = Result<T, ReportError>;

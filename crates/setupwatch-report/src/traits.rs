//! Report sink trait

use setupwatch_api::FleetSnapshot;

use crate::ReportResult;

/// Receives one complete fleet snapshot per cycle.
///
/// Each call fully replaces whatever the previous call published.
pub trait ReportSink: Send + Sync {
    fn publish(&self, snapshot: &FleetSnapshot) -> ReportResult<()>;
}

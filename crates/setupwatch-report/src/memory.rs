//! In-memory report sink

use setupwatch_api::FleetSnapshot;
use std::sync::Mutex;

use crate::{ReportResult, ReportSink};

/// Keeps every published snapshot in memory
#[derive(Default)]
pub struct MemorySink {
    published: Mutex<Vec<FleetSnapshot>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot, if any
    pub fn latest(&self) -> Option<FleetSnapshot> {
        self.lock().last().cloned()
    }

    /// All snapshots in publication order
    pub fn history(&self) -> Vec<FleetSnapshot> {
        self.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FleetSnapshot>> {
        // A panic while holding the lock cannot leave the Vec half-written
        self.published.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReportSink for MemorySink {
    fn publish(&self, snapshot: &FleetSnapshot) -> ReportResult<()> {
        self.lock().push(snapshot.clone());
        Ok(())
    }
}

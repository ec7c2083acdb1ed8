//! Fleet scheduler

use setupwatch_api::{FleetSnapshot, HostSnapshot};
use setupwatch_report::ReportSink;
use setupwatch_util::{CycleId, MonotonicInstant};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::HostPoller;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Between cycles
    Idle,
    /// Fan-out in progress
    Polling,
}

/// Runs one poll per host per cycle and publishes the ordered result.
///
/// The current [`HostPoller`] is read from a watch channel at the start of
/// every cycle, so a reload takes effect on the next cycle and never in the
/// middle of one.
pub struct FleetScheduler {
    poller: watch::Receiver<Arc<HostPoller>>,
    sink: Arc<dyn ReportSink>,
    state: SchedulerState,
    cycles: u64,
}

impl FleetScheduler {
    pub fn new(poller: watch::Receiver<Arc<HostPoller>>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            poller,
            sink,
            state: SchedulerState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Number of completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run one complete cycle: fan out, join every host, publish.
    pub async fn run_cycle(&mut self) -> FleetSnapshot {
        let poller = self.poller.borrow_and_update().clone();
        let cycle_id = CycleId::new();
        let started_at = setupwatch_util::now();
        let started_mono = MonotonicInstant::now();

        self.state = SchedulerState::Polling;

        let hosts = poll_fleet(&poller).await;

        let snapshot = FleetSnapshot {
            cycle_id,
            started_at,
            elapsed: started_mono.elapsed(),
            hosts,
        };

        for host in &snapshot.hosts {
            let ports: Vec<String> = host.ports.iter().map(|p| p.to_string()).collect();
            debug!(
                cycle_id = %snapshot.cycle_id,
                host = %host.host,
                user = %host.user,
                idle = %host.idle,
                ports = ?ports,
                fault = ?host.fault,
                "Host polled"
            );
        }

        // Sinks write files, so keep them off the runtime threads
        let sink = self.sink.clone();
        let published = snapshot.clone();
        match tokio::task::spawn_blocking(move || sink.publish(&published)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(cycle_id = %snapshot.cycle_id, error = %e, "Failed to publish report");
            }
            Err(e) => {
                error!(cycle_id = %snapshot.cycle_id, error = %e, "Report publish task failed");
            }
        }

        info!(
            cycle_id = %snapshot.cycle_id,
            hosts = snapshot.len(),
            offline = snapshot.offline_count(),
            power_offs = snapshot.power_off_count(),
            elapsed_ms = snapshot.elapsed.as_millis() as u64,
            "Poll cycle complete"
        );

        self.state = SchedulerState::Idle;
        self.cycles += 1;
        snapshot
    }

    /// Cycle forever, sleeping the configured period after each cycle,
    /// until `shutdown` changes or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Fleet scheduler running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = self.run_cycle() => {}
            }

            let period = self.poller.borrow().fleet().service.period;
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        info!(cycles = self.cycles, "Fleet scheduler stopped");
    }
}

/// Handles of one cycle's poll tasks, aborted if the cycle is dropped
/// before they are joined
struct PollTasks(Vec<JoinHandle<HostSnapshot>>);

impl Drop for PollTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Poll every host of the fleet on a bounded pool and return the
/// snapshots in configuration order.
async fn poll_fleet(poller: &Arc<HostPoller>) -> Vec<HostSnapshot> {
    let fleet = poller.fleet().clone();
    let permits = Arc::new(Semaphore::new(fleet.service.max_concurrent_polls.max(1)));
    let mut tasks = PollTasks(Vec::with_capacity(fleet.hosts.len()));

    for index in 0..fleet.hosts.len() {
        // Waiting here bounds the number of live poll tasks
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let poller = poller.clone();

        tasks.0.push(tokio::spawn(async move {
            let _permit = permit;
            let host = &poller.fleet().hosts[index];
            poller.poll_host(host).await
        }));
    }

    // Each handle owns the slot of its configuration index
    let mut slots = Vec::with_capacity(fleet.hosts.len());
    for (index, handle) in tasks.0.iter_mut().enumerate() {
        let snapshot = match handle.await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let host = &fleet.hosts[index];
                warn!(host = %host.id, error = %e, "Poll task failed");
                poller.aborted(host)
            }
        };
        slots.push(snapshot);
    }

    slots
}

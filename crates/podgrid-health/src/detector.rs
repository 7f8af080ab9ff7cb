//! Failure detector — background task that sweeps for stale nodes.

use std::sync::Arc;
use std::time::Duration;

use podgrid_state::{Clock, StateError, StateStore};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::sweep::{SweepReport, sweep};

/// A node silent for longer than this is considered failed.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(10);

/// How often the detector sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest sweep period the detector accepts.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically marks stale nodes Unhealthy and rebalances their pods.
pub struct FailureDetector {
    state: StateStore,
    clock: Arc<dyn Clock>,
    stale_threshold: Duration,
    interval: Duration,
}

impl FailureDetector {
    pub fn new(state: StateStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            clock,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set how long a node may go without heartbeating.
    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    /// Set the sweep period. Periods below [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_SWEEP_INTERVAL {
            warn!(requested_ms = interval.as_millis() as u64, "sweep interval too short, clamping");
        }
        self.interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    pub fn stale_threshold(&self) -> Duration {
        self.stale_threshold
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep now, as a single transaction.
    pub fn sweep_once(&self) -> Result<SweepReport, StateError> {
        let now_ms = self.clock.now_ms();
        let threshold_ms = self.stale_threshold.as_millis() as u64;
        let report = self
            .state
            .apply(|cluster| sweep(cluster, now_ms, threshold_ms))?;

        if !report.is_empty() {
            info!(
                failed = report.failed_nodes.len(),
                relocated = report.relocated.len(),
                unscheduled = report.unscheduled.len(),
                "failure sweep rebalanced cluster"
            );
        }
        Ok(report)
    }

    /// Sweep every interval until `shutdown` flips.
    ///
    /// Sweep errors are logged and the loop carries on with the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            stale_threshold_ms = self.stale_threshold.as_millis() as u64,
            "failure detector started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once() {
                        Ok(report) if report.is_empty() => debug!("failure sweep found no stale nodes"),
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "failure sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("failure detector shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_state::{ManualClock, Node, NodeStatus, PodStatus};

    fn setup() -> (StateStore, Arc<ManualClock>, FailureDetector) {
        let state = StateStore::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let detector = FailureDetector::new(state.clone(), clock.clone());
        (state, clock, detector)
    }

    fn add_node(state: &StateStore, id: &str, capacity: u32, now_ms: u64) {
        state
            .apply(|c| {
                c.insert_node(Node::new(id, capacity, now_ms));
                Ok::<_, StateError>(())
            })
            .unwrap();
    }

    #[test]
    fn defaults() {
        let (_, _, detector) = setup();
        assert_eq!(detector.stale_threshold(), Duration::from_secs(10));
        assert_eq!(detector.interval(), Duration::from_secs(5));

        let detector = detector
            .with_stale_threshold(Duration::from_millis(300))
            .with_interval(Duration::from_millis(100));
        assert_eq!(detector.stale_threshold(), Duration::from_millis(300));
        assert_eq!(detector.interval(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn zero_interval_is_clamped_and_loop_still_runs() {
        let (state, clock, detector) = setup();
        let detector = detector.with_interval(Duration::ZERO);
        assert_eq!(detector.interval(), MIN_SWEEP_INTERVAL);

        add_node(&state, "n1", 4, 0);
        clock.set(60_000);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { detector.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        let joined = handle.await;
        assert!(joined.is_ok(), "detector task panicked");

        let snap = state.snapshot().unwrap();
        assert_eq!(snap.node("n1").unwrap().status, NodeStatus::Unhealthy);
    }

    #[test]
    fn sweep_once_persists_failover() {
        let (state, clock, detector) = setup();
        add_node(&state, "n1", 4, 0);
        add_node(&state, "n2", 4, 0);
        state
            .apply(|c| c.place_pod("p1", 2, "n1"))
            .unwrap();

        // n2 keeps heartbeating, n1 goes silent.
        clock.advance(Duration::from_secs(11));
        state
            .apply(|c| {
                if let Some(n) = c.node_mut("n2") {
                    n.last_heartbeat = 11_000;
                }
                Ok::<_, StateError>(())
            })
            .unwrap();

        let report = detector.sweep_once().unwrap();
        assert_eq!(report.failed_nodes, vec!["n1".to_string()]);

        let snap = state.snapshot().unwrap();
        assert_eq!(snap.node("n1").unwrap().status, NodeStatus::Unhealthy);
        assert!(snap.node("n1").unwrap().placements.is_empty());
        assert_eq!(snap.pod("p1").unwrap().assigned_node.as_deref(), Some("n2"));
        assert_eq!(snap.pod("p1").unwrap().status, PodStatus::Running);
    }

    #[test]
    fn recovered_node_is_not_reflagged_within_threshold() {
        let (state, clock, detector) = setup();
        add_node(&state, "n1", 4, 0);

        clock.set(20_000);
        assert_eq!(detector.sweep_once().unwrap().failed_nodes.len(), 1);

        // Heartbeat brings it back.
        state
            .apply(|c| {
                if let Some(n) = c.node_mut("n1") {
                    n.status = NodeStatus::Healthy;
                    n.last_heartbeat = 20_000;
                }
                Ok::<_, StateError>(())
            })
            .unwrap();

        clock.set(25_000);
        assert!(detector.sweep_once().unwrap().is_empty());
        assert!(state.snapshot().unwrap().node("n1").unwrap().is_healthy());
    }

    #[tokio::test]
    async fn run_loop_sweeps_and_stops() {
        let (state, clock, detector) = setup();
        let detector = detector.with_interval(Duration::from_millis(20));
        add_node(&state, "n1", 4, 0);
        clock.set(60_000);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { detector.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let snap = state.snapshot().unwrap();
        assert_eq!(snap.node("n1").unwrap().status, NodeStatus::Unhealthy);
    }
}

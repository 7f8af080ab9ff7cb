//! Cluster manager — node lifecycle and heartbeat ingestion.
//!
//! Pod scheduling lives in [`crate::scheduler`] as a second `impl` block on
//! the same type.

use std::sync::Arc;

use podgrid_placement::{Evacuation, Policies, evacuate_node};
use podgrid_state::{Clock, ClusterState, Node, NodeStatus, StateStore, SystemClock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ClusterError, ClusterResult};
use crate::launcher::AgentLauncher;
use crate::views::NodeView;

/// Owns every cluster mutation.
pub struct ClusterManager {
    pub(crate) state: StateStore,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) launcher: Arc<dyn AgentLauncher>,
    pub(crate) policies: Policies,
    callback_address: String,
}

impl ClusterManager {
    /// Create a manager. `callback_address` is the base URL agents heartbeat to.
    pub fn new(
        state: StateStore,
        launcher: Arc<dyn AgentLauncher>,
        callback_address: impl Into<String>,
    ) -> Self {
        Self {
            state,
            clock: Arc::new(SystemClock),
            launcher,
            policies: Policies::new(),
            callback_address: callback_address.into(),
        }
    }

    /// Use a different time source (tests drive a `ManualClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn callback_address(&self) -> &str {
        &self.callback_address
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Register a new node and start its agent.
    ///
    /// The node is committed first and the launcher runs outside the
    /// transaction. If the launch fails the node is removed again, whatever
    /// the launcher left running is terminated, and `LaunchFailed` is returned.
    pub async fn create_node(&self, capacity: i64) -> ClusterResult<NodeView> {
        let capacity = positive_units("capacity", capacity)?;
        let node = Node::new(Uuid::new_v4().to_string(), capacity, self.clock.now_ms());
        let node_id = node.id.clone();

        self.state.apply(|cluster| {
            cluster.insert_node(node.clone());
            Ok::<_, ClusterError>(())
        })?;
        info!(%node_id, capacity, "node created");

        if let Err(source) = self
            .launcher
            .launch(&node_id, &self.callback_address)
            .await
        {
            error!(%node_id, launcher = self.launcher.name(), error = %source, "agent launch failed, removing node");
            if let Err(e) = self.state.apply(|cluster| detach_node(cluster, &node_id)) {
                error!(%node_id, error = %e, "failed to roll back node after launch failure");
            }
            // A timed-out launch may still have left an agent behind.
            if let Err(e) = self.launcher.terminate(&node_id).await {
                warn!(%node_id, launcher = self.launcher.name(), error = %e, "failed to clean up agent after launch failure");
            }
            return Err(ClusterError::LaunchFailed { node_id, source });
        }

        Ok(NodeView::from(&node))
    }

    /// Remove a node. Its pods become Unscheduled; they are not deleted.
    ///
    /// The node's agent is terminated afterwards on a best-effort basis.
    pub async fn delete_node(&self, node_id: &str) -> ClusterResult<()> {
        let orphaned = self
            .state
            .apply(|cluster| detach_node(cluster, node_id))?;
        info!(%node_id, orphaned, "node deleted");

        if let Err(e) = self.launcher.terminate(node_id).await {
            warn!(%node_id, launcher = self.launcher.name(), error = %e, "failed to terminate agent");
        }
        Ok(())
    }

    /// Mark a node Unhealthy and move its pods elsewhere right away.
    pub fn stop_node(&self, node_id: &str) -> ClusterResult<Evacuation> {
        let evacuation = self.state.apply(|cluster| {
            let node = cluster
                .node_mut(node_id)
                .ok_or_else(|| ClusterError::NodeNotFound(node_id.to_string()))?;
            node.status = NodeStatus::Unhealthy;
            Ok::<_, ClusterError>(evacuate_node(cluster, node_id)?)
        })?;

        info!(
            %node_id,
            relocated = evacuation.relocated.len(),
            unscheduled = evacuation.unscheduled.len(),
            "node stopped"
        );
        Ok(evacuation)
    }

    /// Mark a node Healthy and refresh its heartbeat.
    pub fn start_node(&self, node_id: &str) -> ClusterResult<()> {
        let now_ms = self.clock.now_ms();
        self.state.apply(|cluster| {
            let node = cluster
                .node_mut(node_id)
                .ok_or_else(|| ClusterError::NodeNotFound(node_id.to_string()))?;
            node.status = NodeStatus::Healthy;
            node.last_heartbeat = now_ms;
            Ok::<_, ClusterError>(())
        })?;
        info!(%node_id, "node started");
        Ok(())
    }

    /// Record a heartbeat: the node is alive as of now.
    ///
    /// An Unhealthy node becomes Healthy again. Its old pods are not
    /// moved back.
    pub fn heartbeat(&self, node_id: &str) -> ClusterResult<()> {
        let now_ms = self.clock.now_ms();
        let previous = self.state.apply(|cluster| {
            let node = cluster
                .node_mut(node_id)
                .ok_or_else(|| ClusterError::NodeNotFound(node_id.to_string()))?;
            let previous = node.status;
            node.status = NodeStatus::Healthy;
            node.last_heartbeat = now_ms;
            Ok::<_, ClusterError>(previous)
        });

        match &previous {
            Ok(NodeStatus::Unhealthy) => info!(%node_id, "node recovered"),
            Ok(NodeStatus::Healthy) => debug!(%node_id, "heartbeat received"),
            Err(ClusterError::NodeNotFound(_)) => warn!(%node_id, "heartbeat from unknown node"),
            Err(_) => {}
        }
        previous.map(|_| ())
    }

    /// Every node, ordered by id.
    pub fn list_nodes(&self) -> ClusterResult<Vec<NodeView>> {
        let snapshot = self.state.snapshot()?;
        Ok(snapshot.nodes().map(NodeView::from).collect())
    }

    pub fn get_node(&self, node_id: &str) -> ClusterResult<NodeView> {
        let snapshot = self.state.snapshot()?;
        snapshot
            .node(node_id)
            .map(NodeView::from)
            .ok_or_else(|| ClusterError::NodeNotFound(node_id.to_string()))
    }
}

/// Remove `node_id` and mark every pod that pointed at it Unscheduled.
/// Returns how many pods were detached.
fn detach_node(cluster: &mut ClusterState, node_id: &str) -> ClusterResult<usize> {
    let node = cluster
        .remove_node(node_id)
        .ok_or_else(|| ClusterError::NodeNotFound(node_id.to_string()))?;

    let orphans: Vec<(String, u32)> = cluster
        .pods()
        .filter(|p| p.assigned_node.as_deref() == Some(node.id.as_str()))
        .map(|p| (p.id.clone(), p.cpu_request))
        .collect();
    for (pod_id, cpu) in &orphans {
        cluster.unschedule_pod(pod_id, *cpu);
    }
    Ok(orphans.len())
}

/// Validate a caller-supplied resource amount.
pub(crate) fn positive_units(field: &str, value: i64) -> ClusterResult<u32> {
    if value <= 0 {
        return Err(ClusterError::InvalidRequest(format!(
            "{field} must be positive, got {value}"
        )));
    }
    u32::try_from(value)
        .map_err(|_| ClusterError::InvalidRequest(format!("{field} is too large: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{LaunchError, LaunchFuture, NoopLauncher};
    use podgrid_state::{ManualClock, NodeId, PodStatus};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<String>>,
        terminated: Mutex<Vec<String>>,
    }

    impl AgentLauncher for RecordingLauncher {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn launch<'a>(&'a self, node_id: &'a str, _cb: &'a str) -> LaunchFuture<'a> {
            self.launched.lock().unwrap().push(node_id.to_string());
            Box::pin(async { Ok(()) })
        }

        fn terminate<'a>(&'a self, node_id: &'a str) -> LaunchFuture<'a> {
            self.terminated.lock().unwrap().push(node_id.to_string());
            Box::pin(async { Ok(()) })
        }
    }

    #[derive(Default)]
    struct FailingLauncher {
        terminated: Mutex<Vec<String>>,
    }

    impl AgentLauncher for FailingLauncher {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn launch<'a>(&'a self, _node_id: &'a str, _cb: &'a str) -> LaunchFuture<'a> {
            Box::pin(async {
                Err(LaunchError::Timeout {
                    program: "docker".to_string(),
                    timeout: Duration::from_secs(30),
                })
            })
        }

        fn terminate<'a>(&'a self, node_id: &'a str) -> LaunchFuture<'a> {
            self.terminated.lock().unwrap().push(node_id.to_string());
            Box::pin(async { Ok(()) })
        }
    }

    fn manager_with(launcher: Arc<dyn AgentLauncher>) -> (ClusterManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = ClusterManager::new(
            StateStore::open_in_memory().unwrap(),
            launcher,
            "http://127.0.0.1:8080",
        )
        .with_clock(clock.clone());
        (manager, clock)
    }

    fn manager() -> ClusterManager {
        manager_with(Arc::new(NoopLauncher)).0
    }

    #[tokio::test]
    async fn create_node_lists_with_full_capacity() {
        let manager = manager();
        let view = manager.create_node(4).await.unwrap();

        let nodes = manager.list_nodes().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, view.id);
        assert_eq!(nodes[0].available_capacity, 4);
        assert_eq!(nodes[0].status, NodeStatus::Healthy);
        assert_eq!(nodes[0].last_heartbeat, 1_000);
        assert!(Uuid::parse_str(&view.id).is_ok());
    }

    #[tokio::test]
    async fn create_node_rejects_non_positive_capacity() {
        let manager = manager();
        for bad in [0, -3] {
            assert!(matches!(
                manager.create_node(bad).await,
                Err(ClusterError::InvalidRequest(_))
            ));
        }
        assert!(manager.list_nodes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_node_launches_agent() {
        let launcher = Arc::new(RecordingLauncher::default());
        let (manager, _) = manager_with(launcher.clone());
        let view = manager.create_node(2).await.unwrap();

        assert_eq!(*launcher.launched.lock().unwrap(), vec![view.id]);
    }

    #[tokio::test]
    async fn launch_failure_rolls_back_node_and_cleans_up_agent() {
        let launcher = Arc::new(FailingLauncher::default());
        let (manager, _) = manager_with(launcher.clone());
        let err = manager.create_node(4).await.unwrap_err();

        let ClusterError::LaunchFailed { node_id, .. } = err else {
            panic!("expected LaunchFailed, got {err:?}");
        };
        assert!(manager.list_nodes().unwrap().is_empty());
        assert_eq!(*launcher.terminated.lock().unwrap(), vec![node_id]);
    }

    #[tokio::test]
    async fn delete_node_unschedules_its_pods() {
        let launcher = Arc::new(RecordingLauncher::default());
        let (manager, _) = manager_with(launcher.clone());
        let node = manager.create_node(4).await.unwrap();
        manager.schedule_pod("p1", 2, None).unwrap();

        manager.delete_node(&node.id).await.unwrap();

        assert!(manager.list_nodes().unwrap().is_empty());
        let pods = manager.list_pods().unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].status, PodStatus::Unscheduled);
        assert!(pods[0].node_id.is_none());
        assert_eq!(*launcher.terminated.lock().unwrap(), vec![node.id]);
    }

    #[tokio::test]
    async fn delete_missing_node_is_not_found() {
        let manager = manager();
        assert!(matches!(
            manager.delete_node("nope").await,
            Err(ClusterError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stop_node_evacuates_synchronously() {
        let manager = manager();
        let a = manager.create_node(4).await.unwrap();
        manager.schedule_pod("p1", 2, Some("first_fit")).unwrap();
        let b = manager.create_node(4).await.unwrap();

        // p1 landed on whichever node existed at the time.
        let evac = manager.stop_node(&a.id).unwrap();
        assert_eq!(evac.relocated, vec![("p1".to_string(), b.id.clone())]);

        let stopped = manager.get_node(&a.id).unwrap();
        assert_eq!(stopped.status, NodeStatus::Unhealthy);
        assert!(stopped.placements.is_empty());
        assert_eq!(stopped.available_capacity, 4);
    }

    #[tokio::test]
    async fn start_node_restores_health_and_heartbeat() {
        let (manager, clock) = manager_with(Arc::new(NoopLauncher));
        let node = manager.create_node(4).await.unwrap();
        manager.stop_node(&node.id).unwrap();

        clock.advance(Duration::from_secs(30));
        manager.start_node(&node.id).unwrap();

        let view = manager.get_node(&node.id).unwrap();
        assert_eq!(view.status, NodeStatus::Healthy);
        assert_eq!(view.last_heartbeat, 31_000);
    }

    #[tokio::test]
    async fn heartbeat_revives_unhealthy_node() {
        let (manager, clock) = manager_with(Arc::new(NoopLauncher));
        let node = manager.create_node(4).await.unwrap();
        manager.stop_node(&node.id).unwrap();

        clock.advance(Duration::from_secs(3));
        manager.heartbeat(&node.id).unwrap();

        let view = manager.get_node(&node.id).unwrap();
        assert_eq!(view.status, NodeStatus::Healthy);
        assert_eq!(view.last_heartbeat, 4_000);
    }

    #[test]
    fn node_operations_on_unknown_ids() {
        let manager = manager();
        assert!(matches!(manager.heartbeat("x"), Err(ClusterError::NodeNotFound(_))));
        assert!(matches!(manager.stop_node("x"), Err(ClusterError::NodeNotFound(_))));
        assert!(matches!(manager.start_node("x"), Err(ClusterError::NodeNotFound(_))));
        assert!(matches!(manager.get_node("x"), Err(ClusterError::NodeNotFound(_))));
    }

    #[test]
    fn positive_units_bounds() {
        assert_eq!(positive_units("cpu", 1).unwrap(), 1);
        assert!(positive_units("cpu", 0).is_err());
        assert!(positive_units("cpu", i64::from(u32::MAX) + 1).is_err());
    }

    #[tokio::test]
    async fn node_ids_follow_listing_order() {
        let manager = manager();
        manager.create_node(1).await.unwrap();
        manager.create_node(1).await.unwrap();

        let ids: Vec<NodeId> = manager.list_nodes().unwrap().into_iter().map(|n| n.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}

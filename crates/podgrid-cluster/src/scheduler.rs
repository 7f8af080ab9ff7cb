//! Pod scheduling and removal.

use podgrid_placement::{PolicyKind, place_pod};
use tracing::info;

use crate::error::{ClusterError, ClusterResult};
use crate::manager::{ClusterManager, positive_units};
use crate::views::{PodView, ScheduleOutcome};

impl ClusterManager {
    /// Place a new pod with the named policy (best-fit if `None`).
    ///
    /// Finding no room is not an error: the pod is recorded Unscheduled and
    /// [`ScheduleOutcome::Unscheduled`] is returned. A pod id already in use,
    /// Running or Unscheduled, is rejected with `DuplicatePod`.
    pub fn schedule_pod(
        &self,
        pod_id: &str,
        cpu_request: i64,
        policy: Option<&str>,
    ) -> ClusterResult<ScheduleOutcome> {
        let pod_id = pod_id.trim();
        if pod_id.is_empty() {
            return Err(ClusterError::InvalidRequest("pod_id must not be empty".to_string()));
        }
        let cpu_request = positive_units("cpu_request", cpu_request)?;
        let kind = match policy {
            Some(name) => name
                .parse::<PolicyKind>()
                .map_err(|e| ClusterError::InvalidRequest(e.to_string()))?,
            None => PolicyKind::default(),
        };
        let policy = self.policies.get(kind);

        let chosen = self.state.apply(|cluster| {
            if cluster.contains_pod(pod_id) {
                return Err(ClusterError::DuplicatePod(pod_id.to_string()));
            }
            Ok(place_pod(cluster, pod_id, cpu_request, policy)?)
        })?;

        let outcome = match chosen {
            Some(node_id) => {
                info!(%pod_id, %node_id, cpu_request, policy = %kind, "pod scheduled");
                ScheduleOutcome::Scheduled {
                    pod_id: pod_id.to_string(),
                    node_id,
                }
            }
            None => {
                info!(%pod_id, cpu_request, policy = %kind, "pod unscheduled, no capacity");
                ScheduleOutcome::Unscheduled {
                    pod_id: pod_id.to_string(),
                }
            }
        };
        Ok(outcome)
    }

    /// Remove a pod and release its capacity.
    pub fn delete_pod(&self, pod_id: &str) -> ClusterResult<()> {
        let removed = self.state.apply(|cluster| {
            cluster
                .remove_pod(pod_id)
                .ok_or_else(|| ClusterError::PodNotFound(pod_id.to_string()))
        })?;
        info!(%pod_id, node_id = ?removed.assigned_node, "pod deleted");
        Ok(())
    }

    /// Every pod, ordered by id.
    pub fn list_pods(&self) -> ClusterResult<Vec<PodView>> {
        let snapshot = self.state.snapshot()?;
        Ok(snapshot.pods().map(PodView::from).collect())
    }
}

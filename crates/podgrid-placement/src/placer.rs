//! Placement engine — applies policy decisions to cluster state.
//!
//! Both functions run inside a [`podgrid_state::StateStore::apply`]
//! transaction; they mutate the `ClusterState` they are given and leave
//! persistence to the caller.
//! 1. [`place_pod`] schedules one pod with a chosen policy
//! 2. [`evacuate_node`] re-places every pod of a failed node with best-fit

use podgrid_state::{ClusterState, NodeId, PodId, StateResult};
use tracing::{debug, info, warn};

use crate::policy::{BestFit, PlacementPolicy};
use crate::scorer::eligible_nodes;

/// Place `pod_id` using `policy`, or record it Unscheduled.
///
/// Returns the chosen node, or `None` if no healthy node had room. Either
/// way the pod record exists afterwards.
pub fn place_pod(
    state: &mut ClusterState,
    pod_id: &str,
    cpu_request: u32,
    policy: &dyn PlacementPolicy,
) -> StateResult<Option<NodeId>> {
    let eligible = eligible_nodes(state, cpu_request, None);
    match policy.select(&eligible, cpu_request) {
        Some(node_id) => {
            state.place_pod(pod_id, cpu_request, &node_id)?;
            debug!(%pod_id, %node_id, cpu_request, policy = policy.name(), "pod placed");
            Ok(Some(node_id))
        }
        None => {
            state.unschedule_pod(pod_id, cpu_request);
            info!(
                %pod_id,
                cpu_request,
                candidates = eligible.len(),
                "no node has capacity, pod left unscheduled"
            );
            Ok(None)
        }
    }
}

/// Outcome of evacuating one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evacuation {
    /// Pods moved elsewhere: (pod, new node).
    pub relocated: Vec<(PodId, NodeId)>,
    /// Pods that found no room and are now Unscheduled.
    pub unscheduled: Vec<PodId>,
}

impl Evacuation {
    pub fn is_empty(&self) -> bool {
        self.relocated.is_empty() && self.unscheduled.is_empty()
    }
}

/// Move every pod off `node_id`, then clear its placement list.
///
/// Each pod is re-placed with best-fit among the *other* healthy nodes, in
/// the order it was placed. A pod that fits nowhere becomes Unscheduled;
/// that never stops the remaining pods from being processed.
pub fn evacuate_node(state: &mut ClusterState, node_id: &str) -> StateResult<Evacuation> {
    let placements = match state.node(node_id) {
        Some(node) => node.placements.clone(),
        None => return Ok(Evacuation::default()),
    };

    let mut evacuation = Evacuation::default();
    for placement in placements {
        let pod_id = placement.pod_id;
        let cpu = placement.cpu_units;
        let eligible = eligible_nodes(state, cpu, Some(node_id));

        match BestFit.select(&eligible, cpu) {
            Some(target) => {
                state.place_pod(&pod_id, cpu, &target)?;
                info!(%pod_id, from = %node_id, to = %target, "pod rescheduled");
                evacuation.relocated.push((pod_id, target));
            }
            None => {
                state.unschedule_pod(&pod_id, cpu);
                warn!(%pod_id, from = %node_id, cpu, "pod could not be rescheduled");
                evacuation.unscheduled.push(pod_id);
            }
        }
    }

    if let Some(node) = state.node_mut(node_id) {
        node.placements.clear();
    }
    Ok(evacuation)
}

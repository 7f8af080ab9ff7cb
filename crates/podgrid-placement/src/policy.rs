//! Placement policies.
//!
//! A policy picks one node out of a list of eligible candidates. The
//! candidates handed to [`PlacementPolicy::select`] are already filtered
//! (healthy, enough free capacity) and ordered by node id, so policies only
//! rank. Every built-in policy breaks ties towards the lowest node id.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use podgrid_state::NodeId;

use crate::scorer::NodeResources;

/// Chooses a node for a pod among eligible candidates.
pub trait PlacementPolicy: Send + Sync {
    /// Stable policy name, as accepted by [`PolicyKind::from_str`].
    fn name(&self) -> &'static str;

    /// Pick a node from `eligible` (non-empty not guaranteed, ordered by id).
    fn select(&self, eligible: &[NodeResources], cpu_request: u32) -> Option<NodeId>;
}

/// Minimize leftover capacity on the chosen node.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestFit;

impl PlacementPolicy for BestFit {
    fn name(&self) -> &'static str {
        "best_fit"
    }

    fn select(&self, eligible: &[NodeResources], cpu_request: u32) -> Option<NodeId> {
        eligible
            .iter()
            .min_by(|a, b| {
                a.leftover(cpu_request)
                    .cmp(&b.leftover(cpu_request))
                    .then_with(|| a.node_id.cmp(&b.node_id))
            })
            .map(|n| n.node_id.clone())
    }
}

/// Maximize leftover capacity, spreading load.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorstFit;

impl PlacementPolicy for WorstFit {
    fn name(&self) -> &'static str {
        "worst_fit"
    }

    fn select(&self, eligible: &[NodeResources], cpu_request: u32) -> Option<NodeId> {
        eligible
            .iter()
            .min_by(|a, b| {
                b.leftover(cpu_request)
                    .cmp(&a.leftover(cpu_request))
                    .then_with(|| a.node_id.cmp(&b.node_id))
            })
            .map(|n| n.node_id.clone())
    }
}

/// Lowest node id that fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl PlacementPolicy for FirstFit {
    fn name(&self) -> &'static str {
        "first_fit"
    }

    fn select(&self, eligible: &[NodeResources], _cpu_request: u32) -> Option<NodeId> {
        eligible
            .iter()
            .min_by(|a, b| a.node_id.cmp(&b.node_id))
            .map(|n| n.node_id.clone())
    }
}

/// Rotate through eligible nodes in id order.
///
/// Remembers the last node it chose and picks the next eligible id after
/// it, wrapping around. Nodes joining or leaving don't reset the rotation.
#[derive(Debug, Default)]
pub struct RoundRobin {
    last: Mutex<Option<NodeId>>,
}

impl PlacementPolicy for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&self, eligible: &[NodeResources], _cpu_request: u32) -> Option<NodeId> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sorted: Vec<&NodeResources> = eligible.iter().collect();
        sorted.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        let next = match last.as_deref() {
            Some(prev) => sorted
                .iter()
                .find(|n| n.node_id.as_str().cmp(prev) == Ordering::Greater)
                .or_else(|| sorted.first()),
            None => sorted.first(),
        }?;

        *last = Some(next.node_id.clone());
        Some(next.node_id.clone())
    }
}

// ── Policy selection ──────────────────────────────────────────────

/// The built-in policies, selectable by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    #[default]
    BestFit,
    WorstFit,
    FirstFit,
    RoundRobin,
}

/// Returned when a policy name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown placement policy: {0}")]
pub struct UnknownPolicy(pub String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "best_fit" => Ok(Self::BestFit),
            "worst_fit" => Ok(Self::WorstFit),
            "first_fit" => Ok(Self::FirstFit),
            "round_robin" => Ok(Self::RoundRobin),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BestFit => "best_fit",
            Self::WorstFit => "worst_fit",
            Self::FirstFit => "first_fit",
            Self::RoundRobin => "round_robin",
        };
        f.write_str(name)
    }
}

/// One long-lived instance of each built-in policy.
///
/// Stateful policies (round-robin) need to outlive a single scheduling
/// call, so the cluster manager holds one of these.
#[derive(Debug, Default)]
pub struct Policies {
    best_fit: BestFit,
    worst_fit: WorstFit,
    first_fit: FirstFit,
    round_robin: RoundRobin,
}

impl Policies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: PolicyKind) -> &dyn PlacementPolicy {
        match kind {
            PolicyKind::BestFit => &self.best_fit,
            PolicyKind::WorstFit => &self.worst_fit,
            PolicyKind::FirstFit => &self.first_fit,
            PolicyKind::RoundRobin => &self.round_robin,
        }
    }
}

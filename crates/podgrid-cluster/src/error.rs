//! Cluster manager error types.

use podgrid_state::{NodeId, PodId, StateError};
use thiserror::Error;

use crate::launcher::LaunchError;

/// Errors returned by cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("pod not found: {0}")]
    PodNotFound(PodId),

    #[error("pod already exists: {0}")]
    DuplicatePod(PodId),

    #[error("failed to launch agent for node {node_id}: {source}")]
    LaunchFailed {
        node_id: NodeId,
        #[source]
        source: LaunchError,
    },

    #[error("state store error: {0}")]
    StorageFailure(#[from] StateError),
}

pub type ClusterResult<T> = Result<T, ClusterError>;

//! redb table definitions for the podgrid state store.
//!
//! Both tables use `&str` keys and `&[u8]` values. Values are JSON records
//! wrapped in a [`Versioned`] envelope that carries the schema version.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

/// Schema version written with every record.
pub const SCHEMA_VERSION: u32 = 1;

/// Node records keyed by `{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Pod records keyed by `{pod_id}`.
pub const PODS: TableDefinition<&str, &[u8]> = TableDefinition::new("pods");

/// On-disk envelope: `{"schema": 1, ...record fields}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub schema: u32,
    #[serde(flatten)]
    pub record: T,
}

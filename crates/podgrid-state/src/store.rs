//! StateStore — redb-backed persistence for podgrid.
//!
//! Every write goes through [`StateStore::apply`], which runs a closure over
//! the full [`ClusterState`] inside one redb write transaction. The closure's
//! result is validated, diffed against the loaded state and only the changed
//! records are written before the durable commit. Any error (from the
//! closure, from validation, or from redb) aborts the transaction, so no
//! partial mutation is ever visible to readers or survives a crash.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableTable, StorageBackend, Table, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::state::ClusterState;
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe cluster state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let store = Self::open_with_backend(redb::backends::InMemoryBackend::new())?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Open a state store over any redb storage backend.
    pub fn open_with_backend(backend: impl StorageBackend) -> StateResult<Self> {
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(PODS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Commit))?;
        Ok(())
    }

    /// A consistent view of every node and pod as of a single instant.
    pub fn snapshot(&self) -> StateResult<ClusterState> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let nodes = txn.open_table(NODES).map_err(map_err!(Table))?;
        let pods = txn.open_table(PODS).map_err(map_err!(Table))?;
        Ok(ClusterState {
            nodes: read_records(&nodes)?,
            pods: read_records(&pods)?,
        })
    }

    /// Run `mutate` as one atomic read-modify-write over the cluster.
    ///
    /// The closure receives the current state. If it returns `Ok`, the
    /// resulting state is validated and committed durably before `apply`
    /// returns. If it returns `Err`, or validation or the commit fails,
    /// nothing is written. Concurrent `apply` calls are serialized by redb's
    /// single-writer lock.
    pub fn apply<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut ClusterState) -> Result<T, E>,
        E: From<StateError>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;

        let before = match load_state(&txn) {
            Ok(state) => state,
            Err(e) => return Err(abort(txn, e).into()),
        };
        let mut after = before.clone();

        let output = match mutate(&mut after) {
            Ok(output) => output,
            Err(e) => {
                abort_quietly(txn);
                return Err(e);
            }
        };

        if let Err(e) = after.validate() {
            warn!(error = %e, "rejecting cluster mutation");
            return Err(abort(txn, e).into());
        }

        let written = match write_changes(&txn, &before, &after) {
            Ok(n) => n,
            Err(e) => return Err(abort(txn, e).into()),
        };

        txn.commit().map_err(map_err!(Commit))?;
        debug!(written, "cluster state committed");
        Ok(output)
    }
}

fn abort(txn: WriteTransaction, err: StateError) -> StateError {
    abort_quietly(txn);
    err
}

fn abort_quietly(txn: WriteTransaction) {
    if let Err(e) = txn.abort() {
        warn!(error = %e, "failed to abort write transaction");
    }
}

fn load_state(txn: &WriteTransaction) -> StateResult<ClusterState> {
    let nodes = {
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        read_records(&table)?
    };
    let pods = {
        let table = txn.open_table(PODS).map_err(map_err!(Table))?;
        read_records(&table)?
    };
    Ok(ClusterState { nodes, pods })
}

fn write_changes(
    txn: &WriteTransaction,
    before: &ClusterState,
    after: &ClusterState,
) -> StateResult<usize> {
    let mut written = 0;
    {
        let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
        written += write_diff(&mut table, &before.nodes, &after.nodes)?;
    }
    {
        let mut table = txn.open_table(PODS).map_err(map_err!(Table))?;
        written += write_diff(&mut table, &before.pods, &after.pods)?;
    }
    Ok(written)
}

/// Upsert records that changed, remove records that disappeared.
fn write_diff<T>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    before: &BTreeMap<String, T>,
    after: &BTreeMap<String, T>,
) -> StateResult<usize>
where
    T: Serialize + PartialEq,
{
    let mut written = 0;
    for (key, record) in after {
        if before.get(key) != Some(record) {
            let value = encode(record)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            written += 1;
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            table.remove(key.as_str()).map_err(map_err!(Write))?;
            written += 1;
        }
    }
    Ok(written)
}

fn read_records<T, R>(table: &R) -> StateResult<BTreeMap<String, T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut records = BTreeMap::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        let key = key.value().to_string();
        let record = decode(&key, value.value())?;
        records.insert(key, record);
    }
    Ok(records)
}

fn encode<T: Serialize>(record: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(&Versioned {
        schema: SCHEMA_VERSION,
        record,
    })
    .map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> StateResult<T> {
    #[derive(serde::Deserialize)]
    struct SchemaHeader {
        schema: u32,
    }

    let header: SchemaHeader = serde_json::from_slice(bytes).map_err(map_err!(Deserialize))?;
    if header.schema > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchema {
            key: key.to_string(),
            found: header.schema,
            supported: SCHEMA_VERSION,
        });
    }
    let versioned: Versioned<T> =
        serde_json::from_slice(bytes).map_err(map_err!(Deserialize))?;
    Ok(versioned.record)
}

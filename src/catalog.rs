//! Table registry.
//!
//! The catalog maps table ids (deterministic hashes of the backing file
//! path) to live [`HeapFile`] handles, and table names to ids. The buffer
//! pool resolves every page load and flush through it, so the catalog is
//! handed to the pool at construction instead of living in process-wide
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::heap::HeapFile;
use crate::tuple::TupleDesc;

#[derive(Debug, Default)]
struct CatalogState {
    files: HashMap<u32, Arc<HeapFile>>,
    names: HashMap<String, u32>,
}

/// Registry of the tables known to the engine.
#[derive(Debug, Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a heap file under `name` and returns its table id.
    ///
    /// Re-registering a name rebinds it; the file keeps its path-derived id
    /// either way.
    pub fn register(&self, file: Arc<HeapFile>, name: impl Into<String>) -> u32 {
        let table_id = file.table_id();
        let mut state = self.state.write();
        state.files.insert(table_id, file);
        state.names.insert(name.into(), table_id);
        table_id
    }

    /// Returns the heap file registered under `table_id`.
    pub fn file(&self, table_id: u32) -> Option<Arc<HeapFile>> {
        self.state.read().files.get(&table_id).cloned()
    }

    /// Returns the table id bound to `name`.
    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.state.read().names.get(name).copied()
    }

    /// Returns the schema of the table registered under `table_id`.
    pub fn tuple_desc(&self, table_id: u32) -> Option<TupleDesc> {
        self.state
            .read()
            .files
            .get(&table_id)
            .map(|f| f.tuple_desc().clone())
    }
}

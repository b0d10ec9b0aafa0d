use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::heap_file::HeapFile;
use crate::core::{DatabaseError, Result, Schema};

/// On-disk description of one table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDef {
    name: String,
    file: PathBuf,
    schema: Schema,
}

struct TableEntry {
    name: String,
    file: Arc<HeapFile>,
}

#[derive(Default)]
struct CatalogState {
    tables: HashMap<u32, TableEntry>,
    by_name: HashMap<String, u32>,
}

/// Catalog - maps table names and ids to their heap files
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `name`; an existing table with that name is replaced
    pub fn add_table(&self, file: HeapFile, name: &str) -> u32 {
        let table_id = file.id();
        let mut state = self.state.write();

        if let Some(old_id) = state.by_name.remove(name) {
            state.tables.remove(&old_id);
        }
        // Re-adding the same file under a new name drops the old name
        if let Some(old) = state.tables.remove(&table_id) {
            state.by_name.remove(&old.name);
        }

        state.by_name.insert(name.to_string(), table_id);
        state.tables.insert(
            table_id,
            TableEntry {
                name: name.to_string(),
                file: Arc::new(file),
            },
        );

        tracing::debug!(table_id, name, "registered table");
        table_id
    }

    pub fn table_id(&self, name: &str) -> Result<u32> {
        self.state
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    pub fn heap_file(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.state
            .read()
            .tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or_else(|| DatabaseError::TableNotFound(table_id.to_string()))
    }

    pub fn schema(&self, table_id: u32) -> Result<Schema> {
        self.heap_file(table_id).map(|file| file.schema().clone())
    }

    pub fn table_name(&self, table_id: u32) -> Result<String> {
        self.state
            .read()
            .tables
            .get(&table_id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| DatabaseError::TableNotFound(table_id.to_string()))
    }

    /// Ids of all registered tables, in ascending order
    pub fn table_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.state.read().tables.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Write the table list to `path` as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let state = self.state.read();
        let mut defs: Vec<TableDef> = state
            .tables
            .values()
            .map(|entry| TableDef {
                name: entry.name.clone(),
                file: entry.file.path().to_path_buf(),
                schema: entry.file.schema().clone(),
            })
            .collect();
        drop(state);
        defs.sort_by(|a, b| a.name.cmp(&b.name));

        let json = serde_json::to_string_pretty(&defs)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Rebuild a catalog from a file written by [`Catalog::save`].
    ///
    /// Relative heap file paths are resolved against the catalog file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let defs: Vec<TableDef> = serde_json::from_str(&json)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let catalog = Self::new();
        for def in defs {
            let file_path = if def.file.is_relative() {
                base.join(&def.file)
            } else {
                def.file
            };
            catalog.add_table(HeapFile::open(file_path, def.schema)?, &def.name);
        }

        tracing::info!(
            tables = catalog.table_ids().len(),
            path = %path.display(),
            "catalog loaded"
        );
        Ok(catalog)
    }
}

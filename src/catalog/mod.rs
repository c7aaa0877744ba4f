//! Table schemas and the storage-engine seam.
//!
//! The optimizer never reads rows during planning; it touches table data only
//! through [`TableSource`] when ANALYZE recomputes statistics. Everything else
//! (schemas, index declarations) is metadata owned by this module.

use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Value, ValueType};

pub mod stats;

pub use stats::{ColumnStats, IndexStats, StatsCatalog, TableStats};

/// Errors from schema and statistics lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table not analyzed: {0}")]
    TableNotAnalyzed(String),
}

/// A column declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub value_type: ValueType,
}

/// Schema of one base table, including its index declarations.
///
/// The primary key (if any) is the table's clustered order; secondary indexes
/// are single-column B+trees over the named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub primary_key: Option<usize>,
    #[serde(default)]
    pub secondary_indexes: Vec<usize>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            secondary_indexes: Vec::new(),
        }
    }

    /// Add a column (builder style).
    pub fn column(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            value_type,
        });
        self
    }

    /// Declare the primary key over an existing column.
    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = self.column_index(column);
        self
    }

    /// Declare a secondary index over an existing column.
    pub fn secondary_index(mut self, column: &str) -> Self {
        if let Some(i) = self.column_index(column) {
            if Some(i) != self.primary_key && !self.secondary_indexes.contains(&i) {
                self.secondary_indexes.push(i);
            }
        }
        self
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ValueType> {
        self.column_index(name).map(|i| self.columns[i].value_type)
    }

    /// Indexed columns in preference order: primary key first, then the
    /// secondary indexes in declaration order. Pairs are (column index,
    /// is_primary).
    pub fn indexed_columns(&self) -> Vec<(usize, bool)> {
        let mut out = Vec::new();
        if let Some(pk) = self.primary_key {
            out.push((pk, true));
        }
        for &i in &self.secondary_indexes {
            out.push((i, false));
        }
        out
    }

    /// Whether `column` is indexed; returns `is_primary` when it is.
    pub fn index_on(&self, column: &str) -> Option<bool> {
        let i = self.column_index(column)?;
        if self.primary_key == Some(i) {
            Some(true)
        } else if self.secondary_indexes.contains(&i) {
            Some(false)
        } else {
            None
        }
    }
}

/// Read access to one table's schema and rows.
///
/// Implemented by the storage engine; [`MemoryTable`] is the in-process
/// reference implementation used by tests and the CLI.
pub trait TableSource: Send + Sync {
    fn schema(&self) -> &TableSchema;

    /// Visit every row once, in storage order.
    fn for_each_row(&self, f: &mut dyn FnMut(&[Value]));
}

/// In-memory table. Rows can be mutated after registration, which is how
/// tests exercise statistics staleness.
pub struct MemoryTable {
    schema: TableSchema,
    rows: RwLock<Vec<Vec<Value>>>,
}

impl MemoryTable {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn with_rows(schema: TableSchema, rows: Vec<Vec<Value>>) -> Self {
        Self {
            schema,
            rows: RwLock::new(rows),
        }
    }

    pub fn push_row(&self, row: Vec<Value>) {
        self.rows.write().unwrap_or_else(|e| e.into_inner()).push(row);
    }

    pub fn extend_rows(&self, rows: impl IntoIterator<Item = Vec<Value>>) {
        self.rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .extend(rows);
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl TableSource for MemoryTable {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn for_each_row(&self, f: &mut dyn FnMut(&[Value])) {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        for row in rows.iter() {
            f(row);
        }
    }
}

/// Registry of table sources, shared between sessions.
#[derive(Default)]
pub struct Catalog {
    tables: DashMap<String, Arc<dyn TableSource>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: Arc<dyn TableSource>) {
        self.tables.insert(source.schema().name.clone(), source);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TableSource>, CatalogError> {
        self.tables
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    pub fn schema(&self, name: &str) -> Result<TableSchema, CatalogError> {
        Ok(self.get(name)?.schema().clone())
    }

    /// Registered table names, sorted for deterministic iteration.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

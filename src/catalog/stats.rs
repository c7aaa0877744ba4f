//! The statistics catalog fed by ANALYZE.
//!
//! Statistics are immutable snapshots behind `Arc`: ANALYZE builds a fresh
//! [`TableStats`] off to the side and swaps it into the map in one step, so a
//! concurrent planning call keeps whatever reference it already captured and
//! never observes a half-updated table.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Catalog, CatalogError, TableSchema, TableSource};
use crate::types::DistinctKey;

/// Assumed B+tree node fanout for height and leaf-read estimates.
pub const INDEX_FANOUT: u64 = 100;

/// Row count assumed for tables that were never analyzed.
pub const DEFAULT_ROW_COUNT: u64 = 1000;

/// Per-column statistics: distinct count plus numeric min/max.
/// Min/max are `None` for string columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub distinct_count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Per-index statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub column: String,
    pub is_primary: bool,
    pub height: u64,
}

/// One table's statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    pub table: String,
    pub row_count: u64,
    pub columns: BTreeMap<String, ColumnStats>,
    pub indexes: Vec<IndexStats>,
}

impl TableStats {
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.get(name)
    }

    pub fn index_on(&self, column: &str) -> Option<&IndexStats> {
        self.indexes.iter().find(|ix| ix.column == column)
    }

    /// Conservative stand-in for an unanalyzed table: default row count, no
    /// column statistics, index heights estimated from the default row count.
    pub fn unanalyzed(schema: &TableSchema) -> Self {
        let indexes = schema
            .indexed_columns()
            .into_iter()
            .map(|(col, is_primary)| IndexStats {
                column: schema.columns[col].name.clone(),
                is_primary,
                height: estimated_height(DEFAULT_ROW_COUNT),
            })
            .collect();
        Self {
            table: schema.name.clone(),
            row_count: DEFAULT_ROW_COUNT,
            columns: BTreeMap::new(),
            indexes,
        }
    }
}

/// Estimated B+tree height for a table of `row_count` rows.
pub fn estimated_height(row_count: u64) -> u64 {
    let rows = row_count.max(2) as f64;
    (rows.ln() / (INDEX_FANOUT as f64).ln()).ceil().max(1.0) as u64
}

/// Catalog of per-table statistics, refreshed by ANALYZE.
#[derive(Default)]
pub struct StatsCatalog {
    stats: DashMap<String, Arc<TableStats>>,
}

impl StatsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute statistics for one table by scanning it, then install the
    /// new snapshot. Returns the snapshot that was installed.
    pub fn analyze(&self, source: &dyn TableSource) -> Arc<TableStats> {
        let schema = source.schema();
        let n_cols = schema.columns.len();

        let mut row_count: u64 = 0;
        let mut distinct: Vec<HashSet<DistinctKey>> = vec![HashSet::new(); n_cols];
        let mut min: Vec<Option<f64>> = vec![None; n_cols];
        let mut max: Vec<Option<f64>> = vec![None; n_cols];

        source.for_each_row(&mut |row| {
            row_count += 1;
            for (i, value) in row.iter().enumerate().take(n_cols) {
                distinct[i].insert(value.distinct_key());
                if let Some(v) = value.as_f64() {
                    min[i] = Some(min[i].map_or(v, |m| m.min(v)));
                    max[i] = Some(max[i].map_or(v, |m| m.max(v)));
                }
            }
        });

        let mut columns = BTreeMap::new();
        for (i, col) in schema.columns.iter().enumerate() {
            columns.insert(
                col.name.clone(),
                ColumnStats {
                    distinct_count: distinct[i].len() as u64,
                    min: min[i],
                    max: max[i],
                },
            );
        }

        let indexes = schema
            .indexed_columns()
            .into_iter()
            .map(|(col, is_primary)| IndexStats {
                column: schema.columns[col].name.clone(),
                is_primary,
                height: estimated_height(row_count),
            })
            .collect();

        let stats = Arc::new(TableStats {
            table: schema.name.clone(),
            row_count,
            columns,
            indexes,
        });
        debug!(table = %schema.name, rows = row_count, "analyzed table");
        self.stats.insert(schema.name.clone(), Arc::clone(&stats));
        stats
    }

    /// Analyze every table registered in `catalog`, in name order.
    pub fn analyze_all(&self, catalog: &Catalog) {
        for name in catalog.table_names() {
            if let Ok(source) = catalog.get(&name) {
                self.analyze(source.as_ref());
            }
        }
    }

    /// Current snapshot for a table.
    pub fn get(&self, table: &str) -> Result<Arc<TableStats>, CatalogError> {
        self.stats
            .get(table)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CatalogError::TableNotAnalyzed(table.to_string()))
    }

    /// Snapshot for a table, substituting conservative defaults when the
    /// table was never analyzed.
    pub fn get_or_default(&self, schema: &TableSchema) -> Arc<TableStats> {
        self.get(&schema.name)
            .unwrap_or_else(|_| Arc::new(TableStats::unanalyzed(schema)))
    }
}

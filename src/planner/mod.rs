//! Query planner - picks a physical join plan minimizing estimated I/O.
//!
//! Three-phase architecture:
//! 1. Validation: resolve tables, typecheck predicates, snapshot statistics
//! 2. Enumeration: access paths per table, join orders/algorithms per mode
//! 3. Selection: the minimum-estimated-I/O plan, ties broken by enumeration
//!    order

pub mod access_path;
pub mod cost;
pub mod explain;
pub mod join_optimizer;
pub mod logical;
pub mod physical;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::catalog::{Catalog, StatsCatalog, TableSchema, TableStats};
use crate::config::{PlannerMode, PlannerSettings};
use crate::types::ValueType;

use self::cost::CostModel;
use self::logical::{classify, typecheck, LogicalQuery, TableRef};
use self::physical::{PhysicalPlan, PlanEstimate};

/// Errors that can occur during planning.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Type mismatch: {left} does not compare with {right} in {expr}")]
    TypeMismatch {
        left: ValueType,
        right: ValueType,
        expr: String,
    },

    #[error("No plan found: {0}")]
    NoPlanFound(String),

    #[error("Query joins too many tables: {0}")]
    TooManyTables(usize),
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Everything one planning call reads: the query's tables in declaration
/// order, their schemas, the statistics snapshot captured up front, and the
/// session settings. Capturing once makes the call a pure function -- an
/// ANALYZE that lands mid-plan is invisible to it.
pub struct PlanContext {
    pub tables: Vec<TableRef>,
    schemas: HashMap<String, TableSchema>,
    stats: HashMap<String, Arc<TableStats>>,
    pub settings: PlannerSettings,
}

impl PlanContext {
    pub fn capture(
        catalog: &Catalog,
        stats: &StatsCatalog,
        settings: &PlannerSettings,
        query: &LogicalQuery,
    ) -> PlanResult<Self> {
        let mut schemas = HashMap::new();
        let mut snapshots = HashMap::new();
        for table in &query.tables {
            let schema = catalog
                .schema(&table.name)
                .map_err(|_| PlanError::TableNotFound(table.name.clone()))?;
            if schemas.contains_key(&table.alias) {
                return Err(PlanError::NoPlanFound(format!(
                    "duplicate table alias: {}",
                    table.alias
                )));
            }
            snapshots.insert(table.alias.clone(), stats.get_or_default(&schema));
            schemas.insert(table.alias.clone(), schema);
        }
        Ok(Self {
            tables: query.tables.clone(),
            schemas,
            stats: snapshots,
            settings: settings.clone(),
        })
    }

    pub fn schemas(&self) -> &HashMap<String, TableSchema> {
        &self.schemas
    }

    pub fn schema(&self, alias: &str) -> &TableSchema {
        self.schemas
            .get(alias)
            .expect("alias resolved during validation")
    }

    pub fn stats(&self, alias: &str) -> &TableStats {
        self.stats
            .get(alias)
            .expect("alias resolved during validation")
    }

    pub fn table_ref(&self, alias: &str) -> &TableRef {
        self.tables
            .iter()
            .find(|t| t.alias == alias)
            .expect("alias resolved during validation")
    }

    pub fn alias_index(&self, alias: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.alias == alias)
    }
}

/// Main entry point for planning.
pub struct Planner<'a> {
    catalog: &'a Catalog,
    stats: &'a StatsCatalog,
    settings: &'a PlannerSettings,
}

impl<'a> Planner<'a> {
    pub fn new(
        catalog: &'a Catalog,
        stats: &'a StatsCatalog,
        settings: &'a PlannerSettings,
    ) -> Self {
        Self {
            catalog,
            stats,
            settings,
        }
    }

    /// Plan a logical query into a physical plan.
    ///
    /// The result is a pure function of the query, the statistics snapshot
    /// captured on entry, and the session settings; re-planning an unchanged
    /// query yields an identical tree.
    pub fn select(&self, query: &LogicalQuery) -> PlanResult<PhysicalPlan> {
        if query.tables.is_empty() {
            return Err(PlanError::NoPlanFound(
                "query references no tables".to_string(),
            ));
        }
        if query.tables.len() > join_optimizer::dp::MAX_TABLES {
            return Err(PlanError::TooManyTables(query.tables.len()));
        }

        let ctx = PlanContext::capture(self.catalog, self.stats, self.settings, query)?;
        typecheck(query, ctx.schemas())?;
        let preds = classify(query);
        let model = CostModel::new(&ctx);

        let tree = match ctx.settings.mode {
            PlannerMode::Naive => join_optimizer::naive::plan(&ctx, &model, &preds)?,
            PlannerMode::Baseline => join_optimizer::greedy::plan(&ctx, &model, &preds)?,
            PlannerMode::CostBased => join_optimizer::dp::plan(&ctx, &model, &preds)?,
        };
        let plan = wrap_project(tree, query);

        if ctx.settings.debug {
            debug!(
                mode = ?ctx.settings.mode,
                io = plan.estimated_io(),
                rows = plan.estimated_rows(),
                "selected plan\n{}",
                explain::render(&plan)
            );
        }
        Ok(plan)
    }
}

/// Projection is free: it forwards its input's row count and I/O.
fn wrap_project(tree: PhysicalPlan, query: &LogicalQuery) -> PhysicalPlan {
    if query.projections.is_empty() {
        return tree;
    }
    let estimate = PlanEstimate {
        rows: tree.estimated_rows(),
        io: tree.estimated_io(),
        sorted_on: tree.estimate().sorted_on.clone(),
    };
    PhysicalPlan::Project {
        input: Box::new(tree),
        columns: query.projections.clone(),
        estimate,
    }
}

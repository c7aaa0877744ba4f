//! Physical plan nodes.
//!
//! A closed set of operators: the cost model, the explain renderer, and the
//! execution hand-off all match exhaustively over it. Every node carries its
//! cumulative estimate, so the root's `io` is the plan's Estimated IO.

use serde::{Deserialize, Serialize};

use crate::expr::{ColumnRef, Expr};
use crate::planner::logical::TableRef;
use crate::types::Value;

/// Estimated properties of one operator's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEstimate {
    /// Estimated output rows, never below 1.
    pub rows: u64,
    /// Cumulative estimated I/O for the subtree rooted here.
    pub io: u64,
    /// Column the output is known to be ordered by, if any.
    pub sorted_on: Option<ColumnRef>,
}

/// Join algorithm label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinAlgorithm {
    MergeJoin,
    IndexNlJoin,
    BlockNlJoin,
    HashJoin,
}

/// One bound of an index search range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBound {
    pub value: Value,
    pub exclusive: bool,
}

/// Arguments for an index range search. A point lookup has equal, inclusive
/// bounds on both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyRange {
    pub lower: Option<KeyBound>,
    pub upper: Option<KeyBound>,
}

impl KeyRange {
    pub fn point(value: Value) -> Self {
        Self {
            lower: Some(KeyBound {
                value: value.clone(),
                exclusive: false,
            }),
            upper: Some(KeyBound {
                value,
                exclusive: false,
            }),
        }
    }

    pub fn is_point(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => !lo.exclusive && !hi.exclusive && lo.value == hi.value,
            _ => false,
        }
    }
}

impl std::fmt::Display for KeyRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (open, lo) = match &self.lower {
            Some(b) => (if b.exclusive { "(" } else { "[" }, b.value.to_string()),
            None => ("(", "-inf".to_string()),
        };
        let (hi, close) = match &self.upper {
            Some(b) => (b.value.to_string(), if b.exclusive { ")" } else { "]" }),
            None => ("+inf".to_string(), ")"),
        };
        write!(f, "{}{}, {}{}", open, lo, hi, close)
    }
}

/// Physical plan operator tree. Each node exclusively owns its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalPlan {
    /// Full scan of a base table, with pushed-down filter conjuncts.
    TableScan {
        table: TableRef,
        filter: Option<Expr>,
        estimate: PlanEstimate,
    },

    /// B+tree scan over one indexed column, with residual filter conjuncts.
    IndexScan {
        table: TableRef,
        column: String,
        primary: bool,
        range: KeyRange,
        filter: Option<Expr>,
        estimate: PlanEstimate,
    },

    /// External merge sort on one key.
    Sort {
        input: Box<PhysicalPlan>,
        key: ColumnRef,
        estimate: PlanEstimate,
    },

    /// Merge join of two inputs sorted on the join keys. `filter` carries
    /// join conjuncts beyond the merge keys, applied to merged pairs.
    MergeJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        left_key: ColumnRef,
        right_key: ColumnRef,
        filter: Option<Expr>,
        estimate: PlanEstimate,
    },

    /// Index nested-loop join: outer rows drive probes into a base table's
    /// index. `filter` carries the inner table's local conjuncts plus any
    /// non-key join conjuncts, applied per probe.
    IndexNlJoin {
        outer: Box<PhysicalPlan>,
        inner: TableRef,
        inner_column: String,
        inner_primary: bool,
        outer_key: ColumnRef,
        filter: Option<Expr>,
        estimate: PlanEstimate,
    },

    /// Block nested-loop join; the right side is re-read once per buffered
    /// block of the left. Predicate `None` is a cross product.
    BlockNlJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        predicate: Option<Expr>,
        estimate: PlanEstimate,
    },

    /// Hash equi-join: build on the left, probe with the right.
    HashJoin {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        left_key: ColumnRef,
        right_key: ColumnRef,
        filter: Option<Expr>,
        estimate: PlanEstimate,
    },

    /// Output projection.
    Project {
        input: Box<PhysicalPlan>,
        columns: Vec<Expr>,
        estimate: PlanEstimate,
    },
}

impl PhysicalPlan {
    pub fn estimate(&self) -> &PlanEstimate {
        match self {
            PhysicalPlan::TableScan { estimate, .. }
            | PhysicalPlan::IndexScan { estimate, .. }
            | PhysicalPlan::Sort { estimate, .. }
            | PhysicalPlan::MergeJoin { estimate, .. }
            | PhysicalPlan::IndexNlJoin { estimate, .. }
            | PhysicalPlan::BlockNlJoin { estimate, .. }
            | PhysicalPlan::HashJoin { estimate, .. }
            | PhysicalPlan::Project { estimate, .. } => estimate,
        }
    }

    /// The plan's Estimated IO scalar.
    pub fn estimated_io(&self) -> u64 {
        self.estimate().io
    }

    pub fn estimated_rows(&self) -> u64 {
        self.estimate().rows
    }

    pub fn children(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::TableScan { .. } | PhysicalPlan::IndexScan { .. } => vec![],
            PhysicalPlan::Sort { input, .. } | PhysicalPlan::Project { input, .. } => {
                vec![input.as_ref()]
            }
            PhysicalPlan::MergeJoin { left, right, .. }
            | PhysicalPlan::BlockNlJoin { left, right, .. }
            | PhysicalPlan::HashJoin { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            PhysicalPlan::IndexNlJoin { outer, .. } => vec![outer.as_ref()],
        }
    }

    /// Base-table aliases at the leaves, left to right. An index nested-loop
    /// join contributes its inner table after everything under its outer.
    pub fn leaf_order(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<String>) {
        match self {
            PhysicalPlan::TableScan { table, .. } | PhysicalPlan::IndexScan { table, .. } => {
                out.push(table.alias.clone());
            }
            PhysicalPlan::IndexNlJoin { outer, inner, .. } => {
                outer.collect_leaves(out);
                out.push(inner.alias.clone());
            }
            other => {
                for child in other.children() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// The join algorithm of this node, if it is a join.
    pub fn join_algorithm(&self) -> Option<JoinAlgorithm> {
        match self {
            PhysicalPlan::MergeJoin { .. } => Some(JoinAlgorithm::MergeJoin),
            PhysicalPlan::IndexNlJoin { .. } => Some(JoinAlgorithm::IndexNlJoin),
            PhysicalPlan::BlockNlJoin { .. } => Some(JoinAlgorithm::BlockNlJoin),
            PhysicalPlan::HashJoin { .. } => Some(JoinAlgorithm::HashJoin),
            _ => None,
        }
    }

    /// Whether the given join algorithm appears anywhere in the tree.
    pub fn uses_algorithm(&self, algorithm: JoinAlgorithm) -> bool {
        if self.join_algorithm() == Some(algorithm) {
            return true;
        }
        self.children().iter().any(|c| c.uses_algorithm(algorithm))
    }
}

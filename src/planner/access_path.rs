//! Access path enumeration for base tables.
//!
//! For every table reference this produces a full-scan candidate plus one
//! index-scan candidate per indexed column with at least one sargable
//! conjunct. Nothing is pruned here: whether an index scan beats a full scan
//! depends on the candidate's role in the join order, so the decision belongs
//! to the join enumerator.

use crate::catalog::stats::{estimated_height, IndexStats};
use crate::expr::{make_conjunction, BinaryOp, Expr};
use crate::planner::cost::CostModel;
use crate::planner::physical::{KeyBound, KeyRange, PhysicalPlan};
use crate::planner::PlanContext;
use crate::types::Value;

/// All costed access paths for `alias`, full scan first, then indexes in
/// schema preference order (primary key, then secondary declarations).
pub fn candidates(
    ctx: &PlanContext,
    model: &CostModel,
    alias: &str,
    local: &[Expr],
) -> Vec<PhysicalPlan> {
    let mut out = Vec::new();

    out.push(PhysicalPlan::TableScan {
        table: ctx.table_ref(alias).clone(),
        filter: make_conjunction(local.to_vec()),
        estimate: model.table_scan(alias, local),
    });

    let schema = ctx.schema(alias);
    for (col_idx, is_primary) in schema.indexed_columns() {
        let column = schema.columns[col_idx].name.as_str();
        let Some((range, covered)) = extract_range(alias, column, local) else {
            continue;
        };
        let residual: Vec<Expr> = local
            .iter()
            .enumerate()
            .filter(|(i, _)| !covered.contains(i))
            .map(|(_, e)| e.clone())
            .collect();
        let index = index_stats_for(ctx, alias, column, is_primary);
        let estimate = model.index_scan(alias, column, &index, &range, &residual);
        out.push(PhysicalPlan::IndexScan {
            table: ctx.table_ref(alias).clone(),
            column: column.to_string(),
            primary: is_primary,
            range,
            filter: make_conjunction(residual),
            estimate,
        });
    }

    out
}

/// Statistics for the index on `column`, synthesized from the current row
/// count when the last ANALYZE predates the index.
pub fn index_stats_for(ctx: &PlanContext, alias: &str, column: &str, is_primary: bool) -> IndexStats {
    let stats = ctx.stats(alias);
    stats
        .index_on(column)
        .cloned()
        .unwrap_or_else(|| IndexStats {
            column: column.to_string(),
            is_primary,
            height: estimated_height(stats.row_count),
        })
}

/// Merge the sargable conjuncts over `alias.column` into one search range.
///
/// Returns the range and the indices of the covered conjuncts, or `None`
/// when nothing is sargable. An equality wins outright; otherwise the first
/// lower and first upper bound are kept. `<>` cannot map to a single range.
pub fn extract_range(
    alias: &str,
    column: &str,
    local: &[Expr],
) -> Option<(KeyRange, Vec<usize>)> {
    let mut range = KeyRange::default();
    let mut covered: Vec<usize> = Vec::new();

    for (i, part) in local.iter().enumerate() {
        let Some((col, op, value)) = part.column_literal_bound() else {
            continue;
        };
        if col.table != alias || col.column != column {
            continue;
        }
        match op {
            BinaryOp::Eq => {
                // a point lookup beats whatever bounds we had
                range = KeyRange::point(value);
                covered = vec![i];
                break;
            }
            BinaryOp::Gt | BinaryOp::Gte => {
                if range.lower.is_none() {
                    range.lower = Some(bound(value, op == BinaryOp::Gt));
                    covered.push(i);
                }
            }
            BinaryOp::Lt | BinaryOp::Lte => {
                if range.upper.is_none() {
                    range.upper = Some(bound(value, op == BinaryOp::Lt));
                    covered.push(i);
                }
            }
            _ => {}
        }
    }

    if covered.is_empty() {
        None
    } else {
        Some((range, covered))
    }
}

fn bound(value: Value, exclusive: bool) -> KeyBound {
    KeyBound { value, exclusive }
}

//! Join-order and join-algorithm enumeration.
//!
//! Three strategies share the plan-construction helpers here and differ only
//! in how they search: `naive` takes declaration order, `greedy` follows the
//! baseline heuristic, and `dp` runs the full bottom-up subset search.

pub mod dp;
pub mod greedy;
pub mod join_graph;
pub mod naive;

use crate::catalog::stats::IndexStats;
use crate::expr::{make_conjunction, ColumnRef, Expr};
use crate::planner::cost::CostModel;
use crate::planner::logical::{ClassifiedPredicates, JoinPredicate};
use crate::planner::physical::PhysicalPlan;
use crate::planner::PlanContext;

/// The predicates a join between `left` and `right` table sets must apply:
/// two-table predicates split across the sets, and residual predicates whose
/// tables are now fully covered with references on both sides.
pub(crate) fn applicable<'p>(
    preds: &'p ClassifiedPredicates,
    left: &[&str],
    right: &[&str],
) -> (Vec<&'p JoinPredicate>, Vec<&'p Expr>) {
    let joins = preds
        .joins
        .iter()
        .filter(|jp| {
            let split = |a: &str, b: &str| {
                left.contains(&a) && right.contains(&b) || left.contains(&b) && right.contains(&a)
            };
            split(&jp.left_table, &jp.right_table)
        })
        .collect();
    let residual = preds
        .residual
        .iter()
        .filter(|e| {
            let tables = e.referenced_tables();
            let mut on_left = false;
            let mut on_right = false;
            for t in &tables {
                if left.contains(&t.as_str()) {
                    on_left = true;
                } else if right.contains(&t.as_str()) {
                    on_right = true;
                } else {
                    return false;
                }
            }
            on_left && on_right
        })
        .collect();
    (joins, residual)
}

/// Conjunction of everything a join node has to evaluate beyond its key:
/// the non-key join predicates and the covered residuals.
pub(crate) fn leftover_filter(
    preds: &[&JoinPredicate],
    skip: Option<&JoinPredicate>,
    residual: &[&Expr],
) -> Option<Expr> {
    let mut parts: Vec<Expr> = preds
        .iter()
        .filter(|jp| skip.map_or(true, |s| !std::ptr::eq::<JoinPredicate>(**jp, s)))
        .map(|jp| jp.expr.clone())
        .collect();
    parts.extend(residual.iter().map(|e| (*e).clone()));
    make_conjunction(parts)
}

/// Put a sort on top of `plan` unless it is already ordered on `key`.
pub(crate) fn ensure_sorted(model: &CostModel, plan: PhysicalPlan, key: &ColumnRef) -> PhysicalPlan {
    if plan.estimate().sorted_on.as_ref() == Some(key) {
        return plan;
    }
    let estimate = model.sort(plan.estimate(), key);
    PhysicalPlan::Sort {
        input: Box::new(plan),
        key: key.clone(),
        estimate,
    }
}

/// Build a merge join on the given equi key, sorting either side as needed.
pub(crate) fn merge_join_plan(
    model: &CostModel,
    left: PhysicalPlan,
    right: PhysicalPlan,
    left_key: &ColumnRef,
    right_key: &ColumnRef,
    filter: Option<Expr>,
    rows: u64,
) -> PhysicalPlan {
    let left = ensure_sorted(model, left, left_key);
    let right = ensure_sorted(model, right, right_key);
    let estimate = model.merge_join(left.estimate(), right.estimate(), left_key, rows);
    PhysicalPlan::MergeJoin {
        left: Box::new(left),
        right: Box::new(right),
        left_key: left_key.clone(),
        right_key: right_key.clone(),
        filter,
        estimate,
    }
}

/// Build an index nested-loop join probing `inner_alias` through `index`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn index_nl_join_plan(
    ctx: &PlanContext,
    model: &CostModel,
    outer: PhysicalPlan,
    inner_alias: &str,
    index: IndexStats,
    outer_key: &ColumnRef,
    filter: Option<Expr>,
    rows: u64,
) -> PhysicalPlan {
    let estimate = model.index_nl_join(outer.estimate(), inner_alias, &index, rows);
    PhysicalPlan::IndexNlJoin {
        outer: Box::new(outer),
        inner: ctx.table_ref(inner_alias).clone(),
        inner_column: index.column.clone(),
        inner_primary: index.is_primary,
        outer_key: outer_key.clone(),
        filter,
        estimate,
    }
}

/// Build a block nested-loop join; `predicate` of `None` is a cross product.
pub(crate) fn block_nl_join_plan(
    model: &CostModel,
    left: PhysicalPlan,
    right: PhysicalPlan,
    predicate: Option<Expr>,
    rows: u64,
) -> PhysicalPlan {
    let estimate = model.block_nl_join(left.estimate(), right.estimate(), rows);
    PhysicalPlan::BlockNlJoin {
        left: Box::new(left),
        right: Box::new(right),
        predicate,
        estimate,
    }
}

/// Build a hash join on the given equi key.
pub(crate) fn hash_join_plan(
    model: &CostModel,
    left: PhysicalPlan,
    right: PhysicalPlan,
    left_key: &ColumnRef,
    right_key: &ColumnRef,
    filter: Option<Expr>,
    rows: u64,
) -> PhysicalPlan {
    let estimate = model.hash_join(left.estimate(), right.estimate(), rows);
    PhysicalPlan::HashJoin {
        left: Box::new(left),
        right: Box::new(right),
        left_key: left_key.clone(),
        right_key: right_key.clone(),
        filter,
        estimate,
    }
}

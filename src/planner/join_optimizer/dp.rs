//! Cost-based strategy: bottom-up dynamic programming over table subsets.
//!
//! Subsets are bitmasks over the query's declaration order, enumerated by
//! ascending size and then ascending indices; within one subset every
//! connected split is tried with every enabled algorithm, and replacement is
//! by strictly smaller estimated I/O, so equal-cost plans resolve to the one
//! enumerated first. Each subset keeps a small Pareto set of candidates: the
//! cheapest overall plus the cheapest per produced sort order, which is what
//! lets a later merge join exploit an index-ordered input.

use std::collections::HashMap;

use crate::expr::{make_conjunction, ColumnRef};
use crate::planner::access_path::{candidates, index_stats_for};
use crate::planner::cost::CostModel;
use crate::planner::join_optimizer::join_graph::JoinGraph;
use crate::planner::join_optimizer::{
    applicable, block_nl_join_plan, greedy, hash_join_plan, index_nl_join_plan, leftover_filter,
    merge_join_plan,
};
use crate::planner::logical::{ClassifiedPredicates, JoinPredicate};
use crate::planner::physical::PhysicalPlan;
use crate::planner::{PlanContext, PlanError, PlanResult};

/// Bitmask width bounds the table count; bounding search effort below that
/// is the caller's concern.
pub const MAX_TABLES: usize = 63;

/// A set of tables as a bitmask over declaration-order indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableSet(pub u64);

impl TableSet {
    pub fn single(i: usize) -> Self {
        Self(1u64 << i)
    }

    pub fn full(n: usize) -> Self {
        Self((1u64 << n) - 1)
    }

    pub fn size(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(&self, i: usize) -> bool {
        self.0 & (1u64 << i) != 0
    }

    /// Member indices, ascending.
    pub fn indices(&self) -> Vec<usize> {
        (0..64).filter(|&i| self.contains(i)).collect()
    }
}

/// All subsets of `{0..n}` with exactly `size` members, in ascending index
/// order (which is also ascending bitmask order).
pub fn subsets_of_size(n: usize, size: usize) -> Vec<TableSet> {
    let mut result = Vec::new();
    if size == 0 || size > n {
        return result;
    }
    let mut current: Vec<usize> = Vec::new();
    subsets_helper(n, size, 0, &mut current, &mut result);
    result
}

fn subsets_helper(
    n: usize,
    size: usize,
    start: usize,
    current: &mut Vec<usize>,
    result: &mut Vec<TableSet>,
) {
    if current.len() == size {
        let mask = current.iter().fold(0u64, |m, &i| m | (1u64 << i));
        result.push(TableSet(mask));
        return;
    }
    for i in start..n {
        current.push(i);
        subsets_helper(n, size, i + 1, current, result);
        current.pop();
    }
}

/// Every way to split `set` into two non-empty halves, ascending by the
/// first half's bitmask. Both orientations appear, so each split is also
/// tried with the sides swapped.
pub fn splits(set: TableSet) -> Vec<(TableSet, TableSet)> {
    let mask = set.0;
    let mut out = Vec::new();
    // descending sub-bitmask walk, reversed into canonical ascending order
    let mut s = mask & (mask - 1);
    while s != 0 {
        out.push((TableSet(s), TableSet(mask & !s)));
        s = (s - 1) & mask;
    }
    out.reverse();
    out
}

pub fn plan(
    ctx: &PlanContext,
    model: &CostModel,
    preds: &ClassifiedPredicates,
) -> PlanResult<PhysicalPlan> {
    let n = ctx.tables.len();
    let graph = JoinGraph::build(ctx, preds);
    if !graph.fully_connected() {
        // the DP search never introduces cross products; a disconnected
        // query falls back to the heuristic plan
        return greedy::plan(ctx, model, preds);
    }

    let mut memo: HashMap<TableSet, Vec<PhysicalPlan>> = HashMap::new();

    for (i, table) in ctx.tables.iter().enumerate() {
        let mut best = Vec::new();
        for cand in candidates(ctx, model, &table.alias, preds.local_for(&table.alias)) {
            offer(&mut best, cand);
        }
        memo.insert(TableSet::single(i), best);
    }

    for size in 2..=n {
        for set in subsets_of_size(n, size) {
            let mut best: Vec<PhysicalPlan> = Vec::new();
            for (s1, s2) in splits(set) {
                if !graph.sets_joinable(s1.0, s2.0) {
                    continue;
                }
                let (Some(lefts), Some(rights)) = (memo.get(&s1), memo.get(&s2)) else {
                    continue;
                };
                let aliases1: Vec<&str> = s1
                    .indices()
                    .iter()
                    .map(|&i| ctx.tables[i].alias.as_str())
                    .collect();
                let aliases2: Vec<&str> = s2
                    .indices()
                    .iter()
                    .map(|&i| ctx.tables[i].alias.as_str())
                    .collect();
                let (joins, residual) = applicable(preds, &aliases1, &aliases2);
                if joins.is_empty() && residual.is_empty() {
                    continue;
                }

                for left in lefts {
                    for right in rights {
                        let rows =
                            model.join_rows(left.estimate(), right.estimate(), &joins, &residual);

                        if ctx.settings.sort_merge_join {
                            for jp in joins.iter().filter(|jp| jp.is_equi()).copied() {
                                let Some((lk, rk)) = orient_keys(jp, &aliases1) else {
                                    continue;
                                };
                                offer(
                                    &mut best,
                                    merge_join_plan(
                                        model,
                                        left.clone(),
                                        right.clone(),
                                        &lk,
                                        &rk,
                                        leftover_filter(&joins, Some(jp), &residual),
                                        rows,
                                    ),
                                );
                            }
                        }

                        if ctx.settings.hash_join {
                            if let Some(jp) = joins.iter().find(|jp| jp.is_equi()).copied() {
                                if let Some((lk, rk)) = orient_keys(jp, &aliases1) {
                                    offer(
                                        &mut best,
                                        hash_join_plan(
                                            model,
                                            left.clone(),
                                            right.clone(),
                                            &lk,
                                            &rk,
                                            leftover_filter(&joins, Some(jp), &residual),
                                            rows,
                                        ),
                                    );
                                }
                            }
                        }

                        offer(
                            &mut best,
                            block_nl_join_plan(
                                model,
                                left.clone(),
                                right.clone(),
                                leftover_filter(&joins, None, &residual),
                                rows,
                            ),
                        );
                    }
                }

                // probes into a base table's index: only when the inner side
                // is a single table (intermediate results have no index)
                if ctx.settings.index_join && s2.size() == 1 {
                    let inner_alias = aliases2[0];
                    let local = preds.local_for(inner_alias);
                    let inner_est = model.table_scan(inner_alias, local);
                    for jp in &joins {
                        let Some(inner_key) = jp.key_for(inner_alias) else {
                            continue;
                        };
                        let Some(outer_key) = jp.key_opposite(inner_alias) else {
                            continue;
                        };
                        let Some(is_primary) = ctx.schema(inner_alias).index_on(&inner_key.column)
                        else {
                            continue;
                        };
                        let index =
                            index_stats_for(ctx, inner_alias, &inner_key.column, is_primary);
                        for left in lefts {
                            let rows =
                                model.join_rows(left.estimate(), &inner_est, &joins, &residual);
                            let mut filter_parts: Vec<_> = local.to_vec();
                            filter_parts.extend(leftover_filter(&joins, Some(*jp), &residual));
                            offer(
                                &mut best,
                                index_nl_join_plan(
                                    ctx,
                                    model,
                                    left.clone(),
                                    inner_alias,
                                    index.clone(),
                                    &outer_key,
                                    make_conjunction(filter_parts),
                                    rows,
                                ),
                            );
                        }
                    }
                }
            }
            if !best.is_empty() {
                memo.insert(set, best);
            }
        }
    }

    let full = memo
        .remove(&TableSet::full(n))
        .ok_or_else(|| PlanError::NoPlanFound("no connected join order".to_string()))?;
    let mut winner: Option<PhysicalPlan> = None;
    for cand in full {
        let replace = winner
            .as_ref()
            .map_or(true, |w| cand.estimated_io() < w.estimated_io());
        if replace {
            winner = Some(cand);
        }
    }
    winner.ok_or_else(|| PlanError::NoPlanFound("no connected join order".to_string()))
}

/// Orient an equi predicate's columns so the first key belongs to the left
/// (first-alias-set) side.
fn orient_keys(jp: &JoinPredicate, left_aliases: &[&str]) -> Option<(ColumnRef, ColumnRef)> {
    let (a, b) = jp.equi.as_ref()?;
    if left_aliases.contains(&a.table.as_str()) {
        Some((a.clone(), b.clone()))
    } else {
        Some((b.clone(), a.clone()))
    }
}

/// Keep `cand` only if no kept plan is at least as cheap while providing the
/// same ordering (or when the newcomer provides none); evict kept plans that
/// the newcomer strictly beats on both counts. Strict inequality keeps the
/// first-enumerated plan on cost ties.
fn offer(best: &mut Vec<PhysicalPlan>, cand: PhysicalPlan) {
    let cand_order = cand.estimate().sorted_on.clone();
    for kept in best.iter() {
        let kept_order = &kept.estimate().sorted_on;
        let covers = *kept_order == cand_order || cand_order.is_none();
        if covers && kept.estimated_io() <= cand.estimated_io() {
            return;
        }
    }
    best.retain(|kept| {
        let kept_order = &kept.estimate().sorted_on;
        let covered = *kept_order == cand_order || kept_order.is_none();
        !(covered && cand.estimated_io() < kept.estimated_io())
    });
    best.push(cand);
}

//! Baseline strategy: a deterministic greedy heuristic.
//!
//! Leaves get a rule-chosen access path (a sargable index beats a full scan,
//! an equality sarg beats a range, the primary key beats a secondary). The
//! join order starts from the connected pair with the smallest estimated
//! output and repeatedly pulls in the connected table that keeps the joined
//! cardinality smallest. Per step the algorithm preference is fixed:
//! merge join, then index nested-loop, then block nested-loop. Ties always
//! resolve to the earliest declared table, so the plan is reproducible.

use crate::expr::make_conjunction;
use crate::planner::access_path::{candidates, index_stats_for};
use crate::planner::cost::CostModel;
use crate::planner::join_optimizer::{
    applicable, block_nl_join_plan, index_nl_join_plan, leftover_filter, merge_join_plan,
};
use crate::planner::logical::{ClassifiedPredicates, JoinPredicate};
use crate::planner::physical::PhysicalPlan;
use crate::planner::{PlanContext, PlanError, PlanResult};

pub fn plan(
    ctx: &PlanContext,
    model: &CostModel,
    preds: &ClassifiedPredicates,
) -> PlanResult<PhysicalPlan> {
    let n = ctx.tables.len();
    let leaves: Vec<PhysicalPlan> = (0..n)
        .map(|i| heuristic_leaf(ctx, model, &ctx.tables[i].alias, preds))
        .collect();

    let mut leaves: Vec<Option<PhysicalPlan>> = leaves.into_iter().map(Some).collect();
    if n == 1 {
        return leaves[0]
            .take()
            .ok_or_else(|| PlanError::NoPlanFound("query references no tables".to_string()));
    }

    // seed with the connected pair producing the fewest rows
    let mut best_pair: Option<(usize, usize, u64)> = None;
    for a in 0..n {
        for b in a + 1..n {
            let (alias_a, alias_b) = (ctx.tables[a].alias.as_str(), ctx.tables[b].alias.as_str());
            let (joins, residual) = applicable(preds, &[alias_a], &[alias_b]);
            if joins.is_empty() && residual.is_empty() {
                continue;
            }
            let (Some(la), Some(lb)) = (&leaves[a], &leaves[b]) else {
                continue;
            };
            let rows = model.join_rows(la.estimate(), lb.estimate(), &joins, &residual);
            if best_pair.map_or(true, |(_, _, r)| rows < r) {
                best_pair = Some((a, b, rows));
            }
        }
    }
    let (first, second) = best_pair.map_or((0, 1), |(a, b, _)| (a, b));

    let mut joined: Vec<usize> = vec![first];
    let outer = leaves[first]
        .take()
        .ok_or_else(|| PlanError::NoPlanFound("missing leaf plan".to_string()))?;
    let mut acc = join_step(ctx, model, preds, outer, &joined, second, &mut leaves);
    joined.push(second);

    let mut remaining: Vec<usize> = (0..n).filter(|i| !joined.contains(i)).collect();
    while !remaining.is_empty() {
        let mut best: Option<(usize, u64)> = None;
        for &t in &remaining {
            let aliases: Vec<&str> = joined.iter().map(|&i| ctx.tables[i].alias.as_str()).collect();
            let alias_t = ctx.tables[t].alias.as_str();
            let (joins, residual) = applicable(preds, &aliases, &[alias_t]);
            if joins.is_empty() && residual.is_empty() {
                continue;
            }
            let Some(leaf) = &leaves[t] else { continue };
            let rows = model.join_rows(acc.estimate(), leaf.estimate(), &joins, &residual);
            if best.map_or(true, |(_, r)| rows < r) {
                best = Some((t, rows));
            }
        }
        // a disconnected table joins as a cross product, declaration order
        let next = best.map_or(remaining[0], |(t, _)| t);
        acc = join_step(ctx, model, preds, acc, &joined, next, &mut leaves);
        joined.push(next);
        remaining.retain(|&t| t != next);
    }

    Ok(acc)
}

/// Join the accumulated plan with table `inner_idx` using the fixed
/// preference order: merge join, index nested-loop, block nested-loop.
fn join_step(
    ctx: &PlanContext,
    model: &CostModel,
    preds: &ClassifiedPredicates,
    outer: PhysicalPlan,
    outer_indices: &[usize],
    inner_idx: usize,
    leaves: &mut [Option<PhysicalPlan>],
) -> PhysicalPlan {
    let alias = ctx.tables[inner_idx].alias.as_str();
    let outer_aliases: Vec<&str> = outer_indices
        .iter()
        .map(|&i| ctx.tables[i].alias.as_str())
        .collect();
    let (joins, residual) = applicable(preds, &outer_aliases, &[alias]);
    let local = preds.local_for(alias);

    let inner_leaf = leaves[inner_idx].take().unwrap_or_else(|| PhysicalPlan::TableScan {
        table: ctx.table_ref(alias).clone(),
        filter: make_conjunction(local.to_vec()),
        estimate: model.table_scan(alias, local),
    });
    let rows = model.join_rows(outer.estimate(), inner_leaf.estimate(), &joins, &residual);

    if ctx.settings.sort_merge_join {
        if let Some((jp, outer_key, inner_key)) =
            merge_candidate(ctx, &joins, alias, outer_aliases.len() > 1)
        {
            let filter = leftover_filter(&joins, Some(jp), &residual);
            return merge_join_plan(
                model, outer, inner_leaf, &outer_key, &inner_key, filter, rows,
            );
        }
    }

    if ctx.settings.index_join {
        let probe = joins.iter().find_map(|jp| {
            let inner_key = jp.key_for(alias)?;
            let outer_key = jp.key_opposite(alias)?;
            let is_primary = ctx.schema(alias).index_on(&inner_key.column)?;
            Some((*jp, inner_key.clone(), outer_key.clone(), is_primary))
        });
        if let Some((jp, inner_key, outer_key, is_primary)) = probe {
            let index = index_stats_for(ctx, alias, &inner_key.column, is_primary);
            let mut filter_parts: Vec<_> = local.to_vec();
            filter_parts.extend(leftover_filter(&joins, Some(jp), &residual));
            return index_nl_join_plan(
                ctx,
                model,
                outer,
                alias,
                index,
                &outer_key,
                make_conjunction(filter_parts),
                rows,
            );
        }
    }

    block_nl_join_plan(
        model,
        outer,
        inner_leaf,
        leftover_filter(&joins, None, &residual),
        rows,
    )
}

/// An equi predicate both of whose sides can be produced sorted through an
/// existing index: the incoming table must be indexed on its key, and so
/// must the outer side unless it is already a composite result.
fn merge_candidate<'p>(
    ctx: &PlanContext,
    joins: &[&'p JoinPredicate],
    inner_alias: &str,
    outer_is_composite: bool,
) -> Option<(
    &'p JoinPredicate,
    crate::expr::ColumnRef,
    crate::expr::ColumnRef,
)> {
    joins.iter().find_map(|jp| {
        let inner_key = jp.key_for(inner_alias)?;
        let outer_key = jp.key_opposite(inner_alias)?;
        ctx.schema(inner_alias).index_on(&inner_key.column)?;
        if !outer_is_composite {
            ctx.schema(&outer_key.table).index_on(&outer_key.column)?;
        }
        Some((*jp, outer_key.clone(), inner_key.clone()))
    })
}

/// The baseline's rule-chosen access path: the first point sarg wins, then
/// the first range sarg, then a full scan. Candidate order already prefers
/// the primary key.
fn heuristic_leaf(
    ctx: &PlanContext,
    model: &CostModel,
    alias: &str,
    preds: &ClassifiedPredicates,
) -> PhysicalPlan {
    let local = preds.local_for(alias);
    let cands = candidates(ctx, model, alias, local);
    let mut choice: Option<&PhysicalPlan> = None;
    for c in cands.iter().skip(1) {
        let PhysicalPlan::IndexScan { range, .. } = c else {
            continue;
        };
        let better = match choice {
            None => true,
            Some(PhysicalPlan::IndexScan { range: current, .. }) => {
                range.is_point() && !current.is_point()
            }
            _ => false,
        };
        if better {
            choice = Some(c);
        }
    }
    choice.unwrap_or(&cands[0]).clone()
}

//! Naive strategy: a left-deep tree in declaration order.
//!
//! Each step joins the accumulated result to the next table with a block
//! nested-loop join, upgraded to an index nested-loop join when the incoming
//! table has an index on its join column. No alternatives are costed and no
//! reordering happens; this is the floor every other strategy is measured
//! against.

use crate::expr::make_conjunction;
use crate::planner::access_path::index_stats_for;
use crate::planner::cost::CostModel;
use crate::planner::join_optimizer::{
    applicable, block_nl_join_plan, index_nl_join_plan, leftover_filter,
};
use crate::planner::logical::ClassifiedPredicates;
use crate::planner::physical::PhysicalPlan;
use crate::planner::{PlanContext, PlanError, PlanResult};

pub fn plan(
    ctx: &PlanContext,
    model: &CostModel,
    preds: &ClassifiedPredicates,
) -> PlanResult<PhysicalPlan> {
    let mut joined: Vec<&str> = Vec::new();
    let mut acc: Option<PhysicalPlan> = None;

    for table in &ctx.tables {
        let alias = table.alias.as_str();
        let local = preds.local_for(alias);

        acc = Some(match acc {
            None => scan_leaf(ctx, model, alias, preds),
            Some(outer) => {
                let (joins, residual) = applicable(preds, &joined, &[alias]);
                let inner_est = model.table_scan(alias, local);
                let rows = model.join_rows(outer.estimate(), &inner_est, &joins, &residual);

                let probe = if ctx.settings.index_join {
                    joins.iter().find_map(|jp| {
                        let inner_key = jp.key_for(alias)?;
                        let outer_key = jp.key_opposite(alias)?;
                        let is_primary = ctx.schema(alias).index_on(&inner_key.column)?;
                        Some((*jp, inner_key.clone(), outer_key.clone(), is_primary))
                    })
                } else {
                    None
                };

                match probe {
                    Some((jp, inner_key, outer_key, is_primary)) => {
                        let index = index_stats_for(ctx, alias, &inner_key.column, is_primary);
                        let mut filter_parts: Vec<_> = local.to_vec();
                        filter_parts.extend(leftover_filter(&joins, Some(jp), &residual));
                        index_nl_join_plan(
                            ctx,
                            model,
                            outer,
                            alias,
                            index,
                            &outer_key,
                            make_conjunction(filter_parts),
                            rows,
                        )
                    }
                    None => {
                        let inner = scan_leaf(ctx, model, alias, preds);
                        block_nl_join_plan(
                            model,
                            outer,
                            inner,
                            leftover_filter(&joins, None, &residual),
                            rows,
                        )
                    }
                }
            }
        });
        joined.push(alias);
    }

    acc.ok_or_else(|| PlanError::NoPlanFound("query references no tables".to_string()))
}

/// The naive access path: always a full scan with the table's local filters.
fn scan_leaf(
    ctx: &PlanContext,
    model: &CostModel,
    alias: &str,
    preds: &ClassifiedPredicates,
) -> PhysicalPlan {
    let local = preds.local_for(alias);
    PhysicalPlan::TableScan {
        table: ctx.table_ref(alias).clone(),
        filter: make_conjunction(local.to_vec()),
        estimate: model.table_scan(alias, local),
    }
}

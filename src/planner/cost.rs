//! The cost model: statistics in, estimated I/O and cardinality out.
//!
//! Everything here is a pure function of the planning context captured at the
//! start of the optimization call, so repeated plans over an unchanged
//! catalog are identical. Edge inputs (empty tables, zero distinct values)
//! clamp to 1 rather than raising, which keeps relative comparisons
//! meaningful.
//!
//! The I/O unit is one row touched; B+tree access pays the tree height plus
//! one leaf read per `INDEX_FANOUT` matching entries, and secondary indexes
//! pay one base-row fetch per match.

use crate::catalog::stats::{IndexStats, INDEX_FANOUT};
use crate::catalog::TableStats;
use crate::expr::{BinaryOp, ColumnRef, Expr};
use crate::planner::logical::JoinPredicate;
use crate::planner::physical::{KeyRange, PlanEstimate};
use crate::planner::PlanContext;
use crate::types::Value;

/// Fallback selectivity of an equality over an unanalyzed column.
pub const DEFAULT_EQ_SELECTIVITY: f64 = 0.1;

/// Fallback selectivity of a range comparison.
pub const DEFAULT_RANGE_SELECTIVITY: f64 = 1.0 / 3.0;

/// Fallback selectivity of anything we cannot decompose.
pub const DEFAULT_SELECTIVITY: f64 = 0.5;

pub struct CostModel<'a> {
    ctx: &'a PlanContext,
}

impl<'a> CostModel<'a> {
    pub fn new(ctx: &'a PlanContext) -> Self {
        Self { ctx }
    }

    fn stats(&self, alias: &str) -> &TableStats {
        self.ctx.stats(alias)
    }

    /// Distinct values of a column per its base-table statistics, clamped to
    /// at least 1. Unanalyzed columns assume the equality-default fraction of
    /// the table is duplicated per value.
    pub fn column_distinct(&self, col: &ColumnRef) -> u64 {
        let stats = self.stats(&col.table);
        match stats.column(&col.column) {
            Some(cs) => cs.distinct_count.max(1),
            None => {
                let assumed = (1.0 / DEFAULT_EQ_SELECTIVITY) as u64;
                assumed.min(stats.row_count.max(1))
            }
        }
    }

    /// Fraction of a table's rows expected to satisfy `predicate`.
    pub fn selectivity(&self, predicate: &Expr) -> f64 {
        if let Expr::BinaryOp { left, op, right } = predicate {
            match op {
                BinaryOp::And => {
                    return self.selectivity(left) * self.selectivity(right);
                }
                BinaryOp::Or => {
                    let l = self.selectivity(left);
                    let r = self.selectivity(right);
                    return (l + r - l * r).clamp(0.0, 1.0);
                }
                _ => {}
            }
        }
        if let Some((col, op, value)) = predicate.column_literal_bound() {
            return self.bound_selectivity(col, op, &value);
        }
        if let Some((l, op, r)) = predicate.columns_joining() {
            return match op {
                BinaryOp::Eq => {
                    1.0 / self.column_distinct(l).max(self.column_distinct(r)) as f64
                }
                BinaryOp::Ne => {
                    1.0 - 1.0 / self.column_distinct(l).max(self.column_distinct(r)) as f64
                }
                _ => DEFAULT_RANGE_SELECTIVITY,
            };
        }
        DEFAULT_SELECTIVITY
    }

    /// Combined selectivity of a conjunction.
    pub fn combined_selectivity<'e>(&self, preds: impl IntoIterator<Item = &'e Expr>) -> f64 {
        preds.into_iter().map(|p| self.selectivity(p)).product()
    }

    /// Selectivity of "column op literal" from column statistics.
    fn bound_selectivity(&self, col: &ColumnRef, op: BinaryOp, value: &Value) -> f64 {
        let stats = self.stats(&col.table);
        let col_stats = stats.column(&col.column);
        match op {
            BinaryOp::Eq => match col_stats {
                Some(cs) => 1.0 / cs.distinct_count.max(1) as f64,
                None => DEFAULT_EQ_SELECTIVITY,
            },
            BinaryOp::Ne => match col_stats {
                Some(cs) => 1.0 - 1.0 / cs.distinct_count.max(1) as f64,
                None => 1.0 - DEFAULT_EQ_SELECTIVITY,
            },
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                let (Some(cs), Some(v)) = (col_stats, value.as_f64()) else {
                    return DEFAULT_RANGE_SELECTIVITY;
                };
                let (Some(min), Some(max)) = (cs.min, cs.max) else {
                    return DEFAULT_RANGE_SELECTIVITY;
                };
                let span = max - min;
                if span <= 0.0 {
                    return DEFAULT_RANGE_SELECTIVITY;
                }
                let fraction = match op {
                    BinaryOp::Lt | BinaryOp::Lte => (v - min) / span,
                    _ => (max - v) / span,
                };
                fraction.clamp(0.0, 1.0)
            }
            _ => DEFAULT_SELECTIVITY,
        }
    }

    /// Fraction of a table's rows inside an index search range: the covered
    /// share of the column's [min, max] domain.
    pub fn range_selectivity(&self, col: &ColumnRef, range: &KeyRange) -> f64 {
        if range.is_point() {
            return match range.lower.as_ref().map(|b| b.value.clone()) {
                Some(v) => self.bound_selectivity(col, BinaryOp::Eq, &v),
                None => DEFAULT_EQ_SELECTIVITY,
            };
        }
        let stats = self.stats(&col.table);
        let domain = stats
            .column(&col.column)
            .and_then(|cs| cs.min.zip(cs.max));
        let (Some((min, max)), bounds) = (domain, (&range.lower, &range.upper)) else {
            return DEFAULT_RANGE_SELECTIVITY;
        };
        let span = max - min;
        if span <= 0.0 {
            return DEFAULT_RANGE_SELECTIVITY;
        }
        let lo = bounds
            .0
            .as_ref()
            .and_then(|b| b.value.as_f64())
            .map_or(min, |v| v.max(min));
        let hi = bounds
            .1
            .as_ref()
            .and_then(|b| b.value.as_f64())
            .map_or(max, |v| v.min(max));
        ((hi - lo) / span).clamp(0.0, 1.0)
    }

    // ---- sorting ----

    /// Extra merge passes an external sort of `rows` needs beyond the
    /// streamed final merge.
    pub fn sort_passes(&self, rows: u64) -> u64 {
        let buffers = &self.ctx.settings.buffers;
        let run_size = buffers.sort_buffer.max(3);
        let final_fan_in = buffers.sort_final_buffer.max(2);
        let mut runs = div_ceil(rows.max(1), run_size);
        let mut passes = 0;
        while runs > final_fan_in {
            passes += 1;
            runs = div_ceil(runs, run_size - 1);
        }
        passes
    }

    /// I/O charged for sorting `rows`: one read and one write per extra pass.
    pub fn sort_io(&self, rows: u64) -> u64 {
        2 * rows * self.sort_passes(rows)
    }

    /// Estimate for a sort operator on `key`.
    pub fn sort(&self, input: &PlanEstimate, key: &ColumnRef) -> PlanEstimate {
        PlanEstimate {
            rows: input.rows,
            io: input.io + self.sort_io(input.rows),
            sorted_on: Some(key.clone()),
        }
    }

    // ---- base-table access ----

    /// Estimate for a full scan with pushed-down filter conjuncts. The output
    /// inherits primary-key order (tables are clustered by their primary key).
    pub fn table_scan(&self, alias: &str, filters: &[Expr]) -> PlanEstimate {
        let stats = self.stats(alias);
        let selectivity = self.combined_selectivity(filters);
        let sorted_on = self
            .ctx
            .schema(alias)
            .primary_key
            .map(|i| ColumnRef::new(alias, self.ctx.schema(alias).columns[i].name.clone()));
        PlanEstimate {
            rows: scaled_rows(stats.row_count, selectivity),
            io: stats.row_count.max(1),
            sorted_on,
        }
    }

    /// Estimate for an index scan: `range` bounds the indexed `column`,
    /// `residual` filters are applied to the matches for free.
    pub fn index_scan(
        &self,
        alias: &str,
        column: &str,
        index: &IndexStats,
        range: &KeyRange,
        residual: &[Expr],
    ) -> PlanEstimate {
        let stats = self.stats(alias);
        let col = ColumnRef::new(alias, column);
        let matching = scaled_rows(stats.row_count, self.range_selectivity(&col, range));
        PlanEstimate {
            rows: scaled_rows(matching, self.combined_selectivity(residual)),
            io: self.index_access_io(index, matching),
            sorted_on: Some(col),
        }
    }

    /// I/O for reading `matches` entries out of an index: descend the tree,
    /// read the covering leaves, and for a secondary index fetch each base
    /// row separately.
    pub fn index_access_io(&self, index: &IndexStats, matches: u64) -> u64 {
        let leaf_reads = div_ceil(matches.max(1), INDEX_FANOUT);
        let base_fetches = if index.is_primary { 0 } else { matches.max(1) };
        index.height + leaf_reads + base_fetches
    }

    // ---- joins ----

    /// Joined output cardinality: the cross product scaled by every join
    /// predicate's selectivity (the equality case reduces to the inclusion
    /// estimate rows_l * rows_r / max(distinct_l, distinct_r)).
    pub fn join_rows(
        &self,
        left: &PlanEstimate,
        right: &PlanEstimate,
        preds: &[&JoinPredicate],
        residual: &[&Expr],
    ) -> u64 {
        let mut selectivity: f64 = preds.iter().map(|p| self.selectivity(&p.expr)).product();
        selectivity *= residual
            .iter()
            .map(|e| self.selectivity(e))
            .product::<f64>();
        scaled_rows_f(left.rows as f64 * right.rows as f64, selectivity)
    }

    /// Merge join of two inputs already sorted on the keys.
    pub fn merge_join(
        &self,
        left: &PlanEstimate,
        right: &PlanEstimate,
        left_key: &ColumnRef,
        rows: u64,
    ) -> PlanEstimate {
        PlanEstimate {
            rows,
            io: left.io + right.io + left.rows + right.rows,
            sorted_on: Some(left_key.clone()),
        }
    }

    /// Index nested-loop join: one index descent per outer row.
    pub fn index_nl_join(
        &self,
        outer: &PlanEstimate,
        inner_alias: &str,
        index: &IndexStats,
        rows: u64,
    ) -> PlanEstimate {
        let inner_stats = self.stats(inner_alias);
        let key = ColumnRef::new(inner_alias, index.column.clone());
        let per_probe = div_ceil(
            inner_stats.row_count.max(1),
            self.column_distinct(&key),
        );
        PlanEstimate {
            rows,
            io: outer.io + outer.rows * self.index_access_io(index, per_probe),
            sorted_on: outer.sorted_on.clone(),
        }
    }

    /// Block nested-loop join: the right side is consumed once per buffered
    /// block of the left.
    pub fn block_nl_join(
        &self,
        left: &PlanEstimate,
        right: &PlanEstimate,
        rows: u64,
    ) -> PlanEstimate {
        let passes = div_ceil(left.rows.max(1), self.ctx.settings.buffers.bnlj_buffer.max(1));
        PlanEstimate {
            rows,
            io: left.io + passes.max(1) * right.io,
            sorted_on: None,
        }
    }

    /// Hash join: recursive partitioning passes depend on the build side.
    pub fn hash_join(&self, left: &PlanEstimate, right: &PlanEstimate, rows: u64) -> PlanEstimate {
        let fan_out = self.ctx.settings.buffers.hash_buffer.max(3) - 1;
        let build = left.rows.max(1) as f64;
        let passes = (build.ln() / (fan_out as f64).ln()).floor().max(0.0) as u64;
        PlanEstimate {
            rows,
            io: left.io + right.io + 2 * (left.rows + right.rows) * passes,
            sorted_on: None,
        }
    }
}

/// Ceiling division on row counts.
pub fn div_ceil(a: u64, b: u64) -> u64 {
    let b = b.max(1);
    a.div_ceil(b).max(1)
}

fn scaled_rows(rows: u64, selectivity: f64) -> u64 {
    scaled_rows_f(rows as f64, selectivity)
}

fn scaled_rows_f(rows: f64, selectivity: f64) -> u64 {
    (rows * selectivity.clamp(0.0, 1.0)).round().max(1.0) as u64
}

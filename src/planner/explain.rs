//! Plan rendering for EXPLAIN-style output and debug logging.

use std::fmt::Write;

use crate::planner::physical::PhysicalPlan;

/// Format a physical plan as an indented tree, one operator per line with
/// its estimated rows and cumulative I/O.
pub fn render(plan: &PhysicalPlan) -> String {
    let mut out = String::new();
    render_node(plan, 0, &mut out);
    out
}

/// The scalar the fixtures assert on.
pub fn summary(plan: &PhysicalPlan) -> String {
    format!("Estimated IO: {}", plan.estimated_io())
}

fn render_node(plan: &PhysicalPlan, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);
    let est = plan.estimate();
    let _ = match plan {
        PhysicalPlan::TableScan { table, filter, .. } => {
            let _ = write!(out, "{}TableScan: {}", prefix, table.alias);
            if let Some(f) = filter {
                let _ = write!(out, " filter {}", f);
            }
            writeln!(out, " (rows={}, io={})", est.rows, est.io)
        }
        PhysicalPlan::IndexScan {
            table,
            column,
            primary,
            range,
            filter,
            ..
        } => {
            let kind = if *primary { "primary" } else { "secondary" };
            let _ = write!(
                out,
                "{}IndexScan: {}.{} {} {}",
                prefix, table.alias, column, kind, range
            );
            if let Some(f) = filter {
                let _ = write!(out, " filter {}", f);
            }
            writeln!(out, " (rows={}, io={})", est.rows, est.io)
        }
        PhysicalPlan::Sort { key, .. } => {
            writeln!(out, "{}Sort: {} (rows={}, io={})", prefix, key, est.rows, est.io)
        }
        PhysicalPlan::MergeJoin {
            left_key,
            right_key,
            filter,
            ..
        } => {
            let _ = write!(out, "{}MergeJoin: {} = {}", prefix, left_key, right_key);
            if let Some(f) = filter {
                let _ = write!(out, " filter {}", f);
            }
            writeln!(out, " (rows={}, io={})", est.rows, est.io)
        }
        PhysicalPlan::IndexNlJoin {
            inner,
            inner_column,
            inner_primary,
            outer_key,
            filter,
            ..
        } => {
            let kind = if *inner_primary { "primary" } else { "secondary" };
            let _ = write!(
                out,
                "{}IndexNLJoin: {} -> {}.{} ({})",
                prefix, outer_key, inner.alias, inner_column, kind
            );
            if let Some(f) = filter {
                let _ = write!(out, " filter {}", f);
            }
            writeln!(out, " (rows={}, io={})", est.rows, est.io)
        }
        PhysicalPlan::BlockNlJoin { predicate, .. } => {
            let _ = write!(out, "{}BlockNLJoin:", prefix);
            match predicate {
                Some(p) => {
                    let _ = write!(out, " {}", p);
                }
                None => {
                    let _ = write!(out, " cross");
                }
            }
            writeln!(out, " (rows={}, io={})", est.rows, est.io)
        }
        PhysicalPlan::HashJoin {
            left_key,
            right_key,
            filter,
            ..
        } => {
            let _ = write!(out, "{}HashJoin: {} = {}", prefix, left_key, right_key);
            if let Some(f) = filter {
                let _ = write!(out, " filter {}", f);
            }
            writeln!(out, " (rows={}, io={})", est.rows, est.io)
        }
        PhysicalPlan::Project { columns, .. } => {
            let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            writeln!(
                out,
                "{}Project: [{}] (rows={}, io={})",
                prefix,
                names.join(", "),
                est.rows,
                est.io
            )
        }
    };
    for child in plan.children() {
        render_node(child, indent + 1, out);
    }
}

//! Tests for explain rendering.

use std::sync::Arc;

use quarry::catalog::{Catalog, MemoryTable, StatsCatalog, TableSchema};
use quarry::config::{PlannerMode, PlannerSettings};
use quarry::expr::{BinaryOp, Expr};
use quarry::planner::logical::{LogicalQuery, TableRef};
use quarry::planner::{explain, Planner};
use quarry::types::{Value, ValueType};

fn fixture() -> (Catalog, StatsCatalog) {
    let orders = TableSchema::new("orders")
        .column("id", ValueType::Integer)
        .column("customer_id", ValueType::Integer)
        .primary_key("id")
        .secondary_index("customer_id");
    let o = MemoryTable::new(orders);
    for i in 0..5000i64 {
        o.push_row(vec![Value::Int(i), Value::Int(i % 500)]);
    }
    let customers = TableSchema::new("customers")
        .column("id", ValueType::Integer)
        .primary_key("id");
    let c = MemoryTable::new(customers);
    for i in 0..500i64 {
        c.push_row(vec![Value::Int(i)]);
    }
    let catalog = Catalog::new();
    catalog.register(Arc::new(o));
    catalog.register(Arc::new(c));
    let stats = StatsCatalog::new();
    stats.analyze_all(&catalog);
    (catalog, stats)
}

fn query() -> LogicalQuery {
    LogicalQuery::new(vec![TableRef::bare("orders"), TableRef::bare("customers")])
        .filter(Expr::binary(
            Expr::column("orders", "customer_id"),
            BinaryOp::Eq,
            Expr::column("customers", "id"),
        ))
        .filter(Expr::binary(
            Expr::column("customers", "id"),
            BinaryOp::Gt,
            Expr::int(400),
        ))
}

#[test]
fn test_render_lists_every_operator_with_estimates() {
    let (catalog, stats) = fixture();
    let settings = PlannerSettings::with_mode(PlannerMode::CostBased);

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query())
        .unwrap();
    let rendered = explain::render(&plan);

    // one line per operator, each carrying rows and io
    assert_eq!(rendered.lines().count(), plan_node_count(&plan));
    for line in rendered.lines() {
        assert!(line.contains("rows="), "missing estimate in {:?}", line);
        assert!(line.contains("io="), "missing estimate in {:?}", line);
    }
}

fn plan_node_count(plan: &quarry::planner::physical::PhysicalPlan) -> usize {
    1 + plan
        .children()
        .iter()
        .map(|c| plan_node_count(c))
        .sum::<usize>()
}

#[test]
fn test_summary_reports_the_root_io() {
    let (catalog, stats) = fixture();
    let settings = PlannerSettings::with_mode(PlannerMode::CostBased);

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query())
        .unwrap();

    assert_eq!(
        explain::summary(&plan),
        format!("Estimated IO: {}", plan.estimated_io())
    );
}

#[test]
fn test_children_are_indented_under_parents() {
    let (catalog, stats) = fixture();
    let settings = PlannerSettings::with_mode(PlannerMode::Naive);

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query())
        .unwrap();
    let rendered = explain::render(&plan);

    let mut lines = rendered.lines();
    let root = lines.next().unwrap();
    assert!(!root.starts_with(' '));
    assert!(lines.all(|l| l.starts_with("  ")));
}

#[test]
fn test_render_names_the_index_and_range() {
    let (catalog, stats) = fixture();
    let settings = PlannerSettings::with_mode(PlannerMode::CostBased);
    let single = LogicalQuery::new(vec![TableRef::bare("customers")]).filter(Expr::binary(
        Expr::column("customers", "id"),
        BinaryOp::Gt,
        Expr::int(400),
    ));

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&single)
        .unwrap();
    let rendered = explain::render(&plan);

    assert!(rendered.contains("IndexScan: customers.id primary"));
    assert!(rendered.contains("(400,"));
}

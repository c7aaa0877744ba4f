//! Tests for the naive planning mode.

use std::sync::Arc;

use quarry::catalog::{Catalog, MemoryTable, StatsCatalog, TableSchema};
use quarry::config::{PlannerMode, PlannerSettings};
use quarry::expr::{BinaryOp, Expr};
use quarry::planner::logical::{LogicalQuery, TableRef};
use quarry::planner::physical::{JoinAlgorithm, PhysicalPlan};
use quarry::planner::Planner;
use quarry::types::{Value, ValueType};

fn shop_catalog() -> (Catalog, StatsCatalog) {
    let orders = TableSchema::new("orders")
        .column("id", ValueType::Integer)
        .column("customer_id", ValueType::Integer)
        .column("amount", ValueType::Float)
        .primary_key("id")
        .secondary_index("customer_id");
    let o = MemoryTable::new(orders);
    for i in 0..20_000i64 {
        o.push_row(vec![
            Value::Int(i),
            Value::Int(i % 2000),
            Value::Float((i % 1000) as f64 / 1000.0),
        ]);
    }

    let customers = TableSchema::new("customers")
        .column("id", ValueType::Integer)
        .column("region", ValueType::Integer)
        .primary_key("id");
    let c = MemoryTable::new(customers);
    for i in 0..2000i64 {
        c.push_row(vec![Value::Int(i), Value::Int(i % 100)]);
    }

    let catalog = Catalog::new();
    catalog.register(Arc::new(o));
    catalog.register(Arc::new(c));
    let stats = StatsCatalog::new();
    stats.analyze_all(&catalog);
    (catalog, stats)
}

fn shop_query() -> LogicalQuery {
    LogicalQuery::new(vec![TableRef::bare("orders"), TableRef::bare("customers")]).filter(
        Expr::binary(
            Expr::column("orders", "customer_id"),
            BinaryOp::Eq,
            Expr::column("customers", "id"),
        ),
    )
}

fn settings() -> PlannerSettings {
    PlannerSettings::with_mode(PlannerMode::Naive)
}

fn check_cumulative_io(plan: &PhysicalPlan) {
    let children_io: u64 = plan.children().iter().map(|c| c.estimated_io()).sum();
    assert!(
        plan.estimated_io() >= children_io,
        "io {} under children {}",
        plan.estimated_io(),
        children_io
    );
    for child in plan.children() {
        check_cumulative_io(child);
    }
}

#[test]
fn test_leaves_follow_declaration_order() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&shop_query())
        .unwrap();

    assert_eq!(plan.leaf_order(), vec!["orders", "customers"]);
}

#[test]
fn test_declaration_order_holds_even_when_reversed() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();
    let query = LogicalQuery::new(vec![TableRef::bare("customers"), TableRef::bare("orders")])
        .filter(Expr::binary(
            Expr::column("orders", "customer_id"),
            BinaryOp::Eq,
            Expr::column("customers", "id"),
        ));

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query)
        .unwrap();

    assert_eq!(plan.leaf_order(), vec!["customers", "orders"]);
}

#[test]
fn test_uses_index_join_on_indexed_join_column() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&shop_query())
        .unwrap();

    // customers.id is the primary key, so the second table is probed
    assert!(plan.uses_algorithm(JoinAlgorithm::IndexNlJoin));
    assert!(!plan.uses_algorithm(JoinAlgorithm::MergeJoin));
    assert!(!plan.uses_algorithm(JoinAlgorithm::HashJoin));
}

#[test]
fn test_falls_back_to_block_nl_without_index_join() {
    let (catalog, stats) = shop_catalog();
    let mut settings = settings();
    settings.index_join = false;

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&shop_query())
        .unwrap();

    assert!(!plan.uses_algorithm(JoinAlgorithm::IndexNlJoin));
    assert!(plan.uses_algorithm(JoinAlgorithm::BlockNlJoin));
}

#[test]
fn test_single_table_gets_a_full_scan() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();
    let query = LogicalQuery::new(vec![TableRef::bare("customers")]).filter(Expr::binary(
        Expr::column("customers", "id"),
        BinaryOp::Gt,
        Expr::int(100),
    ));

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query)
        .unwrap();

    assert!(matches!(plan, PhysicalPlan::TableScan { .. }));
}

#[test]
fn test_io_is_cumulative_up_the_tree() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&shop_query())
        .unwrap();

    check_cumulative_io(&plan);
}

#[test]
fn test_cross_product_when_no_predicate() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();
    let query = LogicalQuery::new(vec![TableRef::bare("orders"), TableRef::bare("customers")]);

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query)
        .unwrap();

    assert!(plan.uses_algorithm(JoinAlgorithm::BlockNlJoin));
    assert_eq!(plan.leaf_order(), vec!["orders", "customers"]);
}

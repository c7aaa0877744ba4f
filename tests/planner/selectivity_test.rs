//! Tests for predicate selectivity estimation.

use std::sync::Arc;

use quarry::catalog::{Catalog, MemoryTable, StatsCatalog, TableSchema};
use quarry::config::PlannerSettings;
use quarry::expr::{BinaryOp, Expr};
use quarry::planner::cost::CostModel;
use quarry::planner::logical::{LogicalQuery, TableRef};
use quarry::planner::PlanContext;
use quarry::types::{Value, ValueType};

fn fixture() -> (Catalog, StatsCatalog) {
    let schema = TableSchema::new("orders")
        .column("id", ValueType::Integer)
        .column("region", ValueType::Integer)
        .column("amount", ValueType::Float)
        .primary_key("id");
    let table = MemoryTable::new(schema);
    for i in 0..1000i64 {
        table.push_row(vec![
            Value::Int(i),
            Value::Int(i % 100),
            Value::Float((i % 100) as f64 / 100.0),
        ]);
    }
    let catalog = Catalog::new();
    catalog.register(Arc::new(table));
    let stats = StatsCatalog::new();
    stats.analyze_all(&catalog);
    (catalog, stats)
}

fn context(catalog: &Catalog, stats: &StatsCatalog) -> PlanContext {
    let query = LogicalQuery::new(vec![TableRef::bare("orders")]);
    PlanContext::capture(catalog, stats, &PlannerSettings::default(), &query).unwrap()
}

#[test]
fn test_equality_uses_distinct_count() {
    let (catalog, stats) = fixture();
    let ctx = context(&catalog, &stats);
    let model = CostModel::new(&ctx);

    // region has 100 distinct values
    let sel = model.selectivity(&Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Eq,
        Expr::int(7),
    ));
    assert!((sel - 0.01).abs() < 1e-9);
}

#[test]
fn test_range_uses_domain_fraction() {
    let (catalog, stats) = fixture();
    let ctx = context(&catalog, &stats);
    let model = CostModel::new(&ctx);

    // region spans [0, 99]; region > 49 covers half the domain
    let sel = model.selectivity(&Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Gt,
        Expr::int(49),
    ));
    assert!((sel - 50.0 / 99.0).abs() < 1e-9);
}

#[test]
fn test_range_clamps_out_of_domain_bounds() {
    let (catalog, stats) = fixture();
    let ctx = context(&catalog, &stats);
    let model = CostModel::new(&ctx);

    let below = model.selectivity(&Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Lt,
        Expr::int(-5),
    ));
    let above = model.selectivity(&Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Lt,
        Expr::int(500),
    ));
    assert_eq!(below, 0.0);
    assert_eq!(above, 1.0);
}

#[test]
fn test_conjunction_multiplies_disjunction_unions() {
    let (catalog, stats) = fixture();
    let ctx = context(&catalog, &stats);
    let model = CostModel::new(&ctx);

    let eq = Expr::binary(Expr::column("orders", "region"), BinaryOp::Eq, Expr::int(7));
    let gt = Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Gt,
        Expr::int(49),
    );

    let s_eq = model.selectivity(&eq);
    let s_gt = model.selectivity(&gt);
    let s_and = model.selectivity(&Expr::binary(eq.clone(), BinaryOp::And, gt.clone()));
    let s_or = model.selectivity(&Expr::binary(eq, BinaryOp::Or, gt));

    assert!((s_and - s_eq * s_gt).abs() < 1e-9);
    assert!((s_or - (s_eq + s_gt - s_eq * s_gt)).abs() < 1e-9);
}

#[test]
fn test_literal_arithmetic_folds_before_estimation() {
    let (catalog, stats) = fixture();
    let ctx = context(&catalog, &stats);
    let model = CostModel::new(&ctx);

    // region > 40 + 9 estimates like region > 49
    let folded = Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Gt,
        Expr::binary(Expr::int(40), BinaryOp::Add, Expr::int(9)),
    );
    let plain = Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Gt,
        Expr::int(49),
    );
    assert_eq!(model.selectivity(&folded), model.selectivity(&plain));
}

#[test]
fn test_unanalyzed_column_uses_defaults() {
    let catalog = Catalog::new();
    let schema = TableSchema::new("orders")
        .column("id", ValueType::Integer)
        .column("region", ValueType::Integer)
        .primary_key("id");
    catalog.register(Arc::new(MemoryTable::new(schema)));
    // no ANALYZE: the planner falls back to conservative defaults
    let stats = StatsCatalog::new();
    let ctx = context(&catalog, &stats);
    let model = CostModel::new(&ctx);

    let eq = model.selectivity(&Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Eq,
        Expr::int(1),
    ));
    let gt = model.selectivity(&Expr::binary(
        Expr::column("orders", "region"),
        BinaryOp::Gt,
        Expr::int(1),
    ));
    assert!((eq - 0.1).abs() < 1e-9);
    assert!((gt - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_column_to_column_equality() {
    let catalog = Catalog::new();
    let orders = TableSchema::new("orders")
        .column("id", ValueType::Integer)
        .column("customer_id", ValueType::Integer)
        .primary_key("id");
    let customers = TableSchema::new("customers")
        .column("id", ValueType::Integer)
        .primary_key("id");
    let o = MemoryTable::new(orders);
    for i in 0..1000i64 {
        o.push_row(vec![Value::Int(i), Value::Int(i % 50)]);
    }
    let c = MemoryTable::new(customers);
    for i in 0..50i64 {
        c.push_row(vec![Value::Int(i)]);
    }
    catalog.register(Arc::new(o));
    catalog.register(Arc::new(c));
    let stats = StatsCatalog::new();
    stats.analyze_all(&catalog);

    let query = LogicalQuery::new(vec![TableRef::bare("orders"), TableRef::bare("customers")]);
    let ctx = PlanContext::capture(&catalog, &stats, &PlannerSettings::default(), &query).unwrap();
    let model = CostModel::new(&ctx);

    // inclusion principle: 1 / max(distinct sides) = 1/50
    let sel = model.selectivity(&Expr::binary(
        Expr::column("orders", "customer_id"),
        BinaryOp::Eq,
        Expr::column("customers", "id"),
    ));
    assert!((sel - 1.0 / 50.0).abs() < 1e-9);
}

#[test]
fn test_zero_distinct_never_divides_by_zero() {
    let catalog = Catalog::new();
    let schema = TableSchema::new("empty")
        .column("id", ValueType::Integer)
        .primary_key("id");
    catalog.register(Arc::new(MemoryTable::new(schema)));
    let stats = StatsCatalog::new();
    stats.analyze_all(&catalog);

    let query = LogicalQuery::new(vec![TableRef::bare("empty")]);
    let ctx = PlanContext::capture(&catalog, &stats, &PlannerSettings::default(), &query).unwrap();
    let model = CostModel::new(&ctx);

    let sel = model.selectivity(&Expr::binary(
        Expr::column("empty", "id"),
        BinaryOp::Eq,
        Expr::int(1),
    ));
    assert!(sel.is_finite());
    assert!(sel > 0.0);
}

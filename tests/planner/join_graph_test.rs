//! Tests for the join graph.

use std::sync::Arc;

use quarry::catalog::{Catalog, MemoryTable, StatsCatalog, TableSchema};
use quarry::config::PlannerSettings;
use quarry::expr::{BinaryOp, Expr};
use quarry::planner::join_optimizer::join_graph::JoinGraph;
use quarry::planner::logical::{classify, LogicalQuery, TableRef};
use quarry::planner::PlanContext;
use quarry::types::ValueType;

fn register(catalog: &Catalog, name: &str) {
    let schema = TableSchema::new(name)
        .column("id", ValueType::Integer)
        .column("fk", ValueType::Integer)
        .primary_key("id");
    catalog.register(Arc::new(MemoryTable::new(schema)));
}

fn eq(left: (&str, &str), right: (&str, &str)) -> Expr {
    Expr::binary(
        Expr::column(left.0, left.1),
        BinaryOp::Eq,
        Expr::column(right.0, right.1),
    )
}

fn build(query: &LogicalQuery) -> JoinGraph {
    let catalog = Catalog::new();
    for t in &query.tables {
        register(&catalog, &t.name);
    }
    let stats = StatsCatalog::new();
    let ctx = PlanContext::capture(&catalog, &stats, &PlannerSettings::default(), query).unwrap();
    let preds = classify(query);
    JoinGraph::build(&ctx, &preds)
}

#[test]
fn test_chain_is_fully_connected() {
    let query = LogicalQuery::new(vec![
        TableRef::bare("a"),
        TableRef::bare("b"),
        TableRef::bare("c"),
    ])
    .filter(eq(("a", "id"), ("b", "fk")))
    .filter(eq(("b", "id"), ("c", "fk")));

    let graph = build(&query);

    assert_eq!(graph.table_count(), 3);
    assert!(graph.fully_connected());
}

#[test]
fn test_missing_predicate_disconnects() {
    let query = LogicalQuery::new(vec![
        TableRef::bare("a"),
        TableRef::bare("b"),
        TableRef::bare("c"),
    ])
    .filter(eq(("a", "id"), ("b", "fk")));

    let graph = build(&query);

    assert!(!graph.fully_connected());
}

#[test]
fn test_sets_joinable_respects_the_split() {
    // chain a - b - c: {a} joins {b, c}, but {a} does not join {c}
    let query = LogicalQuery::new(vec![
        TableRef::bare("a"),
        TableRef::bare("b"),
        TableRef::bare("c"),
    ])
    .filter(eq(("a", "id"), ("b", "fk")))
    .filter(eq(("b", "id"), ("c", "fk")));

    let graph = build(&query);

    assert!(graph.sets_joinable(0b001, 0b110));
    assert!(graph.sets_joinable(0b011, 0b100));
    assert!(!graph.sets_joinable(0b001, 0b100));
}

#[test]
fn test_single_table_is_connected() {
    let query = LogicalQuery::new(vec![TableRef::bare("a")]);

    let graph = build(&query);

    assert!(graph.fully_connected());
}

#[test]
fn test_joinable_with_set() {
    let query = LogicalQuery::new(vec![
        TableRef::bare("a"),
        TableRef::bare("b"),
        TableRef::bare("c"),
    ])
    .filter(eq(("a", "id"), ("b", "fk")))
    .filter(eq(("b", "id"), ("c", "fk")));

    let graph = build(&query);

    assert!(graph.joinable_with_set(0b001, 1));
    assert!(!graph.joinable_with_set(0b001, 2));
}

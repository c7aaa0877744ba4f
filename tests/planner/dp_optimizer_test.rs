//! Tests for the cost-based subset-DP optimizer.

use std::sync::Arc;

use quarry::catalog::{Catalog, MemoryTable, StatsCatalog, TableSchema};
use quarry::config::{PlannerMode, PlannerSettings};
use quarry::expr::{BinaryOp, Expr};
use quarry::planner::join_optimizer::dp::{splits, subsets_of_size, TableSet};
use quarry::planner::logical::{LogicalQuery, TableRef};
use quarry::planner::physical::JoinAlgorithm;
use quarry::planner::Planner;
use quarry::types::{Value, ValueType};

#[test]
fn test_table_set_membership() {
    let set = TableSet(0b101);

    assert_eq!(set.size(), 2);
    assert!(set.contains(0));
    assert!(!set.contains(1));
    assert!(set.contains(2));
    assert_eq!(set.indices(), vec![0, 2]);
}

#[test]
fn test_table_set_single_and_full() {
    assert_eq!(TableSet::single(3), TableSet(0b1000));
    assert_eq!(TableSet::full(3), TableSet(0b111));
}

#[test]
fn test_subsets_of_size_counts() {
    assert_eq!(subsets_of_size(3, 1).len(), 3);
    assert_eq!(subsets_of_size(3, 2).len(), 3);
    assert_eq!(subsets_of_size(3, 3).len(), 1);
    assert_eq!(subsets_of_size(4, 2).len(), 6);
    assert!(subsets_of_size(3, 0).is_empty());
    assert!(subsets_of_size(3, 4).is_empty());
}

#[test]
fn test_subsets_enumerate_in_ascending_mask_order() {
    let masks: Vec<u64> = subsets_of_size(4, 2).iter().map(|s| s.0).collect();
    let mut sorted = masks.clone();
    sorted.sort();
    assert_eq!(masks, sorted);
}

#[test]
fn test_splits_cover_both_orientations() {
    let out = splits(TableSet(0b11));

    assert_eq!(out.len(), 2);
    assert!(out.contains(&(TableSet(0b01), TableSet(0b10))));
    assert!(out.contains(&(TableSet(0b10), TableSet(0b01))));
}

#[test]
fn test_splits_exclude_empty_and_full() {
    for (s1, s2) in splits(TableSet(0b111)) {
        assert!(s1.size() >= 1);
        assert!(s2.size() >= 1);
        assert_eq!(s1.0 | s2.0, 0b111);
        assert_eq!(s1.0 & s2.0, 0);
    }
    assert_eq!(splits(TableSet(0b111)).len(), 6);
}

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

fn filtered_query() -> LogicalQuery {
    LogicalQuery::new(vec![TableRef::bare("orders"), TableRef::bare("customers")])
        .filter(Expr::binary(
            Expr::column("orders", "customer_id"),
            BinaryOp::Eq,
            Expr::column("customers", "id"),
        ))
        .filter(Expr::binary(
            Expr::column("customers", "region"),
            BinaryOp::Gt,
            Expr::int(30),
        ))
        .filter(Expr::binary(
            Expr::column("customers", "id"),
            BinaryOp::Gt,
            Expr::int(333),
        ))
        .filter(Expr::binary(
            Expr::column("orders", "amount"),
            BinaryOp::Gt,
            Expr::float(0.1),
        ))
}

fn settings() -> PlannerSettings {
    PlannerSettings::with_mode(PlannerMode::CostBased)
}

#[test]
fn test_drives_index_join_from_the_filtered_small_side() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&filtered_query())
        .unwrap();

    // the filtered customers scan drives probes into orders.customer_id,
    // the reverse of declaration order
    assert!(plan.uses_algorithm(JoinAlgorithm::IndexNlJoin));
    assert_eq!(plan.leaf_order(), vec!["customers", "orders"]);
}

#[test]
fn test_single_table_picks_cheapest_access_path() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();
    let query = LogicalQuery::new(vec![TableRef::bare("customers")]).filter(Expr::binary(
        Expr::column("customers", "id"),
        BinaryOp::Gt,
        Expr::int(1900),
    ));

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query)
        .unwrap();

    // the narrow primary range beats scanning 2000 rows
    assert!(plan.estimated_io() < 2000);
}

#[test]
fn test_disabled_algorithms_never_appear() {
    let (catalog, stats) = shop_catalog();
    let mut settings = settings();
    settings.index_join = false;

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&filtered_query())
        .unwrap();
    assert!(!plan.uses_algorithm(JoinAlgorithm::IndexNlJoin));

    settings.sort_merge_join = false;
    settings.hash_join = false;
    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&filtered_query())
        .unwrap();
    assert!(!plan.uses_algorithm(JoinAlgorithm::IndexNlJoin));
    assert!(!plan.uses_algorithm(JoinAlgorithm::MergeJoin));
    assert!(!plan.uses_algorithm(JoinAlgorithm::HashJoin));
    assert!(plan.uses_algorithm(JoinAlgorithm::BlockNlJoin));
}

#[test]
fn test_disabling_algorithms_cannot_reduce_cost() {
    let (catalog, stats) = shop_catalog();
    let full = settings();
    let mut restricted = settings();
    restricted.index_join = false;

    let with_all = Planner::new(&catalog, &stats, &full)
        .select(&filtered_query())
        .unwrap();
    let without_index = Planner::new(&catalog, &stats, &restricted)
        .select(&filtered_query())
        .unwrap();

    assert!(with_all.estimated_io() <= without_index.estimated_io());
}

#[test]
fn test_deterministic_across_runs() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();
    let planner = Planner::new(&catalog, &stats, &settings);
    let query = filtered_query();

    let first = planner.select(&query).unwrap();
    let second = planner.select(&query).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_disconnected_query_still_plans() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();
    // no predicate between the tables: the DP search refuses cross
    // products, so the heuristic fallback supplies the plan
    let query = LogicalQuery::new(vec![TableRef::bare("orders"), TableRef::bare("customers")]);

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&query)
        .unwrap();

    assert!(plan.uses_algorithm(JoinAlgorithm::BlockNlJoin));
    let mut leaves = plan.leaf_order();
    leaves.sort();
    assert_eq!(leaves, vec!["customers", "orders"]);
}

#[test]
fn test_cost_is_cumulative_up_the_tree() {
    let (catalog, stats) = shop_catalog();
    let settings = settings();

    let plan = Planner::new(&catalog, &stats, &settings)
        .select(&filtered_query())
        .unwrap();

    fn check(plan: &quarry::planner::physical::PhysicalPlan) {
        let children_io: u64 = plan.children().iter().map(|c| c.estimated_io()).sum();
        assert!(plan.estimated_io() >= children_io);
        for child in plan.children() {
            check(child);
        }
    }
    check(&plan);
}

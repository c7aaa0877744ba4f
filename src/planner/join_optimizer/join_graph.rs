//! Join graph over the query's table references.
//!
//! Tables are nodes, two-table predicates are edges. The DP enumerator asks
//! it two questions: is the whole query connected (otherwise cost-based
//! search would need a cross product), and does a given split of a table
//! subset have at least one predicate across it.

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::planner::logical::ClassifiedPredicates;
use crate::planner::PlanContext;

pub struct JoinGraph {
    graph: UnGraph<String, ()>,
    /// Edge endpoints as table indices, in predicate appearance order.
    edges: Vec<(usize, usize)>,
}

impl JoinGraph {
    pub fn build(ctx: &PlanContext, preds: &ClassifiedPredicates) -> Self {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<NodeIndex> = ctx
            .tables
            .iter()
            .map(|t| graph.add_node(t.alias.clone()))
            .collect();

        let mut edges = Vec::new();
        for jp in &preds.joins {
            let (Some(a), Some(b)) = (
                ctx.alias_index(&jp.left_table),
                ctx.alias_index(&jp.right_table),
            ) else {
                continue;
            };
            graph.update_edge(nodes[a], nodes[b], ());
            edges.push((a, b));
        }
        // residual predicates connect every pair of tables they mention
        for expr in &preds.residual {
            let tables: Vec<usize> = expr
                .referenced_tables()
                .iter()
                .filter_map(|t| ctx.alias_index(t))
                .collect();
            for i in 0..tables.len() {
                for j in i + 1..tables.len() {
                    graph.update_edge(nodes[tables[i]], nodes[tables[j]], ());
                    edges.push((tables[i], tables[j]));
                }
            }
        }

        Self { graph, edges }
    }

    pub fn table_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether every table is reachable from every other through predicates.
    pub fn fully_connected(&self) -> bool {
        self.graph.node_count() <= 1 || connected_components(&self.graph) == 1
    }

    /// Whether at least one predicate crosses the two (disjoint) bitsets.
    pub fn sets_joinable(&self, s1: u64, s2: u64) -> bool {
        self.edges.iter().any(|&(a, b)| {
            let (ma, mb) = (1u64 << a, 1u64 << b);
            ma & s1 != 0 && mb & s2 != 0 || ma & s2 != 0 && mb & s1 != 0
        })
    }

    /// Whether table `t` has a predicate into the bitset `set`.
    pub fn joinable_with_set(&self, set: u64, t: usize) -> bool {
        self.sets_joinable(set, 1u64 << t)
    }
}

use proptest::prelude::*;

/// Shape of a generated task graph. Edges run referent -> referrer, always
/// from a lower index to a higher one, so every pattern is acyclic.
#[derive(Debug, Clone)]
pub enum GraphPattern {
    Linear(usize),  // chain of N tasks
    Diamond,        // 0 -> 1,2 -> 3
    FanOut(usize),  // 0 -> N tasks
    FanIn(usize),   // N tasks -> one
    Random { nodes: usize, edges: Vec<(usize, usize)> },
}

impl GraphPattern {
    pub fn node_count(&self) -> usize {
        match self {
            GraphPattern::Linear(n) => *n,
            GraphPattern::Diamond => 4,
            GraphPattern::FanOut(n) | GraphPattern::FanIn(n) => n + 1,
            GraphPattern::Random { nodes, .. } => *nodes,
        }
    }

    pub fn edges(&self) -> Vec<(usize, usize)> {
        match self {
            GraphPattern::Linear(n) => (1..*n).map(|i| (i - 1, i)).collect(),
            GraphPattern::Diamond => vec![(0, 1), (0, 2), (1, 3), (2, 3)],
            GraphPattern::FanOut(n) => (1..=*n).map(|i| (0, i)).collect(),
            GraphPattern::FanIn(n) => (0..*n).map(|i| (i, *n)).collect(),
            GraphPattern::Random { edges, .. } => edges.clone(),
        }
    }

    /// Referents of `node`, deduplicated.
    pub fn referents_of(&self, node: usize) -> Vec<usize> {
        let mut referents: Vec<usize> = self
            .edges()
            .into_iter()
            .filter(|(_, to)| *to == node)
            .map(|(from, _)| from)
            .collect();
        referents.sort_unstable();
        referents.dedup();
        referents
    }
}

pub fn task_name(index: usize) -> String {
    format!("task-{index}")
}

/// Up to `max_nodes` tasks with forward-only edges between them.
pub fn random_dag_strategy(max_nodes: usize) -> impl Strategy<Value = GraphPattern> {
    (2..=max_nodes).prop_flat_map(|nodes| {
        let edge = (0..nodes, 0..nodes)
            .prop_filter("no self-links", |(a, b)| a != b)
            .prop_map(|(a, b)| if a < b { (a, b) } else { (b, a) });
        prop::collection::vec(edge, 0..nodes * 2)
            .prop_map(move |edges| GraphPattern::Random { nodes, edges })
    })
}

pub fn graph_pattern_strategy() -> impl Strategy<Value = GraphPattern> {
    prop_oneof![
        (2usize..=8).prop_map(GraphPattern::Linear),
        Just(GraphPattern::Diamond),
        (2usize..=6).prop_map(GraphPattern::FanOut),
        (2usize..=6).prop_map(GraphPattern::FanIn),
        random_dag_strategy(10),
    ]
}

/// A permutation of `0..n`, used as task insertion order.
pub fn insertion_order_strategy(n: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..n).collect::<Vec<_>>()).prop_shuffle()
}

use crate::data::Database;
use crate::error::Result;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// In-memory view of the stored connection graph for ranking.
pub struct MentionGraph {
    graph: DiGraph<String, i64>,
    indices: HashMap<String, NodeIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedNode {
    pub name: String,
    pub rank: f64,
}

impl MentionGraph {
    pub fn new() -> Self {
        MentionGraph {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        }
    }

    /// Loads every stored connection. Parallel rows for the same ordered
    /// pair collapse into one edge with summed weight.
    pub fn build(db: &Database) -> Result<Self> {
        let mut graph = MentionGraph::new();
        for edge in db.edges()? {
            graph.add_weighted_edge(&edge.source, &edge.target, edge.weight);
        }
        Ok(graph)
    }

    pub fn add_weighted_edge(&mut self, source: &str, target: &str, weight: i64) {
        let source_index = self.node_index(source);
        let target_index = self.node_index(target);
        match self.graph.find_edge(source_index, target_index) {
            Some(edge) => {
                if let Some(existing) = self.graph.edge_weight_mut(edge) {
                    *existing += weight;
                }
            }
            None => {
                self.graph.add_edge(source_index, target_index, weight);
            }
        }
    }

    fn node_index(&mut self, name: &str) -> NodeIndex {
        match self.indices.get(name) {
            Some(&index) => index,
            None => {
                let index = self.graph.add_node(name.to_string());
                self.indices.insert(name.to_string(), index);
                index
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn edge_weight(&self, source: &str, target: &str) -> Option<i64> {
        let source_index = *self.indices.get(source)?;
        let target_index = *self.indices.get(target)?;
        let edge = self.graph.find_edge(source_index, target_index)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Drops every weakly connected component smaller than `min_nodes`.
    /// Fringe accounts mentioned once tend to form tiny components that
    /// only add noise to the ranking.
    pub fn retain_components(&mut self, min_nodes: usize) {
        if min_nodes <= 1 {
            return;
        }

        let mut union: UnionFind<usize> = UnionFind::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            union.union(edge.source().index(), edge.target().index());
        }
        let labels = union.into_labeling();

        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for &label in &labels {
            *sizes.entry(label).or_insert(0) += 1;
        }

        // Rebuild instead of removing in place; node removal renumbers
        // indices and would invalidate the labeling.
        let mut kept = MentionGraph::new();
        for edge in self.graph.edge_references() {
            let label = labels[edge.source().index()];
            if sizes.get(&label).copied().unwrap_or(0) >= min_nodes {
                let source = &self.graph[edge.source()];
                let target = &self.graph[edge.target()];
                kept.add_weighted_edge(source, target, *edge.weight());
            }
        }
        *self = kept;
    }

    /// Weighted PageRank by power iteration. A node's rank flows along its
    /// out-edges in proportion to edge weight; rank held by nodes with no
    /// out-edges is spread uniformly. Sorted by rank descending, then name.
    pub fn page_rank(&self, damping: f64, iterations: usize) -> Vec<RankedNode> {
        let n = self.graph.node_count();
        if n == 0 {
            return Vec::new();
        }

        let mut out_weight = vec![0.0_f64; n];
        for edge in self.graph.edge_references() {
            out_weight[edge.source().index()] += *edge.weight() as f64;
        }

        let mut ranks = vec![1.0 / n as f64; n];
        for _ in 0..iterations {
            let mut next = vec![(1.0 - damping) / n as f64; n];

            let mut dangling = 0.0;
            for index in self.graph.node_indices() {
                if out_weight[index.index()] == 0.0 {
                    dangling += ranks[index.index()];
                }
            }
            let dangling_share = damping * dangling / n as f64;
            for value in next.iter_mut() {
                *value += dangling_share;
            }

            for edge in self.graph.edge_references() {
                let source = edge.source().index();
                if out_weight[source] > 0.0 {
                    let share = *edge.weight() as f64 / out_weight[source];
                    next[edge.target().index()] += damping * ranks[source] * share;
                }
            }

            ranks = next;
        }

        let mut ranked: Vec<RankedNode> = self
            .graph
            .node_indices()
            .map(|index| RankedNode {
                name: self.graph[index].clone(),
                rank: ranks[index.index()],
            })
            .collect();
        ranked.sort_by(|a, b| b.rank.total_cmp(&a.rank).then_with(|| a.name.cmp(&b.name)));
        ranked
    }

    pub fn top_nodes(&self, damping: f64, iterations: usize, limit: usize) -> Vec<RankedNode> {
        let mut ranked = self.page_rank(damping, iterations);
        ranked.truncate(limit);
        ranked
    }
}

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::visit::{DfsEvent, depth_first_search};
use tracing::debug;

use crate::config::LayoutConstraints;
use crate::graph::Graph;
use crate::types::Position;

/// Level per node plus the edges removed to make the graph acyclic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layering {
    /// Indexed like `Graph::nodes`.
    pub levels: Vec<usize>,
    /// Edge indices of feedback (back) edges.
    pub feedback: BTreeSet<usize>,
}

impl Layering {
    pub fn level(&self, node: usize) -> usize {
        self.levels[node]
    }

    pub fn is_feedback(&self, edge: usize) -> bool {
        self.feedback.contains(&edge)
    }

    pub fn level_count(&self) -> usize {
        self.levels.iter().max().map_or(0, |max| max + 1)
    }

    /// Node indices grouped by level, each group in index order.
    pub fn by_level(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.level_count()];
        for (node, &level) in self.levels.iter().enumerate() {
            groups[level].push(node);
        }
        groups
    }
}

pub struct HierarchyAnalyzer<'a> {
    constraints: &'a LayoutConstraints,
}

impl<'a> HierarchyAnalyzer<'a> {
    pub fn new(constraints: &'a LayoutConstraints) -> Self {
        Self { constraints }
    }

    /// Breaks cycles with a depth-first search, then assigns every node its
    /// longest-path distance from a source over the remaining edges.
    pub fn layer(graph: &Graph) -> Layering {
        let n = graph.node_count();
        let digraph = graph.digraph();

        let mut by_endpoints: HashMap<(usize, usize), usize> =
            HashMap::with_capacity(graph.edge_count());
        for e in 0..graph.edge_count() {
            by_endpoints.insert(graph.endpoints(e), e);
        }

        let mut feedback = BTreeSet::new();
        depth_first_search(digraph, digraph.node_indices(), |event| {
            if let DfsEvent::BackEdge(u, v) = event {
                if let Some(&e) = by_endpoints.get(&(u.index(), v.index())) {
                    feedback.insert(e);
                }
            }
        });

        // Kahn's algorithm over the forward edges, relaxing longest paths.
        let mut in_degree = vec![0usize; n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        for e in 0..graph.edge_count() {
            if feedback.contains(&e) {
                continue;
            }
            let (s, t) = graph.endpoints(e);
            in_degree[t] += 1;
            outgoing[s].push(t);
        }

        let mut levels = vec![0usize; n];
        let mut queue: VecDeque<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
        while let Some(node) = queue.pop_front() {
            for &next in &outgoing[node] {
                levels[next] = levels[next].max(levels[node] + 1);
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        let layering = Layering { levels, feedback };
        debug!(
            levels = layering.level_count(),
            feedback = layering.feedback.len(),
            "hierarchy layered"
        );
        layering
    }

    /// Moves every node onto its level midline and keeps the orthogonal
    /// coordinate from the simulation, then spreads out nodes that landed
    /// too close together on the same level.
    pub fn project(&self, positions: &[Position], layering: &Layering) -> Vec<Position> {
        let c = self.constraints;
        let mut projected: Vec<Position> = positions
            .iter()
            .zip(&layering.levels)
            .map(|(&p, &level)| c.direction.with_primary(p, level as f64 * c.level_separation))
            .collect();
        self.separate_levels(&mut projected, layering);
        projected
    }

    /// Enforces the minimum orthogonal gap between same-level nodes, keeping
    /// their order and the level's mean orthogonal coordinate. Levels that
    /// already satisfy the gap are left untouched.
    pub fn separate_levels(&self, positions: &mut [Position], layering: &Layering) {
        let dir = self.constraints.direction;
        let gap = self.constraints.min_cross_gap();

        for mut members in layering.by_level() {
            if members.len() < 2 {
                continue;
            }
            members.sort_by(|&a, &b| {
                dir.cross(positions[a])
                    .total_cmp(&dir.cross(positions[b]))
                    .then(a.cmp(&b))
            });

            let before: Vec<f64> = members.iter().map(|&v| dir.cross(positions[v])).collect();
            let mut after = before.clone();
            let mut moved = false;
            for k in 1..after.len() {
                let floor = after[k - 1] + gap;
                if after[k] < floor {
                    after[k] = floor;
                    moved = true;
                }
            }
            if !moved {
                continue;
            }

            let count = before.len() as f64;
            let recenter =
                before.iter().sum::<f64>() / count - after.iter().sum::<f64>() / count;
            for (&v, cross) in members.iter().zip(after) {
                positions[v] = dir.with_cross(positions[v], cross + recenter);
            }
        }
    }
}

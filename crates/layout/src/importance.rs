//! Importance weighting.
//!
//! An external provider scores nodes in [0, 1]. Missing scores read as the
//! neutral 0.5, and the adjuster only ever moves nodes whose score differs
//! from neutral, so an all-neutral mapping leaves a layout untouched.

use std::collections::HashMap;

use futures::future::{self, BoxFuture};
use tracing::warn;

use crate::config::LayoutConstraints;
use crate::error::ImportanceError;
use crate::graph::Graph;
use crate::hierarchy::Layering;
use crate::types::Position;

/// How strongly importance raises a node's inertia.
const INERTIA_GAIN: f64 = 4.0;

/// Default-filled importance mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportanceWeights {
    weights: HashMap<String, f64>,
}

impl ImportanceWeights {
    pub const NEUTRAL: f64 = 0.5;

    /// Drops non-finite scores and clamps the rest into [0, 1].
    pub fn new(raw: HashMap<String, f64>) -> Self {
        let mut weights = HashMap::with_capacity(raw.len());
        for (id, weight) in raw {
            if !weight.is_finite() {
                warn!(node = %id, "dropping non-finite importance weight");
                continue;
            }
            let clamped = weight.clamp(0.0, 1.0);
            if clamped != weight {
                warn!(node = %id, weight, "importance weight outside [0, 1], clamping");
            }
            weights.insert(id, clamped);
        }
        Self { weights }
    }

    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> f64 {
        self.weights.get(id).copied().unwrap_or(Self::NEUTRAL)
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Weight per node, indexed like `Graph::nodes`.
    pub fn for_graph(&self, graph: &Graph) -> Vec<f64> {
        graph.nodes().iter().map(|node| self.get(&node.id)).collect()
    }
}

/// Source of per-node importance scores, typically a remote service. Partial
/// and empty mappings are valid answers.
pub trait ImportanceProvider: Send + Sync {
    fn importance<'a>(
        &'a self,
        graph: &'a Graph,
    ) -> BoxFuture<'a, Result<HashMap<String, f64>, ImportanceError>>;
}

/// Scores nothing, so every node stays neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralImportance;

impl ImportanceProvider for NeutralImportance {
    fn importance<'a>(
        &'a self,
        _graph: &'a Graph,
    ) -> BoxFuture<'a, Result<HashMap<String, f64>, ImportanceError>> {
        Box::pin(future::ready(Ok(HashMap::new())))
    }
}

/// Answers with a fixed mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticImportance {
    weights: HashMap<String, f64>,
}

impl StaticImportance {
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StaticImportance {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl ImportanceProvider for StaticImportance {
    fn importance<'a>(
        &'a self,
        _graph: &'a Graph,
    ) -> BoxFuture<'a, Result<HashMap<String, f64>, ImportanceError>> {
        Box::pin(future::ready(Ok(self.weights.clone())))
    }
}

/// Reads a numeric score stored in each node's metadata object.
#[derive(Debug, Clone)]
pub struct MetadataImportance {
    key: String,
}

impl MetadataImportance {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for MetadataImportance {
    fn default() -> Self {
        Self::new("importance")
    }
}

impl ImportanceProvider for MetadataImportance {
    fn importance<'a>(
        &'a self,
        graph: &'a Graph,
    ) -> BoxFuture<'a, Result<HashMap<String, f64>, ImportanceError>> {
        let weights = graph
            .nodes()
            .iter()
            .filter_map(|node| {
                let score = node.metadata.get(&self.key)?.as_f64()?;
                Some((node.id.clone(), score))
            })
            .collect();
        Box::pin(future::ready(Ok(weights)))
    }
}

/// Refines positions by importance without leaving the level bands.
///
/// Each pass moves node `i` radially relative to the centroid of the input
/// layout by `strength * ideal_edge_length * |0.5 - w| / (1 + 4w)`: inward
/// for weights above neutral (never past the centroid), outward below it.
/// Heavier nodes have more inertia and so travel less.
pub struct ImportanceAdjuster<'a> {
    constraints: &'a LayoutConstraints,
}

impl<'a> ImportanceAdjuster<'a> {
    pub fn new(constraints: &'a LayoutConstraints) -> Self {
        Self { constraints }
    }

    pub fn adjust(
        &self,
        positions: &[Position],
        layering: &Layering,
        weights: &[f64],
    ) -> Vec<Position> {
        let c = self.constraints;
        let dir = c.direction;
        let mut adjusted = positions.to_vec();
        if positions.is_empty()
            || weights
                .iter()
                .all(|&w| w == ImportanceWeights::NEUTRAL)
        {
            return adjusted;
        }

        let count = positions.len() as f64;
        let centroid = positions
            .iter()
            .fold(Position::ORIGIN, |acc, &p| acc + p)
            * (1.0 / count);
        let band = c.level_band();
        let unit_step = c.importance_strength * c.ideal_edge_length;

        for _ in 0..c.importance_passes {
            for (i, position) in adjusted.iter_mut().enumerate() {
                let weight = weights[i];
                let bias = ImportanceWeights::NEUTRAL - weight;
                if bias == 0.0 {
                    continue;
                }
                let step = unit_step * bias.abs() / (1.0 + INERTIA_GAIN * weight);
                let radial = *position - centroid;
                let dist = radial.length();

                let shift = if bias < 0.0 {
                    if dist <= f64::EPSILON {
                        continue;
                    }
                    radial * (-step.min(dist) / dist)
                } else if dist <= f64::EPSILON {
                    dir.compose(0.0, step)
                } else {
                    radial * (step / dist)
                };

                let moved = *position + shift;
                let midline = layering.level(i) as f64 * c.level_separation;
                let primary = dir.primary(moved).clamp(midline - band, midline + band);
                *position = dir.with_primary(moved, primary);
            }
        }
        adjusted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};
    use crate::hierarchy::HierarchyAnalyzer;

    fn triangle() -> Graph {
        Graph::new(
            vec![Node::new("A"), Node::new("B"), Node::new("C")],
            vec![Edge::new("A", "B"), Edge::new("B", "C"), Edge::new("A", "C")],
        )
        .unwrap()
    }

    fn flat_layering(n: usize) -> Layering {
        Layering {
            levels: vec![0; n],
            feedback: Default::default(),
        }
    }

    #[test]
    fn test_missing_weights_are_neutral() {
        let weights = ImportanceWeights::new(HashMap::from([("A".to_string(), 0.9)]));
        assert_eq!(weights.get("A"), 0.9);
        assert_eq!(weights.get("B"), ImportanceWeights::NEUTRAL);
        assert_eq!(weights.for_graph(&triangle()), vec![0.9, 0.5, 0.5]);
    }

    #[test]
    fn test_out_of_range_weights_are_sanitized() {
        let weights = ImportanceWeights::new(HashMap::from([
            ("A".to_string(), 1.7),
            ("B".to_string(), -0.2),
            ("C".to_string(), f64::NAN),
        ]));
        assert_eq!(weights.get("A"), 1.0);
        assert_eq!(weights.get("B"), 0.0);
        assert_eq!(weights.get("C"), ImportanceWeights::NEUTRAL);
        assert_eq!(weights.len(), 2);
    }

    #[test]
    fn test_neutral_weights_are_a_no_op() {
        let config = LayoutConstraints::default();
        let positions = vec![
            Position::new(0.0, 0.0),
            Position::new(100.0, 120.0),
            Position::new(-50.0, 240.0),
        ];
        let layering = Layering {
            levels: vec![0, 1, 2],
            feedback: Default::default(),
        };
        let adjuster = ImportanceAdjuster::new(&config);
        assert_eq!(adjuster.adjust(&positions, &layering, &[0.5; 3]), positions);

        let empty = ImportanceWeights::neutral().for_graph(&triangle());
        assert_eq!(adjuster.adjust(&positions, &layering, &empty), positions);
    }

    #[test]
    fn test_important_node_moves_least() {
        let config = LayoutConstraints::default();
        let before = vec![
            Position::new(0.0, 0.0),
            Position::new(100.0, 0.0),
            Position::new(50.0, 0.0),
        ];
        let weights = [0.9, 0.1, 0.1];
        let after = ImportanceAdjuster::new(&config).adjust(&before, &flat_layering(3), &weights);
        let moved: Vec<f64> = before.iter().zip(&after).map(|(a, b)| a.distance(*b)).collect();
        assert!(moved[0] < moved[1]);
        assert!(moved[0] < moved[2]);
        assert!(moved[0] > 0.0);
    }

    #[test]
    fn test_low_importance_pushed_outward() {
        let config = LayoutConstraints::default();
        let before = vec![Position::new(-60.0, 0.0), Position::new(60.0, 0.0)];
        let after = ImportanceAdjuster::new(&config).adjust(&before, &flat_layering(2), &[0.0, 0.5]);
        assert!(after[0].x < before[0].x);
        assert_eq!(after[1], before[1]);
    }

    #[test]
    fn test_movement_stays_in_band() {
        let config = LayoutConstraints::default();
        let before = vec![
            Position::new(0.0, 0.0),
            Position::new(0.0, 120.0),
            Position::new(0.0, 240.0),
        ];
        let layering = Layering {
            levels: vec![0, 1, 2],
            feedback: Default::default(),
        };
        let after = ImportanceAdjuster::new(&config).adjust(&before, &layering, &[0.0, 0.5, 0.0]);
        let band = config.level_band();
        for (i, p) in after.iter().enumerate() {
            let midline = layering.level(i) as f64 * config.level_separation;
            assert!((p.y - midline).abs() <= band + 1e-9);
        }
        assert!(after[0].y < 0.0);
    }

    #[test]
    fn test_important_node_never_passes_centroid() {
        let config = LayoutConstraints {
            importance_strength: 5.0,
            ..Default::default()
        };
        let before = vec![Position::new(-10.0, 0.0), Position::new(10.0, 0.0)];
        let after = ImportanceAdjuster::new(&config).adjust(&before, &flat_layering(2), &[1.0, 1.0]);
        assert_eq!(after, vec![Position::ORIGIN, Position::ORIGIN]);
    }

    #[tokio::test]
    async fn test_metadata_provider_reads_scores() {
        let graph: Graph = serde_json::from_str(
            r#"{"nodes": [
                    {"id": "A", "metadata": {"importance": 0.8}},
                    {"id": "B", "metadata": {"importance": "high"}},
                    {"id": "C"}
                ], "edges": []}"#,
        )
        .unwrap();
        let scores = MetadataImportance::default().importance(&graph).await.unwrap();
        assert_eq!(scores, HashMap::from([("A".to_string(), 0.8)]));
    }

    #[tokio::test]
    async fn test_static_provider_answers_its_map() {
        let provider: StaticImportance = [("A", 0.9), ("B", 0.1)].into_iter().collect();
        let scores = provider.importance(&triangle()).await.unwrap();
        assert_eq!(scores.len(), 2);
        assert!(NeutralImportance.importance(&triangle()).await.unwrap().is_empty());
    }

    #[test]
    fn test_layering_from_analyzer_fits() {
        let graph = triangle();
        let layering = HierarchyAnalyzer::layer(&graph);
        assert_eq!(layering.levels.len(), graph.node_count());
    }
}

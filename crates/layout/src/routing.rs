//! Edge routing.
//!
//! Forward edges take the straight segment when it clears every other
//! node's bounding region. Otherwise they leave the source along the
//! hierarchy axis, cross each intervening level on a free lane and only move
//! sideways inside the empty channels between levels. Feedback edges always
//! bow away from the straight line so they read as distinct from forward
//! edges.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::LayoutConstraints;
use crate::graph::{EdgeId, Graph};
use crate::hierarchy::Layering;
use crate::types::{Bounds, Direction, Position};

/// Waypoint segments used to sample a feedback curve.
const FEEDBACK_SEGMENTS: usize = 8;
/// Bow height of a feedback curve relative to its chord.
const FEEDBACK_BOW_RATIO: f64 = 0.3;

pub type EdgePaths = BTreeMap<EdgeId, Vec<Position>>;

pub struct EdgeRouter<'a> {
    constraints: &'a LayoutConstraints,
}

impl<'a> EdgeRouter<'a> {
    pub fn new(constraints: &'a LayoutConstraints) -> Self {
        Self { constraints }
    }

    /// Routes every edge. The first and last waypoint of each path are the
    /// exact positions of its source and target.
    pub fn route(&self, positions: &[Position], graph: &Graph, layering: &Layering) -> EdgePaths {
        let regions = self.regions(positions);
        let mut paths = EdgePaths::new();
        let mut detours = 0usize;

        for e in 0..graph.edge_count() {
            let (s, t) = graph.endpoints(e);
            let path = if layering.is_feedback(e) {
                self.feedback_path(positions[s], positions[t])
            } else if self.is_clear(positions[s], positions[t], &regions, s, t) {
                vec![positions[s], positions[t]]
            } else {
                detours += 1;
                self.channel_path(s, t, positions, layering)
            };
            debug_assert!(path.len() >= 2);
            debug_assert_eq!(path.first(), Some(&positions[s]));
            debug_assert_eq!(path.last(), Some(&positions[t]));
            paths.insert(graph.edge_id(e).clone(), path);
        }

        debug!(
            edges = graph.edge_count(),
            detours,
            feedback = layering.feedback.len(),
            "edges routed"
        );
        paths
    }

    /// Two-point paths for every edge, used when routing never ran.
    pub fn straight(positions: &[Position], graph: &Graph) -> EdgePaths {
        (0..graph.edge_count())
            .map(|e| {
                let (s, t) = graph.endpoints(e);
                (graph.edge_id(e).clone(), vec![positions[s], positions[t]])
            })
            .collect()
    }

    /// Bounding region of every node, spacing included.
    pub fn regions(&self, positions: &[Position]) -> Vec<Bounds> {
        let (half_w, half_h) = self.constraints.region_half_extents();
        positions
            .iter()
            .map(|&p| Bounds::around(p, half_w, half_h))
            .collect()
    }

    fn is_clear(&self, a: Position, b: Position, regions: &[Bounds], s: usize, t: usize) -> bool {
        regions
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != s && i != t)
            .all(|(_, region)| !region.intersects_segment(a, b))
    }

    fn channel_path(
        &self,
        s: usize,
        t: usize,
        positions: &[Position],
        layering: &Layering,
    ) -> Vec<Position> {
        let c = self.constraints;
        let dir = c.direction;
        let (from, to) = (layering.level(s), layering.level(t));
        if from >= to {
            return vec![positions[s], positions[t]];
        }

        let sep = c.level_separation;
        let start = positions[s];
        let end = positions[t];
        let (start_cross, end_cross) = (dir.cross(start), dir.cross(end));
        let span = (to - from) as f64;

        let mut path = vec![start, dir.compose((from as f64 + 0.5) * sep, start_cross)];
        for level in (from + 1)..to {
            let along = (level - from) as f64 / span;
            let ideal = start_cross + (end_cross - start_cross) * along;
            let lane = self.free_lane(level, ideal, &[s, t], positions, layering);
            path.push(dir.compose((level as f64 - 0.5) * sep, lane));
            path.push(dir.compose((level as f64 + 0.5) * sep, lane));
        }
        path.push(dir.compose((to as f64 - 0.5) * sep, end_cross));
        path.push(end);
        path.dedup();
        path
    }

    /// Orthogonal coordinate at which a path can cross `level` without
    /// entering a node region. Blocked ideals move to the nearer side of the
    /// blocking span; on a tie the smaller coordinate wins.
    pub(crate) fn free_lane(
        &self,
        level: usize,
        ideal: f64,
        exclude: &[usize],
        positions: &[Position],
        layering: &Layering,
    ) -> f64 {
        let c = self.constraints;
        let dir = c.direction;
        let (half_w, half_h) = c.region_half_extents();
        let half = match dir {
            Direction::TopDown => half_w,
            Direction::LeftRight => half_h,
        };

        let mut spans: Vec<(f64, f64)> = layering
            .levels
            .iter()
            .enumerate()
            .filter(|&(node, &l)| l == level && !exclude.contains(&node))
            .map(|(node, _)| {
                let centre = dir.cross(positions[node]);
                (centre - half, centre + half)
            })
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
        for (lo, hi) in spans {
            match merged.last_mut() {
                Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        match merged.iter().find(|&&(lo, hi)| lo < ideal && ideal < hi) {
            Some(&(lo, hi)) => {
                if hi - ideal < ideal - lo {
                    hi
                } else {
                    lo
                }
            }
            None => ideal,
        }
    }

    /// Quadratic curve from `start` to `end` bowing toward the smaller
    /// orthogonal coordinate.
    pub(crate) fn feedback_path(&self, start: Position, end: Position) -> Vec<Position> {
        let dir = self.constraints.direction;
        let chord = end - start;
        let length = chord.length();

        let mut normal = if length > f64::EPSILON {
            Position::new(-chord.y / length, chord.x / length)
        } else {
            dir.compose(0.0, -1.0)
        };
        let leans_positive = dir.cross(normal) > 0.0
            || (dir.cross(normal) == 0.0 && dir.primary(normal) > 0.0);
        if leans_positive {
            normal = -normal;
        }

        let bow = (length * FEEDBACK_BOW_RATIO)
            .max(dir.cross_extent(self.constraints.node_size));
        let mid = (start + end) * 0.5;
        // A quadratic curve's apex sits halfway toward its control point.
        let control = mid + normal * (2.0 * bow);

        let mut path = Vec::with_capacity(FEEDBACK_SEGMENTS + 1);
        path.push(start);
        for k in 1..FEEDBACK_SEGMENTS {
            let t = k as f64 / FEEDBACK_SEGMENTS as f64;
            let u = 1.0 - t;
            path.push(start * (u * u) + control * (2.0 * u * t) + end * (t * t));
        }
        path.push(end);
        path
    }
}

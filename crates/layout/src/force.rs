//! Force-directed base placement.
//!
//! Every node pair repels with an inverse-square force and every edge pulls
//! its endpoints toward `ideal_edge_length`. The summed force is applied
//! directly as displacement, capped by a temperature that decays each
//! iteration.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cancel::{self, CancellationToken};
use crate::config::LayoutConstraints;
use crate::graph::Graph;
use crate::types::Position;

/// Lower bound on pair distance when evaluating repulsion.
const MIN_REPULSION_DISTANCE: f64 = 1.0;
/// Edges shorter than this exert no spring force.
const MIN_SPRING_LENGTH: f64 = 1e-9;
/// Initial placement jitter as a fraction of the grid cell.
const JITTER: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Indexed like `Graph::nodes`.
    pub positions: Vec<Position>,
    pub iterations: usize,
    pub converged: bool,
    pub cancelled: bool,
    /// Nodes re-seeded after their position became non-finite.
    pub resets: usize,
}

pub struct ForceDirectedSolver<'a> {
    constraints: &'a LayoutConstraints,
}

impl<'a> ForceDirectedSolver<'a> {
    pub fn new(constraints: &'a LayoutConstraints) -> Self {
        Self { constraints }
    }

    pub fn solve(&self, graph: &Graph, seed: u64) -> SolveOutcome {
        self.solve_with_cancel(graph, seed, None)
    }

    /// Runs the simulation, checking `cancel` before every iteration.
    pub fn solve_with_cancel(
        &self,
        graph: &Graph,
        seed: u64,
        cancel: Option<&CancellationToken>,
    ) -> SolveOutcome {
        let c = self.constraints;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = self.initial_placement(graph.node_count(), &mut rng);

        let mut outcome = SolveOutcome {
            positions: Vec::new(),
            iterations: 0,
            converged: false,
            cancelled: false,
            resets: 0,
        };
        if positions.len() < 2 && graph.edge_count() == 0 {
            outcome.positions = positions;
            outcome.converged = true;
            return outcome;
        }

        let mut temperature = c.ideal_edge_length;
        for iteration in 0..c.max_iterations {
            if cancel::is_cancelled(cancel) {
                outcome.cancelled = true;
                break;
            }

            let mut forces = self.repulsion(&positions);
            self.attraction(graph, &positions, &mut forces);

            let mut max_shift: f64 = 0.0;
            let mut reset_this_round = false;
            for (i, (position, force)) in positions.iter_mut().zip(&forces).enumerate() {
                let magnitude = force.length();
                let shift = if magnitude > temperature {
                    *force * (temperature / magnitude)
                } else {
                    *force
                };
                let next = *position + shift;
                if !next.is_finite() || !magnitude.is_finite() {
                    warn!(
                        node = %graph.nodes()[i].id,
                        iteration,
                        "non-finite position during simulation, re-seeding node"
                    );
                    *position = self.random_position(graph.node_count(), &mut rng);
                    outcome.resets += 1;
                    reset_this_round = true;
                    continue;
                }
                *position = next;
                max_shift = max_shift.max(shift.length());
            }

            outcome.iterations = iteration + 1;
            temperature *= c.cooling;
            if !reset_this_round && max_shift < c.convergence_epsilon {
                outcome.converged = true;
                break;
            }
        }

        debug!(
            iterations = outcome.iterations,
            converged = outcome.converged,
            resets = outcome.resets,
            "force simulation finished"
        );
        outcome.positions = positions;
        outcome
    }

    /// Jittered grid: one cell per node, so distinct nodes start at least
    /// half a cell apart.
    fn initial_placement(&self, n: usize, rng: &mut StdRng) -> Vec<Position> {
        let cell = self.constraints.ideal_edge_length;
        let columns = (n as f64).sqrt().ceil().max(1.0) as usize;
        (0..n)
            .map(|i| {
                let col = (i % columns) as f64;
                let row = (i / columns) as f64;
                let jx = rng.random_range(-JITTER..JITTER);
                let jy = rng.random_range(-JITTER..JITTER);
                Position::new((col + jx) * cell, (row + jy) * cell)
            })
            .collect()
    }

    fn random_position(&self, n: usize, rng: &mut StdRng) -> Position {
        let extent = self.constraints.ideal_edge_length * (n as f64).sqrt().max(1.0);
        Position::new(
            rng.random_range(0.0..extent),
            rng.random_range(0.0..extent),
        )
    }

    /// Repulsive force on every node. Each row is summed by exactly one
    /// rayon task, so no accumulator is shared and the result does not depend
    /// on how rows are scheduled.
    fn repulsion(&self, positions: &[Position]) -> Vec<Position> {
        (0..positions.len())
            .into_par_iter()
            .map(|i| self.repulsion_row(i, positions))
            .collect()
    }

    fn repulsion_row(&self, i: usize, positions: &[Position]) -> Position {
        let strength = self.constraints.repulsion_constant;
        let mut total = Position::ORIGIN;
        for (j, other) in positions.iter().enumerate() {
            if i == j {
                continue;
            }
            let delta = positions[i] - *other;
            let dist = delta.length();
            let direction = if dist > 0.0 {
                delta * (1.0 / dist)
            } else {
                coincident_direction(i, j)
            };
            let dist = dist.max(MIN_REPULSION_DISTANCE);
            total += direction * (strength / (dist * dist));
        }
        total
    }

    fn attraction(&self, graph: &Graph, positions: &[Position], forces: &mut [Position]) {
        let c = self.constraints;
        for e in 0..graph.edge_count() {
            let weight = graph.edge_weight(e);
            if weight <= 0.0 {
                continue;
            }
            let (s, t) = graph.endpoints(e);
            let delta = positions[t] - positions[s];
            let dist = delta.length();
            if dist < MIN_SPRING_LENGTH {
                continue;
            }
            let pull = delta * (c.spring_constant * weight * (dist - c.ideal_edge_length) / dist);
            forces[s] += pull;
            forces[t] -= pull;
        }
    }
}

/// Deterministic, antisymmetric push direction for two nodes sharing a
/// position.
fn coincident_direction(i: usize, j: usize) -> Position {
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    let angle = (lo * 7 + hi * 13) as f64;
    let unit = Position::new(angle.cos(), angle.sin());
    if i < j { unit } else { -unit }
}

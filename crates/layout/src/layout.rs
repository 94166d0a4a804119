use std::collections::BTreeMap;

use tracing::{Span, debug, info, instrument, warn};

use crate::cancel::{self, CancellationToken};
use crate::config::LayoutConstraints;
use crate::error::{ImportanceError, LayoutError};
use crate::force::{ForceDirectedSolver, SolveOutcome};
use crate::graph::Graph;
use crate::hierarchy::{HierarchyAnalyzer, Layering};
use crate::importance::{ImportanceAdjuster, ImportanceProvider, ImportanceWeights};
use crate::routing::{EdgePaths, EdgeRouter};
use crate::types::{Bounds, LayoutResult, Position};

/// Runs the full pipeline: simulation, layering and projection, importance
/// refinement, component packing and edge routing.
///
/// Only invalid constraints surface as an error. A failing or slow
/// `provider` degrades to neutral weights, and cancellation returns the
/// positions reached so far with `converged == false`. Must be polled inside a
/// tokio runtime with the time driver enabled. The simulation runs on the
/// runtime's blocking pool, so concurrent calls do not wait on each other.
#[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
pub async fn compute_layout(
    graph: &Graph,
    constraints: &LayoutConstraints,
    provider: &dyn ImportanceProvider,
    cancel: Option<&CancellationToken>,
) -> Result<LayoutResult, LayoutError> {
    constraints.validate()?;
    debug!(metrics = ?graph.metrics(), "layout requested");

    let solve = solve_blocking(graph, constraints, cancel).await;
    let mut run = Run::new(graph, constraints, &solve);
    if solve.cancelled {
        return Ok(run.partial(solve.positions, None));
    }

    let analyzer = HierarchyAnalyzer::new(constraints);
    let layering = HierarchyAnalyzer::layer(graph);
    let mut positions = analyzer.project(&solve.positions, &layering);
    if cancel::is_cancelled(cancel) {
        return Ok(run.partial(positions, Some(&layering)));
    }

    let weights = request_weights(graph, constraints, provider).await;
    run.importance_applied = !weights.is_empty();
    if cancel::is_cancelled(cancel) {
        return Ok(run.partial(positions, Some(&layering)));
    }

    if run.importance_applied {
        positions = ImportanceAdjuster::new(constraints).adjust(
            &positions,
            &layering,
            &weights.for_graph(graph),
        );
        analyzer.separate_levels(&mut positions, &layering);
    }
    pack_components(graph, constraints, &layering, &mut positions);
    if cancel::is_cancelled(cancel) {
        return Ok(run.partial(positions, Some(&layering)));
    }

    let paths = EdgeRouter::new(constraints).route(&positions, graph, &layering);
    let result = run.finish(positions, paths, Some(&layering));
    info!(
        iterations = result.iterations_run,
        converged = result.converged,
        importance_applied = result.importance_applied,
        "layout complete"
    );
    Ok(result)
}

/// Runs the force simulation off the async worker. The graph and
/// constraints are cloned since the blocking task must own its inputs.
async fn solve_blocking(
    graph: &Graph,
    constraints: &LayoutConstraints,
    cancel: Option<&CancellationToken>,
) -> SolveOutcome {
    let owned_graph = graph.clone();
    let owned_constraints = constraints.clone();
    let token = cancel.cloned();
    let span = Span::current();
    let task = tokio::task::spawn_blocking(move || {
        span.in_scope(|| {
            ForceDirectedSolver::new(&owned_constraints).solve_with_cancel(
                &owned_graph,
                owned_constraints.random_seed,
                token.as_ref(),
            )
        })
    });
    match task.await {
        Ok(outcome) => outcome,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => {
            warn!(error = %err, "solver task did not finish, solving inline");
            ForceDirectedSolver::new(constraints).solve_with_cancel(
                graph,
                constraints.random_seed,
                cancel,
            )
        }
    }
}

/// Asks the provider for weights, bounded by the configured timeout. Every
/// failure degrades to an empty, all-neutral mapping.
async fn request_weights(
    graph: &Graph,
    constraints: &LayoutConstraints,
    provider: &dyn ImportanceProvider,
) -> ImportanceWeights {
    let timeout = constraints.oracle_timeout();
    let outcome = match tokio::time::timeout(timeout, provider.importance(graph)).await {
        Ok(answer) => answer,
        Err(_) => Err(ImportanceError::TimedOut(timeout)),
    };
    match outcome {
        Ok(raw) => {
            let weights = ImportanceWeights::new(raw);
            debug!(scored = weights.len(), "importance weights received");
            weights
        }
        Err(err) => {
            warn!(error = %err, "importance provider failed, using neutral weights");
            ImportanceWeights::neutral()
        }
    }
}

/// Lays connected components side by side along the orthogonal axis,
/// in order of their first node, separated by one ideal edge length.
/// A component's extent covers its node boxes and the bow of its feedback
/// curves; the curves only depend on their endpoints, so they move with the
/// component.
fn pack_components(
    graph: &Graph,
    constraints: &LayoutConstraints,
    layering: &Layering,
    positions: &mut [Position],
) {
    let components = graph.components();
    if components.len() < 2 {
        return;
    }
    let dir = constraints.direction;
    let half = dir.cross_extent(constraints.node_size) / 2.0;
    let gap = constraints.ideal_edge_length;

    let mut component_of = vec![0usize; positions.len()];
    let mut extents: Vec<(f64, f64)> = Vec::with_capacity(components.len());
    for (k, members) in components.iter().enumerate() {
        let mut extent = (f64::INFINITY, f64::NEG_INFINITY);
        for &v in members {
            component_of[v] = k;
            let cross = dir.cross(positions[v]);
            extent = (extent.0.min(cross - half), extent.1.max(cross + half));
        }
        extents.push(extent);
    }

    let router = EdgeRouter::new(constraints);
    for &e in &layering.feedback {
        let (s, t) = graph.endpoints(e);
        let extent = &mut extents[component_of[s]];
        for point in router.feedback_path(positions[s], positions[t]) {
            let cross = dir.cross(point);
            extent.0 = extent.0.min(cross);
            extent.1 = extent.1.max(cross);
        }
    }

    let mut cursor: Option<f64> = None;
    for (members, (lo, hi)) in components.iter().zip(extents) {
        let offset = cursor.map_or(0.0, |start| start - lo);
        for &v in members {
            let p = positions[v];
            positions[v] = dir.with_cross(p, dir.cross(p) + offset);
        }
        cursor = Some(hi + offset + gap);
    }
}

/// Metadata gathered while the pipeline advances.
struct Run<'a> {
    graph: &'a Graph,
    constraints: &'a LayoutConstraints,
    iterations: usize,
    converged: bool,
    resets: usize,
    importance_applied: bool,
}

impl<'a> Run<'a> {
    fn new(graph: &'a Graph, constraints: &'a LayoutConstraints, solve: &SolveOutcome) -> Self {
        Self {
            graph,
            constraints,
            iterations: solve.iterations,
            converged: solve.converged,
            resets: solve.resets,
            importance_applied: false,
        }
    }

    /// Result for a cancelled run: whatever positions exist, straight paths.
    fn partial(self, positions: Vec<Position>, layering: Option<&Layering>) -> LayoutResult {
        debug!(iterations = self.iterations, "layout cancelled");
        let paths = EdgeRouter::straight(&positions, self.graph);
        let mut result = self.finish(positions, paths, layering);
        result.converged = false;
        result.cancelled = true;
        result
    }

    fn finish(
        self,
        positions: Vec<Position>,
        edge_paths: EdgePaths,
        layering: Option<&Layering>,
    ) -> LayoutResult {
        let graph = self.graph;
        let (half_w, half_h) = (
            self.constraints.node_size.width / 2.0,
            self.constraints.node_size.height / 2.0,
        );
        let corners = positions.iter().flat_map(|&p| {
            [
                p + Position::new(-half_w, -half_h),
                p + Position::new(half_w, half_h),
            ]
        });
        let canvas = Bounds::enclosing(corners.chain(edge_paths.values().flatten().copied()))
            .unwrap_or(Bounds::around(Position::ORIGIN, 0.0, 0.0));

        let (levels, feedback_edges) = match layering {
            Some(layering) => (
                graph
                    .nodes()
                    .iter()
                    .zip(&layering.levels)
                    .map(|(node, &level)| (node.id.clone(), level))
                    .collect(),
                layering
                    .feedback
                    .iter()
                    .map(|&e| graph.edge_id(e).clone())
                    .collect(),
            ),
            None => (BTreeMap::new(), Vec::new()),
        };

        LayoutResult {
            positions: graph
                .nodes()
                .iter()
                .zip(positions)
                .map(|(node, p)| (node.id.clone(), p))
                .collect(),
            edge_paths,
            levels,
            feedback_edges,
            iterations_run: self.iterations,
            converged: self.converged,
            importance_applied: self.importance_applied,
            cancelled: false,
            divergence_resets: self.resets,
            canvas,
        }
    }
}

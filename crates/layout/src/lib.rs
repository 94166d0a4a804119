//! Layered graph layout.
//!
//! [`compute_layout`] runs a force-directed simulation, snaps nodes onto
//! hierarchy levels, nudges them by an external importance score and routes
//! every edge around the node boxes. Each stage is also usable on its own.

mod cancel;
mod config;
mod error;
mod force;
mod graph;
mod hierarchy;
mod importance;
mod layout;
mod routing;
mod types;

pub use cancel::CancellationToken;
pub use config::LayoutConstraints;
pub use error::{GraphDefect, ImportanceError, LayoutError};
pub use force::{ForceDirectedSolver, SolveOutcome};
pub use graph::{Edge, EdgeId, EdgeKind, Graph, GraphInput, GraphMetrics, Node};
pub use hierarchy::{HierarchyAnalyzer, Layering};
pub use importance::{
    ImportanceAdjuster, ImportanceProvider, ImportanceWeights, MetadataImportance,
    NeutralImportance, StaticImportance,
};
pub use layout::compute_layout;
pub use routing::{EdgePaths, EdgeRouter};
pub use types::{Bounds, Direction, LayoutResult, Position, Size};

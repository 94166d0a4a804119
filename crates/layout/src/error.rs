use std::time::Duration;

use thiserror::Error;

/// Failures visible to the caller. Both abort before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] GraphDefect),
    #[error("invalid config: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl LayoutError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        LayoutError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Structural problems found while building a [`crate::Graph`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphDefect {
    #[error("node `{0}` is declared more than once")]
    DuplicateNode(String),
    #[error("edge on node `{0}` is a self-loop")]
    SelfLoop(String),
    #[error("edge `{from}` -> `{to}` is declared more than once")]
    DuplicateEdge { from: String, to: String },
    #[error("edge `{from}` -> `{to}` references unknown node `{missing}`")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },
    #[error("edge id `{0}` is used more than once")]
    DuplicateEdgeId(String),
    #[error("edge `{from}` -> `{to}` has invalid weight {weight}")]
    InvalidWeight {
        from: String,
        to: String,
        weight: String,
    },
}

/// The importance oracle could not deliver. Always recovered by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportanceError {
    #[error("importance provider unavailable: {0}")]
    Unavailable(String),
    #[error("importance provider timed out after {0:?}")]
    TimedOut(Duration),
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::types::{Direction, Size};

/// Upper bound of the refinement band as a fraction of the level separation.
const LEVEL_BAND_FRACTION: f64 = 0.25;

/// Tuning knobs for one layout run. Validated once at pipeline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConstraints {
    /// Spring stiffness per unit of stretch away from `ideal_edge_length`.
    pub spring_constant: f64,
    /// Inverse-square repulsion strength between every node pair.
    pub repulsion_constant: f64,
    pub ideal_edge_length: f64,
    pub max_iterations: usize,
    /// The solver stops once no node moves further than this in one iteration.
    pub convergence_epsilon: f64,
    /// Distance between consecutive level midlines on the hierarchy axis.
    pub level_separation: f64,
    pub random_seed: u64,
    /// Seconds to wait for the importance provider.
    #[serde(alias = "oracleTimeout")]
    pub oracle_timeout_secs: f64,
    /// Per-iteration decay of the solver's displacement cap, in (0, 1).
    pub cooling: f64,
    pub node_size: Size,
    /// Minimum free space between the bounding regions of neighbouring nodes.
    pub node_spacing: f64,
    pub importance_passes: usize,
    pub importance_strength: f64,
    pub direction: Direction,
}

impl Default for LayoutConstraints {
    fn default() -> Self {
        Self {
            spring_constant: 0.1,
            repulsion_constant: 5000.0,
            ideal_edge_length: 100.0,
            max_iterations: 500,
            convergence_epsilon: 0.01,
            level_separation: 120.0,
            random_seed: 0,
            oracle_timeout_secs: 2.0,
            cooling: 0.97,
            node_size: Size {
                width: 40.0,
                height: 24.0,
            },
            node_spacing: 20.0,
            importance_passes: 20,
            importance_strength: 0.05,
            direction: Direction::TopDown,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), LayoutError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LayoutError::config(
            field,
            format!("must be a positive finite number, got {value}"),
        ))
    }
}

fn nonzero(field: &'static str, value: usize) -> Result<(), LayoutError> {
    if value > 0 {
        Ok(())
    } else {
        Err(LayoutError::config(field, "must be greater than zero"))
    }
}

impl LayoutConstraints {
    pub fn validate(&self) -> Result<(), LayoutError> {
        positive("springConstant", self.spring_constant)?;
        positive("repulsionConstant", self.repulsion_constant)?;
        positive("idealEdgeLength", self.ideal_edge_length)?;
        nonzero("maxIterations", self.max_iterations)?;
        positive("convergenceEpsilon", self.convergence_epsilon)?;
        positive("levelSeparation", self.level_separation)?;
        positive("oracleTimeoutSecs", self.oracle_timeout_secs)?;
        if Duration::try_from_secs_f64(self.oracle_timeout_secs).is_err() {
            return Err(LayoutError::config(
                "oracleTimeoutSecs",
                format!("is too large for a timeout, got {}", self.oracle_timeout_secs),
            ));
        }
        positive("cooling", self.cooling)?;
        if self.cooling >= 1.0 {
            return Err(LayoutError::config(
                "cooling",
                format!("must be below 1, got {}", self.cooling),
            ));
        }
        positive("nodeSize.width", self.node_size.width)?;
        positive("nodeSize.height", self.node_size.height)?;
        positive("nodeSpacing", self.node_spacing)?;
        let level_room = self.direction.primary_extent(self.node_size) + self.node_spacing;
        if self.level_separation < level_room {
            return Err(LayoutError::config(
                "levelSeparation",
                format!(
                    "must leave room for a node and its spacing ({level_room}), got {}",
                    self.level_separation
                ),
            ));
        }
        nonzero("importancePasses", self.importance_passes)?;
        positive("importanceStrength", self.importance_strength)?;
        Ok(())
    }

    /// Saturates for values `validate` would reject.
    pub fn oracle_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.oracle_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Half-width of the band around a level midline that importance
    /// refinement may use. A node region anywhere in the band stays clear of
    /// the routing channels halfway between levels.
    pub(crate) fn level_band(&self) -> f64 {
        let (half_w, half_h) = self.region_half_extents();
        let half_region = match self.direction {
            Direction::TopDown => half_h,
            Direction::LeftRight => half_w,
        };
        let channel_room = self.level_separation / 2.0 - half_region;
        (self.level_separation * LEVEL_BAND_FRACTION).min(channel_room.max(0.0))
    }

    /// Half-extents of a node's bounding region, spacing included.
    pub(crate) fn region_half_extents(&self) -> (f64, f64) {
        let pad = self.node_spacing / 2.0;
        (
            self.node_size.width / 2.0 + pad,
            self.node_size.height / 2.0 + pad,
        )
    }

    /// Smallest allowed distance between two same-level node centres on the
    /// orthogonal axis.
    pub(crate) fn min_cross_gap(&self) -> f64 {
        self.direction.cross_extent(self.node_size) + self.node_spacing
    }
}

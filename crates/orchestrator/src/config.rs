//! Configuration parsing and validation for coupled heat runs

use std::fs;
use std::path::Path;
use std::time::Duration;

use kernel::{BoundaryCondition, BoundaryKind, Grid, GridParameters};
use serde::{Deserialize, Serialize};

use crate::channel::Side;
use crate::error::{RunError, RunResult};

/// Main run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Human-readable run name
    pub name: String,
    /// Simulated time to reach (seconds)
    pub duration: f64,
    /// Hand every step's field to the sink, not just the last one
    #[serde(default)]
    pub animate: bool,
    /// How long a fetch or collective may wait for a neighbour (milliseconds)
    #[serde(default = "default_coupling_timeout_ms")]
    pub coupling_timeout_ms: u64,
    /// Conditions on the outer edges of the global domain
    #[serde(default)]
    pub boundary_conditions: GlobalBoundaries,
    /// Partitions from left to right
    pub partitions: Vec<PartitionConfig>,
}

/// Conditions on the two outer x-edges; an absent side is insulated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalBoundaries {
    /// Left edge of the first partition
    #[serde(default)]
    pub left: Option<BoundarySpec>,
    /// Right edge of the last partition
    #[serde(default)]
    pub right: Option<BoundarySpec>,
}

/// Boundary condition as written in the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySpec {
    /// `temperature` or `flux`
    pub kind: String,
    /// Temperature, or flux in W/m^2
    pub value: f64,
}

/// One partition of the domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Extent along y (meters)
    pub height: f64,
    /// Extent along x (meters)
    pub width: f64,
    /// Nodes per axis
    pub nodes: usize,
    /// Thermal diffusivity (m^2/s)
    pub alpha: f64,
    /// Thermal conductivity (W/(m K)), needed for a flux condition on this partition
    #[serde(default)]
    pub conductivity: Option<f64>,
    /// Initial temperature field
    #[serde(default)]
    pub initial: InitialCondition,
}

/// Initial temperatures: uniform, with optional fixed edge rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialCondition {
    /// Temperature of every cell
    #[serde(default)]
    pub temperature: f64,
    /// Override for the row at `x = 0`
    #[serde(default)]
    pub left_row: Option<f64>,
    /// Override for the row at `x = nodes - 1`
    #[serde(default)]
    pub right_row: Option<f64>,
}

fn default_coupling_timeout_ms() -> u64 {
    30_000
}

impl InitialCondition {
    /// Build the initial field for a partition with `nodes` nodes.
    pub fn build(&self, nodes: usize) -> Grid {
        let mut grid = Grid::filled(nodes, self.temperature);
        if nodes > 0 {
            if let Some(t) = self.left_row {
                grid.fill_row(0, t);
            }
            if let Some(t) = self.right_row {
                grid.fill_row(nodes - 1, t);
            }
        }
        grid
    }
}

impl PartitionConfig {
    /// Locally derived grid parameters (before negotiation).
    pub fn grid_parameters(&self) -> RunResult<GridParameters> {
        Ok(GridParameters::new(self.height, self.width, self.nodes, self.alpha)?)
    }
}

impl RunConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> RunResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| RunError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json(json: &str) -> RunResult<Self> {
        let config: RunConfig = serde_json::from_str(json)
            .map_err(|e| RunError::Config(format!("failed to parse config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> RunResult<()> {
        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(RunError::invalid("duration must be non-negative"));
        }
        if self.partitions.is_empty() {
            return Err(RunError::invalid("at least one partition is required"));
        }
        if self.coupling_timeout_ms == 0 && self.partitions.len() > 1 {
            return Err(RunError::invalid(
                "coupling_timeout_ms must be positive when partitions are coupled",
            ));
        }

        for (i, partition) in self.partitions.iter().enumerate() {
            partition
                .grid_parameters()
                .map_err(|e| RunError::invalid(format!("partition {i}: {e}")))?;
            if let Some(k) = partition.conductivity {
                if !(k.is_finite() && k > 0.0) {
                    return Err(RunError::invalid(format!(
                        "partition {i}: conductivity must be positive, got {k}"
                    )));
                }
            }
            let initial = &partition.initial;
            let temps = [Some(initial.temperature), initial.left_row, initial.right_row];
            if temps.iter().flatten().any(|t| !t.is_finite()) {
                return Err(RunError::invalid(format!(
                    "partition {i}: initial temperatures must be finite"
                )));
            }
        }

        // Building the outer conditions checks kind names and flux conductivity.
        let last = self.partitions.len() - 1;
        self.boundary_for(0, Side::Left)?;
        self.boundary_for(last, Side::Right)?;
        Ok(())
    }

    /// Global x position of the left edge of partition `index` (meters).
    pub fn partition_start(&self, index: usize) -> f64 {
        self.partitions.iter().take(index).map(|p| p.width).sum()
    }

    /// Coupling timeout as a `Duration`
    pub fn coupling_timeout(&self) -> Duration {
        Duration::from_millis(self.coupling_timeout_ms)
    }

    /// Outer-edge condition of partition `index` on `side`, if that edge is a global one.
    pub fn boundary_for(&self, index: usize, side: Side) -> RunResult<Option<BoundaryCondition>> {
        let partition = self.partitions.get(index).ok_or_else(|| {
            RunError::invalid(format!(
                "partition {index} does not exist in a run of {}",
                self.partitions.len()
            ))
        })?;
        let spec = match side {
            Side::Left if index == 0 => self.boundary_conditions.left.as_ref(),
            Side::Right if index + 1 == self.partitions.len() => {
                self.boundary_conditions.right.as_ref()
            }
            _ => None,
        };
        let Some(spec) = spec else {
            return Ok(None);
        };

        let params = partition.grid_parameters()?;
        BoundaryCondition::new(&spec.kind, spec.value, params.dx, partition.conductivity)
            .map(Some)
            .map_err(|e| RunError::invalid(format!("{side} boundary: {e}")))
    }

    /// Kind of the configured condition on a global edge, for reporting.
    pub fn boundary_kind(&self, side: Side) -> Option<BoundaryKind> {
        let spec = match side {
            Side::Left => self.boundary_conditions.left.as_ref(),
            Side::Right => self.boundary_conditions.right.as_ref(),
        };
        spec.and_then(|s| s.kind.parse().ok())
    }
}

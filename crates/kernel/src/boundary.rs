//! Conditions applied at the outer (non-coupled) x-edges of the global domain.
//!
//! A `temperature` condition pins the ghost value beyond the edge to an absolute
//! temperature. A `flux` condition is relative: the imposed flux is converted to
//! a temperature offset `flux * dx / k` that is added to the partition's own
//! boundary row every time it is evaluated.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{KernelError, KernelResult};

/// Recognised boundary condition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// Fixed temperature (Dirichlet)
    Temperature,
    /// Fixed heat flux (W/m^2), relative to the current edge temperature
    Flux,
}

impl FromStr for BoundaryKind {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temperature" => Ok(BoundaryKind::Temperature),
            "flux" => Ok(BoundaryKind::Flux),
            other => Err(KernelError::invalid(format!(
                "unknown boundary condition kind '{other}' (expected 'temperature' or 'flux')"
            ))),
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryKind::Temperature => f.write_str("temperature"),
            BoundaryKind::Flux => f.write_str("flux"),
        }
    }
}

/// Boundary condition with its value already converted for the owning partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundaryCondition {
    kind: BoundaryKind,
    value: f64,
    effective: f64,
}

impl BoundaryCondition {
    /// Build a condition from its configured kind name.
    ///
    /// `dx` is the partition's x spacing and `conductivity` its thermal
    /// conductivity; both are only consulted for `flux`.
    pub fn new(kind: &str, value: f64, dx: f64, conductivity: Option<f64>) -> KernelResult<Self> {
        match kind.parse::<BoundaryKind>()? {
            BoundaryKind::Temperature => Self::temperature(value),
            BoundaryKind::Flux => {
                let k = conductivity.ok_or_else(|| {
                    KernelError::invalid("flux boundary requires a thermal conductivity")
                })?;
                Self::flux(value, dx, k)
            }
        }
    }

    /// Fixed temperature at the edge.
    pub fn temperature(value: f64) -> KernelResult<Self> {
        if !value.is_finite() {
            return Err(KernelError::invalid(format!(
                "boundary temperature must be finite, got {value}"
            )));
        }
        Ok(Self {
            kind: BoundaryKind::Temperature,
            value,
            effective: value,
        })
    }

    /// Fixed flux into the domain through the edge.
    pub fn flux(flux: f64, dx: f64, conductivity: f64) -> KernelResult<Self> {
        if !flux.is_finite() {
            return Err(KernelError::invalid(format!("boundary flux must be finite, got {flux}")));
        }
        if !(conductivity.is_finite() && conductivity > 0.0) {
            return Err(KernelError::invalid(format!(
                "thermal conductivity must be positive, got {conductivity}"
            )));
        }
        if !(dx.is_finite() && dx > 0.0) {
            return Err(KernelError::invalid(format!("dx must be positive, got {dx}")));
        }
        Ok(Self {
            kind: BoundaryKind::Flux,
            value: flux,
            effective: flux * dx / conductivity,
        })
    }

    /// Configured kind
    pub fn kind(&self) -> BoundaryKind {
        self.kind
    }

    /// Value as configured (temperature, or flux in W/m^2)
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Converted value: the temperature itself, or `flux * dx / k`
    pub fn effective(&self) -> f64 {
        self.effective
    }

    /// Temperature of the ghost cell beyond an edge cell currently at `own`.
    #[inline]
    pub fn ghost_value(&self, own: f64) -> f64 {
        match self.kind {
            BoundaryKind::Temperature => self.effective,
            BoundaryKind::Flux => own + self.effective,
        }
    }

    /// Ghost row beyond an edge whose current values are `own_row`.
    pub fn boundary_row(&self, own_row: &[f64]) -> Vec<f64> {
        own_row.iter().map(|&t| self.ghost_value(t)).collect()
    }
}

//! Grid geometry, time step and interface blend coefficients.

use serde::Serialize;

use crate::error::{KernelError, KernelResult};

/// Fraction of the diffusive limit `min(dx^2, dy^2) / alpha` used as the time step.
///
/// The explicit 2-D update stays bounded while
/// `alpha * dt * (1/dx^2 + 1/dy^2) <= 1/2`; taking a quarter of the
/// smaller spacing squared satisfies that for any aspect ratio.
pub const STABILITY_FACTOR: f64 = 0.25;

/// Largest stable explicit time step for the given spacings and diffusivity.
pub fn stable_timestep(dx: f64, dy: f64, alpha: f64) -> f64 {
    STABILITY_FACTOR * (dx * dx).min(dy * dy) / alpha
}

/// Geometry and integration parameters of one partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridParameters {
    /// Partition extent along y (meters)
    pub height: f64,
    /// Partition extent along x (meters)
    pub width: f64,
    /// Nodes per axis
    pub nodes: usize,
    /// Thermal diffusivity (m^2/s)
    pub alpha: f64,
    /// Cell spacing along x (meters)
    pub dx: f64,
    /// Cell spacing along y (meters)
    pub dy: f64,
    /// Time step (seconds)
    pub dt: f64,
}

impl GridParameters {
    /// Derive spacings and the stable time step from the partition geometry.
    ///
    /// Fails with [`KernelError::InvalidConfiguration`] when any extent or the
    /// diffusivity is non-positive or non-finite, or when `nodes` is zero.
    pub fn new(height: f64, width: f64, nodes: usize, alpha: f64) -> KernelResult<Self> {
        if !(height.is_finite() && height > 0.0) {
            return Err(KernelError::invalid(format!("height must be positive, got {height}")));
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(KernelError::invalid(format!("width must be positive, got {width}")));
        }
        if nodes == 0 {
            return Err(KernelError::invalid("nodes must be at least 1"));
        }
        if !(alpha.is_finite() && alpha > 0.0) {
            return Err(KernelError::invalid(format!("alpha must be positive, got {alpha}")));
        }

        let dx = width / nodes as f64;
        let dy = height / nodes as f64;
        Ok(Self {
            height,
            width,
            nodes,
            alpha,
            dx,
            dy,
            dt: stable_timestep(dx, dy, alpha),
        })
    }

    /// Copy of these parameters advancing with `dt` instead.
    ///
    /// Used once negotiation has agreed on the run-wide step.
    pub fn with_timestep(self, dt: f64) -> Self {
        Self { dt, ..self }
    }

    /// `alpha * dt / dx^2`
    pub fn fourier_x(&self) -> f64 {
        self.alpha * self.dt / (self.dx * self.dx)
    }

    /// `alpha * dt / dy^2`
    pub fn fourier_y(&self) -> f64 {
        self.alpha * self.dt / (self.dy * self.dy)
    }
}

/// How strongly each neighbour's temperature enters this partition's edge derivative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlendCoefficients {
    /// Coefficient for the interface with the left neighbour
    pub toward_left: f64,
    /// Coefficient for the interface with the right neighbour
    pub toward_right: f64,
}

impl BlendCoefficients {
    /// Both coefficients equal to one (homogeneous material or no neighbours).
    pub const UNIT: Self = Self {
        toward_left: 1.0,
        toward_right: 1.0,
    };

    /// Blend own diffusivity with each neighbour's: `(neighbour + own) / (2 * own)`.
    ///
    /// Edge partitions pass their own `alpha` for the missing side, which makes
    /// that coefficient exactly one.
    pub fn from_diffusivities(own: f64, left: f64, right: f64) -> Self {
        Self {
            toward_left: blend(own, left),
            toward_right: blend(own, right),
        }
    }
}

impl Default for BlendCoefficients {
    fn default() -> Self {
        Self::UNIT
    }
}

fn blend(own: f64, neighbour: f64) -> f64 {
    (neighbour + own) / (2.0 * own)
}

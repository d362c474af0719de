//! 2-D Heat Diffusion Kernel
//!
//! This crate provides the numerical core of a partitioned explicit heat solver.
//! It knows nothing about threads or neighbours beyond the rows handed to it.
//!
//! # Modules
//! - [`grid`] -- Square row-major temperature field.
//! - [`params`] -- Grid spacing, stable time step and interface blend coefficients.
//! - [`boundary`] -- Fixed-temperature and fixed-flux conditions for outer edges.
//! - [`stencil`] -- FTCS update with ghost-flux edges and the `StencilKernel` trait.
//! - [`analysis`] -- x-profiles, linear fits and field metrics.

#![warn(missing_docs)]

pub mod analysis;
pub mod boundary;
pub mod error;
pub mod grid;
pub mod params;
pub mod stencil;

pub use analysis::{interface_estimate, linear_fit, profile_positions, x_profile, FieldMetrics, LinearFit};
pub use boundary::{BoundaryCondition, BoundaryKind};
pub use error::{KernelError, KernelResult};
pub use grid::Grid;
pub use params::{stable_timestep, BlendCoefficients, GridParameters, STABILITY_FACTOR};
pub use stencil::{EdgeSupply, ExplicitStencil, StencilKernel, DEFAULT_PARALLEL_THRESHOLD};

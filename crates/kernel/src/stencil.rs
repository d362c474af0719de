//! Explicit FTCS update of the 2-D heat equation.
//!
//! Each cell gathers four one-sided differences `neighbour - own`:
//!
//! ```text
//! T' = T + alpha*dt/dx^2 * (Xw + Xe) + alpha*dt/dy^2 * (Ys + Yn)
//! ```
//!
//! In the interior `Xw + Xe` is the usual second difference. Where a neighbour
//! cell is missing the difference is replaced according to the edge:
//!
//! - y edges: zero (ghost flux, insulated top and bottom)
//! - x edge facing another partition: `blend * (neighbour_row[y] - T)`
//! - x edge of the global domain: `ghost - T` from the [`BoundaryCondition`],
//!   or zero when the edge is insulated
//!
//! The old grid is only read; results go to a separate output grid.

use rayon::prelude::*;
use tracing::trace;

use crate::boundary::BoundaryCondition;
use crate::error::{KernelError, KernelResult};
use crate::grid::Grid;
use crate::params::GridParameters;

/// Grids with at least this many cells are updated in parallel by default.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64 * 64;

/// What lies beyond an x-edge of the partition.
#[derive(Debug, Clone, Copy)]
pub enum EdgeSupply<'a> {
    /// Zero-gradient edge
    Insulated,
    /// Outer edge of the global domain with a configured condition
    Condition(&'a BoundaryCondition),
    /// Interface with a neighbouring partition
    Neighbour {
        /// Neighbour's boundary row, resampled to this partition's nodes
        row: &'a [f64],
        /// Blend coefficient for this interface
        blend: f64,
    },
}

impl EdgeSupply<'_> {
    /// Difference `ghost - own` contributed by this edge for cell `y`.
    #[inline]
    fn contribution(&self, y: usize, own: f64) -> f64 {
        match *self {
            EdgeSupply::Insulated => 0.0,
            EdgeSupply::Condition(bc) => bc.ghost_value(own) - own,
            EdgeSupply::Neighbour { row, blend } => blend * (row[y] - own),
        }
    }

    fn validate(&self, nodes: usize, side: &str) -> KernelResult<()> {
        if let EdgeSupply::Neighbour { row, blend } = *self {
            if row.len() != nodes {
                return Err(KernelError::invalid(format!(
                    "{side} neighbour row has {} values, expected {nodes}",
                    row.len()
                )));
            }
            if !blend.is_finite() {
                return Err(KernelError::invalid(format!(
                    "{side} blend coefficient is not finite"
                )));
            }
        }
        Ok(())
    }
}

/// Trait implemented by stencil back-ends.
pub trait StencilKernel: Send + Sync {
    /// Write the next field into `next`, reading only `field`.
    fn advance_into(
        &self,
        field: &Grid,
        next: &mut Grid,
        west: EdgeSupply<'_>,
        east: EdgeSupply<'_>,
        params: &GridParameters,
    ) -> KernelResult<()>;

    /// Compute and return the next field.
    fn advance(
        &self,
        field: &Grid,
        west: EdgeSupply<'_>,
        east: EdgeSupply<'_>,
        params: &GridParameters,
    ) -> KernelResult<Grid> {
        let mut next = Grid::new(field.nodes());
        self.advance_into(field, &mut next, west, east, params)?;
        Ok(next)
    }
}

/// Reference CPU stencil, row-parallel above a size threshold.
#[derive(Debug, Clone)]
pub struct ExplicitStencil {
    parallel_threshold: usize,
}

impl ExplicitStencil {
    /// Stencil using [`DEFAULT_PARALLEL_THRESHOLD`].
    pub fn new() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Stencil that always runs on the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
        }
    }

    /// Stencil that parallelizes grids with at least `cells` cells.
    pub fn with_parallel_threshold(cells: usize) -> Self {
        Self {
            parallel_threshold: cells,
        }
    }

    /// Whether a grid of `nodes` x `nodes` cells is updated across the rayon pool.
    pub fn is_parallel_for(&self, nodes: usize) -> bool {
        nodes.saturating_mul(nodes) >= self.parallel_threshold
    }
}

impl Default for ExplicitStencil {
    fn default() -> Self {
        Self::new()
    }
}

impl StencilKernel for ExplicitStencil {
    fn advance_into(
        &self,
        field: &Grid,
        next: &mut Grid,
        west: EdgeSupply<'_>,
        east: EdgeSupply<'_>,
        params: &GridParameters,
    ) -> KernelResult<()> {
        let n = field.nodes();
        if n != params.nodes {
            return Err(KernelError::invalid(format!(
                "field has {n} nodes but parameters describe {}",
                params.nodes
            )));
        }
        if next.nodes() != n {
            return Err(KernelError::invalid(format!(
                "output grid has {} nodes, expected {n}",
                next.nodes()
            )));
        }
        west.validate(n, "left")?;
        east.validate(n, "right")?;

        let fx = params.fourier_x();
        let fy = params.fourier_y();

        let parallel = self.is_parallel_for(n);
        trace!(
            "Advancing {}x{} field ({})",
            n,
            n,
            if parallel { "parallel" } else { "sequential" }
        );
        if parallel {
            next.as_mut_slice()
                .par_chunks_mut(n)
                .enumerate()
                .for_each(|(x, out)| update_row(field, x, out, &west, &east, fx, fy));
        } else {
            next.as_mut_slice()
                .chunks_mut(n)
                .enumerate()
                .for_each(|(x, out)| update_row(field, x, out, &west, &east, fx, fy));
        }
        Ok(())
    }
}

/// Update the cells of row `x` into `out`.
#[inline]
fn update_row(
    field: &Grid,
    x: usize,
    out: &mut [f64],
    west: &EdgeSupply<'_>,
    east: &EdgeSupply<'_>,
    fx: f64,
    fy: f64,
) {
    let n = field.nodes();
    let row = field.row(x);
    let prev = if x > 0 { Some(field.row(x - 1)) } else { None };
    let next = if x + 1 < n { Some(field.row(x + 1)) } else { None };

    for y in 0..n {
        let t = row[y];
        let xw = match prev {
            Some(p) => p[y] - t,
            None => west.contribution(y, t),
        };
        let xe = match next {
            Some(p) => p[y] - t,
            None => east.contribution(y, t),
        };
        let ys = if y > 0 { row[y - 1] - t } else { 0.0 };
        let yn = if y + 1 < n { row[y + 1] - t } else { 0.0 };

        out[y] = t + fx * (xw + xe) + fy * (ys + yn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(nodes: usize) -> GridParameters {
        GridParameters::new(1.0, 0.05, nodes, 1.27e-4).unwrap()
    }

    #[test]
    fn test_single_step_hot_wall() {
        let p = params(4);
        let mut field = Grid::new(4);
        field.fill_row(0, 100.0);

        let next = ExplicitStencil::sequential()
            .advance(&field, EdgeSupply::Insulated, EdgeSupply::Insulated, &p)
            .unwrap();

        assert!(next.get(0, 0) < 100.0);
        assert!(next.get(1, 0) > 0.0);
        for x in 2..4 {
            for y in 0..4 {
                assert_eq!(next.get(x, y), 0.0);
            }
        }
        // Old field untouched
        assert_eq!(field.get(0, 0), 100.0);
    }

    #[test]
    fn test_uniform_field_is_fixed_point() {
        let p = params(6);
        let field = Grid::filled(6, 37.0);
        let next = ExplicitStencil::sequential()
            .advance(&field, EdgeSupply::Insulated, EdgeSupply::Insulated, &p)
            .unwrap();
        assert_eq!(next, field);
    }

    #[test]
    fn test_unit_blend_matches_interior_difference() {
        let p = params(3);
        let mut field = Grid::new(3);
        for x in 0..3 {
            field.fill_row(x, x as f64 * 10.0);
        }
        let neighbour = vec![30.0; 3];
        let next = ExplicitStencil::sequential()
            .advance(
                &field,
                EdgeSupply::Insulated,
                EdgeSupply::Neighbour { row: &neighbour, blend: 1.0 },
                &p,
            )
            .unwrap();
        // Linear profile continued by the neighbour: no change at the edge.
        for y in 0..3 {
            assert!((next.get(2, y) - 20.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_temperature_condition_pulls_edge() {
        let p = params(4);
        let field = Grid::new(4);
        let bc = BoundaryCondition::temperature(50.0).unwrap();
        let next = ExplicitStencil::sequential()
            .advance(&field, EdgeSupply::Condition(&bc), EdgeSupply::Insulated, &p)
            .unwrap();
        let expected = p.fourier_x() * 50.0;
        for y in 0..4 {
            assert!((next.get(0, y) - expected).abs() < 1e-12);
            assert_eq!(next.get(3, y), 0.0);
        }
    }

    #[test]
    fn test_flux_condition_adds_constant_offset() {
        let p = params(4);
        let field = Grid::filled(4, 20.0);
        let bc = BoundaryCondition::flux(1000.0, p.dx, 50.0).unwrap();
        let next = ExplicitStencil::sequential()
            .advance(&field, EdgeSupply::Insulated, EdgeSupply::Condition(&bc), &p)
            .unwrap();
        let expected = 20.0 + p.fourier_x() * bc.effective();
        for y in 0..4 {
            assert!((next.get(3, y) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_parallel_threshold_selects_path() {
        assert!(!ExplicitStencil::sequential().is_parallel_for(1 << 20));
        assert!(ExplicitStencil::with_parallel_threshold(16).is_parallel_for(4));
        assert!(!ExplicitStencil::with_parallel_threshold(16).is_parallel_for(3));
        let default = ExplicitStencil::new();
        assert!(!default.is_parallel_for(63));
        assert!(default.is_parallel_for(64));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let p = params(20);
        let mut field = Grid::new(20);
        for x in 0..20 {
            for y in 0..20 {
                field.set(x, y, ((x * 7 + y * 3) % 11) as f64);
            }
        }
        let left = vec![5.0; 20];
        let west = EdgeSupply::Neighbour { row: &left, blend: 1.3 };
        let seq = ExplicitStencil::sequential()
            .advance(&field, west, EdgeSupply::Insulated, &p)
            .unwrap();
        let par = ExplicitStencil::with_parallel_threshold(1)
            .advance(&field, west, EdgeSupply::Insulated, &p)
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_single_node_grid() {
        let p = params(1);
        let field = Grid::filled(1, 10.0);
        let bc = BoundaryCondition::temperature(20.0).unwrap();
        let next = ExplicitStencil::sequential()
            .advance(&field, EdgeSupply::Condition(&bc), EdgeSupply::Condition(&bc), &p)
            .unwrap();
        let expected = 10.0 + p.fourier_x() * 20.0;
        assert!((next.get(0, 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_short_neighbour_row() {
        let p = params(4);
        let field = Grid::new(4);
        let row = vec![0.0; 3];
        let err = ExplicitStencil::new()
            .advance(
                &field,
                EdgeSupply::Neighbour { row: &row, blend: 1.0 },
                EdgeSupply::Insulated,
                &p,
            )
            .unwrap_err();
        assert!(matches!(err, KernelError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_rejects_mismatched_parameters() {
        let field = Grid::new(5);
        let result = ExplicitStencil::new().advance(
            &field,
            EdgeSupply::Insulated,
            EdgeSupply::Insulated,
            &params(4),
        );
        assert!(result.is_err());
    }
}

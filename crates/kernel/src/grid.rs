//! Square temperature grid owned by one partition.
//!
//! Storage is row-major in `x`: the `nodes` values sharing one `x` index form a
//! contiguous "row", which is exactly the unit exchanged across a vertical
//! partition interface.

use crate::error::{KernelError, KernelResult};

/// Dense `nodes x nodes` temperature field, indexed `[x][y]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    nodes: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Create a grid with every cell set to zero.
    pub fn new(nodes: usize) -> Self {
        Self::filled(nodes, 0.0)
    }

    /// Create a grid with every cell set to `value`.
    pub fn filled(nodes: usize, value: f64) -> Self {
        Self {
            nodes,
            data: vec![value; nodes * nodes],
        }
    }

    /// Build a grid from row-major data (`data[x * nodes + y]`).
    pub fn from_rows(nodes: usize, data: Vec<f64>) -> KernelResult<Self> {
        if data.len() != nodes * nodes {
            return Err(KernelError::invalid(format!(
                "grid data has {} values, expected {} for {} nodes",
                data.len(),
                nodes * nodes,
                nodes
            )));
        }
        Ok(Self { nodes, data })
    }

    /// Number of nodes along each axis.
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Temperature at `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[x * self.nodes + y]
    }

    /// Overwrite the temperature at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[x * self.nodes + y] = value;
    }

    /// Set every cell to `value`.
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// All values sharing the `x` index.
    #[inline]
    pub fn row(&self, x: usize) -> &[f64] {
        &self.data[x * self.nodes..(x + 1) * self.nodes]
    }

    /// Mutable access to the values sharing the `x` index.
    #[inline]
    pub fn row_mut(&mut self, x: usize) -> &mut [f64] {
        &mut self.data[x * self.nodes..(x + 1) * self.nodes]
    }

    /// Set all values of row `x` to `value`.
    pub fn fill_row(&mut self, x: usize, value: f64) {
        self.row_mut(x).iter_mut().for_each(|v| *v = value);
    }

    /// Row at `x = 0`, the edge facing the left neighbour.
    pub fn leftmost_row(&self) -> &[f64] {
        self.row(0)
    }

    /// Row at `x = nodes - 1`, the edge facing the right neighbour.
    pub fn rightmost_row(&self) -> &[f64] {
        self.row(self.nodes - 1)
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Raw row-major storage, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Sum of all cells (total heat content up to a constant factor).
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// `true` if no cell holds NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_layout() {
        let mut grid = Grid::new(3);
        grid.set(1, 2, 5.0);
        assert_eq!(grid.row(1), &[0.0, 0.0, 5.0]);
        assert_eq!(grid.as_slice()[1 * 3 + 2], 5.0);
    }

    #[test]
    fn test_edge_rows() {
        let mut grid = Grid::new(4);
        grid.fill_row(0, 100.0);
        grid.fill_row(3, -1.0);
        assert!(grid.leftmost_row().iter().all(|&v| v == 100.0));
        assert!(grid.rightmost_row().iter().all(|&v| v == -1.0));
        assert!((grid.sum() - (400.0 - 4.0)).abs() < 1e-12);
    }

    #[test]
    fn test_from_rows_rejects_wrong_length() {
        assert!(Grid::from_rows(3, vec![0.0; 8]).is_err());
        assert!(Grid::from_rows(3, vec![0.0; 9]).is_ok());
    }

    #[test]
    fn test_is_finite() {
        let mut grid = Grid::filled(2, 1.0);
        assert!(grid.is_finite());
        grid.set(0, 1, f64::NAN);
        assert!(!grid.is_finite());
    }
}

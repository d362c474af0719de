//! Post-processing of a partition's field: x-profile, linear fit, summary metrics.

use serde::Serialize;

use crate::grid::Grid;

/// Summary values of one field snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldMetrics {
    /// Sum over all cells
    pub total: f64,
    /// Smallest cell value
    pub min: f64,
    /// Largest cell value
    pub max: f64,
    /// Mean cell value
    pub mean: f64,
    /// `false` if any cell is NaN or infinite
    pub finite: bool,
}

impl FieldMetrics {
    /// Compute metrics for `grid`.
    pub fn of(grid: &Grid) -> Self {
        let values = grid.as_slice();
        let total: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = if values.is_empty() {
            0.0
        } else {
            total / values.len() as f64
        };
        Self {
            total,
            min,
            max,
            mean,
            finite: grid.is_finite(),
        }
    }
}

/// Mean over `y` of every x row: the temperature profile across the partition.
pub fn x_profile(grid: &Grid) -> Vec<f64> {
    let n = grid.nodes() as f64;
    (0..grid.nodes())
        .map(|x| grid.row(x).iter().sum::<f64>() / n)
        .collect()
}

/// Global x positions of the profile samples of a partition starting at `start`.
///
/// Evenly spaced from `start` to `start + width`, both ends included.
pub fn profile_positions(start: f64, width: f64, nodes: usize) -> Vec<f64> {
    match nodes {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = width / (nodes - 1) as f64;
            (0..nodes).map(|i| start + i as f64 * step).collect()
        }
    }
}

/// Mean of the rightmost row, the partition's estimate of its right interface temperature.
pub fn interface_estimate(grid: &Grid) -> f64 {
    let row = grid.rightmost_row();
    row.iter().sum::<f64>() / row.len() as f64
}

/// Least-squares line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    /// Gradient
    pub slope: f64,
    /// Value at `x = 0`
    pub intercept: f64,
}

impl LinearFit {
    /// Evaluate the line at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a line through `(xs[i], ys[i])`.
///
/// Returns `None` for fewer than two points, mismatched lengths, or when all
/// `xs` coincide.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if sxx <= f64::EPSILON * n * mean_x.abs().max(1.0) {
        return None;
    }

    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut grid = Grid::filled(2, 1.0);
        grid.set(1, 1, 5.0);
        let m = FieldMetrics::of(&grid);
        assert_eq!(m.total, 8.0);
        assert_eq!(m.min, 1.0);
        assert_eq!(m.max, 5.0);
        assert_eq!(m.mean, 2.0);
        assert!(m.finite);
    }

    #[test]
    fn test_profile_is_row_mean() {
        let mut grid = Grid::new(3);
        grid.row_mut(0).copy_from_slice(&[1.0, 2.0, 3.0]);
        grid.fill_row(2, 9.0);
        assert_eq!(x_profile(&grid), vec![2.0, 0.0, 9.0]);
        assert_eq!(interface_estimate(&grid), 9.0);
    }

    #[test]
    fn test_positions_span_partition() {
        let pos = profile_positions(0.10, 0.05, 6);
        assert_eq!(pos.len(), 6);
        assert!((pos[0] - 0.10).abs() < 1e-15);
        assert!((pos[5] - 0.15).abs() < 1e-15);
        assert_eq!(profile_positions(0.5, 0.5, 1), vec![0.5]);
        assert!(profile_positions(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_fit_recovers_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys: Vec<f64> = xs.iter().map(|x| -4.0 * x + 7.0).collect();
        let fit = linear_fit(&xs, &ys).unwrap();
        assert!((fit.slope + 4.0).abs() < 1e-12);
        assert!((fit.intercept - 7.0).abs() < 1e-12);
        assert!((fit.at(10.0) + 33.0).abs() < 1e-10);
    }

    #[test]
    fn test_fit_degenerate() {
        assert!(linear_fit(&[1.0], &[2.0]).is_none());
        assert!(linear_fit(&[1.0, 1.0], &[2.0, 3.0]).is_none());
        assert!(linear_fit(&[1.0, 2.0], &[2.0]).is_none());
    }
}

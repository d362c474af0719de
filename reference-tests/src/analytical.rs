//! Analytical reference solutions for heat diffusion validation.
//!
//! Provides closed-form results against which solver output can be compared
//! for quantitative accuracy assessment. Rows are cell-centred: row `i` of a
//! partition sits at `(i + 0.5) * dx`, with edge conditions applied through a
//! ghost row half a cell outside the first and last rows.

use std::f64::consts::PI;

/// Steady state between two fixed-temperature walls.
///
/// With ghost rows holding the wall temperatures, the discrete steady state
/// of a chain of `rows` interior rows is exactly linear:
///
/// ```text
/// T(g) = T_left + (T_right - T_left) * (g + 1) / (rows + 1)
/// ```
///
/// where `g` is the global row index counted from the left wall.
#[derive(Debug, Clone, Copy)]
pub struct LinearSteadyState {
    /// Left wall temperature
    pub left: f64,
    /// Right wall temperature
    pub right: f64,
    /// Total rows between the walls, over all partitions
    pub rows: usize,
}

impl LinearSteadyState {
    /// Create the steady state for `rows` rows between walls at `left` and `right`.
    pub fn new(left: f64, right: f64, rows: usize) -> Self {
        Self { left, right, rows }
    }

    /// Temperature of global row `row`.
    pub fn at(&self, row: usize) -> f64 {
        self.left + (self.right - self.left) * (row as f64 + 1.0) / (self.rows as f64 + 1.0)
    }

    /// Largest absolute deviation of `profile` (indexed by global row) from the steady state.
    pub fn max_error(&self, profile: &[f64]) -> f64 {
        profile
            .iter()
            .enumerate()
            .map(|(g, &t)| (t - self.at(g)).abs())
            .fold(0.0, f64::max)
    }
}

/// Decay of the lowest cosine mode in an insulated slab.
///
/// A field `mean + A cos(pi (i + 0.5) / n)` is an eigenvector of the explicit
/// stencil with mirrored (insulated) edges. Each step multiplies the amplitude
/// by
///
/// ```text
/// g = 1 - 4 * Fo * sin^2(pi / (2 n))
/// ```
///
/// while the continuous problem decays as `exp(-alpha (pi / W)^2 t)`.
#[derive(Debug, Clone, Copy)]
pub struct CosineModeDecay {
    /// Mean temperature, preserved by insulated edges
    pub mean: f64,
    /// Initial amplitude of the mode
    pub amplitude: f64,
    /// Rows across the slab
    pub nodes: usize,
}

impl CosineModeDecay {
    /// Create a mode with the given mean and amplitude over `nodes` rows.
    pub fn new(mean: f64, amplitude: f64, nodes: usize) -> Self {
        Self {
            mean,
            amplitude,
            nodes,
        }
    }

    /// Mode shape at row `row`, scaled to unit amplitude.
    pub fn shape(&self, row: usize) -> f64 {
        (PI * (row as f64 + 0.5) / self.nodes as f64).cos()
    }

    /// Initial temperature of row `row`.
    pub fn initial(&self, row: usize) -> f64 {
        self.mean + self.amplitude * self.shape(row)
    }

    /// Per-step amplification of the discrete scheme with Fourier number `fourier`.
    pub fn discrete_factor(&self, fourier: f64) -> f64 {
        let s = (PI / (2.0 * self.nodes as f64)).sin();
        1.0 - 4.0 * fourier * s * s
    }

    /// Amplitude after `steps` discrete steps.
    pub fn discrete_amplitude(&self, fourier: f64, steps: u64) -> f64 {
        self.amplitude * self.discrete_factor(fourier).powf(steps as f64)
    }

    /// Amplitude of the continuous solution at time `t` for a slab of width `width`.
    pub fn continuous_amplitude(&self, alpha: f64, width: f64, t: f64) -> f64 {
        let k = PI / width;
        self.amplitude * (-alpha * k * k * t).exp()
    }

    /// Project a row profile onto the mode, returning its amplitude.
    pub fn measure(&self, profile: &[f64]) -> f64 {
        let (num, den) = profile
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, &t)| {
                let s = self.shape(i);
                (num + (t - self.mean) * s, den + s * s)
            });
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }
}

/// Heat content added through a fixed-flux wall, per unit volumetric heat capacity.
///
/// A flux `q` (W/m^2) over a wall of length `height` for time `t` adds
/// `q * height * t` joules per metre of depth; dividing by `rho c = k / alpha`
/// gives the change in the integral of temperature over the area (K m^2).
pub fn flux_heat_input(flux: f64, alpha: f64, conductivity: f64, height: f64, t: f64) -> f64 {
    flux * alpha * height * t / conductivity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_steady_state_endpoints() {
        let steady = LinearSteadyState::new(100.0, 0.0, 9);
        assert!((steady.at(0) - 90.0).abs() < 1e-12);
        assert!((steady.at(8) - 10.0).abs() < 1e-12);
        let exact: Vec<f64> = (0..9).map(|g| steady.at(g)).collect();
        assert_eq!(steady.max_error(&exact), 0.0);
    }

    #[test]
    fn test_cosine_mode_measure_recovers_amplitude() {
        let mode = CosineModeDecay::new(50.0, 7.5, 16);
        let profile: Vec<f64> = (0..16).map(|i| mode.initial(i)).collect();
        assert!((mode.measure(&profile) - 7.5).abs() < 1e-12);
        // The mode is antisymmetric about the centre.
        assert!((mode.shape(0) + mode.shape(15)).abs() < 1e-12);
    }

    #[test]
    fn test_discrete_decay_approaches_continuous() {
        let mode = CosineModeDecay::new(0.0, 1.0, 200);
        let (alpha, width) = (1.0e-4, 0.1);
        let dx = width / 200.0;
        let dt = 0.25 * dx * dx / alpha;
        let fourier = alpha * dt / (dx * dx);
        let steps = 4000;
        let discrete = mode.discrete_amplitude(fourier, steps);
        let continuous = mode.continuous_amplitude(alpha, width, steps as f64 * dt);
        assert!(discrete < 1.0);
        assert!((discrete - continuous).abs() < 1e-4, "{discrete} vs {continuous}");
    }

    #[test]
    fn test_flux_heat_input_units() {
        // 1 W/m^2 for 1 s through 1 m of wall into material with k = alpha
        assert!((flux_heat_input(1.0, 2.0, 2.0, 1.0, 1.0) - 1.0).abs() < 1e-15);
        assert_eq!(flux_heat_input(848_000.0, 1.11e-4, 401.0, 1.0, 0.0), 0.0);
    }
}

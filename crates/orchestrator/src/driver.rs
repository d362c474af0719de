//! Per-partition time integration.
//!
//! A [`PartitionSimulation`] owns one partition's field, its negotiated
//! parameters and its channels. Each step exchanges boundary rows with the
//! neighbours at the current time, advances the field by one `dt`, and
//! optionally hands the result to a [`RenderSink`].

use std::time::Instant;

use kernel::{
    BlendCoefficients, BoundaryCondition, EdgeSupply, ExplicitStencil, Grid, GridParameters,
    StencilKernel,
};
use tracing::{debug, error, info, warn};

use crate::channel::{CouplingChannel, Quantity};
use crate::error::{RunError, RunResult};
use crate::negotiation::{Negotiated, PartitionDescriptor};
use crate::sink::{NullSink, RenderSink};

/// Log progress every this many steps.
const PROGRESS_INTERVAL: u64 = 100;

/// Lifecycle of a partition's time loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Constructed, not yet started
    Idle,
    /// Advancing in time
    Stepping,
    /// Requested duration reached, or a step failed
    Done,
}

/// One partition's simulation state and time loop.
pub struct PartitionSimulation {
    descriptor: PartitionDescriptor,
    params: GridParameters,
    blend: BlendCoefficients,
    left: Option<Box<dyn CouplingChannel>>,
    right: Option<Box<dyn CouplingChannel>>,
    left_condition: Option<BoundaryCondition>,
    right_condition: Option<BoundaryCondition>,
    kernel: Box<dyn StencilKernel>,
    sink: Box<dyn RenderSink>,
    animate: bool,
    field: Grid,
    scratch: Grid,
    duration: f64,
    current_time: f64,
    steps: u64,
    state: DriverState,
    diverged: bool,
    started_at: Option<Instant>,
}

impl PartitionSimulation {
    /// Simulation of `initial` for `duration` seconds with the negotiated setup.
    ///
    /// Outer edges are insulated, frames are discarded and the explicit CPU
    /// stencil is used until overridden by the `with_*` methods.
    pub fn new(negotiated: Negotiated, initial: Grid, duration: f64) -> RunResult<Self> {
        let Negotiated {
            descriptor,
            params,
            blend,
            left,
            right,
            ..
        } = negotiated;

        if initial.nodes() != params.nodes {
            return Err(RunError::invalid(format!(
                "initial field has {} nodes, partition has {}",
                initial.nodes(),
                params.nodes
            )));
        }
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(RunError::invalid(format!(
                "duration must be non-negative, got {duration}"
            )));
        }
        if left.is_some() != descriptor.has_left() || right.is_some() != descriptor.has_right() {
            return Err(RunError::mismatch(format!(
                "partition {} channels do not match its position in a run of {}",
                descriptor.index, descriptor.count
            )));
        }

        let scratch = Grid::new(params.nodes);
        Ok(Self {
            descriptor,
            params,
            blend,
            left,
            right,
            left_condition: None,
            right_condition: None,
            kernel: Box::new(ExplicitStencil::new()),
            sink: Box::new(NullSink),
            animate: false,
            field: initial,
            scratch,
            duration,
            current_time: 0.0,
            steps: 0,
            state: DriverState::Idle,
            diverged: false,
            started_at: None,
        })
    }

    /// Conditions for the outer edges. Ignored on edges that face a neighbour.
    pub fn with_boundaries(
        mut self,
        left: Option<BoundaryCondition>,
        right: Option<BoundaryCondition>,
    ) -> Self {
        self.left_condition = left;
        self.right_condition = right;
        self
    }

    /// Send frames to `sink`: after every step if `animate`, and always at the end.
    pub fn with_sink(mut self, sink: Box<dyn RenderSink>, animate: bool) -> Self {
        self.sink = sink;
        self.animate = animate;
        self
    }

    /// Replace the stencil back-end.
    pub fn with_kernel(mut self, kernel: Box<dyn StencilKernel>) -> Self {
        self.kernel = kernel;
        self
    }

    /// Move from `Idle` to `Stepping`.
    pub fn start(&mut self) -> RunResult<()> {
        if self.state != DriverState::Idle {
            return Err(RunError::invalid(format!(
                "cannot start partition {} in state {:?}",
                self.descriptor.index, self.state
            )));
        }
        self.state = DriverState::Stepping;
        self.started_at = Some(Instant::now());
        info!(
            "Partition {}/{}: stepping to t={}s with dt={:.6e}s",
            self.descriptor.index, self.descriptor.count, self.duration, self.params.dt
        );
        if self.current_time >= self.duration {
            self.finish();
        }
        Ok(())
    }

    /// Advance one step. Any failure is final and moves the driver to `Done`.
    pub fn step(&mut self) -> RunResult<()> {
        if self.state != DriverState::Stepping {
            return Err(RunError::invalid(format!(
                "partition {} is not stepping (state {:?})",
                self.descriptor.index, self.state
            )));
        }
        if let Err(e) = self.advance() {
            error!(
                "Partition {} failed at t={}s after {} steps: {}",
                self.descriptor.index, self.current_time, self.steps, e
            );
            self.state = DriverState::Done;
            return Err(e);
        }
        if self.current_time >= self.duration {
            self.finish();
        }
        Ok(())
    }

    /// Start if needed and step until done.
    pub fn run(&mut self) -> RunResult<()> {
        if self.state == DriverState::Idle {
            self.start()?;
        }
        while self.state == DriverState::Stepping {
            self.step()?;
        }
        Ok(())
    }

    fn advance(&mut self) -> RunResult<()> {
        let t = self.current_time;
        let dt = self.params.dt;

        let left_row = match self.left.as_mut() {
            Some(channel) => Some(exchange(channel.as_mut(), self.field.leftmost_row(), t, dt)?),
            None => None,
        };
        let right_row = match self.right.as_mut() {
            Some(channel) => Some(exchange(channel.as_mut(), self.field.rightmost_row(), t, dt)?),
            None => None,
        };

        let west = supply(left_row.as_deref(), self.blend.toward_left, self.left_condition.as_ref());
        let east = supply(right_row.as_deref(), self.blend.toward_right, self.right_condition.as_ref());
        self.kernel
            .advance_into(&self.field, &mut self.scratch, west, east, &self.params)?;
        std::mem::swap(&mut self.field, &mut self.scratch);

        self.current_time += dt;
        self.steps += 1;

        if !self.diverged && !self.field.is_finite() {
            self.diverged = true;
            warn!(
                "Partition {}: field became non-finite at step {} (t={}s)",
                self.descriptor.index, self.steps, self.current_time
            );
        }
        if self.steps % PROGRESS_INTERVAL == 0 {
            debug!(
                "Partition {} step {}: t={:.4}s, wall_time={:.2}s",
                self.descriptor.index,
                self.steps,
                self.current_time,
                self.started_at.map(|s| s.elapsed().as_secs_f64()).unwrap_or(0.0)
            );
        }
        if self.animate {
            self.sink
                .present(&self.descriptor, self.current_time, self.steps, &self.field);
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = DriverState::Done;
        self.sink
            .present(&self.descriptor, self.current_time, self.steps, &self.field);
        info!(
            "Partition {} finished: {} steps, {:.4}s simulated",
            self.descriptor.index, self.steps, self.current_time
        );
    }

    /// Current lifecycle state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Simulated time reached (seconds)
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Completed steps
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current temperature field
    pub fn field(&self) -> &Grid {
        &self.field
    }

    /// Negotiated parameters
    pub fn params(&self) -> &GridParameters {
        &self.params
    }

    /// Interface blend coefficients
    pub fn blend(&self) -> BlendCoefficients {
        self.blend
    }

    /// Position in the run
    pub fn descriptor(&self) -> PartitionDescriptor {
        self.descriptor
    }

    /// Consume the simulation, returning its field.
    pub fn into_field(self) -> Grid {
        self.field
    }
}

/// Push own edge row at `t`, fetch the neighbour's, and retire history before `t - dt`.
fn exchange(channel: &mut dyn CouplingChannel, own: &[f64], t: f64, dt: f64) -> RunResult<Vec<f64>> {
    channel.push(Quantity::Temperature, own, t)?;
    let row = channel.fetch(Quantity::Temperature, t)?;
    channel.forget(t - dt);
    Ok(row)
}

fn supply<'a>(
    neighbour: Option<&'a [f64]>,
    blend: f64,
    condition: Option<&'a BoundaryCondition>,
) -> EdgeSupply<'a> {
    match (neighbour, condition) {
        (Some(row), _) => EdgeSupply::Neighbour { row, blend },
        (None, Some(bc)) => EdgeSupply::Condition(bc),
        (None, None) => EdgeSupply::Insulated,
    }
}

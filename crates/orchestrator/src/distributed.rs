//! Thread-per-partition execution of a coupled run.
//!
//! [`run_partition`] is the body one partition executes against any
//! [`PartitionRuntime`]: build its parameters, negotiate, then drive its time
//! loop. [`run_coupled`] wires an in-process [`LocalRuntime`] group, runs every
//! partition on its own thread and gathers the results.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use kernel::{
    interface_estimate, linear_fit, profile_positions, x_profile, BlendCoefficients, FieldMetrics,
    Grid, GridParameters, LinearFit,
};
use serde::Serialize;

use crate::channel::Side;
use crate::config::RunConfig;
use crate::driver::PartitionSimulation;
use crate::error::{RunError, RunResult};
use crate::negotiation::{negotiate, PartitionDescriptor};
use crate::runtime::{LocalRuntime, PartitionRuntime};
use crate::sink::{NullSink, RenderSink};

/// x-profile of a partition's final field and what was fitted to it
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    /// Global x position of each profile sample (meters)
    pub positions: Vec<f64>,
    /// Mean temperature over y at each x row
    pub temperatures: Vec<f64>,
    /// Least-squares line through the profile, if it has two or more samples
    pub fit: Option<LinearFit>,
    /// Mean of the rightmost row; absent for the last partition
    pub interface_estimate: Option<f64>,
    /// Whole-field summary
    pub metrics: FieldMetrics,
}

impl ProfileSummary {
    /// Analyse `field` of the partition at `descriptor`, spanning `start..start + width`.
    pub fn of(field: &Grid, descriptor: &PartitionDescriptor, start: f64, width: f64) -> Self {
        let positions = profile_positions(start, width, field.nodes());
        let temperatures = x_profile(field);
        let fit = linear_fit(&positions, &temperatures);
        Self {
            positions,
            temperatures,
            fit,
            interface_estimate: descriptor.has_right().then(|| interface_estimate(field)),
            metrics: FieldMetrics::of(field),
        }
    }
}

/// Final state of one partition
#[derive(Debug, Clone)]
pub struct PartitionResult {
    /// Position in the run
    pub descriptor: PartitionDescriptor,
    /// Negotiated parameters
    pub params: GridParameters,
    /// Interface blend coefficients
    pub blend: BlendCoefficients,
    /// Steps executed
    pub steps: u64,
    /// Simulated time reached (seconds)
    pub sim_time: f64,
    /// Final temperature field
    pub field: Grid,
    /// Profile analysis of the final field
    pub profile: ProfileSummary,
}

/// Result of a coupled run, partitions ordered left to right
#[derive(Debug, Clone)]
pub struct CoupledResult {
    /// Run name from the configuration
    pub name: String,
    /// One entry per partition
    pub partitions: Vec<PartitionResult>,
    /// Wall-clock duration of the run (seconds)
    pub wall_time: f64,
}

/// Execute partition `runtime.index()` of `config` to completion.
///
/// Configuration problems are reported before any collective is entered.
pub fn run_partition(
    runtime: &mut dyn PartitionRuntime,
    config: &RunConfig,
    sink: Box<dyn RenderSink>,
) -> RunResult<PartitionResult> {
    let index = runtime.index();
    if runtime.count() != config.partitions.len() {
        return Err(RunError::mismatch(format!(
            "runtime has {} partitions, configuration describes {}",
            runtime.count(),
            config.partitions.len()
        )));
    }
    let partition = config.partitions.get(index).ok_or_else(|| {
        RunError::mismatch(format!("no configuration for partition {index}"))
    })?;
    let params = partition.grid_parameters()?;
    let left = config.boundary_for(index, Side::Left)?;
    let right = config.boundary_for(index, Side::Right)?;
    let initial = partition.initial.build(partition.nodes);

    let negotiated = negotiate(runtime, params)?;
    let mut sim = PartitionSimulation::new(negotiated, initial, config.duration)?
        .with_boundaries(left, right)
        .with_sink(sink, config.animate);
    sim.run()?;

    let descriptor = sim.descriptor();
    let start = config.partition_start(index);
    let profile = ProfileSummary::of(sim.field(), &descriptor, start, partition.width);
    Ok(PartitionResult {
        descriptor,
        params: *sim.params(),
        blend: sim.blend(),
        steps: sim.steps(),
        sim_time: sim.current_time(),
        field: sim.into_field(),
        profile,
    })
}

/// Run every partition of `config` on its own thread, discarding frames.
pub fn run_coupled(config: &RunConfig) -> RunResult<CoupledResult> {
    run_coupled_with_sinks(config, Vec::new())
}

/// Run every partition of `config` on its own thread.
///
/// `sinks[i]` receives partition `i`'s frames; missing entries discard frames.
/// When several partitions fail, the most fundamental error is returned.
pub fn run_coupled_with_sinks(
    config: &RunConfig,
    sinks: Vec<Box<dyn RenderSink>>,
) -> RunResult<CoupledResult> {
    config.validate()?;
    let n = config.partitions.len();
    tracing::info!(
        "Coupled run '{}': {} partitions, duration={}s",
        config.name,
        n,
        config.duration
    );

    let start = Instant::now();
    let shared = Arc::new(config.clone());
    let mut sinks = sinks.into_iter();
    let mut handles = Vec::with_capacity(n);

    for mut runtime in LocalRuntime::group(n, config.coupling_timeout()) {
        let config = Arc::clone(&shared);
        let sink = sinks
            .next()
            .unwrap_or_else(|| Box::new(NullSink) as Box<dyn RenderSink>);
        handles.push(thread::spawn(move || {
            run_partition(&mut runtime, &config, sink)
        }));
    }

    let mut results = Vec::with_capacity(n);
    let mut failures: Vec<(usize, RunError)> = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(result)) => results.push(result),
            Ok(Err(e)) => failures.push((i, e)),
            Err(_) => failures.push((i, RunError::PartitionPanicked(i))),
        }
    }

    if !failures.is_empty() {
        for (i, e) in &failures {
            tracing::error!("Partition {} failed: {}", i, e);
        }
        let root = failures
            .into_iter()
            .min_by_key(|(i, e)| (e.root_cause_rank(), *i))
            .map(|(_, e)| e);
        if let Some(root) = root {
            return Err(root);
        }
    }

    let wall_time = start.elapsed().as_secs_f64();
    log_summary(&config.name, &results, wall_time);
    Ok(CoupledResult {
        name: config.name.clone(),
        partitions: results,
        wall_time,
    })
}

fn log_summary(name: &str, results: &[PartitionResult], wall_time: f64) {
    tracing::info!(
        "Coupled run '{}' finished in {:.2}s wall time",
        name,
        wall_time
    );
    for r in results {
        let p = &r.profile;
        match p.fit {
            Some(fit) => tracing::info!(
                "  Partition {}: {} steps, t={:.4}s, fit T(x) = {:.3}x + {:.3}, range [{:.3}, {:.3}]",
                r.descriptor.index,
                r.steps,
                r.sim_time,
                fit.slope,
                fit.intercept,
                p.metrics.min,
                p.metrics.max
            ),
            None => tracing::info!(
                "  Partition {}: {} steps, t={:.4}s, range [{:.3}, {:.3}]",
                r.descriptor.index,
                r.steps,
                r.sim_time,
                p.metrics.min,
                p.metrics.max
            ),
        }
        if let Some(t) = p.interface_estimate {
            tracing::info!(
                "  Interface {}|{}: estimated T = {:.3}",
                r.descriptor.index,
                r.descriptor.index + 1,
                t
            );
        }
        if !p.metrics.finite {
            tracing::warn!("  Partition {} ended with a non-finite field", r.descriptor.index);
        }
    }
}

//! Orchestration Layer
//!
//! This crate turns the single-partition kernel into a coupled run:
//! - Run configuration loading and validation
//! - Partition runtime with collectives and neighbour channels
//! - Parameter negotiation (shared `dt`, coupling lattice, blend coefficients)
//! - Per-partition time integration with boundary exchange
//! - Thread-per-partition coordinator and background runner

#![warn(missing_docs)]

pub mod channel;
pub mod config;
pub mod distributed;
pub mod driver;
pub mod error;
pub mod negotiation;
pub mod runner;
pub mod runtime;
pub mod sink;

pub use channel::{CouplingChannel, CouplingLattice, LocalChannel, Quantity, Side};
pub use config::RunConfig;
pub use distributed::{run_coupled, run_coupled_with_sinks, run_partition, CoupledResult, PartitionResult};
pub use driver::{DriverState, PartitionSimulation};
pub use error::{RunError, RunResult};
pub use negotiation::{negotiate, Negotiated, PartitionDescriptor};
pub use runner::{RunnerState, SimulationRunner};
pub use runtime::{LocalRuntime, PartitionRuntime};
pub use sink::{Frame, FrameRecorder, LatestFrame, NullSink, RenderSink};

/// Load a configuration file and run it to completion.
///
/// # Example
/// ```no_run
/// let result = orchestrator::run_config_file("configs/dual-slab.json")?;
/// for p in &result.partitions {
///     println!("partition {}: {} steps", p.descriptor.index, p.steps);
/// }
/// # Ok::<(), orchestrator::RunError>(())
/// ```
pub fn run_config_file(path: &str) -> RunResult<CoupledResult> {
    tracing::info!("Running configuration: {}", path);
    let config = RunConfig::load(path)?;
    run_coupled(&config)
}

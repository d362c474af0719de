//! Background runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which executes a coupled run
//! on a background thread and exposes its state, live frames and final result
//! to a control interface such as the server.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::config::RunConfig;
use crate::distributed::{run_coupled_with_sinks, CoupledResult};
use crate::sink::{Frame, LatestFrame, RenderSink};

/// Runner state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Run created but not yet started
    Created,
    /// Partitions are stepping
    Running,
    /// Every partition reached the requested duration
    Finished,
    /// The run failed; see `error_message`
    Error,
}

/// Shared state between the runner thread and control interface
struct SharedState {
    state: RunnerState,
    error_message: Option<String>,
    result: Option<CoupledResult>,
}

/// Handle for controlling and querying a coupled run
pub struct SimulationRunner {
    config: RunConfig,
    shared: Arc<Mutex<SharedState>>,
    frames: Vec<LatestFrame>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SimulationRunner {
    /// Create a runner for `config`; nothing runs until [`start`](Self::start).
    pub fn new(config: RunConfig) -> Self {
        let frames = (0..config.partitions.len()).map(|_| LatestFrame::new()).collect();
        Self {
            config,
            shared: Arc::new(Mutex::new(SharedState {
                state: RunnerState::Created,
                error_message: None,
                result: None,
            })),
            frames,
            thread_handle: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configuration being run
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        self.lock().state
    }

    /// Get error message if state is Error
    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    /// Final result once the state is Finished
    pub fn result(&self) -> Option<CoupledResult> {
        self.lock().result.clone()
    }

    /// Most recent frame of each partition, left to right
    pub fn latest_frames(&self) -> Vec<Option<Frame>> {
        self.frames.iter().map(LatestFrame::latest).collect()
    }

    /// Latest simulated time seen across partitions (seconds)
    pub fn sim_time(&self) -> f64 {
        self.frames
            .iter()
            .filter_map(|f| f.latest().map(|frame| frame.time))
            .fold(0.0, f64::max)
    }

    /// Start the run on a background thread (transition from Created to Running)
    pub fn start(&mut self) {
        {
            let mut state = self.lock();
            if state.state != RunnerState::Created {
                return;
            }
            state.state = RunnerState::Running;
        }

        let config = self.config.clone();
        let sinks: Vec<Box<dyn RenderSink>> = self
            .frames
            .iter()
            .map(|f| Box::new(f.clone()) as Box<dyn RenderSink>)
            .collect();
        let shared = Arc::clone(&self.shared);

        self.thread_handle = Some(thread::spawn(move || {
            let outcome = run_coupled_with_sinks(&config, sinks);
            let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Ok(result) => {
                    tracing::info!("Run '{}' finished", config.name);
                    guard.state = RunnerState::Finished;
                    guard.result = Some(result);
                }
                Err(e) => {
                    tracing::error!("Run '{}' failed: {}", config.name, e);
                    guard.state = RunnerState::Error;
                    guard.error_message = Some(e.to_string());
                }
            }
        }));
    }

    /// Wait for the background thread to complete
    pub fn join(mut self) -> Result<RunnerState, String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Runner thread panicked".to_string())?;
        }
        Ok(self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalBoundaries, InitialCondition, PartitionConfig};

    fn config(alpha: f64) -> RunConfig {
        RunConfig {
            name: "runner".to_string(),
            duration: 0.5,
            animate: true,
            coupling_timeout_ms: 10_000,
            boundary_conditions: GlobalBoundaries::default(),
            partitions: vec![PartitionConfig {
                height: 1.0,
                width: 0.05,
                nodes: 4,
                alpha,
                conductivity: None,
                initial: InitialCondition::default(),
            }],
        }
    }

    #[test]
    fn test_runner_lifecycle() {
        let mut runner = SimulationRunner::new(config(1.27e-4));
        assert_eq!(runner.state(), RunnerState::Created);
        assert!(runner.result().is_none());
        runner.start();
        let frames = runner.frames.clone();
        assert_eq!(runner.join().unwrap(), RunnerState::Finished);
        assert!(frames[0].latest().is_some());
    }

    #[test]
    fn test_runner_reports_error() {
        let mut runner = SimulationRunner::new(config(-1.0));
        runner.start();
        let shared = Arc::clone(&runner.shared);
        assert_eq!(runner.join().unwrap(), RunnerState::Error);
        let message = shared.lock().unwrap().error_message.clone().unwrap();
        assert!(message.contains("alpha"), "{message}");
    }
}

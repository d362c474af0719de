//! Shared application state

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use orchestrator::SimulationRunner;

/// Shared application state
pub struct AppState {
    /// Runs created through the API (ID -> Runner)
    pub simulations: Mutex<HashMap<String, SimulationRunner>>,
    /// Path to configs directory
    pub configs_dir: PathBuf,
    /// Server port, used to build WebSocket URLs
    pub port: u16,
}

impl AppState {
    /// Create new application state
    pub fn new(configs_dir: PathBuf, port: u16) -> Self {
        Self {
            simulations: Mutex::new(HashMap::new()),
            configs_dir,
            port,
        }
    }

    /// Lock the run table, recovering it if a handler panicked while holding it.
    pub fn simulations(&self) -> MutexGuard<'_, HashMap<String, SimulationRunner>> {
        self.simulations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the configuration file called `name`, stripped of path separators.
    pub fn config_path(&self, name: &str) -> PathBuf {
        let safe_name = name.replace("..", "").replace(['/', '\\'], "");
        self.configs_dir.join(format!("{}.json", safe_name))
    }
}

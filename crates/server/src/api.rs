//! REST API endpoints for run management

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use orchestrator::distributed::ProfileSummary;
use orchestrator::{RunConfig, RunnerState, SimulationRunner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

// ---------------------------------------------------------------------------
// Request/Response Types
// ---------------------------------------------------------------------------

/// Request body for creating a run
#[derive(Debug, Deserialize)]
pub struct CreateSimulationRequest {
    /// Configuration name (e.g., "dual-slab")
    pub config: String,
    /// Override of the configured duration (seconds)
    #[serde(default)]
    pub duration: Option<f64>,
    /// Override of the configured animate flag
    #[serde(default)]
    pub animate: Option<bool>,
}

/// Response for run creation
#[derive(Debug, Serialize)]
pub struct CreateSimulationResponse {
    /// Unique run ID
    pub simulation_id: String,
    /// Current status
    pub status: String,
    /// WebSocket URL for streaming this run
    pub ws_url: String,
    /// Number of partitions
    pub partition_count: usize,
}

/// Configuration file metadata
#[derive(Debug, Serialize)]
pub struct ConfigInfo {
    /// Configuration file stem
    pub name: String,
    /// Run name from inside the file
    pub title: String,
    /// Number of partitions
    pub partition_count: usize,
    /// Cells summed over all partitions
    pub cell_count: usize,
    /// Simulated duration (seconds)
    pub duration: f64,
}

/// List of available configurations
#[derive(Debug, Serialize)]
pub struct ConfigListResponse {
    /// Available configurations
    pub configs: Vec<ConfigInfo>,
}

/// Run status response
#[derive(Debug, Serialize)]
pub struct SimulationStatusResponse {
    /// Run ID
    pub simulation_id: String,
    /// `created`, `running`, `finished` or `error`
    pub status: String,
    /// Latest simulated time seen across partitions (seconds)
    pub sim_time: f64,
    /// Requested duration (seconds)
    pub duration: f64,
    /// Completed steps of each partition, from the latest frames
    pub steps: Vec<u64>,
    /// Failure description when the status is `error`
    pub error: Option<String>,
}

/// Final profile of one partition
#[derive(Debug, Serialize)]
pub struct PartitionProfileResponse {
    /// Partition index
    pub index: usize,
    /// Steps executed
    pub steps: u64,
    /// Simulated time reached (seconds)
    pub sim_time: f64,
    /// Negotiated time step (seconds)
    pub dt: f64,
    /// Blend toward the left neighbour
    pub blend_left: f64,
    /// Blend toward the right neighbour
    pub blend_right: f64,
    /// Profile and fit of the final field
    pub profile: ProfileSummary,
}

/// Profiles of a finished run
#[derive(Debug, Serialize)]
pub struct ProfilesResponse {
    /// Run ID
    pub simulation_id: String,
    /// Wall-clock duration of the run (seconds)
    pub wall_time: f64,
    /// One entry per partition, left to right
    pub partitions: Vec<PartitionProfileResponse>,
}

/// Lowercase name of a runner state, as used on the wire
pub fn status_name(state: RunnerState) -> &'static str {
    match state {
        RunnerState::Created => "created",
        RunnerState::Running => "running",
        RunnerState::Finished => "finished",
        RunnerState::Error => "error",
    }
}

fn not_found(id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Simulation '{}' not found", id))
}

// ---------------------------------------------------------------------------
// API Handlers
// ---------------------------------------------------------------------------

/// GET /api/configs - List available configuration files
pub async fn list_configs(State(state): State<Arc<AppState>>) -> ApiResult<ConfigListResponse> {
    let entries = std::fs::read_dir(&state.configs_dir).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read configs directory: {}", e),
        )
    })?;

    let mut configs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        match RunConfig::load(&path) {
            Ok(config) => configs.push(ConfigInfo {
                name,
                title: config.name.clone(),
                partition_count: config.partitions.len(),
                cell_count: config.partitions.iter().map(|p| p.nodes * p.nodes).sum(),
                duration: config.duration,
            }),
            Err(e) => {
                tracing::warn!("Failed to parse config {:?}: {}", path, e);
            }
        }
    }
    configs.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(ConfigListResponse { configs }))
}

/// GET /api/configs/{name} - Get raw configuration JSON
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<serde_json::Value> {
    let config_path = state.config_path(&name);
    if !config_path.exists() {
        return Err((StatusCode::NOT_FOUND, format!("Configuration '{}' not found", name)));
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to read config: {}", e))
    })?;
    let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to parse config: {}", e))
    })?;

    Ok(Json(json))
}

/// POST /api/simulations - Create and start a run
pub async fn create_simulation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSimulationRequest>,
) -> ApiResult<CreateSimulationResponse> {
    let config_path = state.config_path(&req.config);
    if !config_path.exists() {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Configuration '{}' not found", req.config),
        ));
    }

    let mut config = RunConfig::load(&config_path)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid configuration: {}", e)))?;
    if let Some(duration) = req.duration {
        config.duration = duration;
    }
    if let Some(animate) = req.animate {
        config.animate = animate;
    }
    config
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid configuration: {}", e)))?;

    let sim_id = uuid::Uuid::new_v4().to_string();
    let partition_count = config.partitions.len();
    tracing::info!(
        "Creating run {} from '{}' ({} partitions)",
        sim_id,
        req.config,
        partition_count
    );

    let mut runner = SimulationRunner::new(config);
    runner.start();
    let status = status_name(runner.state()).to_string();
    state.simulations().insert(sim_id.clone(), runner);

    let ws_url = format!("ws://localhost:{}/ws/simulation/{}", state.port, sim_id);
    Ok(Json(CreateSimulationResponse {
        simulation_id: sim_id,
        status,
        ws_url,
        partition_count,
    }))
}

/// GET /api/simulations/{id} - Get run status
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<SimulationStatusResponse> {
    let simulations = state.simulations();
    let runner = simulations.get(&id).ok_or_else(|| not_found(&id))?;

    let steps = runner
        .latest_frames()
        .iter()
        .map(|f| f.as_ref().map_or(0, |frame| frame.step))
        .collect();

    Ok(Json(SimulationStatusResponse {
        simulation_id: id.clone(),
        status: status_name(runner.state()).to_string(),
        sim_time: runner.sim_time(),
        duration: runner.config().duration,
        steps,
        error: runner.error_message(),
    }))
}

/// GET /api/simulations/{id}/profiles - Fitted profiles of a finished run
pub async fn get_profiles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ProfilesResponse> {
    let simulations = state.simulations();
    let runner = simulations.get(&id).ok_or_else(|| not_found(&id))?;

    let result = match runner.state() {
        RunnerState::Finished => runner.result(),
        RunnerState::Error => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                runner.error_message().unwrap_or_else(|| "Run failed".to_string()),
            ))
        }
        _ => None,
    };
    let result = result.ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            format!("Simulation '{}' has not finished", id),
        )
    })?;

    let partitions = result
        .partitions
        .into_iter()
        .map(|p| PartitionProfileResponse {
            index: p.descriptor.index,
            steps: p.steps,
            sim_time: p.sim_time,
            dt: p.params.dt,
            blend_left: p.blend.toward_left,
            blend_right: p.blend.toward_right,
            profile: p.profile,
        })
        .collect();

    Ok(Json(ProfilesResponse {
        simulation_id: id.clone(),
        wall_time: result.wall_time,
        partitions,
    }))
}

/// DELETE /api/simulations/{id} - Forget a run that is no longer stepping
pub async fn delete_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut simulations = state.simulations();
    let runner = simulations.get(&id).ok_or_else(|| not_found(&id))?;
    if runner.state() == RunnerState::Running {
        return Err((
            StatusCode::CONFLICT,
            format!("Simulation '{}' is still running", id),
        ));
    }
    simulations.remove(&id);
    tracing::info!("Removed run {}", id);
    Ok(StatusCode::NO_CONTENT)
}

//! REST handler checks against a temporary configs directory

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use server::api::{self, CreateSimulationRequest};
use server::state::AppState;

const DUAL_SLAB: &str = r#"{
    "name": "dual slab",
    "duration": 2.0,
    "boundary_conditions": { "left": { "kind": "temperature", "value": 100.0 } },
    "partitions": [
        { "height": 1.0, "width": 0.05, "nodes": 6, "alpha": 1.27e-4 },
        { "height": 1.0, "width": 0.05, "nodes": 6, "alpha": 1.27e-4 }
    ]
}"#;

fn state_with_configs(files: &[(&str, &str)]) -> (Arc<AppState>, PathBuf) {
    let dir = std::env::temp_dir().join(format!("heat-server-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    for (name, body) in files {
        std::fs::write(dir.join(name), body).unwrap();
    }
    (Arc::new(AppState::new(dir.clone(), 3000)), dir)
}

fn request(config: &str) -> Json<CreateSimulationRequest> {
    Json(CreateSimulationRequest {
        config: config.to_string(),
        duration: None,
        animate: None,
    })
}

async fn wait_until_done(state: &Arc<AppState>, id: &str) -> String {
    for _ in 0..200 {
        let status = api::get_simulation(State(state.clone()), Path(id.to_string()))
            .await
            .unwrap()
            .0
            .status;
        if status == "finished" || status == "error" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("simulation {id} did not finish");
}

#[tokio::test]
async fn test_list_and_get_configs() {
    let (state, dir) = state_with_configs(&[
        ("dual-slab.json", DUAL_SLAB),
        ("broken.json", "{ not json"),
        ("notes.txt", "ignored"),
    ]);

    let list = api::list_configs(State(state.clone())).await.unwrap().0;
    assert_eq!(list.configs.len(), 1, "unparseable and non-json files are skipped");
    let info = &list.configs[0];
    assert_eq!(info.name, "dual-slab");
    assert_eq!(info.title, "dual slab");
    assert_eq!(info.partition_count, 2);
    assert_eq!(info.cell_count, 72);

    let raw = api::get_config(State(state.clone()), Path("dual-slab".to_string()))
        .await
        .unwrap()
        .0;
    assert_eq!(raw["partitions"][1]["nodes"], 6);

    let missing = api::get_config(State(state.clone()), Path("../secret".to_string())).await;
    assert_eq!(missing.unwrap_err().0, StatusCode::NOT_FOUND);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_run_to_profiles() {
    let (state, dir) = state_with_configs(&[("dual-slab.json", DUAL_SLAB)]);

    let created = api::create_simulation(State(state.clone()), request("dual-slab"))
        .await
        .unwrap()
        .0;
    assert_eq!(created.partition_count, 2);
    assert!(created.ws_url.ends_with(&created.simulation_id));

    let id = created.simulation_id;
    assert_eq!(wait_until_done(&state, &id).await, "finished");

    let profiles = api::get_profiles(State(state.clone()), Path(id.clone()))
        .await
        .unwrap()
        .0;
    assert_eq!(profiles.partitions.len(), 2);
    let first = &profiles.partitions[0];
    assert_eq!(first.profile.temperatures.len(), 6);
    assert!(first.profile.fit.unwrap().slope < 0.0);
    assert!(first.profile.interface_estimate.is_some());
    assert!(profiles.partitions[1].profile.interface_estimate.is_none());

    let status = api::delete_simulation(State(state.clone()), Path(id.clone()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let gone = api::get_simulation(State(state.clone()), Path(id)).await;
    assert_eq!(gone.unwrap_err().0, StatusCode::NOT_FOUND);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_invalid_override_is_rejected() {
    let (state, dir) = state_with_configs(&[("dual-slab.json", DUAL_SLAB)]);

    let mut req = request("dual-slab");
    req.duration = Some(-1.0);
    let err = api::create_simulation(State(state.clone()), req).await.unwrap_err();
    assert_eq!(err.0, StatusCode::BAD_REQUEST);

    let err = api::create_simulation(State(state.clone()), request("absent"))
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::NOT_FOUND);
    assert!(state.simulations().is_empty());

    std::fs::remove_dir_all(dir).ok();
}

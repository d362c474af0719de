//! WebSocket endpoint for streaming partition fields

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use orchestrator::{Frame, RunConfig, RunnerState};
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Binary Protocol Tags
// ---------------------------------------------------------------------------

/// Run layout, sent once on connect
pub const TAG_SIM_INFO: u8 = 0x01;
/// Field of one partition
pub const TAG_FRAME: u8 = 0x02;
/// Runner state change
pub const TAG_SIM_STATUS: u8 = 0x04;

/// Poll interval for new frames (~30 FPS)
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

// ---------------------------------------------------------------------------
// WebSocket Handler
// ---------------------------------------------------------------------------

/// WebSocket upgrade handler for /ws/simulation/{id}
pub async fn ws_simulation_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let exists = state.simulations().contains_key(&id);
    if !exists {
        return (axum::http::StatusCode::NOT_FOUND, "Simulation not found").into_response();
    }

    ws.on_upgrade(move |socket| handle_websocket(socket, state, id))
}

/// What one poll of the runner produced
struct Poll {
    frames: Vec<Frame>,
    state: RunnerState,
    error: Option<String>,
}

fn poll_runner(state: &AppState, sim_id: &str, last_sent: &mut [Option<u64>]) -> Option<Poll> {
    let sims = state.simulations();
    let runner = sims.get(sim_id)?;

    let mut frames = Vec::new();
    for (slot, latest) in last_sent.iter_mut().zip(runner.latest_frames()) {
        if let Some(frame) = latest {
            if *slot != Some(frame.step) {
                *slot = Some(frame.step);
                frames.push(frame);
            }
        }
    }
    Some(Poll {
        frames,
        state: runner.state(),
        error: runner.error_message(),
    })
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, sim_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let sim_info = {
        let sims = state.simulations();
        match sims.get(&sim_id) {
            Some(runner) => encode_sim_info(runner.config()),
            None => {
                tracing::error!("Simulation {} not found", sim_id);
                return;
            }
        }
    };

    if let Err(e) = sender.send(Message::Binary(sim_info)).await {
        tracing::error!("Failed to send SimInfo: {}", e);
        return;
    }

    let partitions = {
        let sims = state.simulations();
        sims.get(&sim_id).map_or(0, |r| r.config().partitions.len())
    };
    let mut last_sent: Vec<Option<u64>> = vec![None; partitions];
    let mut last_state: Option<RunnerState> = None;
    let mut frame_timer = interval(FRAME_INTERVAL);

    loop {
        tokio::select! {
            _ = frame_timer.tick() => {
                let Some(poll) = poll_runner(&state, &sim_id, &mut last_sent) else {
                    tracing::info!("Simulation {} was removed; closing stream", sim_id);
                    break;
                };

                let mut failed = false;
                for frame in &poll.frames {
                    if let Err(e) = sender.send(Message::Binary(encode_frame(frame))).await {
                        tracing::error!("Failed to send frame: {}", e);
                        failed = true;
                        break;
                    }
                }
                if failed {
                    break;
                }

                if last_state != Some(poll.state) {
                    last_state = Some(poll.state);
                    let message = poll.error.unwrap_or_else(|| {
                        format!("Simulation {}", crate::api::status_name(poll.state))
                    });
                    if let Err(e) = sender
                        .send(Message::Binary(encode_sim_status(poll.state, &message)))
                        .await
                    {
                        tracing::error!("Failed to send status: {}", e);
                        break;
                    }
                }

                // The runner publishes its final frames before it leaves Running.
                if matches!(poll.state, RunnerState::Finished | RunnerState::Error) {
                    tracing::debug!("Stream for simulation {} complete", sim_id);
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("WebSocket closed for simulation {}", sim_id);
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("Ignoring {}-byte client message for simulation {}", data.len(), sim_id);
                    }
                    _ => {}
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Binary Protocol Builders
// ---------------------------------------------------------------------------

/// Build SimInfo message (tag 0x01)
/// Format: tag(u8) + partition_count(u32) + duration(f64) + animate(u8) +
///         per partition: nodes(u32) + width(f32) + height(f32)
pub fn encode_sim_info(config: &RunConfig) -> Vec<u8> {
    let mut buf = Vec::with_capacity(14 + config.partitions.len() * 12);

    buf.push(TAG_SIM_INFO);
    buf.extend_from_slice(&(config.partitions.len() as u32).to_le_bytes());
    buf.extend_from_slice(&config.duration.to_le_bytes());
    buf.push(u8::from(config.animate));

    for p in &config.partitions {
        buf.extend_from_slice(&(p.nodes as u32).to_le_bytes());
        buf.extend_from_slice(&(p.width as f32).to_le_bytes());
        buf.extend_from_slice(&(p.height as f32).to_le_bytes());
    }

    buf
}

/// Build Frame message (tag 0x02)
/// Format: tag(u8) + partition(u32) + step(u64) + sim_time(f64) + nodes(u32) +
///         nodes*nodes temperatures (f32), row x = 0 first
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let cells = frame.field.as_slice();
    let mut buf = Vec::with_capacity(25 + cells.len() * 4);

    buf.push(TAG_FRAME);
    buf.extend_from_slice(&(frame.descriptor.index as u32).to_le_bytes());
    buf.extend_from_slice(&frame.step.to_le_bytes());
    buf.extend_from_slice(&frame.time.to_le_bytes());
    buf.extend_from_slice(&(frame.field.nodes() as u32).to_le_bytes());

    for &t in cells {
        buf.extend_from_slice(&(t as f32).to_le_bytes());
    }

    buf
}

/// Build SimStatus message (tag 0x04)
/// Format: tag(u8) + status(u8) + message_length(u16) + message(utf8)
pub fn encode_sim_status(state: RunnerState, message: &str) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.push(TAG_SIM_STATUS);

    // 0=Running, 2=Finished, 3=Error
    let status_byte = match state {
        RunnerState::Created | RunnerState::Running => 0u8,
        RunnerState::Finished => 2u8,
        RunnerState::Error => 3u8,
    };
    buf.push(status_byte);

    let msg_bytes = message.as_bytes();
    let len = msg_bytes.len().min(u16::MAX as usize);
    buf.extend_from_slice(&(len as u16).to_le_bytes());
    buf.extend_from_slice(&msg_bytes[..len]);

    buf
}

//! Binary stream format checks
//!
//! Decodes the messages the WebSocket sends and checks every field lands at
//! the offset the visualizer reads it from.

use kernel::Grid;
use orchestrator::config::{GlobalBoundaries, InitialCondition, PartitionConfig};
use orchestrator::{Frame, PartitionDescriptor, RunConfig, RunnerState};
use server::ws::{encode_frame, encode_sim_info, encode_sim_status, TAG_FRAME, TAG_SIM_INFO, TAG_SIM_STATUS};

fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

fn f32_at(buf: &[u8], at: usize) -> f32 {
    f32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

fn f64_at(buf: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(buf[at..at + 8].try_into().unwrap())
}

#[test]
fn test_frame_layout() {
    let mut field = Grid::new(3);
    for x in 0..3 {
        for y in 0..3 {
            field.set(x, y, (x * 10 + y) as f64);
        }
    }
    let frame = Frame {
        descriptor: PartitionDescriptor::new(1, 2).unwrap(),
        time: 0.125,
        step: 42,
        field,
    };

    let buf = encode_frame(&frame);
    assert_eq!(buf.len(), 25 + 9 * 4);
    assert_eq!(buf[0], TAG_FRAME);
    assert_eq!(u32_at(&buf, 1), 1);
    assert_eq!(u64::from_le_bytes(buf[5..13].try_into().unwrap()), 42);
    assert_eq!(f64_at(&buf, 13), 0.125);
    assert_eq!(u32_at(&buf, 21), 3);

    // Row x = 1 starts after the three cells of row x = 0.
    assert_eq!(f32_at(&buf, 25), 0.0);
    assert_eq!(f32_at(&buf, 25 + 3 * 4), 10.0);
    assert_eq!(f32_at(&buf, 25 + 5 * 4), 12.0);
    assert_eq!(f32_at(&buf, 25 + 8 * 4), 22.0);
}

#[test]
fn test_sim_info_layout() {
    let partition = |nodes: usize, width: f64| PartitionConfig {
        height: 1.0,
        width,
        nodes,
        alpha: 1.27e-4,
        conductivity: None,
        initial: InitialCondition::default(),
    };
    let config = RunConfig {
        name: "layout".to_string(),
        duration: 30.0,
        animate: true,
        coupling_timeout_ms: 1_000,
        boundary_conditions: GlobalBoundaries::default(),
        partitions: vec![partition(10, 0.05), partition(20, 0.1)],
    };

    let buf = encode_sim_info(&config);
    assert_eq!(buf.len(), 14 + 2 * 12);
    assert_eq!(buf[0], TAG_SIM_INFO);
    assert_eq!(u32_at(&buf, 1), 2);
    assert_eq!(f64_at(&buf, 5), 30.0);
    assert_eq!(buf[13], 1);
    assert_eq!(u32_at(&buf, 14), 10);
    assert_eq!(f32_at(&buf, 18), 0.05);
    assert_eq!(u32_at(&buf, 26), 20);
    assert_eq!(f32_at(&buf, 30), 0.1);
    assert_eq!(f32_at(&buf, 34), 1.0);
}

#[test]
fn test_sim_status_layout() {
    let buf = encode_sim_status(RunnerState::Error, "alpha must be positive");
    assert_eq!(buf[0], TAG_SIM_STATUS);
    assert_eq!(buf[1], 3);
    let len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
    assert_eq!(std::str::from_utf8(&buf[4..4 + len]).unwrap(), "alpha must be positive");

    assert_eq!(encode_sim_status(RunnerState::Running, "")[1], 0);
    assert_eq!(encode_sim_status(RunnerState::Finished, "done")[1], 2);
}

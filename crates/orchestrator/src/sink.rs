//! Destinations for field snapshots produced by the driver.
//!
//! The driver hands its field to a [`RenderSink`] after every step when animating
//! and once at the end of the run. Sinks copy what they need and return at once.

use std::sync::{Arc, Mutex, PoisonError};

use kernel::Grid;

use crate::negotiation::PartitionDescriptor;

/// Snapshot of one partition's field
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Partition that produced the field
    pub descriptor: PartitionDescriptor,
    /// Simulated time of the snapshot (seconds)
    pub time: f64,
    /// Completed steps at the snapshot
    pub step: u64,
    /// Copy of the temperature field
    pub field: Grid,
}

/// Receiver of field snapshots.
pub trait RenderSink: Send {
    /// Accept the field of `descriptor` at `time` after `step` steps. Must not block.
    fn present(&mut self, descriptor: &PartitionDescriptor, time: f64, step: u64, field: &Grid);
}

/// Sink that discards every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn present(&mut self, _: &PartitionDescriptor, _: f64, _: u64, _: &Grid) {}
}

/// Sink that keeps every frame; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameRecorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all frames recorded so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of frames recorded so far.
    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RenderSink for FrameRecorder {
    fn present(&mut self, descriptor: &PartitionDescriptor, time: f64, step: u64, field: &Grid) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Frame {
                descriptor: *descriptor,
                time,
                step,
                field: field.clone(),
            });
    }
}

/// Latest-frame-wins slot for a live viewer; clones share the slot.
///
/// Older frames are overwritten, so a slow reader never holds back the solver.
#[derive(Debug, Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<Frame>>>,
}

impl LatestFrame {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the most recent frame, if any.
    pub fn latest(&self) -> Option<Frame> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Step number of the most recent frame, if any.
    pub fn latest_step(&self) -> Option<u64> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|f| f.step)
    }
}

impl RenderSink for LatestFrame {
    fn present(&mut self, descriptor: &PartitionDescriptor, time: f64, step: u64, field: &Grid) {
        let frame = Frame {
            descriptor: *descriptor,
            time,
            step,
            field: field.clone(),
        };
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }
}

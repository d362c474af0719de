//! One-time agreement on run-wide parameters.
//!
//! Every partition calls [`negotiate`] before its first step. Afterwards all
//! partitions advance with the same `dt`, share a coupling lattice sized by the
//! largest node count, and know the blend coefficient for each coupled edge.

use kernel::{BlendCoefficients, GridParameters};
use serde::Serialize;
use tracing::info;

use crate::channel::{CouplingChannel, CouplingLattice, Quantity, Side, SETUP_TIMESTAMP};
use crate::error::{RunError, RunResult};
use crate::runtime::PartitionRuntime;

/// Position of a partition in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionDescriptor {
    /// Index of this partition, `0..count`
    pub index: usize,
    /// Number of partitions
    pub count: usize,
}

impl PartitionDescriptor {
    /// Validated descriptor; fails with `NegotiationMismatch` unless `index < count`.
    pub fn new(index: usize, count: usize) -> RunResult<Self> {
        if count == 0 {
            return Err(RunError::mismatch("partition count must be at least 1"));
        }
        if index >= count {
            return Err(RunError::mismatch(format!(
                "partition index {index} out of range for {count} partitions"
            )));
        }
        Ok(Self { index, count })
    }

    /// Descriptor of a run with a single partition.
    pub fn solo() -> Self {
        Self { index: 0, count: 1 }
    }

    /// `true` unless this is the first partition.
    pub fn has_left(&self) -> bool {
        self.index > 0
    }

    /// `true` unless this is the last partition.
    pub fn has_right(&self) -> bool {
        self.index + 1 < self.count
    }
}

/// Outcome of negotiation, consumed by the time-integration driver.
pub struct Negotiated {
    /// Where this partition sits
    pub descriptor: PartitionDescriptor,
    /// Local geometry with the run-wide `dt`
    pub params: GridParameters,
    /// Largest node count of any partition
    pub max_nodes: usize,
    /// Blend coefficients for the left and right interfaces
    pub blend: BlendCoefficients,
    /// Channel to the left neighbour, if any
    pub left: Option<Box<dyn CouplingChannel>>,
    /// Channel to the right neighbour, if any
    pub right: Option<Box<dyn CouplingChannel>>,
}

impl Negotiated {
    /// Result for a partition that runs alone: local `dt`, no channels, unit blend.
    pub fn standalone(params: GridParameters) -> Self {
        Self {
            descriptor: PartitionDescriptor::solo(),
            max_nodes: params.nodes,
            params,
            blend: BlendCoefficients::UNIT,
            left: None,
            right: None,
        }
    }
}

impl std::fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiated")
            .field("descriptor", &self.descriptor)
            .field("params", &self.params)
            .field("max_nodes", &self.max_nodes)
            .field("blend", &self.blend)
            .field("left", &self.left.is_some())
            .field("right", &self.right.is_some())
            .finish()
    }
}

/// Agree on `dt`, node lattice and blend coefficients with the other partitions.
///
/// `params` are this partition's locally derived parameters. Collective failures
/// and unusable neighbour diffusivities surface as `NegotiationMismatch`.
pub fn negotiate(runtime: &mut dyn PartitionRuntime, params: GridParameters) -> RunResult<Negotiated> {
    let descriptor = PartitionDescriptor::new(runtime.index(), runtime.count())?;
    if descriptor.count == 1 {
        info!("Single partition: dt={:.6e}s, nodes={}", params.dt, params.nodes);
        return Ok(Negotiated::standalone(params));
    }

    let mut left = if descriptor.has_left() {
        Some(runtime.connect(Side::Left)?)
    } else {
        None
    };
    let mut right = if descriptor.has_right() {
        Some(runtime.connect(Side::Right)?)
    } else {
        None
    };

    let dt = runtime.all_reduce_min(params.dt)?;
    let max_nodes = runtime.all_reduce_max(params.nodes)?;
    let lattice = CouplingLattice::new(max_nodes)?;
    for channel in left.iter_mut().chain(right.iter_mut()) {
        channel.configure(lattice, params.nodes);
    }

    // Publish on both edges before reading either.
    for channel in left.iter_mut().chain(right.iter_mut()) {
        channel.push(Quantity::Diffusivity, &[params.alpha], SETUP_TIMESTAMP)?;
    }
    let left_alpha = match left.as_mut() {
        Some(channel) => exchange_diffusivity(channel.as_mut())?,
        None => params.alpha,
    };
    let right_alpha = match right.as_mut() {
        Some(channel) => exchange_diffusivity(channel.as_mut())?,
        None => params.alpha,
    };

    let blend = BlendCoefficients::from_diffusivities(params.alpha, left_alpha, right_alpha);
    let params = params.with_timestep(dt);

    info!(
        "Partition {}/{} negotiated: dt={:.6e}s, max_nodes={}, blend=({:.4}, {:.4})",
        descriptor.index,
        descriptor.count,
        dt,
        max_nodes,
        blend.toward_left,
        blend.toward_right
    );

    Ok(Negotiated {
        descriptor,
        params,
        max_nodes,
        blend,
        left,
        right,
    })
}

fn exchange_diffusivity(channel: &mut dyn CouplingChannel) -> RunResult<f64> {
    let side = channel.side();
    let values = channel
        .fetch(Quantity::Diffusivity, SETUP_TIMESTAMP)
        .map_err(|e| RunError::mismatch(format!("{side} neighbour unreachable: {e}")))?;
    match values.as_slice() {
        [alpha] if alpha.is_finite() && *alpha > 0.0 => Ok(*alpha),
        other => Err(RunError::mismatch(format!(
            "{side} neighbour sent an unusable diffusivity {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LocalRuntime;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_descriptor_bounds() {
        assert!(PartitionDescriptor::new(0, 1).is_ok());
        assert!(PartitionDescriptor::new(1, 1).is_err());
        assert!(PartitionDescriptor::new(0, 0).is_err());
        let mid = PartitionDescriptor::new(1, 3).unwrap();
        assert!(mid.has_left() && mid.has_right());
        let solo = PartitionDescriptor::solo();
        assert!(!solo.has_left() && !solo.has_right());
    }

    #[test]
    fn test_single_partition_keeps_local_dt() {
        let params = GridParameters::new(1.0, 0.05, 4, 1.27e-4).unwrap();
        let mut group = LocalRuntime::group(1, Duration::from_secs(1));
        let negotiated = negotiate(&mut group[0], params).unwrap();
        assert_eq!(negotiated.params.dt, params.dt);
        assert_eq!(negotiated.blend, BlendCoefficients::UNIT);
        assert!(negotiated.left.is_none() && negotiated.right.is_none());
    }

    #[test]
    fn test_two_partitions_agree() {
        let fine = GridParameters::new(1.0, 0.05, 8, 1.0e-4).unwrap();
        let coarse = GridParameters::new(1.0, 0.05, 4, 3.0e-4).unwrap();
        let expected_dt = fine.dt.min(coarse.dt);

        let group = LocalRuntime::group(2, Duration::from_secs(10));
        let handles: Vec<_> = group
            .into_iter()
            .zip([fine, coarse])
            .map(|(mut rt, p)| {
                thread::spawn(move || {
                    let n = negotiate(&mut rt, p).unwrap();
                    (n.descriptor, n.params.dt, n.max_nodes, n.blend)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for (_, dt, max_nodes, _) in &results {
            assert_eq!(*dt, expected_dt);
            assert_eq!(*max_nodes, 8);
        }
        let (d0, _, _, b0) = results[0];
        let (d1, _, _, b1) = results[1];
        assert_eq!(d0.index, 0);
        assert_eq!(d1.index, 1);
        // (3e-4 + 1e-4) / (2 * 1e-4) = 2
        assert!((b0.toward_right - 2.0).abs() < 1e-12);
        assert_eq!(b0.toward_left, 1.0);
        // (1e-4 + 3e-4) / (2 * 3e-4) = 2/3
        assert!((b1.toward_left - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b1.toward_right, 1.0);
    }

    #[test]
    fn test_missing_neighbour_is_mismatch() {
        let params = GridParameters::new(1.0, 0.05, 4, 1.0e-4).unwrap();
        let mut group = LocalRuntime::group(2, Duration::from_millis(50));
        let absent = group.pop();
        drop(absent);
        let err = negotiate(&mut group[0], params).unwrap_err();
        assert!(matches!(err, RunError::NegotiationMismatch(_)), "{err:?}");
    }
}

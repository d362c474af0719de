//! Point-to-point boundary exchange between two adjacent partitions.
//!
//! Each coupled edge owns one endpoint of a channel. An endpoint publishes
//! samples of its own boundary into an outbox that the peer reads as its inbox.
//! Samples carry a [`Quantity`] tag and a timestamp; fetches match timestamps
//! exactly and resample the peer's values onto this partition's coupling
//! lattice points by nearest neighbour.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{RunError, RunResult};

/// Timestamp at which setup quantities (diffusivity) are exchanged.
pub const SETUP_TIMESTAMP: f64 = 0.0;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Which x-edge of a partition a channel serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Edge at `x = 0`
    Left,
    /// Edge at `x = nodes - 1`
    Right,
}

impl Side {
    /// The edge facing this one across an interface.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Physical quantity carried by a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    /// Boundary row temperatures, one value per node
    Temperature,
    /// Thermal diffusivity of the sender, a single value
    Diffusivity,
}

impl Quantity {
    /// Scalar quantities are returned as sent, without spatial resampling.
    pub fn is_scalar(self) -> bool {
        matches!(self, Quantity::Diffusivity)
    }
}

// ---------------------------------------------------------------------------
// Samples and lattice
// ---------------------------------------------------------------------------

/// Values published by one partition at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySample {
    /// What the values are
    pub quantity: Quantity,
    /// Coupling-lattice positions of the values
    pub points: Vec<f64>,
    /// The values themselves
    pub values: Vec<f64>,
    /// Simulated time of the sample (seconds)
    pub timestamp: f64,
}

/// Common 1-D lattice on which partitions with different node counts meet.
///
/// A partition with `nodes` values places value `i` at `i * max_nodes / nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouplingLattice {
    max_nodes: usize,
}

impl CouplingLattice {
    /// Lattice sized by the largest node count of the run.
    pub fn new(max_nodes: usize) -> RunResult<Self> {
        if max_nodes == 0 {
            return Err(RunError::invalid("coupling lattice needs at least one node"));
        }
        Ok(Self { max_nodes })
    }

    /// Global maximum node count the lattice was built from.
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Lattice positions of a partition with `nodes` values.
    pub fn points(&self, nodes: usize) -> Vec<f64> {
        let stride = self.max_nodes as f64 / nodes as f64;
        (0..nodes).map(|i| i as f64 * stride).collect()
    }

    /// Value of the sample point nearest to `at`; equidistant points resolve to the lower one.
    pub fn nearest(points: &[f64], values: &[f64], at: f64) -> Option<f64> {
        let mut best: Option<(f64, f64, f64)> = None;
        for (&p, &v) in points.iter().zip(values) {
            let d = (p - at).abs();
            best = match best {
                None => Some((d, p, v)),
                Some((bd, bp, _)) if d < bd || (d == bd && p < bp) => Some((d, p, v)),
                keep => keep,
            };
        }
        best.map(|(_, _, v)| v)
    }

    /// Resample `sample` onto the points of a partition with `nodes` values.
    pub fn resample(&self, sample: &BoundarySample, nodes: usize) -> Vec<f64> {
        self.points(nodes)
            .into_iter()
            .map(|at| Self::nearest(&sample.points, &sample.values, at).unwrap_or(f64::NAN))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CouplingChannel trait
// ---------------------------------------------------------------------------

/// One endpoint of the link between two adjacent partitions.
pub trait CouplingChannel: Send {
    /// Edge of the owning partition this endpoint serves.
    fn side(&self) -> Side;

    /// Fix the lattice and the owner's node count used to place and resample rows.
    fn configure(&mut self, lattice: CouplingLattice, nodes: usize);

    /// Publish `values` of `quantity` at `timestamp`.
    fn push(&mut self, quantity: Quantity, values: &[f64], timestamp: f64) -> RunResult<()>;

    /// Neighbour's values of `quantity` at exactly `timestamp`, resampled for this partition.
    fn fetch(&mut self, quantity: Quantity, timestamp: f64) -> RunResult<Vec<f64>>;

    /// Drop received samples strictly older than `before`.
    fn forget(&mut self, before: f64);

    /// `(quantity, timestamp)` of every received sample still held.
    fn retained(&self) -> Vec<(Quantity, f64)>;
}

// ---------------------------------------------------------------------------
// LocalChannel -- in-process mailbox pair
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MailboxInner {
    samples: Vec<BoundarySample>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Mailbox {
    inner: Mutex<MailboxInner>,
    condvar: Condvar,
}

impl Mailbox {
    fn lock(&self) -> MutexGuard<'_, MailboxInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Channel endpoint backed by shared in-process mailboxes.
///
/// `fetch` blocks until the peer publishes the requested timestamp or the
/// timeout elapses. A zero timeout never blocks.
#[derive(Debug)]
pub struct LocalChannel {
    side: Side,
    outbox: Arc<Mailbox>,
    inbox: Arc<Mailbox>,
    timeout: Duration,
    lattice: Option<CouplingLattice>,
    nodes: usize,
}

impl LocalChannel {
    /// Create both endpoints of one interface.
    ///
    /// The first endpoint serves the right edge of the left partition, the
    /// second the left edge of the right partition.
    pub fn pair(timeout: Duration) -> (LocalChannel, LocalChannel) {
        let a = Arc::new(Mailbox::default());
        let b = Arc::new(Mailbox::default());
        let left_partition = LocalChannel {
            side: Side::Right,
            outbox: Arc::clone(&a),
            inbox: Arc::clone(&b),
            timeout,
            lattice: None,
            nodes: 0,
        };
        let right_partition = LocalChannel {
            side: Side::Left,
            outbox: b,
            inbox: a,
            timeout,
            lattice: None,
            nodes: 0,
        };
        (left_partition, right_partition)
    }

    fn stale(&self, timestamp: f64) -> RunError {
        RunError::StaleCouplingData {
            side: self.side,
            timestamp,
        }
    }

    fn deliver(&self, quantity: Quantity, sample: &BoundarySample) -> RunResult<Vec<f64>> {
        if quantity.is_scalar() {
            return Ok(sample.values.clone());
        }
        let lattice = self.lattice.ok_or_else(|| {
            RunError::mismatch(format!("{} channel used before the lattice was configured", self.side))
        })?;
        Ok(lattice.resample(sample, self.nodes))
    }
}

impl CouplingChannel for LocalChannel {
    fn side(&self) -> Side {
        self.side
    }

    fn configure(&mut self, lattice: CouplingLattice, nodes: usize) {
        self.lattice = Some(lattice);
        self.nodes = nodes;
    }

    fn push(&mut self, quantity: Quantity, values: &[f64], timestamp: f64) -> RunResult<()> {
        let points = if quantity.is_scalar() {
            vec![0.0; values.len()]
        } else {
            let lattice = self.lattice.ok_or_else(|| {
                RunError::mismatch(format!(
                    "{} channel used before the lattice was configured",
                    self.side
                ))
            })?;
            lattice.points(values.len())
        };
        let sample = BoundarySample {
            quantity,
            points,
            values: values.to_vec(),
            timestamp,
        };

        let mut outbox = self.outbox.lock();
        match outbox
            .samples
            .iter_mut()
            .find(|s| s.quantity == quantity && s.timestamp == timestamp)
        {
            Some(existing) => *existing = sample,
            None => outbox.samples.push(sample),
        }
        drop(outbox);
        self.outbox.condvar.notify_all();
        Ok(())
    }

    fn fetch(&mut self, quantity: Quantity, timestamp: f64) -> RunResult<Vec<f64>> {
        let deadline = Instant::now() + self.timeout;
        let mut inbox = self.inbox.lock();
        loop {
            if let Some(sample) = inbox
                .samples
                .iter()
                .find(|s| s.quantity == quantity && s.timestamp == timestamp)
            {
                return self.deliver(quantity, sample);
            }
            // The peer has moved past this instant or left: the sample will never arrive.
            let overtaken = inbox
                .samples
                .iter()
                .any(|s| s.quantity == quantity && s.timestamp > timestamp);
            if overtaken || inbox.closed {
                return Err(self.stale(timestamp));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.stale(timestamp));
            }
            inbox = self
                .inbox
                .condvar
                .wait_timeout(inbox, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn forget(&mut self, before: f64) {
        self.inbox.lock().samples.retain(|s| s.timestamp >= before);
    }

    fn retained(&self) -> Vec<(Quantity, f64)> {
        self.inbox
            .lock()
            .samples
            .iter()
            .map(|s| (s.quantity, s.timestamp))
            .collect()
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.outbox.lock().closed = true;
        self.outbox.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn configured(timeout: Duration, nodes: usize) -> (LocalChannel, LocalChannel) {
        let (mut a, mut b) = LocalChannel::pair(timeout);
        let lattice = CouplingLattice::new(nodes).unwrap();
        a.configure(lattice, nodes);
        b.configure(lattice, nodes);
        (a, b)
    }

    #[test]
    fn test_pair_sides() {
        let (a, b) = LocalChannel::pair(Duration::ZERO);
        assert_eq!(a.side(), Side::Right);
        assert_eq!(b.side(), Side::Left);
        assert_eq!(a.side().opposite(), b.side());
    }

    #[test]
    fn test_push_then_fetch_exact() {
        let (mut a, mut b) = configured(Duration::ZERO, 3);
        a.push(Quantity::Temperature, &[1.0, 2.0, 3.0], 0.5).unwrap();
        assert_eq!(b.fetch(Quantity::Temperature, 0.5).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_timestamp_is_stale() {
        let (mut a, mut b) = configured(Duration::ZERO, 2);
        a.push(Quantity::Temperature, &[1.0, 2.0], 0.0).unwrap();
        let err = b.fetch(Quantity::Temperature, 0.25).unwrap_err();
        assert_eq!(
            err,
            RunError::StaleCouplingData {
                side: Side::Left,
                timestamp: 0.25
            }
        );
    }

    #[test]
    fn test_overtaken_fails_without_waiting() {
        let (mut a, mut b) = configured(Duration::from_secs(30), 2);
        a.push(Quantity::Temperature, &[1.0, 2.0], 2.0).unwrap();
        let start = Instant::now();
        assert!(b.fetch(Quantity::Temperature, 1.0).is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_dropped_peer_fails_fetch() {
        let (a, mut b) = configured(Duration::from_secs(30), 2);
        drop(a);
        assert!(matches!(
            b.fetch(Quantity::Temperature, 0.0),
            Err(RunError::StaleCouplingData { .. })
        ));
    }

    #[test]
    fn test_fetch_waits_for_push() {
        let (mut a, mut b) = configured(Duration::from_secs(10), 2);
        let handle = thread::spawn(move || b.fetch(Quantity::Temperature, 1.5));
        thread::sleep(Duration::from_millis(20));
        a.push(Quantity::Temperature, &[4.0, 5.0], 1.5).unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), vec![4.0, 5.0]);
    }

    #[test]
    fn test_quantities_do_not_collide() {
        let (mut a, mut b) = configured(Duration::ZERO, 2);
        a.push(Quantity::Diffusivity, &[1.1e-4], SETUP_TIMESTAMP).unwrap();
        a.push(Quantity::Temperature, &[7.0, 8.0], SETUP_TIMESTAMP).unwrap();
        assert_eq!(b.fetch(Quantity::Diffusivity, SETUP_TIMESTAMP).unwrap(), vec![1.1e-4]);
        assert_eq!(b.fetch(Quantity::Temperature, SETUP_TIMESTAMP).unwrap(), vec![7.0, 8.0]);
    }

    #[test]
    fn test_forget_drops_older_samples() {
        let (mut a, mut b) = configured(Duration::ZERO, 1);
        for step in 0..5 {
            a.push(Quantity::Temperature, &[step as f64], step as f64 * 0.1).unwrap();
        }
        b.forget(0.2);
        let kept = b.retained();
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|&(_, t)| t >= 0.2));
    }

    #[test]
    fn test_repush_replaces_sample() {
        let (mut a, mut b) = configured(Duration::ZERO, 1);
        a.push(Quantity::Temperature, &[1.0], 0.0).unwrap();
        a.push(Quantity::Temperature, &[2.0], 0.0).unwrap();
        assert_eq!(b.retained().len(), 1);
        assert_eq!(b.fetch(Quantity::Temperature, 0.0).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_lattice_points() {
        let lattice = CouplingLattice::new(4).unwrap();
        assert_eq!(lattice.points(4), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(lattice.points(2), vec![0.0, 2.0]);
        assert!(CouplingLattice::new(0).is_err());
    }

    #[test]
    fn test_nearest_ties_go_low() {
        let points = [0.0, 2.0];
        let values = [10.0, 20.0];
        assert_eq!(CouplingLattice::nearest(&points, &values, 1.0), Some(10.0));
        assert_eq!(CouplingLattice::nearest(&points, &values, 1.5), Some(20.0));
        assert_eq!(CouplingLattice::nearest(&[], &[], 1.0), None);
    }

    #[test]
    fn test_resample_between_node_counts() {
        let lattice = CouplingLattice::new(4).unwrap();
        // Coarse partition (2 nodes at 0, 2) read by a fine one (4 nodes at 0..3).
        let coarse = BoundarySample {
            quantity: Quantity::Temperature,
            points: lattice.points(2),
            values: vec![10.0, 20.0],
            timestamp: 0.0,
        };
        assert_eq!(lattice.resample(&coarse, 4), vec![10.0, 10.0, 20.0, 20.0]);

        // Fine partition read by the coarse one.
        let fine = BoundarySample {
            quantity: Quantity::Temperature,
            points: lattice.points(4),
            values: vec![1.0, 2.0, 3.0, 4.0],
            timestamp: 0.0,
        };
        assert_eq!(lattice.resample(&fine, 2), vec![1.0, 3.0]);
    }

    #[test]
    fn test_temperature_requires_lattice() {
        let (mut a, _b) = LocalChannel::pair(Duration::ZERO);
        assert!(matches!(
            a.push(Quantity::Temperature, &[1.0], 0.0),
            Err(RunError::NegotiationMismatch(_))
        ));
    }
}

//! Partition identity, collectives and neighbour channels.
//!
//! [`PartitionRuntime`] is what a partition knows about the rest of the run.
//! [`LocalRuntime`] implements it for partitions that run as threads of one
//! process: collectives meet in a shared all-gather, and each interface is a
//! [`LocalChannel`] pair created up front.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::channel::{CouplingChannel, LocalChannel, Side};
use crate::error::{RunError, RunResult};

/// Handle a partition uses to find its place in the run and talk to the others.
pub trait PartitionRuntime: Send {
    /// Index of this partition, `0..count`
    fn index(&self) -> usize;

    /// Number of partitions in the run
    fn count(&self) -> usize;

    /// Minimum of `value` over all partitions. Blocks until every partition contributed.
    fn all_reduce_min(&self, value: f64) -> RunResult<f64>;

    /// Maximum of `value` over all partitions. Blocks until every partition contributed.
    fn all_reduce_max(&self, value: usize) -> RunResult<usize>;

    /// Take the channel towards the neighbour on `side`.
    fn connect(&mut self, side: Side) -> RunResult<Box<dyn CouplingChannel>>;
}

// ---------------------------------------------------------------------------
// Collective
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct GatherInner {
    expected: usize,
    arrived: usize,
    generation: u64,
    buffer: Vec<f64>,
    result: Vec<f64>,
    abandoned: Option<String>,
}

/// All-gather rendezvous shared by the partitions of one group.
#[derive(Debug)]
struct Collective {
    inner: Mutex<GatherInner>,
    condvar: Condvar,
    timeout: Duration,
}

impl Collective {
    fn new(expected: usize, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(GatherInner {
                expected,
                arrived: 0,
                generation: 0,
                buffer: vec![f64::NAN; expected],
                result: Vec::new(),
                abandoned: None,
            }),
            condvar: Condvar::new(),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GatherInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Contribute `value` as `rank` and return every rank's contribution.
    fn all_gather(&self, rank: usize, value: f64) -> RunResult<Vec<f64>> {
        let mut state = self.lock();
        if let Some(reason) = &state.abandoned {
            return Err(RunError::mismatch(reason.clone()));
        }

        state.buffer[rank] = value;
        state.arrived += 1;
        let generation = state.generation;

        if state.arrived == state.expected {
            state.result = state.buffer.clone();
            state.arrived = 0;
            state.generation += 1;
            self.condvar.notify_all();
            return Ok(state.result.clone());
        }

        let deadline = Instant::now() + self.timeout;
        while state.generation == generation {
            if let Some(reason) = &state.abandoned {
                return Err(RunError::mismatch(reason.clone()));
            }
            let now = Instant::now();
            if now >= deadline {
                let reason = format!(
                    "collective timed out after {:?} with {} of {} partitions",
                    self.timeout, state.arrived, state.expected
                );
                state.abandoned = Some(reason.clone());
                self.condvar.notify_all();
                return Err(RunError::mismatch(reason));
            }
            state = self
                .condvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(state.result.clone())
    }

    fn abandon(&self, rank: usize) {
        let mut state = self.lock();
        if state.abandoned.is_none() {
            state.abandoned = Some(format!("partition {rank} left the group"));
        }
        drop(state);
        self.condvar.notify_all();
    }
}

// ---------------------------------------------------------------------------
// LocalRuntime
// ---------------------------------------------------------------------------

/// In-process runtime for one partition of a thread-per-partition run.
#[derive(Debug)]
pub struct LocalRuntime {
    index: usize,
    count: usize,
    collective: Arc<Collective>,
    left: Option<LocalChannel>,
    right: Option<LocalChannel>,
}

impl LocalRuntime {
    /// Runtimes for `count` partitions wired as a chain.
    ///
    /// `timeout` bounds both collectives and channel fetches.
    pub fn group(count: usize, timeout: Duration) -> Vec<LocalRuntime> {
        let collective = Arc::new(Collective::new(count, timeout));
        let mut runtimes: Vec<LocalRuntime> = (0..count)
            .map(|index| LocalRuntime {
                index,
                count,
                collective: Arc::clone(&collective),
                left: None,
                right: None,
            })
            .collect();

        for i in 1..count {
            let (right_of_prev, left_of_next) = LocalChannel::pair(timeout);
            runtimes[i - 1].right = Some(right_of_prev);
            runtimes[i].left = Some(left_of_next);
        }
        runtimes
    }
}

impl PartitionRuntime for LocalRuntime {
    fn index(&self) -> usize {
        self.index
    }

    fn count(&self) -> usize {
        self.count
    }

    fn all_reduce_min(&self, value: f64) -> RunResult<f64> {
        let all = self.collective.all_gather(self.index, value)?;
        Ok(all.into_iter().fold(f64::INFINITY, f64::min))
    }

    fn all_reduce_max(&self, value: usize) -> RunResult<usize> {
        let all = self.collective.all_gather(self.index, value as f64)?;
        Ok(all.into_iter().fold(0.0, f64::max) as usize)
    }

    fn connect(&mut self, side: Side) -> RunResult<Box<dyn CouplingChannel>> {
        let slot = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        slot.take()
            .map(|ch| Box::new(ch) as Box<dyn CouplingChannel>)
            .ok_or_else(|| {
                RunError::mismatch(format!(
                    "partition {} has no {side} neighbour to connect to",
                    self.index
                ))
            })
    }
}

impl Drop for LocalRuntime {
    fn drop(&mut self) {
        // Any collective still waiting on this partition can never complete.
        self.collective.abandon(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Quantity;
    use std::thread;

    #[test]
    fn test_group_wiring() {
        let mut group = LocalRuntime::group(3, Duration::from_secs(1));
        assert_eq!(group[1].index(), 1);
        assert_eq!(group[1].count(), 3);
        assert!(group[0].connect(Side::Left).is_err());
        assert!(group[2].connect(Side::Right).is_err());
        assert!(group[1].connect(Side::Left).is_ok());
        // A channel can only be taken once.
        assert!(group[1].connect(Side::Left).is_err());
    }

    #[test]
    fn test_single_partition_reductions() {
        let group = LocalRuntime::group(1, Duration::from_secs(1));
        assert_eq!(group[0].all_reduce_min(0.3).unwrap(), 0.3);
        assert_eq!(group[0].all_reduce_max(17).unwrap(), 17);
    }

    #[test]
    fn test_reductions_across_threads() {
        let group = LocalRuntime::group(4, Duration::from_secs(10));
        let handles: Vec<_> = group
            .into_iter()
            .map(|rt| {
                thread::spawn(move || {
                    let dt = rt.all_reduce_min(1.0 + rt.index() as f64).unwrap();
                    let nodes = rt.all_reduce_max(10 * (rt.index() + 1)).unwrap();
                    // Second round reuses the same rendezvous.
                    let again = rt.all_reduce_min(5.0 - rt.index() as f64).unwrap();
                    (dt, nodes, again)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), (1.0, 40, 2.0));
        }
    }

    #[test]
    fn test_departed_partition_aborts_collective() {
        let mut group = LocalRuntime::group(2, Duration::from_secs(30));
        let second = group.pop().unwrap();
        let first = group.pop().unwrap();
        let handle = thread::spawn(move || first.all_reduce_min(1.0));
        thread::sleep(Duration::from_millis(20));
        drop(second);
        assert!(matches!(handle.join().unwrap(), Err(RunError::NegotiationMismatch(_))));
    }

    #[test]
    fn test_collective_timeout() {
        let group = LocalRuntime::group(2, Duration::from_millis(20));
        let err = group[0].all_reduce_min(1.0).unwrap_err();
        assert!(matches!(err, RunError::NegotiationMismatch(_)));
        // The group stays unusable afterwards.
        assert!(group[1].all_reduce_min(1.0).is_err());
    }

    #[test]
    fn test_connected_channels_talk() {
        let mut group = LocalRuntime::group(2, Duration::ZERO);
        let mut right_of_first = group[0].connect(Side::Right).unwrap();
        let mut left_of_second = group[1].connect(Side::Left).unwrap();
        right_of_first.push(Quantity::Diffusivity, &[2.0], 0.0).unwrap();
        assert_eq!(left_of_second.fetch(Quantity::Diffusivity, 0.0).unwrap(), vec![2.0]);
    }
}

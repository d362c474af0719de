//! Errors raised while negotiating, coupling or driving partitions

use kernel::KernelError;
use thiserror::Error;

use crate::channel::Side;

/// Result alias for orchestration operations
pub type RunResult<T> = Result<T, RunError>;

/// Failure of a partition or of the whole coupled run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    /// Geometry, diffusivity, boundary kind or row shape is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No sample at exactly the requested time arrived on a coupled edge
    #[error("stale coupling data on the {side} edge at t = {timestamp}")]
    StaleCouplingData {
        /// Edge of the fetching partition
        side: Side,
        /// Requested sample time (seconds)
        timestamp: f64,
    },

    /// Partitions could not agree on run-wide parameters
    #[error("negotiation mismatch: {0}")]
    NegotiationMismatch(String),

    /// Configuration file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// A partition thread panicked
    #[error("partition {0} panicked")]
    PartitionPanicked(usize),
}

impl RunError {
    /// Shorthand for [`RunError::InvalidConfiguration`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        RunError::InvalidConfiguration(msg.into())
    }

    /// Shorthand for [`RunError::NegotiationMismatch`]
    pub fn mismatch(msg: impl Into<String>) -> Self {
        RunError::NegotiationMismatch(msg.into())
    }

    /// Rank used to pick the root cause among several partition failures.
    ///
    /// Lower is more fundamental: a bad configuration makes neighbours fail to
    /// negotiate, and a failed negotiation or panic leaves neighbours without data.
    pub fn root_cause_rank(&self) -> u8 {
        match self {
            RunError::Config(_) | RunError::InvalidConfiguration(_) => 0,
            RunError::PartitionPanicked(_) => 1,
            RunError::NegotiationMismatch(_) => 2,
            RunError::StaleCouplingData { .. } => 3,
        }
    }
}

impl From<KernelError> for RunError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::InvalidConfiguration(msg) => RunError::InvalidConfiguration(msg),
        }
    }
}

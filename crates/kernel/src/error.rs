//! Kernel error type

use thiserror::Error;

/// Result alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

/// Errors raised while constructing or advancing a partition's field
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Geometry, diffusivity, boundary kind or row shape is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl KernelError {
    /// Shorthand for [`KernelError::InvalidConfiguration`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        KernelError::InvalidConfiguration(msg.into())
    }
}

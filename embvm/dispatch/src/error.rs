use embvm_core::CapacityError;
use thiserror::Error;

/// Errors reported by the `try_` submission paths.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// A fixed-capacity queue could not take another item.
    #[error("{0}")]
    QueueFull(#[from] CapacityError),
    /// The executor has been shut down and no longer accepts work.
    #[error("executor has been shut down")]
    ShutDown,
}

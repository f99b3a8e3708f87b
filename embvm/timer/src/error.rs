use thiserror::Error;

/// Failures reported by a hardware timer backend.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwTimerError {
    #[error("invalid timer period")]
    InvalidPeriod,

    #[error("operation not supported by this timer")]
    NotSupported,

    #[error("timer backend has shut down")]
    ShutDown,

    #[error("hardware fault: {0}")]
    Fault(&'static str),
}

/// Errors reported by the timer manager and its handles.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer list is full (capacity {capacity})")]
    ListFull { capacity: usize },

    #[error("scheduled queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("handle no longer refers to an allocated timer")]
    InvalidHandle,

    #[error("periodic timer needs a non-zero period")]
    ZeroPeriod,

    #[error("hardware timer: {0}")]
    Hardware(#[from] HwTimerError),
}

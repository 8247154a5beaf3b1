//! # Task Errors
//!
//! Error types shared by the worker pool, the task manager and the tasks they run.
//!
//! Only [`TaskError::AlreadyStarted`], [`TaskError::PoolClosed`] and
//! [`TaskError::WorkerSpawn`] are ever returned to a caller. The remaining variants
//! exist so that dropped submissions and slow shutdowns are logged with one
//! consistent wording.

use std::{any::Any, io, time::Duration};

use thiserror::Error;

/// Failure produced by a task while it was running on a worker thread.
///
/// This is the error half of a [`TaskResult`](super::task::TaskResult) outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The task ran and reported a failure.
    #[error("generation failed: {0}")]
    Failed(String),
    /// The task observed the pool's cancellation flag and stopped early.
    #[error("generation cancelled")]
    Cancelled,
    /// The task panicked; the worker caught the panic and kept running.
    #[error("generation panicked: {0}")]
    Panicked(String),
}

impl GenerationError {
    /// Convenience constructor for [`GenerationError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        GenerationError::Failed(message.into())
    }

    /// Builds a [`GenerationError::Panicked`] from a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        GenerationError::Panicked(panic_message(payload.as_ref()))
    }
}

/// Error returned by a [`ResultApplier`](super::ResultApplier) that could not
/// commit an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to apply result: {0}")]
pub struct ApplyError(pub String);

impl ApplyError {
    /// Creates an `ApplyError` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        ApplyError(message.into())
    }
}

/// Errors raised by the worker pool and the task manager lifecycle.
#[derive(Debug, Error)]
pub enum TaskError {
    /// `start` was called on a pool whose workers are already running.
    #[error("worker pool already started")]
    AlreadyStarted,
    /// The pool has been shut down and accepts no more work.
    #[error("worker pool is closed")]
    PoolClosed,
    /// The operating system refused to spawn a worker thread.
    #[error("failed to spawn worker thread `{name}`: {source}")]
    WorkerSpawn {
        /// Name the thread would have carried.
        name: String,
        /// Underlying spawn failure.
        #[source]
        source: io::Error,
    },
    /// A task was submitted while the manager was inactive and got dropped.
    #[error("task submitted while the task manager is inactive; dropping it")]
    InactiveSubmission,
    /// Worker threads were still running when the shutdown deadline passed.
    #[error("{remaining} worker thread(s) did not terminate within {timeout:?}")]
    ShutdownTimeout {
        /// Number of workers that had not exited.
        remaining: usize,
        /// The deadline that was exceeded.
        timeout: Duration,
    },
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! # Task System Core Types
//!
//! This module defines the building blocks exchanged between the authoritative
//! thread and the worker pool.
//!
//! ## Core Components
//! - `Task`: a unit of work executed on a worker thread
//! - `TaskResult`: the envelope a worker publishes once a task finishes
//! - `WorkerScope`: what a running task may see of its worker (cancellation, executor)
//!
//! ## Task Lifecycle
//! 1. A `Task` is created on the authoritative thread and handed to `TaskManager::submit()`
//! 2. A worker thread calls `process()` exactly once
//! 3. The worker wraps the returned `Result` (or a caught panic) into a `TaskResult`
//! 4. The authoritative thread drains the `TaskResult` and applies or reports it
//!
//! ## Thread Safety
//! - `Task` must be `Send` to cross into a worker
//! - `Task::Key`, `Task::Context` and `Task::Artifact` must be `Send` to travel back
//! - Anything a task reads while running must be safe to read without the
//!   authoritative thread's cooperation

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use super::error::GenerationError;

/// A unit of work that can be executed on a background worker.
///
/// Tasks own everything they need. The pool treats them as opaque: it only asks
/// for the correlation key and context up front, then runs `process`.
pub trait Task: Send + 'static {
    /// Identifies the work for logging and correlation. Never used for lookups.
    type Key: fmt::Debug + Clone + Send + 'static;
    /// Back-reference handed to the result applier alongside the artifact.
    type Context: Send + 'static;
    /// What a successful run produces.
    type Artifact: Send + 'static;

    /// The key this task was created for.
    fn key(&self) -> Self::Key;

    /// The context the artifact belongs to.
    fn context(&self) -> Self::Context;

    /// Runs the task.
    ///
    /// Called on a worker thread, exactly once. Long-running implementations
    /// should poll `scope.cancellation()` between steps and return
    /// [`GenerationError::Cancelled`] once it is set. A panic is caught by the
    /// worker and reported as [`GenerationError::Panicked`].
    fn process(&self, scope: &WorkerScope<'_>) -> Result<Self::Artifact, GenerationError>;
}

/// Sequence number the pool assigns to every accepted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared cancellation flag for every task of one pool.
///
/// Cancellation is cooperative: setting the flag never interrupts a running task,
/// it only tells tasks and workers to stop at the next opportunity.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// Creates a flag that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of all outstanding work.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns `Err(GenerationError::Cancelled)` once cancellation was requested.
    ///
    /// Meant for `?` between the stages of a long-running task.
    pub fn checkpoint(&self) -> Result<(), GenerationError> {
        if self.is_cancelled() {
            Err(GenerationError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Callback-driven extension point some generators expect to be able to use.
pub trait Executor: Send + Sync {
    /// Schedules `job` for execution.
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// Executor handed to tasks by the worker pool.
///
/// The pool does not support nested submission, so jobs handed to it are
/// dropped without running.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl Executor for NoopExecutor {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        drop(job);
    }
}

/// What a task can see of the worker running it.
pub struct WorkerScope<'a> {
    worker_name: &'a str,
    cancellation: &'a Cancellation,
    executor: &'a dyn Executor,
}

impl<'a> WorkerScope<'a> {
    /// Creates a scope. Used by the pool; public so tasks can be unit-tested directly.
    pub fn new(
        worker_name: &'a str,
        cancellation: &'a Cancellation,
        executor: &'a dyn Executor,
    ) -> Self {
        Self {
            worker_name,
            cancellation,
            executor,
        }
    }

    /// Name of the worker thread (`<prefix>-N`).
    pub fn worker_name(&self) -> &str {
        self.worker_name
    }

    /// The pool-wide cancellation flag.
    pub fn cancellation(&self) -> &Cancellation {
        self.cancellation
    }

    /// Executor for auxiliary work.
    pub fn executor(&self) -> &dyn Executor {
        self.executor
    }
}

/// The immutable outcome of one task.
///
/// Created once by the worker that ran the task, consumed once by the drain loop.
/// The outcome is either the artifact or the error, never both.
pub struct TaskResult<T: Task> {
    id: TaskId,
    context: T::Context,
    key: T::Key,
    outcome: Result<T::Artifact, GenerationError>,
}

impl<T: Task> TaskResult<T> {
    /// Wraps a finished task's outcome.
    pub fn new(
        id: TaskId,
        context: T::Context,
        key: T::Key,
        outcome: Result<T::Artifact, GenerationError>,
    ) -> Self {
        Self {
            id,
            context,
            key,
            outcome,
        }
    }

    /// Id assigned at submission.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The key of the originating task.
    pub fn key(&self) -> &T::Key {
        &self.key
    }

    /// The context of the originating task.
    pub fn context(&self) -> &T::Context {
        &self.context
    }

    /// Whether the task produced an artifact.
    pub fn is_successful(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Borrow the outcome.
    pub fn outcome(&self) -> &Result<T::Artifact, GenerationError> {
        &self.outcome
    }

    /// Splits the envelope into its parts.
    pub fn into_parts(self) -> (TaskId, T::Context, T::Key, Result<T::Artifact, GenerationError>) {
        (self.id, self.context, self.key, self.outcome)
    }
}

impl<T: Task> fmt::Debug for TaskResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("id", &self.id)
            .field("key", &self.key)
            .field(
                "outcome",
                &self.outcome.as_ref().map(|_| "artifact").map_err(|e| e.to_string()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler(u32);

    impl Task for Doubler {
        type Key = u32;
        type Context = ();
        type Artifact = u32;

        fn key(&self) -> u32 {
            self.0
        }

        fn context(&self) {}

        fn process(&self, scope: &WorkerScope<'_>) -> Result<u32, GenerationError> {
            scope.cancellation().checkpoint()?;
            Ok(self.0 * 2)
        }
    }

    #[test]
    fn process_stops_at_a_cancelled_checkpoint() {
        let cancellation = Cancellation::new();
        let scope = WorkerScope::new("test-1", &cancellation, &NoopExecutor);
        assert_eq!(Doubler(4).process(&scope), Ok(8));

        cancellation.cancel();
        assert_eq!(Doubler(4).process(&scope), Err(GenerationError::Cancelled));
        assert_eq!(scope.worker_name(), "test-1");
    }

    #[test]
    fn noop_executor_never_runs_jobs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        NoopExecutor.execute(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn envelope_exposes_key_and_outcome() {
        let result: TaskResult<Doubler> =
            TaskResult::new(TaskId(7), (), 3, Err(GenerationError::failed("bad seed")));
        assert!(!result.is_successful());
        assert_eq!(*result.key(), 3);
        assert_eq!(result.id().to_string(), "#7");

        let (id, _, key, outcome) = result.into_parts();
        assert_eq!((id, key), (TaskId(7), 3));
        assert_eq!(outcome, Err(GenerationError::Failed("bad seed".into())));
    }
}

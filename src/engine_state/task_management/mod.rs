//! # Task Management System
//!
//! This module moves expensive work (chunk generation) off the authoritative
//! thread and brings the results back at a point where that thread can safely
//! apply them.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: The façade. Owns the worker pool and the activation state
//! - `WorkerPool`: Named background threads sharing a job queue and a completion queue
//! - `Task`: A unit of work executed on a worker thread
//! - `TaskResult`: The success/failure envelope a worker publishes for each task
//! - `ResultApplier`: The host's capability for committing artifacts
//! - `Diagnostics`: Injected logging sink
//!
//! ## Threading Model
//! - Exactly one authoritative thread calls `submit` and `drain_completed`
//! - Worker threads only ever run `Task::process` and push results
//! - The completion queue is the only structure written by workers and read by
//!   the authoritative thread; it is lock-free
//! - The lifecycle is an atomic state; transitions use compare-and-set so only
//!   the thread that flips it starts or stops the pool
//! - Worker threads are spawned and joined outside of any lock. The pool slot
//!   is only locked to publish, take, poll or feed the pool, and
//!   `drain_completed` only ever tries the lock
//!
//! ## Task Lifecycle
//! 1. The manager is activated via `TaskManager::activate()`, which starts a fresh pool
//! 2. Tasks are handed over with `TaskManager::submit()`
//! 3. Any idle worker runs the task and publishes a `TaskResult`
//! 4. Once per tick the authoritative thread calls `TaskManager::drain_completed()`,
//!    which applies every already-finished success and reports every failure
//! 5. `TaskManager::deactivate()` cancels outstanding work and discards undrained results
//!
//! ## Failure Policy
//! Nothing escapes `submit`, `drain_completed` or `deactivate`. Dropped
//! submissions, failed tasks, failed callbacks and slow shutdowns are logged
//! and skipped so the authoritative loop never stalls or dies because of
//! background work.
//!
//! ## Example Usage
//! ```rust,ignore
//! let manager = TaskManager::new(TaskManagerConfig::default(), Arc::new(LogDiagnostics::default()));
//! manager.activate()?;
//!
//! manager.submit(ChunkGenerationTask::new(world.clone(), position, generator.clone()));
//!
//! // In your main/game loop:
//! manager.drain_completed_with(
//!     |world, position, chunk| world.get_mut().commit_chunk(*position, chunk),
//!     |_, _| {},
//! );
//!
//! // On shutdown:
//! manager.deactivate();
//! ```

pub mod diagnostics;
pub mod error;
pub mod task;
pub mod worker_pool;

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU8, Ordering},
        Mutex, MutexGuard, PoisonError, TryLockError,
    },
};

use crate::config::TaskManagerConfig;
use diagnostics::SharedDiagnostics;
use error::{panic_message, ApplyError, GenerationError, TaskError};
use task::Task;
use worker_pool::{ShutdownReport, WorkerPool};

/// The host's capability for committing finished artifacts.
///
/// Called by [`TaskManager::drain_completed`] on the thread that drains, once per
/// successful result. A returned error or a panic is logged and draining moves on
/// to the next result.
pub trait ResultApplier<T: Task> {
    /// Commits one artifact.
    fn apply(
        &mut self,
        context: &T::Context,
        key: &T::Key,
        artifact: T::Artifact,
    ) -> Result<(), ApplyError>;

    /// Observes a failed task. The manager has already logged it.
    fn on_failure(&mut self, _key: &T::Key, _error: &GenerationError) {}
}

/// Adapts a pair of closures to [`ResultApplier`].
struct FnApplier<S, F> {
    on_success: S,
    on_failure: F,
}

impl<T, S, F> ResultApplier<T> for FnApplier<S, F>
where
    T: Task,
    S: FnMut(&T::Context, &T::Key, T::Artifact) -> Result<(), ApplyError>,
    F: FnMut(&T::Key, &GenerationError),
{
    fn apply(
        &mut self,
        context: &T::Context,
        key: &T::Key,
        artifact: T::Artifact,
    ) -> Result<(), ApplyError> {
        (self.on_success)(context, key, artifact)
    }

    fn on_failure(&mut self, key: &T::Key, error: &GenerationError) {
        (self.on_failure)(key, error)
    }
}

/// Counts of what one `drain_completed` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Successful results the applier accepted.
    pub applied: usize,
    /// Results carrying a generation failure.
    pub failed: usize,
    /// Successful results the applier rejected or panicked on.
    pub rejected: usize,
}

impl DrainSummary {
    /// Total number of results consumed.
    pub fn total(&self) -> usize {
        self.applied + self.failed + self.rejected
    }
}

/// Lifecycle of a [`TaskManager`], stored in an `AtomicU8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Lifecycle {
    Inactive = 0,
    /// Worker threads are being spawned.
    Starting = 1,
    Active = 2,
    /// The pool has been taken out and is shutting down.
    Stopping = 3,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Lifecycle::Starting,
            2 => Lifecycle::Active,
            3 => Lifecycle::Stopping,
            _ => Lifecycle::Inactive,
        }
    }
}

/// Owns a worker pool and mediates between it and the authoritative thread.
///
/// # Thread Safety
/// - Every method takes `&self`; the manager can be shared behind an `Arc`
/// - `activate`/`deactivate` are race-free and idempotent
/// - `drain_completed` must only be called from the authoritative thread
pub struct TaskManager<T: Task> {
    config: TaskManagerConfig,
    lifecycle: AtomicU8,
    pool: Mutex<Option<WorkerPool<T>>>,
    diagnostics: SharedDiagnostics,
}

impl<T: Task> TaskManager<T> {
    /// Creates an inactive manager. No threads exist until [`activate`](Self::activate).
    pub fn new(config: TaskManagerConfig, diagnostics: SharedDiagnostics) -> Self {
        Self {
            config,
            lifecycle: AtomicU8::new(Lifecycle::Inactive as u8),
            pool: Mutex::new(None),
            diagnostics,
        }
    }

    /// Switches the manager on and starts a fresh worker pool.
    ///
    /// The worker threads are spawned without holding any lock, so `submit` and
    /// `drain_completed` keep returning immediately while this runs; until the
    /// pool is published they behave as if the manager were inactive.
    ///
    /// # Returns
    /// - `Ok(true)` if this call activated the manager
    /// - `Ok(false)` if it was already active, starting or stopping (nothing happens)
    ///
    /// # Errors
    /// Propagates a pool start failure. The manager stays inactive in that case.
    pub fn activate(&self) -> Result<bool, TaskError> {
        if !self.transition(Lifecycle::Inactive, Lifecycle::Starting) {
            return Ok(false);
        }

        let mut pool = WorkerPool::new(
            self.config.resolved_worker_count(),
            self.config.thread_name_prefix.as_str(),
            self.diagnostics.clone(),
        );
        if let Err(error) = pool.start() {
            self.set_lifecycle(Lifecycle::Inactive);
            self.diagnostics
                .error(&format!("Task manager failed to activate: {}", error));
            return Err(error);
        }

        let worker_count = pool.worker_count();
        *self.lock_pool() = Some(pool);
        self.set_lifecycle(Lifecycle::Active);

        self.diagnostics.info(&format!(
            "Task manager activated with {} worker(s).",
            worker_count
        ));
        Ok(true)
    }

    /// Switches the manager off and shuts the pool down.
    ///
    /// Blocks for at most the configured shutdown timeout. Results that finished
    /// but were not drained are discarded.
    ///
    /// # Returns
    /// The shutdown report, or `None` if the manager was not active.
    pub fn deactivate(&self) -> Option<ShutdownReport> {
        if !self.transition(Lifecycle::Active, Lifecycle::Stopping) {
            return None;
        }

        let pool = self.lock_pool().take();
        self.set_lifecycle(Lifecycle::Inactive);

        self.diagnostics.info("Task manager deactivated.");
        let mut pool = pool?;
        Some(pool.shutdown(self.config.shutdown_timeout()))
    }

    /// Whether the manager is currently active.
    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// Hands a task to the pool. Never blocks.
    ///
    /// # Returns
    /// `true` if the task was queued. `false` if it was dropped because the
    /// manager is inactive; a warning is logged and nothing else happens.
    pub fn submit(&self, task: T) -> bool {
        if !self.is_active() {
            self.warn_dropped(&task.key(), &TaskError::InactiveSubmission);
            return false;
        }

        let slot = self.lock_pool();
        let Some(pool) = slot.as_ref() else {
            self.warn_dropped(&task.key(), &TaskError::InactiveSubmission);
            return false;
        };

        let key = task.key();
        match pool.submit(task) {
            Ok(_) => true,
            Err(error) => {
                self.warn_dropped(&key, &error);
                false
            }
        }
    }

    /// Applies every result that is already finished. Never waits for more.
    ///
    /// Successes go to `applier.apply`, failures are logged and passed to
    /// `applier.on_failure`. Returns immediately when the manager is inactive,
    /// and stops early if it gets deactivated mid-drain.
    ///
    /// Must be called from the authoritative thread.
    pub fn drain_completed<A>(&self, applier: &mut A) -> DrainSummary
    where
        A: ResultApplier<T> + ?Sized,
    {
        let mut summary = DrainSummary::default();

        while self.is_active() {
            let next = match self.pool.try_lock() {
                Ok(slot) => slot.as_ref().and_then(WorkerPool::poll_completed),
                Err(TryLockError::Poisoned(poisoned)) => {
                    poisoned.into_inner().as_ref().and_then(WorkerPool::poll_completed)
                }
                // The pool is being published or taken; nothing is ready this tick.
                Err(TryLockError::WouldBlock) => None,
            };
            let Some(result) = next else {
                break;
            };

            let (id, context, key, outcome) = result.into_parts();
            match outcome {
                Ok(artifact) => {
                    let applied = panic::catch_unwind(AssertUnwindSafe(|| {
                        applier.apply(&context, &key, artifact)
                    }));
                    match applied {
                        Ok(Ok(())) => summary.applied += 1,
                        Ok(Err(error)) => {
                            summary.rejected += 1;
                            self.diagnostics.error(&format!(
                                "Failed to apply result of task {} for {:?}: {}",
                                id, key, error
                            ));
                        }
                        Err(payload) => {
                            summary.rejected += 1;
                            self.diagnostics.error(&format!(
                                "Result callback panicked for task {} at {:?}: {}",
                                id,
                                key,
                                panic_message(payload.as_ref())
                            ));
                        }
                    }
                }
                Err(error) => {
                    summary.failed += 1;
                    self.diagnostics.error(&format!(
                        "Task {} for {:?} failed: {}",
                        id, key, error
                    ));
                    let observed = panic::catch_unwind(AssertUnwindSafe(|| {
                        applier.on_failure(&key, &error)
                    }));
                    if let Err(payload) = observed {
                        self.diagnostics.error(&format!(
                            "Failure callback panicked for task {} at {:?}: {}",
                            id,
                            key,
                            panic_message(payload.as_ref())
                        ));
                    }
                }
            }
        }

        summary
    }

    /// Closure form of [`drain_completed`](Self::drain_completed).
    pub fn drain_completed_with<S, F>(&self, on_success: S, on_failure: F) -> DrainSummary
    where
        S: FnMut(&T::Context, &T::Key, T::Artifact) -> Result<(), ApplyError>,
        F: FnMut(&T::Key, &GenerationError),
    {
        let mut applier = FnApplier {
            on_success,
            on_failure,
        };
        self.drain_completed(&mut applier)
    }

    /// Tasks accepted by the current pool and not yet published. Zero when inactive.
    pub fn in_flight(&self) -> usize {
        self.lock_pool()
            .as_ref()
            .map(WorkerPool::in_flight)
            .unwrap_or(0)
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &TaskManagerConfig {
        &self.config
    }

    fn warn_dropped(&self, key: &T::Key, reason: &TaskError) {
        self.diagnostics
            .warn(&format!("Dropped task for {:?}: {}", key, reason));
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    fn set_lifecycle(&self, state: Lifecycle) {
        self.lifecycle.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: Lifecycle, to: Lifecycle) -> bool {
        self.lifecycle
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn lock_pool(&self) -> MutexGuard<'_, Option<WorkerPool<T>>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;
    use super::diagnostics::{RecordingDiagnostics, Severity};
    use super::task::WorkerScope;

    struct Square(i64);

    impl Task for Square {
        type Key = i64;
        type Context = ();
        type Artifact = i64;

        fn key(&self) -> i64 {
            self.0
        }

        fn context(&self) {}

        fn process(&self, _scope: &WorkerScope<'_>) -> Result<i64, GenerationError> {
            if self.0 < 0 {
                return Err(GenerationError::failed("negative input"));
            }
            Ok(self.0 * self.0)
        }
    }

    fn manager(diagnostics: &RecordingDiagnostics) -> TaskManager<Square> {
        TaskManager::new(
            TaskManagerConfig::default().with_worker_count(2),
            Arc::new(diagnostics.clone()),
        )
    }

    fn drain_until(manager: &TaskManager<Square>, total: usize) -> (Vec<i64>, Vec<i64>) {
        let mut applied = Vec::new();
        let mut failed = Vec::new();
        for _ in 0..10_000 {
            manager.drain_completed_with(
                |_, _, artifact| {
                    applied.push(artifact);
                    Ok(())
                },
                |key, _| failed.push(*key),
            );
            if applied.len() + failed.len() >= total {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        (applied, failed)
    }

    #[test]
    fn inactive_manager_drops_submissions_with_a_warning() {
        let diagnostics = RecordingDiagnostics::new();
        let manager = manager(&diagnostics);

        assert!(!manager.submit(Square(3)));
        assert_eq!(diagnostics.count(Severity::Warn, "inactive"), 1);
        assert_eq!(manager.drain_completed_with(|_, _, _| Ok(()), |_, _| {}).total(), 0);
        assert!(manager.deactivate().is_none());
    }

    #[test]
    fn successes_and_failures_are_routed_separately() {
        let diagnostics = RecordingDiagnostics::new();
        let manager = manager(&diagnostics);
        assert!(manager.activate().unwrap());

        assert!(manager.submit(Square(3)));
        assert!(manager.submit(Square(-1)));

        let (applied, failed) = drain_until(&manager, 2);
        assert_eq!(applied, vec![9]);
        assert_eq!(failed, vec![-1]);
        assert_eq!(diagnostics.count(Severity::Error, "negative input"), 1);

        manager.deactivate();
    }

    #[test]
    fn rejected_results_do_not_stop_the_drain() {
        let diagnostics = RecordingDiagnostics::new();
        let manager = manager(&diagnostics);
        manager.activate().unwrap();

        for value in 1..=4 {
            manager.submit(Square(value));
        }
        while manager.in_flight() > 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let mut accepted = Vec::new();
        let summary = manager.drain_completed_with(
            |_, key, artifact| {
                if *key == 2 {
                    return Err(ApplyError::new("chunk already present"));
                }
                if *key == 3 {
                    panic!("apply blew up");
                }
                accepted.push(artifact);
                Ok(())
            },
            |_, _| {},
        );

        accepted.sort_unstable();
        assert_eq!(accepted, vec![1, 16]);
        assert_eq!(summary, DrainSummary { applied: 2, failed: 0, rejected: 2 });
        assert_eq!(diagnostics.count(Severity::Error, "chunk already present"), 1);
        assert_eq!(diagnostics.count(Severity::Error, "apply blew up"), 1);

        manager.deactivate();
    }

    #[test]
    fn manager_can_be_reactivated_with_a_fresh_pool() {
        let diagnostics = RecordingDiagnostics::new();
        let manager = manager(&diagnostics);

        manager.activate().unwrap();
        manager.deactivate().unwrap();
        assert!(!manager.submit(Square(2)));

        assert!(manager.activate().unwrap());
        assert!(manager.submit(Square(2)));
        let (applied, _) = drain_until(&manager, 1);
        assert_eq!(applied, vec![4]);
        manager.deactivate();
    }
}

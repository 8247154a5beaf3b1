//! # Worker Pool
//!
//! A fixed set of named background threads sharing one job queue and one
//! completion queue.
//!
//! ```text
//!  authoritative thread              worker threads
//!  --------------------              --------------
//!  submit() ──► [ job queue ] ──► recv ─► Task::process ─┐
//!                                                        │
//!  poll_completed() ◄── [ completion queue ] ◄── send ◄──┘
//! ```
//!
//! Both queues are unbounded `crossbeam_channel` channels. Any idle worker picks
//! the next job, so results arrive in completion order rather than submission
//! order. Neither `submit` nor `poll_completed` ever blocks.
//!
//! Worker threads are plain `std` threads. They do not keep the process alive
//! once `main` returns.

use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use super::{
    diagnostics::SharedDiagnostics,
    error::{GenerationError, TaskError},
    task::{Cancellation, NoopExecutor, Task, TaskId, TaskResult, WorkerScope},
};

/// Hands out deterministic thread names: `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug)]
pub struct ThreadNamer {
    prefix: String,
    next: AtomicUsize,
}

impl ThreadNamer {
    /// Creates a namer starting at `<prefix>-1`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicUsize::new(1),
        }
    }

    /// Returns the next name in sequence.
    pub fn next_name(&self) -> String {
        let number = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, number)
    }
}

/// What `shutdown` observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that exited before the deadline and were joined.
    pub joined: usize,
    /// Workers still running at the deadline. They are detached.
    pub timed_out: usize,
    /// Queued tasks that never started.
    pub dropped_tasks: usize,
    /// Finished results that were never drained.
    pub discarded_results: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Idle,
    Running,
    Closed,
}

struct Job<T> {
    id: TaskId,
    task: T,
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

/// Everything a worker thread owns.
struct WorkerContext<T: Task> {
    index: usize,
    name: String,
    jobs: Receiver<Job<T>>,
    results: Sender<TaskResult<T>>,
    exits: Sender<usize>,
    cancellation: Cancellation,
    in_flight: Arc<AtomicUsize>,
    diagnostics: SharedDiagnostics,
}

/// Reports the worker's exit to the pool, even if the worker loop unwinds.
struct ExitSignal {
    index: usize,
    exits: Sender<usize>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.exits.send(self.index);
    }
}

/// A fixed-size pool of worker threads executing [`Task`]s.
///
/// # Lifecycle
/// `new` (idle, tasks may already be queued) → `start` (threads spawned) →
/// `shutdown` (closed for good). A closed pool cannot be restarted; build a new one.
pub struct WorkerPool<T: Task> {
    worker_count: usize,
    namer: ThreadNamer,
    state: PoolState,
    job_sender: Option<Sender<Job<T>>>,
    job_receiver: Receiver<Job<T>>,
    result_sender: Option<Sender<TaskResult<T>>>,
    result_receiver: Receiver<TaskResult<T>>,
    exit_sender: Option<Sender<usize>>,
    exit_receiver: Receiver<usize>,
    workers: Vec<Worker>,
    cancellation: Cancellation,
    next_id: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    diagnostics: SharedDiagnostics,
}

impl<T: Task> WorkerPool<T> {
    /// Creates an idle pool that will run `worker_count` threads once started.
    ///
    /// A `worker_count` of zero is raised to one.
    pub fn new(
        worker_count: usize,
        thread_name_prefix: impl Into<String>,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        let (job_sender, job_receiver) = unbounded();
        let (result_sender, result_receiver) = unbounded();
        let (exit_sender, exit_receiver) = unbounded();

        Self {
            worker_count: worker_count.max(1),
            namer: ThreadNamer::new(thread_name_prefix),
            state: PoolState::Idle,
            job_sender: Some(job_sender),
            job_receiver,
            result_sender: Some(result_sender),
            result_receiver,
            exit_sender: Some(exit_sender),
            exit_receiver,
            workers: Vec::new(),
            cancellation: Cancellation::new(),
            next_id: AtomicU64::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            diagnostics,
        }
    }

    /// Spawns the worker threads.
    ///
    /// # Errors
    /// - [`TaskError::AlreadyStarted`] if the workers are already running
    /// - [`TaskError::PoolClosed`] if the pool has been shut down
    /// - [`TaskError::WorkerSpawn`] if a thread could not be created; the pool is
    ///   closed and any workers spawned so far are told to stop
    pub fn start(&mut self) -> Result<(), TaskError> {
        match self.state {
            PoolState::Running => return Err(TaskError::AlreadyStarted),
            PoolState::Closed => return Err(TaskError::PoolClosed),
            PoolState::Idle => {}
        }

        let (Some(result_sender), Some(exit_sender)) =
            (self.result_sender.take(), self.exit_sender.clone())
        else {
            return Err(TaskError::PoolClosed);
        };

        self.diagnostics.info(&format!(
            "Starting {} worker thread(s), available parallelism: {:?}",
            self.worker_count,
            thread::available_parallelism()
        ));

        for index in 0..self.worker_count {
            let name = self.namer.next_name();
            let context = WorkerContext {
                index,
                name: name.clone(),
                jobs: self.job_receiver.clone(),
                results: result_sender.clone(),
                exits: exit_sender.clone(),
                cancellation: self.cancellation.clone(),
                in_flight: self.in_flight.clone(),
                diagnostics: self.diagnostics.clone(),
            };

            match thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(context))
            {
                Ok(handle) => self.workers.push(Worker { name, handle }),
                Err(source) => {
                    self.abandon();
                    return Err(TaskError::WorkerSpawn { name, source });
                }
            }
        }

        self.state = PoolState::Running;
        Ok(())
    }

    /// Queues a task for any idle worker. Never blocks.
    ///
    /// Tasks submitted before `start` wait in the queue until workers exist.
    ///
    /// # Errors
    /// [`TaskError::PoolClosed`] after `shutdown`.
    pub fn submit(&self, task: T) -> Result<TaskId, TaskError> {
        if self.state == PoolState::Closed {
            return Err(TaskError::PoolClosed);
        }
        let sender = self.job_sender.as_ref().ok_or(TaskError::PoolClosed)?;

        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let key = task.key();
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        if sender.send(Job { id, task }).is_err() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            return Err(TaskError::PoolClosed);
        }

        self.diagnostics
            .debug(&format!("Submitted task {} for {:?}", id, key));
        Ok(id)
    }

    /// Returns the next finished result, if one is ready. Never blocks.
    ///
    /// Always `None` once the pool is closed.
    pub fn poll_completed(&self) -> Option<TaskResult<T>> {
        if self.state == PoolState::Closed {
            return None;
        }
        match self.result_receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.diagnostics
                    .debug("Completion queue disconnected; no worker is left to publish results");
                None
            }
        }
    }

    /// Stops the pool.
    ///
    /// Sets the cancellation flag, closes the job queue, drops tasks that never
    /// started and waits up to `timeout` for every worker to exit. Workers still
    /// running at the deadline are detached and a warning is logged; this never
    /// fails. Finished results that were not drained are discarded.
    ///
    /// Calling `shutdown` again returns an empty report.
    pub fn shutdown(&mut self, timeout: Duration) -> ShutdownReport {
        if self.state == PoolState::Closed {
            return ShutdownReport::default();
        }

        self.abandon();

        let mut report = ShutdownReport {
            dropped_tasks: self.drop_pending_tasks(),
            ..ShutdownReport::default()
        };

        let deadline = Instant::now() + timeout;
        let mut exited = HashSet::new();
        while exited.len() < self.workers.len() {
            match self.exit_receiver.recv_deadline(deadline) {
                Ok(index) => {
                    exited.insert(index);
                }
                Err(_) => break,
            }
        }

        for (index, worker) in self.workers.drain(..).enumerate() {
            if !exited.contains(&index) {
                report.timed_out += 1;
                continue;
            }
            if worker.handle.join().is_err() {
                self.diagnostics
                    .error(&format!("Worker thread {} panicked outside of a task", worker.name));
            }
            report.joined += 1;
        }

        if report.timed_out > 0 {
            self.diagnostics.warn(
                &TaskError::ShutdownTimeout {
                    remaining: report.timed_out,
                    timeout,
                }
                .to_string(),
            );
        }

        while self.result_receiver.try_recv().is_ok() {
            report.discarded_results += 1;
        }
        if report.discarded_results > 0 || report.dropped_tasks > 0 {
            self.diagnostics.debug(&format!(
                "Discarded {} undrained result(s) and {} queued task(s) at shutdown",
                report.discarded_results, report.dropped_tasks
            ));
        }

        report
    }

    /// Number of worker threads this pool runs.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Names of the spawned worker threads.
    pub fn worker_names(&self) -> Vec<String> {
        self.workers.iter().map(|worker| worker.name.clone()).collect()
    }

    /// Whether `start` succeeded and `shutdown` has not been called.
    pub fn is_running(&self) -> bool {
        self.state == PoolState::Running
    }

    /// Tasks accepted but not yet published or dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Closes the pool without waiting: cancel, then disconnect the queues.
    fn abandon(&mut self) {
        self.state = PoolState::Closed;
        self.cancellation.cancel();
        self.job_sender = None;
        self.result_sender = None;
        self.exit_sender = None;
    }

    fn drop_pending_tasks(&self) -> usize {
        let mut dropped = 0;
        while self.job_receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            self.in_flight.fetch_sub(dropped, Ordering::AcqRel);
        }
        dropped
    }
}

impl<T: Task> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if self.state != PoolState::Closed {
            self.abandon();
        }
    }
}

fn run_worker<T: Task>(context: WorkerContext<T>) {
    let _exit = ExitSignal {
        index: context.index,
        exits: context.exits.clone(),
    };

    while let Ok(Job { id, task }) = context.jobs.recv() {
        if context.cancellation.is_cancelled() {
            context.in_flight.fetch_sub(1, Ordering::AcqRel);
            break;
        }

        let key = task.key();
        let task_context = task.context();
        let scope = WorkerScope::new(&context.name, &context.cancellation, &NoopExecutor);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.process(&scope)))
            .unwrap_or_else(|payload| Err(GenerationError::from_panic(payload)));

        if context.cancellation.is_cancelled() {
            context.in_flight.fetch_sub(1, Ordering::AcqRel);
            context.diagnostics.debug(&format!(
                "Dropping result of task {} for {:?}: pool shut down while it ran",
                id, key
            ));
            break;
        }

        if let Err(error) = &outcome {
            context.diagnostics.debug(&format!(
                "Task {} for {:?} failed on {}: {}",
                id, key, context.name, error
            ));
        }

        let sent = context
            .results
            .send(TaskResult::new(id, task_context, key, outcome));
        context.in_flight.fetch_sub(1, Ordering::AcqRel);
        if sent.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::task_management::diagnostics::NoopDiagnostics;

    struct Echo(u32);

    impl Task for Echo {
        type Key = u32;
        type Context = ();
        type Artifact = (u32, String);

        fn key(&self) -> u32 {
            self.0
        }

        fn context(&self) {}

        fn process(&self, scope: &WorkerScope<'_>) -> Result<(u32, String), GenerationError> {
            Ok((self.0, scope.worker_name().to_string()))
        }
    }

    fn pool(workers: usize) -> WorkerPool<Echo> {
        WorkerPool::new(workers, "test-pool", Arc::new(NoopDiagnostics))
    }

    fn wait_for(pool: &WorkerPool<Echo>, count: usize) -> Vec<TaskResult<Echo>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut results = Vec::new();
        while results.len() < count && Instant::now() < deadline {
            match pool.poll_completed() {
                Some(result) => results.push(result),
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        results
    }

    #[test]
    fn thread_names_are_sequential() {
        let namer = ThreadNamer::new("chunk-worker");
        assert_eq!(namer.next_name(), "chunk-worker-1");
        assert_eq!(namer.next_name(), "chunk-worker-2");
    }

    #[test]
    fn workers_carry_prefixed_names() {
        let mut pool = pool(2);
        pool.start().unwrap();
        assert_eq!(pool.worker_names(), vec!["test-pool-1", "test-pool-2"]);

        pool.submit(Echo(1)).unwrap();
        let results = wait_for(&pool, 1);
        let (_, _, _, outcome) = results.into_iter().next().unwrap().into_parts();
        let (value, worker) = outcome.unwrap();
        assert_eq!(value, 1);
        assert!(worker.starts_with("test-pool-"));

        pool.shutdown(Duration::from_secs(5));
    }

    #[test]
    fn starting_twice_is_rejected() {
        let mut pool = pool(1);
        pool.start().unwrap();
        assert!(matches!(pool.start(), Err(TaskError::AlreadyStarted)));
        pool.shutdown(Duration::from_secs(5));
        assert!(matches!(pool.start(), Err(TaskError::PoolClosed)));
    }

    #[test]
    fn tasks_queued_before_start_run_after_start() {
        let mut pool = pool(1);
        pool.submit(Echo(5)).unwrap();
        assert!(pool.poll_completed().is_none());
        assert_eq!(pool.in_flight(), 1);

        pool.start().unwrap();
        let results = wait_for(&pool, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(*results[0].key(), 5);
        assert_eq!(pool.in_flight(), 0);

        pool.shutdown(Duration::from_secs(5));
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let mut pool = pool(1);
        pool.start().unwrap();
        let report = pool.shutdown(Duration::from_secs(5));
        assert_eq!(report.joined, 1);
        assert_eq!(report.timed_out, 0);
        assert!(matches!(pool.submit(Echo(1)), Err(TaskError::PoolClosed)));
        assert_eq!(pool.shutdown(Duration::from_secs(5)), ShutdownReport::default());
    }

    #[test]
    fn shutting_down_an_idle_pool_drops_its_queue() {
        let mut pool = pool(1);
        pool.submit(Echo(1)).unwrap();
        pool.submit(Echo(2)).unwrap();
        let report = pool.shutdown(Duration::from_millis(10));
        assert_eq!(report.dropped_tasks, 2);
        assert_eq!(report.joined, 0);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn undrained_results_are_discarded_at_shutdown() {
        let mut pool = pool(2);
        pool.start().unwrap();
        for value in 0..4 {
            pool.submit(Echo(value)).unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(10);
        while pool.in_flight() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        let report = pool.shutdown(Duration::from_secs(5));
        assert_eq!(report.discarded_results, 4);
        assert!(pool.poll_completed().is_none());
    }
}

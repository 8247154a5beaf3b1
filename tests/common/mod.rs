#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use voxel_chunk_tasks::{
    config::TaskManagerConfig,
    engine_state::task_management::{
        diagnostics::RecordingDiagnostics,
        error::GenerationError,
        task::{Task, WorkerScope},
        DrainSummary, TaskManager,
    },
};

/// How a [`ScriptedTask`] behaves when processed.
#[derive(Debug, Clone)]
pub enum Script {
    /// Returns its input.
    Succeed,
    /// Fails with the given message.
    Fail(&'static str),
    /// Panics with the given message.
    Panic(&'static str),
    /// Sleeps, ignoring cancellation, then returns its input.
    Sleep(Duration),
    /// Spins until cancelled, then reports cancellation.
    UntilCancelled,
}

/// A task whose behaviour is fixed up front.
pub struct ScriptedTask {
    pub input: i64,
    pub script: Script,
    pub finished: Arc<AtomicUsize>,
}

impl ScriptedTask {
    pub fn new(input: i64, script: Script) -> Self {
        Self {
            input,
            script,
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counted(input: i64, script: Script, finished: &Arc<AtomicUsize>) -> Self {
        Self {
            input,
            script,
            finished: finished.clone(),
        }
    }
}

impl Task for ScriptedTask {
    type Key = i64;
    type Context = String;
    type Artifact = i64;

    fn key(&self) -> i64 {
        self.input
    }

    fn context(&self) -> String {
        format!("context-{}", self.input)
    }

    fn process(&self, scope: &WorkerScope<'_>) -> Result<i64, GenerationError> {
        let outcome = match &self.script {
            Script::Succeed => Ok(self.input),
            Script::Fail(message) => Err(GenerationError::failed(*message)),
            Script::Panic(message) => panic!("{}", message),
            Script::Sleep(duration) => {
                thread::sleep(*duration);
                Ok(self.input)
            }
            Script::UntilCancelled => loop {
                if let Err(cancelled) = scope.cancellation().checkpoint() {
                    break Err(cancelled);
                }
                thread::sleep(Duration::from_millis(1));
            },
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

pub fn config(workers: usize) -> TaskManagerConfig {
    TaskManagerConfig::default()
        .with_worker_count(workers)
        .with_thread_name_prefix("test-worker")
}

pub fn manager(workers: usize, diagnostics: &RecordingDiagnostics) -> TaskManager<ScriptedTask> {
    TaskManager::new(config(workers), Arc::new(diagnostics.clone()))
}

/// Everything observed while draining.
#[derive(Debug, Default)]
pub struct Drained {
    pub applied: Vec<i64>,
    pub failures: Vec<(i64, GenerationError)>,
    pub summary: DrainSummary,
}

/// Drains once, recording what the callbacks saw.
pub fn drain_once(manager: &TaskManager<ScriptedTask>, drained: &mut Drained) {
    let applied = &mut drained.applied;
    let failures = &mut drained.failures;
    let summary = manager.drain_completed_with(
        |context, key, artifact| {
            assert_eq!(context, &format!("context-{}", key));
            applied.push(artifact);
            Ok(())
        },
        |key, error| failures.push((*key, error.clone())),
    );
    drained.summary.applied += summary.applied;
    drained.summary.failed += summary.failed;
    drained.summary.rejected += summary.rejected;
}

/// Spins on `drain_once` until `expected` results arrived or ten seconds passed.
pub fn drain_until(manager: &TaskManager<ScriptedTask>, expected: usize) -> Drained {
    let mut drained = Drained::default();
    let deadline = Instant::now() + Duration::from_secs(10);
    while drained.summary.total() < expected && Instant::now() < deadline {
        drain_once(manager, &mut drained);
        thread::sleep(Duration::from_millis(1));
    }
    drained
}

/// Waits until the manager has nothing in flight.
pub fn wait_idle(manager: &TaskManager<ScriptedTask>) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while manager.in_flight() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
}

//! # Engine State Module
//!
//! Host-side glue tying the task system to a voxel world.
//!
//! ## Key Components
//!
//! * `EngineState` - Owns the world, the generator and the task manager, and
//!   exposes the hooks a host calls: `start`, `request_area`, `tick`, `stop`
//! * `task_management` - Worker pool, task manager and result envelopes
//! * `voxels` - Chunks, generators, the world and the chunk generation task
//!
//! ## Tick Model
//!
//! The host owns the authoritative loop and calls `EngineState::tick()` once
//! per cycle. A tick commits every chunk that finished since the previous tick
//! and never waits for chunks that are still generating.

use std::{collections::HashSet, sync::Arc};

use crate::config::TaskManagerConfig;
use task_management::{
    diagnostics::SharedDiagnostics,
    error::{ApplyError, GenerationError, TaskError},
    worker_pool::ShutdownReport,
    DrainSummary, ResultApplier, TaskManager,
};
use voxels::{
    chunk::GeneratedChunk,
    generator::ChunkGenerator,
    positions_around,
    tasks::chunk_generation_task::ChunkGenerationTask,
    world::{World, WorldHandle},
    ChunkPos,
};

pub mod task_management;
pub mod voxels;

/// Commits finished chunks into the world and keeps track of what is still pending.
struct PendingApplier<'a> {
    pending: &'a mut HashSet<ChunkPos>,
}

impl<G: ChunkGenerator> ResultApplier<ChunkGenerationTask<G>> for PendingApplier<'_> {
    fn apply(
        &mut self,
        world: &WorldHandle,
        position: &ChunkPos,
        chunk: GeneratedChunk,
    ) -> Result<(), ApplyError> {
        self.pending.remove(position);
        world.get_mut().commit_chunk(*position, chunk)
    }

    fn on_failure(&mut self, position: &ChunkPos, _error: &GenerationError) {
        // Forget the request so the host may ask again later.
        self.pending.remove(position);
    }
}

/// The state container a host drives from its authoritative loop.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use voxel_chunk_tasks::{
///     config::TaskManagerConfig,
///     engine_state::{
///         task_management::diagnostics::LogDiagnostics,
///         voxels::{chunk_pos, generator::{GeneratorSettings, PerlinChunkGenerator}},
///         EngineState,
///     },
/// };
///
/// let mut engine = EngineState::new(
///     TaskManagerConfig::default(),
///     PerlinChunkGenerator::new(GeneratorSettings::default()),
///     Arc::new(LogDiagnostics::default()),
/// );
/// engine.start().unwrap();
/// engine.request_area(chunk_pos(0, 0), 2);
///
/// while !engine.is_idle() {
///     engine.tick();
///     std::thread::sleep(std::time::Duration::from_millis(50));
/// }
/// engine.stop();
/// ```
pub struct EngineState<G: ChunkGenerator> {
    /// The authoritative world
    world: WorldHandle,
    /// The generation algorithm shared by every task
    generator: Arc<G>,
    /// Task manager for chunk generation
    task_manager: TaskManager<ChunkGenerationTask<G>>,
    /// Positions submitted but not yet committed or failed
    pending: HashSet<ChunkPos>,
    diagnostics: SharedDiagnostics,
}

impl<G: ChunkGenerator> EngineState<G> {
    /// Creates an engine with an empty world. Nothing runs until [`start`](Self::start).
    pub fn new(config: TaskManagerConfig, generator: G, diagnostics: SharedDiagnostics) -> Self {
        Self {
            world: World::handle(),
            generator: Arc::new(generator),
            task_manager: TaskManager::new(config, diagnostics.clone()),
            pending: HashSet::new(),
            diagnostics,
        }
    }

    /// Server-start hook: activates the task manager.
    pub fn start(&self) -> Result<bool, TaskError> {
        self.task_manager.activate()
    }

    /// Server-stop hook: deactivates the task manager and forgets pending requests.
    pub fn stop(&mut self) -> Option<ShutdownReport> {
        let report = self.task_manager.deactivate();
        if !self.pending.is_empty() {
            self.diagnostics.info(&format!(
                "Abandoning {} pending chunk request(s).",
                self.pending.len()
            ));
            self.pending.clear();
        }
        report
    }

    /// Requests generation of a single chunk.
    ///
    /// Chunks already in the world or already pending are skipped.
    ///
    /// # Returns
    /// `true` if a task was submitted
    pub fn request_chunk(&mut self, position: ChunkPos) -> bool {
        if self.pending.contains(&position) || self.world.get().contains(position) {
            return false;
        }

        let task = ChunkGenerationTask::new(self.world.clone(), position, self.generator.clone());
        if self.task_manager.submit(task) {
            self.pending.insert(position);
            true
        } else {
            false
        }
    }

    /// Requests every chunk within `radius` of `center`, nearest first.
    ///
    /// # Returns
    /// The number of tasks submitted
    pub fn request_area(&mut self, center: ChunkPos, radius: u32) -> usize {
        positions_around(center, radius)
            .into_iter()
            .filter(|position| self.request_chunk(*position))
            .count()
    }

    /// Per-tick hook: commits every chunk that finished since the last tick.
    pub fn tick(&mut self) -> DrainSummary {
        let mut applier = PendingApplier {
            pending: &mut self.pending,
        };
        self.task_manager.drain_completed(&mut applier)
    }

    /// Whether every requested chunk has been committed or has failed.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of requested chunks not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Shared handle to the world.
    pub fn world(&self) -> &WorldHandle {
        &self.world
    }

    /// The task manager driving generation.
    pub fn task_manager(&self) -> &TaskManager<ChunkGenerationTask<G>> {
        &self.task_manager
    }
}

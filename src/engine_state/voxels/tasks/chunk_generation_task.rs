//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask` which runs a host-supplied
//! [`ChunkGenerator`] for one chunk position on a worker thread. The resulting
//! [`GeneratedChunk`] travels back to the authoritative thread together with the
//! world handle it should be committed into.

use std::sync::Arc;

use crate::engine_state::{
    task_management::{
        error::GenerationError,
        task::{Task, WorkerScope},
    },
    voxels::{
        chunk::GeneratedChunk,
        generator::{ChunkGenerator, GenerationRequest},
        world::WorldHandle,
        ChunkPos,
    },
};

/// A task that generates one chunk asynchronously.
///
/// The task never locks the world. It only carries the handle so the result
/// applier knows where the chunk belongs.
pub struct ChunkGenerationTask<G: ChunkGenerator> {
    /// The world the chunk will be committed into
    world: WorldHandle,
    /// The position of the chunk to generate (in chunk coordinates)
    position: ChunkPos,
    /// The generation algorithm, shared by every task of a manager
    generator: Arc<G>,
}

impl<G: ChunkGenerator> ChunkGenerationTask<G> {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `world` - The world the result belongs to
    /// * `position` - The chunk coordinates to generate
    /// * `generator` - The generator to run
    pub fn new(world: WorldHandle, position: ChunkPos, generator: Arc<G>) -> Self {
        ChunkGenerationTask {
            world,
            position,
            generator,
        }
    }
}

impl<G: ChunkGenerator> Task for ChunkGenerationTask<G> {
    type Key = ChunkPos;
    type Context = WorldHandle;
    type Artifact = GeneratedChunk;

    fn key(&self) -> ChunkPos {
        self.position
    }

    fn context(&self) -> WorldHandle {
        self.world.clone()
    }

    fn process(&self, scope: &WorkerScope<'_>) -> Result<GeneratedChunk, GenerationError> {
        let chunk = self.generator.generate(&GenerationRequest {
            position: self.position,
            scope,
        })?;

        if chunk.position != self.position || !chunk.is_complete() {
            return Err(GenerationError::failed(format!(
                "generator returned a malformed chunk for {:?}",
                self.position
            )));
        }
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        task_management::task::{Cancellation, NoopExecutor},
        voxels::{
            chunk::{Biome, CHUNK_COLUMNS},
            chunk_pos,
            world::World,
        },
    };

    /// Returns a flat chunk, optionally for the wrong position.
    struct FlatGenerator {
        offset: i32,
    }

    impl ChunkGenerator for FlatGenerator {
        fn generate(
            &self,
            request: &GenerationRequest<'_>,
        ) -> Result<GeneratedChunk, GenerationError> {
            Ok(GeneratedChunk {
                position: chunk_pos(request.position.x + self.offset, request.position.y),
                heights: vec![70; CHUNK_COLUMNS],
                biomes: vec![Biome::Plains; CHUNK_COLUMNS],
                structures: Vec::new(),
                features: Vec::new(),
            })
        }
    }

    fn run(task: &ChunkGenerationTask<FlatGenerator>) -> Result<GeneratedChunk, GenerationError> {
        let cancellation = Cancellation::new();
        let scope = WorkerScope::new("chunk-worker-1", &cancellation, &NoopExecutor);
        task.process(&scope)
    }

    #[test]
    fn task_reports_its_position_and_world() {
        let world = World::handle();
        let task = ChunkGenerationTask::new(
            world.clone(),
            chunk_pos(2, 3),
            Arc::new(FlatGenerator { offset: 0 }),
        );

        assert_eq!(task.key(), chunk_pos(2, 3));
        assert!(task.context().ptr_eq(&world));
        assert_eq!(run(&task).unwrap().position, chunk_pos(2, 3));
    }

    #[test]
    fn chunks_for_the_wrong_position_are_failures() {
        let task = ChunkGenerationTask::new(
            World::handle(),
            chunk_pos(0, 0),
            Arc::new(FlatGenerator { offset: 1 }),
        );
        assert!(matches!(run(&task), Err(GenerationError::Failed(_))));
    }
}

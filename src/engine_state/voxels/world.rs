//! # World Module
//!
//! The authoritative store of generated chunks. The world is only ever mutated on
//! the authoritative thread, inside the drain loop, when a finished generation
//! result is committed.
//!
//! Committing a chunk also marks it *forced*: kept loaded regardless of player
//! proximity until the host releases it.

use std::collections::{HashMap, HashSet};

use crate::core::MtResource;
use crate::engine_state::task_management::error::ApplyError;

use super::{chunk::GeneratedChunk, ChunkPos};

/// Shared handle to the world, carried by tasks as their context.
pub type WorldHandle = MtResource<World>;

/// Sparse map of generated chunk columns.
///
/// # Examples
///
/// ```
/// use voxel_chunk_tasks::engine_state::voxels::{chunk_pos, world::World};
///
/// let world = World::new();
/// assert_eq!(world.chunk_count(), 0);
/// assert!(world.get_chunk_at(chunk_pos(0, 0)).is_none());
/// ```
#[derive(Debug, Default)]
pub struct World {
    chunks: HashMap<ChunkPos, GeneratedChunk>,
    forced: HashSet<ChunkPos>,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new, empty world in a shareable handle.
    pub fn handle() -> WorldHandle {
        MtResource::new(Self::new())
    }

    /// Stores a generated chunk and forces it loaded.
    ///
    /// # Errors
    /// - the chunk was generated for a different position than the one it is
    ///   committed under
    /// - a chunk already exists at `position`
    pub fn commit_chunk(
        &mut self,
        position: ChunkPos,
        chunk: GeneratedChunk,
    ) -> Result<(), ApplyError> {
        if chunk.position != position {
            return Err(ApplyError::new(format!(
                "chunk generated for {:?} cannot be committed at {:?}",
                chunk.position, position
            )));
        }
        if self.chunks.contains_key(&position) {
            return Err(ApplyError::new(format!(
                "chunk at {:?} is already generated",
                position
            )));
        }

        self.chunks.insert(position, chunk);
        self.set_chunk_forced(position, true);
        Ok(())
    }

    /// Sets whether a chunk is forced loaded. Returns whether anything changed.
    pub fn set_chunk_forced(&mut self, position: ChunkPos, forced: bool) -> bool {
        if forced {
            self.forced.insert(position)
        } else {
            self.forced.remove(&position)
        }
    }

    /// Whether the chunk at `position` is forced loaded.
    pub fn is_forced(&self, position: ChunkPos) -> bool {
        self.forced.contains(&position)
    }

    /// The chunk at `position`, if it has been generated.
    pub fn get_chunk_at(&self, position: ChunkPos) -> Option<&GeneratedChunk> {
        self.chunks.get(&position)
    }

    /// Whether a chunk exists at `position`.
    pub fn contains(&self, position: ChunkPos) -> bool {
        self.chunks.contains_key(&position)
    }

    /// Number of generated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of forced chunks.
    pub fn forced_count(&self) -> usize {
        self.forced.len()
    }
}

//! # Voxel World Generation
//!
//! The voxel side of the task system: what gets generated, where it ends up, and
//! the task that connects the two.
//!
//! ## Architecture
//!
//! * **Chunk**: A generated 16x16 column of terrain (heights, biomes, features)
//! * **Generator**: The generation algorithm, supplied by the host through the
//!   `ChunkGenerator` trait. `PerlinChunkGenerator` is the bundled implementation
//! * **World**: The authoritative chunk store, mutated only on the authoritative thread
//! * **Tasks**: `ChunkGenerationTask` runs a generator on a worker thread
//!
//! ## Data Flow
//!
//! 1. The host requests a chunk position
//! 2. A `ChunkGenerationTask` is submitted to the task manager
//! 3. A worker runs the generator and publishes a `GeneratedChunk`
//! 4. On a later tick the authoritative thread commits it into the `World`
//!
//! ## Coordinates
//!
//! Chunk positions are 2D (`x`, `z`) in chunk units. `ChunkPos` reuses
//! `cgmath::Point2`, with its `y` component standing for the world's `z` axis.

use cgmath::Point2;

pub mod chunk;
pub mod generator;
pub mod tasks;
pub mod world;

/// Position of a chunk column, in chunk coordinates. `y` is the world's `z` axis.
pub type ChunkPos = Point2<i32>;

/// Creates a [`ChunkPos`] from world-axis names.
pub fn chunk_pos(x: i32, z: i32) -> ChunkPos {
    Point2::new(x, z)
}

/// Largest radius [`positions_around`] honours. Larger requests are clamped.
pub const MAX_AREA_RADIUS: u32 = 256;

/// Every chunk position in the square of side `2 * radius + 1` around `center`.
///
/// Ordered by distance from the center (Chebyshev rings), nearest first. The
/// radius is clamped to [`MAX_AREA_RADIUS`], and positions that would fall
/// outside the `i32` coordinate range are skipped.
pub fn positions_around(center: ChunkPos, radius: u32) -> Vec<ChunkPos> {
    let radius = radius.min(MAX_AREA_RADIUS) as i32;
    let mut positions = Vec::new();
    for ring in 0..=radius {
        for dx in -ring..=ring {
            for dz in -ring..=ring {
                if dx.abs().max(dz.abs()) != ring {
                    continue;
                }
                if let (Some(x), Some(z)) = (center.x.checked_add(dx), center.y.checked_add(dz)) {
                    positions.push(chunk_pos(x, z));
                }
            }
        }
    }
    positions
}

//! # Chunk Module
//!
//! The artifact a chunk generation task produces: a 16x16 column grid holding a
//! surface height, a biome and at most one decorative feature per column, plus
//! the structures that start in the chunk.
//!
//! Columns are stored row-major, `x` first, then `z`:
//! `index = local_z * CHUNK_DIMENSION + local_x`.

use super::ChunkPos;

/// Width and depth of a chunk, in blocks.
pub const CHUNK_DIMENSION: usize = 16;
/// Number of columns in a chunk (CHUNK_DIMENSION²).
pub const CHUNK_COLUMNS: usize = CHUNK_DIMENSION * CHUNK_DIMENSION;

/// Biome assigned to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Biome {
    /// Surface below sea level.
    Ocean,
    /// Narrow band just above sea level.
    Beach,
    /// Dry lowland.
    Desert,
    /// Temperate lowland.
    Plains,
    /// Wet lowland.
    Forest,
    /// High ground, regardless of moisture.
    Mountains,
}

/// Height above sea level where beaches end.
const BEACH_BAND: i32 = 2;
/// Height above sea level where mountains start.
const MOUNTAIN_HEIGHT: i32 = 28;

impl Biome {
    /// Picks a biome from a surface height and a moisture sample in `[-1, 1]`.
    pub fn classify(height: i32, moisture: f64, sea_level: i32) -> Self {
        let above_sea = height - sea_level;
        if above_sea < 0 {
            Biome::Ocean
        } else if above_sea <= BEACH_BAND {
            Biome::Beach
        } else if above_sea >= MOUNTAIN_HEIGHT {
            Biome::Mountains
        } else if moisture < -0.25 {
            Biome::Desert
        } else if moisture > 0.2 {
            Biome::Forest
        } else {
            Biome::Plains
        }
    }
}

/// Decoration placed on top of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Forests and plains.
    Tree,
    /// Deserts.
    Cactus,
    /// Mountains.
    Boulder,
}

/// A feature anchored to one column of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    /// Column x inside the chunk (`0..CHUNK_DIMENSION`).
    pub local_x: u8,
    /// Column z inside the chunk (`0..CHUNK_DIMENSION`).
    pub local_z: u8,
    /// What sits there.
    pub kind: FeatureKind,
}

/// Structure anchored in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    /// Land above sea level.
    Ruin,
    /// Sea floor.
    Shipwreck,
}

/// The column a structure starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureStart {
    /// Column x inside the chunk (`0..CHUNK_DIMENSION`).
    pub local_x: u8,
    /// Column z inside the chunk (`0..CHUNK_DIMENSION`).
    pub local_z: u8,
    /// What gets built there.
    pub kind: StructureKind,
}

/// A fully generated chunk column grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedChunk {
    /// Where this chunk belongs.
    pub position: ChunkPos,
    /// Surface height per column.
    pub heights: Vec<i32>,
    /// Biome per column.
    pub biomes: Vec<Biome>,
    /// Structures starting in this chunk.
    pub structures: Vec<StructureStart>,
    /// Decorations, at most one per column and never on a structure start.
    pub features: Vec<Feature>,
}

impl GeneratedChunk {
    /// Index of a column inside the per-column vectors, `None` when out of range.
    pub fn column_index(local_x: usize, local_z: usize) -> Option<usize> {
        if local_x < CHUNK_DIMENSION && local_z < CHUNK_DIMENSION {
            Some(local_z * CHUNK_DIMENSION + local_x)
        } else {
            None
        }
    }

    /// Surface height of a column.
    pub fn height_at(&self, local_x: usize, local_z: usize) -> Option<i32> {
        Self::column_index(local_x, local_z).and_then(|index| self.heights.get(index).copied())
    }

    /// Biome of a column.
    pub fn biome_at(&self, local_x: usize, local_z: usize) -> Option<Biome> {
        Self::column_index(local_x, local_z).and_then(|index| self.biomes.get(index).copied())
    }

    /// Whether every per-column vector has exactly [`CHUNK_COLUMNS`] entries.
    pub fn is_complete(&self) -> bool {
        self.heights.len() == CHUNK_COLUMNS && self.biomes.len() == CHUNK_COLUMNS
    }

    /// Highest surface in the chunk.
    pub fn max_height(&self) -> Option<i32> {
        self.heights.iter().copied().max()
    }
}

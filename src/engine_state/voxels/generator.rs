//! # Chunk Generators
//!
//! The generation algorithm is owned by the host. The task system only needs
//! something implementing [`ChunkGenerator`]: a pure function from a chunk
//! position to a [`GeneratedChunk`] that may fail.
//!
//! [`PerlinChunkGenerator`] is the bundled implementation. It runs in four
//! stages, checking for cancellation before each:
//!
//! 1. **Surface**: one Perlin sample per column gives the surface height
//! 2. **Structure starts**: a per-chunk seeded roll may anchor a ruin on land or
//!    a shipwreck on the sea floor
//! 3. **Biomes**: a second, independent Perlin field gives moisture
//! 4. **Features**: a per-chunk seeded RNG scatters trees, cacti and boulders,
//!    leaving structure columns free

use noise::{NoiseFn, Perlin};
use serde::Deserialize;

use super::{
    chunk::{
        Biome, Feature, FeatureKind, GeneratedChunk, StructureKind, StructureStart,
        CHUNK_COLUMNS, CHUNK_DIMENSION,
    },
    ChunkPos,
};
use crate::engine_state::task_management::{error::GenerationError, task::WorkerScope};

/// Everything a generator gets to see for one chunk.
pub struct GenerationRequest<'a> {
    /// The chunk to generate.
    pub position: ChunkPos,
    /// The worker running the generation.
    pub scope: &'a WorkerScope<'a>,
}

/// The host's generation algorithm.
///
/// Implementations run on worker threads, concurrently. They must not touch the
/// authoritative world; everything they need should be owned by the generator or
/// derivable from the request.
pub trait ChunkGenerator: Send + Sync + 'static {
    /// Generates one chunk.
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedChunk, GenerationError>;
}

/// Tunables for [`PerlinChunkGenerator`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSettings {
    /// World seed. The moisture field uses `seed + 1`.
    pub seed: u32,
    /// Scaling factor applied to block coordinates when sampling the height field.
    pub height_scale: f64,
    /// Scaling factor applied to block coordinates when sampling the moisture field.
    pub moisture_scale: f64,
    /// Surface height where the height field is zero.
    pub base_height: i32,
    /// Maximum deviation from `base_height`.
    pub amplitude: f64,
    /// Columns below this height are ocean.
    pub sea_level: i32,
    /// Chunks further than this (Chebyshev distance from the origin) fail to generate.
    pub world_border: i32,
    /// Chance per chunk of a structure start, in `[0, 1]`.
    pub structure_chance: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            height_scale: 0.01,
            moisture_scale: 0.004,
            base_height: 68,
            amplitude: 40.0,
            sea_level: 64,
            world_border: 1_875_000,
            structure_chance: 0.1,
        }
    }
}

/// Mixed into the feature seed so structure rolls are independent of features.
const STRUCTURE_SALT: u64 = 0x5354_5255_4354_5552;

/// Chance per column of placing a feature, by biome.
fn feature_for(biome: Biome) -> Option<(FeatureKind, f64)> {
    match biome {
        Biome::Forest => Some((FeatureKind::Tree, 0.12)),
        Biome::Plains => Some((FeatureKind::Tree, 0.01)),
        Biome::Desert => Some((FeatureKind::Cactus, 0.02)),
        Biome::Mountains => Some((FeatureKind::Boulder, 0.03)),
        Biome::Ocean | Biome::Beach => None,
    }
}

/// Terrain from two Perlin fields plus seeded feature scattering.
#[derive(Debug, Clone)]
pub struct PerlinChunkGenerator {
    settings: GeneratorSettings,
    height: Perlin,
    moisture: Perlin,
}

impl PerlinChunkGenerator {
    /// Creates a generator for the given settings.
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            height: Perlin::new(settings.seed),
            moisture: Perlin::new(settings.seed.wrapping_add(1)),
            settings,
        }
    }

    /// The settings this generator was built with.
    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    fn block_coordinates(position: ChunkPos, column: usize) -> (f64, f64) {
        let dimension = CHUNK_DIMENSION as i64;
        let local_x = (column % CHUNK_DIMENSION) as i64;
        let local_z = (column / CHUNK_DIMENSION) as i64;
        let x = i64::from(position.x) * dimension + local_x;
        let z = i64::from(position.y) * dimension + local_z;
        (x as f64, z as f64)
    }

    fn build_surface(&self, position: ChunkPos) -> Vec<i32> {
        (0..CHUNK_COLUMNS)
            .map(|column| {
                let (x, z) = Self::block_coordinates(position, column);
                let sample = self.height.get([
                    x * self.settings.height_scale,
                    z * self.settings.height_scale,
                ]);
                self.settings.base_height + (sample * self.settings.amplitude).round() as i32
            })
            .collect()
    }

    fn place_structure_starts(&self, position: ChunkPos, heights: &[i32]) -> Vec<StructureStart> {
        let mut rng = fastrand::Rng::with_seed(self.feature_seed(position) ^ STRUCTURE_SALT);
        if rng.f64() >= self.settings.structure_chance {
            return Vec::new();
        }

        let column = rng.usize(..CHUNK_COLUMNS);
        let Some(&height) = heights.get(column) else {
            return Vec::new();
        };
        let kind = if height < self.settings.sea_level {
            StructureKind::Shipwreck
        } else {
            StructureKind::Ruin
        };
        vec![StructureStart {
            local_x: (column % CHUNK_DIMENSION) as u8,
            local_z: (column / CHUNK_DIMENSION) as u8,
            kind,
        }]
    }

    fn populate_biomes(&self, position: ChunkPos, heights: &[i32]) -> Vec<Biome> {
        heights
            .iter()
            .enumerate()
            .map(|(column, &height)| {
                let (x, z) = Self::block_coordinates(position, column);
                let moisture = self.moisture.get([
                    x * self.settings.moisture_scale,
                    z * self.settings.moisture_scale,
                ]);
                Biome::classify(height, moisture, self.settings.sea_level)
            })
            .collect()
    }

    fn place_features(
        &self,
        position: ChunkPos,
        biomes: &[Biome],
        structures: &[StructureStart],
    ) -> Vec<Feature> {
        let mut rng = fastrand::Rng::with_seed(self.feature_seed(position));
        biomes
            .iter()
            .enumerate()
            .filter_map(|(column, &biome)| {
                let (kind, chance) = feature_for(biome)?;
                if rng.f64() >= chance {
                    return None;
                }
                let local_x = (column % CHUNK_DIMENSION) as u8;
                let local_z = (column / CHUNK_DIMENSION) as u8;
                if structures
                    .iter()
                    .any(|start| start.local_x == local_x && start.local_z == local_z)
                {
                    return None;
                }
                Some(Feature {
                    local_x,
                    local_z,
                    kind,
                })
            })
            .collect()
    }

    fn feature_seed(&self, position: ChunkPos) -> u64 {
        let x = u64::from(position.x as u32);
        let z = u64::from(position.y as u32);
        u64::from(self.settings.seed)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (x << 32 | z)
    }
}

impl ChunkGenerator for PerlinChunkGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<GeneratedChunk, GenerationError> {
        let position = request.position;
        let cancellation = request.scope.cancellation();

        let border = self.settings.world_border;
        let limit = border.unsigned_abs();
        if position.x.unsigned_abs() > limit || position.y.unsigned_abs() > limit {
            return Err(GenerationError::failed(format!(
                "chunk {:?} lies outside the world border ({})",
                position, border
            )));
        }

        cancellation.checkpoint()?;
        let heights = self.build_surface(position);

        cancellation.checkpoint()?;
        let structures = self.place_structure_starts(position, &heights);

        cancellation.checkpoint()?;
        let biomes = self.populate_biomes(position, &heights);

        cancellation.checkpoint()?;
        let features = self.place_features(position, &biomes, &structures);

        Ok(GeneratedChunk {
            position,
            heights,
            biomes,
            structures,
            features,
        })
    }
}

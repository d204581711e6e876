use cubecl::prelude::CubeDim;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, DeviceLimits, SharedLayout, Stage};

/// Largest supported digit width.
pub const MAX_LOG_BINS: u32 = 8;

/// Cache behavior of global memory accesses.
///
/// This is a performance hint only; it never changes the result of a kernel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheHint {
    /// Keep the data in cache, it will be read again.
    #[default]
    Cached,
    /// Stream the data through, bypassing the cache.
    Streaming,
}

/// Shape of the tiles processed by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
pub struct TileConfig {
    /// Units of each cube.
    pub cube_dim: CubeDim,
    /// Consecutive elements owned by each unit in one load.
    pub line_size: u32,
    /// Loads making one tile.
    pub loads_per_tile: u32,
    /// Units raking the shared rows of the scan tree.
    pub raking_units: u32,
    /// Cache behavior of the loads and stores.
    pub cache_hint: CacheHint,
}

/// Element counts of a [TileConfig], checked against 32-bit overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileShape {
    pub units: u32,
    pub line_size: u32,
    /// Elements read by the cube in one load.
    pub load_size: u32,
    /// Elements processed by the cube in one tile.
    pub tile_size: u32,
}

impl TileConfig {
    /// The element counts of this tile.
    pub fn shape(&self, stage: Stage) -> Result<TileShape, ConfigError> {
        let CubeDim { x, y, z } = self.cube_dim;
        if x == 0 || y == 0 || z == 0 || self.line_size == 0 || self.loads_per_tile == 0 {
            return Err(ConfigError::EmptyTile { stage });
        }

        let too_large = || ConfigError::TileTooLarge { stage };
        let units = x
            .checked_mul(y)
            .and_then(|units| units.checked_mul(z))
            .ok_or_else(too_large)?;
        let load_size = units.checked_mul(self.line_size).ok_or_else(too_large)?;
        let tile_size = load_size
            .checked_mul(self.loads_per_tile)
            .ok_or_else(too_large)?;

        Ok(TileShape {
            units,
            line_size: self.line_size,
            load_size,
            tile_size,
        })
    }

    fn validate(
        &self,
        stage: Stage,
        channels: u32,
        limits: &DeviceLimits,
    ) -> Result<(TileShape, SharedLayout), ConfigError> {
        let shape = self.shape(stage)?;

        let max = limits.max_cube_dim;
        let cube_dim = self.cube_dim;
        if cube_dim.x > max.x || cube_dim.y > max.y || cube_dim.z > max.z {
            return Err(ConfigError::CubeDim {
                stage,
                cube_dim,
                max,
            });
        }
        if shape.units > limits.max_units_per_cube {
            return Err(ConfigError::Units {
                stage,
                units: shape.units,
                max: limits.max_units_per_cube,
            });
        }

        let layout = SharedLayout::new(
            stage,
            shape.units,
            self.raking_units,
            channels,
            limits.plane_dim,
        )?;
        if layout.size_bytes() > limits.max_shared_memory_size {
            return Err(ConfigError::SharedMemory {
                stage,
                required: layout.size_bytes(),
                max: limits.max_shared_memory_size,
            });
        }

        Ok((shape, layout))
    }
}

/// Everything a stage needs to be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    pub tile: TileConfig,
    pub shape: TileShape,
    pub layout: SharedLayout,
}

/// Tuning of a radix sort, fixed before the first launch.
///
/// Upsweep and downsweep must process tiles of the same size: both walk the same segments, and
/// the downsweep relies on the histograms of the upsweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, new)]
pub struct RadixConfig {
    /// Width of the digit sorted by each pass.
    pub log_bins: u32,
    pub upsweep: TileConfig,
    pub spine: TileConfig,
    pub downsweep: TileConfig,
}

impl RadixConfig {
    /// Number of digit values.
    pub fn bins(&self) -> u32 {
        1 << self.log_bins
    }

    pub fn digit_mask(&self) -> u32 {
        self.bins() - 1
    }

    /// Passes needed to sort keys of `key_bits` bits.
    pub fn passes(&self, key_bits: u32) -> u32 {
        key_bits.div_ceil(self.log_bins)
    }

    /// Mask of the digit starting at `bit_offset` when only the low `key_bits` bits are sorted.
    ///
    /// The last pass keeps only the bits left below `key_bits`.
    pub fn pass_mask(&self, bit_offset: u32, key_bits: u32) -> u32 {
        let width = self.log_bins.min(key_bits.saturating_sub(bit_offset));
        (1 << width) - 1
    }

    /// Elements processed by a cube in one tile of the upsweep and downsweep.
    pub fn tile_size(&self) -> Result<u32, ConfigError> {
        Ok(self.upsweep.shape(Stage::Upsweep)?.tile_size)
    }

    /// The tile and shared memory layout of a stage.
    ///
    /// Upsweep and downsweep count one channel per digit value, the spine scans one channel.
    pub fn stage(&self, stage: Stage, limits: &DeviceLimits) -> Result<StageConfig, ConfigError> {
        let (tile, channels) = self.tile_and_channels(stage);
        let (shape, layout) = tile.validate(stage, channels, limits)?;
        Ok(StageConfig {
            tile,
            shape,
            layout,
        })
    }

    /// Check the configuration can run on a device with the given limits.
    pub fn validate(&self, limits: &DeviceLimits) -> Result<(), ConfigError> {
        if !limits.planes {
            return Err(ConfigError::PlanesUnavailable);
        }
        if !(1..=MAX_LOG_BINS).contains(&self.log_bins) {
            return Err(ConfigError::LogBins(self.log_bins));
        }

        let mut tile_sizes = [0; 3];
        for (stage, tile_size) in [Stage::Upsweep, Stage::Spine, Stage::Downsweep]
            .into_iter()
            .zip(tile_sizes.iter_mut())
        {
            *tile_size = self.stage(stage, limits)?.shape.tile_size;
        }

        let [upsweep, _, downsweep] = tile_sizes;
        if upsweep != downsweep {
            return Err(ConfigError::TileMismatch {
                upsweep,
                downsweep,
            });
        }

        Ok(())
    }

    fn tile_and_channels(&self, stage: Stage) -> (TileConfig, u32) {
        match stage {
            Stage::Upsweep => (self.upsweep, self.bins()),
            Stage::Spine => (self.spine, 1),
            Stage::Downsweep => (self.downsweep, self.bins()),
        }
    }
}

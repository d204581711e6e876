use cubecl::prelude::CubeDim;
use serde::{Deserialize, Serialize};

use crate::{CacheHint, ConfigError, DeviceLimits, RadixConfig, SharedLayout, Stage, TileConfig};

/// Digit width used by [RadixStrategy::default].
pub const DEFAULT_LOG_BINS: u32 = 4;

const LINE_SIZE: u32 = 4;
const PLANES_PER_CUBE: u32 = 4;
const LOADS_PER_TILE: u32 = 2;
const SPINE_PLANES_PER_CUBE: u32 = 8;

/// How the tuning of a sort is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadixStrategy {
    /// Derive the tile shapes from the device limits.
    Auto { log_bins: u32 },
    /// Use the given configuration as is.
    Manual(RadixConfig),
}

impl Default for RadixStrategy {
    fn default() -> Self {
        Self::Auto {
            log_bins: DEFAULT_LOG_BINS,
        }
    }
}

impl RadixStrategy {
    /// The validated configuration of this strategy on a device.
    pub fn config(&self, limits: &DeviceLimits) -> Result<RadixConfig, ConfigError> {
        let config = match self {
            RadixStrategy::Auto { log_bins } => Self::auto_config(*log_bins, limits)?,
            RadixStrategy::Manual(config) => *config,
        };
        config.validate(limits)?;
        Ok(config)
    }

    /// Every tile holds `plane_dim * 32` elements. The upsweep and downsweep cube starts at four
    /// planes and shrinks until its digit counters fit in shared memory, trading units for loads
    /// per tile.
    fn auto_config(log_bins: u32, limits: &DeviceLimits) -> Result<RadixConfig, ConfigError> {
        if !(1..=crate::MAX_LOG_BINS).contains(&log_bins) {
            return Err(ConfigError::LogBins(log_bins));
        }

        let plane = limits.plane_dim.max(1);
        let planes_per_cube = |planes: u32| (limits.max_units_per_cube / plane).clamp(1, planes);
        let tile_size = plane * PLANES_PER_CUBE * LINE_SIZE * LOADS_PER_TILE;

        let mut units = plane * planes_per_cube(PLANES_PER_CUBE);
        let sweep = loop {
            let tile = tile_config(units, plane, tile_size / (units * LINE_SIZE));
            let layout = SharedLayout::new(
                Stage::Downsweep,
                units,
                tile.raking_units,
                1 << log_bins,
                plane,
            )?;
            if layout.size_bytes() <= limits.max_shared_memory_size || units == 1 {
                break tile;
            }
            units /= 2;
        };
        log::debug!(
            "Radix sweeps of {} bins use {} units per cube",
            1 << log_bins,
            units
        );

        let spine = tile_config(plane * planes_per_cube(SPINE_PLANES_PER_CUBE), plane, 1);

        Ok(RadixConfig::new(log_bins, sweep, spine, sweep))
    }
}

fn tile_config(units: u32, plane: u32, loads_per_tile: u32) -> TileConfig {
    let cube_dim = if units >= plane {
        CubeDim::new_2d(plane, units / plane)
    } else {
        CubeDim::new_1d(units)
    };

    TileConfig::new(
        cube_dim,
        LINE_SIZE,
        loads_per_tile.max(1),
        units.min(plane),
        CacheHint::Cached,
    )
}

use core::fmt::Display;

use cubecl::prelude::CubeDim;

/// The three dispatches of a radix pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Per-cube digit histograms.
    Upsweep,
    /// Exclusive scan of the histograms.
    Spine,
    /// Ranking and scatter.
    Downsweep,
}

impl Stage {
    /// Name of the kernel running this stage.
    pub fn kernel_name(&self) -> &'static str {
        match self {
            Stage::Upsweep => "radix_upsweep",
            Stage::Spine => "radix_spine_scan",
            Stage::Downsweep => "radix_downsweep",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Stage::Upsweep => f.write_str("upsweep"),
            Stage::Spine => f.write_str("spine scan"),
            Stage::Downsweep => f.write_str("downsweep"),
        }
    }
}

/// A configuration or problem that can't run on the device.
///
/// Always raised before the first kernel is launched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("The device doesn't support plane operations")]
    PlanesUnavailable,

    #[error("Digits of {0} bits are not supported, the digit width must be in 1..=8")]
    LogBins(u32),

    #[error("Keys of {key_bits} bits can't be sorted as {max}-bit patterns")]
    KeyBits { key_bits: u32, max: u32 },

    #[error("The {stage} tile has an empty dimension")]
    EmptyTile { stage: Stage },

    #[error("The {stage} tile holds more elements than 32-bit offsets can address")]
    TileTooLarge { stage: Stage },

    #[error("{raking_units} raking units don't divide the {units} units of the {stage} tile")]
    RakingUnits {
        stage: Stage,
        raking_units: u32,
        units: u32,
    },

    #[error("{raking_units} {stage} raking units aren't a multiple of {plane_dim} lanes")]
    RakingPlane {
        stage: Stage,
        raking_units: u32,
        plane_dim: u32,
    },

    #[error("Upsweep tiles hold {upsweep} elements but downsweep tiles hold {downsweep}")]
    TileMismatch { upsweep: u32, downsweep: u32 },

    #[error("The {stage} cube {cube_dim:?} exceeds the device maximum {max:?}")]
    CubeDim {
        stage: Stage,
        cube_dim: CubeDim,
        max: CubeDim,
    },

    #[error("The {stage} cube has {units} units, the device runs at most {max}")]
    Units { stage: Stage, units: u32, max: u32 },

    #[error("The {stage} kernel needs {required} bytes of shared memory, the device has {max}")]
    SharedMemory {
        stage: Stage,
        required: usize,
        max: usize,
    },

    #[error("The spine fits between 1 and {max} blocks, got {max_blocks}")]
    MaxBlocks { max_blocks: u32, max: u32 },

    #[error("{0} elements can't be addressed with 32-bit offsets")]
    TooManyElements(usize),

    #[error("The {name} buffer holds {len} words, {required} are required")]
    BufferTooSmall {
        name: &'static str,
        len: usize,
        required: usize,
    },
}

/// Errors raised by the radix sort.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RadixSortError {
    #[error("Invalid radix sort configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Keys and values must have the same length: {keys} keys, {values} values")]
    LengthMismatch { keys: usize, values: usize },
}

use core::ops::Range;

use crate::{ConfigError, RakingParams, Stage};

/// A named region of shared memory, in 32-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn size_bytes(&self) -> usize {
        self.len * size_of::<u32>()
    }
}

/// One level of the raking tree: `lanes` values split in rows of `row_len`, one row per raking
/// unit.
///
/// Rows are padded to an odd stride so that raking units walking their rows in lock-step hit
/// distinct banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLevel {
    pub lanes: u32,
    pub raking_units: u32,
    pub row_len: u32,
    pub row_stride: u32,
}

impl GridLevel {
    fn new(lanes: u32, raking_units: u32) -> Self {
        let row_len = lanes / raking_units;
        Self {
            lanes,
            raking_units,
            row_len,
            row_stride: row_len | 1,
        }
    }

    /// Word holding the value of `lane` for `channel`, relative to the grid.
    #[inline]
    pub fn slot(&self, channel: u32, lane: u32) -> usize {
        let row = channel * self.raking_units + lane / self.row_len;
        (row * self.row_stride + lane % self.row_len) as usize
    }

    /// Words of the row raked by `raking_unit` for `channel`, relative to the grid.
    #[inline]
    pub fn row(&self, channel: u32, raking_unit: u32) -> Range<usize> {
        let start = ((channel * self.raking_units + raking_unit) * self.row_stride) as usize;
        start..start + self.row_len as usize
    }

    fn words(&self, channels: u32) -> usize {
        (channels * self.raking_units * self.row_stride) as usize
    }
}

/// Shared memory layout of a raking scan tree.
///
/// - The primary grid holds one value per unit and channel.
/// - The secondary grid, present when there are more raking units than plane units, holds one
///   value per primary raking unit and channel, raked by a single plane.
/// - The carry scan region holds the values exchanged by the top plane scan, followed by the
///   running carry of each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedLayout {
    pub channels: u32,
    pub plane_dim: u32,
    pub primary: GridLevel,
    pub secondary: Option<GridLevel>,
    pub primary_grid: Region,
    pub secondary_grid: Option<Region>,
    pub carry_scan: Region,
}

impl SharedLayout {
    /// Size the raking tree scanning `channels` values per unit of a cube of `units` units.
    pub fn new(
        stage: Stage,
        units: u32,
        raking_units: u32,
        channels: u32,
        plane_dim: u32,
    ) -> Result<Self, ConfigError> {
        if units == 0 || channels == 0 || plane_dim == 0 {
            return Err(ConfigError::EmptyTile { stage });
        }
        if raking_units == 0 || raking_units > units || units % raking_units != 0 {
            return Err(ConfigError::RakingUnits {
                stage,
                raking_units,
                units,
            });
        }
        if raking_units > plane_dim && raking_units % plane_dim != 0 {
            return Err(ConfigError::RakingPlane {
                stage,
                raking_units,
                plane_dim,
            });
        }

        let primary = GridLevel::new(units, raking_units);
        let secondary =
            (raking_units > plane_dim).then(|| GridLevel::new(raking_units, plane_dim));

        let primary_grid = Region {
            offset: 0,
            len: primary.words(channels),
        };
        let secondary_grid = secondary.map(|level| Region {
            offset: primary_grid.offset + primary_grid.len,
            len: level.words(channels),
        });
        let last_grid = secondary_grid.unwrap_or(primary_grid);
        let top_lanes = secondary.map_or(raking_units, |level| level.raking_units);
        let carry_scan = Region {
            offset: last_grid.offset + last_grid.len,
            len: (channels * (top_lanes + 1)) as usize,
        };

        Ok(Self {
            channels,
            plane_dim,
            primary,
            secondary,
            primary_grid,
            secondary_grid,
            carry_scan,
        })
    }

    /// Number of raking levels, 1 or 2.
    pub fn depth(&self) -> u32 {
        1 + self.secondary.is_some() as u32
    }

    /// Number of values scanned by the top plane.
    pub fn top_lanes(&self) -> u32 {
        match &self.secondary {
            Some(level) => level.raking_units,
            None => self.primary.raking_units,
        }
    }

    /// Exchange slots of the top plane scan for `channel`.
    pub fn exchange(&self, channel: u32) -> Range<usize> {
        let top = self.top_lanes() as usize;
        let start = self.carry_scan.offset + channel as usize * top;
        start..start + top
    }

    /// Word holding the running carry of `channel`.
    pub fn carry(&self, channel: u32) -> usize {
        self.carry_scan.offset + (self.channels * self.top_lanes() + channel) as usize
    }

    pub fn size_words(&self) -> usize {
        self.carry_scan.offset + self.carry_scan.len
    }

    pub fn size_bytes(&self) -> usize {
        self.size_words() * size_of::<u32>()
    }

    /// The layout as compile-time parameters of the cube functions walking it.
    pub fn raking_params(&self) -> RakingParams {
        // Single level trees never read the secondary fields.
        let secondary = self.secondary.unwrap_or(GridLevel::new(1, 1));

        RakingParams {
            channels: self.channels,
            primary_raking_units: self.primary.raking_units,
            primary_row_len: self.primary.row_len,
            primary_row_stride: self.primary.row_stride,
            secondary: self.secondary.is_some(),
            secondary_offset: self.secondary_grid.map_or(0, |grid| grid.offset as u32),
            secondary_raking_units: secondary.raking_units,
            secondary_row_len: secondary.row_len,
            secondary_row_stride: secondary.row_stride,
            top_lanes: self.top_lanes(),
            exchange_offset: self.carry_scan.offset as u32,
            carry_offset: self.carry(0) as u32,
            size: self.size_words() as u32,
        }
    }
}

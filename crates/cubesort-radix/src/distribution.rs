use core::ops::Range;

use cubecl::prelude::*;

/// Split of the tiles of a problem across the cubes of a dispatch.
///
/// Every cube takes `tiles_per_cube` consecutive tiles and the first `extra_tiles` cubes take
/// one more, so only the last tile of the problem can be partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkDistribution {
    pub num_elements: u32,
    pub tile_size: u32,
    pub num_cubes: u32,
    pub tiles_per_cube: u32,
    pub extra_tiles: u32,
}

impl WorkDistribution {
    /// The cube count is bounded by `max_blocks`, by the number of tiles and by the number of
    /// cubes the device keeps resident at once.
    pub fn new(num_elements: u32, tile_size: u32, max_blocks: u32, occupancy: u32) -> Self {
        let total_tiles = num_elements.div_ceil(Ord::max(tile_size, 1));
        let num_cubes = Ord::max(Ord::min(Ord::min(max_blocks, occupancy), total_tiles), 1);

        Self {
            num_elements,
            tile_size,
            num_cubes,
            tiles_per_cube: total_tiles / num_cubes,
            extra_tiles: total_tiles % num_cubes,
        }
    }

    pub fn total_tiles(&self) -> u32 {
        self.tiles_per_cube * self.num_cubes + self.extra_tiles
    }

    /// Elements processed by the cube at `cube_pos`.
    pub fn segment(&self, cube_pos: u32) -> Range<usize> {
        let bound = |cube: u32| {
            let tiles = cube as usize * self.tiles_per_cube as usize
                + Ord::min(cube, self.extra_tiles) as usize;
            (tiles * self.tile_size as usize).min(self.num_elements as usize)
        };
        bound(cube_pos)..bound(cube_pos + 1)
    }
}

/// First element of the segment of `cube`, which is also the end of the previous segment.
///
/// Matches [WorkDistribution::segment] on the device.
#[cube]
pub fn segment_bound(
    cube: u32,
    num_elements: u32,
    tiles_per_cube: u32,
    extra_tiles: u32,
    #[comptime] tile_size: u32,
) -> u32 {
    let tiles = cube * tiles_per_cube + Min::min(cube, extra_tiles);
    Min::min(tiles * tile_size, num_elements)
}

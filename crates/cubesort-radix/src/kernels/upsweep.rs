use cubecl::prelude::*;

use crate::{
    RakingParams, TileParams, carry_slot, clear_unit_slots, key_digit, primary_slot,
    raking_reduce, segment_bound, unit_element,
};

/// Digit histogram of the segment of each cube, written digit-major to the spine at
/// `digit * num_cubes + cube`.
///
/// Every unit counts the digits of the elements it owns in its own primary slots, the raking
/// tree then sums the slots of each digit.
#[cube(launch)]
pub(crate) fn radix_upsweep(
    keys: &Array<u32>,
    spine: &mut Array<u32>,
    num_elements: u32,
    num_cubes: u32,
    tiles_per_cube: u32,
    extra_tiles: u32,
    bit_offset: u32,
    digit_mask: u32,
    #[comptime] tile: TileParams,
    #[comptime] raking: RakingParams,
) {
    if CUBE_POS >= num_cubes {
        terminate!();
    }

    let mut smem = SharedMemory::<u32>::new(raking.size);
    clear_unit_slots(&mut smem, raking);

    let start = segment_bound(CUBE_POS, num_elements, tiles_per_cube, extra_tiles, tile.tile_size);
    let end = segment_bound(
        CUBE_POS + 1,
        num_elements,
        tiles_per_cube,
        extra_tiles,
        tile.tile_size,
    );

    let mut offset = start;
    while offset < end {
        #[unroll]
        for item in 0..tile.line_size {
            let index = unit_element(offset, item, tile.line_size);
            if index < end {
                let digit = key_digit(keys, index, bit_offset, digit_mask, tile.key_words);
                smem[primary_slot(digit, UNIT_POS, raking)] += 1;
            }
        }
        offset += tile.load_size;
    }

    raking_reduce(&mut smem, raking);

    let mut channel = UNIT_POS;
    while channel < raking.channels {
        spine[channel * num_cubes + CUBE_POS] = smem[carry_slot(channel, raking)];
        channel += CUBE_DIM;
    }
}

use cubecl::prelude::*;

use crate::{
    RakingParams, TileParams, carry_slot, clear_unit_slots, copy_element, key_digit,
    primary_slot, raking_exclusive_scan, segment_bound, unit_element,
};

/// Stable scatter of the segment of each cube, guided by the scanned spine.
///
/// The carry of each digit starts at the spine offset of the cube. Every load, units count
/// their digits, the raking tree turns the counts into write positions, and each unit scatters
/// its elements in order. Values are moved along when `tile.value_words` isn't zero.
#[cube(launch)]
pub(crate) fn radix_downsweep(
    keys_in: &Array<u32>,
    keys_out: &mut Array<u32>,
    spine: &Array<u32>,
    values_in: &Array<u32>,
    values_out: &mut Array<u32>,
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
    let mut channel = UNIT_POS;
    while channel < raking.channels {
        smem[carry_slot(channel, raking)] = spine[channel * num_cubes + CUBE_POS];
        channel += CUBE_DIM;
    }

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
        clear_unit_slots(&mut smem, raking);
        #[unroll]
        for item in 0..tile.line_size {
            let index = unit_element(offset, item, tile.line_size);
            if index < end {
                let digit = key_digit(keys_in, index, bit_offset, digit_mask, tile.key_words);
                smem[primary_slot(digit, UNIT_POS, raking)] += 1;
            }
        }

        raking_exclusive_scan(&mut smem, raking);

        #[unroll]
        for item in 0..tile.line_size {
            let index = unit_element(offset, item, tile.line_size);
            if index < end {
                let digit = key_digit(keys_in, index, bit_offset, digit_mask, tile.key_words);
                let slot = primary_slot(digit, UNIT_POS, raking);
                let position = smem[slot];
                smem[slot] = position + 1;

                copy_element(keys_in, keys_out, index, position, tile.key_words);
                copy_element(values_in, values_out, index, position, tile.value_words);
            }
        }
        offset += tile.load_size;
    }
}

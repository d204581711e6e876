use cubecl::prelude::*;

use crate::{
    RakingParams, TileParams, carry_slot, load_guarded, primary_slot, raking_exclusive_scan,
    store_guarded, unit_element,
};

/// In-place exclusive scan of the first `len` entries of the spine, by a single cube.
///
/// The spine is walked one load at a time; the carry of the raking tree chains the loads.
#[cube(launch)]
pub(crate) fn radix_spine_scan(
    spine: &mut Array<u32>,
    len: u32,
    #[comptime] tile: TileParams,
    #[comptime] raking: RakingParams,
) {
    let mut smem = SharedMemory::<u32>::new(raking.size);
    if UNIT_POS == 0 {
        smem[carry_slot(0, raking)] = 0;
    }

    let mut offset = 0u32;
    while offset < len {
        let mut total = 0u32;
        #[unroll]
        for item in 0..tile.line_size {
            total += load_guarded(spine, unit_element(offset, item, tile.line_size), len, 0u32);
        }
        smem[primary_slot(0, UNIT_POS, raking)] = total;

        raking_exclusive_scan(&mut smem, raking);

        let mut running = smem[primary_slot(0, UNIT_POS, raking)];
        #[unroll]
        for item in 0..tile.line_size {
            let index = unit_element(offset, item, tile.line_size);
            let count = load_guarded(spine, index, len, 0u32);
            store_guarded(spine, index, len, running);
            running += count;
        }
        offset += tile.load_size;
    }
}

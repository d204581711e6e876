//! Cube-wide multi-channel exclusive scan over shared memory.
//!
//! Every unit owns one slot per channel in the primary grid. Raking units sum the rows of the
//! grid, a second grid is raked when there are more primary rows than plane lanes, and one plane
//! per channel scans the top level, adding the running carry of the channel. The prefixes are
//! then raked back down to the slots.

use cubecl::prelude::*;

/// Shape of a raking tree, fixed when the kernel is compiled.
///
/// Offsets and sizes are in words of a `SharedMemory<u32>`; the primary grid starts at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RakingParams {
    pub channels: u32,
    pub primary_raking_units: u32,
    pub primary_row_len: u32,
    pub primary_row_stride: u32,
    /// Whether the tree has a secondary grid.
    pub secondary: bool,
    pub secondary_offset: u32,
    pub secondary_raking_units: u32,
    pub secondary_row_len: u32,
    pub secondary_row_stride: u32,
    /// Values of a channel scanned by the top plane.
    pub top_lanes: u32,
    pub exchange_offset: u32,
    pub carry_offset: u32,
    pub size: u32,
}

/// Word of the primary grid owned by `unit` for `channel`.
#[cube]
pub fn primary_slot(channel: u32, unit: u32, #[comptime] params: RakingParams) -> u32 {
    let row = channel * params.primary_raking_units + unit / params.primary_row_len;
    row * params.primary_row_stride + unit % params.primary_row_len
}

/// Word holding the running carry of `channel`.
#[cube]
pub fn carry_slot(channel: u32, #[comptime] params: RakingParams) -> u32 {
    params.carry_offset + channel
}

/// Zero the primary slots of the calling unit, for every channel.
#[cube]
pub fn clear_unit_slots(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    for channel in 0..params.channels {
        smem[primary_slot(channel, UNIT_POS, params)] = 0;
    }
}

/// Replace every primary slot by the sum of the slots of lower units of the same channel, plus
/// the carry of the channel. The carry of each channel then grows by the channel total.
///
/// Every unit of the cube must call this function.
#[cube]
pub fn raking_exclusive_scan(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    rake_up(smem, params);

    scan_top(smem, params);
    sync_cube();

    if comptime!(params.secondary) {
        rake_secondary_down(smem, params);
        sync_cube();
    }
    rake_primary_down(smem, params);
    sync_cube();
}

/// Write the total of every channel in its carry slot. The primary slots are left as is.
///
/// Every unit of the cube must call this function.
#[cube]
pub fn raking_reduce(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    rake_up(smem, params);

    let lane = UNIT_POS_PLANE;
    let num_planes = (CUBE_DIM + PLANE_DIM - 1) / PLANE_DIM;
    let active = lane < params.top_lanes;

    let mut channel = UNIT_POS / PLANE_DIM;
    while channel < params.channels {
        let slot = top_slot(channel, select(active, lane, 0u32), params);
        let value = select(active, smem[slot], 0u32);
        let total = plane_sum(value);

        if lane == 0 {
            smem[carry_slot(channel, params)] = total;
        }
        channel += num_planes;
    }
    sync_cube();
}

#[cube]
fn rake_up(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    sync_cube();
    rake_primary_up(smem, params);
    sync_cube();

    if comptime!(params.secondary) {
        rake_secondary_up(smem, params);
        sync_cube();
    }
}

#[cube]
fn top_slot(channel: u32, lane: u32, #[comptime] params: RakingParams) -> u32 {
    params.exchange_offset + channel * params.top_lanes + lane
}

/// Word receiving the total of the primary `row`.
#[cube]
fn primary_row_target(row: u32, #[comptime] params: RakingParams) -> u32 {
    let channel = row / params.primary_raking_units;
    let raking_unit = row % params.primary_raking_units;

    if comptime!(params.secondary) {
        let secondary_row =
            channel * params.secondary_raking_units + raking_unit / params.secondary_row_len;
        params.secondary_offset
            + secondary_row * params.secondary_row_stride
            + raking_unit % params.secondary_row_len
    } else {
        top_slot(channel, raking_unit, params)
    }
}

/// Word receiving the total of the secondary `row`.
#[cube]
fn secondary_row_target(row: u32, #[comptime] params: RakingParams) -> u32 {
    let channel = row / params.secondary_raking_units;
    top_slot(channel, row % params.secondary_raking_units, params)
}

#[cube]
fn rake_primary_up(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    let rows = comptime!(params.channels * params.primary_raking_units);

    let mut row = UNIT_POS;
    while row < rows {
        let start = row * params.primary_row_stride;
        let mut total = 0u32;
        for i in 0..params.primary_row_len {
            total += smem[start + i];
        }
        smem[primary_row_target(row, params)] = total;
        row += CUBE_DIM;
    }
}

#[cube]
fn rake_secondary_up(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    let rows = comptime!(params.channels * params.secondary_raking_units);

    let mut row = UNIT_POS;
    while row < rows {
        let start = params.secondary_offset + row * params.secondary_row_stride;
        let mut total = 0u32;
        for i in 0..params.secondary_row_len {
            total += smem[start + i];
        }
        smem[secondary_row_target(row, params)] = total;
        row += CUBE_DIM;
    }
}

/// One plane per channel scans the exchange slots and adds the carry.
///
/// All reads of a channel happen before the plane collectives, all writes after them.
#[cube]
fn scan_top(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    let lane = UNIT_POS_PLANE;
    let num_planes = (CUBE_DIM + PLANE_DIM - 1) / PLANE_DIM;
    let active = lane < params.top_lanes;

    let mut channel = UNIT_POS / PLANE_DIM;
    while channel < params.channels {
        let slot = top_slot(channel, select(active, lane, 0u32), params);
        let value = select(active, smem[slot], 0u32);
        let carry = smem[carry_slot(channel, params)];

        let prefix = plane_exclusive_sum(value);
        let total = plane_sum(value);

        if active {
            smem[slot] = carry + prefix;
        }
        if lane == 0 {
            smem[carry_slot(channel, params)] = carry + total;
        }
        channel += num_planes;
    }
}

#[cube]
fn rake_secondary_down(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    let rows = comptime!(params.channels * params.secondary_raking_units);

    let mut row = UNIT_POS;
    while row < rows {
        let start = params.secondary_offset + row * params.secondary_row_stride;
        let mut running = smem[secondary_row_target(row, params)];
        for i in 0..params.secondary_row_len {
            let value = smem[start + i];
            smem[start + i] = running;
            running += value;
        }
        row += CUBE_DIM;
    }
}

#[cube]
fn rake_primary_down(smem: &mut SharedMemory<u32>, #[comptime] params: RakingParams) {
    let rows = comptime!(params.channels * params.primary_raking_units);

    let mut row = UNIT_POS;
    while row < rows {
        let start = row * params.primary_row_stride;
        let mut running = smem[primary_row_target(row, params)];
        for i in 0..params.primary_row_len {
            let value = smem[start + i];
            smem[start + i] = running;
            running += value;
        }
        row += CUBE_DIM;
    }
}

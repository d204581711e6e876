//! Guarded transfers between global memory and the units of a cube.
//!
//! In each load, unit `u` owns the `line_size` consecutive elements starting at
//! `offset + u * line_size`. Elements at or past the guard are never read from memory.

use cubecl::prelude::*;

use crate::{StageConfig, WordLayout};

/// Shape of the loads of a kernel, fixed when it is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileParams {
    pub line_size: u32,
    pub load_size: u32,
    pub tile_size: u32,
    /// 32-bit words of a key.
    pub key_words: u32,
    /// 32-bit words of a value, zero when the keys are sorted alone.
    pub value_words: u32,
}

impl TileParams {
    pub fn new(stage: &StageConfig, words: WordLayout) -> Self {
        Self {
            line_size: stage.shape.line_size,
            load_size: stage.shape.load_size,
            tile_size: stage.shape.tile_size,
            key_words: words.key_words,
            value_words: words.value_words,
        }
    }
}

/// Index of the `item`-th element owned by the calling unit in the load starting at `offset`.
#[cube]
pub fn unit_element(offset: u32, item: u32, #[comptime] line_size: u32) -> u32 {
    offset + UNIT_POS * line_size + item
}

/// `array[index]`, or `fill` when `index` is at or past `guard`.
#[cube]
pub fn load_guarded(array: &Array<u32>, index: u32, guard: u32, fill: u32) -> u32 {
    let in_bounds = index < guard;
    let value = array[select(in_bounds, index, 0u32)];
    select(in_bounds, value, fill)
}

/// Write `value` at `index` unless `index` is at or past `guard`.
#[cube]
pub fn store_guarded(array: &mut Array<u32>, index: u32, guard: u32, value: u32) {
    if index < guard {
        array[index] = value;
    }
}

/// Move the element at `from` in `input` to `to` in `output`, for elements of `words` words.
#[cube]
pub fn copy_element(
    input: &Array<u32>,
    output: &mut Array<u32>,
    from: u32,
    to: u32,
    #[comptime] words: u32,
) {
    #[unroll]
    for word in 0..words {
        output[to * words + word] = input[from * words + word];
    }
}

/// Digit of the key at `index`, starting at `bit_offset`.
///
/// Keys of two words store their low word first.
#[cube]
pub fn key_digit(
    keys: &Array<u32>,
    index: u32,
    bit_offset: u32,
    digit_mask: u32,
    #[comptime] key_words: u32,
) -> u32 {
    let mut digit = 0u32;

    if comptime!(key_words == 1) {
        digit = (keys[index] >> bit_offset) & digit_mask;
    } else {
        let low = keys[index * 2];
        let high = keys[index * 2 + 1];

        if bit_offset >= 32 {
            digit = (high >> (bit_offset - 32)) & digit_mask;
        } else {
            // The digit may straddle both words.
            let spill = high << ((32 - bit_offset) % 32);
            digit = ((low >> bit_offset) | select(bit_offset == 0, 0u32, spill)) & digit_mask;
        }
    }

    digit
}

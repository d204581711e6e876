use cubecl::{prelude::*, server::Handle};

use crate::{
    ConfigError, DeviceLimits, RadixBits, RadixConfig, RadixSortError, Stage, TileParams,
    WorkDistribution,
    kernels::{radix_downsweep, radix_spine_scan, radix_upsweep},
};

/// Device words of one key and one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct WordLayout {
    pub key_words: u32,
    /// Zero when the keys are sorted alone.
    pub value_words: u32,
}

impl WordLayout {
    /// Keys of `B` moved alone.
    pub fn keys<B: RadixBits>() -> Self {
        Self::new(B::WORDS, 0)
    }

    /// Keys of `B` moved along values of `V`, each value padded to whole words.
    pub fn pairs<B: RadixBits, V>() -> Self {
        Self::new(B::WORDS, value_words::<V>())
    }
}

/// Words holding one value of `V` on the device.
pub fn value_words<V>() -> u32 {
    size_of::<V>().div_ceil(size_of::<u32>()) as u32
}

/// A pair of ping-pong buffers of 32-bit words.
#[derive(Debug, new)]
pub struct SortBuffers {
    pub first: Handle,
    pub second: Handle,
    /// Words held by each buffer.
    pub len: usize,
}

impl SortBuffers {
    /// Two buffers of `data.len()` words, the first one holding `data`.
    pub fn from_words<R: Runtime>(
        client: &ComputeClient<R::Server, R::Channel>,
        data: &[u32],
    ) -> Self {
        Self::new(
            client.create(u32::as_bytes(data)),
            client.empty(size_of_val(data)),
            data.len(),
        )
    }

    /// Read the first `len` words of one buffer back.
    pub fn read<R: Runtime>(
        &self,
        client: &ComputeClient<R::Server, R::Channel>,
        index: BufferIndex,
        len: usize,
    ) -> Vec<u32> {
        let bytes = client.read_one(index.select(self).clone().binding());
        let mut words = bytemuck::pod_collect_to_vec::<u8, u32>(&bytes);
        words.truncate(len);
        words
    }

    fn check(&self, name: &'static str, required: usize) -> Result<(), ConfigError> {
        if self.len < required {
            return Err(ConfigError::BufferTooSmall {
                name,
                len: self.len,
                required,
            });
        }
        Ok(())
    }
}

/// Which buffer of a [SortBuffers] pair holds the sorted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferIndex {
    First,
    Second,
}

impl BufferIndex {
    /// Every pass reads one buffer and writes the other.
    pub fn after_passes(passes: u32) -> Self {
        match passes % 2 {
            0 => BufferIndex::First,
            _ => BufferIndex::Second,
        }
    }

    pub fn select<'a>(&self, buffers: &'a SortBuffers) -> &'a Handle {
        match self {
            BufferIndex::First => &buffers.first,
            BufferIndex::Second => &buffers.second,
        }
    }
}

/// Size of a sort problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct SortProblem {
    /// Elements to sort, at the start of the buffers.
    pub num_elements: usize,
    /// Low bits of the keys taking part in the order. Bits above are ignored, and keys equal
    /// on the low bits keep their input order.
    pub key_bits: u32,
    /// Upper bound on the number of cubes of a dispatch. The spine is sized from it.
    pub max_blocks: u32,
}

impl SortProblem {
    fn validate<B: RadixBits>(
        &self,
        config: &RadixConfig,
        words: WordLayout,
    ) -> Result<(), ConfigError> {
        if self.key_bits == 0 || self.key_bits > B::BITS {
            return Err(ConfigError::KeyBits {
                key_bits: self.key_bits,
                max: B::BITS,
            });
        }

        let max_blocks = u32::MAX / config.bins();
        if self.max_blocks == 0 || self.max_blocks > max_blocks {
            return Err(ConfigError::MaxBlocks {
                max_blocks: self.max_blocks,
                max: max_blocks,
            });
        }

        // Segment bounds round up to whole tiles and element words are addressed with u32.
        let tile_size = config.tile_size()? as usize;
        let widest = Ord::max(Ord::max(words.key_words, words.value_words), 1) as usize;
        let addressable = (u32::MAX as usize - tile_size) / widest;
        if self.num_elements > addressable {
            return Err(ConfigError::TooManyElements(self.num_elements));
        }
        Ok(())
    }
}

/// One digit place of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct RadixPass {
    pub distribution: WorkDistribution,
    /// Lowest bit of the digit sorted by the pass.
    pub bit_offset: u32,
    /// Mask of the digit, narrower than the bins on the last pass of a partial key width.
    pub digit_mask: u32,
}

impl RadixPass {
    /// Pass `index` of a sort of the low `key_bits` bits.
    pub fn at(
        config: &RadixConfig,
        distribution: WorkDistribution,
        index: u32,
        key_bits: u32,
    ) -> Self {
        let bit_offset = index * config.log_bins;
        Self::new(
            distribution,
            bit_offset,
            config.pass_mask(bit_offset, key_bits),
        )
    }

    /// Entries of the spine used by the pass.
    pub fn spine_len(&self, config: &RadixConfig) -> usize {
        config.bins() as usize * self.distribution.num_cubes as usize
    }
}

/// Sort the first `problem.num_elements` keys of `keys`, moving `values` along.
///
/// The keys start in `keys.first`, the values in `values.first`; both buffers of a pair are
/// written. Values of `V` occupy [value_words] words each. Returns the buffer holding the sorted
/// data, which is the same for keys and values.
pub fn radix_sort<R: Runtime, B: RadixBits, V>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &SortBuffers,
    values: Option<&SortBuffers>,
    problem: SortProblem,
    config: &RadixConfig,
) -> Result<BufferIndex, RadixSortError> {
    let limits = DeviceLimits::from_client::<R>(client);
    config.validate(&limits)?;

    let words = match values {
        Some(_) => WordLayout::pairs::<B, V>(),
        None => WordLayout::keys::<B>(),
    };
    problem.validate::<B>(config, words)?;

    keys.check("keys", problem.num_elements * words.key_words as usize)?;
    if let Some(values) = values {
        values.check("values", problem.num_elements * words.value_words as usize)?;
    }

    let passes = config.passes(problem.key_bits);
    let result = BufferIndex::after_passes(passes);
    if problem.num_elements == 0 {
        return Ok(result);
    }

    let distribution = WorkDistribution::new(
        problem.num_elements as u32,
        config.tile_size()?,
        problem.max_blocks,
        limits.occupancy,
    );
    // `num_cubes` never exceeds `max_blocks`, every pass uses the same spine entries.
    let spine_len = config.bins() as usize * distribution.num_cubes as usize;
    let spine = client.empty(spine_len * size_of::<u32>());

    for pass_index in 0..passes {
        let pass = RadixPass::at(config, distribution, pass_index, problem.key_bits);
        log::debug!(
            "Radix pass {}/{passes}: bits {}..{} of {} elements over {} cubes",
            pass_index + 1,
            pass.bit_offset,
            Ord::min(pass.bit_offset + config.log_bins, problem.key_bits),
            problem.num_elements,
            distribution.num_cubes,
        );

        let (keys_in, keys_out) = ping_pong(keys, pass_index);
        let values_pair = values.map(|values| ping_pong(values, pass_index));

        launch_upsweep::<R>(client, keys_in, &spine, &pass, words, config)?;
        launch_spine_scan::<R>(client, &spine, pass.spine_len(config), config)?;
        launch_downsweep::<R>(
            client,
            (keys_in, keys_out),
            &spine,
            values_pair,
            &pass,
            words,
            config,
        )?;
    }

    Ok(result)
}

/// Sort the first `problem.num_elements` keys of `keys`, without values.
pub fn radix_sort_keys<R: Runtime, B: RadixBits>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &SortBuffers,
    problem: SortProblem,
    config: &RadixConfig,
) -> Result<BufferIndex, RadixSortError> {
    radix_sort::<R, B, ()>(client, keys, None, problem, config)
}

/// Write the digit histogram of every cube of `pass` in `spine`.
pub fn launch_upsweep<R: Runtime>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &Handle,
    spine: &Handle,
    pass: &RadixPass,
    words: WordLayout,
    config: &RadixConfig,
) -> Result<(), RadixSortError> {
    let limits = DeviceLimits::from_client::<R>(client);
    let stage = config.stage(Stage::Upsweep, &limits)?;
    let distribution = pass.distribution;
    let keys_len = distribution.num_elements as usize * words.key_words as usize;

    unsafe {
        radix_upsweep::launch::<R>(
            client,
            CubeCount::Static(distribution.num_cubes, 1, 1),
            stage.tile.cube_dim,
            ArrayArg::from_raw_parts::<u32>(keys, keys_len.max(1), 1),
            ArrayArg::from_raw_parts::<u32>(spine, pass.spine_len(config), 1),
            ScalarArg::new(distribution.num_elements),
            ScalarArg::new(distribution.num_cubes),
            ScalarArg::new(distribution.tiles_per_cube),
            ScalarArg::new(distribution.extra_tiles),
            ScalarArg::new(pass.bit_offset),
            ScalarArg::new(pass.digit_mask),
            TileParams::new(&stage, words),
            stage.layout.raking_params(),
        );
    }
    Ok(())
}

/// Exclusive scan of the first `len` entries of `spine`, in place.
pub fn launch_spine_scan<R: Runtime>(
    client: &ComputeClient<R::Server, R::Channel>,
    spine: &Handle,
    len: usize,
    config: &RadixConfig,
) -> Result<(), RadixSortError> {
    let limits = DeviceLimits::from_client::<R>(client);
    let stage = config.stage(Stage::Spine, &limits)?;
    if len > u32::MAX as usize {
        return Err(ConfigError::TooManyElements(len).into());
    }

    unsafe {
        radix_spine_scan::launch::<R>(
            client,
            CubeCount::Static(1, 1, 1),
            stage.tile.cube_dim,
            ArrayArg::from_raw_parts::<u32>(spine, len.max(1), 1),
            ScalarArg::new(len as u32),
            TileParams::new(&stage, WordLayout::new(1, 0)),
            stage.layout.raking_params(),
        );
    }
    Ok(())
}

/// Scatter the keys, and the values when given, of every cube of `pass`.
///
/// `keys` and `values` are (input, output) pairs.
pub fn launch_downsweep<R: Runtime>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: (&Handle, &Handle),
    spine: &Handle,
    values: Option<(&Handle, &Handle)>,
    pass: &RadixPass,
    words: WordLayout,
    config: &RadixConfig,
) -> Result<(), RadixSortError> {
    let limits = DeviceLimits::from_client::<R>(client);
    let stage = config.stage(Stage::Downsweep, &limits)?;
    let distribution = pass.distribution;
    let num_elements = distribution.num_elements as usize;
    let keys_len = (num_elements * words.key_words as usize).max(1);

    // Keys sorted alone still bind a value pair, never indexed with zero value words.
    let placeholders;
    let (values_in, values_out, words, values_len) = match values {
        Some((values_in, values_out)) => (
            values_in,
            values_out,
            words,
            (num_elements * words.value_words as usize).max(1),
        ),
        None => {
            placeholders = [client.empty(size_of::<u32>()), client.empty(size_of::<u32>())];
            (
                &placeholders[0],
                &placeholders[1],
                WordLayout::new(words.key_words, 0),
                1,
            )
        }
    };

    unsafe {
        radix_downsweep::launch::<R>(
            client,
            CubeCount::Static(distribution.num_cubes, 1, 1),
            stage.tile.cube_dim,
            ArrayArg::from_raw_parts::<u32>(keys.0, keys_len, 1),
            ArrayArg::from_raw_parts::<u32>(keys.1, keys_len, 1),
            ArrayArg::from_raw_parts::<u32>(spine, pass.spine_len(config), 1),
            ArrayArg::from_raw_parts::<u32>(values_in, values_len, 1),
            ArrayArg::from_raw_parts::<u32>(values_out, values_len, 1),
            ScalarArg::new(distribution.num_elements),
            ScalarArg::new(distribution.num_cubes),
            ScalarArg::new(distribution.tiles_per_cube),
            ScalarArg::new(distribution.extra_tiles),
            ScalarArg::new(pass.bit_offset),
            ScalarArg::new(pass.digit_mask),
            TileParams::new(&stage, words),
            stage.layout.raking_params(),
        );
    }
    Ok(())
}

fn ping_pong(buffers: &SortBuffers, pass: u32) -> (&Handle, &Handle) {
    match pass % 2 {
        0 => (&buffers.first, &buffers.second),
        _ => (&buffers.second, &buffers.first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheHint, TileConfig};

    fn config(log_bins: u32) -> RadixConfig {
        let tile = TileConfig::new(CubeDim::new_2d(32, 4), 4, 2, 32, CacheHint::Cached);
        RadixConfig::new(log_bins, tile, tile, tile)
    }

    #[test_log::test]
    fn result_buffer_follows_the_pass_parity() {
        assert_eq!(BufferIndex::after_passes(0), BufferIndex::First);
        assert_eq!(BufferIndex::after_passes(3), BufferIndex::Second);
        assert_eq!(BufferIndex::after_passes(8), BufferIndex::First);
    }

    #[test_log::test]
    fn values_are_padded_to_whole_words() {
        assert_eq!(WordLayout::keys::<u16>(), WordLayout::new(1, 0));
        assert_eq!(WordLayout::pairs::<u64, u8>(), WordLayout::new(2, 1));
        assert_eq!(WordLayout::pairs::<u32, [u8; 5]>(), WordLayout::new(1, 2));
        assert_eq!(WordLayout::pairs::<u32, f64>(), WordLayout::new(1, 2));
    }

    #[test_log::test]
    fn passes_narrow_the_last_digit() {
        let config = config(4);
        let distribution = WorkDistribution::new(2, 1024, 4, 4);

        let masks = (0..config.passes(10))
            .map(|index| RadixPass::at(&config, distribution, index, 10).digit_mask)
            .collect::<Vec<_>>();

        assert_eq!(masks, vec![0xF, 0xF, 0x3]);
        assert_eq!(RadixPass::at(&config, distribution, 2, 10).bit_offset, 8);
    }

    #[test_log::test]
    fn problems_are_checked_against_the_key_width() {
        let config = config(4);
        let words = WordLayout::keys::<u32>();

        assert!(
            SortProblem::new(10, 16, 4)
                .validate::<u16>(&config, words)
                .is_ok()
        );
        assert!(matches!(
            SortProblem::new(10, 17, 4).validate::<u16>(&config, words),
            Err(ConfigError::KeyBits { key_bits: 17, max: 16 })
        ));
        assert!(matches!(
            SortProblem::new(10, 0, 4).validate::<u32>(&config, words),
            Err(ConfigError::KeyBits { .. })
        ));
    }

    #[test_log::test]
    fn problems_are_checked_against_the_block_range() {
        let config = config(4);
        let words = WordLayout::keys::<u32>();

        assert_eq!(
            SortProblem::new(10, 32, 0).validate::<u32>(&config, words),
            Err(ConfigError::MaxBlocks {
                max_blocks: 0,
                max: u32::MAX / 16
            })
        );
        assert!(matches!(
            SortProblem::new(10, 32, u32::MAX).validate::<u32>(&config, words),
            Err(ConfigError::MaxBlocks { .. })
        ));
    }

    #[test_log::test]
    fn problems_stay_within_32_bit_offsets() {
        let config = config(4);
        let limit = u32::MAX as usize - 1024;
        let words = WordLayout::keys::<u32>();

        assert!(
            SortProblem::new(limit, 32, 4)
                .validate::<u32>(&config, words)
                .is_ok()
        );
        assert_eq!(
            SortProblem::new(limit + 1, 32, 4).validate::<u32>(&config, words),
            Err(ConfigError::TooManyElements(limit + 1))
        );
        assert_eq!(
            SortProblem::new(limit / 2 + 1, 64, 4)
                .validate::<u64>(&config, WordLayout::keys::<u64>()),
            Err(ConfigError::TooManyElements(limit / 2 + 1))
        );
    }
}

use bytemuck::Pod;
use cubecl::prelude::*;

use crate::{
    BufferIndex, ConfigError, DeviceLimits, RadixBits, RadixKey, RadixSortError, RadixStrategy,
    SortBuffers, SortOrder, SortProblem, radix_sort, radix_sort_keys, value_words,
};

/// Sort `keys` in place.
pub fn sort_keys<R: Runtime, K: RadixKey>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &mut [K],
    order: SortOrder,
    strategy: &RadixStrategy,
) -> Result<(), RadixSortError> {
    let limits = DeviceLimits::from_client::<R>(client);
    let config = strategy.config(&limits)?;
    if keys.is_empty() {
        return Ok(());
    }

    let buffers = upload_keys::<R, K>(client, keys, order);
    let problem = problem::<K>(keys.len(), &limits);
    let result = radix_sort_keys::<R, K::Bits>(client, &buffers, problem, &config)?;

    download_keys::<R, K>(client, &buffers, result, keys, order);
    Ok(())
}

/// Sort `keys` in place, applying the same permutation to `values`.
///
/// The sort is stable: values of equal keys keep their relative order.
pub fn sort_pairs<R: Runtime, K: RadixKey, V: Pod>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &mut [K],
    values: &mut [V],
    order: SortOrder,
    strategy: &RadixStrategy,
) -> Result<(), RadixSortError> {
    if keys.len() != values.len() {
        return Err(RadixSortError::LengthMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }
    if value_words::<V>() == 0 {
        return sort_keys::<R, K>(client, keys, order, strategy);
    }

    let limits = DeviceLimits::from_client::<R>(client);
    let config = strategy.config(&limits)?;
    if keys.is_empty() {
        return Ok(());
    }

    let key_buffers = upload_keys::<R, K>(client, keys, order);
    let value_buffers = SortBuffers::from_words::<R>(client, &pack_values(values));
    let problem = problem::<K>(keys.len(), &limits);
    let result = radix_sort::<R, K::Bits, V>(
        client,
        &key_buffers,
        Some(&value_buffers),
        problem,
        &config,
    )?;

    download_keys::<R, K>(client, &key_buffers, result, keys, order);
    let words = value_buffers.read::<R>(client, result, value_buffers.len);
    unpack_values(&words, values);
    Ok(())
}

/// Indices that stably sort `keys`.
pub fn argsort<R: Runtime, K: RadixKey>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &[K],
    order: SortOrder,
    strategy: &RadixStrategy,
) -> Result<Vec<u32>, RadixSortError> {
    if keys.len() > u32::MAX as usize {
        return Err(ConfigError::TooManyElements(keys.len()).into());
    }

    let mut keys = keys.to_vec();
    let mut indices = (0..keys.len() as u32).collect::<Vec<_>>();

    sort_pairs::<R, K, u32>(client, &mut keys, &mut indices, order, strategy)?;

    Ok(indices)
}

fn problem<K: RadixKey>(num_elements: usize, limits: &DeviceLimits) -> SortProblem {
    SortProblem::new(num_elements, <K::Bits as RadixBits>::BITS, limits.occupancy)
}

fn upload_keys<R: Runtime, K: RadixKey>(
    client: &ComputeClient<R::Server, R::Channel>,
    keys: &[K],
    order: SortOrder,
) -> SortBuffers {
    let mut words = Vec::with_capacity(keys.len() * <K::Bits as RadixBits>::WORDS as usize);
    for key in keys {
        order.encode(*key).push_words(&mut words);
    }

    SortBuffers::from_words::<R>(client, &words)
}

fn download_keys<R: Runtime, K: RadixKey>(
    client: &ComputeClient<R::Server, R::Channel>,
    buffers: &SortBuffers,
    result: BufferIndex,
    keys: &mut [K],
    order: SortOrder,
) {
    let words = buffers.read::<R>(client, result, buffers.len);
    let key_words = <K::Bits as RadixBits>::WORDS as usize;

    for (key, words) in keys.iter_mut().zip(words.chunks_exact(key_words)) {
        *key = order.decode(K::Bits::from_words(words));
    }
}

/// Values laid out as whole words, zero padded.
fn pack_values<V: Pod>(values: &[V]) -> Vec<u32> {
    let value_size = size_of::<V>();
    let stride = value_words::<V>() as usize * size_of::<u32>();

    let mut words = vec![0u32; values.len() * stride / size_of::<u32>()];
    let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
    for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(stride)) {
        chunk[..value_size].copy_from_slice(bytemuck::bytes_of(value));
    }
    words
}

fn unpack_values<V: Pod>(words: &[u32], values: &mut [V]) {
    let value_size = size_of::<V>();
    let stride = value_words::<V>() as usize * size_of::<u32>();

    let bytes: &[u8] = bytemuck::cast_slice(words);
    for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(stride)) {
        *value = bytemuck::pod_read_unaligned(&chunk[..value_size]);
    }
}

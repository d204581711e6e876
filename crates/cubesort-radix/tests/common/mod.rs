#![allow(dead_code)]

use cubecl::{prelude::*, server::Handle};
use cubesort_radix::{CacheHint, DeviceLimits, RadixConfig, TileConfig};
use rand::{Rng, SeedableRng, rngs::StdRng};

pub type TestRuntime = cubecl::wgpu::WgpuRuntime;
pub type TestClient =
    ComputeClient<<TestRuntime as Runtime>::Server, <TestRuntime as Runtime>::Channel>;

/// The default device, or `None` when it can't run plane operations.
pub fn test_client() -> Option<(TestClient, DeviceLimits)> {
    let client = TestRuntime::client(&Default::default());
    let limits = DeviceLimits::from_client::<TestRuntime>(&client);
    limits.planes.then_some((client, limits))
}

pub fn upload(client: &TestClient, words: &[u32]) -> Handle {
    client.create(u32::as_bytes(words))
}

pub fn read(client: &TestClient, handle: &Handle) -> Vec<u32> {
    let bytes = client.read_one(handle.clone().binding());
    u32::from_bytes(&bytes).to_vec()
}

/// Cubes of `planes` planes of 32 units, raked by one plane.
pub fn tile(planes: u32, line_size: u32, loads_per_tile: u32) -> TileConfig {
    TileConfig::new(
        CubeDim::new_2d(32, planes),
        line_size,
        loads_per_tile,
        32,
        CacheHint::Cached,
    )
}

/// Tiles of 256 elements: two planes owning four elements each.
pub fn config_256(log_bins: u32) -> RadixConfig {
    RadixConfig::new(log_bins, tile(2, 4, 1), tile(2, 4, 1), tile(2, 4, 1))
}

pub fn random_u32(len: usize, max: u32, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0..max)).collect()
}

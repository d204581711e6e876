use cubecl::{Feature, prelude::*};

/// Cubes each streaming multiprocessor keeps resident.
const CUBES_PER_SM: u32 = 4;
/// Resident cubes assumed when the device doesn't report its multiprocessors.
const DEFAULT_OCCUPANCY: u32 = 256;
/// Cubes of a one dimensional dispatch.
const MAX_CUBES: u32 = u16::MAX as u32;

/// Limits of the device a sort runs on, read once from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct DeviceLimits {
    /// Smallest plane the device may run. The scan trees are sized for it, so they stay valid
    /// for any larger plane.
    pub plane_dim: u32,
    /// Whether plane collectives are available.
    pub planes: bool,
    pub max_shared_memory_size: usize,
    pub max_units_per_cube: u32,
    pub max_cube_dim: CubeDim,
    /// Cubes resident at once, the upper bound on the cubes of a dispatch.
    pub occupancy: u32,
}

impl DeviceLimits {
    pub fn from_client<R: Runtime>(client: &ComputeClient<R::Server, R::Channel>) -> Self {
        let properties = client.properties();
        let hardware = &properties.hardware;

        let occupancy = match hardware.num_streaming_multiprocessors {
            Some(num_sms) => num_sms.saturating_mul(CUBES_PER_SM),
            None => DEFAULT_OCCUPANCY,
        };

        let limits = Self {
            plane_dim: Ord::max(hardware.plane_size_min, 1),
            planes: properties.feature_enabled(Feature::Plane),
            max_shared_memory_size: hardware.max_shared_memory_size,
            max_units_per_cube: hardware.max_units_per_cube,
            max_cube_dim: hardware.max_cube_dim,
            occupancy: occupancy.clamp(1, MAX_CUBES),
        };
        log::debug!("Radix sort device limits: {limits:?}");
        limits
    }
}

#[cfg(test)]
pub(crate) fn reference_limits(plane_dim: u32) -> DeviceLimits {
    DeviceLimits::new(
        plane_dim,
        true,
        48 * 1024,
        1024,
        CubeDim::new_3d(1024, 1024, 64),
        64,
    )
}

//! Least-significant-digit radix sort over the cube execution model.
//!
//! Every pass sorts the keys on one digit with three dispatches:
//! - the upsweep counts the digits of the segment of each cube;
//! - the spine scan turns the counts into global write offsets;
//! - the downsweep ranks the keys of each cube and scatters them, stably.
//!
//! Passes ping-pong between two buffers, from the least significant digit to the most
//! significant one.

#[macro_use]
extern crate derive_new;

mod config;
mod device;
mod distribution;
mod error;
mod key;
pub(crate) mod kernels;
mod launch;
mod layout;
mod raking;
mod sort;
mod strategy;
mod tile;

pub use config::*;
pub use device::*;
pub use distribution::*;
pub use error::*;
pub use key::*;
pub use launch::*;
pub use layout::*;
pub use raking::*;
pub use sort::*;
pub use strategy::*;
pub use tile::*;

#[cfg(any(test, feature = "export_tests"))]
pub mod test;

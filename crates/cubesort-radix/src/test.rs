#![allow(missing_docs)]

use core::cmp::Ordering;

use cubecl::prelude::*;
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    ConfigError, RadixKey, RadixSortError, RadixStrategy, SortOrder, argsort, sort_keys,
    sort_pairs,
};

// This macro generates all the tests.
#[macro_export]
macro_rules! testgen_radix {
    // Generate all the tests for a list of key types.
    ([$($key:ident), *]) => {
        mod test_radix {
            use super::*;
            ::paste::paste! {
                $(mod [<$key _ty>] {
                    use super::*;

                    $crate::testgen_radix!($key);
                })*
            }
        }
    };

    // Generate all the tests for every supported key type.
    () => {
        $crate::testgen_radix!([u8, u16, u32, u64, i8, i16, i32, i64, f32, f64]);
    };

    // Generate all the tests for a specific key type.
    ($key:ident) => {
        $crate::impl_test_radix!(
            $key,
            [
                {
                    id: "single_element",
                    size: 1,
                    distinct: None,
                },
                {
                    id: "partial_tile",
                    size: 1000,
                    distinct: None,
                },
                {
                    id: "many_tiles_with_duplicates",
                    size: 4100,
                    distinct: Some(37),
                },
                {
                    id: "all_equal",
                    size: 2500,
                    distinct: Some(1),
                }
            ]
        );
    };
}

// For a given problem, check `sort_keys` in both orders, `sort_pairs` and `argsort` for every
// digit width against the stable sort of the standard library.
#[macro_export]
macro_rules! impl_test_radix {
    (
        $key:ident,
        [
            $(
                {
                    id: $id:literal,
                    size: $size:expr,
                    distinct: $distinct:expr,
                }
            ),*
        ]
    ) => {
        ::paste::paste! {
            $(
                $crate::impl_test_radix_with_strategy!{
                    $key,
                    {
                        id: $id,
                        size: $size,
                        distinct: $distinct,
                    },
                    [ log_bins: 4 ],
                    [ log_bins: 5 ],
                    [ log_bins: 8 ]
                }
            )*
        }
    };
}

#[macro_export]
macro_rules! impl_test_radix_with_strategy {
    (
        $key:ident,
        {
            id: $id:literal,
            size: $size:expr,
            distinct: $distinct:expr,
        },
        $([log_bins: $log_bins:expr]),*
    ) => {
        ::paste::paste! {
            $(
                #[test]
                pub fn [< sort_keys_ascending_bins_ $log_bins _ $id >]() {
                    let test = $crate::test::TestCase {
                        num_elements: $size,
                        distinct: $distinct,
                        order: $crate::SortOrder::Ascending,
                        strategy: $crate::RadixStrategy::Auto { log_bins: $log_bins },
                    };
                    test.test_sort_keys::<$key, TestRuntime>(&Default::default());
                }

                #[test]
                pub fn [< sort_keys_descending_bins_ $log_bins _ $id >]() {
                    let test = $crate::test::TestCase {
                        num_elements: $size,
                        distinct: $distinct,
                        order: $crate::SortOrder::Descending,
                        strategy: $crate::RadixStrategy::Auto { log_bins: $log_bins },
                    };
                    test.test_sort_keys::<$key, TestRuntime>(&Default::default());
                }

                #[test]
                pub fn [< sort_pairs_bins_ $log_bins _ $id >]() {
                    let test = $crate::test::TestCase {
                        num_elements: $size,
                        distinct: $distinct,
                        order: $crate::SortOrder::Ascending,
                        strategy: $crate::RadixStrategy::Auto { log_bins: $log_bins },
                    };
                    test.test_sort_pairs::<$key, TestRuntime>(&Default::default());
                }

                #[test]
                pub fn [< argsort_bins_ $log_bins _ $id >]() {
                    let test = $crate::test::TestCase {
                        num_elements: $size,
                        distinct: $distinct,
                        order: $crate::SortOrder::Descending,
                        strategy: $crate::RadixStrategy::Auto { log_bins: $log_bins },
                    };
                    test.test_argsort::<$key, TestRuntime>(&Default::default());
                }
            )*
        }
    };
}

/// Keys that can be generated at random and ordered on the host.
pub trait TestKey: RadixKey {
    fn random(rng: &mut StdRng) -> Self;

    /// Order of the standard library, total for floats.
    fn reference_cmp(&self, other: &Self) -> Ordering;
}

macro_rules! impl_test_key_int {
    ($($ty:ty),*) => {
        $(
            impl TestKey for $ty {
                fn random(rng: &mut StdRng) -> Self {
                    rng.r#gen()
                }

                fn reference_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )*
    };
}

macro_rules! impl_test_key_float {
    ($($ty:ty),*) => {
        $(
            impl TestKey for $ty {
                fn random(rng: &mut StdRng) -> Self {
                    rng.gen_range(-1.0e6..1.0e6)
                }

                fn reference_cmp(&self, other: &Self) -> Ordering {
                    self.total_cmp(other)
                }
            }
        )*
    };
}

impl_test_key_int!(u8, u16, u32, u64, i8, i16, i32, i64);
impl_test_key_float!(f32, f64);

#[derive(Debug)]
pub struct TestCase {
    pub num_elements: usize,
    /// Draw the keys from a pool of this many random values.
    pub distinct: Option<usize>,
    pub order: SortOrder,
    pub strategy: RadixStrategy,
}

impl TestCase {
    pub fn test_sort_keys<K: TestKey, R: Runtime>(&self, device: &R::Device) {
        let client = R::client(device);
        let input = self.random_keys::<K>();
        let mut keys = input.clone();

        let result = sort_keys::<R, K>(&client, &mut keys, self.order, &self.strategy);
        if skipped(&result) {
            return;
        }
        result.unwrap();

        let expected = self.reference_permutation(&input);
        assert_eq!(
            bits(&keys),
            bits(&expected.iter().map(|i| input[*i as usize]).collect::<Vec<_>>())
        );
    }

    pub fn test_sort_pairs<K: TestKey, R: Runtime>(&self, device: &R::Device) {
        let client = R::client(device);
        let input = self.random_keys::<K>();
        let mut keys = input.clone();
        let mut values = (0..self.num_elements as u32).collect::<Vec<_>>();

        let result = sort_pairs::<R, K, u32>(
            &client,
            &mut keys,
            &mut values,
            self.order,
            &self.strategy,
        );
        if skipped(&result) {
            return;
        }
        result.unwrap();

        let expected = self.reference_permutation(&input);
        assert_eq!(values, expected);
        for (key, index) in keys.iter().zip(values) {
            assert_eq!(bytemuck::bytes_of(key), bytemuck::bytes_of(&input[index as usize]));
        }
    }

    pub fn test_argsort<K: TestKey, R: Runtime>(&self, device: &R::Device) {
        let client = R::client(device);
        let input = self.random_keys::<K>();

        let result = argsort::<R, K>(&client, &input, self.order, &self.strategy);
        if skipped(&result) {
            return;
        }

        assert_eq!(result.unwrap(), self.reference_permutation(&input));
    }

    fn random_keys<K: TestKey>(&self) -> Vec<K> {
        let mut rng = StdRng::seed_from_u64(self.num_elements as u64);

        match self.distinct {
            Some(distinct) => {
                let pool = (0..distinct.max(1))
                    .map(|_| K::random(&mut rng))
                    .collect::<Vec<_>>();
                (0..self.num_elements)
                    .map(|_| pool[rng.gen_range(0..pool.len())])
                    .collect()
            }
            None => (0..self.num_elements).map(|_| K::random(&mut rng)).collect(),
        }
    }

    /// Stable sort of the indices of `keys`.
    fn reference_permutation<K: TestKey>(&self, keys: &[K]) -> Vec<u32> {
        let mut indices = (0..keys.len() as u32).collect::<Vec<_>>();
        indices.sort_by(|a, b| {
            let ordering = keys[*a as usize].reference_cmp(&keys[*b as usize]);
            match self.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        indices
    }
}

/// Devices without plane operations can't run the sort.
fn skipped<T>(result: &Result<T, RadixSortError>) -> bool {
    matches!(
        result,
        Err(RadixSortError::Config(ConfigError::PlanesUnavailable))
    )
}

fn bits<K: RadixKey>(keys: &[K]) -> Vec<K::Bits> {
    keys.iter().map(|key| key.to_radix()).collect()
}

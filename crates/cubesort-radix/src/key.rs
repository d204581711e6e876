use bytemuck::Pod;
use serde::{Deserialize, Serialize};

/// Unsigned bit pattern sorted by the radix kernels.
///
/// The numeric order of the pattern is the sort order, so digits can be extracted with shifts
/// and masks. On the device, patterns are stored as 32-bit words, low word first.
pub trait RadixBits: Pod + Ord + Send + Sync + core::fmt::Debug {
    /// Width of the pattern in bits.
    const BITS: u32;
    /// Device words of one pattern.
    const WORDS: u32;

    /// Extract the digit starting at bit `shift`.
    fn digit(self, shift: u32, mask: u32) -> u32;

    /// Complement every bit.
    fn invert(self) -> Self;

    /// Append the device words of the pattern.
    fn push_words(self, words: &mut Vec<u32>);

    /// Read a pattern back from its `WORDS` device words.
    fn from_words(words: &[u32]) -> Self;
}

macro_rules! impl_radix_bits_narrow {
    ($($ty:ty),*) => {
        $(
            impl RadixBits for $ty {
                const BITS: u32 = <$ty>::BITS;
                const WORDS: u32 = 1;

                #[inline]
                fn digit(self, shift: u32, mask: u32) -> u32 {
                    ((self >> shift) as u32) & mask
                }

                #[inline]
                fn invert(self) -> Self {
                    !self
                }

                #[inline]
                fn push_words(self, words: &mut Vec<u32>) {
                    words.push(self as u32);
                }

                #[inline]
                fn from_words(words: &[u32]) -> Self {
                    words[0] as $ty
                }
            }
        )*
    };
}

impl_radix_bits_narrow!(u8, u16, u32);

impl RadixBits for u64 {
    const BITS: u32 = u64::BITS;
    const WORDS: u32 = 2;

    #[inline]
    fn digit(self, shift: u32, mask: u32) -> u32 {
        ((self >> shift) as u32) & mask
    }

    #[inline]
    fn invert(self) -> Self {
        !self
    }

    #[inline]
    fn push_words(self, words: &mut Vec<u32>) {
        words.push(self as u32);
        words.push((self >> 32) as u32);
    }

    #[inline]
    fn from_words(words: &[u32]) -> Self {
        words[0] as u64 | ((words[1] as u64) << 32)
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A key type the radix sort can order.
///
/// Keys are mapped to an unsigned pattern whose numeric order matches the key order:
/// - unsigned integers are used as is;
/// - signed integers have their sign bit flipped;
/// - floats follow [total_cmp](f32::total_cmp): negative values are complemented and the others
///   get their sign bit set.
pub trait RadixKey: sealed::Sealed + Pod + Send + Sync + core::fmt::Debug {
    /// The unsigned pattern the key is sorted as.
    type Bits: RadixBits;

    /// Map the key to its order-preserving pattern.
    fn to_radix(self) -> Self::Bits;

    /// Inverse of [to_radix](RadixKey::to_radix).
    fn from_radix(bits: Self::Bits) -> Self;
}

macro_rules! impl_unsigned_key {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl RadixKey for $ty {
                type Bits = $ty;

                #[inline]
                fn to_radix(self) -> Self::Bits {
                    self
                }

                #[inline]
                fn from_radix(bits: Self::Bits) -> Self {
                    bits
                }
            }
        )*
    };
}

macro_rules! impl_signed_key {
    ($($ty:ty => $bits:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl RadixKey for $ty {
                type Bits = $bits;

                #[inline]
                fn to_radix(self) -> Self::Bits {
                    (self as $bits) ^ (1 << (<$bits>::BITS - 1))
                }

                #[inline]
                fn from_radix(bits: Self::Bits) -> Self {
                    (bits ^ (1 << (<$bits>::BITS - 1))) as $ty
                }
            }
        )*
    };
}

macro_rules! impl_float_key {
    ($($ty:ty => $bits:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl RadixKey for $ty {
                type Bits = $bits;

                #[inline]
                fn to_radix(self) -> Self::Bits {
                    const SIGN: $bits = 1 << (<$bits>::BITS - 1);
                    let bits = self.to_bits();
                    if bits & SIGN != 0 { !bits } else { bits | SIGN }
                }

                #[inline]
                fn from_radix(bits: Self::Bits) -> Self {
                    const SIGN: $bits = 1 << (<$bits>::BITS - 1);
                    if bits & SIGN != 0 {
                        <$ty>::from_bits(bits & !SIGN)
                    } else {
                        <$ty>::from_bits(!bits)
                    }
                }
            }
        )*
    };
}

impl_unsigned_key!(u8, u16, u32, u64);
impl_signed_key!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);
impl_float_key!(f32 => u32, f64 => u64);

/// Direction of the sort.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest key first.
    #[default]
    Ascending,
    /// Largest key first. Equal keys still keep their input order.
    Descending,
}

impl SortOrder {
    /// Map a key to the pattern sorted by the kernels.
    #[inline]
    pub fn encode<K: RadixKey>(self, key: K) -> K::Bits {
        match self {
            SortOrder::Ascending => key.to_radix(),
            SortOrder::Descending => key.to_radix().invert(),
        }
    }

    /// Inverse of [encode](SortOrder::encode).
    #[inline]
    pub fn decode<K: RadixKey>(self, bits: K::Bits) -> K {
        match self {
            SortOrder::Ascending => K::from_radix(bits),
            SortOrder::Descending => K::from_radix(bits.invert()),
        }
    }
}

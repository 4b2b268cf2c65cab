use std::fmt::Debug;

use ahash::RandomState;
use half::f16;

/// State used for the default hashing strategy.
pub const HASH_RANDOM_STATE: RandomState = RandomState::with_seeds(0, 0, 0, 0);

/// Hash produced for null rows.
pub const NULL_HASH: u64 = 0xA21258D088C87A13;

/// Starting hash for a list row before any elements are combined in.
///
/// Distinct from `NULL_HASH` so that an empty list and a null list hash
/// differently.
pub const LIST_SEED_HASH: u64 = 0x4B1D3C2E5F607182;

/// Strategy for hashing the raw bytes of a value.
///
/// Two vectors hashed with the same strategy produce identical hashes for
/// identical content.
pub trait VectorHasher: Debug {
    fn hash_bytes(&self, bytes: &[u8]) -> u64;
}

/// Default hasher using ahash with fixed seeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultHasher;

impl VectorHasher for DefaultHasher {
    fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        HASH_RANDOM_STATE.hash_one(bytes)
    }
}

/// Cheap multiplicative hasher.
///
/// Weaker distribution than the default, but stable across builds and
/// platforms for the same byte input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimpleHasher;

impl VectorHasher for SimpleHasher {
    fn hash_bytes(&self, bytes: &[u8]) -> u64 {
        let mut hash: u64 = 17;
        for &b in bytes {
            hash = hash.wrapping_mul(31).wrapping_add(b as u64);
        }
        hash
    }
}

/// Combine two hashes into a single value.
///
/// Implementation taken from boost:
/// <https://github.com/boostorg/container_hash/blob/b8179488b20eb1373bdbf5c7fcca963f072512df/include/boost/container_hash/detail/hash_mix.hpp#L67>
pub const fn combine_hashes(v1: u64, v2: u64) -> u64 {
    const fn mix(mut x: u64) -> u64 {
        const M: u64 = 0xE9846AF9B1A615D;
        x ^= x.wrapping_shr(32);
        x = x.wrapping_mul(M);
        x ^= x.wrapping_shr(32);
        x = x.wrapping_mul(M);
        x ^= x.wrapping_shr(28);
        x
    }

    mix(v1.wrapping_add(0x9E3779B9).wrapping_add(v2))
}

/// Helper trait for hashing values.
///
/// Floats don't implement `Hash`, so everything goes through the value's
/// little endian bytes.
pub trait HashValue {
    fn hash_with<H>(&self, hasher: &H) -> u64
    where
        H: VectorHasher + ?Sized;
}

macro_rules! impl_hash_value {
    ($typ:ty) => {
        impl HashValue for $typ {
            fn hash_with<H>(&self, hasher: &H) -> u64
            where
                H: VectorHasher + ?Sized,
            {
                hasher.hash_bytes(&self.to_le_bytes())
            }
        }
    };
}

impl_hash_value!(i8);
impl_hash_value!(i16);
impl_hash_value!(i32);
impl_hash_value!(i64);
impl_hash_value!(u8);
impl_hash_value!(u16);
impl_hash_value!(u32);
impl_hash_value!(u64);
impl_hash_value!(f16);
impl_hash_value!(f32);
impl_hash_value!(f64);

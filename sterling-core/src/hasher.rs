use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};

use crate::interner::StrId;

/// Map keyed by an interned id; the id is already a dense integer so it is used as the hash directly.
pub(crate) type StrIdMap<V> = HashMap<StrId, V, StrIdBuildHasher>;

#[derive(Clone, Copy, Default)]
pub(crate) struct StrIdBuildHasher;

#[derive(Default)]
pub(crate) struct StrIdHasher(u64);

impl Hasher for StrIdHasher {
    #[inline]
    fn finish(&self) -> u64 {
        // Spread the low bits so neighbouring ids don't share buckets.
        self.0.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        self.0 = u64::from(i);
    }

    // Only reached if something other than a `StrId` is hashed. FNV-1a keeps it correct.
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        debug_assert!(false, "StrIdHasher only expects u32 keys");

        const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0100_0000_01b3;

        let mut hash = FNV_OFFSET_BASIS;
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        self.0 = hash;
    }
}

impl BuildHasher for StrIdBuildHasher {
    type Hasher = StrIdHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        StrIdHasher::default()
    }
}

//! Stable user hashing for shard assignment.
//!
//! Shard placement is an on-disk contract: any reader, in any language,
//! must be able to recompute which shard holds a given user, forever. The
//! algorithm is therefore pinned and versioned by this module rather than
//! delegated to `std::collections::hash_map::DefaultHasher`, whose output
//! is process-seeded and free to change between releases.
//!
//! Definition: digest = FNV-1a 64 over the UTF-8 bytes of the normalized
//! user id (offset basis `0xcbf29ce484222325`, prime `0x100000001b3`);
//! the digest is xor-folded to 32 bits (`(h >> 32) ^ (h & 0xFFFF_FFFF)`,
//! the FNV-recommended reduction for small index spaces) before the caller
//! takes it modulo the shard count. Integer user ids hash as their decimal
//! string rendering.

use crate::constants::hashing::{FNV1A64_OFFSET, FNV1A64_PRIME};

/// FNV-1a 64-bit digest of `bytes`.
#[inline]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV1A64_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV1A64_PRIME);
    }
    hash
}

/// Xor-fold a 64-bit digest to 32 bits.
#[inline]
pub fn fold32(hash: u64) -> u32 {
    ((hash >> 32) as u32) ^ (hash as u32)
}

/// Folded stable digest of a user id, the value shard assignment reduces.
#[inline]
pub fn stable_user_hash(user_id: &str) -> u32 {
    fold32(fnv1a64(user_id.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::hashing_tests::{
        DIGEST_A, DIGEST_EMPTY, DIGEST_FOOBAR, DIGEST_U1, FOLD_U1,
    };

    #[test]
    fn digest_matches_published_fnv1a_vectors() {
        assert_eq!(fnv1a64(b""), DIGEST_EMPTY);
        assert_eq!(fnv1a64(b"a"), DIGEST_A);
        assert_eq!(fnv1a64(b"foobar"), DIGEST_FOOBAR);
    }

    #[test]
    fn fold_matches_pinned_vector() {
        assert_eq!(fnv1a64(b"u1"), DIGEST_U1);
        assert_eq!(fold32(DIGEST_U1), FOLD_U1);
        assert_eq!(stable_user_hash("u1"), FOLD_U1);
    }

    #[test]
    fn user_hash_is_pure_and_discriminates() {
        let first = stable_user_hash("884213");
        for _ in 0..3 {
            assert_eq!(stable_user_hash("884213"), first);
        }
        assert_ne!(stable_user_hash("884213"), stable_user_hash("884214"));
    }
}

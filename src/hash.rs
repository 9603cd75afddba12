//!
//! Name hashing for bones and animated parameters.
//!

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const ROOT_MOTION_SALT: u32 = 0x9e37_79b9;

/// Hashes a bone or parameter name (FNV-1a, 32 bits).
#[inline]
pub const fn hash_name(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    return hash;
}

/// Derives the hash under which a clip stores root motion curves of a bone.
///
/// This is a one-way rehash of the bone name hash, so root motion curves never collide with
/// the ordinary curves of the same bone.
#[inline]
pub const fn root_motion_hash(bone_hash: u32) -> u32 {
    return mix32(bone_hash ^ ROOT_MOTION_SALT);
}

/// 32 bits avalanche finalizer (murmur3 fmix32).
#[inline]
pub(crate) const fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    return h;
}

//!
//! Base types, traits and utils.
//!

use static_assertions::const_assert_eq;
use thiserror::Error;

/// Animation error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimError {
    /// Validates job failed.
    #[error("Invalid job")]
    InvalidJob,
    /// Invalid buffer index.
    #[error("Invalid index")]
    InvalidIndex,

    /// More motions than the fixed-width root motion history can track.
    #[error("Too many root motions: {count} (max {})", ROOT_MOTION_MAX_MOTIONS)]
    TooManyRootMotions { count: usize },
    /// Parent chain of a bone never reaches the root.
    #[error("Rig parent cycle at bone {bone}")]
    RigParentCycle { bone: usize },
    /// Parent index out of range.
    #[error("Invalid parent {parent} of bone {bone}")]
    InvalidParent { bone: usize, parent: i16 },
    /// Two bones share one name hash.
    #[error("Duplicate bone hash {name_hash:#010x} at bone {bone}")]
    DuplicateBoneHash { bone: usize, name_hash: u32 },

    /// Playing layers aren't sorted by ascending layer index.
    #[error("Unsorted layers at position {position}")]
    UnsortedLayers { position: usize },
    /// Layer index out of the supported range.
    #[error("Layer index overflow: {layer_index} (max {})", LAYER_MAX_COUNT - 1)]
    LayerIndexOverflow { layer_index: u32 },
    /// Time or weight of a playing layer is NaN or infinite.
    #[error("Non finite layer at position {position}")]
    NonFiniteLayer { position: usize },

    /// Bake a collision free hash table failed.
    #[error("Perfect hash build failed: {0}")]
    PerfectHashBuild(String),
    /// Malformed clip data handed to a builder.
    #[error("Invalid clip: {0}")]
    InvalidClip(String),
}

impl AnimError {
    pub fn is_invalid_job(&self) -> bool {
        matches!(self, AnimError::InvalidJob)
    }

    pub fn is_invalid_index(&self) -> bool {
        matches!(self, AnimError::InvalidIndex)
    }

    pub fn is_too_many_root_motions(&self) -> bool {
        matches!(self, AnimError::TooManyRootMotions { .. })
    }

    pub fn is_rig_parent_cycle(&self) -> bool {
        matches!(self, AnimError::RigParentCycle { .. })
    }

    pub fn is_invalid_parent(&self) -> bool {
        matches!(self, AnimError::InvalidParent { .. })
    }

    pub fn is_duplicate_bone_hash(&self) -> bool {
        matches!(self, AnimError::DuplicateBoneHash { .. })
    }

    pub fn is_unsorted_layers(&self) -> bool {
        matches!(self, AnimError::UnsortedLayers { .. })
    }

    pub fn is_layer_index_overflow(&self) -> bool {
        matches!(self, AnimError::LayerIndexOverflow { .. })
    }

    pub fn is_non_finite_layer(&self) -> bool {
        matches!(self, AnimError::NonFiniteLayer { .. })
    }

    pub fn is_perfect_hash_build(&self) -> bool {
        matches!(self, AnimError::PerfectHashBuild(_))
    }

    pub fn is_invalid_clip(&self) -> bool {
        matches!(self, AnimError::InvalidClip(_))
    }
}

/// Defines the maximum number of bones of a rig.
/// Bone indices are stored as `i16`, parent of the root is `RIG_NO_PARENT`.
pub const RIG_MAX_BONES: usize = i16::MAX as usize;

/// Defines the index of the parent of the root bone (which has no parent in fact).
pub const RIG_NO_PARENT: i16 = -1;

/// Bone index used to resolve layer weights of non-skeletal animated parameters.
pub const NON_SKELETAL_BONE: i32 = -1;

/// Defines the maximum number of layers (exclusive bound of `layer_index`).
pub const LAYER_MAX_COUNT: usize = 32;

/// Defines the maximum number of motions tracked simultaneously by a root motion history.
pub const ROOT_MOTION_MAX_MOTIONS: usize = 64;

/// Number of animated channel bits stored per bone (translation, rotation, scale).
pub const CHANNEL_BITS_PER_BONE: usize = 3;

/// Number of bones whose channel bits fit in one `u64` flag word.
pub const BONES_PER_FLAG_WORD: usize = u64::BITS as usize / CHANNEL_BITS_PER_BONE;
const_assert_eq!(BONES_PER_FLAG_WORD, 21);

/// Allow usize/i32/i16 use as bone index.
pub trait AnimIndex {
    fn usize(&self) -> usize;
    fn i32(&self) -> i32;
}

macro_rules! anim_index {
    ($type:ty) => {
        impl AnimIndex for $type {
            #[inline(always)]
            fn usize(&self) -> usize {
                *self as usize
            }

            #[inline(always)]
            fn i32(&self) -> i32 {
                *self as i32
            }
        }
    };
}

anim_index!(usize);
anim_index!(i32);
anim_index!(i16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let err = AnimError::TooManyRootMotions { count: 65 };
        assert!(err.is_too_many_root_motions());
        assert!(!err.is_invalid_job());
        assert_eq!(err.to_string(), "Too many root motions: 65 (max 64)");

        let err = AnimError::LayerIndexOverflow { layer_index: 40 };
        assert!(err.is_layer_index_overflow());
        assert_eq!(err.to_string(), "Layer index overflow: 40 (max 31)");

        assert!(AnimError::RigParentCycle { bone: 3 }.is_rig_parent_cycle());
        assert!(AnimError::UnsortedLayers { position: 1 }.is_unsorted_layers());
        assert!(AnimError::PerfectHashBuild("dup".into()).is_perfect_hash_build());
    }

    #[test]
    fn test_anim_index() {
        assert_eq!(3i16.usize(), 3);
        assert_eq!(7usize.i32(), 7);
        assert_eq!((-1i32).i32(), -1);
    }
}

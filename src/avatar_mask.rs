//!
//! Avatar mask, restricts the bones a layer affects.
//!

use crate::base::AnimIndex;

/// Per bone or per human body part inclusion filter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AvatarMask {
    /// One bit per bone index.
    Bones(Vec<u64>),
    /// One bit per human body part id. Bones outside of the human avatar are included.
    HumanBodyParts(u64),
}

impl AvatarMask {
    /// Creates a bone mask including the given bone indices.
    pub fn from_bones<I: AnimIndex>(bones: impl IntoIterator<Item = I>) -> AvatarMask {
        let mut words: Vec<u64> = Vec::new();
        for bone in bones {
            let idx = bone.usize();
            if words.len() <= idx / 64 {
                words.resize(idx / 64 + 1, 0);
            }
            words[idx / 64] |= 1 << (idx % 64);
        }
        return AvatarMask::Bones(words);
    }

    /// Creates a human mask including the given body parts.
    pub fn from_body_parts(parts: impl IntoIterator<Item = u8>) -> AvatarMask {
        let mut bits = 0u64;
        for part in parts {
            bits |= 1 << (part as u32 % 64);
        }
        return AvatarMask::HumanBodyParts(bits);
    }

    /// Tests if the mask includes a bone.
    ///
    /// * `bone` - Bone index, negative values (non skeletal parameters) are always included.
    /// * `human_body_part` - Body part of the bone, negative if the bone isn't human.
    #[inline]
    pub fn includes(&self, bone: i32, human_body_part: i16) -> bool {
        if bone < 0 {
            return true;
        }
        return match self {
            AvatarMask::Bones(words) => {
                let idx = bone as usize;
                words.get(idx / 64).map_or(false, |w| (w >> (idx % 64)) & 1 != 0)
            }
            AvatarMask::HumanBodyParts(bits) => {
                human_body_part < 0 || human_body_part >= 64 || (bits >> human_body_part) & 1 != 0
            }
        };
    }
}

/// Tests if an optional mask includes a bone, no mask includes everything.
#[inline]
pub fn mask_includes(mask: Option<&AvatarMask>, bone: i32, human_body_part: i16) -> bool {
    return mask.map_or(true, |m| m.includes(bone, human_body_part));
}

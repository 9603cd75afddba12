//!
//! Rig definition, bone hierarchy and human rotation constants.
//!

use bimap::BiMap;
use glam::{Quat, Vec3};

use crate::base::{AnimError, AnimIndex, RIG_MAX_BONES, RIG_NO_PARENT};
use crate::math::BoneTransform;

/// Per bone constants remapping human muscle values to a local rotation.
///
/// Values come from the rig baking pipeline and are used as is.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HumanRotationData {
    /// Angle reached at muscle value -1, per axis (radians).
    pub min_angles: Vec3,
    /// Angle reached at muscle value +1, per axis (radians).
    pub max_angles: Vec3,
    /// Axis sign correction.
    pub sign: Vec3,
    pub pre_rotation: Quat,
    pub post_rotation: Quat,
}

impl Default for HumanRotationData {
    fn default() -> HumanRotationData {
        return HumanRotationData {
            min_angles: Vec3::ZERO,
            max_angles: Vec3::ZERO,
            sign: Vec3::ONE,
            pre_rotation: Quat::IDENTITY,
            post_rotation: Quat::IDENTITY,
        };
    }
}

/// A bone of a rig.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigBone {
    pub name_hash: u32,
    /// Parent bone index, `RIG_NO_PARENT` for roots.
    pub parent: i16,
    pub reference_pose: BoneTransform,
    /// Human body part id, negative if the bone isn't part of a human avatar.
    pub human_body_part: i16,
    pub human_rotation: Option<HumanRotationData>,
}

impl RigBone {
    pub fn new(name_hash: u32, parent: i16, reference_pose: BoneTransform) -> RigBone {
        return RigBone {
            name_hash,
            parent,
            reference_pose,
            human_body_part: -1,
            human_rotation: None,
        };
    }

    pub fn with_human(mut self, body_part: i16, rotation: HumanRotationData) -> RigBone {
        self.human_body_part = body_part;
        self.human_rotation = Some(rotation);
        return self;
    }
}

///
/// Immutable skeleton definition, shared by all rig instances of the same shape.
///
/// Bones aren't required to be stored parents first, but every parent chain must end on a
/// bone without parent. This is checked when the rig is built.
///
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigDefinition {
    bones: Vec<RigBone>,
    root_bone: i16,
    bone_depths: Vec<u16>,
    bone_hashes: BiMap<u32, i16>,
}

impl RigDefinition {
    /// Builds a rig, validating parent indices and parent chains.
    pub fn new(bones: Vec<RigBone>, root_bone: i16) -> Result<RigDefinition, AnimError> {
        if bones.len() > RIG_MAX_BONES {
            return Err(AnimError::InvalidIndex);
        }
        if !bones.is_empty() && (root_bone < 0 || root_bone.usize() >= bones.len()) {
            return Err(AnimError::InvalidIndex);
        }

        let num_bones = bones.len();
        for (idx, bone) in bones.iter().enumerate() {
            if bone.parent != RIG_NO_PARENT && (bone.parent < 0 || bone.parent.usize() >= num_bones) {
                return Err(AnimError::InvalidParent {
                    bone: idx,
                    parent: bone.parent,
                });
            }
        }

        let bone_depths = Self::compute_depths(&bones)?;

        let mut bone_hashes = BiMap::with_capacity(num_bones);
        for (idx, bone) in bones.iter().enumerate() {
            if bone_hashes.insert_no_overwrite(bone.name_hash, idx as i16).is_err() {
                return Err(AnimError::DuplicateBoneHash {
                    bone: idx,
                    name_hash: bone.name_hash,
                });
            }
        }

        return Ok(RigDefinition {
            bones,
            root_bone,
            bone_depths,
            bone_hashes,
        });
    }

    // Walks every parent chain once, a chain longer than the bone count is a cycle.
    fn compute_depths(bones: &[RigBone]) -> Result<Vec<u16>, AnimError> {
        const UNKNOWN: u16 = u16::MAX;
        let mut depths = vec![UNKNOWN; bones.len()];
        let mut chain: Vec<usize> = Vec::new();
        for start in 0..bones.len() {
            chain.clear();
            let mut current = start as i32;
            while current != RIG_NO_PARENT as i32 && depths[current as usize] == UNKNOWN {
                if chain.len() > bones.len() {
                    return Err(AnimError::RigParentCycle { bone: start });
                }
                chain.push(current as usize);
                current = bones[current as usize].parent as i32;
            }
            let mut depth = if current == RIG_NO_PARENT as i32 {
                0
            } else {
                depths[current as usize] + 1
            };
            for bone in chain.iter().rev() {
                depths[*bone] = depth;
                depth += 1;
            }
        }
        return Ok(depths);
    }
}

impl RigDefinition {
    /// Gets the number of bones.
    #[inline]
    pub fn num_bones(&self) -> usize {
        return self.bones.len();
    }

    #[inline]
    pub fn bones(&self) -> &[RigBone] {
        return &self.bones;
    }

    #[inline]
    pub fn bone(&self, idx: impl AnimIndex) -> &RigBone {
        return &self.bones[idx.usize()];
    }

    /// Gets the root bone index, the bone carrying root motion.
    #[inline]
    pub fn root_bone(&self) -> i16 {
        return self.root_bone;
    }

    #[inline]
    pub fn is_root(&self, idx: impl AnimIndex) -> bool {
        return idx.i32() == self.root_bone as i32;
    }

    /// Gets bone's parent by index.
    #[inline]
    pub fn bone_parent(&self, idx: impl AnimIndex) -> i16 {
        return self.bones[idx.usize()].parent;
    }

    /// Gets the number of ancestors of a bone.
    #[inline]
    pub fn bone_depth(&self, idx: impl AnimIndex) -> u16 {
        return self.bone_depths[idx.usize()];
    }

    /// Gets bone's index by name hash.
    #[inline]
    pub fn bone_by_hash(&self, name_hash: u32) -> Option<i16> {
        return self.bone_hashes.get_by_left(&name_hash).copied();
    }

    /// Gets bone's name hash by index.
    #[inline]
    pub fn bone_hash(&self, idx: impl AnimIndex) -> Option<u32> {
        return self.bone_hashes.get_by_right(&(idx.i32() as i16)).copied();
    }

    /// Gets the reference (bind) pose of every bone.
    pub fn reference_poses(&self) -> impl Iterator<Item = BoneTransform> + '_ {
        return self.bones.iter().map(|b| b.reference_pose);
    }

    /// Iterates through the bone hierarchy in depth-first order, parents before children.
    ///
    /// * `from` - The bone to start from. If negative, the iteration visits every root.
    /// * `f` - The function to call for each bone. The function takes arguments `(bone: i16, parent: i16)`.
    pub fn iter_depth_first<F>(&self, from: impl AnimIndex, mut f: F)
    where
        F: FnMut(i16, i16),
    {
        const NONE: usize = usize::MAX;
        let num_bones = self.num_bones();
        let mut first_child = vec![NONE; num_bones];
        let mut next_sibling = vec![NONE; num_bones];
        let mut roots = Vec::new();
        for idx in (0..num_bones).rev() {
            let parent = self.bones[idx].parent;
            if parent == RIG_NO_PARENT {
                roots.push(idx);
            } else {
                next_sibling[idx] = first_child[parent.usize()];
                first_child[parent.usize()] = idx;
            }
        }

        let mut stack = if from.i32() < 0 {
            roots
        } else if from.usize() < num_bones {
            vec![from.usize()]
        } else {
            return;
        };
        while let Some(bone) = stack.pop() {
            f(bone as i16, self.bones[bone].parent);
            let mut children = Vec::new();
            let mut child = first_child[bone];
            while child != NONE {
                children.push(child);
                child = next_sibling[child];
            }
            stack.extend(children.into_iter().rev());
        }
    }
}

#![allow(unused_imports)]
#![allow(dead_code)]

use glam::{Quat, Vec3};
use rig_animation_rs::test_utils::*;
use rig_animation_rs::*;
use std::sync::Arc;

pub const BODY_PART_BODY: i16 = 0;
pub const BODY_PART_LEFT_ARM: i16 = 1;
pub const BODY_PART_RIGHT_ARM: i16 = 2;

pub const BONES: [&str; 7] = ["Root", "Hips", "Spine", "ArmL", "HandL", "ArmR", "HandR"];

/// A small humanoid: root, hips, spine and two arms, with body parts on every bone but the root.
pub fn humanoid() -> Arc<RigDefinition> {
    let parts = [
        -1,
        BODY_PART_BODY,
        BODY_PART_BODY,
        BODY_PART_LEFT_ARM,
        BODY_PART_LEFT_ARM,
        BODY_PART_RIGHT_ARM,
        BODY_PART_RIGHT_ARM,
    ];
    let parents = [-1, 0, 1, 2, 3, 2, 5];
    let bones = BONES
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let pose = BoneTransform::from_position(Vec3::new(0.0, idx as f32 * 0.1, 0.0));
            let bone = RigBone::new(hash_name(name), parents[idx], pose);
            if parts[idx] >= 0 {
                return bone.with_human(parts[idx], HumanRotationData::default());
            }
            return bone;
        })
        .collect();
    return Arc::new(RigDefinition::new(bones, 0).unwrap());
}

/// A looping walk: the root moves forward one unit per cycle, the arms swing.
pub fn walk(length: f32) -> Arc<AnimationClip> {
    return ClipBuilder::new(length)
        .hash(hash_name("walk"))
        .looped(true)
        .translation("Root", &[(0.0, Vec3::ZERO), (length, Vec3::new(0.0, 0.0, 1.0))])
        .rotation(
            "ArmL",
            &[
                (0.0, Quat::from_rotation_x(-0.5)),
                (length * 0.5, Quat::from_rotation_x(0.5)),
                (length, Quat::from_rotation_x(-0.5)),
            ],
        )
        .rotation(
            "ArmR",
            &[
                (0.0, Quat::from_rotation_x(0.5)),
                (length * 0.5, Quat::from_rotation_x(-0.5)),
                (length, Quat::from_rotation_x(0.5)),
            ],
        )
        .event(ClipEvent::new(0.25, hash_name("FootL")))
        .event(ClipEvent::new(0.75, hash_name("FootR")))
        .build_arc();
}

/// A non looping wave of the right arm.
pub fn wave() -> Arc<AnimationClip> {
    return ClipBuilder::new(1.0)
        .hash(hash_name("wave"))
        .rotation("ArmR", &[(0.0, Quat::from_rotation_z(1.0)), (1.0, Quat::from_rotation_z(1.5))])
        .rotation("HandR", &[(0.0, Quat::IDENTITY), (0.5, Quat::from_rotation_y(0.5)), (1.0, Quat::IDENTITY)])
        .build_arc();
}

/// An additive lean of the spine, 0 at the first frame.
pub fn lean() -> Arc<AnimationClip> {
    return ClipBuilder::new(1.0)
        .hash(hash_name("lean"))
        .rotation("Spine", &[(0.0, Quat::IDENTITY), (1.0, Quat::from_rotation_x(0.4))])
        .build_arc();
}

pub fn bone(rig: &RigDefinition, name: &str) -> usize {
    return rig.bone_by_hash(hash_name(name)).unwrap() as usize;
}

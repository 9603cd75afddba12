//!
//! Single clip bone sampling.
//!

use std::ops::Range;

use glam::{Quat, Vec3, Vec4};

use crate::blending_job::BlendMode;
use crate::clip::AnimationClip;
use crate::math::{quat_from_euler_xyz, quat_normalize_or_identity, quat_shortest_path, quat_weighted, BoneTransform};
use crate::rig::HumanRotationData;
use crate::track::{BindingType, RotationMode, TrackSet};

/// Which channels of a bone transform were driven by curves.
///
/// Channels that aren't animated must be filled from the reference pose, not from zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnimatedChannels {
    pub translation: bool,
    pub rotation: bool,
    pub scale: bool,
}

impl AnimatedChannels {
    pub const NONE: AnimatedChannels = AnimatedChannels {
        translation: false,
        rotation: false,
        scale: false,
    };

    pub const ALL: AnimatedChannels = AnimatedChannels {
        translation: true,
        rotation: true,
        scale: true,
    };

    #[inline]
    pub fn any(&self) -> bool {
        return self.translation || self.rotation || self.scale;
    }

    #[inline]
    pub fn union(&self, other: &AnimatedChannels) -> AnimatedChannels {
        return AnimatedChannels {
            translation: self.translation || other.translation,
            rotation: self.rotation || other.rotation,
            scale: self.scale || other.scale,
        };
    }

    /// Packs the channels into 3 bits: translation, rotation, scale.
    #[inline]
    pub fn bits(&self) -> u64 {
        return (self.translation as u64) | ((self.rotation as u64) << 1) | ((self.scale as u64) << 2);
    }

    #[inline]
    pub fn from_bits(bits: u64) -> AnimatedChannels {
        return AnimatedChannels {
            translation: bits & 0x1 != 0,
            rotation: bits & 0x2 != 0,
            scale: bits & 0x4 != 0,
        };
    }

    /// Per channel weights (translation, rotation, scale), 0 for channels not animated.
    #[inline]
    pub fn weights(&self, weight: f32) -> Vec3 {
        return Vec3::new(
            if self.translation { weight } else { 0.0 },
            if self.rotation { weight } else { 0.0 },
            if self.scale { weight } else { 0.0 },
        );
    }
}

/// Result of sampling one bone of one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledBone {
    pub transform: BoneTransform,
    pub channels: AnimatedChannels,
    /// Range of the bone tracks in the clip track set.
    pub track_range: Range<usize>,
}

/// Samples the tracks of a group at `time` (seconds).
///
/// Unanimated channels are left at identity.
pub(crate) fn sample_group(
    set: &TrackSet,
    group: usize,
    time: f32,
    human: Option<&HumanRotationData>,
) -> (BoneTransform, AnimatedChannels) {
    let mut transform = BoneTransform::IDENTITY;
    let mut channels = AnimatedChannels::NONE;
    let mut quat = Vec4::new(0.0, 0.0, 0.0, 1.0);
    let mut angles = Vec3::ZERO;
    let mut rotation_mode = None;

    for track in &set.tracks()[set.group_range(group)] {
        let value = set.sample_track(track, time);
        let channel = track.channel as usize;
        match track.binding {
            BindingType::Translation => {
                transform.position[channel] = value;
                channels.translation = true;
            }
            BindingType::Scale => {
                transform.scale[channel] = value;
                channels.scale = true;
            }
            BindingType::Rotation(mode) => {
                match mode {
                    RotationMode::Quaternion => quat[channel] = value,
                    RotationMode::Euler | RotationMode::HumanMuscle => angles[channel] = value,
                }
                rotation_mode = Some(mode);
                channels.rotation = true;
            }
            BindingType::Parameter => {}
        }
    }

    transform.rotation = match rotation_mode {
        None => Quat::IDENTITY,
        Some(RotationMode::Quaternion) => quat_normalize_or_identity(quat),
        Some(RotationMode::Euler) => quat_from_euler_xyz(angles),
        Some(RotationMode::HumanMuscle) => muscle_to_rotation(angles, human.copied().unwrap_or_default()),
    };
    return (transform, channels);
}

/// Remaps normalized muscle values in [-1, 1] to a local rotation.
pub fn muscle_to_rotation(muscles: Vec3, data: HumanRotationData) -> Quat {
    let negative = muscles.min(Vec3::ZERO);
    let positive = muscles.max(Vec3::ZERO);
    let angles = (data.min_angles * -negative + data.max_angles * positive) * data.sign;
    let rotation = quat_from_euler_xyz(angles);
    return (data.pre_rotation * rotation * data.post_rotation.conjugate()).normalize();
}

/// Relative transform of `current` against `reference`, used by additive layers.
pub fn additive_difference(current: &BoneTransform, reference: &BoneTransform) -> BoneTransform {
    let rotation = quat_shortest_path(Vec4::from(reference.rotation), current.rotation);
    let scale = Vec3::select(
        reference.scale.cmpeq(Vec3::ZERO),
        Vec3::ONE,
        current.scale / reference.scale,
    );
    return BoneTransform {
        position: current.position - reference.position,
        rotation: (rotation * reference.rotation.conjugate()).normalize(),
        scale,
    };
}

/// Removes the drift between the first and last frame of a clip, proportionally to `ratio`,
/// so that the pose at ratio 1 matches the pose at ratio 0.
pub fn loop_pose_blend(
    transform: &BoneTransform,
    start: &BoneTransform,
    end: &BoneTransform,
    ratio: f32,
) -> BoneTransform {
    let end_rotation = quat_shortest_path(Vec4::from(start.rotation), end.rotation);
    let drift_rotation = start.rotation * end_rotation.conjugate();
    let drift_scale = Vec3::select(end.scale.cmpeq(Vec3::ZERO), Vec3::ONE, start.scale / end.scale);
    return BoneTransform {
        position: transform.position - (end.position - start.position) * ratio,
        rotation: (quat_weighted(drift_rotation, ratio) * transform.rotation).normalize(),
        scale: transform.scale * Vec3::ONE.lerp(drift_scale, ratio),
    };
}

/// Samples a bone of a clip at `time` (seconds, unwrapped).
///
/// Returns `None` if the clip doesn't animate `bone_hash`, this isn't an error: the bone is just
/// not touched by the clip.
///
/// * `blend_mode` - Additive sampling subtracts the additive reference frame (the clip additive
///   reference set if any, the first frame of the clip otherwise).
/// * `human` - Muscle remapping constants of the bone, for human muscle rotation tracks.
/// * `is_root` - Root bones never get the loop pose blend correction.
pub fn sample_bone(
    clip: &AnimationClip,
    bone_hash: u32,
    time: f32,
    blend_mode: BlendMode,
    human: Option<&HumanRotationData>,
    is_root: bool,
) -> Option<SampledBone> {
    let tracks = clip.tracks();
    let group = tracks.get_group(bone_hash)?;
    let ratio = clip.sample_ratio(time);
    let (mut transform, channels) = sample_group(tracks, group, clip.ratio_to_time(ratio), human);

    if clip.loop_pose_blend() && !is_root {
        let (start, _) = sample_group(tracks, group, 0.0, human);
        let (end, _) = sample_group(tracks, group, clip.length(), human);
        transform = loop_pose_blend(&transform, &start, &end, ratio);
    }

    if blend_mode == BlendMode::Additive {
        let reference = additive_reference(clip, bone_hash, group, human);
        transform = additive_difference(&transform, &reference);
    }

    return Some(SampledBone {
        transform,
        channels,
        track_range: tracks.group_range(group),
    });
}

fn additive_reference(
    clip: &AnimationClip,
    bone_hash: u32,
    group: usize,
    human: Option<&HumanRotationData>,
) -> BoneTransform {
    if let Some(set) = clip.additive_reference() {
        if let Some(reference_group) = set.get_group(bone_hash) {
            return sample_group(set, reference_group, 0.0, human).0;
        }
    }
    return sample_group(clip.tracks(), group, 0.0, human).0;
}

/// Samples a non skeletal float parameter of a clip at `time` (seconds, unwrapped).
pub fn sample_parameter(clip: &AnimationClip, param_hash: u32, time: f32, blend_mode: BlendMode) -> Option<f32> {
    let tracks = clip.tracks();
    let group = tracks.get_group(param_hash)?;
    let track = tracks.tracks()[tracks.group_range(group)]
        .iter()
        .find(|t| t.binding == BindingType::Parameter)?;
    let value = tracks.sample_track(track, clip.ratio_to_time(clip.sample_ratio(time)));
    if blend_mode == BlendMode::Additive {
        let reference = clip
            .additive_reference()
            .and_then(|set| {
                let group = set.get_group(param_hash)?;
                let track = set.tracks()[set.group_range(group)]
                    .iter()
                    .find(|t| t.binding == BindingType::Parameter)?;
                Some(set.sample_track(track, 0.0))
            })
            .unwrap_or_else(|| tracks.sample_track(track, 0.0));
        return Some(value - reference);
    }
    return Some(value);
}

#[cfg(test)]
mod sampling_tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::hash::hash_name;
    use crate::test_utils::*;
    use crate::track::{Keyframe, TrackSetBuilder};

    #[test]
    fn test_not_animated() {
        let clip = ClipBuilder::new(1.0).translation("Hips", &[(0.0, Vec3::ZERO), (1.0, Vec3::X)]).build();
        assert!(sample_bone(&clip, hash_name("Spine"), 0.5, BlendMode::Override, None, false).is_none());
        assert!(sample_bone(&clip, hash_name("Hips"), 0.5, BlendMode::Override, None, false).is_some());
    }

    #[test]
    fn test_translation_only() {
        let clip = ClipBuilder::new(2.0)
            .translation("Hips", &[(0.0, Vec3::ZERO), (2.0, Vec3::new(2.0, 4.0, -2.0))])
            .build();
        let sampled = sample_bone(&clip, hash_name("Hips"), 0.5, BlendMode::Override, None, true).unwrap();
        assert!(sampled.transform.position.abs_diff_eq(Vec3::new(0.5, 1.0, -0.5), 1e-6));
        assert_eq!(sampled.transform.rotation, Quat::IDENTITY);
        assert_eq!(sampled.transform.scale, Vec3::ONE);
        assert_eq!(
            sampled.channels,
            AnimatedChannels {
                translation: true,
                rotation: false,
                scale: false
            }
        );
        assert_eq!(sampled.track_range, 0..3);

        // clamped after the end
        let sampled = sample_bone(&clip, hash_name("Hips"), 5.0, BlendMode::Override, None, true).unwrap();
        assert!(sampled.transform.position.abs_diff_eq(Vec3::new(2.0, 4.0, -2.0), 1e-6));
    }

    #[test]
    fn test_rotation_modes() {
        let q = Quat::from_rotation_y(0.7);
        let clip = ClipBuilder::new(1.0)
            .rotation("Quat", &[(0.0, q), (1.0, q)])
            .euler("Euler", &[(0.0, Vec3::new(FRAC_PI_2, 0.0, 0.0)), (1.0, Vec3::new(FRAC_PI_2, 0.0, 0.0))])
            .build();

        let sampled = sample_bone(&clip, hash_name("Quat"), 0.3, BlendMode::Override, None, false).unwrap();
        assert!(sampled.transform.rotation.abs_diff_eq(q, 1e-6));
        assert!(sampled.channels.rotation);

        let sampled = sample_bone(&clip, hash_name("Euler"), 0.3, BlendMode::Override, None, false).unwrap();
        assert!(sampled.transform.rotation.abs_diff_eq(Quat::from_rotation_x(FRAC_PI_2), 1e-6));
    }

    #[test]
    fn test_partial_quaternion() {
        // only w animated, other components fall back to identity
        let mut builder = TrackSetBuilder::new();
        builder.add_track(
            hash_name("Hips"),
            BindingType::Rotation(RotationMode::Quaternion),
            3,
            vec![Keyframe::flat(0.0, 2.0)],
        );
        let clip = AnimationClip::new(7, 1.0, builder.build().unwrap()).unwrap();
        let sampled = sample_bone(&clip, hash_name("Hips"), 0.0, BlendMode::Override, None, false).unwrap();
        assert!(sampled.transform.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn test_human_muscle() {
        let data = HumanRotationData {
            min_angles: Vec3::new(-1.0, -0.5, 0.0),
            max_angles: Vec3::new(2.0, 0.5, 0.0),
            ..Default::default()
        };
        assert!(muscle_to_rotation(Vec3::ZERO, data).abs_diff_eq(Quat::IDENTITY, 1e-6));
        assert!(muscle_to_rotation(Vec3::new(1.0, 0.0, 0.0), data).abs_diff_eq(Quat::from_rotation_x(2.0), 1e-6));
        assert!(muscle_to_rotation(Vec3::new(-0.5, 0.0, 0.0), data).abs_diff_eq(Quat::from_rotation_x(-0.5), 1e-6));

        let flipped = HumanRotationData {
            sign: Vec3::new(-1.0, 1.0, 1.0),
            ..data
        };
        assert!(muscle_to_rotation(Vec3::new(1.0, 0.0, 0.0), flipped).abs_diff_eq(Quat::from_rotation_x(-2.0), 1e-6));

        let corrected = HumanRotationData {
            pre_rotation: Quat::from_rotation_z(0.3),
            post_rotation: Quat::from_rotation_z(0.3),
            ..data
        };
        let expected = Quat::from_rotation_z(0.3) * Quat::from_rotation_x(2.0) * Quat::from_rotation_z(-0.3);
        assert!(muscle_to_rotation(Vec3::new(1.0, 0.0, 0.0), corrected).abs_diff_eq(expected, 1e-6));

        let clip = ClipBuilder::new(1.0)
            .muscle("Arm", &[(0.0, Vec3::new(1.0, 0.0, 0.0)), (1.0, Vec3::new(1.0, 0.0, 0.0))])
            .build();
        let sampled = sample_bone(&clip, hash_name("Arm"), 0.5, BlendMode::Override, Some(&data), false).unwrap();
        assert!(sampled.transform.rotation.abs_diff_eq(Quat::from_rotation_x(2.0), 1e-6));
    }

    #[test]
    fn test_idempotent() {
        let clip = ClipBuilder::new(1.3)
            .translation("Hips", &[(0.0, Vec3::ZERO), (0.4, Vec3::Y), (1.3, Vec3::new(1.0, 2.0, 3.0))])
            .rotation("Hips", &[(0.0, Quat::IDENTITY), (1.3, Quat::from_rotation_z(1.0))])
            .build();
        let first = sample_bone(&clip, hash_name("Hips"), 0.77, BlendMode::Override, None, false).unwrap();
        for _ in 0..10 {
            let again = sample_bone(&clip, hash_name("Hips"), 0.77, BlendMode::Override, None, false).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_loop_periodicity() {
        let clip = ClipBuilder::new(0.8)
            .looped(true)
            .translation("Hips", &[(0.0, Vec3::ZERO), (0.4, Vec3::Y), (0.8, Vec3::ZERO)])
            .rotation("Hips", &[(0.0, Quat::IDENTITY), (0.4, Quat::from_rotation_z(1.0)), (0.8, Quat::IDENTITY)])
            .build();
        for i in 0..8 {
            let t = i as f32 * 0.1;
            let base = sample_bone(&clip, hash_name("Hips"), t, BlendMode::Override, None, false).unwrap();
            for k in 1..4 {
                let time = t + k as f32 * 0.8;
                let looped = sample_bone(&clip, hash_name("Hips"), time, BlendMode::Override, None, false).unwrap();
                assert!(base.transform.abs_diff_eq(&looped.transform, 1e-4), "t={} k={}", t, k);
            }
        }
    }

    #[test]
    fn test_additive_first_frame() {
        let clip = ClipBuilder::new(1.0)
            .translation("Hips", &[(0.0, Vec3::new(1.0, 1.0, 1.0)), (1.0, Vec3::new(3.0, 1.0, 1.0))])
            .rotation("Hips", &[(0.0, Quat::from_rotation_y(0.5)), (1.0, Quat::from_rotation_y(1.5))])
            .scale("Hips", &[(0.0, Vec3::splat(2.0)), (1.0, Vec3::splat(4.0))])
            .build();
        let sampled = sample_bone(&clip, hash_name("Hips"), 1.0, BlendMode::Additive, None, false).unwrap();
        assert!(sampled.transform.position.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
        assert!(sampled.transform.rotation.abs_diff_eq(Quat::from_rotation_y(1.0), 1e-5));
        assert!(sampled.transform.scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));

        // first frame is identity
        let sampled = sample_bone(&clip, hash_name("Hips"), 0.0, BlendMode::Additive, None, false).unwrap();
        assert!(sampled.transform.abs_diff_eq(&BoneTransform::IDENTITY, 1e-6));
    }

    #[test]
    fn test_additive_reference_set() {
        let reference = ClipBuilder::new(1.0).translation("Hips", &[(0.0, Vec3::new(0.5, 0.0, 0.0))]).track_set();
        let clip = ClipBuilder::new(1.0)
            .translation("Hips", &[(0.0, Vec3::new(1.0, 0.0, 0.0)), (1.0, Vec3::new(3.0, 0.0, 0.0))])
            .additive_reference(reference)
            .build();
        let sampled = sample_bone(&clip, hash_name("Hips"), 0.0, BlendMode::Additive, None, false).unwrap();
        assert!(sampled.transform.position.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_additive_shortest_path() {
        // 359 degrees and 1 degree are 2 degrees apart
        let current = BoneTransform::new(Vec3::ZERO, -Quat::from_rotation_y(1f32.to_radians()), Vec3::ONE);
        let reference = BoneTransform::new(Vec3::ZERO, -Quat::from_rotation_y(359f32.to_radians()), Vec3::ONE);
        let diff = additive_difference(&current, &reference);
        assert!(diff.rotation.w > 0.0);
        assert!((diff.rotation.angle_between(Quat::IDENTITY) - 2f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn test_loop_pose_blend() {
        let clip = ClipBuilder::new(1.0)
            .looped(true)
            .loop_pose_blend(true)
            .translation("Hand", &[(0.0, Vec3::ZERO), (1.0, Vec3::new(0.0, 1.0, 0.0))])
            .rotation("Hand", &[(0.0, Quat::IDENTITY), (1.0, Quat::from_rotation_x(0.4))])
            .build();
        let hand = hash_name("Hand");

        let start = sample_bone(&clip, hand, 0.0, BlendMode::Override, None, false).unwrap();
        let end = sample_bone(&clip, hand, 0.99999, BlendMode::Override, None, false).unwrap();
        assert!(start.transform.abs_diff_eq(&end.transform, 1e-3));
        let middle = sample_bone(&clip, hand, 0.5, BlendMode::Override, None, false).unwrap();
        assert!(middle.transform.position.abs_diff_eq(Vec3::ZERO, 1e-5));

        // not applied to root bones
        let end = sample_bone(&clip, hand, 0.99999, BlendMode::Override, None, true).unwrap();
        assert!(end.transform.position.abs_diff_eq(Vec3::Y, 1e-3));
    }

    #[test]
    fn test_parameter() {
        let clip = ClipBuilder::new(1.0)
            .parameter("Speed", &[(0.0, 1.0), (1.0, 3.0)])
            .translation("Hips", &[(0.0, Vec3::ZERO)])
            .build();
        assert_eq!(sample_parameter(&clip, hash_name("Speed"), 0.5, BlendMode::Override), Some(2.0));
        assert_eq!(sample_parameter(&clip, hash_name("Speed"), 0.5, BlendMode::Additive), Some(1.0));
        assert_eq!(sample_parameter(&clip, hash_name("Hips"), 0.5, BlendMode::Override), None);
        assert_eq!(sample_parameter(&clip, hash_name("Jump"), 0.5, BlendMode::Override), None);
    }

    #[test]
    fn test_animated_channels_bits() {
        for bits in 0..8u64 {
            assert_eq!(AnimatedChannels::from_bits(bits).bits(), bits);
        }
        assert_eq!(AnimatedChannels::ALL.weights(0.5), Vec3::splat(0.5));
        assert_eq!(AnimatedChannels::NONE.weights(0.5), Vec3::ZERO);
        assert!(!AnimatedChannels::NONE.any());
    }
}

//!
//! Root Motion Extractor.
//!

use glam::Vec3A;
use glam_ext::Transform3A;

use crate::base::{AnimError, ROOT_MOTION_MAX_MOTIONS};
use crate::blending_job::{resolve_layer_weights_by, BlendMode, PlayingLayer, PoseAccumulator};
use crate::clip::AnimationClip;
use crate::hash::root_motion_hash;
use crate::math::BoneTransform;
use crate::rig::RigDefinition;
use crate::sampling_job::{sample_group, AnimatedChannels};

/// Last absolute root pose of one tracked motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotionHistoryEntry {
    pub motion_id: u32,
    pub last_pose: BoneTransform,
}

impl RootMotionHistoryEntry {
    const EMPTY: RootMotionHistoryEntry = RootMotionHistoryEntry {
        motion_id: 0,
        last_pose: BoneTransform::IDENTITY,
    };
}

///
/// Per rig instance root motion history, persisted across ticks.
///
/// Fixed capacity of `ROOT_MOTION_MAX_MOTIONS` entries, looked up linearly. Each tick rebuilds it
/// from the motions seen during that tick, so a motion absent for one tick is forgotten.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotionHistory {
    entries: [RootMotionHistoryEntry; ROOT_MOTION_MAX_MOTIONS],
    len: usize,
}

impl Default for RootMotionHistory {
    fn default() -> RootMotionHistory {
        return RootMotionHistory::new();
    }
}

impl RootMotionHistory {
    pub const fn new() -> RootMotionHistory {
        return RootMotionHistory {
            entries: [RootMotionHistoryEntry::EMPTY; ROOT_MOTION_MAX_MOTIONS],
            len: 0,
        };
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.len;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    #[inline]
    pub fn entries(&self) -> &[RootMotionHistoryEntry] {
        return &self.entries[..self.len];
    }

    /// Gets the last absolute pose recorded for a motion.
    pub fn get(&self, motion_id: u32) -> Option<&BoneTransform> {
        return self
            .entries()
            .iter()
            .find(|e| e.motion_id == motion_id)
            .map(|e| &e.last_pose);
    }

    #[inline]
    pub fn contains(&self, motion_id: u32) -> bool {
        return self.get(motion_id).is_some();
    }

    /// Records a motion pose. Motions already recorded keep their first pose.
    pub fn insert(&mut self, motion_id: u32, pose: BoneTransform) -> Result<(), AnimError> {
        if self.contains(motion_id) {
            return Ok(());
        }
        if self.len >= ROOT_MOTION_MAX_MOTIONS {
            return Err(AnimError::TooManyRootMotions { count: self.len + 1 });
        }
        self.entries[self.len] = RootMotionHistoryEntry {
            motion_id,
            last_pose: pose,
        };
        self.len += 1;
        return Ok(());
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// Root displacement of one rig instance over one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotionOutput {
    /// Local root delta since the previous tick.
    pub delta: Transform3A,
    /// Delta translation per second, zero for a zero tick duration.
    pub velocity: Vec3A,
}

impl Default for RootMotionOutput {
    fn default() -> RootMotionOutput {
        return RootMotionOutput {
            delta: Transform3A::IDENTITY,
            velocity: Vec3A::ZERO,
        };
    }
}

impl RootMotionOutput {
    pub fn new(delta: &BoneTransform, delta_time: f32) -> RootMotionOutput {
        let delta = Transform3A::from(*delta);
        let velocity = if delta_time > 0.0 {
            delta.translation / delta_time
        } else {
            Vec3A::ZERO
        };
        return RootMotionOutput { delta, velocity };
    }
}

/// Picks the track group hash root motion is sampled from: the dedicated root motion curves if
/// the clip has them, the ordinary root bone curves otherwise.
#[inline]
pub fn root_motion_source(clip: &AnimationClip, root_hash: u32) -> Option<u32> {
    let hash = root_motion_hash(root_hash);
    if clip.animates(hash) {
        return Some(hash);
    }
    if clip.animates(root_hash) {
        return Some(root_hash);
    }
    return None;
}

/// Samples the absolute root pose of a clip at `time` (seconds, unwrapped).
///
/// Looped clips accumulate the whole cycles elapsed: the sampled pose is pre-multiplied by
/// `cycle_delta^cycles`, where `cycle_delta = end_pose * inverse(start_pose)`.
pub fn sample_absolute_root(clip: &AnimationClip, source_hash: u32, time: f32) -> Option<BoneTransform> {
    let tracks = clip.tracks();
    let group = tracks.get_group(source_hash)?;
    let ratio = clip.sample_ratio(time);
    let (pose, _) = sample_group(tracks, group, clip.ratio_to_time(ratio), None);

    let cycles = clip.cycles(time);
    if cycles == 0 {
        return Some(pose);
    }
    let (start, _) = sample_group(tracks, group, 0.0, None);
    let (end, _) = sample_group(tracks, group, clip.length(), None);
    let cycle_delta = end.mul(&start.inverse());
    return Some(cycle_delta.powi(cycles).mul(&pose));
}

///
/// Extracts the root motion delta of one rig instance for one tick, and updates its history.
///
/// Every override layer animating the root records its absolute root pose in the history, keyed by
/// its motion id. The per step delta of a motion is `inverse(previous) * current`. On a history
/// miss the previous pose is sampled at `time - delta_time`. Deltas are mixed with the layer
/// weights of the root bone, the missing weight resolves to identity.
///
/// On error (more motions than the history can track), the history is left untouched.
///
pub fn extract_root_motion(
    layers: &[PlayingLayer],
    rig: &RigDefinition,
    history: &mut RootMotionHistory,
    delta_time: f32,
) -> Result<BoneTransform, AnimError> {
    if rig.num_bones() == 0 {
        return Ok(BoneTransform::IDENTITY);
    }
    let root = rig.root_bone();
    let root_bone = rig.bone(root);
    let root_hash = root_bone.name_hash;

    let mut motions = 0;
    for (idx, layer) in layers.iter().enumerate() {
        if is_root_motion_layer(layer, root_hash)
            && !layers[..idx]
                .iter()
                .any(|l| l.motion_id == layer.motion_id && is_root_motion_layer(l, root_hash))
        {
            motions += 1;
        }
    }
    if motions > ROOT_MOTION_MAX_MOTIONS {
        return Err(AnimError::TooManyRootMotions { count: motions });
    }

    let weights = resolve_layer_weights_by(layers, root as i32, root_bone.human_body_part, |layer| {
        is_root_motion_layer(layer, root_hash)
    });

    let mut next = RootMotionHistory::new();
    let mut acc = PoseAccumulator::default();
    for layer in layers {
        if !is_root_motion_layer(layer, root_hash) {
            continue;
        }
        let Some(source) = root_motion_source(&layer.clip, root_hash) else {
            continue;
        };
        let Some(current) = sample_absolute_root(&layer.clip, source, layer.time) else {
            continue;
        };

        let previous = match history.get(layer.motion_id) {
            Some(previous) => *previous,
            None if delta_time == 0.0 => current,
            None => sample_absolute_root(&layer.clip, source, layer.time - delta_time).unwrap_or(current),
        };
        let delta = previous.inverse().mul(&current);
        next.insert(layer.motion_id, current)?;

        let weight = weights.entry(layer);
        if weight > 0.0 && layer.includes(root as i32, root_bone.human_body_part) {
            acc.mix_override(&delta, AnimatedChannels::ALL, weight);
        }
    }

    *history = next;
    return Ok(acc.make_pretty(&BoneTransform::IDENTITY));
}

#[inline]
fn is_root_motion_layer(layer: &PlayingLayer, root_hash: u32) -> bool {
    return layer.blend_mode == BlendMode::Override && root_motion_source(&layer.clip, root_hash).is_some();
}

#[cfg(test)]
mod root_motion_tests {
    use std::sync::Arc;

    use glam::{Quat, Vec3};

    use super::*;
    use crate::hash::hash_name;
    use crate::test_utils::*;

    fn walk_clip() -> Arc<AnimationClip> {
        return ClipBuilder::new(1.0)
            .looped(true)
            .translation("Root", &[(0.0, Vec3::ZERO), (1.0, Vec3::X)])
            .build_arc();
    }

    fn rig() -> RigDefinition {
        return simple_rig(&[("Root", -1), ("Hips", 0)]);
    }

    #[test]
    fn test_history_insert() {
        let mut history = RootMotionHistory::new();
        assert!(history.is_empty());
        for id in 0..ROOT_MOTION_MAX_MOTIONS as u32 {
            history.insert(id, BoneTransform::from_position(Vec3::splat(id as f32))).unwrap();
        }
        // already tracked
        history.insert(3, BoneTransform::IDENTITY).unwrap();
        assert_eq!(history.get(3), Some(&BoneTransform::from_position(Vec3::splat(3.0))));
        assert_eq!(history.len(), ROOT_MOTION_MAX_MOTIONS);
        assert!(history.insert(1000, BoneTransform::IDENTITY).unwrap_err().is_too_many_root_motions());
        history.clear();
        assert!(history.get(3).is_none());
    }

    #[test]
    fn test_first_tick() {
        let clip = walk_clip();
        let rig = rig();
        let mut history = RootMotionHistory::new();
        let layers = vec![PlayingLayer::new(clip, 0.5).with_motion_id(1)];
        let delta = extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        assert!(delta.position.abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1e-5));
        assert_eq!(history.len(), 1);

        // zero delta time on a miss
        let mut history = RootMotionHistory::new();
        let delta = extract_root_motion(&layers, &rig, &mut history, 0.0).unwrap();
        assert!(delta.abs_diff_eq(&BoneTransform::IDENTITY, 1e-6));
    }

    #[test]
    fn test_wrap_boundary() {
        let clip = walk_clip();
        let rig = rig();
        let mut history = RootMotionHistory::new();

        let layers = vec![PlayingLayer::new(clip.clone(), 0.95).with_motion_id(1)];
        extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        let layers = vec![PlayingLayer::new(clip.clone(), 1.05).with_motion_id(1)];
        let delta = extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        assert!(delta.position.abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1e-5), "{:?}", delta.position);
    }

    #[test]
    fn test_cycle_power() {
        let clip = ClipBuilder::new(2.0)
            .looped(true)
            .translation("Root", &[(0.0, Vec3::ZERO), (2.0, Vec3::new(0.0, 0.0, 3.0))])
            .rotation("Root", &[(0.0, Quat::IDENTITY), (2.0, Quat::from_rotation_y(0.5))])
            .build();
        let root = hash_name("Root");
        let one = sample_absolute_root(&clip, root, 2.0).unwrap();
        let five = sample_absolute_root(&clip, root, 10.0).unwrap();
        let mut expected = BoneTransform::IDENTITY;
        for _ in 0..5 {
            expected = one.mul(&expected);
        }
        assert!(five.abs_diff_eq(&expected, 1e-4));

        let backward = sample_absolute_root(&clip, root, -2.0).unwrap();
        assert!(backward.abs_diff_eq(&one.inverse(), 1e-5));
    }

    #[test]
    fn test_composition_law() {
        let rig = rig();
        for looped in [false, true] {
            let clip = ClipBuilder::new(1.0)
                .looped(looped)
                .translation("Root", &[(0.0, Vec3::ZERO), (0.5, Vec3::new(1.0, 0.0, 0.5)), (1.0, Vec3::X)])
                .rotation("Root", &[(0.0, Quat::IDENTITY), (1.0, Quat::from_rotation_y(1.0))])
                .build_arc();
            let dt = 0.07;
            let mut history = RootMotionHistory::new();
            let start = 0.2;
            let layers = vec![PlayingLayer::new(clip.clone(), start).with_motion_id(9)];
            extract_root_motion(&layers, &rig, &mut history, dt).unwrap();

            let mut accumulated = BoneTransform::IDENTITY;
            let ticks = 30;
            for tick in 1..=ticks {
                let layers = vec![PlayingLayer::new(clip.clone(), start + tick as f32 * dt).with_motion_id(9)];
                let delta = extract_root_motion(&layers, &rig, &mut history, dt).unwrap();
                accumulated = accumulated.mul(&delta);
            }

            let root = hash_name("Root");
            let first = sample_absolute_root(&clip, root, start).unwrap();
            let last = sample_absolute_root(&clip, root, start + ticks as f32 * dt).unwrap();
            let direct = first.inverse().mul(&last);
            assert!(accumulated.abs_diff_eq(&direct, 1e-3), "looped={}", looped);
        }
    }

    #[test]
    fn test_stale_motion_expires() {
        let clip = walk_clip();
        let rig = rig();
        let mut history = RootMotionHistory::new();
        let layers = vec![
            PlayingLayer::new(clip.clone(), 0.2).with_motion_id(1).with_weight(0.5),
            PlayingLayer::new(clip.clone(), 0.4).with_motion_id(2).with_weight(0.5),
        ];
        extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        assert_eq!(history.len(), 2);

        let layers = vec![PlayingLayer::new(clip.clone(), 0.5).with_motion_id(2)];
        let delta = extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.contains(2));
        assert!(!history.contains(1));
        assert!(delta.position.abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_too_many_motions() {
        let clip = walk_clip();
        let rig = rig();
        let mut history = RootMotionHistory::new();
        history.insert(7, BoneTransform::from_position(Vec3::Y)).unwrap();
        let layers: Vec<_> = (0..65)
            .map(|id| PlayingLayer::new(clip.clone(), 0.5).with_motion_id(id))
            .collect();
        let err = extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap_err();
        assert_eq!(err, AnimError::TooManyRootMotions { count: 65 });
        // untouched
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(7), Some(&BoneTransform::from_position(Vec3::Y)));
    }

    #[test]
    fn test_dedicated_curves_and_complement() {
        let root = hash_name("Root");
        let clip = ClipBuilder::new(1.0)
            .translation("Root", &[(0.0, Vec3::ZERO), (1.0, Vec3::new(0.0, 9.0, 0.0))])
            .translation_hash(root_motion_hash(root), &[(0.0, Vec3::ZERO), (1.0, Vec3::new(0.0, 0.0, 2.0))])
            .build_arc();
        assert_eq!(root_motion_source(&clip, root), Some(root_motion_hash(root)));

        let rig = rig();
        let mut history = RootMotionHistory::new();
        let layers = vec![PlayingLayer::new(clip.clone(), 0.5).with_layer(0, 0.5, BlendMode::Override)];
        let delta = extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        // half of the step, the rest is identity
        assert!(delta.position.abs_diff_eq(Vec3::new(0.0, 0.0, 0.1), 1e-5));

        let output = RootMotionOutput::new(&delta, 0.1);
        assert!(output.velocity.abs_diff_eq(Vec3A::new(0.0, 0.0, 1.0), 1e-4));
        assert_eq!(RootMotionOutput::new(&delta, 0.0).velocity, Vec3A::ZERO);
    }

    #[test]
    fn test_additive_ignored() {
        let clip = walk_clip();
        let rig = rig();
        let mut history = RootMotionHistory::new();
        let layers = vec![PlayingLayer::new(clip, 0.5).with_layer(0, 1.0, BlendMode::Additive)];
        let delta = extract_root_motion(&layers, &rig, &mut history, 0.1).unwrap();
        assert_eq!(delta, BoneTransform::IDENTITY);
        assert!(history.is_empty());
    }
}

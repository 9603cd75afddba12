//!
//! Helpers baking small clips and rigs, for tests and tools.
//!

use glam::{Quat, Vec3};
use std::sync::Arc;

use crate::clip::{AnimationClip, ClipEvent};
use crate::hash::hash_name;
use crate::math::BoneTransform;
use crate::rig::{RigBone, RigDefinition};
use crate::track::{BindingType, Keyframe, RotationMode, TrackSet, TrackSetBuilder};

/// Bakes an `AnimationClip` from piecewise linear curves.
#[derive(Debug, Clone)]
pub struct ClipBuilder {
    hash: u32,
    length: f32,
    looped: bool,
    loop_pose_blend: bool,
    cycle_offset: f32,
    tracks: TrackSetBuilder,
    additive_reference: Option<TrackSet>,
    events: Vec<ClipEvent>,
}

impl ClipBuilder {
    pub fn new(length: f32) -> ClipBuilder {
        return ClipBuilder {
            hash: 0,
            length,
            looped: false,
            loop_pose_blend: false,
            cycle_offset: 0.0,
            tracks: TrackSetBuilder::new(),
            additive_reference: None,
            events: Vec::new(),
        };
    }

    pub fn hash(mut self, hash: u32) -> ClipBuilder {
        self.hash = hash;
        return self;
    }

    pub fn looped(mut self, looped: bool) -> ClipBuilder {
        self.looped = looped;
        return self;
    }

    pub fn loop_pose_blend(mut self, loop_pose_blend: bool) -> ClipBuilder {
        self.loop_pose_blend = loop_pose_blend;
        return self;
    }

    pub fn cycle_offset(mut self, cycle_offset: f32) -> ClipBuilder {
        self.cycle_offset = cycle_offset;
        return self;
    }

    pub fn additive_reference(mut self, reference: TrackSet) -> ClipBuilder {
        self.additive_reference = Some(reference);
        return self;
    }

    pub fn event(mut self, event: ClipEvent) -> ClipBuilder {
        self.events.push(event);
        return self;
    }

    /// Adds a translation curve to a bone, `keys` are (time, value).
    pub fn translation(self, bone: &str, keys: &[(f32, Vec3)]) -> ClipBuilder {
        return self.translation_hash(hash_name(bone), keys);
    }

    pub fn translation_hash(mut self, hash: u32, keys: &[(f32, Vec3)]) -> ClipBuilder {
        let channels = (0..3).map(|c| linear_channel(keys, |v| v[c])).collect();
        self.tracks.add_channels(hash, BindingType::Translation, channels);
        return self;
    }

    /// Adds a quaternion rotation curve to a bone, `keys` are (time, value).
    pub fn rotation(self, bone: &str, keys: &[(f32, Quat)]) -> ClipBuilder {
        return self.rotation_hash(hash_name(bone), keys);
    }

    pub fn rotation_hash(mut self, hash: u32, keys: &[(f32, Quat)]) -> ClipBuilder {
        let channels = (0..4).map(|c| linear_channel(keys, |q| q.to_array()[c])).collect();
        self.tracks
            .add_channels(hash, BindingType::Rotation(RotationMode::Quaternion), channels);
        return self;
    }

    /// Adds an euler (radians) rotation curve to a bone.
    pub fn euler(mut self, bone: &str, keys: &[(f32, Vec3)]) -> ClipBuilder {
        let channels = (0..3).map(|c| linear_channel(keys, |v| v[c])).collect();
        self.tracks
            .add_channels(hash_name(bone), BindingType::Rotation(RotationMode::Euler), channels);
        return self;
    }

    /// Adds a human muscle rotation curve to a bone.
    pub fn muscle(mut self, bone: &str, keys: &[(f32, Vec3)]) -> ClipBuilder {
        let channels = (0..3).map(|c| linear_channel(keys, |v| v[c])).collect();
        self.tracks
            .add_channels(hash_name(bone), BindingType::Rotation(RotationMode::HumanMuscle), channels);
        return self;
    }

    /// Adds a scale curve to a bone.
    pub fn scale(mut self, bone: &str, keys: &[(f32, Vec3)]) -> ClipBuilder {
        let channels = (0..3).map(|c| linear_channel(keys, |v| v[c])).collect();
        self.tracks.add_channels(hash_name(bone), BindingType::Scale, channels);
        return self;
    }

    /// Adds a float parameter curve.
    pub fn parameter(mut self, name: &str, keys: &[(f32, f32)]) -> ClipBuilder {
        self.tracks.add_track(
            hash_name(name),
            BindingType::Parameter,
            0,
            Keyframe::from_linear_points(keys),
        );
        return self;
    }

    /// Bakes the curves only.
    ///
    /// # Panics
    /// If a curve is malformed (empty, unsorted or non finite keys).
    pub fn track_set(&self) -> TrackSet {
        return self.tracks.build().unwrap();
    }

    /// Bakes the clip.
    ///
    /// # Panics
    /// If a curve is malformed or the length isn't strictly positive.
    pub fn build(self) -> AnimationClip {
        let mut clip = AnimationClip::new(self.hash, self.length, self.tracks.build().unwrap())
            .unwrap()
            .with_looped(self.looped)
            .with_loop_pose_blend(self.loop_pose_blend)
            .with_cycle_offset(self.cycle_offset)
            .with_events(self.events);
        if let Some(reference) = self.additive_reference {
            clip = clip.with_additive_reference(reference);
        }
        return clip;
    }

    pub fn build_arc(self) -> Arc<AnimationClip> {
        return Arc::new(self.build());
    }
}

fn linear_channel<V: Copy>(keys: &[(f32, V)], component: impl Fn(V) -> f32) -> Vec<Keyframe> {
    let points: Vec<(f32, f32)> = keys.iter().map(|(t, v)| (*t, component(*v))).collect();
    return Keyframe::from_linear_points(&points);
}

/// Builds a rig from (name, parent) pairs, reference poses are identity. Bone 0 is the root.
///
/// Panics on an invalid hierarchy.
pub fn simple_rig(bones: &[(&str, i16)]) -> RigDefinition {
    let bones = bones
        .iter()
        .map(|(name, parent)| RigBone::new(hash_name(name), *parent, BoneTransform::IDENTITY))
        .collect();
    return RigDefinition::new(bones, 0).unwrap();
}

/// Builds a rig from (name, parent, reference pose) triples. Bone 0 is the root.
pub fn rig_with_poses(bones: &[(&str, i16, BoneTransform)]) -> RigDefinition {
    let bones = bones
        .iter()
        .map(|(name, parent, pose)| RigBone::new(hash_name(name), *parent, *pose))
        .collect();
    return RigDefinition::new(bones, 0).unwrap();
}

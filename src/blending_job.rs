//!
//! Layer Weight Resolver and Pose Mixer.
//!

use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::avatar_mask::{mask_includes, AvatarMask};
use crate::base::{AnimError, AnimIndex, LAYER_MAX_COUNT, NON_SKELETAL_BONE};
use crate::clip::AnimationClip;
use crate::math::{quat_normalize_or_identity, quat_shortest_path, quat_weighted, BoneTransform};
use crate::rig::RigDefinition;
use crate::sampling_job::{sample_bone, sample_parameter, AnimatedChannels};

/// How a layer composes with the layers below it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    /// Replaces the pose below, consuming weight budget.
    #[default]
    Override,
    /// Adds a delta on top of the pose below, regardless of budget.
    Additive,
}

/// One animation playing on a rig instance.
///
/// Entries of one rig instance must be sorted by ascending `layer_index`. All entries of a layer
/// share the layer `blend_mode` and `layer_weight` (the first entry of the layer wins).
#[derive(Debug, Clone)]
pub struct PlayingLayer {
    pub clip: Arc<AnimationClip>,
    /// Accumulated playing time in seconds, unwrapped.
    pub time: f32,
    /// Weight of this animation inside its layer.
    pub weight: f32,
    pub blend_mode: BlendMode,
    pub layer_index: u32,
    /// Weight of the whole layer, in [0, 1].
    pub layer_weight: f32,
    pub avatar_mask: Option<Arc<AvatarMask>>,
    /// Stable id of this playing instance across ticks, keys the root motion history.
    pub motion_id: u32,
}

impl PlayingLayer {
    /// Creates a full weight override entry on layer 0.
    pub fn new(clip: Arc<AnimationClip>, time: f32) -> PlayingLayer {
        return PlayingLayer {
            clip,
            time,
            weight: 1.0,
            blend_mode: BlendMode::Override,
            layer_index: 0,
            layer_weight: 1.0,
            avatar_mask: None,
            motion_id: 0,
        };
    }

    pub fn with_weight(mut self, weight: f32) -> PlayingLayer {
        self.weight = weight;
        return self;
    }

    pub fn with_layer(mut self, layer_index: u32, layer_weight: f32, blend_mode: BlendMode) -> PlayingLayer {
        self.layer_index = layer_index;
        self.layer_weight = layer_weight;
        self.blend_mode = blend_mode;
        return self;
    }

    pub fn with_avatar_mask(mut self, mask: Arc<AvatarMask>) -> PlayingLayer {
        self.avatar_mask = Some(mask);
        return self;
    }

    pub fn with_motion_id(mut self, motion_id: u32) -> PlayingLayer {
        self.motion_id = motion_id;
        return self;
    }

    #[inline]
    pub fn includes(&self, bone: i32, human_body_part: i16) -> bool {
        return mask_includes(self.avatar_mask.as_deref(), bone, human_body_part);
    }
}

/// Checks the ordering and range preconditions of the playing layers of a rig instance.
///
/// Times and weights must be finite.
pub fn validate_layers(layers: &[PlayingLayer]) -> Result<(), AnimError> {
    for (position, layer) in layers.iter().enumerate() {
        if !layer.time.is_finite() || !layer.weight.is_finite() || !layer.layer_weight.is_finite() {
            return Err(AnimError::NonFiniteLayer { position });
        }
        if layer.layer_index as usize >= LAYER_MAX_COUNT {
            return Err(AnimError::LayerIndexOverflow {
                layer_index: layer.layer_index,
            });
        }
        if position > 0 && layers[position - 1].layer_index > layer.layer_index {
            return Err(AnimError::UnsortedLayers { position });
        }
    }
    return Ok(());
}

/// Effective weights of every layer for one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerWeights {
    weights: [f32; LAYER_MAX_COUNT],
    remaining: f32,
}

impl Default for LayerWeights {
    fn default() -> LayerWeights {
        return LayerWeights {
            weights: [0.0; LAYER_MAX_COUNT],
            remaining: 1.0,
        };
    }
}

impl LayerWeights {
    /// Gets the weight resolved for a layer index.
    #[inline]
    pub fn layer(&self, layer_index: u32) -> f32 {
        return self.weights.get(layer_index as usize).copied().unwrap_or(0.0);
    }

    /// Gets the override budget left after all layers, the reference pose complement.
    #[inline]
    pub fn remaining(&self) -> f32 {
        return self.remaining;
    }

    /// Gets the weight of one playing entry: its layer weight scaled by its in-layer weight.
    #[inline]
    pub fn entry(&self, layer: &PlayingLayer) -> f32 {
        return self.layer(layer.layer_index) * layer.weight.max(0.0);
    }

    /// Sums the weights of override layers.
    pub fn override_sum(&self, layers: &[PlayingLayer]) -> f32 {
        let mut sum = 0.0;
        let mut last = None;
        for layer in layers {
            if last != Some(layer.layer_index) && layer.blend_mode == BlendMode::Override {
                sum += self.layer(layer.layer_index);
            }
            last = Some(layer.layer_index);
        }
        return sum;
    }
}

///
/// Resolves the weight each layer contributes to one bone.
///
/// Layers are walked from the highest layer index to the lowest with a weight budget starting at 1.
/// A layer contributes `budget * layer_weight` if one of its entries includes the bone in its avatar
/// mask and animates it, nothing otherwise. Override layers consume what they contribute, additive
/// layers don't.
///
/// * `bone` - Bone index, `NON_SKELETAL_BONE` for animated parameters.
/// * `name_hash` - Hash the clips are queried with.
/// * `human_body_part` - Body part of the bone, negative if none.
///
pub fn resolve_layer_weights(layers: &[PlayingLayer], bone: i32, name_hash: u32, human_body_part: i16) -> LayerWeights {
    return resolve_layer_weights_by(layers, bone, human_body_part, |layer| {
        layer.clip.animates(name_hash)
    });
}

pub(crate) fn resolve_layer_weights_by(
    layers: &[PlayingLayer],
    bone: i32,
    human_body_part: i16,
    animates: impl Fn(&PlayingLayer) -> bool,
) -> LayerWeights {
    let mut result = LayerWeights::default();
    let mut budget = 1.0f32;

    let mut end = layers.len();
    while end > 0 {
        let layer_index = layers[end - 1].layer_index;
        let mut begin = end - 1;
        while begin > 0 && layers[begin - 1].layer_index == layer_index {
            begin -= 1;
        }
        let head = &layers[begin];
        let contributes = layers[begin..end]
            .iter()
            .any(|l| l.includes(bone, human_body_part) && animates(l));

        if contributes && (layer_index as usize) < LAYER_MAX_COUNT {
            let weight = budget * head.layer_weight.clamp(0.0, 1.0);
            result.weights[layer_index as usize] = weight;
            if head.blend_mode == BlendMode::Override {
                budget -= weight;
            }
        }
        end = begin;
    }

    result.remaining = budget.max(0.0);
    return result;
}

///
/// Accumulates override poses, per channel.
///
/// Rotations are summed as raw 4D vectors on the accumulator hemisphere, `make_pretty` completes
/// the weights with the reference pose and normalizes.
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseAccumulator {
    position: Vec3,
    rotation: Vec4,
    scale: Vec3,
    weights: Vec3,
    channels: AnimatedChannels,
}

impl Default for PoseAccumulator {
    fn default() -> PoseAccumulator {
        return PoseAccumulator {
            position: Vec3::ZERO,
            rotation: Vec4::ZERO,
            scale: Vec3::ZERO,
            weights: Vec3::ZERO,
            channels: AnimatedChannels::NONE,
        };
    }
}

impl PoseAccumulator {
    /// Gets the accumulated weight of each channel (translation, rotation, scale).
    #[inline]
    pub fn weights(&self) -> Vec3 {
        return self.weights;
    }

    /// Gets the channels animated by at least one mixed pose.
    #[inline]
    pub fn channels(&self) -> AnimatedChannels {
        return self.channels;
    }

    /// Mixes an override pose. Channels that aren't animated get no weight.
    pub fn mix_override(&mut self, pose: &BoneTransform, channels: AnimatedChannels, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        let w = channels.weights(weight);
        self.position += pose.position * w.x;
        let rotation = quat_shortest_path(self.rotation, pose.rotation);
        self.rotation += Vec4::from(rotation) * w.y;
        self.scale += pose.scale * w.z;
        self.weights += w;
        self.channels = self.channels.union(&channels);
    }

    /// Fills the weight complement of each channel from `reference` and normalizes.
    pub fn make_pretty(&self, reference: &BoneTransform) -> BoneTransform {
        let complement = Vec3::ONE - self.weights.clamp(Vec3::ZERO, Vec3::ONE);
        let total = self.weights + complement;

        let position = (self.position + reference.position * complement.x) / total.x;
        let reference_rotation = quat_shortest_path(self.rotation, reference.rotation);
        let rotation = self.rotation + Vec4::from(reference_rotation) * complement.y;
        let scale = (self.scale + reference.scale * complement.z) / total.z;

        return BoneTransform {
            position,
            rotation: quat_normalize_or_identity(rotation),
            scale,
        };
    }
}

/// Composes an additive delta on top of `pose`.
pub fn mix_additive(pose: &mut BoneTransform, delta: &BoneTransform, channels: AnimatedChannels, weight: f32) {
    if weight <= 0.0 {
        return;
    }
    let w = channels.weights(weight);
    pose.position += delta.position * w.x;
    if w.y > 0.0 {
        pose.rotation = (quat_weighted(delta.rotation, w.y) * pose.rotation).normalize();
    }
    pose.scale *= (Vec3::ONE - Vec3::splat(w.z)) + delta.scale * w.z;
}

/// Blended pose of one bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendedBone {
    pub transform: BoneTransform,
    pub channels: AnimatedChannels,
}

/// Samples, resolves and mixes every layer for one bone of a rig.
///
/// Override layers are mixed first and completed by the reference pose, additive layers are then
/// composed in ascending layer order.
pub fn blend_bone(layers: &[PlayingLayer], rig: &RigDefinition, bone: impl AnimIndex) -> BlendedBone {
    let bone_index = bone.i32();
    let rig_bone = rig.bone(bone_index);
    let name_hash = rig_bone.name_hash;
    let human = rig_bone.human_rotation.as_ref();
    let is_root = rig.is_root(bone_index);
    let weights = resolve_layer_weights(layers, bone_index, name_hash, rig_bone.human_body_part);

    let mut acc = PoseAccumulator::default();
    for layer in layers.iter().filter(|l| l.blend_mode == BlendMode::Override) {
        let weight = weights.entry(layer);
        if weight <= 0.0 || !layer.includes(bone_index, rig_bone.human_body_part) {
            continue;
        }
        if let Some(sampled) = sample_bone(&layer.clip, name_hash, layer.time, BlendMode::Override, human, is_root) {
            acc.mix_override(&sampled.transform, sampled.channels, weight);
        }
    }

    let mut transform = acc.make_pretty(&rig_bone.reference_pose);
    let mut channels = acc.channels();
    for layer in layers.iter().filter(|l| l.blend_mode == BlendMode::Additive) {
        let weight = weights.entry(layer);
        if weight <= 0.0 || !layer.includes(bone_index, rig_bone.human_body_part) {
            continue;
        }
        if let Some(sampled) = sample_bone(&layer.clip, name_hash, layer.time, BlendMode::Additive, human, is_root) {
            mix_additive(&mut transform, &sampled.transform, sampled.channels, weight);
            channels = channels.union(&sampled.channels);
        }
    }

    return BlendedBone { transform, channels };
}

/// Blends a non skeletal float parameter. The reference complement of a parameter is 0.
pub fn blend_parameter(layers: &[PlayingLayer], param_hash: u32) -> f32 {
    let weights = resolve_layer_weights(layers, NON_SKELETAL_BONE, param_hash, -1);

    let mut sum = 0.0;
    let mut total = 0.0;
    for layer in layers.iter().filter(|l| l.blend_mode == BlendMode::Override) {
        let weight = weights.entry(layer);
        if weight <= 0.0 {
            continue;
        }
        if let Some(value) = sample_parameter(&layer.clip, param_hash, layer.time, BlendMode::Override) {
            sum += value * weight;
            total += weight;
        }
    }
    let mut value = if total > 1.0 { sum / total } else { sum };

    for layer in layers.iter().filter(|l| l.blend_mode == BlendMode::Additive) {
        let weight = weights.entry(layer);
        if weight <= 0.0 {
            continue;
        }
        if let Some(delta) = sample_parameter(&layer.clip, param_hash, layer.time, BlendMode::Additive) {
            value += delta * weight;
        }
    }
    return value;
}

///
/// Blends the playing layers of a single rig instance into local-space bone transforms.
///
/// This is the sequential counterpart of `AnimationJob`, for one rig.
///
#[derive(Debug, Default)]
pub struct BlendingJob {
    rig: Option<Arc<RigDefinition>>,
    layers: Vec<PlayingLayer>,
    output: Vec<BoneTransform>,
    channels: Vec<AnimatedChannels>,
}

impl BlendingJob {
    /// Gets rig of `BlendingJob`.
    #[inline]
    pub fn rig(&self) -> Option<&Arc<RigDefinition>> {
        return self.rig.as_ref();
    }

    /// Sets rig of `BlendingJob`.
    ///
    /// The rig providing bone hashes and the reference pose.
    #[inline]
    pub fn set_rig(&mut self, rig: Arc<RigDefinition>) {
        self.rig = Some(rig);
    }

    /// Clears rig of `BlendingJob`.
    #[inline]
    pub fn clear_rig(&mut self) {
        self.rig = None;
    }

    #[inline]
    pub fn layers(&self) -> &[PlayingLayer] {
        return &self.layers;
    }

    /// Gets mutable layers of `BlendingJob`.
    ///
    /// Must be sorted by ascending layer index.
    #[inline]
    pub fn layers_mut(&mut self) -> &mut Vec<PlayingLayer> {
        return &mut self.layers;
    }

    /// Gets output of `BlendingJob`, one transform per bone of the rig.
    #[inline]
    pub fn output(&self) -> &[BoneTransform] {
        return &self.output;
    }

    /// Gets the animated channels of each bone, computed by the last run.
    #[inline]
    pub fn channels(&self) -> &[AnimatedChannels] {
        return &self.channels;
    }

    /// Validates `BlendingJob` parameters.
    pub fn validate(&self) -> bool {
        return self.rig.is_some() && validate_layers(&self.layers).is_ok();
    }

    /// Runs blending job's task.
    /// The validate job before any operation is performed.
    pub fn run(&mut self) -> Result<(), AnimError> {
        let rig = self.rig.as_ref().ok_or(AnimError::InvalidJob)?;
        validate_layers(&self.layers)?;

        self.output.clear();
        self.channels.clear();
        for bone in 0..rig.num_bones() {
            let blended = blend_bone(&self.layers, rig, bone);
            self.output.push(blended.transform);
            self.channels.push(blended.channels);
        }
        return Ok(());
    }
}

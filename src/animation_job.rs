//!
//! Per tick animation of many rig instances.
//!

use std::sync::Arc;

use rayon::prelude::*;

use crate::base::{AnimError, BONES_PER_FLAG_WORD, CHANNEL_BITS_PER_BONE};
use crate::blending_job::{blend_bone, blend_parameter, validate_layers, BlendedBone, PlayingLayer};
use crate::config::AnimationConfig;
use crate::event_scanning_job::{scan_events, AnimationEvent, MotionSnapshot};
use crate::math::BoneTransform;
use crate::partition::WorkPartition;
use crate::rig::RigDefinition;
use crate::root_motion_job::{extract_root_motion, RootMotionHistory, RootMotionOutput};
use crate::sampling_job::AnimatedChannels;

///
/// One animated character: a shared rig, the layers playing on it, and the state kept across
/// ticks (root motion history and the motion snapshot of the event scanner).
///
#[derive(Debug, Clone)]
pub struct RigInstance {
    pub rig: Arc<RigDefinition>,
    /// Playing layers, sorted by ascending layer index. Refreshed every tick by the caller.
    pub layers: Vec<PlayingLayer>,
    /// Hashes of the float parameters to evaluate.
    pub parameters: Vec<u32>,
    /// Replaces the root bone pose by the root motion delta.
    pub apply_root_motion: bool,
    root_motion: RootMotionHistory,
    event_snapshot: Vec<MotionSnapshot>,
}

impl RigInstance {
    pub fn new(rig: Arc<RigDefinition>) -> RigInstance {
        return RigInstance {
            rig,
            layers: Vec::new(),
            parameters: Vec::new(),
            apply_root_motion: false,
            root_motion: RootMotionHistory::new(),
            event_snapshot: Vec::new(),
        };
    }

    pub fn with_root_motion(mut self, apply_root_motion: bool) -> RigInstance {
        self.apply_root_motion = apply_root_motion;
        return self;
    }

    pub fn with_parameters(mut self, parameters: Vec<u32>) -> RigInstance {
        self.parameters = parameters;
        return self;
    }

    #[inline]
    pub fn num_bones(&self) -> usize {
        return self.rig.num_bones();
    }

    #[inline]
    pub fn root_motion_history(&self) -> &RootMotionHistory {
        return &self.root_motion;
    }

    #[inline]
    pub fn event_snapshot(&self) -> &[MotionSnapshot] {
        return &self.event_snapshot;
    }

    /// Forgets the state kept across ticks, as if the instance was just created.
    pub fn reset_history(&mut self) {
        self.root_motion.clear();
        self.event_snapshot.clear();
    }
}

/// A rig instance whose tick was aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceFailure {
    pub instance: usize,
    pub error: AnimError,
}

///
/// Animates many rig instances for one tick.
///
/// The bone counts of all instances are flattened into one index space, then every bone is
/// sampled, resolved and mixed independently. Root motion is extracted per instance afterwards,
/// events are scanned per instance.
///
/// An instance failing its preconditions (unsorted layers, layer index overflow, too many root
/// motions) doesn't abort the tick: it outputs its reference pose, keeps its history untouched and
/// is reported in `failures()`.
///
#[derive(Debug, Default)]
pub struct AnimationJob {
    delta_time: f32,
    config: AnimationConfig,
    instances: Vec<RigInstance>,

    partition: WorkPartition,
    output: Vec<BoneTransform>,
    channels: Vec<AnimatedChannels>,
    channel_flags: Vec<u64>,
    root_motions: Vec<RootMotionOutput>,
    events: Vec<Vec<AnimationEvent>>,
    parameters: Vec<Vec<f32>>,
    failures: Vec<InstanceFailure>,
}

impl AnimationJob {
    pub fn new(config: AnimationConfig) -> AnimationJob {
        return AnimationJob {
            config,
            ..Default::default()
        };
    }

    /// Gets delta time of `AnimationJob`.
    #[inline]
    pub fn delta_time(&self) -> f32 {
        return self.delta_time;
    }

    /// Sets delta time of `AnimationJob`.
    ///
    /// Duration of the tick in seconds, finite and positive or zero.
    #[inline]
    pub fn set_delta_time(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
    }

    #[inline]
    pub fn config(&self) -> &AnimationConfig {
        return &self.config;
    }

    #[inline]
    pub fn set_config(&mut self, config: AnimationConfig) {
        self.config = config;
    }

    #[inline]
    pub fn instances(&self) -> &[RigInstance] {
        return &self.instances;
    }

    /// Gets mutable instances of `AnimationJob`.
    ///
    /// Outputs of instance `i` are found at index `i` after `run`.
    #[inline]
    pub fn instances_mut(&mut self) -> &mut Vec<RigInstance> {
        return &mut self.instances;
    }

    #[inline]
    pub fn partition(&self) -> &WorkPartition {
        return &self.partition;
    }

    /// Gets the local transforms of all bones of all instances.
    #[inline]
    pub fn output(&self) -> &[BoneTransform] {
        return &self.output;
    }

    /// Gets the local transforms of the bones of an instance.
    #[inline]
    pub fn instance_output(&self, instance: usize) -> &[BoneTransform] {
        return &self.output[self.partition.bone_range(instance)];
    }

    /// Gets the packed animated channel flags, 3 bits per bone, each instance starting on a word.
    #[inline]
    pub fn channel_flags(&self) -> &[u64] {
        return &self.channel_flags;
    }

    /// Gets which channels of a bone were animated by any layer.
    pub fn bone_channels(&self, instance: usize, bone: usize) -> AnimatedChannels {
        let word = self.partition.flag_word_range(instance).start + bone / BONES_PER_FLAG_WORD;
        let shift = (bone % BONES_PER_FLAG_WORD) * CHANNEL_BITS_PER_BONE;
        return AnimatedChannels::from_bits(self.channel_flags[word] >> shift);
    }

    #[inline]
    pub fn root_motions(&self) -> &[RootMotionOutput] {
        return &self.root_motions;
    }

    #[inline]
    pub fn root_motion(&self, instance: usize) -> &RootMotionOutput {
        return &self.root_motions[instance];
    }

    /// Gets the events fired by an instance during the last tick, in causal order.
    #[inline]
    pub fn events(&self, instance: usize) -> &[AnimationEvent] {
        return &self.events[instance];
    }

    /// Gets the parameter values of an instance, in the order of `RigInstance::parameters`.
    #[inline]
    pub fn parameters(&self, instance: usize) -> &[f32] {
        return &self.parameters[instance];
    }

    /// Gets the instances whose last tick was aborted.
    #[inline]
    pub fn failures(&self) -> &[InstanceFailure] {
        return &self.failures;
    }

    /// Validates `AnimationJob` parameters.
    pub fn validate(&self) -> bool {
        return self.delta_time.is_finite() && self.delta_time >= 0.0;
    }

    /// Runs animation job's task.
    /// The validate job before any operation is performed.
    pub fn run(&mut self) -> Result<(), AnimError> {
        if !self.validate() {
            return Err(AnimError::InvalidJob);
        }

        let count = self.instances.len();
        self.partition.rebuild(self.instances.iter().map(|i| i.num_bones()));
        self.failures.clear();
        self.root_motions.clear();
        self.root_motions.resize(count, RootMotionOutput::default());
        self.events.resize_with(count, Vec::new);
        self.parameters.resize_with(count, Vec::new);

        let mut errors: Vec<Option<AnimError>> = self
            .instances
            .iter()
            .map(|i| validate_layers(&i.layers).err())
            .collect();

        self.blend_bones(&errors);
        self.extract_root_motions(&mut errors);

        for (instance, error) in errors.iter().enumerate() {
            let Some(error) = error else {
                continue;
            };
            log::warn!("rig instance {} failed: {}", instance, error);
            let range = self.partition.bone_range(instance);
            let reference_poses = self.instances[instance].rig.reference_poses();
            for (out, pose) in self.output[range.clone()].iter_mut().zip(reference_poses) {
                *out = pose;
            }
            self.channels[range].fill(AnimatedChannels::NONE);
            self.failures.push(InstanceFailure {
                instance,
                error: error.clone(),
            });
        }

        self.pack_channel_flags();
        self.scan_instances(&errors);
        return Ok(());
    }

    fn blend_bones(&mut self, errors: &[Option<AnimError>]) {
        let total = self.partition.total_bones();
        self.output.resize(total, BoneTransform::IDENTITY);
        self.channels.resize(total, AnimatedChannels::NONE);

        let instances = &self.instances;
        let partition = &self.partition;
        let blend = |flat: usize| -> BlendedBone {
            let (instance, bone) = match partition.locate(flat) {
                Some(located) => located,
                None => {
                    return BlendedBone {
                        transform: BoneTransform::IDENTITY,
                        channels: AnimatedChannels::NONE,
                    }
                }
            };
            let rig = &instances[instance].rig;
            if errors[instance].is_some() {
                return BlendedBone {
                    transform: rig.bone(bone).reference_pose,
                    channels: AnimatedChannels::NONE,
                };
            }
            return blend_bone(&instances[instance].layers, rig, bone);
        };

        if self.config.parallel {
            self.output
                .par_iter_mut()
                .zip(self.channels.par_iter_mut())
                .enumerate()
                .with_min_len(self.config.min_bones_per_task.max(1))
                .for_each(|(flat, (out, channels))| {
                    let blended = blend(flat);
                    *out = blended.transform;
                    *channels = blended.channels;
                });
        } else {
            for (flat, (out, channels)) in self.output.iter_mut().zip(self.channels.iter_mut()).enumerate() {
                let blended = blend(flat);
                *out = blended.transform;
                *channels = blended.channels;
            }
        }
    }

    fn extract_root_motions(&mut self, errors: &mut [Option<AnimError>]) {
        if !self.config.root_motion {
            return;
        }
        let delta_time = self.delta_time;
        let extract = |instance: &mut RigInstance, error: &mut Option<AnimError>| -> Option<BoneTransform> {
            if !instance.apply_root_motion || error.is_some() {
                return None;
            }
            return match extract_root_motion(&instance.layers, &instance.rig, &mut instance.root_motion, delta_time) {
                Ok(delta) => Some(delta),
                Err(err) => {
                    *error = Some(err);
                    None
                }
            };
        };

        let deltas: Vec<Option<BoneTransform>> = if self.config.parallel {
            self.instances
                .par_iter_mut()
                .zip(errors.par_iter_mut())
                .map(|(instance, error)| extract(instance, error))
                .collect()
        } else {
            self.instances
                .iter_mut()
                .zip(errors.iter_mut())
                .map(|(instance, error)| extract(instance, error))
                .collect()
        };

        for (idx, delta) in deltas.into_iter().enumerate() {
            let Some(delta) = delta else {
                continue;
            };
            let rig = &self.instances[idx].rig;
            if rig.num_bones() > 0 {
                let root = self.partition.bone_range(idx).start + rig.root_bone() as usize;
                self.output[root] = delta;
            }
            self.root_motions[idx] = RootMotionOutput::new(&delta, delta_time);
        }
    }

    fn pack_channel_flags(&mut self) {
        self.channel_flags.resize(self.partition.total_flag_words(), 0);

        let partition = &self.partition;
        let channels = &self.channels;
        let pack = |word: usize| -> u64 {
            let offsets = partition.flag_word_offsets();
            let instance = offsets.partition_point(|offset| *offset <= word) - 1;
            let bones = partition.bone_range(instance);
            let first = bones.start + (word - offsets[instance]) * BONES_PER_FLAG_WORD;
            let last = (first + BONES_PER_FLAG_WORD).min(bones.end);

            let mut bits = 0u64;
            for (idx, flat) in (first..last).enumerate() {
                bits |= channels[flat].bits() << (idx * CHANNEL_BITS_PER_BONE);
            }
            return bits;
        };

        if self.config.parallel {
            self.channel_flags
                .par_iter_mut()
                .enumerate()
                .for_each(|(word, bits)| *bits = pack(word));
        } else {
            for (word, bits) in self.channel_flags.iter_mut().enumerate() {
                *bits = pack(word);
            }
        }
    }

    fn scan_instances(&mut self, errors: &[Option<AnimError>]) {
        let delta_time = self.delta_time;
        let emit_events = self.config.emit_events;
        let scan = |instance: &mut RigInstance,
                    error: &Option<AnimError>,
                    events: &mut Vec<AnimationEvent>,
                    parameters: &mut Vec<f32>| {
            events.clear();
            parameters.clear();
            if error.is_some() {
                parameters.resize(instance.parameters.len(), 0.0);
                return;
            }
            parameters.extend(instance.parameters.iter().map(|hash| blend_parameter(&instance.layers, *hash)));
            if emit_events {
                let previous = std::mem::take(&mut instance.event_snapshot);
                scan_events(&previous, &instance.layers, delta_time, events, &mut instance.event_snapshot);
            } else {
                instance.event_snapshot.clear();
            }
        };

        if self.config.parallel {
            self.instances
                .par_iter_mut()
                .zip(errors.par_iter())
                .zip(self.events.par_iter_mut())
                .zip(self.parameters.par_iter_mut())
                .for_each(|(((instance, error), events), parameters)| scan(instance, error, events, parameters));
        } else {
            for (((instance, error), events), parameters) in self
                .instances
                .iter_mut()
                .zip(errors.iter())
                .zip(self.events.iter_mut())
                .zip(self.parameters.iter_mut())
            {
                scan(instance, error, events, parameters);
            }
        }
    }
}

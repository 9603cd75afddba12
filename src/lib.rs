mod animation_job;
mod avatar_mask;
mod base;
mod blending_job;
mod clip;
mod config;
mod event_scanning_job;
mod hash;
mod math;
mod partition;
mod perfect_hash;
mod rig;
mod root_motion_job;
mod sampling_job;
mod track;

pub mod test_utils;

pub use animation_job::{AnimationJob, InstanceFailure, RigInstance};
pub use avatar_mask::{mask_includes, AvatarMask};
pub use base::*;
pub use blending_job::{
    blend_bone, blend_parameter, mix_additive, resolve_layer_weights, validate_layers, BlendMode, BlendedBone,
    BlendingJob, LayerWeights, PlayingLayer, PoseAccumulator,
};
pub use clip::{AnimationClip, ClipEvent};
pub use config::AnimationConfig;
pub use event_scanning_job::{scan_events, AnimationEvent, EventScanningIter, EventScanningJob, MotionSnapshot};
pub use hash::{hash_name, root_motion_hash};
pub use math::*;
pub use partition::{flag_words, WorkPartition};
pub use perfect_hash::{HashSlot, PerfectHashIndex};
pub use rig::{HumanRotationData, RigBone, RigDefinition};
pub use root_motion_job::{
    extract_root_motion, root_motion_source, sample_absolute_root, RootMotionHistory, RootMotionHistoryEntry,
    RootMotionOutput,
};
pub use sampling_job::{
    additive_difference, loop_pose_blend, muscle_to_rotation, sample_bone, sample_parameter, AnimatedChannels,
    SampledBone,
};
pub use track::{sample_curve, BindingType, Keyframe, RotationMode, Track, TrackSet, TrackSetBuilder};

//!
//! Baked animation clip.
//!

use crate::base::AnimError;
use crate::math::f32_clamp_or_max;
use crate::track::TrackSet;

/// A timeline event embedded in a clip.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClipEvent {
    /// Normalized time of the event, in [0, 1].
    pub timestamp: f32,
    pub name_hash: u32,
    pub float_param: f32,
    pub int_param: i32,
    pub string_param_hash: u32,
}

impl ClipEvent {
    #[inline]
    pub fn new(timestamp: f32, name_hash: u32) -> ClipEvent {
        return ClipEvent {
            timestamp,
            name_hash,
            ..Default::default()
        };
    }
}

///
/// Immutable animation clip, produced by the baking pipeline and shared by any number of
/// playing layers.
///
/// Curves are stored in a primary `TrackSet`. An optional secondary set holds the reference
/// frame additive layers are computed against. Events are sorted by normalized timestamp.
///
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationClip {
    hash: u32,
    length: f32,
    looped: bool,
    loop_pose_blend: bool,
    cycle_offset: f32,
    tracks: TrackSet,
    additive_reference: Option<TrackSet>,
    events: Vec<ClipEvent>,
}

impl AnimationClip {
    /// Creates a non looping clip without events.
    ///
    /// * `hash` - Stable content hash computed by the baking pipeline.
    /// * `length` - Duration in seconds, strictly positive.
    pub fn new(hash: u32, length: f32, tracks: TrackSet) -> Result<AnimationClip, AnimError> {
        if !(length > 0.0 && length.is_finite()) {
            return Err(AnimError::InvalidClip(format!("invalid length {}", length)));
        }
        return Ok(AnimationClip {
            hash,
            length,
            looped: false,
            loop_pose_blend: false,
            cycle_offset: 0.0,
            tracks,
            additive_reference: None,
            events: Vec::new(),
        });
    }

    pub fn with_looped(mut self, looped: bool) -> AnimationClip {
        self.looped = looped;
        return self;
    }

    pub fn with_loop_pose_blend(mut self, loop_pose_blend: bool) -> AnimationClip {
        self.loop_pose_blend = loop_pose_blend;
        return self;
    }

    pub fn with_cycle_offset(mut self, cycle_offset: f32) -> AnimationClip {
        self.cycle_offset = cycle_offset;
        return self;
    }

    pub fn with_additive_reference(mut self, reference: TrackSet) -> AnimationClip {
        self.additive_reference = Some(reference);
        return self;
    }

    pub fn with_events(mut self, mut events: Vec<ClipEvent>) -> AnimationClip {
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.events = events;
        return self;
    }
}

impl AnimationClip {
    /// Gets the stable content hash.
    #[inline]
    pub fn hash(&self) -> u32 {
        return self.hash;
    }

    /// Gets the duration in seconds.
    #[inline]
    pub fn length(&self) -> f32 {
        return self.length;
    }

    #[inline]
    pub fn looped(&self) -> bool {
        return self.looped;
    }

    #[inline]
    pub fn loop_pose_blend(&self) -> bool {
        return self.loop_pose_blend;
    }

    #[inline]
    pub fn cycle_offset(&self) -> f32 {
        return self.cycle_offset;
    }

    #[inline]
    pub fn tracks(&self) -> &TrackSet {
        return &self.tracks;
    }

    #[inline]
    pub fn additive_reference(&self) -> Option<&TrackSet> {
        return self.additive_reference.as_ref();
    }

    #[inline]
    pub fn events(&self) -> &[ClipEvent] {
        return &self.events;
    }

    /// Tests if the clip has curves for a bone (or parameter) name hash.
    #[inline]
    pub fn animates(&self, name_hash: u32) -> bool {
        return self.tracks.contains(name_hash);
    }

    /// Converts a playing time (seconds, unwrapped) to an unwrapped normalized time.
    #[inline]
    pub fn normalized_time(&self, time: f32) -> f32 {
        let offset = if self.looped { self.cycle_offset } else { 0.0 };
        return time / self.length + offset;
    }

    /// Gets the number of whole cycles elapsed at `time`. Always 0 for non looping clips.
    #[inline]
    pub fn cycles(&self, time: f32) -> i32 {
        if !self.looped {
            return 0;
        }
        return self.normalized_time(time).floor() as i32;
    }

    /// Converts a playing time to the sampled ratio in [0, 1].
    /// Looping clips wrap, others clamp.
    #[inline]
    pub fn sample_ratio(&self, time: f32) -> f32 {
        let normalized = self.normalized_time(time);
        if self.looped {
            return normalized - normalized.floor();
        }
        return f32_clamp_or_max(normalized, 0.0, 1.0);
    }

    /// Converts a ratio to a curve time in seconds.
    #[inline]
    pub fn ratio_to_time(&self, ratio: f32) -> f32 {
        return ratio * self.length;
    }
}

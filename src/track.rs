//!
//! Keyframe curve store: keyframes, tracks and track sets.
//!

use std::ops::Range;

use crate::base::AnimError;
use crate::math::hermite;
use crate::perfect_hash::PerfectHashIndex;

/// A curve keyframe. Times are in seconds, tangents in value per second.
///
/// An infinite tangent makes the segment constant (stepped key).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
}

impl Keyframe {
    #[inline]
    pub const fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Keyframe {
        return Keyframe {
            time,
            value,
            in_tangent,
            out_tangent,
        };
    }

    /// Key with flat tangents.
    #[inline]
    pub const fn flat(time: f32, value: f32) -> Keyframe {
        return Keyframe::new(time, value, 0.0, 0.0);
    }

    /// Key holding its value until the next key.
    #[inline]
    pub const fn stepped(time: f32, value: f32) -> Keyframe {
        return Keyframe::new(time, value, f32::INFINITY, f32::INFINITY);
    }

    /// Builds keys that interpolate `points` (time, value) piecewise linearly.
    pub fn from_linear_points(points: &[(f32, f32)]) -> Vec<Keyframe> {
        let slope = |a: (f32, f32), b: (f32, f32)| {
            let dt = b.0 - a.0;
            if dt > 0.0 {
                (b.1 - a.1) / dt
            } else {
                0.0
            }
        };
        return points
            .iter()
            .enumerate()
            .map(|(idx, point)| {
                let in_tangent = if idx > 0 { slope(points[idx - 1], *point) } else { 0.0 };
                let out_tangent = if idx + 1 < points.len() {
                    slope(*point, points[idx + 1])
                } else {
                    in_tangent
                };
                let in_tangent = if idx > 0 { in_tangent } else { out_tangent };
                Keyframe::new(point.0, point.1, in_tangent, out_tangent)
            })
            .collect();
    }
}

/// Samples a curve at `time`.
///
/// Times before the first key or after the last key clamp to the boundary values, a single key
/// curve is constant, a NaN time gives the first value. Keys must be sorted by time.
pub fn sample_curve(keys: &[Keyframe], time: f32) -> f32 {
    let (first, last) = match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };
    if keys.len() == 1 || time <= first.time || time.is_nan() {
        return first.value;
    }
    if time >= last.time {
        return last.value;
    }

    let id1 = keys.partition_point(|k| k.time <= time);
    let k0 = &keys[id1 - 1];
    let k1 = &keys[id1];
    let dt = k1.time - k0.time;
    if dt <= 0.0 {
        return k1.value;
    }
    if !k0.out_tangent.is_finite() || !k1.in_tangent.is_finite() {
        return k0.value;
    }
    let s = (time - k0.time) / dt;
    return hermite(k0.value, k0.out_tangent * dt, k1.value, k1.in_tangent * dt, s);
}

/// How a rotation track group encodes the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RotationMode {
    /// Raw quaternion components, channels x, y, z, w.
    Quaternion,
    /// Euler angles in radians, channels x, y, z.
    Euler,
    /// Normalized [-1, 1] muscle values, channels x, y, z, remapped by the rig.
    HumanMuscle,
}

/// What a track animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BindingType {
    Translation,
    Rotation(RotationMode),
    Scale,
    /// Non-skeletal float parameter, single channel.
    Parameter,
}

impl BindingType {
    /// Gets the number of channels of the binding.
    #[inline]
    pub fn num_channels(&self) -> u8 {
        return match self {
            BindingType::Translation | BindingType::Scale => 3,
            BindingType::Rotation(RotationMode::Quaternion) => 4,
            BindingType::Rotation(_) => 3,
            BindingType::Parameter => 1,
        };
    }
}

/// A scalar animated channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    pub binding: BindingType,
    pub channel: u8,
    key_begin: u32,
    key_end: u32,
}

impl Track {
    /// Gets the range of the track keys in the track set keyframe pool.
    #[inline]
    pub fn keyframe_range(&self) -> Range<usize> {
        return self.key_begin as usize..self.key_end as usize;
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        return (self.key_end - self.key_begin) as usize;
    }
}

///
/// Immutable set of tracks grouped per bone (or parameter) name hash.
///
/// All tracks share one keyframe pool. Group `g` owns tracks
/// `tracks[track_groups[g]..track_groups[g + 1]]`, `track_groups` has a trailing sentinel equal
/// to the number of tracks. Groups are located by name hash through a perfect hash index.
///
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSet {
    keyframes: Vec<Keyframe>,
    tracks: Vec<Track>,
    track_groups: Vec<u32>,
    group_hashes: Vec<u32>,
    index: PerfectHashIndex,
}

impl TrackSet {
    /// Gets the keyframe pool.
    #[inline]
    pub fn keyframes(&self) -> &[Keyframe] {
        return &self.keyframes;
    }

    /// Gets all tracks.
    #[inline]
    pub fn tracks(&self) -> &[Track] {
        return &self.tracks;
    }

    /// Gets the prefix sum of group track ranges, with its trailing sentinel.
    #[inline]
    pub fn track_groups(&self) -> &[u32] {
        return &self.track_groups;
    }

    /// Gets the name hash of every group.
    #[inline]
    pub fn group_hashes(&self) -> &[u32] {
        return &self.group_hashes;
    }

    #[inline]
    pub fn num_groups(&self) -> usize {
        return self.group_hashes.len();
    }

    /// Gets the group index of a name hash, or -1 if the set doesn't animate it.
    #[inline]
    pub fn query(&self, name_hash: u32) -> i32 {
        return self.index.query(name_hash);
    }

    /// Gets the group index of a name hash.
    #[inline]
    pub fn get_group(&self, name_hash: u32) -> Option<usize> {
        return self.index.get(name_hash);
    }

    /// Tests if the set animates a name hash.
    #[inline]
    pub fn contains(&self, name_hash: u32) -> bool {
        return self.index.query(name_hash) >= 0;
    }

    /// Gets the track range of a group.
    #[inline]
    pub fn group_range(&self, group: usize) -> Range<usize> {
        return self.track_groups[group] as usize..self.track_groups[group + 1] as usize;
    }

    /// Gets the tracks of a name hash.
    #[inline]
    pub fn group(&self, name_hash: u32) -> Option<&[Track]> {
        let group = self.index.get(name_hash)?;
        return Some(&self.tracks[self.group_range(group)]);
    }

    /// Gets the keys of a track.
    #[inline]
    pub fn track_keys(&self, track: &Track) -> &[Keyframe] {
        return &self.keyframes[track.keyframe_range()];
    }

    /// Samples a track at `time` (seconds).
    #[inline]
    pub fn sample_track(&self, track: &Track, time: f32) -> f32 {
        return sample_curve(self.track_keys(track), time);
    }
}

/// Assembles a `TrackSet` from per name tracks.
///
/// This is the last step of the baking pipeline, the runtime never rebuilds a set.
#[derive(Debug, Default, Clone)]
pub struct TrackSetBuilder {
    groups: Vec<(u32, Vec<(BindingType, u8, Vec<Keyframe>)>)>,
}

impl TrackSetBuilder {
    pub fn new() -> TrackSetBuilder {
        return TrackSetBuilder::default();
    }

    /// Adds a track to the group of `name_hash`. Groups keep their first insertion order.
    pub fn add_track(
        &mut self,
        name_hash: u32,
        binding: BindingType,
        channel: u8,
        keys: Vec<Keyframe>,
    ) -> &mut TrackSetBuilder {
        match self.groups.iter_mut().find(|(hash, _)| *hash == name_hash) {
            Some((_, tracks)) => tracks.push((binding, channel, keys)),
            None => self.groups.push((name_hash, vec![(binding, channel, keys)])),
        }
        return self;
    }

    /// Adds one track per channel of a binding. `channels[i]` are the keys of channel `i`.
    pub fn add_channels(
        &mut self,
        name_hash: u32,
        binding: BindingType,
        channels: Vec<Vec<Keyframe>>,
    ) -> &mut TrackSetBuilder {
        for (channel, keys) in channels.into_iter().enumerate() {
            self.add_track(name_hash, binding, channel as u8, keys);
        }
        return self;
    }

    pub fn build(&self) -> Result<TrackSet, AnimError> {
        let mut set = TrackSet::default();
        set.track_groups.push(0);
        for (name_hash, tracks) in &self.groups {
            for (binding, channel, keys) in tracks {
                if *channel >= binding.num_channels() {
                    return Err(AnimError::InvalidClip(format!(
                        "channel {} out of range for {:?} of {:#010x}",
                        channel, binding, name_hash
                    )));
                }
                if keys.is_empty() {
                    return Err(AnimError::InvalidClip(format!("empty track of {:#010x}", name_hash)));
                }
                if keys.windows(2).any(|w| w[1].time < w[0].time) {
                    return Err(AnimError::InvalidClip(format!("unsorted keys of {:#010x}", name_hash)));
                }
                if keys.iter().any(|k| !k.time.is_finite() || !k.value.is_finite()) {
                    return Err(AnimError::InvalidClip(format!("non finite key of {:#010x}", name_hash)));
                }

                let key_begin = set.keyframes.len() as u32;
                set.keyframes.extend_from_slice(keys);
                set.tracks.push(Track {
                    binding: *binding,
                    channel: *channel,
                    key_begin,
                    key_end: set.keyframes.len() as u32,
                });
            }
            set.track_groups.push(set.tracks.len() as u32);
            set.group_hashes.push(*name_hash);
        }
        set.index = PerfectHashIndex::build(&set.group_hashes)?;
        return Ok(set);
    }
}

//!
//! Event Scanner.
//!

use std::sync::Arc;

use crate::base::AnimError;
use crate::blending_job::PlayingLayer;
use crate::clip::{AnimationClip, ClipEvent};

/// An event fired during a tick.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationEvent {
    pub name_hash: u32,
    pub float_param: f32,
    pub int_param: i32,
    pub string_param_hash: u32,
}

impl From<&ClipEvent> for AnimationEvent {
    #[inline]
    fn from(event: &ClipEvent) -> AnimationEvent {
        return AnimationEvent {
            name_hash: event.name_hash,
            float_param: event.float_param,
            int_param: event.int_param,
            string_param_hash: event.string_param_hash,
        };
    }
}

///
/// Scans the events of one clip crossed between two normalized times.
///
#[derive(Debug, Default)]
pub struct EventScanningJob {
    clip: Option<Arc<AnimationClip>>,
    from: f32,
    to: f32,
}

impl EventScanningJob {
    /// Gets clip of `EventScanningJob`.
    #[inline]
    pub fn clip(&self) -> Option<&Arc<AnimationClip>> {
        return self.clip.as_ref();
    }

    /// Sets clip of `EventScanningJob`.
    #[inline]
    pub fn set_clip(&mut self, clip: Arc<AnimationClip>) {
        self.clip = Some(clip);
    }

    /// Clears clip of `EventScanningJob`.
    #[inline]
    pub fn clear_clip(&mut self) {
        self.clip = None;
    }

    #[inline]
    pub fn from(&self) -> f32 {
        return self.from;
    }

    /// Sets from of `EventScanningJob`.
    ///
    /// Normalized time, unwrapped: 0 is the beginning of the clip, 1 is the end.
    ///
    /// - If difference between `from` and `to` is greater than 1, a looping clip is scanned
    ///   multiple times.
    /// - If `from` is greater than `to`, events are returned in reverse order.
    #[inline]
    pub fn set_from(&mut self, from: f32) {
        self.from = from;
    }

    #[inline]
    pub fn to(&self) -> f32 {
        return self.to;
    }

    /// Sets to of `EventScanningJob`. See `set_from`.
    #[inline]
    pub fn set_to(&mut self, to: f32) {
        self.to = to;
    }

    /// Validates `EventScanningJob` parameters.
    #[inline]
    pub fn validate(&self) -> bool {
        return self.clip.is_some() && self.from.is_finite() && self.to.is_finite();
    }

    /// Runs event scanning job's task.
    /// The validate job before any operation is performed.
    ///
    /// Returns an iterator of the events crossed, `from` and `to` included.
    pub fn run(&self) -> Result<EventScanningIter<'_>, AnimError> {
        if !self.validate() {
            return Err(AnimError::InvalidJob);
        }
        let clip = self.clip.as_ref().ok_or(AnimError::InvalidJob)?;
        return Ok(EventScanningIter::new(clip, self.from, self.to, true));
    }
}

#[derive(Debug)]
pub struct EventScanningIter<'t> {
    events: &'t [ClipEvent],
    start: f32,
    end: f32,
    forward: bool,
    end_inclusive: bool,
    done: bool,
    outer: f32,
    inner: isize,
}

impl<'t> EventScanningIter<'t> {
    pub(crate) fn new(clip: &'t AnimationClip, from: f32, to: f32, end_inclusive: bool) -> EventScanningIter<'t> {
        let events = clip.events();
        let forward = from < to;
        let (mut start, mut end) = if forward { (from, to) } else { (to, from) };

        let mut done = from == to || events.is_empty();
        if !clip.looped() {
            done = done || !(end > 0.0 && start < 1.0);
            start = start.max(0.0);
            end = end.min(1.0);
        }

        return EventScanningIter {
            events,
            start,
            end,
            forward,
            end_inclusive,
            done,
            outer: if forward { start.floor() } else { end.ceil() - 1.0 },
            inner: if forward { 0 } else { events.len() as isize - 1 },
        };
    }

    // The interval end is the upper bound forward, the lower bound backward.
    #[inline]
    fn before_end(&self, ratio: f32, hi: f32) -> bool {
        return ratio < hi || (self.end_inclusive && ratio == hi);
    }
}

impl<'t> Iterator for EventScanningIter<'t> {
    type Item = &'t ClipEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let count = self.events.len() as isize;
        if self.forward {
            // start => end
            while self.outer < self.end {
                let lo = self.start - self.outer;
                let hi = self.end - self.outer;
                while self.inner < count {
                    let event = &self.events[self.inner as usize];
                    self.inner += 1;
                    if !self.before_end(event.timestamp, hi) {
                        self.inner = count;
                        break;
                    }
                    if event.timestamp >= lo {
                        return Some(event);
                    }
                }
                self.inner = 0;
                self.outer += 1.0;
            }
        } else {
            // end => start
            while self.outer + 1.0 > self.start {
                let lo = self.start - self.outer;
                let hi = self.end - self.outer;
                while self.inner >= 0 {
                    let event = &self.events[self.inner as usize];
                    self.inner -= 1;
                    if event.timestamp < lo {
                        self.inner = -1;
                        break;
                    }
                    if event.timestamp <= hi {
                        return Some(event);
                    }
                }
                self.inner = count - 1;
                self.outer -= 1.0;
            }
        }

        // iterator end
        self.done = true;
        return None;
    }
}

/// Playing state of one motion at the end of a tick, compared against the next tick.
#[derive(Debug, Clone)]
pub struct MotionSnapshot {
    pub motion_id: u32,
    pub clip: Arc<AnimationClip>,
    /// Playing time in seconds, unwrapped.
    pub time: f32,
}

impl MotionSnapshot {
    #[inline]
    fn matches(&self, layer: &PlayingLayer) -> bool {
        return self.motion_id == layer.motion_id && self.clip.hash() == layer.clip.hash();
    }
}

///
/// Emits the events crossed by the playing motions of one entity since the previous tick.
///
/// * `previous` - Snapshot of the previous tick.
/// * `layers` - Motions playing this tick.
/// * `delta_time` - Tick duration, used to synthesize the previous time of new motions and to
///   flush motions that stopped playing.
/// * `events` - Output, events are appended in causal order.
/// * `snapshot` - Output, overwritten with the snapshot of this tick.
///
/// Playing motions are scanned with both ends included and stopped motions with their start
/// included, so an event lying exactly on a tick time is emitted by both ticks sharing that time.
///
pub fn scan_events(
    previous: &[MotionSnapshot],
    layers: &[PlayingLayer],
    delta_time: f32,
    events: &mut Vec<AnimationEvent>,
    snapshot: &mut Vec<MotionSnapshot>,
) {
    for layer in layers {
        let previous_time = previous
            .iter()
            .find(|s| s.matches(layer))
            .map_or(layer.time - delta_time, |s| s.time);
        if previous_time == layer.time {
            continue;
        }
        let clip = &layer.clip;
        let iter = EventScanningIter::new(
            clip,
            clip.normalized_time(previous_time),
            clip.normalized_time(layer.time),
            true,
        );
        events.extend(iter.map(AnimationEvent::from));
    }

    for ended in previous.iter().filter(|s| !layers.iter().any(|l| s.matches(l))) {
        if delta_time <= 0.0 {
            continue;
        }
        let clip = &ended.clip;
        let iter = EventScanningIter::new(
            clip,
            clip.normalized_time(ended.time),
            clip.normalized_time(ended.time + delta_time),
            false,
        );
        events.extend(iter.map(AnimationEvent::from));
    }

    snapshot.clear();
    snapshot.extend(layers.iter().map(|l| MotionSnapshot {
        motion_id: l.motion_id,
        clip: l.clip.clone(),
        time: l.time,
    }));
}

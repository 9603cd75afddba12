use rig_animation_rs::test_utils::*;
use rig_animation_rs::*;
use std::sync::Arc;

mod common;
use common::*;

fn scan(clip: &Arc<AnimationClip>, from: f32, to: f32) -> Vec<u32> {
    let mut job = EventScanningJob::default();
    job.set_clip(clip.clone());
    job.set_from(from);
    job.set_to(to);
    return job.run().unwrap().map(|e| e.name_hash).collect();
}

fn markers(looped: bool) -> Arc<AnimationClip> {
    let mut builder = ClipBuilder::new(1.0).hash(hash_name("markers")).looped(looped);
    for (idx, ts) in [0.1, 0.3, 0.5, 0.6, 0.9].iter().enumerate() {
        builder = builder.event(ClipEvent::new(*ts, idx as u32));
    }
    return builder.build_arc();
}

#[test]
fn test_scan_forward_and_backward() {
    let clip = markers(false);
    assert_eq!(scan(&clip, 0.2, 0.7), vec![1, 2, 3]);
    assert_eq!(scan(&clip, 0.7, 0.2), vec![3, 2, 1]);
    assert_eq!(scan(&clip, -1.0, 0.35), vec![0, 1]);
    assert!(scan(&clip, 1.5, 3.0).is_empty());

    let clip = markers(true);
    assert_eq!(scan(&clip, 0.7, 1.35), vec![4, 0, 1]);
    assert_eq!(scan(&clip, 1.35, 0.7), vec![1, 0, 4]);
    assert_eq!(scan(&clip, 0.55, 2.55).len(), 10);
}

fn tick(job: &mut AnimationJob, time: f32) -> Vec<u32> {
    job.instances_mut()[0].layers = vec![PlayingLayer::new(walk(2.0), time).with_motion_id(1)];
    job.run().unwrap();
    return job.events(0).iter().map(|e| e.name_hash).collect();
}

#[test]
fn test_events_across_ticks() {
    let foot_l = hash_name("FootL");
    let foot_r = hash_name("FootR");

    let mut job = AnimationJob::new(AnimationConfig::sequential());
    job.set_delta_time(0.2);
    job.instances_mut().push(RigInstance::new(humanoid()));

    let mut fired = Vec::new();
    for step in 0..=20 {
        for event in tick(&mut job, step as f32 * 0.2) {
            fired.push((step, event));
        }
    }
    assert_eq!(fired, vec![(3, foot_l), (8, foot_r), (13, foot_l), (18, foot_r)]);

    // playing backward
    let mut fired = Vec::new();
    for step in (0..=19).rev() {
        for event in tick(&mut job, step as f32 * 0.2) {
            fired.push((step, event));
        }
    }
    assert_eq!(fired, vec![(17, foot_r), (12, foot_l), (7, foot_r), (2, foot_l)]);
}

#[test]
fn test_stopped_motion_flushes_events() {
    let mut job = AnimationJob::new(AnimationConfig::sequential());
    job.set_delta_time(0.2);
    job.instances_mut().push(RigInstance::new(humanoid()));

    assert!(tick(&mut job, 0.4).is_empty());
    assert_eq!(job.instances()[0].event_snapshot().len(), 1);

    // the walk stops playing, the rest of its last tick is still scanned
    job.instances_mut()[0].layers.clear();
    job.run().unwrap();
    let names: Vec<u32> = job.events(0).iter().map(|e| e.name_hash).collect();
    assert_eq!(names, vec![hash_name("FootL")]);
    assert!(job.instances()[0].event_snapshot().is_empty());

    job.run().unwrap();
    assert!(job.events(0).is_empty());
}

#[test]
fn test_paused_motion_is_silent() {
    let mut job = AnimationJob::new(AnimationConfig::sequential());
    job.set_delta_time(0.2);
    job.instances_mut().push(RigInstance::new(humanoid()));

    assert!(tick(&mut job, 0.4).is_empty());
    assert_eq!(tick(&mut job, 0.6), vec![hash_name("FootL")]);
    assert!(tick(&mut job, 0.6).is_empty());
    assert!(tick(&mut job, 0.6).is_empty());
    assert!(tick(&mut job, 0.8).is_empty());
}

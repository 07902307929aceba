use crate::{
    Animation, BoneData, BoneTimeline, Color, CurveFrames, DrawOrderTimeline, Event, EventData,
    EventTimeline, MixBlend, MixDirection, Skeleton, SkeletonData, SlotColorTimeline, SlotData,
    Timeline,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let eps = 1e-4;
    assert!(
        (actual - expected).abs() <= eps,
        "expected {expected}, got {actual}"
    );
}

fn skeleton_data() -> Arc<SkeletonData> {
    let mut data = SkeletonData::default();
    data.bones.push(BoneData::new(0, "root", None));
    let mut arm = BoneData::new(1, "arm", Some(0));
    arm.rotation = 30.0;
    arm.x = 5.0;
    arm.scale_x = -2.0;
    data.bones.push(arm);
    for (index, name) in ["back", "middle", "front"].into_iter().enumerate() {
        data.slots.push(SlotData::new(index, name, 1));
    }
    data.events.push(EventData::new("hit"));
    Arc::new(data)
}

/// Linear one value curve through `keys`.
fn curve1(keys: &[(f32, f32)]) -> CurveFrames {
    let mut curves = CurveFrames::new(keys.len(), 0, 2);
    for (frame, &(time, value)) in keys.iter().enumerate() {
        curves.set_frame(frame, time, &[value]);
    }
    curves
}

fn apply(timeline: &Timeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend, direction: MixDirection) {
    timeline.apply(skeleton, time, time, None, alpha, blend, direction);
}

#[test]
fn rotate_is_relative_to_setup_and_idempotent() {
    let mut skeleton = Skeleton::new(skeleton_data());
    let timeline = Timeline::Rotate(BoneTimeline {
        bone: 1,
        curves: curve1(&[(0.0, 0.0), (1.0, 90.0)]),
    });

    for blend in [MixBlend::Setup, MixBlend::First, MixBlend::Replace] {
        skeleton.set_to_setup_pose();
        apply(&timeline, &mut skeleton, 0.5, 1.0, blend, MixDirection::In);
        assert_approx(skeleton.bones[1].rotation, 75.0);
        apply(&timeline, &mut skeleton, 0.5, 1.0, blend, MixDirection::In);
        assert_approx(skeleton.bones[1].rotation, 75.0);
    }

    // Add stacks on the current pose.
    skeleton.set_to_setup_pose();
    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Add, MixDirection::In);
    apply(&timeline, &mut skeleton, 0.5, 1.0, MixBlend::Add, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 120.0);
}

#[test]
fn rotate_mixes_with_alpha() {
    let mut skeleton = Skeleton::new(skeleton_data());
    let timeline = Timeline::Rotate(BoneTimeline {
        bone: 1,
        curves: curve1(&[(0.0, 40.0)]),
    });
    skeleton.bones[1].rotation = 0.0;
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 35.0);

    skeleton.bones[1].rotation = 0.0;
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 50.0);
}

#[test]
fn before_the_first_key_blends_toward_setup() {
    let mut skeleton = Skeleton::new(skeleton_data());
    let timeline = Timeline::TranslateX(BoneTimeline {
        bone: 1,
        curves: curve1(&[(0.5, 10.0), (1.0, 20.0)]),
    });

    skeleton.bones[1].x = 25.0;
    apply(&timeline, &mut skeleton, 0.25, 1.0, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].x, 5.0);

    skeleton.bones[1].x = 25.0;
    apply(&timeline, &mut skeleton, 0.25, 0.5, MixBlend::First, MixDirection::In);
    assert_approx(skeleton.bones[1].x, 15.0);

    skeleton.bones[1].x = 25.0;
    apply(&timeline, &mut skeleton, 0.25, 1.0, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.bones[1].x, 25.0);
}

#[test]
fn scale_sign_follows_direction_while_mixing() {
    let mut skeleton = Skeleton::new(skeleton_data());
    // Keys are factors of the setup scale: -0.5 * -2 = 1.
    let timeline = Timeline::ScaleX(BoneTimeline {
        bone: 1,
        curves: curve1(&[(0.0, -0.5)]),
    });

    apply(&timeline, &mut skeleton, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].scale_x, 1.0);

    // Mixing out keeps the setup sign.
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Setup, MixDirection::Out);
    assert_approx(skeleton.bones[1].scale_x, -1.5);

    // Mixing in takes the key's sign immediately.
    apply(&timeline, &mut skeleton, 0.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].scale_x, 1.5);
}

#[test]
fn rgba_mixes_from_setup_color() {
    let mut skeleton = Skeleton::new(skeleton_data());
    let mut curves = CurveFrames::new(1, 0, 5);
    curves.set_frame(0, 0.0, &[1.0, 0.0, 0.0, 1.0]);
    let timeline = Timeline::Rgba(SlotColorTimeline { slot: 2, curves });

    skeleton.slots[2].color = Color::new(0.0, 0.0, 0.0, 0.0);
    apply(&timeline, &mut skeleton, 0.3, 0.5, MixBlend::Setup, MixDirection::In);
    let color = skeleton.slots[2].color;
    assert_approx(color.r, 1.0);
    assert_approx(color.g, 0.5);
    assert_approx(color.b, 0.5);
    assert_approx(color.a, 1.0);
}

#[test]
fn draw_order_keys_reorder_and_restore() {
    let mut skeleton = Skeleton::new(skeleton_data());
    let timeline = Timeline::DrawOrder(DrawOrderTimeline {
        frames: vec![0.5, 1.0],
        draw_orders: vec![Some(vec![2, 0, 1]), None],
    });

    apply(&timeline, &mut skeleton, 0.6, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.draw_order, vec![2, 0, 1]);
    apply(&timeline, &mut skeleton, 0.2, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.draw_order, vec![2, 0, 1]);
    apply(&timeline, &mut skeleton, 0.2, 1.0, MixBlend::Setup, MixDirection::In);
    assert_eq!(skeleton.draw_order, vec![0, 1, 2]);

    apply(&timeline, &mut skeleton, 0.7, 1.0, MixBlend::Replace, MixDirection::In);
    apply(&timeline, &mut skeleton, 1.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.draw_order, vec![0, 1, 2]);
}

fn event_animation(data: &SkeletonData) -> Animation {
    let event_data = &data.events[0];
    let times = [0.0, 0.5, 0.5, 0.95];
    let events = times
        .iter()
        .enumerate()
        .map(|(i, &time)| {
            let mut event = Event::new(time, 0, event_data);
            event.int_value = i as i32;
            event
        })
        .collect();
    let timeline = Timeline::Event(EventTimeline {
        frames: times.to_vec(),
        events,
    });
    Animation::new("events", vec![timeline], 1.0)
}

fn fired(animation: &Animation, skeleton: &mut Skeleton, last_time: f32, time: f32, looped: bool) -> Vec<i32> {
    let mut events = Vec::new();
    animation.apply(
        skeleton,
        last_time,
        time,
        looped,
        Some(&mut events),
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    events.iter().map(|e| e.int_value).collect()
}

#[test]
fn events_fire_once_per_window() {
    let data = skeleton_data();
    let animation = event_animation(&data);
    let mut skeleton = Skeleton::new(data);

    assert_eq!(fired(&animation, &mut skeleton, -1.0, 0.0, false), vec![0]);
    assert_eq!(fired(&animation, &mut skeleton, 0.0, 0.4, false), Vec::<i32>::new());
    // Keys sharing a time fire together.
    assert_eq!(fired(&animation, &mut skeleton, 0.4, 0.5, false), vec![1, 2]);
    assert_eq!(fired(&animation, &mut skeleton, 0.5, 0.5, false), Vec::<i32>::new());
    assert_eq!(fired(&animation, &mut skeleton, 0.5, 1.2, false), vec![3]);
    assert_eq!(fired(&animation, &mut skeleton, 1.2, 1.4, false), Vec::<i32>::new());
}

#[test]
fn looping_fires_events_across_the_wrap() {
    let data = skeleton_data();
    let animation = event_animation(&data);
    let mut skeleton = Skeleton::new(data);

    assert_eq!(fired(&animation, &mut skeleton, 0.9, 1.1, true), vec![3, 0]);
    assert_eq!(fired(&animation, &mut skeleton, 1.1, 1.6, true), vec![1, 2]);
    assert_eq!(fired(&animation, &mut skeleton, 0.9, 1.1, false), vec![3]);
}

#[test]
fn timeline_reports_frames_and_duration() {
    let timeline = Timeline::Rotate(BoneTimeline {
        bone: 1,
        curves: curve1(&[(0.0, 0.0), (0.25, 1.0), (0.75, 2.0)]),
    });
    assert_eq!(timeline.frame_count(), 3);
    assert_eq!(timeline.frame_times(), vec![0.0, 0.25, 0.75]);
    assert_approx(timeline.duration(), 0.75);
    assert_eq!(timeline.property_ids().len(), 1);

    let translate = Timeline::Translate(BoneTimeline {
        bone: 1,
        curves: CurveFrames::new(1, 0, 3),
    });
    assert_eq!(translate.property_ids().len(), 2);
}

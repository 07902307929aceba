use crate::{
    Animation, AnimationState, AnimationStateData, AnimationStateEvent, Attachment,
    AttachmentTimeline, BoneData, BoneTimeline, Color, CurveFrames, Error, Event, EventData,
    EventTimeline, Physics, RegionAttachment, Skeleton, SkeletonData, Skin, SlotData, Timeline,
    TrackEntrySnapshot,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

type Log = Rc<RefCell<Vec<(String, String)>>>;

fn assert_approx(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() <= 1e-3,
        "expected {expected}, got {actual}"
    );
}

fn rotate(keys: &[(f32, f32)]) -> Timeline {
    let mut curves = CurveFrames::new(keys.len(), 0, 2);
    for (frame, &(time, value)) in keys.iter().enumerate() {
        curves.set_frame(frame, time, &[value]);
    }
    Timeline::Rotate(BoneTimeline { bone: 1, curves })
}

/// `walk` turns the arm a quarter over a second with `step` events at 0.1 and 0.9; `jump`
/// keys half a second of translation.
fn skeleton_data() -> Arc<SkeletonData> {
    let mut data = SkeletonData::default();
    data.bones.push(BoneData::new(0, "root", None));
    let mut arm = BoneData::new(1, "arm", Some(0));
    arm.rotation = 30.0;
    data.bones.push(arm);
    data.events.push(EventData::new("step"));

    let events = [0.1, 0.9]
        .iter()
        .map(|&time| Event::new(time, 0, &data.events[0]))
        .collect();
    let walk = Animation::new(
        "walk",
        vec![
            rotate(&[(0.0, 0.0), (1.0, 90.0)]),
            Timeline::Event(EventTimeline {
                frames: vec![0.1, 0.9],
                events,
            }),
        ],
        1.0,
    );
    let mut curves = CurveFrames::new(2, 0, 3);
    curves.set_frame(0, 0.0, &[0.0, 0.0]);
    curves.set_frame(1, 0.5, &[0.0, 10.0]);
    let jump = Animation::new(
        "jump",
        vec![Timeline::Translate(BoneTimeline { bone: 1, curves })],
        0.5,
    );
    data.animations.push(Arc::new(walk));
    data.animations.push(Arc::new(jump));
    Arc::new(data)
}

fn state_with_log(data: &Arc<SkeletonData>) -> (AnimationState, Log) {
    let mut state = AnimationState::new(AnimationStateData::new(Arc::clone(data)));
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    state.add_listener(move |_: &mut AnimationState, entry: &TrackEntrySnapshot, event: &AnimationStateEvent| {
        let kind = match event {
            AnimationStateEvent::Event(e) => format!("event {}", e.time),
            other => format!("{other:?}").to_lowercase(),
        };
        sink.borrow_mut().push((entry.animation.name.clone(), kind));
    });
    (state, log)
}

fn drain(log: &Log) -> Vec<(String, String)> {
    std::mem::take(&mut *log.borrow_mut())
}

fn entries(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|&(a, e)| (a.to_string(), e.to_string()))
        .collect()
}

fn step(state: &mut AnimationState, skeleton: &mut Skeleton, delta: f32) {
    state.update(delta);
    state.apply(skeleton);
    skeleton.update_world_transform(Physics::None);
}

#[test]
fn events_and_complete_are_delivered_in_order() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    state.set_animation_by_name(0, "walk", true).unwrap();
    assert_eq!(drain(&log), entries(&[("walk", "start")]));

    step(&mut state, &mut skeleton, 0.6);
    assert_eq!(drain(&log), entries(&[("walk", "event 0.1")]));

    // Crossing the loop: the late event, the completion, then the early event again.
    step(&mut state, &mut skeleton, 0.6);
    assert_eq!(
        drain(&log),
        entries(&[("walk", "event 0.9"), ("walk", "complete"), ("walk", "event 0.1")])
    );
}

#[test]
fn replacing_an_unapplied_entry_skips_the_mix() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    state.data_mut().default_mix = 0.2;

    state.set_animation_by_name(0, "walk", true).unwrap();
    let jump = state.set_animation_by_name(0, "jump", false).unwrap();
    assert_eq!(state.mixing_from(jump), None);
    assert_eq!(state.entry(jump).unwrap().mix_duration(), 0.0);
    assert_eq!(
        drain(&log),
        entries(&[
            ("walk", "start"),
            ("walk", "interrupt"),
            ("walk", "end"),
            ("walk", "dispose"),
            ("jump", "start"),
        ])
    );
    assert_eq!(state.active_entry_count(), 1);
}

#[test]
fn applied_entry_mixes_out_then_is_disposed() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    state.data_mut().set_mix("walk", "jump", 0.2).unwrap();
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    let walk = state.set_animation_by_name(0, "walk", true).unwrap();
    step(&mut state, &mut skeleton, 0.05);
    let jump = state.set_animation_by_name(0, "jump", false).unwrap();
    assert_eq!(state.mixing_from(jump), Some(walk));
    assert_approx(state.entry(jump).unwrap().mix_duration(), 0.2);
    assert_eq!(state.active_entry_count(), 2);

    for _ in 0..5 {
        step(&mut state, &mut skeleton, 0.1);
    }
    assert_eq!(state.mixing_from(jump), None);
    assert!(state.entry(walk).is_none(), "walk handle is stale once disposed");
    assert_eq!(state.active_entry_count(), 1);

    let log = drain(&log);
    let position = |entry: (&str, &str)| {
        log.iter()
            .position(|(a, e)| a == entry.0 && e == entry.1)
            .unwrap_or_else(|| panic!("{entry:?} not in {log:?}"))
    };
    assert!(position(("walk", "interrupt")) < position(("jump", "start")));
    assert!(position(("walk", "end")) < position(("walk", "dispose")));
}

#[test]
fn queued_entry_starts_after_the_previous_completes() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    state.set_animation_by_name(0, "walk", false).unwrap();
    let jump = state.add_animation_by_name(0, "jump", false, 0.0).unwrap();
    assert_approx(state.entry(jump).unwrap().delay, 1.0);
    let walk = state.current(0).unwrap();
    assert_eq!(state.entry(walk).unwrap().next(), Some(jump));

    step(&mut state, &mut skeleton, 0.5);
    step(&mut state, &mut skeleton, 0.6);
    // The switch is decided from the track time of the previous update.
    assert_eq!(state.current(0), Some(walk));
    step(&mut state, &mut skeleton, 0.1);
    assert_eq!(state.current(0), Some(jump));
    // Time past the switch point carries into the queued entry.
    assert_approx(state.entry(jump).unwrap().track_time, 0.2);

    let log = drain(&log);
    assert!(log.contains(&("walk".to_string(), "complete".to_string())), "{log:?}");
    assert!(log.contains(&("jump".to_string(), "start".to_string())), "{log:?}");
}

#[test]
fn clearing_tracks_disposes_every_entry() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    let baseline = state.active_entry_count();

    state.set_animation_by_name(0, "walk", true).unwrap();
    state.add_animation_by_name(0, "jump", false, 2.0).unwrap();
    state.set_animation_by_name(1, "jump", true).unwrap();
    assert_eq!(state.active_entry_count(), baseline + 3);

    state.clear_tracks();
    assert_eq!(state.active_entry_count(), baseline);
    assert_eq!(state.current(0), None);
    assert_eq!(state.current(1), None);
    let log = drain(&log);
    assert_eq!(log.iter().filter(|(_, e)| e == "dispose").count(), 3, "{log:?}");

    // Disposed entries are reused.
    state.set_animation_by_name(0, "walk", true).unwrap();
    assert_eq!(state.active_entry_count(), baseline + 1);
}

#[test]
fn empty_animation_mixes_back_to_setup() {
    let data = skeleton_data();
    let (mut state, _log) = state_with_log(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    state.set_animation_by_name(0, "walk", true).unwrap();
    step(&mut state, &mut skeleton, 0.5);
    assert_approx(skeleton.bones[1].rotation, 75.0);

    state.set_empty_animation(0, 0.5);
    step(&mut state, &mut skeleton, 0.25);
    let rotation = skeleton.bones[1].rotation;
    assert!(rotation > 30.0 && rotation < 75.0, "mid-mix rotation {rotation}");

    for _ in 0..4 {
        step(&mut state, &mut skeleton, 0.25);
    }
    assert_approx(skeleton.bones[1].rotation, 30.0);
}

#[test]
fn unknown_names_are_reported() {
    let data = skeleton_data();
    let (mut state, _log) = state_with_log(&data);
    let err = state.set_animation_by_name(0, "run", true).unwrap_err();
    assert!(matches!(err, Error::UnknownAnimation { .. }), "{err}");
    let err = state.data_mut().set_mix("walk", "run", 0.1).unwrap_err();
    assert!(matches!(err, Error::UnknownAnimation { .. }), "{err}");
    let err = state.data_mut().set_mix("walk", "jump", -1.0).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }), "{err}");
}

#[test]
fn time_scale_and_delay_hold_back_a_track() {
    let data = skeleton_data();
    let (mut state, _log) = state_with_log(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    let walk = state.set_animation_by_name(0, "walk", true).unwrap();
    state.entry_mut(walk).unwrap().time_scale = 0.5;
    step(&mut state, &mut skeleton, 0.5);
    assert_approx(state.entry(walk).unwrap().track_time, 0.25);
    assert!(state.entry(walk).unwrap().was_applied());

    state.clear_tracks();
    let walk = state.add_animation_by_name(0, "walk", true, 0.3).unwrap();
    step(&mut state, &mut skeleton, 0.2);
    assert_approx(state.entry(walk).unwrap().delay, 0.1);
    assert!(!state.entry(walk).unwrap().was_applied());
}

fn count(log: &[(String, String)], animation: &str, kind: &str) -> usize {
    log.iter().filter(|(a, k)| a == animation && k == kind).count()
}

#[test]
fn complete_fires_when_one_update_spans_a_loop() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    state.set_animation_by_name(0, "jump", true).unwrap();
    step(&mut state, &mut skeleton, 0.0);
    drain(&log);

    // Exactly one loop.
    step(&mut state, &mut skeleton, 0.5);
    assert_eq!(count(&drain(&log), "jump", "complete"), 1);

    // Several loops in one update still complete once.
    step(&mut state, &mut skeleton, 1.2);
    assert_eq!(count(&drain(&log), "jump", "complete"), 1);

    step(&mut state, &mut skeleton, 0.1);
    assert_eq!(count(&drain(&log), "jump", "complete"), 0);
}

#[test]
fn changing_the_mix_duration_moves_the_queued_start() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    let walk = state.set_animation_by_name(0, "walk", false).unwrap();
    let jump = state.add_animation_by_name(0, "jump", false, 0.0).unwrap();
    assert_approx(state.entry(jump).unwrap().delay, 1.0);

    state.set_mix_duration(jump, 0.5, 0.0);
    assert_approx(state.entry(jump).unwrap().mix_duration(), 0.5);
    assert_approx(state.entry(jump).unwrap().delay, 0.5);

    step(&mut state, &mut skeleton, 0.3);
    step(&mut state, &mut skeleton, 0.3);
    assert_eq!(state.current(0), Some(walk));
    step(&mut state, &mut skeleton, 0.1);
    assert_eq!(state.current(0), Some(jump));
    assert_eq!(state.mixing_from(jump), Some(walk));
    assert_eq!(count(&drain(&log), "jump", "start"), 1);

    // An explicit delay is kept as is.
    let again = state.add_animation_by_name(0, "walk", false, 0.0).unwrap();
    state.set_mix_duration(again, 0.2, 0.75);
    assert_approx(state.entry(again).unwrap().delay, 0.75);
}

#[test]
fn listeners_can_start_animations_while_events_drain() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    state.add_listener(
        |state: &mut AnimationState, entry: &TrackEntrySnapshot, event: &AnimationStateEvent| {
            if *event == AnimationStateEvent::Complete && entry.animation.name == "walk" {
                state.set_animation_by_name(0, "jump", false).unwrap();
            }
        },
    );
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    let walk = state.set_animation_by_name(0, "walk", false).unwrap();
    step(&mut state, &mut skeleton, 0.6);
    drain(&log);

    // The nested call queues more events; the same drain delivers them in order.
    step(&mut state, &mut skeleton, 0.6);
    assert_eq!(
        drain(&log),
        entries(&[
            ("walk", "event 0.9"),
            ("walk", "complete"),
            ("walk", "interrupt"),
            ("jump", "start"),
        ])
    );
    let jump = state.current(0).unwrap();
    assert_eq!(state.mixing_from(jump), Some(walk));

    step(&mut state, &mut skeleton, 0.1);
    step(&mut state, &mut skeleton, 0.1);
    let log = drain(&log);
    assert_eq!(count(&log, "walk", "end"), 1, "{log:?}");
    assert_eq!(count(&log, "walk", "dispose"), 1, "{log:?}");
    assert_eq!(state.active_entry_count(), 1);
}

#[test]
fn hold_previous_keeps_the_outgoing_pose_while_mixing() {
    let data = skeleton_data();
    for (hold_previous, expected) in [(false, 63.75), (true, 97.5)] {
        let mut state = AnimationState::new(AnimationStateData::new(Arc::clone(&data)));
        state.data_mut().set_mix("walk", "jump", 0.5).unwrap();
        let mut skeleton = Skeleton::new(Arc::clone(&data));

        state.set_animation_by_name(0, "walk", true).unwrap();
        step(&mut state, &mut skeleton, 0.5);
        assert_approx(skeleton.bones[1].rotation, 75.0);

        let jump = state.set_animation_by_name(0, "jump", false).unwrap();
        state.entry_mut(jump).unwrap().hold_previous = hold_previous;
        step(&mut state, &mut skeleton, 0.25);
        // walk is at 0.75 (setup 30 + 67.5) and the mix is half done.
        assert_approx(skeleton.bones[1].rotation, expected);
    }
}

#[test]
fn clearing_notifications_still_returns_entries_to_the_pool() {
    let data = skeleton_data();
    let (mut state, log) = state_with_log(&data);
    state.add_listener(
        |state: &mut AnimationState, entry: &TrackEntrySnapshot, event: &AnimationStateEvent| {
            if *event == AnimationStateEvent::Complete && entry.animation.name == "walk" {
                state.clear_tracks();
                state.clear_listener_notifications();
            }
        },
    );
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    let walk = state.set_animation_by_name(0, "walk", false).unwrap();
    state.add_animation_by_name(0, "jump", false, 5.0).unwrap();
    assert_eq!(state.active_entry_count(), 2);
    step(&mut state, &mut skeleton, 1.1);
    step(&mut state, &mut skeleton, 0.1);

    let log = drain(&log);
    assert_eq!(count(&log, "walk", "end"), 0, "{log:?}");
    assert_eq!(count(&log, "jump", "dispose"), 0, "{log:?}");
    assert_eq!(state.current(0), None);
    assert!(state.entry(walk).is_none());
    assert_eq!(state.active_entry_count(), 0);
}

fn region(name: &str) -> Attachment {
    Attachment::Region(RegionAttachment {
        name: name.to_string(),
        path: name.to_string(),
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: 0.0,
        width: 1.0,
        height: 1.0,
        color: Color::WHITE,
        region: None,
        sequence: None,
    })
}

#[test]
fn attachment_keys_need_the_alpha_threshold() {
    let mut data = SkeletonData::default();
    data.bones.push(BoneData::new(0, "root", None));
    let mut slot = SlotData::new(0, "hand", 0);
    slot.attachment_name = Some("open".to_string());
    data.slots.push(slot);
    data.attachments.push(region("open"));
    data.attachments.push(region("fist"));
    let mut skin = Skin::new("default");
    skin.set_attachment(0, "open", 0);
    skin.set_attachment(0, "fist", 1);
    data.skins.push(skin);
    data.default_skin = Some(0);
    let grab = Timeline::Attachment(AttachmentTimeline {
        slot: 0,
        frames: vec![0.0],
        attachment_names: vec![Some("fist".to_string())],
    });
    data.animations.push(Arc::new(Animation::new("grab", vec![grab], 1.0)));
    let data = Arc::new(data);

    for (threshold, expected) in [(0.5, Some(0)), (0.2, Some(1))] {
        let mut state = AnimationState::new(AnimationStateData::new(Arc::clone(&data)));
        let mut skeleton = Skeleton::new(Arc::clone(&data));
        skeleton.set_to_setup_pose();

        let grab = state.set_animation_by_name(0, "grab", true).unwrap();
        let entry = state.entry_mut(grab).unwrap();
        entry.alpha = 0.3;
        entry.alpha_attachment_threshold = threshold;
        step(&mut state, &mut skeleton, 0.1);
        assert_eq!(skeleton.slots[0].attachment(), expected, "threshold {threshold}");
    }
}

use crate::{AnimationState, AnimationStateData, AnimationStateEvent, Physics, Skeleton, SkeletonData, TrackEntrySnapshot};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

const JSON: &str = r#"
{
  "skeleton": { "spine": "4.2.40", "fps": 60 },
  "bones": [
    { "name": "root" },
    { "name": "hip", "parent": "root", "y": 40, "rotation": 10 }
  ],
  "events": {
    "land": {}
  },
  "animations": {
    "walk": {
      "bones": {
        "hip": {
          "rotate": [ { "value": 0 }, { "time": 0.5, "value": 20 }, { "time": 1, "value": 0 } ]
        }
      }
    },
    "jump": {
      "bones": {
        "hip": {
          "translate": [ { "x": 0, "y": 0 }, { "time": 0.5, "x": 0, "y": 10 } ]
        }
      },
      "events": [ { "time": 0.4, "name": "land" } ]
    }
  }
}
"#;

type Log = Rc<RefCell<Vec<(String, String)>>>;

fn recording_state(data: &Arc<SkeletonData>) -> (AnimationState, Log) {
    let mut state = AnimationState::new(AnimationStateData::new(Arc::clone(data)));
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    state.add_listener(
        move |_: &mut AnimationState, entry: &TrackEntrySnapshot, event: &AnimationStateEvent| {
            let kind = match event {
                AnimationStateEvent::Event(_) => "event".to_string(),
                other => format!("{other:?}").to_lowercase(),
            };
            sink.borrow_mut().push((entry.animation.name.clone(), kind));
        },
    );
    (state, log)
}

fn position(log: &[(String, String)], animation: &str, kind: &str) -> usize {
    log.iter()
        .position(|(a, k)| a == animation && k == kind)
        .unwrap_or_else(|| panic!("({animation}, {kind}) not in {log:?}"))
}

#[test]
fn walk_then_jump_then_rest() {
    let data = SkeletonData::from_json_str(JSON).unwrap();
    let (mut state, log) = recording_state(&data);
    state.data_mut().default_mix = 0.1;
    let baseline = state.active_entry_count();
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    state.set_animation_by_name(0, "walk", true).unwrap();
    let jump = state.add_animation_by_name(0, "jump", false, 0.0).unwrap();
    // Starts one mix duration before walk completes its loop.
    assert!((state.entry(jump).unwrap().delay - 0.9).abs() < 1e-4);
    // Rest a little after jump completes.
    state.add_empty_animation(0, 0.1, 0.6);

    let delta = 1.0 / 60.0;
    for _ in 0..180 {
        state.update(delta);
        skeleton.update(delta);
        state.apply(&mut skeleton);
        skeleton.update_world_transform(Physics::Update);
    }

    let log = log.borrow();
    assert_eq!(log[0], ("walk".to_string(), "start".to_string()));
    let jump_start = position(&log, "jump", "start");
    let land = position(&log, "jump", "event");
    let jump_complete = position(&log, "jump", "complete");
    let jump_end = position(&log, "jump", "end");
    assert!(position(&log, "walk", "interrupt") < jump_start);
    assert!(jump_start < land && land < jump_complete && jump_complete < jump_end, "{log:?}");
    assert!(position(&log, "walk", "end") < position(&log, "walk", "dispose"));
    assert!(position(&log, "<empty>", "end") > jump_end);

    // Every entry went back to the pool and the pose mixed back to setup.
    assert_eq!(state.active_entry_count(), baseline);
    assert_eq!(state.current(0), None);
    let hip = &skeleton.bones[data.find_bone("hip").unwrap()];
    assert!((hip.rotation - 10.0).abs() < 1e-3, "rotation {}", hip.rotation);
    assert!((hip.y - 40.0).abs() < 1e-3, "y {}", hip.y);
}

#[test]
fn upper_track_layers_with_alpha() {
    let data = SkeletonData::from_json_str(JSON).unwrap();
    let (mut state, _log) = recording_state(&data);
    let mut skeleton = Skeleton::new(Arc::clone(&data));

    state.set_animation_by_name(0, "walk", true).unwrap();
    let jump = state.set_animation_by_name(1, "jump", true).unwrap();
    state.entry_mut(jump).unwrap().alpha = 0.5;

    for _ in 0..3 {
        state.update(0.25 / 3.0);
        state.apply(&mut skeleton);
    }
    let hip = &skeleton.bones[data.find_bone("hip").unwrap()];
    // Walk at 0.25 adds 10 degrees; jump adds half of its 5 unit lift.
    assert!((hip.rotation - 20.0).abs() < 1e-3, "rotation {}", hip.rotation);
    assert!((hip.y - 42.5).abs() < 1e-3, "y {}", hip.y);

    // Applying again without advancing time leaves the pose unchanged.
    state.apply(&mut skeleton);
    let hip = &skeleton.bones[data.find_bone("hip").unwrap()];
    assert!((hip.y - 42.5).abs() < 1e-3, "y {}", hip.y);
}

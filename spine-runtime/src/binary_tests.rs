use crate::{Error, MixBlend, MixDirection, Physics, Skeleton, SkeletonData, Timeline};
use byteorder::{BigEndian, WriteBytesExt};
use std::sync::Arc;

const JSON: &str = r#"
{
  "skeleton": { "spine": "4.2.43" },
  "bones": [
    { "name": "root" },
    { "name": "hip", "parent": "root", "x": 10, "y": 20, "rotation": 15, "length": 30 },
    { "name": "arm", "parent": "hip", "x": 30, "rotation": -40, "scaleX": 1.5 }
  ],
  "slots": [
    { "name": "body", "bone": "hip" }
  ],
  "events": {
    "step": { "int": 3 }
  },
  "animations": {
    "walk": {
      "bones": {
        "hip": {
          "rotate": [
            { "value": 0, "curve": [ 0.25, 0, 0.75, 45 ] },
            { "time": 1, "value": 45 }
          ]
        },
        "arm": {
          "translate": [
            { "x": 0, "y": 0 },
            { "time": 0.5, "x": 10, "y": -5, "curve": "stepped" },
            { "time": 1, "x": 0, "y": 0 }
          ]
        }
      },
      "events": [
        { "time": 0.5, "name": "step" }
      ]
    }
  }
}
"#;

/// Big-endian writer for the subset of the `.skel` layout the tests need.
#[derive(Default)]
struct SkelWriter {
    bytes: Vec<u8>,
}

impl SkelWriter {
    fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(u8::from(value))
    }

    fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.write_i32::<BigEndian>(value).unwrap();
        self
    }

    fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.write_f32::<BigEndian>(value).unwrap();
        self
    }

    fn floats(&mut self, values: &[f32]) -> &mut Self {
        for &value in values {
            self.f32(value);
        }
        self
    }

    fn varint(&mut self, mut value: u32) -> &mut Self {
        while value >= 0x80 {
            self.bytes.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.bytes.push(value as u8);
        self
    }

    fn signed(&mut self, value: i32) -> &mut Self {
        self.varint(((value << 1) ^ (value >> 31)) as u32)
    }

    fn string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            None => self.varint(0),
            Some(s) => {
                self.varint(s.len() as u32 + 1);
                self.bytes.extend_from_slice(s.as_bytes());
                self
            }
        }
    }

    /// Bone with the setup transform `rotation, x, y, scale_x, scale_y, shear_x, shear_y,
    /// length` and normal inheritance.
    fn bone(&mut self, name: &str, parent: Option<u32>, transform: [f32; 8]) -> &mut Self {
        self.string(Some(name));
        if let Some(parent) = parent {
            self.varint(parent);
        }
        self.floats(&transform).u8(0).bool(false)
    }
}

/// The `JSON` skeleton in binary form.
fn walk_skel(version: &str) -> Vec<u8> {
    walk_skel_with_audio(version, None)
}

/// `walk_skel` with an audio path on the `step` event, which adds volume and balance to the
/// event definition and to every key.
fn walk_skel_with_audio(version: &str, audio: Option<&str>) -> Vec<u8> {
    let mut w = SkelWriter::default();
    w.i32(0).i32(0).string(Some(version));
    w.floats(&[0.0, 0.0, 0.0, 0.0, 100.0]).bool(false);
    // String table.
    w.varint(0);

    w.varint(3);
    w.bone("root", None, [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    w.bone("hip", Some(0), [15.0, 10.0, 20.0, 1.0, 1.0, 0.0, 0.0, 30.0]);
    w.bone("arm", Some(1), [-40.0, 30.0, 0.0, 1.5, 1.0, 0.0, 0.0, 0.0]);

    w.varint(1);
    w.string(Some("body")).varint(1).i32(-1).i32(-1).varint(0).varint(0);

    // Ik, transform, path and physics constraints, default skin slots, skins.
    for _ in 0..6 {
        w.varint(0);
    }

    w.varint(1);
    w.string(Some("step")).signed(3).f32(0.0).string(None).string(audio);
    if audio.is_some() {
        w.f32(0.8).f32(-0.5);
    }

    w.varint(1);
    w.string(Some("walk")).varint(3);
    // Slot timelines.
    w.varint(0);
    // Bone timelines.
    w.varint(2);
    w.varint(1).varint(1);
    w.u8(0).varint(2).varint(1);
    w.floats(&[0.0, 0.0, 1.0, 45.0]).u8(2).floats(&[0.25, 0.0, 0.75, 45.0]);
    w.varint(2).varint(1);
    w.u8(1).varint(3).varint(0);
    w.floats(&[0.0, 0.0, 0.0, 0.5, 10.0, -5.0]).u8(0);
    w.floats(&[1.0, 0.0, 0.0]).u8(1);
    // Ik, transform, path, physics, attachment and draw order timelines.
    for _ in 0..6 {
        w.varint(0);
    }
    // Events.
    w.varint(1);
    w.f32(0.5).varint(0).signed(3).f32(0.0).string(None);
    if audio.is_some() {
        w.f32(0.25).f32(0.5);
    }
    w.bytes
}

fn pose_at(data: &Arc<SkeletonData>, animation: &str, time: f32) -> Skeleton {
    let animation = data.find_animation(animation).expect("animation exists");
    let mut skeleton = Skeleton::new(Arc::clone(data));
    skeleton.set_to_setup_pose();
    animation.apply(&mut skeleton, time, time, true, None, 1.0, MixBlend::Setup, MixDirection::In);
    skeleton.update_world_transform(Physics::None);
    skeleton
}

fn assert_approx(a: f32, b: f32, eps: f32, ctx: &str) {
    if (a - b).abs() > eps {
        panic!("{ctx}: expected {b}, got {a} (diff {})", (a - b).abs());
    }
}

fn assert_pose_close(a: &Skeleton, b: &Skeleton, eps: f32, ctx: &str) {
    assert_eq!(a.bones.len(), b.bones.len(), "bones length");
    assert_eq!(a.draw_order, b.draw_order, "draw order");
    for (ba, bb) in a.bones.iter().zip(&b.bones) {
        let name = &a.data.bones[ba.data_index()].name;
        let ctx = format!("{ctx} bone {name}");
        assert_approx(ba.world_x, bb.world_x, eps, &format!("{ctx} world_x"));
        assert_approx(ba.world_y, bb.world_y, eps, &format!("{ctx} world_y"));
        assert_approx(ba.a, bb.a, eps, &format!("{ctx} a"));
        assert_approx(ba.b, bb.b, eps, &format!("{ctx} b"));
        assert_approx(ba.c, bb.c, eps, &format!("{ctx} c"));
        assert_approx(ba.d, bb.d, eps, &format!("{ctx} d"));
    }
}

#[test]
fn skel_reads_setup_pose() {
    let data = SkeletonData::from_skel_bytes(&walk_skel("4.2.43")).unwrap();
    assert_eq!(data.version.as_deref(), Some("4.2.43"));
    assert!(data.hash.is_none());
    assert_eq!(data.bones.len(), 3);
    let arm = &data.bones[data.find_bone("arm").unwrap()];
    assert_eq!(arm.parent, data.find_bone("hip"));
    assert_approx(arm.rotation, -40.0, 1e-6, "arm rotation");
    assert_approx(arm.scale_x, 1.5, 1e-6, "arm scale_x");
    assert_eq!(data.slots[0].attachment_name, None);
    assert!(data.default_skin().is_none());
    assert_eq!(data.events[0].int_value, 3);
}

#[test]
fn skel_reads_timelines() {
    let data = SkeletonData::from_skel_bytes_with_scale(&walk_skel("4.2.43"), 2.0).unwrap();
    let walk = data.find_animation("walk").unwrap();
    assert_approx(walk.duration, 1.0, 1e-6, "duration");
    assert_eq!(walk.timelines().len(), 3);

    let translate = walk
        .timelines()
        .iter()
        .find_map(|t| match t {
            Timeline::Translate(t) => Some(t),
            _ => None,
        })
        .unwrap();
    let [x, y] = translate.curves.values::<2>(0.25);
    assert_approx(x, 10.0, 1e-4, "scaled translate x");
    assert_approx(y, -5.0, 1e-4, "scaled translate y");
    // Stepped after the second key.
    let [x, _] = translate.curves.values::<2>(0.9);
    assert_approx(x, 20.0, 1e-4, "stepped translate x");

    let events = walk
        .timelines()
        .iter()
        .find_map(|t| match t {
            Timeline::Event(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(events.frames, vec![0.5]);
    assert_eq!(events.events[0].int_value, 3);
}

#[test]
fn skel_matches_json_pose() {
    for scale in [1.0, 2.0] {
        let skel = SkeletonData::from_skel_bytes_with_scale(&walk_skel("4.2.43"), scale).unwrap();
        let json = SkeletonData::from_json_str_with_scale(JSON, scale).unwrap();
        for time in [0.0, 0.2, 0.5, 0.77, 1.0] {
            let a = pose_at(&skel, "walk", time);
            let b = pose_at(&json, "walk", time);
            assert_pose_close(&a, &b, 1e-4, &format!("walk scale={scale} t={time}"));
        }
    }
}

#[test]
fn skel_pose_follows_animation() {
    let data = SkeletonData::from_skel_bytes(&walk_skel("4.2.43")).unwrap();
    let skeleton = pose_at(&data, "walk", 0.25);
    let arm = &skeleton.bones[data.find_bone("arm").unwrap()];
    assert_approx(arm.x, 35.0, 1e-4, "arm x");
    assert_approx(arm.y, -2.5, 1e-4, "arm y");
    let hip = &skeleton.bones[data.find_bone("hip").unwrap()];
    assert!(hip.rotation > 15.0 && hip.rotation < 15.0 + 45.0, "hip rotation {}", hip.rotation);
}

#[test]
fn skel_rejects_unsupported_version() {
    let err = SkeletonData::from_skel_bytes(&walk_skel("4.1.24")).unwrap_err();
    assert!(matches!(err, Error::SpineVersion { .. }), "{err}");
}

#[test]
fn skel_reports_truncated_input() {
    let bytes = walk_skel("4.2.43");
    for len in [0, 5, 40, bytes.len() - 1] {
        let err = SkeletonData::from_skel_bytes(&bytes[..len]).unwrap_err();
        assert!(matches!(err, Error::BinaryParse { .. }), "len {len}: {err}");
    }
}

#[test]
fn skel_reports_out_of_range_bone() {
    let mut w = SkelWriter::default();
    w.i32(0).i32(0).string(Some("4.2.43"));
    w.floats(&[0.0, 0.0, 0.0, 0.0, 100.0]).bool(false).varint(0);
    w.varint(2);
    w.bone("root", None, [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    w.bone("hip", Some(7), [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    let err = SkeletonData::from_skel_bytes(&w.bytes).unwrap_err();
    assert!(matches!(err, Error::UnknownBone { .. }), "{err}");
}

#[test]
fn skel_reads_volume_and_balance_for_an_empty_audio_path() {
    for audio in ["", "sfx/step.ogg"] {
        let data = SkeletonData::from_skel_bytes(&walk_skel_with_audio("4.2.43", Some(audio))).unwrap();
        let step = &data.events[0];
        assert_eq!(step.audio_path.as_deref(), Some(audio));
        assert_approx(step.volume, 0.8, 1e-6, "def volume");
        assert_approx(step.balance, -0.5, 1e-6, "def balance");

        let walk = data.find_animation("walk").unwrap();
        let events = walk
            .timelines()
            .iter()
            .find_map(|t| match t {
                Timeline::Event(t) => Some(t),
                _ => None,
            })
            .unwrap();
        assert_approx(events.events[0].volume, 0.25, 1e-6, "key volume");
        assert_approx(events.events[0].balance, 0.5, 1e-6, "key balance");
    }
}

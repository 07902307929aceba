use crate::{Attachment, Color, Error, Inherit, SkeletonData, Timeline};

const JSON: &str = r##"
{
  "skeleton": { "hash": "abc", "spine": "4.2.43", "x": -10, "y": -5, "width": 40, "height": 80 },
  "bones": [
    { "name": "root" },
    { "name": "hip", "parent": "root", "x": 10, "y": 20, "rotation": 90, "length": 30 },
    { "name": "head", "parent": "hip", "x": 30, "scaleX": 2, "shearY": 5, "inherit": "noScale" }
  ],
  "slots": [
    { "name": "body", "bone": "hip", "attachment": "body" },
    { "name": "parts/face", "bone": "head", "color": "ff000080", "dark": "00ff00", "blend": "additive" }
  ],
  "ik": [
    { "name": "reach", "bones": [ "hip" ], "target": "head", "softness": 4, "bendPositive": false }
  ],
  "skins": [
    {
      "name": "default",
      "attachments": {
        "body": {
          "body": {
            "type": "mesh",
            "uvs": [ 0, 0, 1, 0, 1, 1, 0, 1 ],
            "triangles": [ 0, 1, 2, 2, 3, 0 ],
            "vertices": [ -5, -5, 5, -5, 5, 5, -5, 5 ],
            "hull": 4,
            "width": 10,
            "height": 10
          },
          "box": { "width": 8, "height": 6, "x": 1, "y": 2 },
          "hologram": { "type": "hologram" }
        }
      }
    },
    {
      "name": "red",
      "attachments": {
        "body": {
          "body": { "type": "linkedmesh", "parent": "body", "skin": "default", "path": "red/body" },
          "fixed": { "type": "linkedmesh", "parent": "body", "skin": "default", "timelines": false }
        }
      }
    }
  ],
  "events": {
    "step": { "int": 3, "float": 0.5, "string": "left" },
    "shout": { "audio": "shout.ogg" }
  },
  "animations": {
    "walk": {
      "bones": {
        "hip": {
          "rotate": [
            { "value": 10, "curve": "stepped" },
            { "time": 0.5, "value": 40 },
            { "time": 1, "value": 10 }
          ],
          "translate": [
            { "x": 0, "y": 0, "curve": [ 0.25, 0, 0.75, 10, 0.25, 0, 0.75, 20 ] },
            { "time": 1, "x": 10, "y": 20 }
          ]
        }
      },
      "drawOrder": [
        { "time": 0.25, "offsets": [ { "slot": "body", "offset": 1 } ] },
        { "time": 0.75 }
      ],
      "events": [
        { "time": 0.5, "name": "step", "int": 7 },
        { "time": 0.9, "name": "shout" }
      ]
    }
  }
}
"##;

fn assert_approx(actual: f32, expected: f32) {
    let eps = 1e-3;
    assert!(
        (actual - expected).abs() <= eps,
        "expected {expected}, got {actual}"
    );
}

fn with_version(version: &str) -> String {
    JSON.replace("4.2.43", version)
}

#[test]
fn json_reads_setup_pose_and_defaults() {
    let data = SkeletonData::from_json_str(JSON).unwrap();
    assert_eq!(data.version.as_deref(), Some("4.2.43"));
    assert_eq!(data.hash.as_deref(), Some("abc"));
    assert_approx(data.reference_scale, 100.0);
    assert_eq!(data.bones.len(), 3);

    let hip = &data.bones[data.find_bone("hip").unwrap()];
    assert_eq!(hip.parent, Some(0));
    assert_approx(hip.rotation, 90.0);
    assert_approx(hip.scale_x, 1.0);
    assert_eq!(hip.inherit, Inherit::Normal);

    let head = &data.bones[data.find_bone("head").unwrap()];
    assert_approx(head.scale_x, 2.0);
    assert_approx(head.shear_y, 5.0);
    assert_eq!(head.inherit, Inherit::NoScale);

    let body = &data.slots[data.find_slot("body").unwrap()];
    assert_eq!(body.color, Color::WHITE);
    assert_eq!(body.attachment_name.as_deref(), Some("body"));
    assert!(body.dark_color.is_none());

    let face = &data.slots[data.find_slot("face").unwrap()];
    assert_eq!(face.path.as_deref(), Some("parts"));
    assert_approx(face.color.r, 1.0);
    assert_approx(face.color.a, 128.0 / 255.0);
    let dark = face.dark_color.unwrap();
    assert_approx(dark.g, 1.0);
    assert_approx(dark.a, 1.0);

    let ik = &data.ik_constraints[data.find_ik_constraint("reach").unwrap()];
    assert_approx(ik.mix, 1.0);
    assert_approx(ik.softness, 4.0);
    assert_eq!(ik.bend_direction, -1);
}

#[test]
fn json_scale_applies_to_lengths_only() {
    let data = SkeletonData::from_json_str_with_scale(JSON, 2.0).unwrap();
    let hip = &data.bones[data.find_bone("hip").unwrap()];
    assert_approx(hip.x, 20.0);
    assert_approx(hip.y, 40.0);
    assert_approx(hip.length, 60.0);
    assert_approx(hip.rotation, 90.0);
    assert_approx(data.ik_constraints[0].softness, 8.0);

    let skin = data.default_skin().unwrap();
    let slot = data.find_slot("body").unwrap();
    let Some(Attachment::Region(region)) = data.attachment(skin.attachment(slot, "box").unwrap()) else {
        panic!("box is a region attachment");
    };
    assert_approx(region.width, 16.0);
    assert_approx(region.height, 12.0);
    assert_approx(region.x, 2.0);
    assert_approx(region.scale_x, 1.0);

    let walk = data.find_animation("walk").unwrap();
    let translate = walk
        .timelines()
        .iter()
        .find_map(|t| match t {
            Timeline::Translate(t) => Some(t),
            _ => None,
        })
        .unwrap();
    let [x, y] = translate.curves.values::<2>(1.0);
    assert_approx(x, 20.0);
    assert_approx(y, 40.0);
    // Bezier handles are scaled with the values they shape.
    let [x, y] = translate.curves.values::<2>(0.5);
    assert!(x > 0.0 && x < 20.0, "x = {x}");
    assert!(y > 0.0 && y < 40.0, "y = {y}");
}

#[test]
fn json_reads_curves_events_and_draw_order() {
    let data = SkeletonData::from_json_str(JSON).unwrap();
    let walk = data.find_animation("walk").unwrap();
    assert_approx(walk.duration, 1.0);

    let rotate = walk
        .timelines()
        .iter()
        .find_map(|t| match t {
            Timeline::Rotate(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(rotate.curves.frame_count(), 3);
    // Stepped until the second key, linear afterwards.
    assert_approx(rotate.curves.value(0.49), 10.0);
    assert_approx(rotate.curves.value(0.75), 25.0);

    let draw_order = walk
        .timelines()
        .iter()
        .find_map(|t| match t {
            Timeline::DrawOrder(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert_eq!(draw_order.frames, vec![0.25, 0.75]);
    assert_eq!(draw_order.draw_orders[0], Some(vec![1, 0]));
    assert_eq!(draw_order.draw_orders[1], None);

    let events = walk
        .timelines()
        .iter()
        .find_map(|t| match t {
            Timeline::Event(t) => Some(t),
            _ => None,
        })
        .unwrap();
    let step = &events.events[0];
    assert_eq!(data.events[step.data].name, "step");
    assert_eq!(step.int_value, 7);
    assert_approx(step.float_value, 0.5);
    assert_eq!(step.string_value.as_deref(), Some("left"));

    // Volume and balance are only meaningful with audio.
    let shout = &data.events[data.find_event("shout").unwrap()];
    assert_eq!(shout.audio_path.as_deref(), Some("shout.ogg"));
    assert_approx(shout.volume, 1.0);
    assert_approx(shout.balance, 0.0);
}

#[test]
fn json_linked_meshes_share_parent_geometry() {
    let data = SkeletonData::from_json_str(JSON).unwrap();
    let slot = data.find_slot("body").unwrap();
    let parent = data.default_skin().unwrap().attachment(slot, "body").unwrap();
    let red = &data.skins[data.find_skin("red").unwrap()];

    let linked = red.attachment(slot, "body").unwrap();
    let Some(Attachment::Mesh(mesh)) = data.attachment(linked) else {
        panic!("linked mesh resolves to a mesh");
    };
    let Some(Attachment::Mesh(parent_mesh)) = data.attachment(parent) else {
        panic!("parent is a mesh");
    };
    assert_eq!(mesh.path, "red/body");
    assert_eq!(mesh.parent_mesh, Some(parent));
    assert_eq!(mesh.triangles, parent_mesh.triangles);
    assert_eq!(mesh.vertex.vertices, parent_mesh.vertex.vertices);
    assert_eq!(mesh.hull_length, 8);
    assert_eq!(mesh.uvs, parent_mesh.region_uvs);
    assert_eq!(mesh.vertex.timeline_attachment, parent);

    let fixed = red.attachment(slot, "fixed").unwrap();
    let Some(Attachment::Mesh(fixed_mesh)) = data.attachment(fixed) else {
        panic!("linked mesh resolves to a mesh");
    };
    assert_eq!(fixed_mesh.vertex.timeline_attachment, fixed);
}

#[test]
fn json_skips_unknown_attachment_types() {
    let data = SkeletonData::from_json_str(JSON).unwrap();
    let slot = data.find_slot("body").unwrap();
    let skin = data.default_skin().unwrap();
    assert!(skin.attachment(slot, "hologram").is_none());
    assert!(skin.attachment(slot, "box").is_some());
}

#[test]
fn json_rejects_unsupported_versions() {
    for version in ["4.1.24", "3.8.99", "garbage"] {
        let err = SkeletonData::from_json_str(&with_version(version)).unwrap_err();
        assert!(matches!(err, Error::SpineVersion { .. }), "{version}: {err}");
    }
    let err = SkeletonData::from_json_str(r#"{ "bones": [ { "name": "root" } ] }"#).unwrap_err();
    assert!(matches!(err, Error::SpineVersion { .. }), "{err}");
}

#[test]
fn json_reports_unknown_references() {
    let json = JSON.replace(r#""bone": "hip", "attachment""#, r#""bone": "thigh", "attachment""#);
    let err = SkeletonData::from_json_str(&json).unwrap_err();
    match err {
        Error::UnknownBone { name, context } => {
            assert_eq!(name, "thigh");
            assert_eq!(context, "body");
        }
        other => panic!("unexpected error: {other}"),
    }

    let json = JSON.replace(r#""parent": "body", "skin": "default", "path""#, r#""parent": "torso", "skin": "default", "path""#);
    let err = SkeletonData::from_json_str(&json).unwrap_err();
    assert!(matches!(err, Error::ParentMeshNotFound { .. }), "{err}");

    let json = JSON.replace(r#""name": "step", "int": 7"#, r#""name": "stomp""#);
    let err = SkeletonData::from_json_str(&json).unwrap_err();
    assert!(matches!(err, Error::UnknownEvent { .. }), "{err}");
}

#[test]
fn json_reports_malformed_input() {
    let err = SkeletonData::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, Error::JsonParse { .. }), "{err}");

    let json = JSON.replace("ff000080", "ff00zz80");
    let err = SkeletonData::from_json_str(&json).unwrap_err();
    assert!(matches!(err, Error::JsonInvalidColor { .. }), "{err}");

    let json = JSON.replace(r#""curve": "stepped""#, r#""curve": 3"#);
    let err = SkeletonData::from_json_str(&json).unwrap_err();
    assert!(matches!(err, Error::JsonInvalidCurve { .. }), "{err}");
}

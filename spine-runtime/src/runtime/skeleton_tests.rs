use crate::{
    Attachment, BoneData, Color, Error, IkConstraintData, Inherit, Physics, RegionAttachment,
    Skeleton, SkeletonData, Skin, SlotData,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32, eps: f32, ctx: &str) {
    assert!(
        (actual - expected).abs() <= eps,
        "{ctx}: expected {expected}, got {actual}"
    );
}

fn bone(data: &mut SkeletonData, name: &str, parent: Option<&str>, x: f32, y: f32, rotation: f32) -> usize {
    let index = data.bones.len();
    let parent = parent.map(|p| data.find_bone(p).expect("parent bone"));
    let mut bone = BoneData::new(index, name, parent);
    bone.x = x;
    bone.y = y;
    bone.rotation = rotation;
    bone.length = 10.0;
    data.bones.push(bone);
    index
}

fn region(name: &str, width: f32, height: f32) -> Attachment {
    Attachment::Region(RegionAttachment {
        name: name.to_string(),
        path: name.to_string(),
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation: 0.0,
        width,
        height,
        color: Color::WHITE,
        region: None,
        sequence: None,
    })
}

/// `root -> upper -> lower`, a free `target` and a skin-only `cape`.
fn arm_data(ik: Option<IkConstraintData>) -> Arc<SkeletonData> {
    let mut data = SkeletonData::default();
    bone(&mut data, "root", None, 0.0, 0.0, 0.0);
    bone(&mut data, "upper", Some("root"), 10.0, 0.0, 90.0);
    bone(&mut data, "lower", Some("upper"), 20.0, 0.0, 0.0);
    bone(&mut data, "target", Some("root"), 0.0, 30.0, 0.0);
    let cape = bone(&mut data, "cape", Some("upper"), 0.0, 0.0, 0.0);
    data.bones[cape].skin_required = true;

    let mut slot = SlotData::new(0, "hand", 2);
    slot.attachment_name = Some("hand".to_string());
    data.slots.push(slot);

    data.attachments.push(region("hand", 10.0, 4.0));
    let mut default_skin = Skin::new("default");
    default_skin.set_attachment(0, "hand", 0);
    data.skins.push(default_skin);
    data.default_skin = Some(0);

    data.attachments.push(region("glove", 2.0, 2.0));
    let mut hero = Skin::new("hero");
    hero.bones.push(cape);
    hero.set_attachment(0, "hand", 1);
    data.skins.push(hero);

    data.ik_constraints.extend(ik);
    Arc::new(data)
}

fn posed(data: Arc<SkeletonData>) -> Skeleton {
    let mut skeleton = Skeleton::new(data);
    skeleton.set_to_setup_pose();
    skeleton.update_world_transform(Physics::None);
    skeleton
}

#[test]
fn world_transform_composes_the_parent_chain() {
    let skeleton = posed(arm_data(None));
    let upper = &skeleton.bones[1];
    assert_approx(upper.world_x, 10.0, 1e-4, "upper x");
    assert_approx(upper.world_y, 0.0, 1e-4, "upper y");
    assert_approx(upper.a, 0.0, 1e-4, "upper a");
    assert_approx(upper.c, 1.0, 1e-4, "upper c");
    assert_approx(upper.world_rotation_x(), 90.0, 1e-3, "upper rotation");

    let lower = &skeleton.bones[2];
    assert_approx(lower.world_x, 10.0, 1e-4, "lower x");
    assert_approx(lower.world_y, 20.0, 1e-4, "lower y");
    assert_approx(lower.world_rotation_x(), 90.0, 1e-3, "lower rotation");
}

#[test]
fn skeleton_position_and_scale_apply_to_the_root() {
    let mut skeleton = Skeleton::new(arm_data(None));
    skeleton.x = 5.0;
    skeleton.y = 7.0;
    skeleton.scale_y = -1.0;
    skeleton.update_world_transform(Physics::None);
    let lower = &skeleton.bones[2];
    assert_approx(lower.world_x, 15.0, 1e-4, "lower x");
    assert_approx(lower.world_y, -13.0, 1e-4, "lower y");
}

#[test]
fn only_translation_ignores_parent_rotation() {
    let mut data = (*arm_data(None)).clone();
    data.bones[2].inherit = Inherit::OnlyTranslation;
    let skeleton = posed(Arc::new(data));
    let lower = &skeleton.bones[2];
    assert_approx(lower.world_x, 10.0, 1e-4, "lower x");
    assert_approx(lower.world_y, 20.0, 1e-4, "lower y");
    assert_approx(lower.a, 1.0, 1e-4, "lower a");
    assert_approx(lower.c, 0.0, 1e-4, "lower c");
}

#[test]
fn world_and_local_points_round_trip() {
    let skeleton = posed(arm_data(None));
    let lower = &skeleton.bones[2];
    let world = lower.local_to_world([3.0, 4.0]);
    assert_approx(world[0], 6.0, 1e-4, "world x");
    assert_approx(world[1], 23.0, 1e-4, "world y");
    let local = lower.world_to_local(world);
    assert_approx(local[0], 3.0, 1e-4, "local x");
    assert_approx(local[1], 4.0, 1e-4, "local y");
}

fn ik(bones: Vec<usize>, mix: f32) -> IkConstraintData {
    let mut ik = IkConstraintData::new("aim");
    ik.bones = bones;
    ik.target = 3;
    ik.mix = mix;
    ik
}

#[test]
fn one_bone_ik_points_at_the_target() {
    let mut data = (*arm_data(None)).clone();
    data.bones[1].x = 0.0;
    data.bones[1].rotation = 0.0;
    data.ik_constraints.push(ik(vec![1], 1.0));
    let skeleton = posed(Arc::new(data.clone()));
    assert_approx(skeleton.bones[1].world_rotation_x(), 90.0, 1e-3, "full mix");

    data.ik_constraints[0].mix = 0.5;
    let skeleton = posed(Arc::new(data));
    assert_approx(skeleton.bones[1].world_rotation_x(), 45.0, 1e-3, "half mix");
}

#[test]
fn two_bone_ik_reaches_the_target() {
    let mut data = (*arm_data(None)).clone();
    data.bones[1].x = 0.0;
    data.bones[1].rotation = 0.0;
    data.bones[2].x = 10.0;
    data.bones[3].x = 12.0;
    data.bones[3].y = 5.0;
    for bend_direction in [1, -1] {
        let mut constraint = ik(vec![1, 2], 1.0);
        constraint.bend_direction = bend_direction;
        data.ik_constraints = vec![constraint];
        let skeleton = posed(Arc::new(data.clone()));
        let lower = &skeleton.bones[2];
        let tip = lower.local_to_world([10.0, 0.0]);
        assert_approx(tip[0], 12.0, 1e-2, "tip x");
        assert_approx(tip[1], 5.0, 1e-2, "tip y");
    }
}

#[test]
fn skin_bones_are_active_only_with_their_skin() {
    let mut skeleton = posed(arm_data(None));
    assert!(!skeleton.bones[4].active);
    assert!(skeleton.bones[1].active);

    skeleton.set_skin_by_name("hero").unwrap();
    assert!(skeleton.bones[4].active);
    assert_eq!(skeleton.slots[0].attachment(), Some(1));

    let err = skeleton.set_skin_by_name("villain").unwrap_err();
    assert!(matches!(err, Error::UnknownSkin { .. }), "{err}");
}

#[test]
fn set_attachment_looks_up_skins_and_reports_misses() {
    let mut skeleton = posed(arm_data(None));
    assert_eq!(skeleton.slots[0].attachment(), Some(0));
    skeleton.set_attachment("hand", None).unwrap();
    assert_eq!(skeleton.slots[0].attachment(), None);
    skeleton.set_attachment("hand", Some("hand")).unwrap();
    assert_eq!(skeleton.slots[0].attachment(), Some(0));

    let err = skeleton.set_attachment("foot", Some("hand")).unwrap_err();
    assert!(matches!(err, Error::UnknownSlot { .. }), "{err}");
    let err = skeleton.set_attachment("hand", Some("claw")).unwrap_err();
    assert!(matches!(err, Error::UnknownAttachment { .. }), "{err}");
}

#[test]
fn bounds_cover_visible_regions() {
    let mut skeleton = posed(arm_data(None));
    // The hand bone points up, so the 10x4 region is rotated a quarter turn.
    let bounds = skeleton.bounds().unwrap();
    assert_approx(bounds.x, 8.0, 1e-3, "x");
    assert_approx(bounds.y, 15.0, 1e-3, "y");
    assert_approx(bounds.width, 4.0, 1e-3, "width");
    assert_approx(bounds.height, 10.0, 1e-3, "height");

    skeleton.set_attachment("hand", None).unwrap();
    assert!(skeleton.bounds().is_none());
}

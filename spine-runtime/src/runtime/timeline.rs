use super::curve::{CurveFrames, blend_scale, search, search1};
use crate::{
    Color, Event, Inherit, MixBlend, MixDirection, PhysicsConstraint, PhysicsConstraintData,
    Property, PropertyId, SequenceMode, Skeleton,
};

/// Curve keys for one bone. Translate, scale and shear keys carry two values, the others one.
#[derive(Clone, Debug)]
pub struct BoneTimeline {
    pub bone: usize,
    pub curves: CurveFrames,
}

#[derive(Clone, Debug)]
pub struct InheritTimeline {
    pub bone: usize,
    pub frames: Vec<f32>,
    pub inherits: Vec<Inherit>,
}

/// Color keys for one slot: `r, g, b, a` for RGBA, plus `r2, g2, b2` for the two color forms.
#[derive(Clone, Debug)]
pub struct SlotColorTimeline {
    pub slot: usize,
    pub curves: CurveFrames,
}

#[derive(Clone, Debug)]
pub struct AttachmentTimeline {
    pub slot: usize,
    pub frames: Vec<f32>,
    pub attachment_names: Vec<Option<String>>,
}

/// Vertex offsets for one attachment. `vertices[frame]` has the attachment's deform length
/// (vertex count times two when unweighted, weighted entry count times two otherwise).
#[derive(Clone, Debug)]
pub struct DeformTimeline {
    pub slot: usize,
    pub attachment: usize,
    pub curves: CurveFrames,
    pub vertices: Vec<Vec<f32>>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SequenceKey {
    pub mode: SequenceMode,
    pub index: i32,
    pub delay: f32,
}

#[derive(Clone, Debug)]
pub struct SequenceTimeline {
    pub slot: usize,
    pub attachment: usize,
    pub frames: Vec<f32>,
    pub keys: Vec<SequenceKey>,
}

#[derive(Clone, Debug)]
pub struct EventTimeline {
    pub frames: Vec<f32>,
    pub events: Vec<Event>,
}

/// `draw_orders[frame][i]` is the slot drawn at position `i`; `None` restores setup order.
#[derive(Clone, Debug)]
pub struct DrawOrderTimeline {
    pub frames: Vec<f32>,
    pub draw_orders: Vec<Option<Vec<usize>>>,
}

/// Curve keys for one constraint.
///
/// IK keys are `mix, softness, bend direction, compress, stretch`; transform keys are the
/// six mixes; path mix keys are `rotate, x, y`; position and spacing keys a single value.
#[derive(Clone, Debug)]
pub struct ConstraintTimeline {
    pub constraint: usize,
    pub curves: CurveFrames,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PhysicsProperty {
    Inertia,
    Strength,
    Damping,
    Mass,
    Wind,
    Gravity,
    Mix,
}

impl PhysicsProperty {
    fn property(self) -> Property {
        match self {
            Self::Inertia => Property::PhysicsConstraintInertia,
            Self::Strength => Property::PhysicsConstraintStrength,
            Self::Damping => Property::PhysicsConstraintDamping,
            Self::Mass => Property::PhysicsConstraintMass,
            Self::Wind => Property::PhysicsConstraintWind,
            Self::Gravity => Property::PhysicsConstraintGravity,
            Self::Mix => Property::PhysicsConstraintMix,
        }
    }

    fn setup(self, data: &PhysicsConstraintData) -> f32 {
        match self {
            Self::Inertia => data.inertia,
            Self::Strength => data.strength,
            Self::Damping => data.damping,
            Self::Mass => 1.0 / data.mass_inverse,
            Self::Wind => data.wind,
            Self::Gravity => data.gravity,
            Self::Mix => data.mix,
        }
    }

    fn get(self, constraint: &PhysicsConstraint) -> f32 {
        match self {
            Self::Inertia => constraint.inertia,
            Self::Strength => constraint.strength,
            Self::Damping => constraint.damping,
            Self::Mass => 1.0 / constraint.mass_inverse,
            Self::Wind => constraint.wind,
            Self::Gravity => constraint.gravity,
            Self::Mix => constraint.mix,
        }
    }

    fn set(self, constraint: &mut PhysicsConstraint, value: f32) {
        match self {
            Self::Inertia => constraint.inertia = value,
            Self::Strength => constraint.strength = value,
            Self::Damping => constraint.damping = value,
            Self::Mass => constraint.mass_inverse = 1.0 / value,
            Self::Wind => constraint.wind = value,
            Self::Gravity => constraint.gravity = value,
            Self::Mix => constraint.mix = value,
        }
    }

    fn is_global(self, data: &PhysicsConstraintData) -> bool {
        match self {
            Self::Inertia => data.inertia_global,
            Self::Strength => data.strength_global,
            Self::Damping => data.damping_global,
            Self::Mass => data.mass_global,
            Self::Wind => data.wind_global,
            Self::Gravity => data.gravity_global,
            Self::Mix => data.mix_global,
        }
    }
}

/// `constraint: None` drives every constraint whose data marks the property as global.
#[derive(Clone, Debug)]
pub struct PhysicsConstraintTimeline {
    pub constraint: Option<usize>,
    pub property: PhysicsProperty,
    pub curves: CurveFrames,
}

/// Resets one physics constraint, or all of them when `constraint` is `None`.
#[derive(Clone, Debug)]
pub struct PhysicsResetTimeline {
    pub constraint: Option<usize>,
    pub frames: Vec<f32>,
}

/// Every kind of keyed property change.
#[derive(Clone, Debug)]
pub enum Timeline {
    Rotate(BoneTimeline),
    Translate(BoneTimeline),
    TranslateX(BoneTimeline),
    TranslateY(BoneTimeline),
    Scale(BoneTimeline),
    ScaleX(BoneTimeline),
    ScaleY(BoneTimeline),
    Shear(BoneTimeline),
    ShearX(BoneTimeline),
    ShearY(BoneTimeline),
    Inherit(InheritTimeline),
    Rgba(SlotColorTimeline),
    Rgb(SlotColorTimeline),
    Alpha(SlotColorTimeline),
    Rgba2(SlotColorTimeline),
    Rgb2(SlotColorTimeline),
    Attachment(AttachmentTimeline),
    Deform(DeformTimeline),
    Sequence(SequenceTimeline),
    Event(EventTimeline),
    DrawOrder(DrawOrderTimeline),
    IkConstraint(ConstraintTimeline),
    TransformConstraint(ConstraintTimeline),
    PathConstraintPosition(ConstraintTimeline),
    PathConstraintSpacing(ConstraintTimeline),
    PathConstraintMix(ConstraintTimeline),
    Physics(PhysicsConstraintTimeline),
    PhysicsReset(PhysicsResetTimeline),
}

impl Timeline {
    pub fn property_ids(&self) -> Vec<PropertyId> {
        use Property as P;
        match self {
            Timeline::Rotate(t) => vec![PropertyId::new(P::Rotate, t.bone)],
            Timeline::Translate(t) => {
                vec![PropertyId::new(P::X, t.bone), PropertyId::new(P::Y, t.bone)]
            }
            Timeline::TranslateX(t) => vec![PropertyId::new(P::X, t.bone)],
            Timeline::TranslateY(t) => vec![PropertyId::new(P::Y, t.bone)],
            Timeline::Scale(t) => vec![
                PropertyId::new(P::ScaleX, t.bone),
                PropertyId::new(P::ScaleY, t.bone),
            ],
            Timeline::ScaleX(t) => vec![PropertyId::new(P::ScaleX, t.bone)],
            Timeline::ScaleY(t) => vec![PropertyId::new(P::ScaleY, t.bone)],
            Timeline::Shear(t) => vec![
                PropertyId::new(P::ShearX, t.bone),
                PropertyId::new(P::ShearY, t.bone),
            ],
            Timeline::ShearX(t) => vec![PropertyId::new(P::ShearX, t.bone)],
            Timeline::ShearY(t) => vec![PropertyId::new(P::ShearY, t.bone)],
            Timeline::Inherit(t) => vec![PropertyId::new(P::Inherit, t.bone)],
            Timeline::Rgba(t) => {
                vec![PropertyId::new(P::Rgb, t.slot), PropertyId::new(P::Alpha, t.slot)]
            }
            Timeline::Rgb(t) => vec![PropertyId::new(P::Rgb, t.slot)],
            Timeline::Alpha(t) => vec![PropertyId::new(P::Alpha, t.slot)],
            Timeline::Rgba2(t) => vec![
                PropertyId::new(P::Rgb, t.slot),
                PropertyId::new(P::Alpha, t.slot),
                PropertyId::new(P::Rgb2, t.slot),
            ],
            Timeline::Rgb2(t) => {
                vec![PropertyId::new(P::Rgb, t.slot), PropertyId::new(P::Rgb2, t.slot)]
            }
            Timeline::Attachment(t) => vec![PropertyId::new(P::Attachment, t.slot)],
            Timeline::Deform(t) => {
                vec![PropertyId::with_attachment(P::Deform, t.slot, t.attachment)]
            }
            Timeline::Sequence(t) => {
                vec![PropertyId::with_attachment(P::Sequence, t.slot, t.attachment)]
            }
            Timeline::Event(_) => vec![PropertyId::global(P::Event)],
            Timeline::DrawOrder(_) => vec![PropertyId::global(P::DrawOrder)],
            Timeline::IkConstraint(t) => vec![PropertyId::new(P::IkConstraint, t.constraint)],
            Timeline::TransformConstraint(t) => {
                vec![PropertyId::new(P::TransformConstraint, t.constraint)]
            }
            Timeline::PathConstraintPosition(t) => {
                vec![PropertyId::new(P::PathConstraintPosition, t.constraint)]
            }
            Timeline::PathConstraintSpacing(t) => {
                vec![PropertyId::new(P::PathConstraintSpacing, t.constraint)]
            }
            Timeline::PathConstraintMix(t) => {
                vec![PropertyId::new(P::PathConstraintMix, t.constraint)]
            }
            Timeline::Physics(t) => vec![PropertyId {
                property: t.property.property(),
                target: t.constraint,
                attachment: None,
            }],
            Timeline::PhysicsReset(_) => vec![PropertyId::global(P::PhysicsConstraintReset)],
        }
    }

    /// Key times, one per frame.
    pub fn frame_times(&self) -> Vec<f32> {
        match self.curves() {
            Some(curves) => curves
                .frames()
                .iter()
                .step_by(curves.entries())
                .copied()
                .collect(),
            None => self.plain_frames().map(<[f32]>::to_vec).unwrap_or_default(),
        }
    }

    pub fn frame_count(&self) -> usize {
        match self.curves() {
            Some(curves) => curves.frame_count(),
            None => self.plain_frames().map_or(0, <[f32]>::len),
        }
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        match self.curves() {
            Some(curves) => curves.duration(),
            None => self
                .plain_frames()
                .and_then(|f| f.last().copied())
                .unwrap_or(0.0),
        }
    }

    /// Interpolation data of curve timelines.
    pub fn curves(&self) -> Option<&CurveFrames> {
        match self {
            Timeline::Rotate(t)
            | Timeline::Translate(t)
            | Timeline::TranslateX(t)
            | Timeline::TranslateY(t)
            | Timeline::Scale(t)
            | Timeline::ScaleX(t)
            | Timeline::ScaleY(t)
            | Timeline::Shear(t)
            | Timeline::ShearX(t)
            | Timeline::ShearY(t) => Some(&t.curves),
            Timeline::Rgba(t)
            | Timeline::Rgb(t)
            | Timeline::Alpha(t)
            | Timeline::Rgba2(t)
            | Timeline::Rgb2(t) => Some(&t.curves),
            Timeline::Deform(t) => Some(&t.curves),
            Timeline::IkConstraint(t)
            | Timeline::TransformConstraint(t)
            | Timeline::PathConstraintPosition(t)
            | Timeline::PathConstraintSpacing(t)
            | Timeline::PathConstraintMix(t) => Some(&t.curves),
            Timeline::Physics(t) => Some(&t.curves),
            Timeline::Inherit(_)
            | Timeline::Attachment(_)
            | Timeline::Sequence(_)
            | Timeline::Event(_)
            | Timeline::DrawOrder(_)
            | Timeline::PhysicsReset(_) => None,
        }
    }

    fn plain_frames(&self) -> Option<&[f32]> {
        match self {
            Timeline::Inherit(t) => Some(&t.frames),
            Timeline::Attachment(t) => Some(&t.frames),
            Timeline::Sequence(t) => Some(&t.frames),
            Timeline::Event(t) => Some(&t.frames),
            Timeline::DrawOrder(t) => Some(&t.frames),
            Timeline::PhysicsReset(t) => Some(&t.frames),
            _ => None,
        }
    }

    /// Poses `skeleton` for `time`. `last_time` is only used by event and reset timelines,
    /// which fire keys in `(last_time, time]`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Timeline::Rotate(t) => {
                let setup = skeleton.data.bones[t.bone].rotation;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.rotation = t.curves.relative_value(time, alpha, blend, bone.rotation, setup);
                }
            }
            Timeline::Translate(t) => {
                let data = &skeleton.data.bones[t.bone];
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    apply_offset2(
                        &t.curves,
                        time,
                        alpha,
                        blend,
                        [&mut bone.x, &mut bone.y],
                        [data.x, data.y],
                    );
                }
            }
            Timeline::TranslateX(t) => {
                let setup = skeleton.data.bones[t.bone].x;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.x = t.curves.relative_value(time, alpha, blend, bone.x, setup);
                }
            }
            Timeline::TranslateY(t) => {
                let setup = skeleton.data.bones[t.bone].y;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.y = t.curves.relative_value(time, alpha, blend, bone.y, setup);
                }
            }
            Timeline::Scale(t) => {
                let data = &skeleton.data.bones[t.bone];
                let bone = &mut skeleton.bones[t.bone];
                if !bone.active {
                    return;
                }
                let setup = [data.scale_x, data.scale_y];
                let current = [&mut bone.scale_x, &mut bone.scale_y];
                if before_first2(&t.curves, time, alpha, blend, current, setup).is_some() {
                    return;
                }
                let [x, y] = t.curves.values::<2>(time);
                bone.scale_x =
                    blend_scale(x * setup[0], alpha, blend, direction, bone.scale_x, setup[0]);
                bone.scale_y =
                    blend_scale(y * setup[1], alpha, blend, direction, bone.scale_y, setup[1]);
            }
            Timeline::ScaleX(t) => {
                let setup = skeleton.data.bones[t.bone].scale_x;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.scale_x =
                        t.curves.scale_value(time, alpha, blend, direction, bone.scale_x, setup);
                }
            }
            Timeline::ScaleY(t) => {
                let setup = skeleton.data.bones[t.bone].scale_y;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.scale_y =
                        t.curves.scale_value(time, alpha, blend, direction, bone.scale_y, setup);
                }
            }
            Timeline::Shear(t) => {
                let data = &skeleton.data.bones[t.bone];
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    apply_offset2(
                        &t.curves,
                        time,
                        alpha,
                        blend,
                        [&mut bone.shear_x, &mut bone.shear_y],
                        [data.shear_x, data.shear_y],
                    );
                }
            }
            Timeline::ShearX(t) => {
                let setup = skeleton.data.bones[t.bone].shear_x;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.shear_x = t.curves.relative_value(time, alpha, blend, bone.shear_x, setup);
                }
            }
            Timeline::ShearY(t) => {
                let setup = skeleton.data.bones[t.bone].shear_y;
                let bone = &mut skeleton.bones[t.bone];
                if bone.active {
                    bone.shear_y = t.curves.relative_value(time, alpha, blend, bone.shear_y, setup);
                }
            }
            Timeline::Inherit(t) => {
                let setup = skeleton.data.bones[t.bone].inherit;
                let bone = &mut skeleton.bones[t.bone];
                if !bone.active {
                    return;
                }
                if time < t.frames[0] {
                    if matches!(blend, MixBlend::Setup | MixBlend::First) {
                        bone.inherit = setup;
                    }
                    return;
                }
                bone.inherit = t.inherits[search1(&t.frames, time)];
            }
            Timeline::Rgba(t) => apply_rgba(t, skeleton, time, alpha, blend),
            Timeline::Rgb(t) => apply_rgb(t, skeleton, time, alpha, blend),
            Timeline::Alpha(t) => apply_alpha(t, skeleton, time, alpha, blend),
            Timeline::Rgba2(t) => apply_two_color(t, skeleton, time, alpha, blend, true),
            Timeline::Rgb2(t) => apply_two_color(t, skeleton, time, alpha, blend, false),
            Timeline::Attachment(t) => {
                let slot = &skeleton.slots[t.slot];
                if !skeleton.bones[slot.bone()].active {
                    return;
                }
                if direction == MixDirection::Out {
                    if blend == MixBlend::Setup {
                        skeleton.set_slot_attachment_to_setup(t.slot);
                    }
                    return;
                }
                if time < t.frames[0] {
                    if matches!(blend, MixBlend::Setup | MixBlend::First) {
                        skeleton.set_slot_attachment_to_setup(t.slot);
                    }
                    return;
                }
                let name = t.attachment_names[search1(&t.frames, time)].as_deref();
                skeleton.set_slot_attachment_by_name(t.slot, name);
            }
            Timeline::Deform(t) => apply_deform(t, skeleton, time, alpha, blend),
            Timeline::Sequence(t) => apply_sequence(t, skeleton, time, blend),
            Timeline::Event(t) => {
                if let Some(events) = events {
                    fire_events(t, last_time, time, events);
                }
            }
            Timeline::DrawOrder(t) => {
                if direction == MixDirection::Out {
                    if blend == MixBlend::Setup {
                        skeleton.reset_draw_order();
                    }
                    return;
                }
                if time < t.frames[0] {
                    if matches!(blend, MixBlend::Setup | MixBlend::First) {
                        skeleton.reset_draw_order();
                    }
                    return;
                }
                match &t.draw_orders[search1(&t.frames, time)] {
                    None => skeleton.reset_draw_order(),
                    Some(order) => skeleton.draw_order.copy_from_slice(order),
                }
            }
            Timeline::IkConstraint(t) => apply_ik(t, skeleton, time, alpha, blend, direction),
            Timeline::TransformConstraint(t) => apply_transform(t, skeleton, time, alpha, blend),
            Timeline::PathConstraintPosition(t) => {
                let setup = skeleton.data.path_constraints[t.constraint].position;
                let constraint = &mut skeleton.path_constraints[t.constraint];
                if constraint.active {
                    constraint.position =
                        t.curves.absolute_value(time, alpha, blend, constraint.position, setup);
                }
            }
            Timeline::PathConstraintSpacing(t) => {
                let setup = skeleton.data.path_constraints[t.constraint].spacing;
                let constraint = &mut skeleton.path_constraints[t.constraint];
                if constraint.active {
                    constraint.spacing =
                        t.curves.absolute_value(time, alpha, blend, constraint.spacing, setup);
                }
            }
            Timeline::PathConstraintMix(t) => apply_path_mix(t, skeleton, time, alpha, blend),
            Timeline::Physics(t) => apply_physics(t, skeleton, time, alpha, blend),
            Timeline::PhysicsReset(t) => apply_physics_reset(t, skeleton, last_time, time),
        }
    }
}

/// Setup and first blends before the first key for two value timelines. `Some` means the
/// timeline is done.
fn before_first2(
    curves: &CurveFrames,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    current: [&mut f32; 2],
    setup: [f32; 2],
) -> Option<()> {
    if time >= curves.start() {
        return None;
    }
    for (value, setup) in current.into_iter().zip(setup) {
        match blend {
            MixBlend::Setup => *value = setup,
            MixBlend::First => *value += (setup - *value) * alpha,
            MixBlend::Replace | MixBlend::Add => {}
        }
    }
    Some(())
}

/// Translate and shear: keys are offsets from setup.
fn apply_offset2(
    curves: &CurveFrames,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    current: [&mut f32; 2],
    setup: [f32; 2],
) {
    let [cx, cy] = current;
    if before_first2(curves, time, alpha, blend, [&mut *cx, &mut *cy], setup).is_some() {
        return;
    }
    let keyed = curves.values::<2>(time);
    for ((value, setup), key) in [cx, cy].into_iter().zip(setup).zip(keyed) {
        match blend {
            MixBlend::Setup => *value = setup + key * alpha,
            MixBlend::First | MixBlend::Replace => *value += (setup + key - *value) * alpha,
            MixBlend::Add => *value += key * alpha,
        }
    }
}

fn lerp_rgb(color: &mut Color, target: [f32; 3], alpha: f32) {
    color.r += (target[0] - color.r) * alpha;
    color.g += (target[1] - color.g) * alpha;
    color.b += (target[2] - color.b) * alpha;
}

fn set_rgb(color: &mut Color, from: Color) {
    color.r = from.r;
    color.g = from.g;
    color.b = from.b;
}

fn apply_rgba(t: &SlotColorTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let setup = skeleton.data.slots[t.slot].color;
    let slot = &mut skeleton.slots[t.slot];
    if !skeleton.bones[slot.bone()].active {
        return;
    }
    let color = &mut slot.color;
    if time < t.curves.start() {
        match blend {
            MixBlend::Setup => *color = setup,
            MixBlend::First => color.add(
                (setup.r - color.r) * alpha,
                (setup.g - color.g) * alpha,
                (setup.b - color.b) * alpha,
                (setup.a - color.a) * alpha,
            ),
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }
    let [r, g, b, a] = t.curves.values::<4>(time);
    if alpha == 1.0 {
        color.set(r, g, b, a);
    } else {
        if blend == MixBlend::Setup {
            *color = setup;
        }
        color.add(
            (r - color.r) * alpha,
            (g - color.g) * alpha,
            (b - color.b) * alpha,
            (a - color.a) * alpha,
        );
    }
}

fn apply_rgb(t: &SlotColorTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let setup = skeleton.data.slots[t.slot].color;
    let slot = &mut skeleton.slots[t.slot];
    if !skeleton.bones[slot.bone()].active {
        return;
    }
    let color = &mut slot.color;
    if time < t.curves.start() {
        match blend {
            MixBlend::Setup => set_rgb(color, setup),
            MixBlend::First => lerp_rgb(color, [setup.r, setup.g, setup.b], alpha),
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }
    let rgb = t.curves.values::<3>(time);
    if alpha == 1.0 {
        [color.r, color.g, color.b] = rgb;
    } else {
        if blend == MixBlend::Setup {
            set_rgb(color, setup);
        }
        lerp_rgb(color, rgb, alpha);
    }
}

fn apply_alpha(t: &SlotColorTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let setup = skeleton.data.slots[t.slot].color.a;
    let slot = &mut skeleton.slots[t.slot];
    if !skeleton.bones[slot.bone()].active {
        return;
    }
    let color = &mut slot.color;
    if time < t.curves.start() {
        match blend {
            MixBlend::Setup => color.a = setup,
            MixBlend::First => color.a += (setup - color.a) * alpha,
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }
    let a = t.curves.value(time);
    if alpha == 1.0 {
        color.a = a;
    } else {
        if blend == MixBlend::Setup {
            color.a = setup;
        }
        color.a += (a - color.a) * alpha;
    }
}

/// RGBA2 and RGB2. The dark color only has RGB channels in both forms.
fn apply_two_color(
    t: &SlotColorTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    with_alpha: bool,
) {
    let data = &skeleton.data.slots[t.slot];
    let setup_light = data.color;
    let setup_dark = data.dark_color.unwrap_or(Color::BLACK);
    let slot = &mut skeleton.slots[t.slot];
    if !skeleton.bones[slot.bone()].active {
        return;
    }
    let light = &mut slot.color;
    let dark = slot.dark_color.get_or_insert(setup_dark);

    if time < t.curves.start() {
        match blend {
            MixBlend::Setup => {
                if with_alpha {
                    *light = setup_light;
                } else {
                    set_rgb(light, setup_light);
                }
                set_rgb(dark, setup_dark);
            }
            MixBlend::First => {
                if with_alpha {
                    light.add(
                        (setup_light.r - light.r) * alpha,
                        (setup_light.g - light.g) * alpha,
                        (setup_light.b - light.b) * alpha,
                        (setup_light.a - light.a) * alpha,
                    );
                } else {
                    lerp_rgb(light, [setup_light.r, setup_light.g, setup_light.b], alpha);
                }
                lerp_rgb(dark, [setup_dark.r, setup_dark.g, setup_dark.b], alpha);
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    let (rgba, rgb2) = if with_alpha {
        let [r, g, b, a, r2, g2, b2] = t.curves.values::<7>(time);
        ([r, g, b, a], [r2, g2, b2])
    } else {
        let [r, g, b, r2, g2, b2] = t.curves.values::<6>(time);
        ([r, g, b, light.a], [r2, g2, b2])
    };
    let [r, g, b, a] = rgba;

    if alpha == 1.0 {
        if with_alpha {
            light.set(r, g, b, a);
        } else {
            [light.r, light.g, light.b] = [r, g, b];
        }
        [dark.r, dark.g, dark.b] = rgb2;
        return;
    }
    if blend == MixBlend::Setup {
        if with_alpha {
            *light = setup_light;
        } else {
            set_rgb(light, setup_light);
        }
        set_rgb(dark, setup_dark);
    }
    if with_alpha {
        light.add(
            (r - light.r) * alpha,
            (g - light.g) * alpha,
            (b - light.b) * alpha,
            (a - light.a) * alpha,
        );
    } else {
        lerp_rgb(light, [r, g, b], alpha);
    }
    lerp_rgb(dark, rgb2, alpha);
}

fn apply_deform(t: &DeformTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, mut blend: MixBlend) {
    let data = &skeleton.data;
    let slot = &mut skeleton.slots[t.slot];
    if !skeleton.bones[slot.bone()].active {
        return;
    }
    let Some(vertex) = slot
        .attachment()
        .and_then(|a| data.attachments[a].vertex_data())
    else {
        return;
    };
    if vertex.timeline_attachment != t.attachment {
        return;
    }
    let Some(vertex_count) = t.vertices.first().map(Vec::len) else {
        return;
    };
    // Unweighted deforms store absolute positions, weighted ones offsets from zero.
    let setup: Option<&[f32]> = (!vertex.is_weighted()).then_some(&vertex.vertices[..]);
    let setup_at = |i: usize| setup.map_or(0.0, |s| s[i]);

    let deform = &mut slot.deform;
    if deform.is_empty() {
        blend = MixBlend::Setup;
    }

    let frames = t.curves.frames();
    if time < frames[0] {
        match blend {
            MixBlend::Setup => deform.clear(),
            MixBlend::First => {
                if alpha == 1.0 {
                    deform.clear();
                    return;
                }
                deform.resize(vertex_count, 0.0);
                match setup {
                    Some(setup) => {
                        for (d, s) in deform.iter_mut().zip(setup) {
                            *d += (s - *d) * alpha;
                        }
                    }
                    None => {
                        let keep = 1.0 - alpha;
                        deform.iter_mut().for_each(|d| *d *= keep);
                    }
                }
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    }

    deform.resize(vertex_count, 0.0);
    let last = frames.len() - 1;
    let (prev, next, percent) = if time >= frames[last] {
        (&t.vertices[last], &t.vertices[last], 0.0)
    } else {
        let frame = search1(frames, time);
        (
            &t.vertices[frame],
            &t.vertices[frame + 1],
            t.curves.percent(time, frame),
        )
    };
    let keyed = |i: usize| prev[i] + (next[i] - prev[i]) * percent;

    if alpha == 1.0 {
        if blend == MixBlend::Add {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += keyed(i) - setup_at(i);
            }
        } else {
            for (i, d) in deform.iter_mut().enumerate() {
                *d = keyed(i);
            }
        }
        return;
    }
    match blend {
        MixBlend::Setup => {
            for (i, d) in deform.iter_mut().enumerate() {
                let s = setup_at(i);
                *d = s + (keyed(i) - s) * alpha;
            }
        }
        MixBlend::First | MixBlend::Replace => {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += (keyed(i) - *d) * alpha;
            }
        }
        MixBlend::Add => {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += (keyed(i) - setup_at(i)) * alpha;
            }
        }
    }
}

fn apply_sequence(t: &SequenceTimeline, skeleton: &mut Skeleton, time: f32, blend: MixBlend) {
    let data = &skeleton.data;
    let slot = &mut skeleton.slots[t.slot];
    if !skeleton.bones[slot.bone()].active {
        return;
    }
    let Some(current) = slot.attachment() else {
        return;
    };
    if current != t.attachment {
        let linked = data.attachments[current]
            .vertex_data()
            .is_some_and(|v| v.timeline_attachment == t.attachment);
        if !linked {
            return;
        }
    }

    if time < t.frames[0] {
        if matches!(blend, MixBlend::Setup | MixBlend::First) {
            slot.sequence_index = -1;
        }
        return;
    }
    let Some(count) = data.attachments[t.attachment]
        .sequence()
        .map(|s| s.count as i32)
        .filter(|&count| count > 0)
    else {
        return;
    };
    let frame = search1(&t.frames, time);
    let before = t.frames[frame];
    let key = t.keys[frame];
    let mut index = key.index;
    if key.mode != SequenceMode::Hold {
        index += ((time - before) / key.delay + 0.00001) as i32;
        index = match key.mode {
            SequenceMode::Hold => index,
            SequenceMode::Once => index.min(count - 1),
            SequenceMode::Loop => index % count,
            SequenceMode::PingPong => {
                let n = (count << 1) - 2;
                let i = if n == 0 { 0 } else { index % n };
                if i >= count { n - i } else { i }
            }
            SequenceMode::OnceReverse => (count - 1 - index).max(0),
            SequenceMode::LoopReverse => count - 1 - (index % count),
            SequenceMode::PingPongReverse => {
                let n = (count << 1) - 2;
                let i = if n == 0 { 0 } else { (index + count - 1) % n };
                if i >= count { n - i } else { i }
            }
        };
    }
    slot.sequence_index = index;
}

/// Fires events keyed in `(last_time, time]`. A `last_time` past `time` means the animation
/// looped: events up to the end fire first, then those from the start.
fn fire_events(t: &EventTimeline, mut last_time: f32, time: f32, fired: &mut Vec<Event>) {
    let frames = &t.frames;
    let Some(&last_frame) = frames.last() else {
        return;
    };
    if last_time > time {
        fire_events(t, last_time, f32::MAX, fired);
        last_time = -1.0;
    } else if last_time >= last_frame {
        return;
    }
    if time < frames[0] {
        return;
    }

    let mut i = if last_time < frames[0] {
        0
    } else {
        let mut i = search1(frames, last_time) + 1;
        // Fire all events sharing the frame's time.
        if i < frames.len() {
            let frame_time = frames[i];
            while i > 0 && frames[i - 1] == frame_time {
                i -= 1;
            }
        }
        i
    };
    while i < frames.len() && time >= frames[i] {
        fired.push(t.events[i].clone());
        i += 1;
    }
}

fn apply_ik(
    t: &ConstraintTimeline,
    skeleton: &mut Skeleton,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = &skeleton.data.ik_constraints[t.constraint];
    let constraint = &mut skeleton.ik_constraints[t.constraint];
    if !constraint.active {
        return;
    }
    let frames = t.curves.frames();
    if time < frames[0] {
        match blend {
            MixBlend::Setup => {
                constraint.mix = data.mix;
                constraint.softness = data.softness;
            }
            MixBlend::First => {
                constraint.mix += (data.mix - constraint.mix) * alpha;
                constraint.softness += (data.softness - constraint.softness) * alpha;
            }
            MixBlend::Replace | MixBlend::Add => return,
        }
        constraint.bend_direction = data.bend_direction;
        constraint.compress = data.compress;
        constraint.stretch = data.stretch;
        return;
    }

    let i = search(frames, time, t.curves.entries());
    let [mix, softness] = t.curves.values::<2>(time);
    let keyed_flags = |constraint: &mut crate::IkConstraint| {
        constraint.bend_direction = frames[i + 3] as i32;
        constraint.compress = frames[i + 4] != 0.0;
        constraint.stretch = frames[i + 5] != 0.0;
    };
    if blend == MixBlend::Setup {
        constraint.mix = data.mix + (mix - data.mix) * alpha;
        constraint.softness = data.softness + (softness - data.softness) * alpha;
        if direction == MixDirection::Out {
            constraint.bend_direction = data.bend_direction;
            constraint.compress = data.compress;
            constraint.stretch = data.stretch;
        } else {
            keyed_flags(constraint);
        }
    } else {
        constraint.mix += (mix - constraint.mix) * alpha;
        constraint.softness += (softness - constraint.softness) * alpha;
        if direction == MixDirection::In {
            keyed_flags(constraint);
        }
    }
}

fn apply_transform(t: &ConstraintTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let data = &skeleton.data.transform_constraints[t.constraint];
    let constraint = &mut skeleton.transform_constraints[t.constraint];
    if !constraint.active {
        return;
    }
    let setup = [
        data.mix_rotate,
        data.mix_x,
        data.mix_y,
        data.mix_scale_x,
        data.mix_scale_y,
        data.mix_shear_y,
    ];
    let current = [
        &mut constraint.mix_rotate,
        &mut constraint.mix_x,
        &mut constraint.mix_y,
        &mut constraint.mix_scale_x,
        &mut constraint.mix_scale_y,
        &mut constraint.mix_shear_y,
    ];
    blend_mixes(&t.curves, time, alpha, blend, current, setup);
}

fn apply_path_mix(t: &ConstraintTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let data = &skeleton.data.path_constraints[t.constraint];
    let constraint = &mut skeleton.path_constraints[t.constraint];
    if !constraint.active {
        return;
    }
    let setup = [data.mix_rotate, data.mix_x, data.mix_y];
    let current = [
        &mut constraint.mix_rotate,
        &mut constraint.mix_x,
        &mut constraint.mix_y,
    ];
    blend_mixes(&t.curves, time, alpha, blend, current, setup);
}

/// Absolute blend of `N` constraint mixes.
fn blend_mixes<const N: usize>(
    curves: &CurveFrames,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    current: [&mut f32; N],
    setup: [f32; N],
) {
    if time < curves.start() {
        for (value, setup) in current.into_iter().zip(setup) {
            match blend {
                MixBlend::Setup => *value = setup,
                MixBlend::First => *value += (setup - *value) * alpha,
                MixBlend::Replace | MixBlend::Add => {}
            }
        }
        return;
    }
    let keyed = curves.values::<N>(time);
    for ((value, setup), key) in current.into_iter().zip(setup).zip(keyed) {
        if blend == MixBlend::Setup {
            *value = setup + (key - setup) * alpha;
        } else {
            *value += (key - *value) * alpha;
        }
    }
}

fn apply_physics(t: &PhysicsConstraintTimeline, skeleton: &mut Skeleton, time: f32, alpha: f32, blend: MixBlend) {
    let data = &skeleton.data.physics_constraints;
    match t.constraint {
        Some(index) => {
            let constraint = &mut skeleton.physics_constraints[index];
            if constraint.active {
                let current = t.property.get(constraint);
                let setup = t.property.setup(&data[index]);
                let value = t.curves.absolute_value(time, alpha, blend, current, setup);
                t.property.set(constraint, value);
            }
        }
        None => {
            let keyed = if time >= t.curves.start() {
                t.curves.value(time)
            } else {
                0.0
            };
            for (constraint, data) in skeleton.physics_constraints.iter_mut().zip(data.iter()) {
                if !constraint.active || !t.property.is_global(data) {
                    continue;
                }
                let current = t.property.get(constraint);
                let setup = t.property.setup(data);
                let value = t
                    .curves
                    .absolute_value_with(time, alpha, blend, current, setup, keyed);
                t.property.set(constraint, value);
            }
        }
    }
}

fn apply_physics_reset(t: &PhysicsResetTimeline, skeleton: &mut Skeleton, mut last_time: f32, time: f32) {
    if t
        .constraint
        .is_some_and(|index| !skeleton.physics_constraints[index].active)
    {
        return;
    }
    let frames = &t.frames;
    let Some(&last_frame) = frames.last() else {
        return;
    };
    if last_time > time {
        apply_physics_reset(t, skeleton, last_time, f32::MAX);
        last_time = -1.0;
    } else if last_time >= last_frame {
        return;
    }
    if time < frames[0] {
        return;
    }
    let crossed = last_time < frames[0]
        || frames
            .get(search1(frames, last_time) + 1)
            .is_some_and(|&next| time >= next);
    if !crossed {
        return;
    }
    let now = skeleton.time;
    match t.constraint {
        Some(index) => skeleton.physics_constraints[index].reset(now),
        None => skeleton
            .physics_constraints
            .iter_mut()
            .filter(|c| c.active)
            .for_each(|c| c.reset(now)),
    }
}

//! Spine JSON loader for Spine 4.2 exports.
//!
//! Produces the same [`SkeletonData`] as the binary loader: every length-denominated value is
//! scaled while reading and timelines hold flat frames with sampled bezier tables.

use crate::loader::{
    CLIPPING_COLOR, POINT_COLOR, PendingLinkedMesh, bind_atlas, deform_setup,
    draw_order_from_offsets, resolve_linked_meshes,
};
use crate::{
    Animation, Atlas, Attachment, AttachmentTimeline, AttachmentType, BlendMode, BoneData,
    BoneTimeline, BoundingBoxAttachment, ClippingAttachment, Color, ConstraintTimeline,
    CurveFrames, DeformTimeline, DrawOrderTimeline, Error, Event, EventData, EventTimeline,
    IkConstraintData, Inherit, InheritTimeline, MeshAttachment, PathAttachment,
    PathConstraintData, PhysicsConstraintData, PhysicsConstraintTimeline, PhysicsProperty,
    PhysicsResetTimeline, PointAttachment, PositionMode, RegionAttachment, RotateMode, Sequence,
    SequenceKey, SequenceMode, SequenceTimeline, SkeletonData, Skin, SlotColorTimeline, SlotData,
    SpacingMode, Timeline, TransformConstraintData, VertexData, is_supported_version,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Root {
    skeleton: Option<SkeletonHeader>,
    #[serde(default)]
    bones: Vec<BoneDef>,
    #[serde(default)]
    slots: Vec<SlotDef>,
    #[serde(default)]
    ik: Vec<IkConstraintDef>,
    #[serde(default)]
    transform: Vec<TransformConstraintDef>,
    #[serde(default)]
    path: Vec<PathConstraintDef>,
    #[serde(default)]
    physics: Vec<PhysicsConstraintDef>,
    skins: Option<SkinsDef>,
    #[serde(default)]
    events: BTreeMap<String, EventDef>,
    #[serde(default)]
    animations: BTreeMap<String, AnimationDef>,
}

#[derive(Debug, Deserialize)]
struct SkeletonHeader {
    hash: Option<String>,
    spine: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default = "default_reference_scale", rename = "referenceScale")]
    reference_scale: f32,
    fps: Option<f32>,
    images: Option<String>,
    audio: Option<String>,
}

fn default_reference_scale() -> f32 {
    100.0
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    length: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearX")]
    shear_x: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default, alias = "transform")]
    inherit: Option<String>,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default = "default_true")]
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct SlotDef {
    name: String,
    bone: String,
    #[serde(default)]
    attachment: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    dark: Option<String>,
    #[serde(default)]
    blend: Option<String>,
    #[serde(default = "default_true")]
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct IkConstraintDef {
    name: String,
    #[serde(default)]
    order: usize,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bones: Vec<String>,
    target: String,
    #[serde(default = "default_one")]
    mix: f32,
    #[serde(default)]
    softness: f32,
    #[serde(default = "default_true", rename = "bendPositive")]
    bend_positive: bool,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    stretch: bool,
    #[serde(default)]
    uniform: bool,
}

#[derive(Debug, Deserialize)]
struct TransformConstraintDef {
    name: String,
    #[serde(default)]
    order: usize,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bones: Vec<String>,
    target: String,
    #[serde(default)]
    local: bool,
    #[serde(default)]
    relative: bool,
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default, rename = "scaleX")]
    scale_x: f32,
    #[serde(default, rename = "scaleY")]
    scale_y: f32,
    #[serde(default, rename = "shearY")]
    shear_y: f32,
    #[serde(default = "default_one", rename = "mixRotate")]
    mix_rotate: f32,
    #[serde(default = "default_one", rename = "mixX")]
    mix_x: f32,
    #[serde(default, rename = "mixY")]
    mix_y: Option<f32>,
    #[serde(default = "default_one", rename = "mixScaleX")]
    mix_scale_x: f32,
    #[serde(default, rename = "mixScaleY")]
    mix_scale_y: Option<f32>,
    #[serde(default = "default_one", rename = "mixShearY")]
    mix_shear_y: f32,
}

#[derive(Debug, Deserialize)]
struct PathConstraintDef {
    name: String,
    #[serde(default)]
    order: usize,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bones: Vec<String>,
    #[serde(alias = "slot")]
    target: String,
    #[serde(default, rename = "positionMode")]
    position_mode: Option<String>,
    #[serde(default, rename = "spacingMode")]
    spacing_mode: Option<String>,
    #[serde(default, rename = "rotateMode")]
    rotate_mode: Option<String>,
    #[serde(default)]
    rotation: f32,
    #[serde(default)]
    position: f32,
    #[serde(default)]
    spacing: f32,
    #[serde(default = "default_one", rename = "mixRotate")]
    mix_rotate: f32,
    #[serde(default = "default_one", rename = "mixX")]
    mix_x: f32,
    #[serde(default, rename = "mixY")]
    mix_y: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct PhysicsConstraintDef {
    name: String,
    #[serde(default)]
    order: usize,
    #[serde(default, rename = "skin")]
    skin_required: bool,
    bone: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotate: f32,
    #[serde(default, rename = "scaleX")]
    scale_x: f32,
    #[serde(default, rename = "shearX")]
    shear_x: f32,
    #[serde(default = "default_limit")]
    limit: f32,
    #[serde(default = "default_fps")]
    fps: f32,
    #[serde(default = "default_one")]
    inertia: f32,
    #[serde(default = "default_strength")]
    strength: f32,
    #[serde(default = "default_one")]
    damping: f32,
    #[serde(default = "default_one")]
    mass: f32,
    #[serde(default)]
    wind: f32,
    #[serde(default)]
    gravity: f32,
    #[serde(default = "default_one")]
    mix: f32,
    #[serde(default, rename = "inertiaGlobal")]
    inertia_global: bool,
    #[serde(default, rename = "strengthGlobal")]
    strength_global: bool,
    #[serde(default, rename = "dampingGlobal")]
    damping_global: bool,
    #[serde(default, rename = "massGlobal")]
    mass_global: bool,
    #[serde(default, rename = "windGlobal")]
    wind_global: bool,
    #[serde(default, rename = "gravityGlobal")]
    gravity_global: bool,
    #[serde(default, rename = "mixGlobal")]
    mix_global: bool,
}

fn default_limit() -> f32 {
    5000.0
}

fn default_fps() -> f32 {
    60.0
}

fn default_strength() -> f32 {
    100.0
}

type SkinAttachmentsDef = BTreeMap<String, BTreeMap<String, AttachmentDef>>;

/// Skins as the 4.x array, or the older object keyed by skin name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkinsDef {
    Array(Vec<SkinDef>),
    Map(BTreeMap<String, SkinAttachmentsDef>),
}

#[derive(Debug, Deserialize)]
struct SkinDef {
    name: String,
    #[serde(default)]
    attachments: SkinAttachmentsDef,
    #[serde(default)]
    bones: Vec<String>,
    #[serde(default)]
    ik: Vec<String>,
    #[serde(default)]
    transform: Vec<String>,
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    physics: Vec<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentDef {
    #[serde(default, rename = "type")]
    attachment_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    skin: Option<String>,
    #[serde(default = "default_true")]
    timelines: bool,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_one", rename = "scaleX")]
    scale_x: f32,
    #[serde(default = "default_one", rename = "scaleY")]
    scale_y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    uvs: Vec<f32>,
    #[serde(default)]
    vertices: Vec<f32>,
    #[serde(default, rename = "vertexCount")]
    vertex_count: usize,
    #[serde(default)]
    triangles: Vec<u16>,
    #[serde(default)]
    edges: Vec<u16>,
    #[serde(default)]
    hull: usize,
    #[serde(default)]
    closed: bool,
    #[serde(default = "default_true", rename = "constantSpeed")]
    constant_speed: bool,
    #[serde(default)]
    lengths: Vec<f32>,
    #[serde(default)]
    sequence: Option<SequenceDef>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SequenceDef {
    #[serde(default)]
    count: usize,
    #[serde(default = "default_sequence_start")]
    start: i32,
    #[serde(default)]
    digits: usize,
    #[serde(default, rename = "setup", alias = "setupIndex")]
    setup_index: i32,
}

fn default_sequence_start() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct EventDef {
    #[serde(default, rename = "int")]
    int_value: i32,
    #[serde(default, rename = "float")]
    float_value: f32,
    #[serde(default, rename = "string")]
    string_value: Option<String>,
    #[serde(default, rename = "audio")]
    audio_path: Option<String>,
    #[serde(default = "default_one")]
    volume: f32,
    #[serde(default)]
    balance: f32,
}

#[derive(Debug, Deserialize)]
struct AnimationDef {
    #[serde(default)]
    slots: BTreeMap<String, SlotAnimDef>,
    #[serde(default)]
    bones: BTreeMap<String, BoneAnimDef>,
    #[serde(default)]
    ik: BTreeMap<String, Vec<IkKey>>,
    #[serde(default)]
    transform: BTreeMap<String, Vec<TransformKey>>,
    #[serde(default)]
    path: BTreeMap<String, PathAnimDef>,
    #[serde(default)]
    physics: BTreeMap<String, PhysicsAnimDef>,
    #[serde(default)]
    attachments: BTreeMap<String, BTreeMap<String, BTreeMap<String, AttachmentAnimDef>>>,
    #[serde(default, rename = "drawOrder", alias = "draworder")]
    draw_order: Vec<DrawOrderKey>,
    #[serde(default)]
    events: Vec<EventKey>,
}

#[derive(Debug, Deserialize)]
struct SlotAnimDef {
    attachment: Option<Vec<AttachmentKey>>,
    #[serde(alias = "color")]
    rgba: Option<Vec<ColorKey>>,
    rgb: Option<Vec<ColorKey>>,
    alpha: Option<Vec<ValueKey>>,
    rgba2: Option<Vec<TwoColorKey>>,
    rgb2: Option<Vec<TwoColorKey>>,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BoneAnimDef {
    rotate: Option<Vec<ValueKey>>,
    translate: Option<Vec<Vec2Key>>,
    #[serde(rename = "translatex", alias = "translateX")]
    translate_x: Option<Vec<ValueKey>>,
    #[serde(rename = "translatey", alias = "translateY")]
    translate_y: Option<Vec<ValueKey>>,
    scale: Option<Vec<Vec2Key>>,
    #[serde(rename = "scalex", alias = "scaleX")]
    scale_x: Option<Vec<ValueKey>>,
    #[serde(rename = "scaley", alias = "scaleY")]
    scale_y: Option<Vec<ValueKey>>,
    shear: Option<Vec<Vec2Key>>,
    #[serde(rename = "shearx", alias = "shearX")]
    shear_x: Option<Vec<ValueKey>>,
    #[serde(rename = "sheary", alias = "shearY")]
    shear_y: Option<Vec<ValueKey>>,
    inherit: Option<Vec<InheritKey>>,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PathAnimDef {
    position: Option<Vec<ValueKey>>,
    spacing: Option<Vec<ValueKey>>,
    mix: Option<Vec<PathMixKey>>,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PhysicsAnimDef {
    inertia: Option<Vec<ValueKey>>,
    strength: Option<Vec<ValueKey>>,
    damping: Option<Vec<ValueKey>>,
    mass: Option<Vec<ValueKey>>,
    wind: Option<Vec<ValueKey>>,
    gravity: Option<Vec<ValueKey>>,
    mix: Option<Vec<ValueKey>>,
    reset: Option<Vec<TimeKey>>,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AttachmentAnimDef {
    deform: Option<Vec<DeformKey>>,
    sequence: Option<Vec<SequenceKeyDef>>,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TimeKey {
    #[serde(default)]
    time: f32,
}

#[derive(Debug, Deserialize)]
struct ValueKey {
    #[serde(default)]
    time: f32,
    #[serde(default, alias = "angle")]
    value: Option<f32>,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Vec2Key {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    x: Option<f32>,
    #[serde(default)]
    y: Option<f32>,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct InheritKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    inherit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColorKey {
    #[serde(default)]
    time: f32,
    color: String,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TwoColorKey {
    #[serde(default)]
    time: f32,
    light: String,
    dark: String,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IkKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one")]
    mix: f32,
    #[serde(default)]
    softness: f32,
    #[serde(default = "default_true", rename = "bendPositive")]
    bend_positive: bool,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    stretch: bool,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TransformKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one", rename = "mixRotate")]
    mix_rotate: f32,
    #[serde(default = "default_one", rename = "mixX")]
    mix_x: f32,
    #[serde(default, rename = "mixY")]
    mix_y: Option<f32>,
    #[serde(default = "default_one", rename = "mixScaleX")]
    mix_scale_x: f32,
    #[serde(default, rename = "mixScaleY")]
    mix_scale_y: Option<f32>,
    #[serde(default = "default_one", rename = "mixShearY")]
    mix_shear_y: f32,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PathMixKey {
    #[serde(default)]
    time: f32,
    #[serde(default = "default_one", rename = "mixRotate")]
    mix_rotate: f32,
    #[serde(default = "default_one", rename = "mixX")]
    mix_x: f32,
    #[serde(default, rename = "mixY")]
    mix_y: Option<f32>,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DeformKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    vertices: Option<Vec<f32>>,
    #[serde(default)]
    curve: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SequenceKeyDef {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    index: i32,
    #[serde(default)]
    delay: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct DrawOrderKey {
    #[serde(default)]
    time: f32,
    #[serde(default)]
    offsets: Vec<DrawOrderOffset>,
}

#[derive(Debug, Deserialize)]
struct DrawOrderOffset {
    slot: String,
    #[serde(default)]
    offset: i32,
}

#[derive(Debug, Deserialize)]
struct EventKey {
    #[serde(default)]
    time: f32,
    name: String,
    #[serde(default, rename = "int")]
    int_value: Option<i32>,
    #[serde(default, rename = "float")]
    float_value: Option<f32>,
    #[serde(default, rename = "string")]
    string_value: Option<String>,
    #[serde(default)]
    volume: Option<f32>,
    #[serde(default)]
    balance: Option<f32>,
}

/// Key with a time and an optional curve to the next key.
trait CurveKey {
    fn time(&self) -> f32;
    fn curve(&self) -> Option<&Value>;
}

macro_rules! curve_key {
    ($($key:ty),* $(,)?) => {
        $(impl CurveKey for $key {
            fn time(&self) -> f32 {
                self.time
            }

            fn curve(&self) -> Option<&Value> {
                self.curve.as_ref()
            }
        })*
    };
}

curve_key!(ValueKey, Vec2Key, ColorKey, TwoColorKey, IkKey, TransformKey, PathMixKey);

fn default_one() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn parse_hex_color(input: &str, context: &str) -> Result<Color, Error> {
    let invalid = || Error::JsonInvalidColor {
        context: context.to_string(),
        value: input.to_string(),
    };
    if !input.is_ascii() || !matches!(input.len(), 6 | 8) {
        return Err(invalid());
    }
    let channel = |i: usize| -> Result<f32, Error> {
        let pair = &input[i * 2..i * 2 + 2];
        if !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        u8::from_str_radix(pair, 16)
            .map(|v| f32::from(v) / 255.0)
            .map_err(|_| invalid())
    };
    let a = if input.len() == 8 { channel(3)? } else { 1.0 };
    Ok(Color::new(channel(0)?, channel(1)?, channel(2)?, a))
}

fn parse_name<T>(
    value: Option<&str>,
    default: T,
    kind: &'static str,
    from_name: impl FnOnce(&str) -> Option<T>,
) -> Result<T, Error> {
    match value {
        None => Ok(default),
        Some(name) => from_name(name).ok_or_else(|| Error::UnknownTypeTag {
            kind,
            value: name.to_string(),
        }),
    }
}

fn invalid_curve(context: &str, message: String) -> Error {
    Error::JsonInvalidCurve {
        context: context.to_string(),
        message,
    }
}

/// Bezier control points `cx1, cy1, cx2, cy2` for value column `value`, with `cy` scaled.
/// `Ok(None)` for a stepped or linear curve.
fn bezier_points(curve: &Value, value: usize, scale: f32, context: &str) -> Result<Option<[f32; 4]>, Error> {
    let points = match curve {
        Value::String(_) => return Ok(None),
        Value::Array(points) => points,
        other => return Err(invalid_curve(context, format!("expected an array or \"stepped\", got {other}"))),
    };
    let mut out = [0.0; 4];
    for (i, out) in out.iter_mut().enumerate() {
        let index = value * 4 + i;
        let point = points
            .get(index)
            .and_then(Value::as_f64)
            .ok_or_else(|| invalid_curve(context, format!("curve[{index}] must be a number")))?;
        *out = point as f32;
    }
    out[1] *= scale;
    out[3] *= scale;
    Ok(Some(out))
}

fn is_stepped(curve: &Value) -> bool {
    curve.as_str() == Some("stepped")
}

/// Keys of `N` values. Bezier curves are read for the first `curve_scales.len()` values,
/// each with its control point values scaled.
fn read_curves<K: CurveKey, const N: usize>(
    keys: &[K],
    curve_scales: &[f32],
    context: &str,
    mut read_values: impl FnMut(&K) -> Result<[f32; N], Error>,
) -> Result<CurveFrames, Error> {
    let frame_count = keys.len();
    let mut curves = CurveFrames::new(frame_count, frame_count * curve_scales.len(), N + 1);
    let mut bezier = 0;
    let mut previous: Option<(f32, [f32; N], Option<&Value>)> = None;
    for (frame, key) in keys.iter().enumerate() {
        let time = key.time();
        let values = read_values(key)?;
        curves.set_frame(frame, time, &values);
        if let Some((time1, values1, Some(curve))) = previous {
            if is_stepped(curve) {
                curves.set_stepped(frame - 1);
            } else {
                for (k, &scale) in curve_scales.iter().enumerate() {
                    if let Some([cx1, cy1, cx2, cy2]) = bezier_points(curve, k, scale, context)? {
                        curves.set_bezier(
                            bezier, frame - 1, k, time1, values1[k], cx1, cy1, cx2, cy2, time, values[k],
                        );
                        bezier += 1;
                    }
                }
            }
        }
        previous = Some((time, values, key.curve()));
    }
    curves.shrink(bezier);
    Ok(curves)
}

fn read_timeline1(keys: &[ValueKey], default: f32, scale: f32, context: &str) -> Result<CurveFrames, Error> {
    read_curves::<_, 1>(keys, &[scale], context, |key| Ok([key.value.unwrap_or(default) * scale]))
}

fn read_timeline2(keys: &[Vec2Key], default: f32, scale: f32, context: &str) -> Result<CurveFrames, Error> {
    read_curves::<_, 2>(keys, &[scale, scale], context, |key| {
        Ok([key.x.unwrap_or(default) * scale, key.y.unwrap_or(default) * scale])
    })
}

fn warn_unknown(unknown: &BTreeMap<String, Value>, animation: &str, owner: &str) {
    for key in unknown.keys() {
        warn!(animation, owner, timeline = %key, "ignoring unknown timeline");
    }
}

/// Reads Spine 4.2 JSON exports into [`SkeletonData`].
///
/// ```no_run
/// # fn load(json: &str) -> Result<(), spine_runtime::Error> {
/// let data = spine_runtime::json::JsonLoader::new().scale(2.0).read(json)?;
/// # let _ = data; Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct JsonLoader<'a> {
    scale: f32,
    atlas: Option<&'a Atlas>,
}

impl Default for JsonLoader<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> JsonLoader<'a> {
    pub fn new() -> Self {
        Self {
            scale: 1.0,
            atlas: None,
        }
    }

    /// Multiplier for every positional value. Non-finite values fall back to 1.
    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = if scale.is_finite() { scale } else { 1.0 };
        self
    }

    /// Atlas used to bind texture regions to region and mesh attachments.
    pub fn atlas(mut self, atlas: &'a Atlas) -> Self {
        self.atlas = Some(atlas);
        self
    }

    pub fn read(&self, input: &str) -> Result<Arc<SkeletonData>, Error> {
        let root: Root = serde_json::from_str(input).map_err(|e| Error::JsonParse {
            message: e.to_string(),
        })?;
        let mut reader = JsonReader {
            scale: self.scale,
            data: SkeletonData::default(),
            linked_meshes: Vec::new(),
        };
        reader.read_skeleton(root)?;
        let mut data = reader.data;
        if let Some(atlas) = self.atlas {
            bind_atlas(&mut data, atlas);
        }
        debug!(
            version = data.version.as_deref().unwrap_or_default(),
            bones = data.bones.len(),
            slots = data.slots.len(),
            skins = data.skins.len(),
            attachments = data.attachments.len(),
            animations = data.animations.len(),
            "loaded json skeleton"
        );
        Ok(Arc::new(data))
    }
}

impl SkeletonData {
    pub fn from_json_str(input: &str) -> Result<Arc<Self>, Error> {
        JsonLoader::new().read(input)
    }

    pub fn from_json_str_with_scale(input: &str, scale: f32) -> Result<Arc<Self>, Error> {
        JsonLoader::new().scale(scale).read(input)
    }
}

/// Linked mesh whose parent skin is named; skins may be declared after the mesh.
struct LinkedMeshDef {
    attachment: usize,
    skin: Option<String>,
    slot: usize,
    parent: String,
    inherit_timelines: bool,
}

struct JsonReader {
    scale: f32,
    data: SkeletonData,
    linked_meshes: Vec<LinkedMeshDef>,
}

impl JsonReader {
    fn bone(&self, name: &str, context: &str) -> Result<usize, Error> {
        self.data.find_bone(name).ok_or_else(|| Error::UnknownBone {
            name: name.to_string(),
            context: context.to_string(),
        })
    }

    fn slot(&self, name: &str, context: &str) -> Result<usize, Error> {
        self.data.find_slot(name).ok_or_else(|| Error::UnknownSlot {
            name: name.to_string(),
            context: context.to_string(),
        })
    }

    fn bones(&self, names: &[String], context: &str) -> Result<Vec<usize>, Error> {
        names.iter().map(|name| self.bone(name, context)).collect()
    }

    fn read_skeleton(&mut self, root: Root) -> Result<(), Error> {
        let scale = self.scale;
        let header = root.skeleton;
        let version = header
            .as_ref()
            .and_then(|h| h.spine.clone())
            .unwrap_or_default();
        if !is_supported_version(&version) {
            return Err(Error::SpineVersion { value: version });
        }
        self.data.version = Some(version);
        if let Some(header) = header {
            self.data.hash = header.hash;
            self.data.x = header.x;
            self.data.y = header.y;
            self.data.width = header.width;
            self.data.height = header.height;
            self.data.reference_scale = header.reference_scale * scale;
            if let Some(fps) = header.fps {
                self.data.fps = fps;
            }
            self.data.images_path = header.images;
            self.data.audio_path = header.audio;
        }

        self.read_bones(root.bones)?;
        self.read_slots(root.slots)?;
        self.read_ik_constraints(root.ik)?;
        self.read_transform_constraints(root.transform)?;
        self.read_path_constraints(root.path)?;
        self.read_physics_constraints(root.physics)?;

        let skins = match root.skins {
            None => Vec::new(),
            Some(SkinsDef::Array(skins)) => skins,
            Some(SkinsDef::Map(skins)) => skins
                .into_iter()
                .map(|(name, attachments)| SkinDef {
                    name,
                    attachments,
                    bones: Vec::new(),
                    ik: Vec::new(),
                    transform: Vec::new(),
                    path: Vec::new(),
                    physics: Vec::new(),
                    color: None,
                })
                .collect(),
        };
        for skin in skins {
            self.read_skin(skin)?;
        }
        self.link_meshes()?;

        for (name, def) in root.events {
            let mut event = EventData::new(name);
            event.int_value = def.int_value;
            event.float_value = def.float_value;
            event.string_value = def.string_value;
            if def.audio_path.is_some() {
                event.volume = def.volume;
                event.balance = def.balance;
            }
            event.audio_path = def.audio_path;
            self.data.events.push(event);
        }

        for (name, def) in root.animations {
            let animation = self.read_animation(name, def)?;
            self.data.animations.push(Arc::new(animation));
        }
        Ok(())
    }

    fn read_bones(&mut self, defs: Vec<BoneDef>) -> Result<(), Error> {
        let scale = self.scale;
        for (index, def) in defs.into_iter().enumerate() {
            let parent = match def.parent.as_deref() {
                Some(parent) => Some(self.bone(parent, &def.name)?),
                None => None,
            };
            let mut bone = BoneData::new(index, def.name, parent);
            bone.length = def.length * scale;
            bone.x = def.x * scale;
            bone.y = def.y * scale;
            bone.rotation = def.rotation;
            bone.scale_x = def.scale_x;
            bone.scale_y = def.scale_y;
            bone.shear_x = def.shear_x;
            bone.shear_y = def.shear_y;
            bone.inherit = parse_name(def.inherit.as_deref(), Inherit::Normal, "inherit", Inherit::from_name)?;
            bone.skin_required = def.skin_required;
            if let Some(color) = def.color.as_deref() {
                bone.color = parse_hex_color(color, &bone.name)?;
            }
            bone.icon = def.icon;
            bone.visible = def.visible;
            self.data.bones.push(bone);
        }
        Ok(())
    }

    fn read_slots(&mut self, defs: Vec<SlotDef>) -> Result<(), Error> {
        for (index, def) in defs.into_iter().enumerate() {
            let (path, name) = match def.name.rfind('/') {
                Some(slash) => (Some(def.name[..slash].to_string()), def.name[slash + 1..].to_string()),
                None => (None, def.name),
            };
            let bone = self.bone(&def.bone, &name)?;
            let mut slot = SlotData::new(index, name, bone);
            if let Some(color) = def.color.as_deref() {
                slot.color = parse_hex_color(color, &slot.name)?;
            }
            if let Some(dark) = def.dark.as_deref() {
                let dark = parse_hex_color(dark, &slot.name)?;
                slot.dark_color = Some(Color::new(dark.r, dark.g, dark.b, 1.0));
            }
            slot.attachment_name = def.attachment;
            slot.blend_mode = parse_name(def.blend.as_deref(), BlendMode::Normal, "blend mode", BlendMode::from_name)?;
            slot.visible = def.visible;
            slot.path = path;
            self.data.slots.push(slot);
        }
        Ok(())
    }

    fn read_ik_constraints(&mut self, defs: Vec<IkConstraintDef>) -> Result<(), Error> {
        for def in defs {
            let mut ik = IkConstraintData::new(def.name);
            ik.order = def.order;
            ik.skin_required = def.skin_required;
            ik.bones = self.bones(&def.bones, &ik.name)?;
            ik.target = self.bone(&def.target, &ik.name)?;
            ik.mix = def.mix;
            ik.softness = def.softness * self.scale;
            ik.bend_direction = if def.bend_positive { 1 } else { -1 };
            ik.compress = def.compress;
            ik.stretch = def.stretch;
            ik.uniform = def.uniform;
            self.data.ik_constraints.push(ik);
        }
        Ok(())
    }

    fn read_transform_constraints(&mut self, defs: Vec<TransformConstraintDef>) -> Result<(), Error> {
        let scale = self.scale;
        for def in defs {
            let mut c = TransformConstraintData::new(def.name);
            c.order = def.order;
            c.skin_required = def.skin_required;
            c.bones = self.bones(&def.bones, &c.name)?;
            c.target = self.bone(&def.target, &c.name)?;
            c.local = def.local;
            c.relative = def.relative;
            c.offset_rotation = def.rotation;
            c.offset_x = def.x * scale;
            c.offset_y = def.y * scale;
            c.offset_scale_x = def.scale_x;
            c.offset_scale_y = def.scale_y;
            c.offset_shear_y = def.shear_y;
            c.mix_rotate = def.mix_rotate;
            c.mix_x = def.mix_x;
            c.mix_y = def.mix_y.unwrap_or(def.mix_x);
            c.mix_scale_x = def.mix_scale_x;
            c.mix_scale_y = def.mix_scale_y.unwrap_or(def.mix_scale_x);
            c.mix_shear_y = def.mix_shear_y;
            self.data.transform_constraints.push(c);
        }
        Ok(())
    }

    fn read_path_constraints(&mut self, defs: Vec<PathConstraintDef>) -> Result<(), Error> {
        let scale = self.scale;
        for def in defs {
            let mut c = PathConstraintData::new(def.name);
            c.order = def.order;
            c.skin_required = def.skin_required;
            c.bones = self.bones(&def.bones, &c.name)?;
            c.target = self.slot(&def.target, &c.name)?;
            c.position_mode = parse_name(
                def.position_mode.as_deref(),
                PositionMode::Percent,
                "position mode",
                PositionMode::from_name,
            )?;
            c.spacing_mode = parse_name(
                def.spacing_mode.as_deref(),
                SpacingMode::Length,
                "spacing mode",
                SpacingMode::from_name,
            )?;
            c.rotate_mode = parse_name(
                def.rotate_mode.as_deref(),
                RotateMode::Tangent,
                "rotate mode",
                RotateMode::from_name,
            )?;
            c.offset_rotation = def.rotation;
            c.position = def.position;
            if c.position_mode == PositionMode::Fixed {
                c.position *= scale;
            }
            c.spacing = def.spacing;
            if matches!(c.spacing_mode, SpacingMode::Length | SpacingMode::Fixed) {
                c.spacing *= scale;
            }
            c.mix_rotate = def.mix_rotate;
            c.mix_x = def.mix_x;
            c.mix_y = def.mix_y.unwrap_or(def.mix_x);
            self.data.path_constraints.push(c);
        }
        Ok(())
    }

    fn read_physics_constraints(&mut self, defs: Vec<PhysicsConstraintDef>) -> Result<(), Error> {
        for def in defs {
            let mut c = PhysicsConstraintData::new(def.name);
            c.order = def.order;
            c.skin_required = def.skin_required;
            c.bone = self.bone(&def.bone, &c.name)?;
            c.x = def.x;
            c.y = def.y;
            c.rotate = def.rotate;
            c.scale_x = def.scale_x;
            c.shear_x = def.shear_x;
            c.limit = def.limit * self.scale;
            c.step = 1.0 / def.fps.max(1.0);
            c.inertia = def.inertia;
            c.strength = def.strength;
            c.damping = def.damping;
            c.mass_inverse = 1.0 / def.mass;
            c.wind = def.wind;
            c.gravity = def.gravity;
            c.mix = def.mix;
            c.inertia_global = def.inertia_global;
            c.strength_global = def.strength_global;
            c.damping_global = def.damping_global;
            c.mass_global = def.mass_global;
            c.wind_global = def.wind_global;
            c.gravity_global = def.gravity_global;
            c.mix_global = def.mix_global;
            self.data.physics_constraints.push(c);
        }
        Ok(())
    }

    fn read_skin(&mut self, def: SkinDef) -> Result<(), Error> {
        let mut skin = Skin::new(def.name);
        skin.bones = self.bones(&def.bones, &skin.name)?;
        let constraint = |kind: &'static str, name: &String, found: Option<usize>| {
            found.ok_or_else(|| Error::UnknownConstraint {
                kind,
                name: name.clone(),
            })
        };
        skin.ik_constraints = def
            .ik
            .iter()
            .map(|n| constraint("ik", n, self.data.find_ik_constraint(n)))
            .collect::<Result<_, _>>()?;
        skin.transform_constraints = def
            .transform
            .iter()
            .map(|n| constraint("transform", n, self.data.find_transform_constraint(n)))
            .collect::<Result<_, _>>()?;
        skin.path_constraints = def
            .path
            .iter()
            .map(|n| constraint("path", n, self.data.find_path_constraint(n)))
            .collect::<Result<_, _>>()?;
        skin.physics_constraints = def
            .physics
            .iter()
            .map(|n| constraint("physics", n, self.data.find_physics_constraint(n)))
            .collect::<Result<_, _>>()?;
        if let Some(color) = def.color.as_deref() {
            skin.color = Some(parse_hex_color(color, &skin.name)?);
        }

        for (slot_name, attachments) in def.attachments {
            let slot = self.slot(&slot_name, &skin.name)?;
            for (key, attachment) in attachments {
                let Some(attachment) = self.read_attachment(attachment, slot, &key)? else {
                    continue;
                };
                self.data.attachments.push(attachment);
                skin.set_attachment(slot, key, self.data.attachments.len() - 1);
            }
        }
        if skin.name == "default" {
            self.data.default_skin = Some(self.data.skins.len());
        }
        self.data.skins.push(skin);
        Ok(())
    }

    fn link_meshes(&mut self) -> Result<(), Error> {
        let pending = std::mem::take(&mut self.linked_meshes)
            .into_iter()
            .map(|linked| -> Result<PendingLinkedMesh, Error> {
                let parent_skin = match linked.skin.as_deref() {
                    Some(name) => self.data.find_skin(name),
                    None => self.data.default_skin,
                }
                .ok_or_else(|| Error::UnknownSkin {
                    name: linked.skin.clone().unwrap_or_else(|| "default".to_string()),
                })?;
                Ok(PendingLinkedMesh {
                    attachment: linked.attachment,
                    parent_skin,
                    slot: linked.slot,
                    parent: linked.parent,
                    inherit_timelines: linked.inherit_timelines,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        resolve_linked_meshes(&mut self.data, pending)
    }

    /// Reads an attachment that will be stored at the next arena index. Unknown types are
    /// skipped with a warning.
    fn read_attachment(&mut self, def: AttachmentDef, slot: usize, key: &str) -> Result<Option<Attachment>, Error> {
        let scale = self.scale;
        let index = self.data.attachments.len();
        let name = def.name.unwrap_or_else(|| key.to_string());
        let type_name = def.attachment_type.as_deref().unwrap_or("region");
        let Some(kind) = AttachmentType::from_name(type_name) else {
            warn!(attachment = %name, kind = type_name, "ignoring attachment of unknown type");
            return Ok(None);
        };
        let color = |default: Color| match def.color.as_deref() {
            Some(color) => parse_hex_color(color, &name),
            None => Ok(default),
        };
        let attachment = match kind {
            AttachmentType::Region => Attachment::Region(RegionAttachment {
                path: def.path.unwrap_or_else(|| name.clone()),
                x: def.x * scale,
                y: def.y * scale,
                scale_x: def.scale_x,
                scale_y: def.scale_y,
                rotation: def.rotation,
                width: def.width * scale,
                height: def.height * scale,
                color: color(Color::WHITE)?,
                region: None,
                sequence: def.sequence.map(read_sequence),
                name,
            }),
            AttachmentType::BoundingBox => Attachment::BoundingBox(BoundingBoxAttachment {
                vertex: self.read_vertices(&def.vertices, def.vertex_count << 1, index, &name)?,
                color: color(Color::WHITE)?,
                name,
            }),
            AttachmentType::Mesh | AttachmentType::LinkedMesh => {
                let color = color(Color::WHITE)?;
                let sequence = def.sequence.map(read_sequence);
                let path = def.path.unwrap_or_else(|| name.clone());
                let mut mesh = MeshAttachment {
                    path,
                    vertex: VertexData::new(index),
                    region_uvs: Vec::new(),
                    uvs: Vec::new(),
                    triangles: Vec::new(),
                    hull_length: 0,
                    color,
                    region: None,
                    sequence,
                    parent_mesh: None,
                    edges: Vec::new(),
                    width: def.width * scale,
                    height: def.height * scale,
                    name,
                };
                match def.parent {
                    Some(parent) => self.linked_meshes.push(LinkedMeshDef {
                        attachment: index,
                        skin: def.skin,
                        slot,
                        parent,
                        inherit_timelines: def.timelines,
                    }),
                    None => {
                        mesh.vertex = self.read_vertices(&def.vertices, def.uvs.len(), index, &mesh.name)?;
                        mesh.region_uvs = def.uvs;
                        mesh.triangles = def.triangles;
                        mesh.hull_length = def.hull * 2;
                        mesh.edges = def.edges;
                        mesh.update_region();
                    }
                }
                Attachment::Mesh(mesh)
            }
            AttachmentType::Path => Attachment::Path(PathAttachment {
                vertex: self.read_vertices(&def.vertices, def.vertex_count << 1, index, &name)?,
                lengths: def.lengths.iter().map(|l| l * scale).collect(),
                closed: def.closed,
                constant_speed: def.constant_speed,
                color: color(Color::WHITE)?,
                name,
            }),
            AttachmentType::Point => Attachment::Point(PointAttachment {
                x: def.x * scale,
                y: def.y * scale,
                rotation: def.rotation,
                color: color(POINT_COLOR)?,
                name,
            }),
            AttachmentType::Clipping => {
                let end_slot = match def.end.as_deref() {
                    Some(end) => Some(self.slot(end, &name)?),
                    None => None,
                };
                Attachment::Clipping(ClippingAttachment {
                    vertex: self.read_vertices(&def.vertices, def.vertex_count << 1, index, &name)?,
                    end_slot,
                    color: color(CLIPPING_COLOR)?,
                    name,
                })
            }
        };
        Ok(Some(attachment))
    }

    /// `length` floats of plain positions, or the weighted form: per vertex a bone count
    /// followed by `bone, x, y, weight` for each bone.
    fn read_vertices(&self, values: &[f32], length: usize, attachment: usize, name: &str) -> Result<VertexData, Error> {
        let scale = self.scale;
        let mut vertex = VertexData::new(attachment);
        vertex.world_vertices_length = length;
        if values.len() == length {
            vertex.vertices = values.iter().map(|v| v * scale).collect();
            return Ok(vertex);
        }
        let malformed = || Error::InvalidValue {
            message: format!("malformed weighted vertices for attachment '{name}'"),
        };
        let mut bones = Vec::with_capacity(length * 3);
        let mut weights = Vec::with_capacity(length * 9);
        let mut i = 0;
        while i < values.len() {
            let bone_count = values[i];
            if bone_count < 0.0 || bone_count.fract() != 0.0 {
                return Err(malformed());
            }
            let bone_count = bone_count as usize;
            bones.push(bone_count);
            i += 1;
            let end = i + bone_count * 4;
            let influences = values.get(i..end).ok_or_else(malformed)?;
            for influence in influences.chunks_exact(4) {
                let bone = influence[0] as usize;
                if influence[0] < 0.0 || bone >= self.data.bones.len() {
                    return Err(Error::UnknownBone {
                        name: format!("#{}", influence[0]),
                        context: name.to_string(),
                    });
                }
                bones.push(bone);
                weights.extend([influence[1] * scale, influence[2] * scale, influence[3]]);
            }
            i = end;
        }
        vertex.bones = Some(bones);
        vertex.vertices = weights;
        Ok(vertex)
    }

    fn read_animation(&self, name: String, def: AnimationDef) -> Result<Animation, Error> {
        let mut timelines = Vec::new();
        self.read_slot_timelines(&name, def.slots, &mut timelines)?;
        self.read_bone_timelines(&name, def.bones, &mut timelines)?;
        self.read_ik_timelines(&name, def.ik, &mut timelines)?;
        self.read_transform_timelines(&name, def.transform, &mut timelines)?;
        self.read_path_timelines(&name, def.path, &mut timelines)?;
        self.read_physics_timelines(&name, def.physics, &mut timelines)?;
        self.read_attachment_timelines(&name, def.attachments, &mut timelines)?;
        self.read_draw_order_timeline(&name, def.draw_order, &mut timelines)?;
        self.read_event_timeline(&name, def.events, &mut timelines)?;

        let duration = timelines.iter().map(Timeline::duration).fold(0.0, f32::max);
        Ok(Animation::new(name, timelines, duration))
    }

    fn read_slot_timelines(
        &self,
        animation: &str,
        slots: BTreeMap<String, SlotAnimDef>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        for (slot_name, def) in slots {
            let slot = self.slot(&slot_name, animation)?;
            warn_unknown(&def.unknown, animation, &slot_name);
            let context = format!("{animation}/{slot_name}");
            let color = |curves| SlotColorTimeline { slot, curves };
            if let Some(keys) = def.attachment.filter(|k| !k.is_empty()) {
                let (frames, attachment_names) = keys.into_iter().map(|k| (k.time, k.name)).unzip();
                timelines.push(Timeline::Attachment(AttachmentTimeline {
                    slot,
                    frames,
                    attachment_names,
                }));
            }
            if let Some(keys) = def.rgba.filter(|k| !k.is_empty()) {
                let curves = read_curves::<_, 4>(&keys, &[1.0; 4], &context, |k| {
                    let c = parse_hex_color(&k.color, &context)?;
                    Ok([c.r, c.g, c.b, c.a])
                })?;
                timelines.push(Timeline::Rgba(color(curves)));
            }
            if let Some(keys) = def.rgb.filter(|k| !k.is_empty()) {
                let curves = read_curves::<_, 3>(&keys, &[1.0; 3], &context, |k| {
                    let c = parse_hex_color(&k.color, &context)?;
                    Ok([c.r, c.g, c.b])
                })?;
                timelines.push(Timeline::Rgb(color(curves)));
            }
            if let Some(keys) = def.alpha.filter(|k| !k.is_empty()) {
                timelines.push(Timeline::Alpha(color(read_timeline1(&keys, 1.0, 1.0, &context)?)));
            }
            if let Some(keys) = def.rgba2.filter(|k| !k.is_empty()) {
                let curves = read_curves::<_, 7>(&keys, &[1.0; 7], &context, |k| {
                    let light = parse_hex_color(&k.light, &context)?;
                    let dark = parse_hex_color(&k.dark, &context)?;
                    Ok([light.r, light.g, light.b, light.a, dark.r, dark.g, dark.b])
                })?;
                timelines.push(Timeline::Rgba2(color(curves)));
            }
            if let Some(keys) = def.rgb2.filter(|k| !k.is_empty()) {
                let curves = read_curves::<_, 6>(&keys, &[1.0; 6], &context, |k| {
                    let light = parse_hex_color(&k.light, &context)?;
                    let dark = parse_hex_color(&k.dark, &context)?;
                    Ok([light.r, light.g, light.b, dark.r, dark.g, dark.b])
                })?;
                timelines.push(Timeline::Rgb2(color(curves)));
            }
        }
        Ok(())
    }

    fn read_bone_timelines(
        &self,
        animation: &str,
        bones: BTreeMap<String, BoneAnimDef>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        let scale = self.scale;
        for (bone_name, def) in bones {
            let bone = self.bone(&bone_name, animation)?;
            warn_unknown(&def.unknown, animation, &bone_name);
            let context = format!("{animation}/{bone_name}");
            let context = context.as_str();
            let one = |keys: Option<Vec<ValueKey>>, default: f32, scale: f32| -> Result<Option<BoneTimeline>, Error> {
                keys.filter(|k| !k.is_empty())
                    .map(|keys| read_timeline1(&keys, default, scale, context).map(|curves| BoneTimeline { bone, curves }))
                    .transpose()
            };
            let two = |keys: Option<Vec<Vec2Key>>, default: f32, scale: f32| -> Result<Option<BoneTimeline>, Error> {
                keys.filter(|k| !k.is_empty())
                    .map(|keys| read_timeline2(&keys, default, scale, context).map(|curves| BoneTimeline { bone, curves }))
                    .transpose()
            };
            let curve_timelines = [
                one(def.rotate, 0.0, 1.0)?.map(Timeline::Rotate),
                two(def.translate, 0.0, scale)?.map(Timeline::Translate),
                one(def.translate_x, 0.0, scale)?.map(Timeline::TranslateX),
                one(def.translate_y, 0.0, scale)?.map(Timeline::TranslateY),
                two(def.scale, 1.0, 1.0)?.map(Timeline::Scale),
                one(def.scale_x, 1.0, 1.0)?.map(Timeline::ScaleX),
                one(def.scale_y, 1.0, 1.0)?.map(Timeline::ScaleY),
                two(def.shear, 0.0, 1.0)?.map(Timeline::Shear),
                one(def.shear_x, 0.0, 1.0)?.map(Timeline::ShearX),
                one(def.shear_y, 0.0, 1.0)?.map(Timeline::ShearY),
            ];
            timelines.extend(curve_timelines.into_iter().flatten());
            if let Some(keys) = def.inherit.filter(|k| !k.is_empty()) {
                let mut frames = Vec::with_capacity(keys.len());
                let mut inherits = Vec::with_capacity(keys.len());
                for key in keys {
                    frames.push(key.time);
                    inherits.push(parse_name(key.inherit.as_deref(), Inherit::Normal, "inherit", Inherit::from_name)?);
                }
                timelines.push(Timeline::Inherit(InheritTimeline { bone, frames, inherits }));
            }
        }
        Ok(())
    }

    fn read_ik_timelines(
        &self,
        animation: &str,
        ik: BTreeMap<String, Vec<IkKey>>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        let scale = self.scale;
        for (name, keys) in ik {
            if keys.is_empty() {
                continue;
            }
            let constraint = self.data.find_ik_constraint(&name).ok_or_else(|| Error::UnknownConstraint {
                kind: "ik",
                name: name.clone(),
            })?;
            let context = format!("{animation}/ik/{name}");
            let curves = read_curves::<_, 5>(&keys, &[1.0, scale], &context, |k| {
                Ok([
                    k.mix,
                    k.softness * scale,
                    if k.bend_positive { 1.0 } else { -1.0 },
                    if k.compress { 1.0 } else { 0.0 },
                    if k.stretch { 1.0 } else { 0.0 },
                ])
            })?;
            timelines.push(Timeline::IkConstraint(ConstraintTimeline { constraint, curves }));
        }
        Ok(())
    }

    fn read_transform_timelines(
        &self,
        animation: &str,
        transform: BTreeMap<String, Vec<TransformKey>>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        for (name, keys) in transform {
            if keys.is_empty() {
                continue;
            }
            let constraint = self
                .data
                .find_transform_constraint(&name)
                .ok_or_else(|| Error::UnknownConstraint {
                    kind: "transform",
                    name: name.clone(),
                })?;
            let context = format!("{animation}/transform/{name}");
            let curves = read_curves::<_, 6>(&keys, &[1.0; 6], &context, |k| {
                Ok([
                    k.mix_rotate,
                    k.mix_x,
                    k.mix_y.unwrap_or(k.mix_x),
                    k.mix_scale_x,
                    k.mix_scale_y.unwrap_or(k.mix_scale_x),
                    k.mix_shear_y,
                ])
            })?;
            timelines.push(Timeline::TransformConstraint(ConstraintTimeline { constraint, curves }));
        }
        Ok(())
    }

    fn read_path_timelines(
        &self,
        animation: &str,
        path: BTreeMap<String, PathAnimDef>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        for (name, def) in path {
            let constraint = self.data.find_path_constraint(&name).ok_or_else(|| Error::UnknownConstraint {
                kind: "path",
                name: name.clone(),
            })?;
            warn_unknown(&def.unknown, animation, &name);
            let data = &self.data.path_constraints[constraint];
            let position_scale = if data.position_mode == PositionMode::Fixed { self.scale } else { 1.0 };
            let spacing_scale = if matches!(data.spacing_mode, SpacingMode::Length | SpacingMode::Fixed) {
                self.scale
            } else {
                1.0
            };
            let context = format!("{animation}/path/{name}");
            if let Some(keys) = def.position.filter(|k| !k.is_empty()) {
                timelines.push(Timeline::PathConstraintPosition(ConstraintTimeline {
                    constraint,
                    curves: read_timeline1(&keys, 0.0, position_scale, &context)?,
                }));
            }
            if let Some(keys) = def.spacing.filter(|k| !k.is_empty()) {
                timelines.push(Timeline::PathConstraintSpacing(ConstraintTimeline {
                    constraint,
                    curves: read_timeline1(&keys, 0.0, spacing_scale, &context)?,
                }));
            }
            if let Some(keys) = def.mix.filter(|k| !k.is_empty()) {
                let curves = read_curves::<_, 3>(&keys, &[1.0; 3], &context, |k| {
                    Ok([k.mix_rotate, k.mix_x, k.mix_y.unwrap_or(k.mix_x)])
                })?;
                timelines.push(Timeline::PathConstraintMix(ConstraintTimeline { constraint, curves }));
            }
        }
        Ok(())
    }

    fn read_physics_timelines(
        &self,
        animation: &str,
        physics: BTreeMap<String, PhysicsAnimDef>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        for (name, def) in physics {
            // An empty name targets every constraint.
            let constraint = if name.is_empty() {
                None
            } else {
                Some(self.data.find_physics_constraint(&name).ok_or_else(|| Error::UnknownConstraint {
                    kind: "physics",
                    name: name.clone(),
                })?)
            };
            warn_unknown(&def.unknown, animation, &name);
            let context = format!("{animation}/physics/{name}");
            let properties = [
                (def.inertia, PhysicsProperty::Inertia),
                (def.strength, PhysicsProperty::Strength),
                (def.damping, PhysicsProperty::Damping),
                (def.mass, PhysicsProperty::Mass),
                (def.wind, PhysicsProperty::Wind),
                (def.gravity, PhysicsProperty::Gravity),
                (def.mix, PhysicsProperty::Mix),
            ];
            for (keys, property) in properties {
                let Some(keys) = keys.filter(|k| !k.is_empty()) else {
                    continue;
                };
                timelines.push(Timeline::Physics(PhysicsConstraintTimeline {
                    constraint,
                    property,
                    curves: read_timeline1(&keys, 0.0, 1.0, &context)?,
                }));
            }
            if let Some(keys) = def.reset.filter(|k| !k.is_empty()) {
                timelines.push(Timeline::PhysicsReset(PhysicsResetTimeline {
                    constraint,
                    frames: keys.iter().map(|k| k.time).collect(),
                }));
            }
        }
        Ok(())
    }

    fn read_attachment_timelines(
        &self,
        animation: &str,
        skins: BTreeMap<String, BTreeMap<String, BTreeMap<String, AttachmentAnimDef>>>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        for (skin_name, slots) in skins {
            let skin = self
                .data
                .find_skin(&skin_name)
                .and_then(|i| self.data.skins.get(i))
                .ok_or_else(|| Error::UnknownSkin { name: skin_name.clone() })?;
            for (slot_name, attachments) in slots {
                let slot = self.slot(&slot_name, animation)?;
                for (attachment_name, def) in attachments {
                    let attachment = skin.attachment(slot, &attachment_name).ok_or_else(|| Error::UnknownAttachment {
                        name: attachment_name.clone(),
                        slot: slot_name.clone(),
                        skin: skin.name.clone(),
                    })?;
                    warn_unknown(&def.unknown, animation, &attachment_name);
                    if let Some(keys) = def.deform.filter(|k| !k.is_empty()) {
                        timelines.push(self.read_deform_timeline(animation, slot, attachment, &attachment_name, &keys)?);
                    }
                    if let Some(keys) = def.sequence.filter(|k| !k.is_empty()) {
                        let mut frames = Vec::with_capacity(keys.len());
                        let mut sequence_keys = Vec::with_capacity(keys.len());
                        let mut last_delay = 0.0;
                        for key in keys {
                            let delay = key.delay.unwrap_or(last_delay);
                            frames.push(key.time);
                            sequence_keys.push(SequenceKey {
                                mode: parse_name(key.mode.as_deref(), SequenceMode::Hold, "sequence mode", SequenceMode::from_name)?,
                                index: key.index,
                                delay,
                            });
                            last_delay = delay;
                        }
                        timelines.push(Timeline::Sequence(SequenceTimeline {
                            slot,
                            attachment,
                            frames,
                            keys: sequence_keys,
                        }));
                    }
                }
            }
        }
        Ok(())
    }

    fn read_deform_timeline(
        &self,
        animation: &str,
        slot: usize,
        attachment: usize,
        name: &str,
        keys: &[DeformKey],
    ) -> Result<Timeline, Error> {
        let scale = self.scale;
        let Some((deform_length, setup)) = deform_setup(&self.data, attachment) else {
            return Err(Error::InvalidValue {
                message: format!("deform keys in '{animation}' for attachment '{name}' without vertices"),
            });
        };
        let context = format!("{animation}/deform/{name}");
        let mut curves = CurveFrames::new(keys.len(), keys.len(), 1);
        let mut vertices = Vec::with_capacity(keys.len());
        let mut bezier = 0;
        for (frame, key) in keys.iter().enumerate() {
            let deform = match &key.vertices {
                None => setup.map_or_else(|| vec![0.0; deform_length], <[f32]>::to_vec),
                Some(values) => {
                    let end = key.offset + values.len();
                    if end > deform_length {
                        return Err(Error::InvalidValue {
                            message: format!("deform key in '{animation}' for '{name}' writes {end} of {deform_length} floats"),
                        });
                    }
                    let mut deform = vec![0.0; deform_length];
                    for (out, value) in deform[key.offset..end].iter_mut().zip(values) {
                        *out = value * scale;
                    }
                    if let Some(setup) = setup {
                        for (out, base) in deform.iter_mut().zip(setup) {
                            *out += base;
                        }
                    }
                    deform
                }
            };
            vertices.push(deform);
            curves.set_frame(frame, key.time, &[]);
            if frame == 0 {
                continue;
            }
            let previous = &keys[frame - 1];
            if let Some(curve) = &previous.curve {
                if is_stepped(curve) {
                    curves.set_stepped(frame - 1);
                } else if let Some([cx1, cy1, cx2, cy2]) = bezier_points(curve, 0, 1.0, &context)? {
                    curves.set_bezier_percent(bezier, frame - 1, previous.time, cx1, cy1, cx2, cy2, key.time);
                    bezier += 1;
                }
            }
        }
        curves.shrink(bezier);
        Ok(Timeline::Deform(DeformTimeline {
            slot,
            attachment,
            curves,
            vertices,
        }))
    }

    fn read_draw_order_timeline(
        &self,
        animation: &str,
        keys: Vec<DrawOrderKey>,
        timelines: &mut Vec<Timeline>,
    ) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let slot_count = self.data.slots.len();
        let mut frames = Vec::with_capacity(keys.len());
        let mut draw_orders = Vec::with_capacity(keys.len());
        for key in keys {
            frames.push(key.time);
            if key.offsets.is_empty() {
                draw_orders.push(None);
                continue;
            }
            let offsets = key
                .offsets
                .iter()
                .map(|o| Ok((self.slot(&o.slot, animation)?, o.offset)))
                .collect::<Result<Vec<_>, Error>>()?;
            let order = draw_order_from_offsets(slot_count, &offsets).ok_or_else(|| Error::InvalidValue {
                message: format!("invalid draw order offsets at {} in '{animation}'", key.time),
            })?;
            draw_orders.push(Some(order));
        }
        timelines.push(Timeline::DrawOrder(DrawOrderTimeline { frames, draw_orders }));
        Ok(())
    }

    fn read_event_timeline(&self, animation: &str, keys: Vec<EventKey>, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut frames = Vec::with_capacity(keys.len());
        let mut events = Vec::with_capacity(keys.len());
        for key in keys {
            let index = self.data.find_event(&key.name).ok_or_else(|| Error::UnknownEvent {
                name: key.name.clone(),
                animation: animation.to_string(),
            })?;
            let data = &self.data.events[index];
            let mut event = Event::new(key.time, index, data);
            if let Some(value) = key.int_value {
                event.int_value = value;
            }
            if let Some(value) = key.float_value {
                event.float_value = value;
            }
            if let Some(value) = key.string_value {
                event.string_value = Some(value);
            }
            if data.audio_path.is_some() {
                event.volume = key.volume.unwrap_or(1.0);
                event.balance = key.balance.unwrap_or(0.0);
            }
            frames.push(key.time);
            events.push(event);
        }
        timelines.push(Timeline::Event(EventTimeline { frames, events }));
        Ok(())
    }
}

fn read_sequence(def: SequenceDef) -> Sequence {
    let mut sequence = Sequence::new(def.count);
    sequence.start = def.start;
    sequence.digits = def.digits;
    sequence.setup_index = def.setup_index;
    sequence
}

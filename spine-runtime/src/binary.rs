//! Spine `.skel` (binary) loader for Spine 4.2 exports.
//!
//! The loader is IO-free: it operates on an in-memory byte slice. Every length-denominated
//! value is multiplied by the loader scale while reading, so timelines hold scaled values.

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
use byteorder::{BigEndian, ByteOrder};
use std::sync::Arc;
use tracing::debug;

const CURVE_LINEAR: u8 = 0;
const CURVE_STEPPED: u8 = 1;
const CURVE_BEZIER: u8 = 2;

const ATTACHMENT_DEFORM: u8 = 0;
const ATTACHMENT_SEQUENCE: u8 = 1;

const SLOT_ATTACHMENT: u8 = 0;
const SLOT_RGBA: u8 = 1;
const SLOT_RGB: u8 = 2;
const SLOT_RGBA2: u8 = 3;
const SLOT_RGB2: u8 = 4;
const SLOT_ALPHA: u8 = 5;

const BONE_ROTATE: u8 = 0;
const BONE_TRANSLATE: u8 = 1;
const BONE_TRANSLATEX: u8 = 2;
const BONE_TRANSLATEY: u8 = 3;
const BONE_SCALE: u8 = 4;
const BONE_SCALEX: u8 = 5;
const BONE_SCALEY: u8 = 6;
const BONE_SHEAR: u8 = 7;
const BONE_SHEARX: u8 = 8;
const BONE_SHEARY: u8 = 9;
const BONE_INHERIT: u8 = 10;

const PATH_POSITION: u8 = 0;
const PATH_SPACING: u8 = 1;
const PATH_MIX: u8 = 2;

const PHYSICS_INERTIA: u8 = 0;
const PHYSICS_STRENGTH: u8 = 1;
const PHYSICS_DAMPING: u8 = 2;
const PHYSICS_MASS: u8 = 4;
const PHYSICS_WIND: u8 = 5;
const PHYSICS_GRAVITY: u8 = 6;
const PHYSICS_MIX: u8 = 7;
const PHYSICS_RESET: u8 = 8;

#[derive(Clone, Debug)]
struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::BinaryParse {
            offset: self.cursor,
            message: message.into(),
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(self.error(format!("unexpected EOF reading {n} bytes")));
        }
        let out = &self.bytes[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    /// Color channel stored as one byte.
    fn read_unit(&mut self) -> Result<f32, Error> {
        Ok(f32::from(self.read_u8()?) / 255.0)
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(BigEndian::read_f32(self.take(4)?))
    }

    fn read_color(&mut self) -> Result<Color, Error> {
        Ok(Color::from_rgba8888(self.read_i32()? as u32))
    }

    fn read_varint(&mut self, optimize_positive: bool) -> Result<i32, Error> {
        let mut value = 0u32;
        for shift in [0, 7, 14, 21, 28] {
            let b = self.read_u8()?;
            value |= u32::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                break;
            }
        }
        if optimize_positive {
            Ok(value as i32)
        } else {
            Ok((value >> 1) as i32 ^ -((value & 1) as i32))
        }
    }

    /// Element count. Every element takes at least one byte, which bounds allocations made
    /// from corrupt counts.
    fn read_count(&mut self) -> Result<usize, Error> {
        let count = self.read_varint(true)? as u32 as usize;
        if count > self.remaining() {
            return Err(self.error(format!(
                "count {count} exceeds the {} bytes left",
                self.remaining()
            )));
        }
        Ok(count)
    }

    /// Varint index below `len`; `unknown` builds the error for anything else.
    fn read_index(&mut self, len: usize, unknown: impl FnOnce(usize) -> Error) -> Result<usize, Error> {
        let index = self.read_varint(true)? as u32 as usize;
        if index < len { Ok(index) } else { Err(unknown(index)) }
    }

    fn read_string(&mut self) -> Result<Option<String>, Error> {
        let length = self.read_varint(true)? as u32 as usize;
        match length {
            0 => Ok(None),
            1 => Ok(Some(String::new())),
            _ => {
                let offset = self.cursor;
                let bytes = self.take(length - 1)?;
                String::from_utf8(bytes.to_vec())
                    .map(Some)
                    .map_err(|e| Error::BinaryParse {
                        offset,
                        message: format!("invalid utf-8 in string: {e}"),
                    })
            }
        }
    }

    /// Index into the string table, 1-based; 0 is no string.
    fn read_string_ref(&mut self, strings: &[String]) -> Result<Option<String>, Error> {
        let offset = self.cursor;
        let index = self.read_varint(true)? as u32 as usize;
        if index == 0 {
            return Ok(None);
        }
        strings
            .get(index - 1)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::BinaryParse {
                offset,
                message: format!("string reference {index} outside the table of {}", strings.len()),
            })
    }

    fn read_floats(&mut self, n: usize, scale: f32) -> Result<Vec<f32>, Error> {
        let mut out = Vec::with_capacity(n.min(self.remaining() / 4));
        for _ in 0..n {
            out.push(self.read_f32()? * scale);
        }
        Ok(out)
    }

    fn read_shorts(&mut self, n: usize) -> Result<Vec<u16>, Error> {
        let mut out = Vec::with_capacity(n.min(self.remaining()));
        for _ in 0..n {
            let value = self.read_varint(true)?;
            out.push(u16::try_from(value).map_err(|_| self.error(format!("index {value} out of range")))?);
        }
        Ok(out)
    }

    /// Bezier control points `cx1, cy1, cx2, cy2` with the y values scaled.
    fn read_bezier(&mut self, scale: f32) -> Result<[f32; 4], Error> {
        Ok([
            self.read_f32()?,
            self.read_f32()? * scale,
            self.read_f32()?,
            self.read_f32()? * scale,
        ])
    }
}

fn unknown_bone(index: usize, context: &str) -> Error {
    Error::UnknownBone {
        name: format!("#{index}"),
        context: context.to_string(),
    }
}

fn unknown_slot(index: usize, context: &str) -> Error {
    Error::UnknownSlot {
        name: format!("#{index}"),
        context: context.to_string(),
    }
}

fn unknown_constraint(kind: &'static str) -> impl FnOnce(usize) -> Error {
    move |index| Error::UnknownConstraint {
        kind,
        name: format!("#{index}"),
    }
}

fn unknown_tag(kind: &'static str, value: impl ToString) -> Error {
    Error::UnknownTypeTag {
        kind,
        value: value.to_string(),
    }
}

/// Claims the next bezier table, failing when the frame count header announced fewer.
fn next_bezier(input: &BinaryInput<'_>, bezier: &mut usize, bezier_count: usize) -> Result<usize, Error> {
    if *bezier >= bezier_count {
        return Err(input.error(format!("more than the {bezier_count} announced bezier curves")));
    }
    *bezier += 1;
    Ok(*bezier - 1)
}

/// Reads `frame_count` keys of `N` values, each key but the last followed by its curve type.
/// `scale` applies to the bezier control point values.
fn read_curves<const N: usize>(
    input: &mut BinaryInput<'_>,
    frame_count: usize,
    bezier_count: usize,
    scale: f32,
    mut read_values: impl FnMut(&mut BinaryInput<'_>) -> Result<[f32; N], Error>,
) -> Result<CurveFrames, Error> {
    let mut curves = CurveFrames::new(frame_count, bezier_count, N + 1);
    if frame_count == 0 {
        return Ok(curves);
    }
    let mut time = input.read_f32()?;
    let mut values = read_values(input)?;
    let mut bezier = 0;
    for frame in 0..frame_count {
        curves.set_frame(frame, time, &values);
        if frame + 1 == frame_count {
            break;
        }
        let time2 = input.read_f32()?;
        let values2 = read_values(input)?;
        match input.read_u8()? {
            CURVE_LINEAR => {}
            CURVE_STEPPED => curves.set_stepped(frame),
            CURVE_BEZIER => {
                for k in 0..N {
                    let [cx1, cy1, cx2, cy2] = input.read_bezier(scale)?;
                    let b = next_bezier(input, &mut bezier, bezier_count)?;
                    curves.set_bezier(
                        b, frame, k, time, values[k], cx1, cy1, cx2, cy2, time2, values2[k],
                    );
                }
            }
            other => return Err(unknown_tag("curve", other)),
        }
        time = time2;
        values = values2;
    }
    Ok(curves)
}

fn read_timeline1(input: &mut BinaryInput<'_>, frame_count: usize, bezier_count: usize, scale: f32) -> Result<CurveFrames, Error> {
    read_curves::<1>(input, frame_count, bezier_count, scale, |i| Ok([i.read_f32()? * scale]))
}

fn read_timeline2(input: &mut BinaryInput<'_>, frame_count: usize, bezier_count: usize, scale: f32) -> Result<CurveFrames, Error> {
    read_curves::<2>(input, frame_count, bezier_count, scale, |i| {
        Ok([i.read_f32()? * scale, i.read_f32()? * scale])
    })
}

fn ik_mix(input: &mut BinaryInput<'_>, flags: u8) -> Result<f32, Error> {
    if flags & 1 == 0 {
        Ok(0.0)
    } else if flags & 2 != 0 {
        input.read_f32()
    } else {
        Ok(1.0)
    }
}

fn flag(flags: u8, bit: u8) -> f32 {
    if flags & bit != 0 { 1.0 } else { 0.0 }
}

/// Reads Spine 4.2 `.skel` exports into [`SkeletonData`].
///
/// ```no_run
/// # fn load(bytes: &[u8]) -> Result<(), spine_runtime::Error> {
/// let data = spine_runtime::binary::BinaryLoader::new().scale(0.5).read(bytes)?;
/// # let _ = data; Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct BinaryLoader<'a> {
    scale: f32,
    atlas: Option<&'a Atlas>,
}

impl Default for BinaryLoader<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> BinaryLoader<'a> {
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

    pub fn read(&self, bytes: &[u8]) -> Result<Arc<SkeletonData>, Error> {
        let mut reader = SkelReader {
            input: BinaryInput::new(bytes),
            scale: self.scale,
            nonessential: false,
            strings: Vec::new(),
            data: SkeletonData::default(),
            linked_meshes: Vec::new(),
        };
        reader.read_skeleton()?;
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
            "loaded binary skeleton"
        );
        Ok(Arc::new(data))
    }
}

impl SkeletonData {
    pub fn from_skel_bytes(bytes: &[u8]) -> Result<Arc<Self>, Error> {
        BinaryLoader::new().read(bytes)
    }

    pub fn from_skel_bytes_with_scale(bytes: &[u8], scale: f32) -> Result<Arc<Self>, Error> {
        BinaryLoader::new().scale(scale).read(bytes)
    }
}

struct SkelReader<'a> {
    input: BinaryInput<'a>,
    scale: f32,
    nonessential: bool,
    strings: Vec<String>,
    data: SkeletonData,
    linked_meshes: Vec<PendingLinkedMesh>,
}

impl SkelReader<'_> {
    fn read_name(&mut self, what: &str) -> Result<String, Error> {
        match self.input.read_string()? {
            Some(name) => Ok(name),
            None => Err(self.input.error(format!("{what} name must not be null"))),
        }
    }

    fn read_string_ref(&mut self) -> Result<Option<String>, Error> {
        self.input.read_string_ref(&self.strings)
    }

    fn read_bone(&mut self, context: &str) -> Result<usize, Error> {
        self.input
            .read_index(self.data.bones.len(), |i| unknown_bone(i, context))
    }

    fn read_slot(&mut self, context: &str) -> Result<usize, Error> {
        self.input
            .read_index(self.data.slots.len(), |i| unknown_slot(i, context))
    }

    fn read_bone_list(&mut self, context: &str) -> Result<Vec<usize>, Error> {
        let count = self.input.read_count()?;
        (0..count).map(|_| self.read_bone(context)).collect()
    }

    fn read_constraint_list(&mut self, kind: &'static str, len: usize) -> Result<Vec<usize>, Error> {
        let count = self.input.read_count()?;
        (0..count)
            .map(|_| self.input.read_index(len, unknown_constraint(kind)))
            .collect()
    }

    fn read_skeleton(&mut self) -> Result<(), Error> {
        let scale = self.scale;
        let low_hash = self.input.read_i32()?;
        let high_hash = self.input.read_i32()?;
        self.data.hash = (low_hash != 0 || high_hash != 0).then(|| format!("{high_hash:x}{low_hash:x}"));

        let version = self.input.read_string()?.unwrap_or_default();
        if !is_supported_version(&version) {
            return Err(Error::SpineVersion { value: version });
        }
        self.data.version = Some(version);
        self.data.x = self.input.read_f32()?;
        self.data.y = self.input.read_f32()?;
        self.data.width = self.input.read_f32()?;
        self.data.height = self.input.read_f32()?;
        self.data.reference_scale = self.input.read_f32()? * scale;

        self.nonessential = self.input.read_bool()?;
        if self.nonessential {
            self.data.fps = self.input.read_f32()?;
            self.data.images_path = self.input.read_string()?;
            self.data.audio_path = self.input.read_string()?;
        }

        let count = self.input.read_count()?;
        for _ in 0..count {
            let value = self.read_name("table string")?;
            self.strings.push(value);
        }

        self.read_bones()?;
        self.read_slots()?;
        self.read_ik_constraints()?;
        self.read_transform_constraints()?;
        self.read_path_constraints()?;
        self.read_physics_constraints()?;

        if let Some(skin) = self.read_skin(true)? {
            self.data.skins.push(skin);
            self.data.default_skin = Some(0);
        }
        let count = self.input.read_count()?;
        for _ in 0..count {
            if let Some(skin) = self.read_skin(false)? {
                self.data.skins.push(skin);
            }
        }
        let linked = std::mem::take(&mut self.linked_meshes);
        resolve_linked_meshes(&mut self.data, linked)?;

        let count = self.input.read_count()?;
        for _ in 0..count {
            let name = self.read_name("event")?;
            let mut event = EventData::new(name);
            event.int_value = self.input.read_varint(false)?;
            event.float_value = self.input.read_f32()?;
            event.string_value = self.input.read_string()?;
            event.audio_path = self.input.read_string()?;
            if event.audio_path.is_some() {
                event.volume = self.input.read_f32()?;
                event.balance = self.input.read_f32()?;
            }
            self.data.events.push(event);
        }

        let count = self.input.read_count()?;
        for _ in 0..count {
            let name = self.read_name("animation")?;
            let animation = self.read_animation(name)?;
            self.data.animations.push(Arc::new(animation));
        }
        Ok(())
    }

    fn read_bones(&mut self) -> Result<(), Error> {
        let scale = self.scale;
        let count = self.input.read_count()?;
        for index in 0..count {
            let name = self.read_name("bone")?;
            let parent = if index == 0 {
                None
            } else {
                Some(self.read_bone(&name)?)
            };
            let mut bone = BoneData::new(index, name, parent);
            bone.rotation = self.input.read_f32()?;
            bone.x = self.input.read_f32()? * scale;
            bone.y = self.input.read_f32()? * scale;
            bone.scale_x = self.input.read_f32()?;
            bone.scale_y = self.input.read_f32()?;
            bone.shear_x = self.input.read_f32()?;
            bone.shear_y = self.input.read_f32()?;
            bone.length = self.input.read_f32()? * scale;
            let inherit = self.input.read_u8()?;
            bone.inherit = Inherit::from_index(inherit).ok_or_else(|| unknown_tag("inherit", inherit))?;
            bone.skin_required = self.input.read_bool()?;
            if self.nonessential {
                bone.color = self.input.read_color()?;
                bone.icon = self.input.read_string()?;
                bone.visible = self.input.read_bool()?;
            }
            self.data.bones.push(bone);
        }
        Ok(())
    }

    fn read_slots(&mut self) -> Result<(), Error> {
        let count = self.input.read_count()?;
        for index in 0..count {
            let mut name = self.read_name("slot")?;
            let mut path = None;
            if self.nonessential {
                if let Some(slash) = name.rfind('/') {
                    path = Some(name[..slash].to_string());
                    name = name[slash + 1..].to_string();
                }
            }
            let bone = self.read_bone(&name)?;
            let mut slot = SlotData::new(index, name, bone);
            slot.color = self.input.read_color()?;
            let dark = self.input.read_i32()?;
            if dark != -1 {
                slot.dark_color = Some(Color::from_rgb888(dark as u32));
            }
            slot.attachment_name = self.read_string_ref()?;
            let blend = self.input.read_varint(true)?;
            slot.blend_mode = BlendMode::from_index(blend).ok_or_else(|| unknown_tag("blend mode", blend))?;
            if self.nonessential {
                slot.visible = self.input.read_bool()?;
                slot.path = path;
            }
            self.data.slots.push(slot);
        }
        Ok(())
    }

    fn read_ik_constraints(&mut self) -> Result<(), Error> {
        let count = self.input.read_count()?;
        for _ in 0..count {
            let mut ik = IkConstraintData::new(self.read_name("ik constraint")?);
            ik.order = self.input.read_varint(true)? as u32 as usize;
            ik.bones = self.read_bone_list(&ik.name)?;
            ik.target = self.read_bone(&ik.name)?;
            let flags = self.input.read_u8()?;
            ik.skin_required = flags & 1 != 0;
            ik.bend_direction = if flags & 2 != 0 { 1 } else { -1 };
            ik.compress = flags & 4 != 0;
            ik.stretch = flags & 8 != 0;
            ik.uniform = flags & 16 != 0;
            if flags & 32 != 0 {
                ik.mix = if flags & 64 != 0 {
                    self.input.read_f32()?
                } else {
                    1.0
                };
            }
            if flags & 128 != 0 {
                ik.softness = self.input.read_f32()? * self.scale;
            }
            self.data.ik_constraints.push(ik);
        }
        Ok(())
    }

    fn read_transform_constraints(&mut self) -> Result<(), Error> {
        let scale = self.scale;
        let count = self.input.read_count()?;
        for _ in 0..count {
            let name = self.read_name("transform constraint")?;
            let mut c = TransformConstraintData::new(name.clone());
            c.order = self.input.read_varint(true)? as u32 as usize;
            c.bones = self.read_bone_list(&name)?;
            c.target = self.read_bone(&name)?;
            let input = &mut self.input;
            let flags = input.read_u8()?;
            c.skin_required = flags & 1 != 0;
            c.local = flags & 2 != 0;
            c.relative = flags & 4 != 0;
            if flags & 8 != 0 {
                c.offset_rotation = input.read_f32()?;
            }
            if flags & 16 != 0 {
                c.offset_x = input.read_f32()? * scale;
            }
            if flags & 32 != 0 {
                c.offset_y = input.read_f32()? * scale;
            }
            if flags & 64 != 0 {
                c.offset_scale_x = input.read_f32()?;
            }
            if flags & 128 != 0 {
                c.offset_scale_y = input.read_f32()?;
            }
            let flags = input.read_u8()?;
            if flags & 1 != 0 {
                c.offset_shear_y = input.read_f32()?;
            }
            let mixes = [
                (2, &mut c.mix_rotate),
                (4, &mut c.mix_x),
                (8, &mut c.mix_y),
                (16, &mut c.mix_scale_x),
                (32, &mut c.mix_scale_y),
                (64, &mut c.mix_shear_y),
            ];
            for (bit, mix) in mixes {
                if flags & bit != 0 {
                    *mix = input.read_f32()?;
                }
            }
            self.data.transform_constraints.push(c);
        }
        Ok(())
    }

    fn read_path_constraints(&mut self) -> Result<(), Error> {
        let scale = self.scale;
        let count = self.input.read_count()?;
        for _ in 0..count {
            let name = self.read_name("path constraint")?;
            let mut c = PathConstraintData::new(name.clone());
            c.order = self.input.read_varint(true)? as u32 as usize;
            c.skin_required = self.input.read_bool()?;
            c.bones = self.read_bone_list(&name)?;
            c.target = self.read_slot(&name)?;
            let flags = self.input.read_u8()?;
            c.position_mode = PositionMode::from_index(flags & 1).ok_or_else(|| unknown_tag("position mode", flags & 1))?;
            let spacing = (flags >> 1) & 3;
            c.spacing_mode = SpacingMode::from_index(spacing).ok_or_else(|| unknown_tag("spacing mode", spacing))?;
            let rotate = (flags >> 3) & 3;
            c.rotate_mode = RotateMode::from_index(rotate).ok_or_else(|| unknown_tag("rotate mode", rotate))?;
            if flags & 128 != 0 {
                c.offset_rotation = self.input.read_f32()?;
            }
            c.position = self.input.read_f32()?;
            if c.position_mode == PositionMode::Fixed {
                c.position *= scale;
            }
            c.spacing = self.input.read_f32()?;
            if matches!(c.spacing_mode, SpacingMode::Length | SpacingMode::Fixed) {
                c.spacing *= scale;
            }
            c.mix_rotate = self.input.read_f32()?;
            c.mix_x = self.input.read_f32()?;
            c.mix_y = self.input.read_f32()?;
            self.data.path_constraints.push(c);
        }
        Ok(())
    }

    fn read_physics_constraints(&mut self) -> Result<(), Error> {
        let scale = self.scale;
        let count = self.input.read_count()?;
        for _ in 0..count {
            let name = self.read_name("physics constraint")?;
            let mut c = PhysicsConstraintData::new(name.clone());
            c.order = self.input.read_varint(true)? as u32 as usize;
            c.bone = self.read_bone(&name)?;
            let input = &mut self.input;
            let flags = input.read_u8()?;
            c.skin_required = flags & 1 != 0;
            if flags & 2 != 0 {
                c.x = input.read_f32()?;
            }
            if flags & 4 != 0 {
                c.y = input.read_f32()?;
            }
            if flags & 8 != 0 {
                c.rotate = input.read_f32()?;
            }
            if flags & 16 != 0 {
                c.scale_x = input.read_f32()?;
            }
            if flags & 32 != 0 {
                c.shear_x = input.read_f32()?;
            }
            c.limit = (if flags & 64 != 0 { input.read_f32()? } else { 5000.0 }) * scale;
            c.step = 1.0 / f32::from(input.read_u8()?.max(1));
            c.inertia = input.read_f32()?;
            c.strength = input.read_f32()?;
            c.damping = input.read_f32()?;
            c.mass_inverse = if flags & 128 != 0 { input.read_f32()? } else { 1.0 };
            c.wind = input.read_f32()?;
            c.gravity = input.read_f32()?;
            let flags = input.read_u8()?;
            c.inertia_global = flags & 1 != 0;
            c.strength_global = flags & 2 != 0;
            c.damping_global = flags & 4 != 0;
            c.mass_global = flags & 8 != 0;
            c.wind_global = flags & 16 != 0;
            c.gravity_global = flags & 32 != 0;
            c.mix_global = flags & 64 != 0;
            c.mix = if flags & 128 != 0 { input.read_f32()? } else { 1.0 };
            self.data.physics_constraints.push(c);
        }
        Ok(())
    }

    fn read_skin(&mut self, default_skin: bool) -> Result<Option<Skin>, Error> {
        let (mut skin, slot_count) = if default_skin {
            let slot_count = self.input.read_count()?;
            if slot_count == 0 {
                return Ok(None);
            }
            (Skin::new("default"), slot_count)
        } else {
            let mut skin = Skin::new(self.read_name("skin")?);
            if self.nonessential {
                skin.color = Some(self.input.read_color()?);
            }
            skin.bones = self.read_bone_list(&skin.name)?;
            skin.ik_constraints = self.read_constraint_list("ik", self.data.ik_constraints.len())?;
            skin.transform_constraints =
                self.read_constraint_list("transform", self.data.transform_constraints.len())?;
            skin.path_constraints = self.read_constraint_list("path", self.data.path_constraints.len())?;
            skin.physics_constraints =
                self.read_constraint_list("physics", self.data.physics_constraints.len())?;
            (skin, self.input.read_count()?)
        };

        for _ in 0..slot_count {
            let slot = self.read_slot(&skin.name)?;
            let count = self.input.read_count()?;
            for _ in 0..count {
                let Some(name) = self.read_string_ref()? else {
                    return Err(self.input.error("attachment name must not be null"));
                };
                let attachment = self.read_attachment(slot, &name)?;
                self.data.attachments.push(attachment);
                skin.set_attachment(slot, name, self.data.attachments.len() - 1);
            }
        }
        Ok(Some(skin))
    }

    fn read_sequence(&mut self) -> Result<Sequence, Error> {
        let mut sequence = Sequence::new(self.input.read_count()?);
        sequence.start = self.input.read_varint(true)?;
        sequence.digits = self.input.read_varint(true)? as u32 as usize;
        sequence.setup_index = self.input.read_varint(true)?;
        Ok(sequence)
    }

    /// Reads an attachment that will be stored at the next arena index.
    fn read_attachment(&mut self, slot: usize, key: &str) -> Result<Attachment, Error> {
        let scale = self.scale;
        let index = self.data.attachments.len();
        let flags = self.input.read_u8()?;
        let name = if flags & 8 != 0 {
            self.read_string_ref()?
                .ok_or_else(|| self.input.error("attachment name must not be null"))?
        } else {
            key.to_string()
        };
        let tag = flags & 7;
        let kind = AttachmentType::from_index(tag).ok_or_else(|| unknown_tag("attachment", tag))?;
        let attachment = match kind {
            AttachmentType::Region => {
                let path = if flags & 16 != 0 { self.read_string_ref()? } else { None };
                let color = if flags & 32 != 0 { self.input.read_color()? } else { Color::WHITE };
                let sequence = if flags & 64 != 0 { Some(self.read_sequence()?) } else { None };
                let input = &mut self.input;
                let rotation = if flags & 128 != 0 { input.read_f32()? } else { 0.0 };
                Attachment::Region(RegionAttachment {
                    path: path.unwrap_or_else(|| name.clone()),
                    name,
                    x: input.read_f32()? * scale,
                    y: input.read_f32()? * scale,
                    scale_x: input.read_f32()?,
                    scale_y: input.read_f32()?,
                    rotation,
                    width: input.read_f32()? * scale,
                    height: input.read_f32()? * scale,
                    color,
                    region: None,
                    sequence,
                })
            }
            AttachmentType::BoundingBox => {
                let vertex = self.read_vertices(flags & 16 != 0, index)?;
                let color = self.read_nonessential_color(Color::WHITE)?;
                Attachment::BoundingBox(BoundingBoxAttachment { name, vertex, color })
            }
            AttachmentType::Mesh => {
                let path = if flags & 16 != 0 { self.read_string_ref()? } else { None };
                let color = if flags & 32 != 0 { self.input.read_color()? } else { Color::WHITE };
                let sequence = if flags & 64 != 0 { Some(self.read_sequence()?) } else { None };
                let hull_length = self.input.read_count()?;
                let vertex = self.read_vertices(flags & 128 != 0, index)?;
                let length = vertex.world_vertices_length;
                let region_uvs = self.input.read_floats(length, 1.0)?;
                let triangle_count = length
                    .checked_sub(hull_length + 2)
                    .ok_or_else(|| self.input.error(format!("mesh hull {hull_length} exceeds its vertices")))?;
                let triangles = self.input.read_shorts(triangle_count * 3)?;
                let (edges, width, height) = if self.nonessential {
                    let count = self.input.read_count()?;
                    (
                        self.input.read_shorts(count)?,
                        self.input.read_f32()? * scale,
                        self.input.read_f32()? * scale,
                    )
                } else {
                    (Vec::new(), 0.0, 0.0)
                };
                let mut mesh = MeshAttachment {
                    path: path.unwrap_or_else(|| name.clone()),
                    name,
                    vertex,
                    region_uvs,
                    uvs: Vec::new(),
                    triangles,
                    hull_length: hull_length << 1,
                    color,
                    region: None,
                    sequence,
                    parent_mesh: None,
                    edges,
                    width,
                    height,
                };
                mesh.update_region();
                Attachment::Mesh(mesh)
            }
            AttachmentType::LinkedMesh => {
                let path = if flags & 16 != 0 { self.read_string_ref()? } else { None };
                let color = if flags & 32 != 0 { self.input.read_color()? } else { Color::WHITE };
                let sequence = if flags & 64 != 0 { Some(self.read_sequence()?) } else { None };
                let parent_skin = self.input.read_varint(true)? as u32 as usize;
                let Some(parent) = self.read_string_ref()? else {
                    return Err(self.input.error("linked mesh parent must not be null"));
                };
                let (width, height) = if self.nonessential {
                    (self.input.read_f32()? * scale, self.input.read_f32()? * scale)
                } else {
                    (0.0, 0.0)
                };
                self.linked_meshes.push(PendingLinkedMesh {
                    attachment: index,
                    parent_skin,
                    slot,
                    parent,
                    inherit_timelines: flags & 128 != 0,
                });
                Attachment::Mesh(MeshAttachment {
                    path: path.unwrap_or_else(|| name.clone()),
                    name,
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
                    width,
                    height,
                })
            }
            AttachmentType::Path => {
                let vertex = self.read_vertices(flags & 64 != 0, index)?;
                let lengths = self.input.read_floats(vertex.world_vertices_length / 6, scale)?;
                let color = self.read_nonessential_color(Color::WHITE)?;
                Attachment::Path(PathAttachment {
                    name,
                    vertex,
                    lengths,
                    closed: flags & 16 != 0,
                    constant_speed: flags & 32 != 0,
                    color,
                })
            }
            AttachmentType::Point => {
                let rotation = self.input.read_f32()?;
                let x = self.input.read_f32()? * scale;
                let y = self.input.read_f32()? * scale;
                let color = self.read_nonessential_color(POINT_COLOR)?;
                Attachment::Point(PointAttachment {
                    name,
                    x,
                    y,
                    rotation,
                    color,
                })
            }
            AttachmentType::Clipping => {
                let end_slot = self.read_slot(&name)?;
                let vertex = self.read_vertices(flags & 16 != 0, index)?;
                let color = self.read_nonessential_color(CLIPPING_COLOR)?;
                Attachment::Clipping(ClippingAttachment {
                    name,
                    vertex,
                    end_slot: Some(end_slot),
                    color,
                })
            }
        };
        Ok(attachment)
    }

    fn read_nonessential_color(&mut self, default: Color) -> Result<Color, Error> {
        if self.nonessential {
            self.input.read_color()
        } else {
            Ok(default)
        }
    }

    fn read_vertices(&mut self, weighted: bool, attachment: usize) -> Result<VertexData, Error> {
        let scale = self.scale;
        let vertex_count = self.input.read_count()?;
        let mut vertex = VertexData::new(attachment);
        vertex.world_vertices_length = vertex_count << 1;
        if !weighted {
            vertex.vertices = self.input.read_floats(vertex_count << 1, scale)?;
            return Ok(vertex);
        }
        let mut bones = Vec::with_capacity(vertex_count * 3);
        let mut weights = Vec::with_capacity(vertex_count * 9);
        for _ in 0..vertex_count {
            let bone_count = self.input.read_count()?;
            bones.push(bone_count);
            for _ in 0..bone_count {
                bones.push(self.read_bone("weighted vertices")?);
                weights.push(self.input.read_f32()? * scale);
                weights.push(self.input.read_f32()? * scale);
                weights.push(self.input.read_f32()?);
            }
        }
        vertex.bones = Some(bones);
        vertex.vertices = weights;
        Ok(vertex)
    }

    fn read_animation(&mut self, name: String) -> Result<Animation, Error> {
        // Total timeline count, only a capacity hint.
        self.input.read_varint(true)?;
        let mut timelines = Vec::new();
        self.read_slot_timelines(&mut timelines)?;
        self.read_bone_timelines(&mut timelines)?;
        self.read_ik_timelines(&mut timelines)?;
        self.read_transform_timelines(&mut timelines)?;
        self.read_path_timelines(&mut timelines)?;
        self.read_physics_timelines(&mut timelines)?;
        self.read_attachment_timelines(&mut timelines)?;
        self.read_draw_order_timeline(&mut timelines)?;
        self.read_event_timeline(&name, &mut timelines)?;

        let duration = timelines.iter().map(Timeline::duration).fold(0.0, f32::max);
        Ok(Animation::new(name, timelines, duration))
    }

    fn read_slot_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let slot_count = self.input.read_count()?;
        for _ in 0..slot_count {
            let slot = self.read_slot("slot timeline")?;
            let count = self.input.read_count()?;
            for _ in 0..count {
                let kind = self.input.read_u8()?;
                let frame_count = self.input.read_count()?;
                if kind == SLOT_ATTACHMENT {
                    let mut frames = Vec::with_capacity(frame_count);
                    let mut attachment_names = Vec::with_capacity(frame_count);
                    for _ in 0..frame_count {
                        frames.push(self.input.read_f32()?);
                        attachment_names.push(self.read_string_ref()?);
                    }
                    timelines.push(Timeline::Attachment(AttachmentTimeline {
                        slot,
                        frames,
                        attachment_names,
                    }));
                    continue;
                }
                let bezier_count = self.input.read_count()?;
                let input = &mut self.input;
                let color = |curves| SlotColorTimeline { slot, curves };
                let timeline = match kind {
                    SLOT_RGBA => Timeline::Rgba(color(read_curves::<4>(input, frame_count, bezier_count, 1.0, |i| {
                        Ok([i.read_unit()?, i.read_unit()?, i.read_unit()?, i.read_unit()?])
                    })?)),
                    SLOT_RGB => Timeline::Rgb(color(read_curves::<3>(input, frame_count, bezier_count, 1.0, |i| {
                        Ok([i.read_unit()?, i.read_unit()?, i.read_unit()?])
                    })?)),
                    SLOT_RGBA2 => Timeline::Rgba2(color(read_curves::<7>(input, frame_count, bezier_count, 1.0, |i| {
                        Ok([
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                        ])
                    })?)),
                    SLOT_RGB2 => Timeline::Rgb2(color(read_curves::<6>(input, frame_count, bezier_count, 1.0, |i| {
                        Ok([
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                            i.read_unit()?,
                        ])
                    })?)),
                    SLOT_ALPHA => Timeline::Alpha(color(read_curves::<1>(input, frame_count, bezier_count, 1.0, |i| {
                        Ok([i.read_unit()?])
                    })?)),
                    other => return Err(unknown_tag("slot timeline", other)),
                };
                timelines.push(timeline);
            }
        }
        Ok(())
    }

    fn read_bone_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let scale = self.scale;
        let bone_count = self.input.read_count()?;
        for _ in 0..bone_count {
            let bone = self.read_bone("bone timeline")?;
            let count = self.input.read_count()?;
            for _ in 0..count {
                let kind = self.input.read_u8()?;
                let frame_count = self.input.read_count()?;
                let input = &mut self.input;
                if kind == BONE_INHERIT {
                    let mut frames = Vec::with_capacity(frame_count);
                    let mut inherits = Vec::with_capacity(frame_count);
                    for _ in 0..frame_count {
                        frames.push(input.read_f32()?);
                        let inherit = input.read_u8()?;
                        inherits.push(Inherit::from_index(inherit).ok_or_else(|| unknown_tag("inherit", inherit))?);
                    }
                    timelines.push(Timeline::Inherit(InheritTimeline {
                        bone,
                        frames,
                        inherits,
                    }));
                    continue;
                }
                let bezier_count = input.read_count()?;
                let one = |input: &mut BinaryInput<'_>, scale| {
                    read_timeline1(input, frame_count, bezier_count, scale).map(|curves| BoneTimeline { bone, curves })
                };
                let two = |input: &mut BinaryInput<'_>, scale| {
                    read_timeline2(input, frame_count, bezier_count, scale).map(|curves| BoneTimeline { bone, curves })
                };
                let timeline = match kind {
                    BONE_ROTATE => Timeline::Rotate(one(input, 1.0)?),
                    BONE_TRANSLATE => Timeline::Translate(two(input, scale)?),
                    BONE_TRANSLATEX => Timeline::TranslateX(one(input, scale)?),
                    BONE_TRANSLATEY => Timeline::TranslateY(one(input, scale)?),
                    BONE_SCALE => Timeline::Scale(two(input, 1.0)?),
                    BONE_SCALEX => Timeline::ScaleX(one(input, 1.0)?),
                    BONE_SCALEY => Timeline::ScaleY(one(input, 1.0)?),
                    BONE_SHEAR => Timeline::Shear(two(input, 1.0)?),
                    BONE_SHEARX => Timeline::ShearX(one(input, 1.0)?),
                    BONE_SHEARY => Timeline::ShearY(one(input, 1.0)?),
                    other => return Err(unknown_tag("bone timeline", other)),
                };
                timelines.push(timeline);
            }
        }
        Ok(())
    }

    fn read_ik_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let scale = self.scale;
        let count = self.input.read_count()?;
        for _ in 0..count {
            let input = &mut self.input;
            let constraint = input.read_index(self.data.ik_constraints.len(), unknown_constraint("ik"))?;
            let frame_count = input.read_count()?;
            let bezier_count = input.read_count()?;
            let mut curves = CurveFrames::new(frame_count, bezier_count, 6);
            if frame_count > 0 {
                let mut flags = input.read_u8()?;
                let mut time = input.read_f32()?;
                let mut mix = ik_mix(input, flags)?;
                let mut softness = if flags & 4 != 0 { input.read_f32()? * scale } else { 0.0 };
                let mut bezier = 0;
                for frame in 0..frame_count {
                    let bend = if flags & 8 != 0 { 1.0 } else { -1.0 };
                    curves.set_frame(frame, time, &[mix, softness, bend, flag(flags, 16), flag(flags, 32)]);
                    if frame + 1 == frame_count {
                        break;
                    }
                    flags = input.read_u8()?;
                    let time2 = input.read_f32()?;
                    let mix2 = ik_mix(input, flags)?;
                    let softness2 = if flags & 4 != 0 { input.read_f32()? * scale } else { 0.0 };
                    if flags & 64 != 0 {
                        curves.set_stepped(frame);
                    } else if flags & 128 != 0 {
                        let [cx1, cy1, cx2, cy2] = input.read_bezier(1.0)?;
                        let b = next_bezier(input, &mut bezier, bezier_count)?;
                        curves.set_bezier(b, frame, 0, time, mix, cx1, cy1, cx2, cy2, time2, mix2);
                        let [cx1, cy1, cx2, cy2] = input.read_bezier(scale)?;
                        let b = next_bezier(input, &mut bezier, bezier_count)?;
                        curves.set_bezier(b, frame, 1, time, softness, cx1, cy1, cx2, cy2, time2, softness2);
                    }
                    time = time2;
                    mix = mix2;
                    softness = softness2;
                }
            }
            timelines.push(Timeline::IkConstraint(ConstraintTimeline { constraint, curves }));
        }
        Ok(())
    }

    fn read_transform_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let count = self.input.read_count()?;
        for _ in 0..count {
            let input = &mut self.input;
            let constraint = input.read_index(
                self.data.transform_constraints.len(),
                unknown_constraint("transform"),
            )?;
            let frame_count = input.read_count()?;
            let bezier_count = input.read_count()?;
            let curves = read_curves::<6>(input, frame_count, bezier_count, 1.0, |i| {
                Ok([
                    i.read_f32()?,
                    i.read_f32()?,
                    i.read_f32()?,
                    i.read_f32()?,
                    i.read_f32()?,
                    i.read_f32()?,
                ])
            })?;
            timelines.push(Timeline::TransformConstraint(ConstraintTimeline { constraint, curves }));
        }
        Ok(())
    }

    fn read_path_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let count = self.input.read_count()?;
        for _ in 0..count {
            let input = &mut self.input;
            let constraint = input.read_index(self.data.path_constraints.len(), unknown_constraint("path"))?;
            let data = &self.data.path_constraints[constraint];
            let position_scale = if data.position_mode == PositionMode::Fixed { self.scale } else { 1.0 };
            let spacing_scale = if matches!(data.spacing_mode, SpacingMode::Length | SpacingMode::Fixed) {
                self.scale
            } else {
                1.0
            };
            let timeline_count = input.read_count()?;
            for _ in 0..timeline_count {
                let kind = input.read_u8()?;
                let frame_count = input.read_count()?;
                let bezier_count = input.read_count()?;
                let timeline = match kind {
                    PATH_POSITION => Timeline::PathConstraintPosition(ConstraintTimeline {
                        constraint,
                        curves: read_timeline1(input, frame_count, bezier_count, position_scale)?,
                    }),
                    PATH_SPACING => Timeline::PathConstraintSpacing(ConstraintTimeline {
                        constraint,
                        curves: read_timeline1(input, frame_count, bezier_count, spacing_scale)?,
                    }),
                    PATH_MIX => Timeline::PathConstraintMix(ConstraintTimeline {
                        constraint,
                        curves: read_curves::<3>(input, frame_count, bezier_count, 1.0, |i| {
                            Ok([i.read_f32()?, i.read_f32()?, i.read_f32()?])
                        })?,
                    }),
                    other => return Err(unknown_tag("path timeline", other)),
                };
                timelines.push(timeline);
            }
        }
        Ok(())
    }

    fn read_physics_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let count = self.input.read_count()?;
        for _ in 0..count {
            let input = &mut self.input;
            // Stored one-based; zero targets every constraint.
            let index = input.read_index(self.data.physics_constraints.len() + 1, unknown_constraint("physics"))?;
            let constraint = index.checked_sub(1);
            let timeline_count = input.read_count()?;
            for _ in 0..timeline_count {
                let kind = input.read_u8()?;
                let frame_count = input.read_count()?;
                if kind == PHYSICS_RESET {
                    let frames = input.read_floats(frame_count, 1.0)?;
                    timelines.push(Timeline::PhysicsReset(PhysicsResetTimeline { constraint, frames }));
                    continue;
                }
                let bezier_count = input.read_count()?;
                let property = match kind {
                    PHYSICS_INERTIA => PhysicsProperty::Inertia,
                    PHYSICS_STRENGTH => PhysicsProperty::Strength,
                    PHYSICS_DAMPING => PhysicsProperty::Damping,
                    PHYSICS_MASS => PhysicsProperty::Mass,
                    PHYSICS_WIND => PhysicsProperty::Wind,
                    PHYSICS_GRAVITY => PhysicsProperty::Gravity,
                    PHYSICS_MIX => PhysicsProperty::Mix,
                    other => return Err(unknown_tag("physics timeline", other)),
                };
                timelines.push(Timeline::Physics(PhysicsConstraintTimeline {
                    constraint,
                    property,
                    curves: read_timeline1(input, frame_count, bezier_count, 1.0)?,
                }));
            }
        }
        Ok(())
    }

    fn read_attachment_timelines(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let skin_count = self.input.read_count()?;
        for _ in 0..skin_count {
            let skin = self.input.read_index(self.data.skins.len(), |i| Error::UnknownSkin {
                name: format!("#{i}"),
            })?;
            let slot_count = self.input.read_count()?;
            for _ in 0..slot_count {
                let slot = self.read_slot("attachment timeline")?;
                let count = self.input.read_count()?;
                for _ in 0..count {
                    let Some(name) = self.read_string_ref()? else {
                        return Err(self.input.error("attachment timeline name must not be null"));
                    };
                    let skin_data = &self.data.skins[skin];
                    let attachment = skin_data.attachment(slot, &name).ok_or_else(|| Error::UnknownAttachment {
                        name: name.clone(),
                        slot: self.data.slots[slot].name.clone(),
                        skin: skin_data.name.clone(),
                    })?;
                    let kind = self.input.read_u8()?;
                    let frame_count = self.input.read_count()?;
                    let timeline = match kind {
                        ATTACHMENT_DEFORM => self.read_deform_timeline(slot, attachment, &name, frame_count)?,
                        ATTACHMENT_SEQUENCE => {
                            let mut frames = Vec::with_capacity(frame_count);
                            let mut keys = Vec::with_capacity(frame_count);
                            for _ in 0..frame_count {
                                frames.push(self.input.read_f32()?);
                                let mode_and_index = self.input.read_i32()?;
                                let mode = SequenceMode::from_index(mode_and_index & 0xf)
                                    .ok_or_else(|| unknown_tag("sequence mode", mode_and_index & 0xf))?;
                                keys.push(SequenceKey {
                                    mode,
                                    index: mode_and_index >> 4,
                                    delay: self.input.read_f32()?,
                                });
                            }
                            Timeline::Sequence(SequenceTimeline {
                                slot,
                                attachment,
                                frames,
                                keys,
                            })
                        }
                        other => return Err(unknown_tag("attachment timeline", other)),
                    };
                    timelines.push(timeline);
                }
            }
        }
        Ok(())
    }

    fn read_deform_timeline(
        &mut self,
        slot: usize,
        attachment: usize,
        name: &str,
        frame_count: usize,
    ) -> Result<Timeline, Error> {
        let scale = self.scale;
        let Some((deform_length, setup)) = deform_setup(&self.data, attachment) else {
            return Err(self.input.error(format!("deform keys for attachment '{name}' without vertices")));
        };
        let setup = setup.map(<[f32]>::to_vec);
        let input = &mut self.input;
        let bezier_count = input.read_count()?;
        let mut curves = CurveFrames::new(frame_count, bezier_count, 1);
        let mut vertices = Vec::with_capacity(frame_count);
        if frame_count > 0 {
            let mut time = input.read_f32()?;
            let mut bezier = 0;
            for frame in 0..frame_count {
                let end = input.read_varint(true)? as u32 as usize;
                let deform = if end == 0 {
                    setup.clone().unwrap_or_else(|| vec![0.0; deform_length])
                } else {
                    let mut deform = vec![0.0; deform_length];
                    let start = input.read_varint(true)? as u32 as usize;
                    let end = start + end;
                    if end > deform_length {
                        return Err(input.error(format!(
                            "deform key for '{name}' writes {end} of {deform_length} floats"
                        )));
                    }
                    for value in &mut deform[start..end] {
                        *value = input.read_f32()? * scale;
                    }
                    if let Some(setup) = &setup {
                        for (value, base) in deform.iter_mut().zip(setup) {
                            *value += base;
                        }
                    }
                    deform
                };
                vertices.push(deform);
                curves.set_frame(frame, time, &[]);
                if frame + 1 == frame_count {
                    break;
                }
                let time2 = input.read_f32()?;
                match input.read_u8()? {
                    CURVE_LINEAR => {}
                    CURVE_STEPPED => curves.set_stepped(frame),
                    CURVE_BEZIER => {
                        let [cx1, cy1, cx2, cy2] = input.read_bezier(1.0)?;
                        let b = next_bezier(input, &mut bezier, bezier_count)?;
                        curves.set_bezier_percent(b, frame, time, cx1, cy1, cx2, cy2, time2);
                    }
                    other => return Err(unknown_tag("curve", other)),
                }
                time = time2;
            }
        }
        Ok(Timeline::Deform(DeformTimeline {
            slot,
            attachment,
            curves,
            vertices,
        }))
    }

    fn read_draw_order_timeline(&mut self, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let frame_count = self.input.read_count()?;
        if frame_count == 0 {
            return Ok(());
        }
        let slot_count = self.data.slots.len();
        let input = &mut self.input;
        let mut frames = Vec::with_capacity(frame_count);
        let mut draw_orders = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            frames.push(input.read_f32()?);
            let offset_count = input.read_count()?;
            if offset_count == 0 {
                draw_orders.push(None);
                continue;
            }
            let mut offsets = Vec::with_capacity(offset_count);
            for _ in 0..offset_count {
                let slot = input.read_index(slot_count, |i| unknown_slot(i, "draw order"))?;
                offsets.push((slot, input.read_varint(true)?));
            }
            let order = draw_order_from_offsets(slot_count, &offsets)
                .ok_or_else(|| input.error(format!("invalid draw order offsets {offsets:?}")))?;
            draw_orders.push(Some(order));
        }
        timelines.push(Timeline::DrawOrder(DrawOrderTimeline { frames, draw_orders }));
        Ok(())
    }

    fn read_event_timeline(&mut self, animation: &str, timelines: &mut Vec<Timeline>) -> Result<(), Error> {
        let frame_count = self.input.read_count()?;
        if frame_count == 0 {
            return Ok(());
        }
        let input = &mut self.input;
        let mut frames = Vec::with_capacity(frame_count);
        let mut events = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            let time = input.read_f32()?;
            let index = input.read_index(self.data.events.len(), |i| Error::UnknownEvent {
                name: format!("#{i}"),
                animation: animation.to_string(),
            })?;
            let data = &self.data.events[index];
            let mut event = Event::new(time, index, data);
            event.int_value = input.read_varint(false)?;
            event.float_value = input.read_f32()?;
            if let Some(value) = input.read_string()? {
                event.string_value = Some(value);
            }
            if data.audio_path.is_some() {
                event.volume = input.read_f32()?;
                event.balance = input.read_f32()?;
            }
            frames.push(time);
            events.push(event);
        }
        timelines.push(Timeline::Event(EventTimeline { frames, events }));
        Ok(())
    }
}

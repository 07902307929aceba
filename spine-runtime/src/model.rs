use crate::{Animation, TextureRegion};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Unpacks `0xRRGGBBAA`.
    pub fn from_rgba8888(value: u32) -> Self {
        Self::new(
            ((value >> 24) & 0xff) as f32 / 255.0,
            ((value >> 16) & 0xff) as f32 / 255.0,
            ((value >> 8) & 0xff) as f32 / 255.0,
            (value & 0xff) as f32 / 255.0,
        )
    }

    /// Unpacks `0x??RRGGBB`, alpha is 1.
    pub fn from_rgb888(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xff) as f32 / 255.0,
            ((value >> 8) & 0xff) as f32 / 255.0,
            (value & 0xff) as f32 / 255.0,
            1.0,
        )
    }

    pub fn set(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.r = r;
        self.g = g;
        self.b = b;
        self.a = a;
        self.clamp();
    }

    pub fn add(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.r += r;
        self.g += g;
        self.b += b;
        self.a += a;
        self.clamp();
    }

    pub fn clamp(&mut self) {
        self.r = self.r.clamp(0.0, 1.0);
        self.g = self.g.clamp(0.0, 1.0);
        self.b = self.b.clamp(0.0, 1.0);
        self.a = self.a.clamp(0.0, 1.0);
    }
}

/// How a bone inherits its parent's transform.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Inherit {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

impl Inherit {
    pub(crate) fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Normal),
            1 => Some(Self::OnlyTranslation),
            2 => Some(Self::NoRotationOrReflection),
            3 => Some(Self::NoScale),
            4 => Some(Self::NoScaleOrReflection),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::OnlyTranslation => 1,
            Self::NoRotationOrReflection => 2,
            Self::NoScale => 3,
            Self::NoScaleOrReflection => 4,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(Self::Normal),
            "onlyTranslation" => Some(Self::OnlyTranslation),
            "noRotationOrReflection" => Some(Self::NoRotationOrReflection),
            "noScale" => Some(Self::NoScale),
            "noScaleOrReflection" => Some(Self::NoScaleOrReflection),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BoneData {
    pub index: usize,
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub inherit: Inherit,
    pub skin_required: bool,

    // Nonessential.
    pub color: Color,
    pub icon: Option<String>,
    pub visible: bool,
}

impl BoneData {
    pub fn new(index: usize, name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            index,
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            inherit: Inherit::Normal,
            skin_required: false,
            color: Color::new(0.61, 0.61, 0.61, 1.0),
            icon: None,
            visible: true,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub(crate) fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Normal),
            1 => Some(Self::Additive),
            2 => Some(Self::Multiply),
            3 => Some(Self::Screen),
            _ => None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(Self::Normal),
            "additive" => Some(Self::Additive),
            "multiply" => Some(Self::Multiply),
            "screen" => Some(Self::Screen),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub index: usize,
    pub name: String,
    pub bone: usize,
    pub color: Color,
    /// Two color tinting; only the RGB channels are used.
    pub dark_color: Option<Color>,
    pub attachment_name: Option<String>,
    pub blend_mode: BlendMode,

    // Nonessential.
    pub path: Option<String>,
    pub visible: bool,
}

impl SlotData {
    pub fn new(index: usize, name: impl Into<String>, bone: usize) -> Self {
        Self {
            index,
            name: name.into(),
            bone,
            color: Color::WHITE,
            dark_color: None,
            attachment_name: None,
            blend_mode: BlendMode::Normal,
            path: None,
            visible: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub mix: f32,
    pub softness: f32,
}

impl IkConstraintData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones: Vec::new(),
            target: 0,
            bend_direction: 1,
            compress: false,
            stretch: false,
            uniform: false,
            mix: 1.0,
            softness: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,
    pub relative: bool,
    pub local: bool,
}

impl TransformConstraintData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones: Vec::new(),
            target: 0,
            mix_rotate: 0.0,
            mix_x: 0.0,
            mix_y: 0.0,
            mix_scale_x: 0.0,
            mix_scale_y: 0.0,
            mix_shear_y: 0.0,
            offset_rotation: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            offset_scale_x: 0.0,
            offset_scale_y: 0.0,
            offset_shear_y: 0.0,
            relative: false,
            local: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PositionMode {
    Fixed,
    #[default]
    Percent,
}

impl PositionMode {
    pub(crate) fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Fixed),
            1 => Some(Self::Percent),
            _ => None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "fixed" => Some(Self::Fixed),
            "percent" => Some(Self::Percent),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SpacingMode {
    #[default]
    Length,
    Fixed,
    Percent,
    Proportional,
}

impl SpacingMode {
    pub(crate) fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Length),
            1 => Some(Self::Fixed),
            2 => Some(Self::Percent),
            3 => Some(Self::Proportional),
            _ => None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "length" => Some(Self::Length),
            "fixed" => Some(Self::Fixed),
            "percent" => Some(Self::Percent),
            "proportional" => Some(Self::Proportional),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

impl RotateMode {
    pub(crate) fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Tangent),
            1 => Some(Self::Chain),
            2 => Some(Self::ChainScale),
            _ => None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "tangent" => Some(Self::Tangent),
            "chain" => Some(Self::Chain),
            "chainScale" => Some(Self::ChainScale),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PathConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    /// Slot holding the path attachment.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
}

impl PathConstraintData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bones: Vec::new(),
            target: 0,
            position_mode: PositionMode::Percent,
            spacing_mode: SpacingMode::Length,
            rotate_mode: RotateMode::Tangent,
            offset_rotation: 0.0,
            position: 0.0,
            spacing: 0.0,
            mix_rotate: 1.0,
            mix_x: 1.0,
            mix_y: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PhysicsConstraintData {
    pub name: String,
    pub order: usize,
    pub skin_required: bool,
    pub bone: usize,

    pub x: f32,
    pub y: f32,
    pub rotate: f32,
    pub scale_x: f32,
    pub shear_x: f32,
    pub limit: f32,
    pub step: f32,

    pub inertia: f32,
    pub strength: f32,
    pub damping: f32,
    pub mass_inverse: f32,
    pub wind: f32,
    pub gravity: f32,
    pub mix: f32,

    pub inertia_global: bool,
    pub strength_global: bool,
    pub damping_global: bool,
    pub mass_global: bool,
    pub wind_global: bool,
    pub gravity_global: bool,
    pub mix_global: bool,
}

impl PhysicsConstraintData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bone: 0,
            x: 0.0,
            y: 0.0,
            rotate: 0.0,
            scale_x: 0.0,
            shear_x: 0.0,
            limit: 5000.0,
            step: 1.0 / 60.0,
            inertia: 1.0,
            strength: 100.0,
            damping: 1.0,
            mass_inverse: 1.0,
            wind: 0.0,
            gravity: 0.0,
            mix: 1.0,
            inertia_global: false,
            strength_global: false,
            damping_global: false,
            mass_global: false,
            wind_global: false,
            gravity_global: false,
            mix_global: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: Option<String>,
    pub audio_path: Option<String>,
    pub volume: f32,
    pub balance: f32,
}

impl EventData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            int_value: 0,
            float_value: 0.0,
            string_value: None,
            audio_path: None,
            volume: 1.0,
            balance: 0.0,
        }
    }
}

/// A keyed event: its `EventData` index plus the values set on the key.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub data: usize,
    pub time: f32,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: Option<String>,
    pub volume: f32,
    pub balance: f32,
}

impl Event {
    pub fn new(time: f32, data: usize, event_data: &EventData) -> Self {
        Self {
            data,
            time,
            int_value: event_data.int_value,
            float_value: event_data.float_value,
            string_value: event_data.string_value.clone(),
            volume: event_data.volume,
            balance: event_data.balance,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceMode {
    Hold,
    Once,
    Loop,
    PingPong,
    OnceReverse,
    LoopReverse,
    PingPongReverse,
}

impl SequenceMode {
    pub(crate) fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Hold),
            1 => Some(Self::Once),
            2 => Some(Self::Loop),
            3 => Some(Self::PingPong),
            4 => Some(Self::OnceReverse),
            5 => Some(Self::LoopReverse),
            6 => Some(Self::PingPongReverse),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> i32 {
        match self {
            Self::Hold => 0,
            Self::Once => 1,
            Self::Loop => 2,
            Self::PingPong => 3,
            Self::OnceReverse => 4,
            Self::LoopReverse => 5,
            Self::PingPongReverse => 6,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "hold" => Some(Self::Hold),
            "once" => Some(Self::Once),
            "loop" => Some(Self::Loop),
            "pingpong" => Some(Self::PingPong),
            "onceReverse" => Some(Self::OnceReverse),
            "loopReverse" => Some(Self::LoopReverse),
            "pingpongReverse" => Some(Self::PingPongReverse),
            _ => None,
        }
    }
}

/// Image sequence for region and mesh attachments.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub count: usize,
    pub start: i32,
    pub digits: usize,
    /// Frame shown when the slot's sequence index is -1.
    pub setup_index: i32,
    /// Texture regions per frame, filled when an atlas is supplied at load time.
    pub regions: Vec<Option<TextureRegion>>,
}

impl Sequence {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            start: 0,
            digits: 0,
            setup_index: 0,
            regions: vec![None; count],
        }
    }

    /// Atlas name of frame `index`: `base_path` followed by the zero padded frame number.
    pub fn path(&self, base_path: &str, index: usize) -> String {
        let frame = (self.start + index as i32).to_string();
        let padding = self.digits.saturating_sub(frame.len());
        let mut out = String::with_capacity(base_path.len() + padding + frame.len());
        out.push_str(base_path);
        out.extend(std::iter::repeat_n('0', padding));
        out.push_str(&frame);
        out
    }

    /// Frame that is shown for a slot `sequence_index`.
    pub fn resolve_index(&self, sequence_index: i32) -> usize {
        let index = if sequence_index == -1 {
            self.setup_index
        } else {
            sequence_index
        };
        (index.max(0) as usize).min(self.count.saturating_sub(1))
    }

    pub fn region(&self, sequence_index: i32) -> Option<&TextureRegion> {
        self.regions
            .get(self.resolve_index(sequence_index))
            .and_then(Option::as_ref)
    }
}

/// Bone-weighted or plain vertices shared by mesh, path, bounding box and clipping attachments.
///
/// `bones` uses the runtime layout: for each vertex, the bone count followed by that many
/// bone indices. When it is set, `vertices` holds `x, y, weight` triples; otherwise plain
/// `x, y` pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexData {
    pub bones: Option<Vec<usize>>,
    pub vertices: Vec<f32>,
    pub world_vertices_length: usize,
    /// Arena index of the attachment whose deform and sequence timelines drive this one.
    pub timeline_attachment: usize,
}

impl VertexData {
    pub fn new(timeline_attachment: usize) -> Self {
        Self {
            bones: None,
            vertices: Vec::new(),
            world_vertices_length: 0,
            timeline_attachment,
        }
    }

    pub fn is_weighted(&self) -> bool {
        self.bones.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachment {
    pub name: String,
    pub path: String,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotation: f32,
    pub width: f32,
    pub height: f32,
    pub color: Color,
    pub region: Option<TextureRegion>,
    pub sequence: Option<Sequence>,
}

#[derive(Clone, Debug)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub vertex: VertexData,
    pub region_uvs: Vec<f32>,
    pub uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub hull_length: usize,
    pub color: Color,
    pub region: Option<TextureRegion>,
    pub sequence: Option<Sequence>,
    /// Set for linked meshes; the geometry above is a copy of the parent's.
    pub parent_mesh: Option<usize>,

    // Nonessential.
    pub edges: Vec<u16>,
    pub width: f32,
    pub height: f32,
}

impl MeshAttachment {
    /// Recomputes `uvs` from `region_uvs` for the current region, undoing atlas whitespace
    /// stripping and rotation. Without a region the region UVs are used as is.
    pub fn update_region(&mut self) {
        let region_uvs = &self.region_uvs;
        self.uvs.resize(region_uvs.len(), 0.0);
        let Some(region) = self.region.as_ref().filter(|r| r.page_width > 0.0 && r.page_height > 0.0)
        else {
            self.uvs.copy_from_slice(region_uvs);
            return;
        };
        let (tw, th) = (region.page_width, region.page_height);
        let (mut u, mut v) = (region.u, region.v);
        let pairs = self.uvs.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2));
        match region.degrees {
            90 => {
                u -= (region.original_height - region.offset_y - region.height) / tw;
                v -= (region.original_width - region.offset_x - region.width) / th;
                let (width, height) = (region.original_height / tw, region.original_width / th);
                for (out, uv) in pairs {
                    out[0] = u + uv[1] * width;
                    out[1] = v + (1.0 - uv[0]) * height;
                }
            }
            180 => {
                u -= (region.original_width - region.offset_x - region.width) / tw;
                v -= region.offset_y / th;
                let (width, height) = (region.original_width / tw, region.original_height / th);
                for (out, uv) in pairs {
                    out[0] = u + (1.0 - uv[0]) * width;
                    out[1] = v + (1.0 - uv[1]) * height;
                }
            }
            270 => {
                u -= region.offset_y / tw;
                v -= region.offset_x / th;
                let (width, height) = (region.original_height / tw, region.original_width / th);
                for (out, uv) in pairs {
                    out[0] = u + (1.0 - uv[1]) * width;
                    out[1] = v + uv[0] * height;
                }
            }
            _ => {
                u -= region.offset_x / tw;
                v -= (region.original_height - region.offset_y - region.height) / th;
                let (width, height) = (region.original_width / tw, region.original_height / th);
                for (out, uv) in pairs {
                    out[0] = u + uv[0] * width;
                    out[1] = v + uv[1] * height;
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct BoundingBoxAttachment {
    pub name: String,
    pub vertex: VertexData,
    pub color: Color,
}

#[derive(Clone, Debug)]
pub struct PathAttachment {
    pub name: String,
    pub vertex: VertexData,
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
    pub color: Color,
}

#[derive(Clone, Debug)]
pub struct PointAttachment {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub color: Color,
}

#[derive(Clone, Debug)]
pub struct ClippingAttachment {
    pub name: String,
    pub vertex: VertexData,
    pub end_slot: Option<usize>,
    pub color: Color,
}

#[derive(Clone, Debug)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Path(PathAttachment),
    Point(PointAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(a) => &a.name,
            Attachment::Mesh(a) => &a.name,
            Attachment::BoundingBox(a) => &a.name,
            Attachment::Path(a) => &a.name,
            Attachment::Point(a) => &a.name,
            Attachment::Clipping(a) => &a.name,
        }
    }

    pub fn vertex_data(&self) -> Option<&VertexData> {
        match self {
            Attachment::Mesh(a) => Some(&a.vertex),
            Attachment::BoundingBox(a) => Some(&a.vertex),
            Attachment::Path(a) => Some(&a.vertex),
            Attachment::Clipping(a) => Some(&a.vertex),
            Attachment::Region(_) | Attachment::Point(_) => None,
        }
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            Attachment::Region(a) => a.sequence.as_ref(),
            Attachment::Mesh(a) => a.sequence.as_ref(),
            _ => None,
        }
    }
}

/// Wire tag of an attachment, including the linked mesh form that only exists while loading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttachmentType {
    Region,
    BoundingBox,
    Mesh,
    LinkedMesh,
    Path,
    Point,
    Clipping,
}

impl AttachmentType {
    pub(crate) fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Region),
            1 => Some(Self::BoundingBox),
            2 => Some(Self::Mesh),
            3 => Some(Self::LinkedMesh),
            4 => Some(Self::Path),
            5 => Some(Self::Point),
            6 => Some(Self::Clipping),
            _ => None,
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "region" => Some(Self::Region),
            "boundingbox" => Some(Self::BoundingBox),
            "mesh" => Some(Self::Mesh),
            "linkedmesh" => Some(Self::LinkedMesh),
            "path" => Some(Self::Path),
            "point" => Some(Self::Point),
            "clipping" => Some(Self::Clipping),
            _ => None,
        }
    }
}

/// Named set of attachments keyed by (slot index, attachment name), plus the bones and
/// constraints that are only active while the skin is.
#[derive(Clone, Debug, Default)]
pub struct Skin {
    pub name: String,
    attachments: Vec<HashMap<String, usize>>,
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
    pub path_constraints: Vec<usize>,
    pub physics_constraints: Vec<usize>,
    pub color: Option<Color>,
}

impl Skin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Arena index of the attachment stored under `(slot_index, name)`.
    pub fn attachment(&self, slot_index: usize, name: &str) -> Option<usize> {
        self.attachments
            .get(slot_index)
            .and_then(|m| m.get(name))
            .copied()
    }

    pub fn set_attachment(&mut self, slot_index: usize, name: impl Into<String>, attachment: usize) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(name.into(), attachment);
    }

    pub fn remove_attachment(&mut self, slot_index: usize, name: &str) -> Option<usize> {
        self.attachments.get_mut(slot_index)?.remove(name)
    }

    /// `(name, attachment)` pairs for one slot, unordered.
    pub fn attachments_for_slot(&self, slot_index: usize) -> impl Iterator<Item = (&str, usize)> {
        self.attachments
            .get(slot_index)
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Every `(slot, name, attachment)` entry, unordered.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str, usize)> {
        self.attachments
            .iter()
            .enumerate()
            .flat_map(|(slot, m)| m.iter().map(move |(k, v)| (slot, k.as_str(), *v)))
    }

    /// Adds the attachments, bones and constraints of `other` that this skin lacks.
    pub fn add_skin(&mut self, other: &Skin) {
        fn merge(into: &mut Vec<usize>, from: &[usize]) {
            for index in from {
                if !into.contains(index) {
                    into.push(*index);
                }
            }
        }
        merge(&mut self.bones, &other.bones);
        merge(&mut self.ik_constraints, &other.ik_constraints);
        merge(&mut self.transform_constraints, &other.transform_constraints);
        merge(&mut self.path_constraints, &other.path_constraints);
        merge(&mut self.physics_constraints, &other.physics_constraints);
        for (slot, name, attachment) in other.entries() {
            self.set_attachment(slot, name, attachment);
        }
    }

    pub fn clear(&mut self) {
        self.attachments.clear();
    }
}

/// Pose-independent skeleton definition produced by the loaders and shared by every
/// `Skeleton` instance.
#[derive(Clone, Debug)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub hash: Option<String>,
    pub version: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub reference_scale: f32,
    pub fps: f32,
    pub images_path: Option<String>,
    pub audio_path: Option<String>,

    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<Skin>,
    pub default_skin: Option<usize>,
    pub events: Vec<EventData>,
    pub animations: Vec<Arc<Animation>>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
    pub physics_constraints: Vec<PhysicsConstraintData>,
    /// Owns every attachment; skins and slots refer to entries by index.
    pub attachments: Vec<Attachment>,
}

impl Default for SkeletonData {
    fn default() -> Self {
        Self {
            name: None,
            hash: None,
            version: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            reference_scale: 100.0,
            fps: 30.0,
            images_path: None,
            audio_path: None,
            bones: Vec::new(),
            slots: Vec::new(),
            skins: Vec::new(),
            default_skin: None,
            events: Vec::new(),
            animations: Vec::new(),
            ik_constraints: Vec::new(),
            transform_constraints: Vec::new(),
            path_constraints: Vec::new(),
            physics_constraints: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<usize> {
        self.skins.iter().position(|s| s.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    pub fn find_animation(&self, name: &str) -> Option<&Arc<Animation>> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn find_ik_constraint(&self, name: &str) -> Option<usize> {
        self.ik_constraints.iter().position(|c| c.name == name)
    }

    pub fn find_transform_constraint(&self, name: &str) -> Option<usize> {
        self.transform_constraints
            .iter()
            .position(|c| c.name == name)
    }

    pub fn find_path_constraint(&self, name: &str) -> Option<usize> {
        self.path_constraints.iter().position(|c| c.name == name)
    }

    pub fn find_physics_constraint(&self, name: &str) -> Option<usize> {
        self.physics_constraints.iter().position(|c| c.name == name)
    }

    pub fn default_skin(&self) -> Option<&Skin> {
        self.default_skin.and_then(|i| self.skins.get(i))
    }

    pub fn attachment(&self, index: usize) -> Option<&Attachment> {
        self.attachments.get(index)
    }

    /// Adds `source`'s bones and constraints to skin `target` along with copies of its
    /// attachments. Meshes are copied as linked meshes of the originals so they keep sharing
    /// deform and sequence timelines.
    pub fn copy_skin(&mut self, target: usize, source: usize) {
        let Some(source_skin) = self.skins.get(source).cloned() else {
            return;
        };
        let mut copy = source_skin.clone();
        copy.clear();
        for (slot, name, index) in source_skin.entries() {
            let mut attachment = self.attachments[index].clone();
            if let Attachment::Mesh(mesh) = &mut attachment {
                mesh.parent_mesh = Some(mesh.parent_mesh.unwrap_or(index));
            }
            self.attachments.push(attachment);
            copy.set_attachment(slot, name, self.attachments.len() - 1);
        }
        if let Some(skin) = self.skins.get_mut(target) {
            skin.add_skin(&copy);
        }
    }
}

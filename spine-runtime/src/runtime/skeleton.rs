use crate::{
    Attachment, BoneData, Color, Error, Inherit, PointAttachment, RegionAttachment, SkeletonData,
    VertexData,
};
use std::sync::Arc;

/// Determines how physics constraints are updated while posing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Physics {
    /// Physics are not updated or applied.
    None,
    /// Physics state is cleared to the current pose.
    Reset,
    /// Physics are updated and applied.
    Update,
    /// Physics are applied without being updated.
    Pose,
}

/// A bone's local transform: translation, rotation and scale/shear in degrees and factors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
}

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    sorted: bool,

    pub inherit: Inherit,
    pub active: bool,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    /// Applied transform: the local transform actually used for the world transform, after
    /// constraints.
    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    fn new(data: &BoneData) -> Self {
        let mut bone = Self {
            data_index: data.index,
            parent: data.parent,
            children: Vec::new(),
            sorted: false,
            inherit: data.inherit,
            active: true,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            ax: 0.0,
            ay: 0.0,
            arotation: 0.0,
            ascale_x: 1.0,
            ascale_y: 1.0,
            ashear_x: 0.0,
            ashear_y: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
        };
        bone.set_to_setup_pose(data);
        bone
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
        self.shear_x = data.shear_x;
        self.shear_y = data.shear_y;
        self.inherit = data.inherit;
    }

    pub fn local(&self) -> LocalTransform {
        LocalTransform {
            x: self.x,
            y: self.y,
            rotation: self.rotation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            shear_x: self.shear_x,
            shear_y: self.shear_y,
        }
    }

    pub fn applied(&self) -> LocalTransform {
        LocalTransform {
            x: self.ax,
            y: self.ay,
            rotation: self.arotation,
            scale_x: self.ascale_x,
            scale_y: self.ascale_y,
            shear_x: self.ashear_x,
            shear_y: self.ashear_y,
        }
    }

    fn set_applied(&mut self, t: LocalTransform) {
        self.ax = t.x;
        self.ay = t.y;
        self.arotation = t.rotation;
        self.ascale_x = t.scale_x;
        self.ascale_y = t.scale_y;
        self.ashear_x = t.shear_x;
        self.ashear_y = t.shear_y;
    }

    fn frame(&self) -> Frame {
        Frame {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            world_x: self.world_x,
            world_y: self.world_y,
        }
    }

    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    pub fn world_rotation_y(&self) -> f32 {
        self.d.atan2(self.b).to_degrees()
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn world_to_local(&self, world: [f32; 2]) -> [f32; 2] {
        let inv_det = 1.0 / (self.a * self.d - self.b * self.c);
        let x = world[0] - self.world_x;
        let y = world[1] - self.world_y;
        [
            x * self.d * inv_det - y * self.b * inv_det,
            y * self.a * inv_det - x * self.c * inv_det,
        ]
    }

    pub fn local_to_world(&self, local: [f32; 2]) -> [f32; 2] {
        let [x, y] = local;
        [
            x * self.a + y * self.b + self.world_x,
            x * self.c + y * self.d + self.world_y,
        ]
    }

    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let (sin, cos) = world_rotation.to_radians().sin_cos();
        (self.a * sin - self.c * cos)
            .atan2(self.d * cos - self.b * sin)
            .to_degrees()
            + self.rotation
            - self.shear_x
    }

    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let (sin, cos) = (local_rotation - self.rotation + self.shear_x)
            .to_radians()
            .sin_cos();
        (cos * self.c + sin * self.d)
            .atan2(cos * self.a + sin * self.b)
            .to_degrees()
    }

    /// Rotates the world transform. The applied transform and children are not updated.
    pub fn rotate_world(&mut self, degrees: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let (a, b) = (self.a, self.b);
        self.a = cos * a - sin * self.c;
        self.b = cos * b - sin * self.d;
        self.c = sin * a + cos * self.c;
        self.d = sin * b + cos * self.d;
    }

    #[cfg(feature = "glam")]
    pub fn world_affine(&self) -> glam::Affine2 {
        glam::Affine2::from_cols_array(&[
            self.a,
            self.c,
            self.b,
            self.d,
            self.world_x,
            self.world_y,
        ])
    }
}

/// World transform of a parent, or of the skeleton itself for root bones.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Frame {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    bone: usize,
    attachment: Option<usize>,
    pub color: Color,
    /// Dark color for two color tinting, `None` when the slot data has none.
    pub dark_color: Option<Color>,
    pub(crate) attachment_state: u32,
    /// Frame of the attachment's sequence, -1 for its setup index.
    pub sequence_index: i32,
    /// Vertex offsets (weighted) or positions (unweighted) set by deform timelines.
    pub deform: Vec<f32>,
}

impl Slot {
    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn bone(&self) -> usize {
        self.bone
    }

    /// Arena index of the visible attachment.
    pub fn attachment(&self) -> Option<usize> {
        self.attachment
    }

    /// Shows `attachment`. The deform is kept only when both the old and new attachment are
    /// driven by the same timeline attachment.
    pub fn set_attachment(&mut self, data: &SkeletonData, attachment: Option<usize>) {
        if self.attachment == attachment {
            return;
        }
        let timeline_attachment = |index: Option<usize>| {
            index
                .and_then(|a| data.attachment(a))
                .and_then(Attachment::vertex_data)
                .map(|v| v.timeline_attachment)
        };
        let keep_deform = matches!(
            (timeline_attachment(self.attachment), timeline_attachment(attachment)),
            (Some(old), Some(new)) if old == new
        );
        if !keep_deform {
            self.deform.clear();
        }
        self.attachment = attachment;
        self.sequence_index = -1;
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub active: bool,
}

impl IkConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot showing the path attachment.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub active: bool,
}

impl PathConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

/// Physics constraint pose state. Properties are driven by timelines; the simulation state
/// is only ever cleared.
#[derive(Clone, Debug)]
pub struct PhysicsConstraint {
    data_index: usize,
    pub bone: usize,

    pub inertia: f32,
    pub strength: f32,
    pub damping: f32,
    pub mass_inverse: f32,
    pub wind: f32,
    pub gravity: f32,
    pub mix: f32,

    pub reset: bool,
    pub x_offset: f32,
    pub x_velocity: f32,
    pub y_offset: f32,
    pub y_velocity: f32,
    pub rotate_offset: f32,
    pub rotate_velocity: f32,
    pub scale_offset: f32,
    pub scale_velocity: f32,

    pub active: bool,
    pub remaining: f32,
    pub last_time: f32,
}

impl PhysicsConstraint {
    pub fn data_index(&self) -> usize {
        self.data_index
    }

    /// Clears the simulation state; `time` is the skeleton time of the reset.
    pub fn reset(&mut self, time: f32) {
        self.remaining = 0.0;
        self.last_time = time;
        self.reset = true;
        self.x_offset = 0.0;
        self.x_velocity = 0.0;
        self.y_offset = 0.0;
        self.y_velocity = 0.0;
        self.rotate_offset = 0.0;
        self.rotate_velocity = 0.0;
        self.scale_offset = 0.0;
        self.scale_velocity = 0.0;
    }

    fn set_to_setup_pose(&mut self, data: &crate::PhysicsConstraintData) {
        self.inertia = data.inertia;
        self.strength = data.strength;
        self.damping = data.damping;
        self.mass_inverse = data.mass_inverse;
        self.wind = data.wind;
        self.gravity = data.gravity;
        self.mix = data.mix;
    }
}

impl RegionAttachment {
    /// Corner offsets in bone space, in the order bottom right, bottom left, upper left,
    /// upper right. Without a region the attachment size is used with no whitespace.
    pub fn compute_offsets(&self) -> [f32; 8] {
        let (original_width, original_height, offset_x, offset_y, region_width, region_height) =
            match &self.region {
                Some(r) => (
                    r.original_width,
                    r.original_height,
                    r.offset_x,
                    r.offset_y,
                    r.width,
                    r.height,
                ),
                None => (self.width, self.height, 0.0, 0.0, self.width, self.height),
            };
        let region_scale_x = if original_width != 0.0 {
            self.width / original_width * self.scale_x
        } else {
            0.0
        };
        let region_scale_y = if original_height != 0.0 {
            self.height / original_height * self.scale_y
        } else {
            0.0
        };
        let local_x = -self.width / 2.0 * self.scale_x + offset_x * region_scale_x;
        let local_y = -self.height / 2.0 * self.scale_y + offset_y * region_scale_y;
        let local_x2 = local_x + region_width * region_scale_x;
        let local_y2 = local_y + region_height * region_scale_y;
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let x_cos = local_x * cos + self.x;
        let x_sin = local_x * sin;
        let y_cos = local_y * cos + self.y;
        let y_sin = local_y * sin;
        let x2_cos = local_x2 * cos + self.x;
        let x2_sin = local_x2 * sin;
        let y2_cos = local_y2 * cos + self.y;
        let y2_sin = local_y2 * sin;
        [
            x_cos - y_sin,
            y_cos + x_sin,
            x_cos - y2_sin,
            y2_cos + x_sin,
            x2_cos - y2_sin,
            y2_cos + x2_sin,
            x2_cos - y_sin,
            y_cos + x2_sin,
        ]
    }

    /// Writes the four world corners to `out[offset..]`, `stride` floats apart.
    pub fn compute_world_vertices(&self, bone: &Bone, out: &mut [f32], offset: usize, stride: usize) {
        let offsets = self.compute_offsets();
        for (i, corner) in offsets.chunks_exact(2).enumerate() {
            let w = offset + i * stride;
            let [x, y] = bone.local_to_world([corner[0], corner[1]]);
            out[w] = x;
            out[w + 1] = y;
        }
    }
}

impl PointAttachment {
    pub fn compute_world_position(&self, bone: &Bone) -> [f32; 2] {
        bone.local_to_world([self.x, self.y])
    }

    pub fn compute_world_rotation(&self, bone: &Bone) -> f32 {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let x = cos * bone.a + sin * bone.b;
        let y = cos * bone.c + sin * bone.d;
        y.atan2(x).to_degrees()
    }
}

impl VertexData {
    /// Transforms `count` vertex floats starting at vertex float `start` to world space,
    /// writing to `out[offset..]` every `stride` floats. The slot's deform replaces
    /// (unweighted) or offsets (weighted) the setup vertices.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_world_vertices(
        &self,
        skeleton: &Skeleton,
        slot: usize,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
        stride: usize,
    ) {
        let slot = &skeleton.slots[slot];
        let end = offset + (count >> 1) * stride;
        let deform = &slot.deform;

        let Some(bones) = &self.bones else {
            let vertices = if deform.is_empty() {
                &self.vertices
            } else {
                deform
            };
            let bone = &skeleton.bones[slot.bone];
            let mut v = start;
            let mut w = offset;
            while w < end {
                let [x, y] = bone.local_to_world([vertices[v], vertices[v + 1]]);
                out[w] = x;
                out[w + 1] = y;
                v += 2;
                w += stride;
            }
            return;
        };

        let mut v = 0;
        let mut skip = 0;
        let mut i = 0;
        while i < start {
            let n = bones[v];
            v += n + 1;
            skip += n;
            i += 2;
        }
        let vertices = &self.vertices;
        let mut b = skip * 3;
        let mut f = skip << 1;
        let mut w = offset;
        while w < end {
            let mut wx = 0.0;
            let mut wy = 0.0;
            let n = v + 1 + bones[v];
            v += 1;
            while v < n {
                let bone = &skeleton.bones[bones[v]];
                let (dx, dy) = if deform.is_empty() {
                    (0.0, 0.0)
                } else {
                    (deform[f], deform[f + 1])
                };
                let [x, y] = bone.local_to_world([vertices[b] + dx, vertices[b + 1] + dy]);
                let weight = vertices[b + 2];
                wx += x * weight;
                wy += y * weight;
                v += 1;
                b += 3;
                f += 2;
            }
            out[w] = wx;
            out[w + 1] = wy;
            w += stride;
        }
    }
}

/// Axis aligned bounds of the visible region and mesh attachments.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
    Path(usize),
    Physics(usize),
}

/// A posed instance of [`SkeletonData`].
#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    /// Slot indices in drawing order.
    pub draw_order: Vec<usize>,
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    pub physics_constraints: Vec<PhysicsConstraint>,
    skin: Option<usize>,
    pub color: Color,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Seconds advanced by [`Skeleton::update`], used by physics resets.
    pub time: f32,
    update_cache: Vec<UpdateCacheItem>,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let mut bones: Vec<Bone> = data.bones.iter().map(Bone::new).collect();
        for index in 0..bones.len() {
            if let Some(parent) = bones[index].parent {
                bones[parent].children.push(index);
            }
        }

        let slots = data
            .slots
            .iter()
            .map(|slot| Slot {
                data_index: slot.index,
                bone: slot.bone,
                attachment: None,
                color: slot.color,
                dark_color: slot.dark_color,
                attachment_state: 0,
                sequence_index: -1,
                deform: Vec::new(),
            })
            .collect();

        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| IkConstraint {
                data_index,
                bones: c.bones.clone(),
                target: c.target,
                mix: c.mix,
                softness: c.softness,
                bend_direction: c.bend_direction,
                compress: c.compress,
                stretch: c.stretch,
                active: false,
            })
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| TransformConstraint {
                data_index,
                bones: c.bones.clone(),
                target: c.target,
                mix_rotate: c.mix_rotate,
                mix_x: c.mix_x,
                mix_y: c.mix_y,
                mix_scale_x: c.mix_scale_x,
                mix_scale_y: c.mix_scale_y,
                mix_shear_y: c.mix_shear_y,
                active: false,
            })
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| PathConstraint {
                data_index,
                bones: c.bones.clone(),
                target: c.target,
                position: c.position,
                spacing: c.spacing,
                mix_rotate: c.mix_rotate,
                mix_x: c.mix_x,
                mix_y: c.mix_y,
                active: false,
            })
            .collect();
        let physics_constraints = data
            .physics_constraints
            .iter()
            .enumerate()
            .map(|(data_index, c)| {
                let mut constraint = PhysicsConstraint {
                    data_index,
                    bone: c.bone,
                    inertia: 0.0,
                    strength: 0.0,
                    damping: 0.0,
                    mass_inverse: 0.0,
                    wind: 0.0,
                    gravity: 0.0,
                    mix: 0.0,
                    reset: true,
                    x_offset: 0.0,
                    x_velocity: 0.0,
                    y_offset: 0.0,
                    y_velocity: 0.0,
                    rotate_offset: 0.0,
                    rotate_velocity: 0.0,
                    scale_offset: 0.0,
                    scale_velocity: 0.0,
                    active: false,
                    remaining: 0.0,
                    last_time: 0.0,
                };
                constraint.set_to_setup_pose(c);
                constraint
            })
            .collect();

        let mut skeleton = Self {
            draw_order: (0..data.slots.len()).collect(),
            data,
            bones,
            slots,
            ik_constraints,
            transform_constraints,
            path_constraints,
            physics_constraints,
            skin: None,
            color: Color::WHITE,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            time: 0.0,
            update_cache: Vec::new(),
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_cache();
        skeleton
    }

    pub fn data(&self) -> &SkeletonData {
        &self.data
    }

    /// Index of the active skin in `data.skins`.
    pub fn skin(&self) -> Option<usize> {
        self.skin
    }

    pub fn root_bone(&self) -> Option<&Bone> {
        self.bones.first()
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    /// Advances the time used by physics.
    pub fn update(&mut self, delta: f32) {
        self.time += delta;
    }

    /// Rebuilds the order in which bones and constraints are updated. Called after the skin
    /// changes or when bones or constraints are added or removed.
    pub fn update_cache(&mut self) {
        self.update_cache.clear();
        let data = Arc::clone(&self.data);

        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.sorted = bone_data.skin_required;
            bone.active = !bone.sorted;
        }

        if let Some(skin) = self.skin.and_then(|s| data.skins.get(s)) {
            for &skin_bone in &skin.bones {
                let mut bone = Some(skin_bone);
                while let Some(index) = bone {
                    let bone_mut = &mut self.bones[index];
                    bone_mut.sorted = false;
                    bone_mut.active = true;
                    bone = bone_mut.parent;
                }
            }
        }

        let constraint_count = data.ik_constraints.len()
            + data.transform_constraints.len()
            + data.path_constraints.len()
            + data.physics_constraints.len();
        'outer: for order in 0..constraint_count {
            if let Some(index) = data.ik_constraints.iter().position(|c| c.order == order) {
                self.sort_ik_constraint(index);
                continue 'outer;
            }
            if let Some(index) = data.transform_constraints.iter().position(|c| c.order == order) {
                self.sort_transform_constraint(index);
                continue 'outer;
            }
            if let Some(index) = data.path_constraints.iter().position(|c| c.order == order) {
                self.sort_path_constraint(index);
                continue 'outer;
            }
            if let Some(index) = data.physics_constraints.iter().position(|c| c.order == order) {
                self.sort_physics_constraint(index);
                continue 'outer;
            }
        }

        for index in 0..self.bones.len() {
            self.sort_bone(index);
        }

        tracing::trace!(items = self.update_cache.len(), "rebuilt skeleton update cache");
    }

    fn skin_has(&self, f: impl Fn(&crate::Skin) -> bool) -> bool {
        self.skin
            .and_then(|s| self.data.skins.get(s))
            .is_some_and(f)
    }

    fn sort_ik_constraint(&mut self, index: usize) {
        let data = &self.data.ik_constraints[index];
        let target = self.ik_constraints[index].target;
        let active = self.bones[target].active
            && (!data.skin_required || self.skin_has(|s| s.ik_constraints.contains(&index)));
        self.ik_constraints[index].active = active;
        if !active {
            return;
        }

        self.sort_bone(target);
        let bones = self.ik_constraints[index].bones.clone();
        let Some(&parent) = bones.first() else {
            return;
        };
        self.sort_bone(parent);
        if bones.len() == 1 {
            self.update_cache.push(UpdateCacheItem::Ik(index));
            self.sort_reset_children(parent);
        } else {
            let child = bones[bones.len() - 1];
            self.sort_bone(child);
            self.update_cache.push(UpdateCacheItem::Ik(index));
            self.sort_reset_children(parent);
            self.bones[child].sorted = true;
        }
    }

    fn sort_transform_constraint(&mut self, index: usize) {
        let data = &self.data.transform_constraints[index];
        let local = data.local;
        let target = self.transform_constraints[index].target;
        let active = self.bones[target].active
            && (!data.skin_required || self.skin_has(|s| s.transform_constraints.contains(&index)));
        self.transform_constraints[index].active = active;
        if !active {
            return;
        }

        self.sort_bone(target);
        let bones = self.transform_constraints[index].bones.clone();
        for &bone in &bones {
            if local {
                if let Some(parent) = self.bones[bone].parent {
                    self.sort_bone(parent);
                }
            }
            self.sort_bone(bone);
        }
        self.update_cache.push(UpdateCacheItem::Transform(index));
        for &bone in &bones {
            self.sort_reset_children(bone);
        }
        for &bone in &bones {
            self.bones[bone].sorted = true;
        }
    }

    fn sort_path_constraint(&mut self, index: usize) {
        let data = Arc::clone(&self.data);
        let constraint_data = &data.path_constraints[index];
        let slot = self.path_constraints[index].target;
        let slot_bone = self.slots[slot].bone;
        let active = self.bones[slot_bone].active
            && (!constraint_data.skin_required
                || self.skin_has(|s| s.path_constraints.contains(&index)));
        self.path_constraints[index].active = active;
        if !active {
            return;
        }

        if let Some(skin) = self.skin.and_then(|s| data.skins.get(s)) {
            self.sort_path_attachments(&data, skin, slot, slot_bone);
        }
        if let Some(default_skin) = data.default_skin {
            if Some(default_skin) != self.skin {
                self.sort_path_attachments(&data, &data.skins[default_skin], slot, slot_bone);
            }
        }
        for skin in &data.skins {
            self.sort_path_attachments(&data, skin, slot, slot_bone);
        }
        if let Some(attachment) = self.slots[slot].attachment {
            self.sort_path_attachment(&data, attachment, slot_bone);
        }

        let bones = self.path_constraints[index].bones.clone();
        for &bone in &bones {
            self.sort_bone(bone);
        }
        self.update_cache.push(UpdateCacheItem::Path(index));
        for &bone in &bones {
            self.sort_reset_children(bone);
        }
        for &bone in &bones {
            self.bones[bone].sorted = true;
        }
    }

    fn sort_path_attachments(&mut self, data: &SkeletonData, skin: &crate::Skin, slot: usize, slot_bone: usize) {
        for (_, attachment) in skin.attachments_for_slot(slot) {
            self.sort_path_attachment(data, attachment, slot_bone);
        }
    }

    fn sort_path_attachment(&mut self, data: &SkeletonData, attachment: usize, slot_bone: usize) {
        let Some(Attachment::Path(path)) = data.attachment(attachment) else {
            return;
        };
        match &path.vertex.bones {
            None => self.sort_bone(slot_bone),
            Some(bones) => {
                let mut i = 0;
                while i < bones.len() {
                    let n = bones[i];
                    for &bone in &bones[i + 1..i + 1 + n] {
                        self.sort_bone(bone);
                    }
                    i += n + 1;
                }
            }
        }
    }

    fn sort_physics_constraint(&mut self, index: usize) {
        let data = &self.data.physics_constraints[index];
        let bone = self.physics_constraints[index].bone;
        let active = self.bones[bone].active
            && (!data.skin_required || self.skin_has(|s| s.physics_constraints.contains(&index)));
        self.physics_constraints[index].active = active;
        if !active {
            return;
        }
        self.sort_bone(bone);
        self.update_cache.push(UpdateCacheItem::Physics(index));
        self.sort_reset_children(bone);
        self.bones[bone].sorted = true;
    }

    fn sort_bone(&mut self, index: usize) {
        if self.bones[index].sorted {
            return;
        }
        if let Some(parent) = self.bones[index].parent {
            self.sort_bone(parent);
        }
        self.bones[index].sorted = true;
        self.update_cache.push(UpdateCacheItem::Bone(index));
    }

    fn sort_reset_children(&mut self, index: usize) {
        let mut stack: Vec<usize> = self.bones[index].children.clone();
        while let Some(child) = stack.pop() {
            let bone = &mut self.bones[child];
            if !bone.active {
                continue;
            }
            if bone.sorted {
                stack.extend_from_slice(&bone.children);
            }
            bone.sorted = false;
        }
    }

    /// Copies local transforms to the applied transforms, then updates every bone's world
    /// transform and applies the constraints in update cache order.
    pub fn update_world_transform(&mut self, physics: Physics) {
        for bone in &mut self.bones {
            let local = bone.local();
            bone.set_applied(local);
        }
        self.run_update_cache(physics, None);
    }

    /// Like [`update_world_transform`](Self::update_world_transform), with the root bone
    /// attached to `parent`, a bone of another skeleton. The root bone always inherits
    /// rotation, scale and reflection from `parent`.
    pub fn update_world_transform_with(&mut self, physics: Physics, parent: &Bone) {
        for bone in self.bones.iter_mut().skip(1) {
            let local = bone.local();
            bone.set_applied(local);
        }
        let Some(root) = self.bones.first_mut() else {
            return;
        };
        let (x, y) = (self.x, self.y);
        let (sx, sy) = (self.scale_x, self.scale_y);
        let [la, lb, lc, ld] = local_matrix(root.rotation, root.scale_x, root.scale_y, root.shear_x, root.shear_y);
        root.world_x = parent.a * x + parent.b * y + parent.world_x;
        root.world_y = parent.c * x + parent.d * y + parent.world_y;
        root.a = (parent.a * la + parent.b * lc) * sx;
        root.b = (parent.a * lb + parent.b * ld) * sx;
        root.c = (parent.c * la + parent.d * lc) * sy;
        root.d = (parent.c * lb + parent.d * ld) * sy;
        self.run_update_cache(physics, Some(0));
    }

    fn run_update_cache(&mut self, physics: Physics, skip_bone: Option<usize>) {
        for i in 0..self.update_cache.len() {
            match self.update_cache[i] {
                UpdateCacheItem::Bone(index) => {
                    if Some(index) != skip_bone {
                        let applied = self.bones[index].applied();
                        self.update_bone_world_with(index, applied);
                    }
                }
                UpdateCacheItem::Ik(index) => self.apply_ik_constraint(index),
                UpdateCacheItem::Transform(index) => self.apply_transform_constraint(index),
                UpdateCacheItem::Path(index) => self.apply_path_constraint(index),
                UpdateCacheItem::Physics(index) => self.apply_physics_constraint(index, physics),
            }
        }
    }

    fn apply_physics_constraint(&mut self, index: usize, physics: Physics) {
        let time = self.time;
        let constraint = &mut self.physics_constraints[index];
        if constraint.mix == 0.0 {
            return;
        }
        if physics == Physics::Reset {
            constraint.reset(time);
        }
    }

    /// World transform of the bone's parent; the skeleton transform for the root.
    pub(crate) fn parent_frame(&self, bone: usize) -> Frame {
        match self.bones[bone].parent {
            Some(parent) => self.bones[parent].frame(),
            None => Frame {
                a: self.scale_x,
                b: 0.0,
                c: 0.0,
                d: self.scale_y,
                world_x: self.x,
                world_y: self.y,
            },
        }
    }

    /// Sets the applied transform of bone `index` to `t` and computes its world transform
    /// from its parent. Children are not updated.
    pub fn update_bone_world_with(&mut self, index: usize, t: LocalTransform) {
        let parent = self.bones[index].parent.map(|p| self.bones[p].frame());
        let (skeleton_x, skeleton_y) = (self.x, self.y);
        let (sx, sy) = (self.scale_x, self.scale_y);
        let bone = &mut self.bones[index];
        bone.set_applied(t);

        let Some(parent) = parent else {
            let [la, lb, lc, ld] = local_matrix(t.rotation, t.scale_x, t.scale_y, t.shear_x, t.shear_y);
            bone.a = la * sx;
            bone.b = lb * sx;
            bone.c = lc * sy;
            bone.d = ld * sy;
            bone.world_x = t.x * sx + skeleton_x;
            bone.world_y = t.y * sy + skeleton_y;
            return;
        };

        let Frame {
            a: mut pa,
            b: mut pb,
            c: mut pc,
            d: mut pd,
            world_x,
            world_y,
        } = parent;
        bone.world_x = pa * t.x + pb * t.y + world_x;
        bone.world_y = pc * t.x + pd * t.y + world_y;

        match bone.inherit {
            Inherit::Normal => {
                let [la, lb, lc, ld] = local_matrix(t.rotation, t.scale_x, t.scale_y, t.shear_x, t.shear_y);
                bone.a = pa * la + pb * lc;
                bone.b = pa * lb + pb * ld;
                bone.c = pc * la + pd * lc;
                bone.d = pc * lb + pd * ld;
                return;
            }
            Inherit::OnlyTranslation => {
                [bone.a, bone.b, bone.c, bone.d] =
                    local_matrix(t.rotation, t.scale_x, t.scale_y, t.shear_x, t.shear_y);
            }
            Inherit::NoRotationOrReflection => {
                let isx = 1.0 / sx;
                let isy = 1.0 / sy;
                pa *= isx;
                pc *= isy;
                let mut s = pa * pa + pc * pc;
                let prx;
                if s > 0.0001 {
                    s = (pa * pd * isy - pb * isx * pc).abs() / s;
                    pb = pc * s;
                    pd = pa * s;
                    prx = pc.atan2(pa).to_degrees();
                } else {
                    pa = 0.0;
                    pc = 0.0;
                    prx = 90.0 - pd.atan2(pb).to_degrees();
                }
                let [la, lb, lc, ld] =
                    local_matrix(t.rotation - prx, t.scale_x, t.scale_y, t.shear_x, t.shear_y);
                bone.a = pa * la - pb * lc;
                bone.b = pa * lb - pb * ld;
                bone.c = pc * la + pd * lc;
                bone.d = pc * lb + pd * ld;
            }
            Inherit::NoScale | Inherit::NoScaleOrReflection => {
                let (sin, cos) = t.rotation.to_radians().sin_cos();
                let mut za = (pa * cos + pb * sin) / sx;
                let mut zc = (pc * cos + pd * sin) / sy;
                let mut s = (za * za + zc * zc).sqrt();
                if s > 0.00001 {
                    s = 1.0 / s;
                }
                za *= s;
                zc *= s;
                s = (za * za + zc * zc).sqrt();
                if bone.inherit == Inherit::NoScale
                    && (pa * pd - pb * pc < 0.0) != ((sx < 0.0) != (sy < 0.0))
                {
                    s = -s;
                }
                let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
                let zb = r.cos() * s;
                let zd = r.sin() * s;
                let [la, lb, lc, ld] = local_matrix(0.0, t.scale_x, t.scale_y, t.shear_x, t.shear_y);
                bone.a = za * la + zb * lc;
                bone.b = za * lb + zb * ld;
                bone.c = zc * la + zd * lc;
                bone.d = zc * lb + zd * ld;
            }
        }
        bone.a *= sx;
        bone.b *= sx;
        bone.c *= sy;
        bone.d *= sy;
    }

    /// Recomputes bone `index`'s applied transform from its world transform, after a
    /// constraint changed the world transform directly.
    pub fn update_applied_transform(&mut self, index: usize) {
        let (sx, sy) = (self.scale_x, self.scale_y);
        let parent = self.bones[index].parent.map(|p| self.bones[p].frame());
        let (skeleton_x, skeleton_y) = (self.x, self.y);
        let bone = &mut self.bones[index];
        let Some(parent) = parent else {
            let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
            bone.ax = bone.world_x - skeleton_x;
            bone.ay = bone.world_y - skeleton_y;
            bone.arotation = c.atan2(a).to_degrees();
            bone.ascale_x = (a * a + c * c).sqrt();
            bone.ascale_y = (b * b + d * d).sqrt();
            bone.ashear_x = 0.0;
            bone.ashear_y = (a * b + c * d).atan2(a * d - b * c).to_degrees();
            return;
        };

        let Frame {
            a: mut pa,
            b: mut pb,
            c: mut pc,
            d: mut pd,
            world_x,
            world_y,
        } = parent;
        let mut pid = 1.0 / (pa * pd - pb * pc);
        let mut ia = pd * pid;
        let mut ib = pb * pid;
        let mut ic = pc * pid;
        let mut id = pa * pid;
        let dx = bone.world_x - world_x;
        let dy = bone.world_y - world_y;
        bone.ax = dx * ia - dy * ib;
        bone.ay = dy * id - dx * ic;

        let (ra, rb, rc, rd) = if bone.inherit == Inherit::OnlyTranslation {
            (bone.a, bone.b, bone.c, bone.d)
        } else {
            match bone.inherit {
                Inherit::NoRotationOrReflection => {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc);
                    pb = -pc * sx * s / sy;
                    pd = pa * sy * s / sx;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                }
                Inherit::NoScale | Inherit::NoScaleOrReflection => {
                    let (sin, cos) = bone.rotation.to_radians().sin_cos();
                    pa = (pa * cos + pb * sin) / sx;
                    pc = (pc * cos + pd * sin) / sy;
                    let mut s = (pa * pa + pc * pc).sqrt();
                    if s > 0.00001 {
                        s = 1.0 / s;
                    }
                    pa *= s;
                    pc *= s;
                    s = (pa * pa + pc * pc).sqrt();
                    if bone.inherit == Inherit::NoScale && (pid < 0.0) != ((sx < 0.0) != (sy < 0.0)) {
                        s = -s;
                    }
                    let r = std::f32::consts::FRAC_PI_2 + pc.atan2(pa);
                    pb = r.cos() * s;
                    pd = r.sin() * s;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                    ic = pc * pid;
                    id = pa * pid;
                }
                Inherit::Normal | Inherit::OnlyTranslation => {}
            }
            (
                ia * bone.a - ib * bone.c,
                ia * bone.b - ib * bone.d,
                id * bone.c - ic * bone.a,
                id * bone.d - ic * bone.b,
            )
        };

        bone.ashear_x = 0.0;
        bone.ascale_x = (ra * ra + rc * rc).sqrt();
        if bone.ascale_x > 0.0001 {
            let det = ra * rd - rb * rc;
            bone.ascale_y = det / bone.ascale_x;
            bone.ashear_y = -(ra * rb + rc * rd).atan2(det).to_degrees();
            bone.arotation = rc.atan2(ra).to_degrees();
        } else {
            bone.ascale_x = 0.0;
            bone.ascale_y = (rb * rb + rd * rd).sqrt();
            bone.ashear_y = 0.0;
            bone.arotation = 90.0 - rd.atan2(rb).to_degrees();
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Resets bones and constraint values to the setup pose.
    pub fn set_bones_to_setup_pose(&mut self) {
        let data = &self.data;
        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.set_to_setup_pose(bone_data);
        }
        for c in &mut self.ik_constraints {
            let d = &data.ik_constraints[c.data_index];
            c.mix = d.mix;
            c.softness = d.softness;
            c.bend_direction = d.bend_direction;
            c.compress = d.compress;
            c.stretch = d.stretch;
        }
        for c in &mut self.transform_constraints {
            let d = &data.transform_constraints[c.data_index];
            c.mix_rotate = d.mix_rotate;
            c.mix_x = d.mix_x;
            c.mix_y = d.mix_y;
            c.mix_scale_x = d.mix_scale_x;
            c.mix_scale_y = d.mix_scale_y;
            c.mix_shear_y = d.mix_shear_y;
        }
        for c in &mut self.path_constraints {
            let d = &data.path_constraints[c.data_index];
            c.position = d.position;
            c.spacing = d.spacing;
            c.mix_rotate = d.mix_rotate;
            c.mix_x = d.mix_x;
            c.mix_y = d.mix_y;
        }
        for c in &mut self.physics_constraints {
            c.set_to_setup_pose(&data.physics_constraints[c.data_index]);
        }
    }

    /// Resets slot colors, attachments and the draw order to the setup pose.
    pub fn set_slots_to_setup_pose(&mut self) {
        self.reset_draw_order();
        for index in 0..self.slots.len() {
            let data = &self.data.slots[index];
            let slot = &mut self.slots[index];
            slot.color = data.color;
            if let (Some(dark), Some(setup)) = (slot.dark_color.as_mut(), data.dark_color) {
                *dark = setup;
            }
            slot.attachment = None;
            self.set_slot_attachment_to_setup(index);
        }
    }

    pub(crate) fn reset_draw_order(&mut self) {
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
    }

    pub(crate) fn set_slot_attachment_to_setup(&mut self, slot: usize) {
        let name = self.data.slots[slot].attachment_name.clone();
        self.set_slot_attachment_by_name(slot, name.as_deref());
    }

    /// Looks `name` up in the skin, then the default skin; a missing attachment clears the slot.
    pub(crate) fn set_slot_attachment_by_name(&mut self, slot: usize, name: Option<&str>) {
        let attachment = name.and_then(|name| self.attachment_for(slot, name));
        let data = &self.data;
        self.slots[slot].set_attachment(data, attachment);
    }

    /// Finds an attachment in the active skin, then in the default skin.
    pub fn attachment_for(&self, slot: usize, name: &str) -> Option<usize> {
        let skins = &self.data.skins;
        self.skin
            .and_then(|s| skins.get(s))
            .and_then(|skin| skin.attachment(slot, name))
            .or_else(|| {
                self.data
                    .default_skin()
                    .and_then(|skin| skin.attachment(slot, name))
            })
    }

    /// Shows `attachment_name` on the named slot, or clears it with `None`.
    pub fn set_attachment(&mut self, slot_name: &str, attachment_name: Option<&str>) -> Result<(), Error> {
        let slot = self.data.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
            context: "set_attachment".to_string(),
        })?;
        let attachment = match attachment_name {
            None => None,
            Some(name) => Some(self.attachment_for(slot, name).ok_or_else(|| {
                Error::UnknownAttachment {
                    name: name.to_string(),
                    slot: slot_name.to_string(),
                    skin: self
                        .skin
                        .and_then(|s| self.data.skins.get(s))
                        .map_or_else(|| "default".to_string(), |s| s.name.clone()),
                }
            })?),
        };
        let data = &self.data;
        self.slots[slot].set_attachment(data, attachment);
        Ok(())
    }

    pub fn set_skin_by_name(&mut self, name: &str) -> Result<(), Error> {
        let skin = self.data.find_skin(name).ok_or_else(|| Error::UnknownSkin {
            name: name.to_string(),
        })?;
        self.set_skin(Some(skin));
        Ok(())
    }

    /// Changes the skin. Attachments of the old skin that are visible are replaced by the
    /// new skin's attachment of the same name; without an old skin the setup attachments
    /// are looked up in the new one.
    pub fn set_skin(&mut self, skin: Option<usize>) {
        if skin == self.skin {
            return;
        }
        let data = Arc::clone(&self.data);
        if let Some(new_skin) = skin.and_then(|s| data.skins.get(s)) {
            match self.skin.and_then(|s| data.skins.get(s)) {
                Some(old_skin) => {
                    for (index, slot) in self.slots.iter_mut().enumerate() {
                        let Some(current) = slot.attachment else {
                            continue;
                        };
                        let replacement = old_skin
                            .attachments_for_slot(index)
                            .find(|&(_, attachment)| attachment == current)
                            .and_then(|(name, _)| new_skin.attachment(index, name));
                        if let Some(attachment) = replacement {
                            slot.set_attachment(&data, Some(attachment));
                        }
                    }
                }
                None => {
                    for (index, slot) in self.slots.iter_mut().enumerate() {
                        let attachment = data.slots[index]
                            .attachment_name
                            .as_deref()
                            .and_then(|name| new_skin.attachment(index, name));
                        if attachment.is_some() {
                            slot.set_attachment(&data, attachment);
                        }
                    }
                }
            }
        }
        self.skin = skin;
        self.update_cache();
    }

    /// See [`VertexData::compute_world_vertices`].
    #[allow(clippy::too_many_arguments)]
    pub fn compute_world_vertices(
        &self,
        slot: usize,
        vertex: &VertexData,
        start: usize,
        count: usize,
        out: &mut [f32],
        offset: usize,
        stride: usize,
    ) {
        vertex.compute_world_vertices(self, slot, start, count, out, offset, stride);
    }

    /// Bounds of the region and mesh attachments of active slots, `None` when nothing is
    /// visible.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        let mut vertices = Vec::new();
        for &slot_index in &self.draw_order {
            let slot = &self.slots[slot_index];
            if !self.bones[slot.bone].active {
                continue;
            }
            match slot.attachment.and_then(|a| self.data.attachment(a)) {
                Some(Attachment::Region(region)) => {
                    vertices.resize(8, 0.0);
                    region.compute_world_vertices(&self.bones[slot.bone], &mut vertices, 0, 2);
                }
                Some(Attachment::Mesh(mesh)) => {
                    let n = mesh.vertex.world_vertices_length;
                    vertices.resize(n, 0.0);
                    mesh.vertex
                        .compute_world_vertices(self, slot_index, 0, n, &mut vertices, 0, 2);
                }
                _ => continue,
            }
            for point in vertices.chunks_exact(2) {
                min[0] = min[0].min(point[0]);
                min[1] = min[1].min(point[1]);
                max[0] = max[0].max(point[0]);
                max[1] = max[1].max(point[1]);
            }
        }
        (min[0] <= max[0]).then(|| Bounds {
            x: min[0],
            y: min[1],
            width: max[0] - min[0],
            height: max[1] - min[1],
        })
    }
}

/// Rotation/scale/shear matrix `[a, b, c, d]` of a local transform, in degrees.
pub(crate) fn local_matrix(rotation: f32, scale_x: f32, scale_y: f32, shear_x: f32, shear_y: f32) -> [f32; 4] {
    let (sin_x, cos_x) = (rotation + shear_x).to_radians().sin_cos();
    let (sin_y, cos_y) = (rotation + 90.0 + shear_y).to_radians().sin_cos();
    [cos_x * scale_x, cos_y * scale_y, sin_x * scale_x, sin_y * scale_y]
}

use super::curve::signum;
use super::skeleton::Frame;
use crate::{Attachment, Inherit, LocalTransform, PathAttachment, PositionMode, RotateMode, Skeleton, SpacingMode};
use std::f32::consts::PI;

const EPSILON: f32 = 1.0e-5;
const IK_EPSILON: f32 = 1.0e-4;

impl Skeleton {
    pub(crate) fn apply_ik_constraint(&mut self, index: usize) {
        let constraint = &self.ik_constraints[index];
        let mix = constraint.mix;
        if mix == 0.0 {
            return;
        }
        let target = &self.bones[constraint.target];
        let (target_x, target_y) = (target.world_x, target.world_y);
        let uniform = self.data.ik_constraints[constraint.data_index()].uniform;
        let (compress, stretch) = (constraint.compress, constraint.stretch);
        let (bend_direction, softness) = (constraint.bend_direction, constraint.softness);

        match constraint.bones[..] {
            [bone] => self.ik_one(bone, target_x, target_y, compress, stretch, uniform, mix),
            [parent, child] => self.ik_two(
                parent,
                child,
                target_x,
                target_y,
                bend_direction,
                stretch,
                uniform,
                softness,
                mix,
            ),
            ref bones => tracing::warn!(
                constraint = %self.data.ik_constraints[constraint.data_index()].name,
                bones = bones.len(),
                "IK constraint needs one or two bones"
            ),
        }
    }

    /// Rotates `bone` toward the target, optionally scaling it to reach.
    #[allow(clippy::too_many_arguments)]
    fn ik_one(
        &mut self,
        bone_index: usize,
        target_x: f32,
        target_y: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
        alpha: f32,
    ) {
        let Frame {
            a: pa,
            b: mut pb,
            c: pc,
            d: mut pd,
            world_x: pwx,
            world_y: pwy,
        } = self.parent_frame(bone_index);
        let bone = &self.bones[bone_index];
        let applied = bone.applied();

        let mut rotation_ik = -applied.shear_x - applied.rotation;
        let (mut tx, mut ty) = match bone.inherit {
            Inherit::OnlyTranslation => (
                (target_x - bone.world_x) * signum(self.scale_x),
                (target_y - bone.world_y) * signum(self.scale_y),
            ),
            inherit => {
                if inherit == Inherit::NoRotationOrReflection {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc).max(IK_EPSILON);
                    let sa = pa / self.scale_x;
                    let sc = pc / self.scale_y;
                    pb = -sc * s * self.scale_x;
                    pd = sa * s * self.scale_y;
                    rotation_ik += sc.atan2(sa).to_degrees();
                }
                let x = target_x - pwx;
                let y = target_y - pwy;
                let d = pa * pd - pb * pc;
                if d.abs() <= IK_EPSILON {
                    (0.0, 0.0)
                } else {
                    ((x * pd - y * pb) / d - applied.x, (y * pa - x * pc) / d - applied.y)
                }
            }
        };

        rotation_ik += ty.atan2(tx).to_degrees();
        if applied.scale_x < 0.0 {
            rotation_ik += 180.0;
        }
        if rotation_ik > 180.0 {
            rotation_ik -= 360.0;
        } else if rotation_ik < -180.0 {
            rotation_ik += 360.0;
        }

        let mut sx = applied.scale_x;
        let mut sy = applied.scale_y;
        if compress || stretch {
            if matches!(bone.inherit, Inherit::NoScale | Inherit::NoScaleOrReflection) {
                tx = target_x - bone.world_x;
                ty = target_y - bone.world_y;
            }
            let b = self.data.bones[bone.data_index()].length * sx;
            if b > IK_EPSILON {
                let dd = tx * tx + ty * ty;
                if (compress && dd < b * b) || (stretch && dd > b * b) {
                    let s = (dd.sqrt() / b - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
            }
        }

        self.update_bone_world_with(
            bone_index,
            LocalTransform {
                rotation: applied.rotation + rotation_ik * alpha,
                scale_x: sx,
                scale_y: sy,
                ..applied
            },
        );
    }

    /// Bends `parent` and `child` so the child's tip reaches the target. Both bones must
    /// inherit normally.
    #[allow(clippy::too_many_arguments)]
    fn ik_two(
        &mut self,
        parent_index: usize,
        child_index: usize,
        target_x: f32,
        target_y: f32,
        bend_direction: i32,
        stretch: bool,
        uniform: bool,
        softness: f32,
        alpha: f32,
    ) {
        if self.bones[parent_index].inherit != Inherit::Normal
            || self.bones[child_index].inherit != Inherit::Normal
        {
            return;
        }
        let parent = &self.bones[parent_index];
        let child = &self.bones[child_index];
        let parent_applied = parent.applied();
        let child_applied = child.applied();
        let (px, py) = (parent_applied.x, parent_applied.y);
        let mut psx = parent_applied.scale_x;
        let mut psy = parent_applied.scale_y;
        let mut sx = psx;
        let mut sy = psy;
        let mut csx = child_applied.scale_x;

        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0, -1.0)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0
        } else {
            0.0
        };

        let cx = child_applied.x;
        let u = (psx - psy).abs() <= IK_EPSILON;
        let (cy, cwx, cwy) = if !u || stretch {
            (0.0, parent.a * cx + parent.world_x, parent.c * cx + parent.world_y)
        } else {
            let cy = child_applied.y;
            (
                cy,
                parent.a * cx + parent.b * cy + parent.world_x,
                parent.c * cx + parent.d * cy + parent.world_y,
            )
        };

        let pp = self.parent_frame(parent_index);
        let mut id = pp.a * pp.d - pp.b * pp.c;
        id = if id.abs() <= IK_EPSILON { 0.0 } else { 1.0 / id };
        let x = cwx - pp.world_x;
        let y = cwy - pp.world_y;
        let dx = (x * pp.d - y * pp.b) * id - px;
        let dy = (y * pp.a - x * pp.c) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = self.data.bones[child.data_index()].length * csx;

        if l1 < IK_EPSILON {
            self.ik_one(parent_index, target_x, target_y, false, stretch, false, alpha);
            self.update_bone_world_with(
                child_index,
                LocalTransform {
                    x: cx,
                    y: cy,
                    rotation: 0.0,
                    ..child_applied
                },
            );
            return;
        }

        let x = target_x - pp.world_x;
        let y = target_y - pp.world_y;
        let mut tx = (x * pp.d - y * pp.b) * id - px;
        let mut ty = (y * pp.a - x * pp.c) * id - py;
        let mut dd = tx * tx + ty * ty;
        if softness != 0.0 {
            let softness = softness * psx * (csx + 1.0) * 0.5;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 {
                let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                p = (sd - softness * (1.0 - p * p)) / td;
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let bend = bend_direction as f32;
        let (a1, a2) = if u {
            l2 *= psx;
            let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
            let a2 = if cos < -1.0 {
                cos = -1.0;
                PI * bend
            } else if cos > 1.0 {
                cos = 1.0;
                if stretch {
                    let s = (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
                0.0
            } else {
                cos.acos() * bend
            };
            let a = l1 + l2 * cos;
            let b = l2 * a2.sin();
            ((ty * a - tx * b).atan2(tx * a + ty * b), a2)
        } else {
            ik_two_non_uniform(psx, psy, l1, l2, tx, ty, dd, bend)
        };

        let os = cy.atan2(cx) * s2;
        let rotation = parent_applied.rotation;
        let a1 = wrap_degrees((a1 - os).to_degrees() + os1 - rotation);
        self.update_bone_world_with(
            parent_index,
            LocalTransform {
                x: px,
                y: py,
                rotation: rotation + a1 * alpha,
                scale_x: sx,
                scale_y: sy,
                shear_x: 0.0,
                shear_y: 0.0,
            },
        );

        let rotation = child_applied.rotation;
        let a2 = wrap_degrees(((a2 + os).to_degrees() - child_applied.shear_x) * s2 + os2 - rotation);
        self.update_bone_world_with(
            child_index,
            LocalTransform {
                x: cx,
                y: cy,
                rotation: rotation + a2 * alpha,
                ..child_applied
            },
        );
    }

    pub(crate) fn apply_transform_constraint(&mut self, index: usize) {
        let constraint = &self.transform_constraints[index];
        if constraint.mix_rotate == 0.0
            && constraint.mix_x == 0.0
            && constraint.mix_y == 0.0
            && constraint.mix_scale_x == 0.0
            && constraint.mix_scale_y == 0.0
            && constraint.mix_shear_y == 0.0
        {
            return;
        }
        let data = &self.data.transform_constraints[constraint.data_index()];
        match (data.local, data.relative) {
            (true, true) => self.transform_relative_local(index),
            (true, false) => self.transform_absolute_local(index),
            (false, true) => self.transform_relative_world(index),
            (false, false) => self.transform_absolute_world(index),
        }
    }

    fn transform_absolute_world(&mut self, index: usize) {
        let constraint = &self.transform_constraints[index];
        let data = &self.data.transform_constraints[constraint.data_index()];
        let mixes = TransformMixes::of(constraint);
        let target = &self.bones[constraint.target];
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let deg_rad_reflect = reflect(ta, tb, tc, td);
        let offset_rotation = data.offset_rotation * deg_rad_reflect;
        let offset_shear_y = data.offset_shear_y * deg_rad_reflect;
        let [target_x, target_y] = target.local_to_world([data.offset_x, data.offset_y]);
        let (offset_scale_x, offset_scale_y) = (data.offset_scale_x, data.offset_scale_y);
        let bones = constraint.bones.clone();

        for bone_index in bones {
            let bone = &mut self.bones[bone_index];
            if mixes.rotate != 0.0 {
                let r = wrap_pi(tc.atan2(ta) - bone.c.atan2(bone.a) + offset_rotation) * mixes.rotate;
                rotate_world_radians(bone, r);
            }
            if mixes.x != 0.0 || mixes.y != 0.0 {
                bone.world_x += (target_x - bone.world_x) * mixes.x;
                bone.world_y += (target_y - bone.world_y) * mixes.y;
            }
            if mixes.scale_x != 0.0 {
                let mut s = (bone.a * bone.a + bone.c * bone.c).sqrt();
                if s != 0.0 {
                    s = (s + ((ta * ta + tc * tc).sqrt() - s + offset_scale_x) * mixes.scale_x) / s;
                }
                bone.a *= s;
                bone.c *= s;
            }
            if mixes.scale_y != 0.0 {
                let mut s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                if s != 0.0 {
                    s = (s + ((tb * tb + td * td).sqrt() - s + offset_scale_y) * mixes.scale_y) / s;
                }
                bone.b *= s;
                bone.d *= s;
            }
            if mixes.shear_y > 0.0 {
                let (b, d) = (bone.b, bone.d);
                let by = d.atan2(b);
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta) - (by - bone.c.atan2(bone.a)));
                let r = by + (r + offset_shear_y) * mixes.shear_y;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_applied_transform(bone_index);
        }
    }

    fn transform_relative_world(&mut self, index: usize) {
        let constraint = &self.transform_constraints[index];
        let data = &self.data.transform_constraints[constraint.data_index()];
        let mixes = TransformMixes::of(constraint);
        let target = &self.bones[constraint.target];
        let (ta, tb, tc, td) = (target.a, target.b, target.c, target.d);
        let deg_rad_reflect = reflect(ta, tb, tc, td);
        let offset_rotation = data.offset_rotation * deg_rad_reflect;
        let offset_shear_y = data.offset_shear_y * deg_rad_reflect;
        let [target_x, target_y] = target.local_to_world([data.offset_x, data.offset_y]);
        let (offset_scale_x, offset_scale_y) = (data.offset_scale_x, data.offset_scale_y);
        let bones = constraint.bones.clone();

        for bone_index in bones {
            let bone = &mut self.bones[bone_index];
            if mixes.rotate != 0.0 {
                let r = wrap_pi(tc.atan2(ta) + offset_rotation) * mixes.rotate;
                rotate_world_radians(bone, r);
            }
            if mixes.x != 0.0 || mixes.y != 0.0 {
                bone.world_x += target_x * mixes.x;
                bone.world_y += target_y * mixes.y;
            }
            if mixes.scale_x != 0.0 {
                let s = ((ta * ta + tc * tc).sqrt() - 1.0 + offset_scale_x) * mixes.scale_x + 1.0;
                bone.a *= s;
                bone.c *= s;
            }
            if mixes.scale_y != 0.0 {
                let s = ((tb * tb + td * td).sqrt() - 1.0 + offset_scale_y) * mixes.scale_y + 1.0;
                bone.b *= s;
                bone.d *= s;
            }
            if mixes.shear_y > 0.0 {
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta));
                let (b, d) = (bone.b, bone.d);
                let r = d.atan2(b) + (r - PI / 2.0 + offset_shear_y) * mixes.shear_y;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_applied_transform(bone_index);
        }
    }

    fn transform_absolute_local(&mut self, index: usize) {
        let constraint = &self.transform_constraints[index];
        let data = &self.data.transform_constraints[constraint.data_index()];
        let mixes = TransformMixes::of(constraint);
        let target = self.bones[constraint.target].applied();
        let offset = LocalTransform {
            x: data.offset_x,
            y: data.offset_y,
            rotation: data.offset_rotation,
            scale_x: data.offset_scale_x,
            scale_y: data.offset_scale_y,
            shear_x: 0.0,
            shear_y: data.offset_shear_y,
        };
        let bones = constraint.bones.clone();

        for bone_index in bones {
            let applied = self.bones[bone_index].applied();
            let mut rotation = applied.rotation;
            if mixes.rotate != 0.0 {
                let r = wrap_degrees_local(target.rotation - rotation + offset.rotation);
                rotation += r * mixes.rotate;
            }
            let x = applied.x + (target.x - applied.x + offset.x) * mixes.x;
            let y = applied.y + (target.y - applied.y + offset.y) * mixes.y;

            let mut scale_x = applied.scale_x;
            let mut scale_y = applied.scale_y;
            if mixes.scale_x != 0.0 && scale_x != 0.0 {
                scale_x = (scale_x + (target.scale_x - scale_x + offset.scale_x) * mixes.scale_x) / scale_x;
            }
            if mixes.scale_y != 0.0 && scale_y != 0.0 {
                scale_y = (scale_y + (target.scale_y - scale_y + offset.scale_y) * mixes.scale_y) / scale_y;
            }

            let mut shear_y = applied.shear_y;
            if mixes.shear_y != 0.0 {
                let r = wrap_degrees_local(target.shear_y - shear_y + offset.shear_y);
                shear_y += r * mixes.shear_y;
            }

            self.update_bone_world_with(
                bone_index,
                LocalTransform {
                    x,
                    y,
                    rotation,
                    scale_x,
                    scale_y,
                    shear_x: applied.shear_x,
                    shear_y,
                },
            );
        }
    }

    fn transform_relative_local(&mut self, index: usize) {
        let constraint = &self.transform_constraints[index];
        let data = &self.data.transform_constraints[constraint.data_index()];
        let mixes = TransformMixes::of(constraint);
        let target = self.bones[constraint.target].applied();
        let (offset_x, offset_y) = (data.offset_x, data.offset_y);
        let offset_rotation = data.offset_rotation;
        let (offset_scale_x, offset_scale_y) = (data.offset_scale_x, data.offset_scale_y);
        let offset_shear_y = data.offset_shear_y;
        let bones = constraint.bones.clone();

        for bone_index in bones {
            let applied = self.bones[bone_index].applied();
            let transform = LocalTransform {
                x: applied.x + (target.x + offset_x) * mixes.x,
                y: applied.y + (target.y + offset_y) * mixes.y,
                rotation: applied.rotation + (target.rotation + offset_rotation) * mixes.rotate,
                scale_x: applied.scale_x * ((target.scale_x - 1.0 + offset_scale_x) * mixes.scale_x + 1.0),
                scale_y: applied.scale_y * ((target.scale_y - 1.0 + offset_scale_y) * mixes.scale_y + 1.0),
                shear_x: applied.shear_x,
                shear_y: applied.shear_y + (target.shear_y + offset_shear_y) * mixes.shear_y,
            };
            self.update_bone_world_with(bone_index, transform);
        }
    }

    pub(crate) fn apply_path_constraint(&mut self, index: usize) {
        let constraint = &self.path_constraints[index];
        let (mix_rotate, mix_x, mix_y) = (constraint.mix_rotate, constraint.mix_x, constraint.mix_y);
        if mix_rotate == 0.0 && mix_x == 0.0 && mix_y == 0.0 {
            return;
        }
        let data = std::sync::Arc::clone(&self.data);
        let slot = constraint.target;
        let Some(Attachment::Path(path)) = self.slots[slot].attachment().and_then(|a| data.attachment(a))
        else {
            return;
        };
        let constraint_data = &data.path_constraints[constraint.data_index()];
        let bones = constraint.bones.clone();
        let (position, spacing) = (constraint.position, constraint.spacing);

        let tangents = constraint_data.rotate_mode == RotateMode::Tangent;
        let scale = constraint_data.rotate_mode == RotateMode::ChainScale;
        let bone_count = bones.len();
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };
        let mut spaces = vec![0.0f32; spaces_count];
        let mut lengths = vec![0.0f32; if scale { bone_count } else { 0 }];

        let bone_length = |i: usize| -> (f32, f32) {
            let bone = &self.bones[bones[i]];
            let setup_length = data.bones[bone.data_index()].length;
            let x = setup_length * bone.a;
            let y = setup_length * bone.c;
            (setup_length, (x * x + y * y).sqrt())
        };

        match constraint_data.spacing_mode {
            SpacingMode::Percent => {
                if scale {
                    for (i, length) in lengths.iter_mut().enumerate().take(spaces_count - 1) {
                        *length = bone_length(i).1;
                    }
                }
                spaces.iter_mut().skip(1).for_each(|space| *space = spacing);
            }
            SpacingMode::Proportional => {
                let mut sum = 0.0;
                for i in 0..spaces_count.saturating_sub(1) {
                    let (setup_length, length) = bone_length(i);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        spaces[i + 1] = length;
                        sum += length;
                    }
                }
                if sum > 0.0 {
                    let factor = spaces_count as f32 / sum * spacing;
                    spaces.iter_mut().skip(1).for_each(|space| *space *= factor);
                }
            }
            mode => {
                let length_spacing = mode == SpacingMode::Length;
                for i in 0..spaces_count.saturating_sub(1) {
                    let (setup_length, length) = bone_length(i);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        let s = if length_spacing { setup_length + spacing } else { spacing };
                        spaces[i + 1] = s * length / setup_length;
                    }
                }
            }
        }

        let positions = self.compute_path_world_positions(
            slot,
            path,
            constraint_data.position_mode,
            constraint_data.spacing_mode,
            &spaces,
            tangents,
            position,
        );
        if positions.len() < 2 {
            return;
        }

        let mut bone_x = positions[0];
        let mut bone_y = positions[1];
        let mut offset_rotation = constraint_data.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            constraint_data.rotate_mode == RotateMode::Chain
        } else {
            let p = &self.bones[self.slots[slot].bone()];
            offset_rotation *= reflect(p.a, p.b, p.c, p.d);
            false
        };

        let mut p = 3;
        for (i, &bone_index) in bones.iter().enumerate() {
            let bone = &mut self.bones[bone_index];
            bone.world_x += (bone_x - bone.world_x) * mix_x;
            bone.world_y += (bone_y - bone.world_y) * mix_y;
            let x = positions[p];
            let y = positions[p + 1];
            let dx = x - bone_x;
            let dy = y - bone_y;
            if scale {
                let length = lengths[i];
                if length >= EPSILON {
                    let s = ((dx * dx + dy * dy).sqrt() / length - 1.0) * mix_rotate + 1.0;
                    bone.a *= s;
                    bone.c *= s;
                }
            }
            bone_x = x;
            bone_y = y;
            if mix_rotate > 0.0 {
                let (a, c) = (bone.a, bone.c);
                let mut r = if tangents {
                    positions[p - 1]
                } else if spaces[i + 1] < EPSILON {
                    positions[p + 2]
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a);
                if tip {
                    let (sin, cos) = r.sin_cos();
                    let length = data.bones[bone.data_index()].length;
                    bone_x += (length * (cos * a - sin * c) - dx) * mix_rotate;
                    bone_y += (length * (sin * a + cos * c) - dy) * mix_rotate;
                } else {
                    r += offset_rotation;
                }
                rotate_world_radians(bone, wrap_pi(r) * mix_rotate);
            }
            self.update_applied_transform(bone_index);
            p += 3;
        }
    }

    /// Positions (x, y, rotation triples) of the spaces along the path, starting at `position`.
    #[allow(clippy::too_many_arguments)]
    fn compute_path_world_positions(
        &self,
        slot: usize,
        path: &PathAttachment,
        position_mode: PositionMode,
        spacing_mode: SpacingMode,
        spaces: &[f32],
        tangents: bool,
        mut position: f32,
    ) -> Vec<f32> {
        const NONE: i32 = -1;
        const BEFORE: i32 = -2;
        const AFTER: i32 = -3;

        let spaces_count = spaces.len();
        let closed = path.closed;
        let vertex = &path.vertex;
        let mut vertices_length = vertex.world_vertices_length;
        if vertices_length < 6 || spaces_count == 0 {
            return Vec::new();
        }
        let mut out = vec![0.0f32; spaces_count * 3 + 2];

        if !path.constant_speed {
            let lengths = &path.lengths;
            let curve_count = (vertices_length / 6) as i32 - if closed { 1 } else { 2 };
            let Some(&path_length) = usize::try_from(curve_count).ok().and_then(|c| lengths.get(c)) else {
                return out;
            };
            if position_mode == PositionMode::Percent {
                position *= path_length;
            }
            let multiplier = match spacing_mode {
                SpacingMode::Percent => path_length,
                SpacingMode::Proportional => path_length / spaces_count as f32,
                _ => 1.0,
            };

            let mut world = [0.0f32; 8];
            let mut prev_curve = NONE;
            let mut curve = 0usize;
            for (i, &space) in spaces.iter().enumerate() {
                let space = space * multiplier;
                position += space;
                let mut p = position;

                if closed {
                    p = p.rem_euclid(path_length);
                    curve = 0;
                } else if p < 0.0 {
                    if prev_curve != BEFORE {
                        prev_curve = BEFORE;
                        vertex.compute_world_vertices(self, slot, 2, 4, &mut world, 0, 2);
                    }
                    add_before_position(p, &world, 0, &mut out, i * 3);
                    continue;
                } else if p > path_length {
                    if prev_curve != AFTER {
                        prev_curve = AFTER;
                        vertex.compute_world_vertices(self, slot, vertices_length - 6, 4, &mut world, 0, 2);
                    }
                    add_after_position(p - path_length, &world, 0, &mut out, i * 3);
                    continue;
                }

                while curve < lengths.len() {
                    let length = lengths[curve];
                    if p > length {
                        curve += 1;
                        continue;
                    }
                    if curve == 0 {
                        p /= length.max(EPSILON);
                    } else {
                        let prev = lengths[curve - 1];
                        p = (p - prev) / (length - prev).max(EPSILON);
                    }
                    break;
                }

                if curve as i32 != prev_curve {
                    prev_curve = curve as i32;
                    if closed && curve as i32 == curve_count {
                        vertex.compute_world_vertices(self, slot, vertices_length - 4, 4, &mut world, 0, 2);
                        vertex.compute_world_vertices(self, slot, 0, 4, &mut world, 4, 2);
                    } else {
                        vertex.compute_world_vertices(self, slot, curve * 6 + 2, 8, &mut world, 0, 2);
                    }
                }
                let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = world;
                add_curve_position(
                    p,
                    [x1, y1, cx1, cy1, cx2, cy2, x2, y2],
                    &mut out,
                    i * 3,
                    tangents || (i > 0 && space.abs() < EPSILON),
                );
            }
            return out;
        }

        // Constant speed: measure every curve, then walk them by arc length.
        let mut curve_count = vertices_length / 6;
        let mut world;
        if closed {
            vertices_length += 2;
            world = vec![0.0f32; vertices_length];
            vertex.compute_world_vertices(self, slot, 2, vertices_length - 4, &mut world, 0, 2);
            vertex.compute_world_vertices(self, slot, 0, 2, &mut world, vertices_length - 4, 2);
            world[vertices_length - 2] = world[0];
            world[vertices_length - 1] = world[1];
        } else {
            curve_count -= 1;
            vertices_length -= 4;
            world = vec![0.0f32; vertices_length];
            vertex.compute_world_vertices(self, slot, 2, vertices_length, &mut world, 0, 2);
        }

        let mut curves = vec![0.0f32; curve_count];
        let mut path_length = 0.0f32;
        let mut x1 = world[0];
        let mut y1 = world[1];
        let (mut cx1, mut cy1, mut cx2, mut cy2, mut x2, mut y2);
        let mut w = 2;
        for curve in curves.iter_mut() {
            cx1 = world[w];
            cy1 = world[w + 1];
            cx2 = world[w + 2];
            cy2 = world[w + 3];
            x2 = world[w + 4];
            y2 = world[w + 5];
            let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
            let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
            let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
            let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
            let mut ddfx = tmpx * 2.0 + dddfx;
            let mut ddfy = tmpy * 2.0 + dddfy;
            let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.16666667;
            let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.16666667;
            path_length += (dfx * dfx + dfy * dfy).sqrt();
            dfx += ddfx;
            dfy += ddfy;
            ddfx += dddfx;
            ddfy += dddfy;
            path_length += (dfx * dfx + dfy * dfy).sqrt();
            dfx += ddfx;
            dfy += ddfy;
            path_length += (dfx * dfx + dfy * dfy).sqrt();
            dfx += ddfx + dddfx;
            dfy += ddfy + dddfy;
            path_length += (dfx * dfx + dfy * dfy).sqrt();
            *curve = path_length;
            x1 = x2;
            y1 = y2;
            w += 6;
        }

        if position_mode == PositionMode::Percent {
            position *= path_length;
        }
        let multiplier = match spacing_mode {
            SpacingMode::Percent => path_length,
            SpacingMode::Proportional => path_length / spaces_count as f32,
            _ => 1.0,
        };

        let mut segments = [0.0f32; 10];
        let mut curve_length = 0.0f32;
        let mut prev_curve = NONE;
        let mut curve = 0usize;
        let mut segment = 0usize;
        let mut points = [0.0f32; 8];
        for (i, &space) in spaces.iter().enumerate() {
            let space = space * multiplier;
            position += space;
            let mut p = position;

            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                add_before_position(p, &world, 0, &mut out, i * 3);
                continue;
            } else if p > path_length {
                add_after_position(p - path_length, &world, vertices_length - 4, &mut out, i * 3);
                continue;
            }

            while curve < curves.len() {
                let length = curves[curve];
                if p > length {
                    curve += 1;
                    continue;
                }
                if curve == 0 {
                    p /= length.max(EPSILON);
                } else {
                    let prev = curves[curve - 1];
                    p = (p - prev) / (length - prev).max(EPSILON);
                }
                break;
            }

            if curve as i32 != prev_curve {
                prev_curve = curve as i32;
                let ii = curve * 6;
                points.copy_from_slice(&world[ii..ii + 8]);
                let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = points;
                let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
                let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
                let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
                let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
                let mut ddfx = tmpx * 2.0 + dddfx;
                let mut ddfy = tmpy * 2.0 + dddfy;
                let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.16666667;
                let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.16666667;
                curve_length = (dfx * dfx + dfy * dfy).sqrt();
                segments[0] = curve_length;
                for seg in segments.iter_mut().take(8).skip(1) {
                    dfx += ddfx;
                    dfy += ddfy;
                    ddfx += dddfx;
                    ddfy += dddfy;
                    curve_length += (dfx * dfx + dfy * dfy).sqrt();
                    *seg = curve_length;
                }
                dfx += ddfx;
                dfy += ddfy;
                curve_length += (dfx * dfx + dfy * dfy).sqrt();
                segments[8] = curve_length;
                dfx += ddfx + dddfx;
                dfy += ddfy + dddfy;
                curve_length += (dfx * dfx + dfy * dfy).sqrt();
                segments[9] = curve_length;
                segment = 0;
            }

            p *= curve_length;
            loop {
                let length = segments[segment];
                if p > length && segment < 9 {
                    segment += 1;
                    continue;
                }
                if segment == 0 {
                    p /= length.max(EPSILON);
                } else {
                    let prev = segments[segment - 1];
                    p = segment as f32 + (p - prev) / (length - prev).max(EPSILON);
                }
                break;
            }
            add_curve_position(
                p * 0.1,
                points,
                &mut out,
                i * 3,
                tangents || (i > 0 && space.abs() < EPSILON),
            );
        }
        out
    }
}

#[derive(Copy, Clone)]
struct TransformMixes {
    rotate: f32,
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    shear_y: f32,
}

impl TransformMixes {
    fn of(constraint: &crate::TransformConstraint) -> Self {
        Self {
            rotate: constraint.mix_rotate,
            x: constraint.mix_x,
            y: constraint.mix_y,
            scale_x: constraint.mix_scale_x,
            scale_y: constraint.mix_scale_y,
            shear_y: constraint.mix_shear_y,
        }
    }
}

/// Angles `(a1, a2)` in radians for a two bone chain whose parent is scaled non-uniformly.
#[allow(clippy::too_many_arguments)]
fn ik_two_non_uniform(psx: f32, psy: f32, l1: f32, l2: f32, tx: f32, ty: f32, dd: f32, bend: f32) -> (f32, f32) {
    let a = psx * l2;
    let b = psy * l2;
    let aa = a * a;
    let bb = b * b;
    let ta = ty.atan2(tx);
    let c = bb * l1 * l1 + aa * dd - aa * bb;
    let c1 = -2.0 * bb * l1;
    let c2 = bb - aa;
    let d = c1 * c1 - 4.0 * c2 * c;
    if d >= 0.0 {
        let mut q = d.sqrt();
        if c1 < 0.0 {
            q = -q;
        }
        q = -(c1 + q) * 0.5;
        let r0 = q / c2;
        let r1 = c / q;
        let r = if r0.abs() < r1.abs() { r0 } else { r1 };
        let r0 = dd - r * r;
        if r0 >= 0.0 {
            let y = r0.sqrt() * bend;
            return (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
        }
    }

    let mut min_angle = PI;
    let mut min_x = l1 - a;
    let mut min_dist = min_x * min_x;
    let mut min_y = 0.0;
    let mut max_angle = 0.0;
    let mut max_x = l1 + a;
    let mut max_dist = max_x * max_x;
    let mut max_y = 0.0;
    let c = -a * l1 / (aa - bb);
    if (-1.0..=1.0).contains(&c) {
        let c = c.acos();
        let x = a * c.cos() + l1;
        let y = b * c.sin();
        let d = x * x + y * y;
        if d < min_dist {
            min_angle = c;
            min_dist = d;
            min_x = x;
            min_y = y;
        }
        if d > max_dist {
            max_angle = c;
            max_dist = d;
            max_x = x;
            max_y = y;
        }
    }
    if dd <= (min_dist + max_dist) * 0.5 {
        (ta - (min_y * bend).atan2(min_x), min_angle * bend)
    } else {
        (ta - (max_y * bend).atan2(max_x), max_angle * bend)
    }
}

/// Degrees to radians, negated for a reflected frame.
fn reflect(a: f32, b: f32, c: f32, d: f32) -> f32 {
    if a * d - b * c > 0.0 {
        PI / 180.0
    } else {
        -PI / 180.0
    }
}

fn wrap_pi(r: f32) -> f32 {
    if r > PI {
        r - 2.0 * PI
    } else if r < -PI {
        r + 2.0 * PI
    } else {
        r
    }
}

fn wrap_degrees(degrees: f32) -> f32 {
    if degrees > 180.0 {
        degrees - 360.0
    } else if degrees < -180.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Wraps to [-180, 180) the way local transform constraints round the turn count.
pub(crate) fn wrap_degrees_local(r: f32) -> f32 {
    let turns = (16384.499999999996 - f64::from(r) / 360.0) as i32;
    r - (16384 - turns) as f32 * 360.0
}

fn rotate_world_radians(bone: &mut crate::Bone, r: f32) {
    let (sin, cos) = r.sin_cos();
    let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
    bone.a = cos * a - sin * c;
    bone.b = cos * b - sin * d;
    bone.c = sin * a + cos * c;
    bone.d = sin * b + cos * d;
}

fn add_before_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let x1 = temp[i];
    let y1 = temp[i + 1];
    let dx = temp[i + 2] - x1;
    let dy = temp[i + 3] - y1;
    let r = dy.atan2(dx);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, out: &mut [f32], o: usize) {
    let x1 = temp[i + 2];
    let y1 = temp[i + 3];
    let dx = x1 - temp[i];
    let dy = y1 - temp[i + 1];
    let r = dy.atan2(dx);
    out[o] = x1 + p * r.cos();
    out[o + 1] = y1 + p * r.sin();
    out[o + 2] = r;
}

/// Point at `p` on the bezier `[x1, y1, cx1, cy1, cx2, cy2, x2, y2]`, with its tangent angle
/// when `tangents` is set.
fn add_curve_position(p: f32, curve: [f32; 8], out: &mut [f32], o: usize, tangents: bool) {
    let [x1, y1, cx1, cy1, cx2, cy2, x2, y2] = curve;
    if p < EPSILON || p.is_nan() {
        out[o] = x1;
        out[o + 1] = y1;
        out[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    out[o] = x;
    out[o + 1] = y;
    if tangents {
        out[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt)).atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt))
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_wrap_rounds_half_turns() {
        assert_eq!(wrap_degrees_local(0.0), 0.0);
        assert!((wrap_degrees_local(270.0) - -90.0).abs() < 1e-4);
        assert!((wrap_degrees_local(-270.0) - 90.0).abs() < 1e-4);
        assert!((wrap_degrees_local(720.0 + 10.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn curve_position_endpoints() {
        let curve = [0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0];
        let mut out = [0.0; 3];
        add_curve_position(0.0, curve, &mut out, 0, true);
        assert_eq!(out, [0.0, 0.0, 0.0]);
        add_curve_position(1.0, curve, &mut out, 0, true);
        assert!((out[0] - 3.0).abs() < 1e-5);
        assert!(out[2].abs() < 1e-5);
    }
}

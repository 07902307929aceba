//! Post-processing shared by the JSON and binary loaders.

use crate::{Atlas, Attachment, Color, Error, SkeletonData};
use tracing::{debug, warn};

/// Editor colors of attachments whose color is nonessential.
pub(crate) const POINT_COLOR: Color = Color::new(0.38, 0.94, 0.0, 1.0);
pub(crate) const CLIPPING_COLOR: Color = Color::new(0.2275, 0.2275, 0.8078, 1.0);

/// A linked mesh whose parent could not be looked up while its skin was being read.
#[derive(Clone, Debug)]
pub(crate) struct PendingLinkedMesh {
    /// Arena index of the placeholder mesh.
    pub attachment: usize,
    /// Skin that owns the parent, by index into `SkeletonData::skins`.
    pub parent_skin: usize,
    pub slot: usize,
    pub parent: String,
    pub inherit_timelines: bool,
}

/// Copies parent geometry into every pending linked mesh, in read order.
pub(crate) fn resolve_linked_meshes(
    data: &mut SkeletonData,
    pending: Vec<PendingLinkedMesh>,
) -> Result<(), Error> {
    let count = pending.len();
    for linked in pending {
        let skin = data.skins.get(linked.parent_skin).ok_or_else(|| Error::UnknownSkin {
            name: format!("#{}", linked.parent_skin),
        })?;
        let not_found = || Error::ParentMeshNotFound {
            parent: linked.parent.clone(),
            skin: skin.name.clone(),
        };
        let parent_index = skin
            .attachment(linked.slot, &linked.parent)
            .ok_or_else(not_found)?;
        let Some(Attachment::Mesh(parent)) = data.attachments.get(parent_index) else {
            return Err(not_found());
        };
        let parent = parent.clone();
        let Some(Attachment::Mesh(mesh)) = data.attachments.get_mut(linked.attachment) else {
            continue;
        };
        mesh.vertex.bones = parent.vertex.bones;
        mesh.vertex.vertices = parent.vertex.vertices;
        mesh.vertex.world_vertices_length = parent.vertex.world_vertices_length;
        mesh.vertex.timeline_attachment = if linked.inherit_timelines {
            parent_index
        } else {
            linked.attachment
        };
        mesh.region_uvs = parent.region_uvs;
        mesh.triangles = parent.triangles;
        mesh.hull_length = parent.hull_length;
        mesh.edges = parent.edges;
        mesh.parent_mesh = Some(parent_index);
        mesh.update_region();
    }
    if count > 0 {
        debug!(count, "resolved linked meshes");
    }
    Ok(())
}

/// Binds atlas regions to region and mesh attachments by path, or per frame for sequences.
/// Attachments whose region is missing keep `None` and render nothing.
pub(crate) fn bind_atlas(data: &mut SkeletonData, atlas: &Atlas) {
    let mut missing = 0usize;
    for attachment in &mut data.attachments {
        let (path, region, sequence) = match attachment {
            Attachment::Region(a) => (&a.path, &mut a.region, &mut a.sequence),
            Attachment::Mesh(a) => (&a.path, &mut a.region, &mut a.sequence),
            _ => continue,
        };
        match sequence {
            Some(sequence) => {
                for i in 0..sequence.count {
                    let frame = atlas
                        .find_region(&sequence.path(path, i))
                        .map(|r| atlas.texture_region(r));
                    missing += usize::from(frame.is_none());
                    sequence.regions[i] = frame;
                }
            }
            None => {
                *region = atlas.find_region(path).map(|r| atlas.texture_region(r));
                missing += usize::from(region.is_none());
            }
        }
        if let Attachment::Mesh(mesh) = attachment {
            if mesh.sequence.is_none() {
                mesh.update_region();
            }
        }
    }
    if missing > 0 {
        warn!(missing, "atlas regions not found for attachments");
    }
}

/// Floats a deform key holds for `attachment`, and its setup vertices when they are plain
/// positions (unweighted keys store absolute positions).
pub(crate) fn deform_setup(data: &SkeletonData, attachment: usize) -> Option<(usize, Option<&[f32]>)> {
    let vertex = data.attachments.get(attachment)?.vertex_data()?;
    Some(if vertex.is_weighted() {
        (vertex.vertices.len() / 3 * 2, None)
    } else {
        (vertex.vertices.len(), Some(&vertex.vertices[..]))
    })
}

/// Slot order after moving each `(slot, offset)` pair, every other slot keeping its relative
/// order. `None` when the pairs are not sorted by slot, collide or leave the slot range.
pub(crate) fn draw_order_from_offsets(slot_count: usize, offsets: &[(usize, i32)]) -> Option<Vec<usize>> {
    let mut draw_order = vec![None; slot_count];
    let mut unchanged = Vec::with_capacity(slot_count.saturating_sub(offsets.len()));
    let mut original = 0;
    for &(slot, offset) in offsets {
        if slot < original || slot >= slot_count {
            return None;
        }
        unchanged.extend(original..slot);
        let target = usize::try_from(slot as i64 + i64::from(offset)).ok()?;
        match draw_order.get_mut(target) {
            Some(entry @ None) => *entry = Some(slot),
            _ => return None,
        }
        original = slot + 1;
    }
    unchanged.extend(original..slot_count);
    let mut unchanged = unchanged.into_iter();
    draw_order
        .into_iter()
        .map(|slot| slot.or_else(|| unchanged.next()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_order_offsets_move_slots_and_keep_the_rest_in_order() {
        // Slot 0 moves two places down: 1, 2, 0, 3.
        assert_eq!(draw_order_from_offsets(4, &[(0, 2)]), Some(vec![1, 2, 0, 3]));
        // Slot 3 moves to the front.
        assert_eq!(draw_order_from_offsets(4, &[(3, -3)]), Some(vec![3, 0, 1, 2]));
        assert_eq!(draw_order_from_offsets(3, &[]), Some(vec![0, 1, 2]));
    }

    #[test]
    fn draw_order_offsets_reject_invalid_input() {
        assert_eq!(draw_order_from_offsets(3, &[(0, 3)]), None);
        assert_eq!(draw_order_from_offsets(3, &[(1, -2)]), None);
        assert_eq!(draw_order_from_offsets(3, &[(2, 0), (1, 0)]), None);
        assert_eq!(draw_order_from_offsets(3, &[(0, 1), (1, -1)]), Some(vec![1, 0, 2]));
        assert_eq!(draw_order_from_offsets(3, &[(0, 2), (1, 1)]), None);
    }
}

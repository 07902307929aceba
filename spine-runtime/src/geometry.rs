//! Polygon triangulation and triangle clipping for clipping attachments.

use crate::{Attachment, Skeleton};

/// Ear-clipping triangulator with convex decomposition.
#[derive(Clone, Debug, Default)]
pub struct Triangulator {
    indices: Vec<usize>,
    concave: Vec<bool>,
}

impl Triangulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triangulates a simple polygon given as `x, y` pairs. Indices refer to vertices, not floats.
    pub fn triangulate(&mut self, vertices: &[f32]) -> Vec<u16> {
        let mut count = vertices.len() / 2;
        if count < 3 {
            return Vec::new();
        }

        self.indices.clear();
        self.indices.extend(0..count);
        self.concave.clear();
        for i in 0..count {
            let concave = is_concave(i, count, vertices, &self.indices);
            self.concave.push(concave);
        }

        let mut triangles = Vec::with_capacity((count - 2) * 3);
        while count > 3 {
            let ear = self.find_ear(count, vertices);

            triangles.push(self.indices[(count + ear - 1) % count] as u16);
            triangles.push(self.indices[ear] as u16);
            triangles.push(self.indices[(ear + 1) % count] as u16);
            self.indices.remove(ear);
            self.concave.remove(ear);
            count -= 1;

            let previous = (count + ear - 1) % count;
            let next = if ear == count { 0 } else { ear };
            self.concave[previous] = is_concave(previous, count, vertices, &self.indices);
            self.concave[next] = is_concave(next, count, vertices, &self.indices);
        }

        if count == 3 {
            triangles.extend([
                self.indices[2] as u16,
                self.indices[0] as u16,
                self.indices[1] as u16,
            ]);
        }
        triangles
    }

    fn find_ear(&self, count: usize, vertices: &[f32]) -> usize {
        let point = |i: usize| {
            let v = self.indices[i] * 2;
            (vertices[v], vertices[v + 1])
        };

        let (mut previous, mut i, mut next) = (count - 1, 0, 1);
        loop {
            if !self.concave[i] {
                let (p1x, p1y) = point(previous);
                let (p2x, p2y) = point(i);
                let (p3x, p3y) = point(next);
                let mut contains_concave = false;
                let mut other = (next + 1) % count;
                while other != previous {
                    if self.concave[other] {
                        let (vx, vy) = point(other);
                        if positive_area(p3x, p3y, p1x, p1y, vx, vy)
                            && positive_area(p1x, p1y, p2x, p2y, vx, vy)
                            && positive_area(p2x, p2y, p3x, p3y, vx, vy)
                        {
                            contains_concave = true;
                            break;
                        }
                    }
                    other = (other + 1) % count;
                }
                if !contains_concave {
                    return i;
                }
            }

            if next == 0 {
                // No ear found: fall back to the last convex vertex, or the first.
                while i > 0 && self.concave[i] {
                    i -= 1;
                }
                return i;
            }

            previous = i;
            i = next;
            next = (next + 1) % count;
        }
    }

    /// Merges triangles into convex polygons (`x, y` pairs, clockwise as produced).
    pub fn decompose(&self, vertices: &[f32], triangles: &[u16]) -> Vec<Vec<f32>> {
        let mut polygons: Vec<Vec<f32>> = Vec::new();
        let mut polygon_indices: Vec<Vec<usize>> = Vec::new();

        let mut polygon: Vec<f32> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        let mut fan_base = None;
        let mut last_winding = 0;

        for triangle in triangles.chunks_exact(3) {
            let t1 = usize::from(triangle[0]) * 2;
            let t2 = usize::from(triangle[1]) * 2;
            let t3 = usize::from(triangle[2]) * 2;
            let (x1, y1) = (vertices[t1], vertices[t1 + 1]);
            let (x2, y2) = (vertices[t2], vertices[t2 + 1]);
            let (x3, y3) = (vertices[t3], vertices[t3 + 1]);

            // Extend the current fan when the new point keeps it convex.
            if fan_base == Some(t1) && polygon.len() >= 4 {
                let o = polygon.len() - 4;
                let winding1 = winding(
                    polygon[o],
                    polygon[o + 1],
                    polygon[o + 2],
                    polygon[o + 3],
                    x3,
                    y3,
                );
                let winding2 = winding(x3, y3, polygon[0], polygon[1], polygon[2], polygon[3]);
                if winding1 == last_winding && winding2 == last_winding {
                    polygon.extend([x3, y3]);
                    indices.push(t3);
                    continue;
                }
            }

            if !polygon.is_empty() {
                polygons.push(std::mem::take(&mut polygon));
                polygon_indices.push(std::mem::take(&mut indices));
            }
            polygon.extend([x1, y1, x2, y2, x3, y3]);
            indices.extend([t1, t2, t3]);
            last_winding = winding(x1, y1, x2, y2, x3, y3);
            fan_base = Some(t1);
        }
        if !polygon.is_empty() {
            polygons.push(polygon);
            polygon_indices.push(indices);
        }

        // Go through the list of polygons and try to merge the remaining triangles.
        for i in 0..polygons.len() {
            let (Some(&first_index), Some(&last_index)) =
                (polygon_indices[i].first(), polygon_indices[i].last())
            else {
                continue;
            };

            let o = polygons[i].len() - 4;
            let mut prev_prev_x = polygons[i][o];
            let mut prev_prev_y = polygons[i][o + 1];
            let mut prev_x = polygons[i][o + 2];
            let mut prev_y = polygons[i][o + 3];
            let (first_x, first_y) = (polygons[i][0], polygons[i][1]);
            let (second_x, second_y) = (polygons[i][2], polygons[i][3]);
            let winding0 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, first_x, first_y);

            let mut other = 0;
            while other < polygons.len() {
                let candidate = &polygon_indices[other];
                if other == i
                    || candidate.len() != 3
                    || candidate[0] != first_index
                    || candidate[1] != last_index
                {
                    other += 1;
                    continue;
                }
                let other_last = candidate[2];
                let n = polygons[other].len();
                let (x3, y3) = (polygons[other][n - 2], polygons[other][n - 1]);

                let winding1 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, x3, y3);
                let winding2 = winding(x3, y3, first_x, first_y, second_x, second_y);
                if winding1 != winding0 || winding2 != winding0 {
                    other += 1;
                    continue;
                }

                polygons[other].clear();
                polygon_indices[other].clear();
                polygons[i].extend([x3, y3]);
                polygon_indices[i].push(other_last);
                prev_prev_x = prev_x;
                prev_prev_y = prev_y;
                prev_x = x3;
                prev_y = y3;
                other = 0;
            }
        }

        polygons.retain(|p| !p.is_empty());
        polygons
    }
}

fn is_concave(index: usize, count: usize, vertices: &[f32], indices: &[usize]) -> bool {
    let previous = indices[(count + index - 1) % count] * 2;
    let current = indices[index] * 2;
    let next = indices[(index + 1) % count] * 2;
    !positive_area(
        vertices[previous],
        vertices[previous + 1],
        vertices[current],
        vertices[current + 1],
        vertices[next],
        vertices[next + 1],
    )
}

fn positive_area(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> bool {
    p1x * (p3y - p2y) + p2x * (p1y - p3y) + p3x * (p2y - p1y) >= 0.0
}

fn winding(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> i32 {
    let px = p2x - p1x;
    let py = p2y - p1y;
    if p3x * py - p3y * px + px * p1y - p1x * py >= 0.0 {
        1
    } else {
        -1
    }
}

/// Reverses `polygon` in place when its vertices are counter-clockwise.
pub fn make_clockwise(polygon: &mut [f32]) {
    let len = polygon.len();
    if len < 6 {
        return;
    }
    let mut area = polygon[len - 2] * polygon[1] - polygon[0] * polygon[len - 1];
    for pair in polygon[..len - 2].chunks_exact(2).zip(polygon[2..].chunks_exact(2)) {
        let (p1, p2) = pair;
        area += p1[0] * p2[1] - p2[0] * p1[1];
    }
    if area < 0.0 {
        return;
    }

    let last_x = len - 2;
    let mut i = 0;
    while i < len / 2 {
        let other = last_x - i;
        polygon.swap(i, other);
        polygon.swap(i + 1, other + 1);
        i += 2;
    }
}

/// Clips triangles against the convex parts of a clipping attachment's polygon.
///
/// Rendering code calls [`SkeletonClipping::clip_start`] when it reaches a slot with a
/// clipping attachment, [`SkeletonClipping::clip_triangles`] for every following slot's mesh,
/// and [`SkeletonClipping::clip_end_with_slot`] after each slot so clipping stops at the
/// attachment's end slot.
#[derive(Clone, Debug, Default)]
pub struct SkeletonClipping {
    triangulator: Triangulator,
    clipping_polygon: Vec<f32>,
    clipping_polygons: Vec<Vec<f32>>,
    clip_output: Vec<f32>,
    scratch: Vec<f32>,
    active: bool,
    end_slot: Option<usize>,
    clipped_vertices: Vec<f32>,
    clipped_uvs: Vec<f32>,
    clipped_triangles: Vec<u16>,
}

impl SkeletonClipping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts clipping with the world polygon of the clipping attachment at `attachment`,
    /// shown on `slot`. Returns the number of convex polygons, or 0 when a clip is already
    /// active or the attachment is not a clipping attachment.
    pub fn clip_start(&mut self, skeleton: &Skeleton, slot: usize, attachment: usize) -> usize {
        if self.active {
            return 0;
        }
        let Some(Attachment::Clipping(clip)) = skeleton.data.attachment(attachment) else {
            return 0;
        };
        let n = clip.vertex.world_vertices_length;
        let mut polygon = std::mem::take(&mut self.clipping_polygon);
        polygon.clear();
        polygon.resize(n, 0.0);
        skeleton.compute_world_vertices(slot, &clip.vertex, 0, n, &mut polygon, 0, 2);
        let count = self.start_with(&polygon, clip.end_slot);
        self.clipping_polygon = polygon;
        count
    }

    /// Starts clipping with an explicit world-space polygon.
    pub fn clip_start_polygon(&mut self, polygon: &[f32], end_slot: Option<usize>) -> usize {
        if self.active {
            return 0;
        }
        self.start_with(polygon, end_slot)
    }

    fn start_with(&mut self, polygon: &[f32], end_slot: Option<usize>) -> usize {
        if polygon.len() < 6 {
            return 0;
        }
        self.active = true;
        self.end_slot = end_slot;

        let mut polygon = polygon.to_vec();
        make_clockwise(&mut polygon);
        let triangles = self.triangulator.triangulate(&polygon);
        self.clipping_polygons = self.triangulator.decompose(&polygon, &triangles);
        for convex in &mut self.clipping_polygons {
            make_clockwise(convex);
            convex.extend([convex[0], convex[1]]);
        }
        self.clipping_polygons.len()
    }

    /// Ends clipping when `slot` is the end slot of the active clipping attachment.
    pub fn clip_end_with_slot(&mut self, slot: usize) {
        if self.active && self.end_slot == Some(slot) {
            self.clip_end();
        }
    }

    pub fn clip_end(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.end_slot = None;
        self.clipping_polygons.clear();
        self.clipping_polygon.clear();
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
    }

    pub fn is_clipping(&self) -> bool {
        self.active
    }

    /// Clips `triangles` over `vertices` (`x, y` pairs) and, when given, their `uvs`. The
    /// results replace the previous contents of [`clipped_vertices`](Self::clipped_vertices),
    /// [`clipped_uvs`](Self::clipped_uvs) and [`clipped_triangles`](Self::clipped_triangles).
    pub fn clip_triangles(&mut self, vertices: &[f32], triangles: &[u16], uvs: Option<&[f32]>) {
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();

        let mut index: u16 = 0;
        for triangle in triangles.chunks_exact(3) {
            let corner = |k: usize| {
                let o = usize::from(triangle[k]) << 1;
                let (u, v) = uvs.map_or((0.0, 0.0), |uvs| (uvs[o], uvs[o + 1]));
                (vertices[o], vertices[o + 1], u, v)
            };
            let (x1, y1, u1, v1) = corner(0);
            let (x2, y2, u2, v2) = corner(1);
            let (x3, y3, u3, v3) = corner(2);

            for p in 0..self.clipping_polygons.len() {
                let clipped = clip_triangle(
                    [x1, y1, x2, y2, x3, y3],
                    &self.clipping_polygons[p],
                    &mut self.clip_output,
                    &mut self.scratch,
                );
                if !clipped {
                    self.clipped_vertices.extend([x1, y1, x2, y2, x3, y3]);
                    if uvs.is_some() {
                        self.clipped_uvs.extend([u1, v1, u2, v2, u3, v3]);
                    }
                    self.clipped_triangles.extend([index, index + 1, index + 2]);
                    index += 3;
                    break;
                }

                let output_count = self.clip_output.len() / 2;
                if output_count == 0 {
                    continue;
                }

                // Barycentric weights of each clipped point inside the source triangle.
                let d0 = y2 - y3;
                let d1 = x3 - x2;
                let d2 = x1 - x3;
                let d4 = y3 - y1;
                let d = 1.0 / (d0 * d2 + d1 * (y1 - y3));
                for point in self.clip_output.chunks_exact(2) {
                    let (x, y) = (point[0], point[1]);
                    self.clipped_vertices.extend([x, y]);
                    if uvs.is_some() {
                        let c0 = x - x3;
                        let c1 = y - y3;
                        let a = (d0 * c0 + d1 * c1) * d;
                        let b = (d4 * c0 + d2 * c1) * d;
                        let c = 1.0 - a - b;
                        self.clipped_uvs
                            .extend([u1 * a + u2 * b + u3 * c, v1 * a + v2 * b + v3 * c]);
                    }
                }

                let last = output_count as u16 - 1;
                for k in 1..last {
                    self.clipped_triangles.extend([index, index + k, index + k + 1]);
                }
                index += last + 1;
            }
        }
    }

    pub fn clipped_vertices(&self) -> &[f32] {
        &self.clipped_vertices
    }

    pub fn clipped_uvs(&self) -> &[f32] {
        &self.clipped_uvs
    }

    pub fn clipped_triangles(&self) -> &[u16] {
        &self.clipped_triangles
    }
}

/// Sutherland-Hodgman clip of one triangle against a convex clockwise polygon whose first
/// vertex is repeated at the end. Returns `false` when the triangle is entirely inside; an
/// empty `output` after `true` means it is entirely outside.
fn clip_triangle(
    triangle: [f32; 6],
    clipping_area: &[f32],
    output: &mut Vec<f32>,
    scratch: &mut Vec<f32>,
) -> bool {
    let mut clipped = false;
    let mut input = std::mem::take(scratch);
    let mut out = std::mem::take(output);
    input.clear();
    input.extend_from_slice(&triangle);
    input.extend_from_slice(&triangle[..2]);
    out.clear();

    let last_edge = clipping_area.len() - 4;
    let mut i = 0;
    loop {
        let edge_x = clipping_area[i];
        let edge_y = clipping_area[i + 1];
        let ex = edge_x - clipping_area[i + 2];
        let ey = edge_y - clipping_area[i + 3];

        let output_start = out.len();
        for segment in input.windows(4).step_by(2) {
            let (input_x, input_y, input_x2, input_y2) =
                (segment[0], segment[1], segment[2], segment[3]);
            let s2 = ey * (edge_x - input_x2) > ex * (edge_y - input_y2);
            let s1 = ey * (edge_x - input_x) - ex * (edge_y - input_y);
            let ix = input_x2 - input_x;
            let iy = input_y2 - input_y;
            let t = s1 / (ix * ey - iy * ex);
            if s1 > 0.0 {
                if s2 {
                    out.extend([input_x2, input_y2]);
                    continue;
                }
                if (0.0..=1.0).contains(&t) {
                    out.extend([input_x + ix * t, input_y + iy * t]);
                } else {
                    out.extend([input_x2, input_y2]);
                    continue;
                }
            } else if s2 {
                if (0.0..=1.0).contains(&t) {
                    out.extend([input_x + ix * t, input_y + iy * t, input_x2, input_y2]);
                } else {
                    out.extend([input_x2, input_y2]);
                    continue;
                }
            }
            clipped = true;
        }

        if output_start == out.len() {
            // All edges outside.
            out.clear();
            *output = out;
            *scratch = input;
            return true;
        }

        out.extend([out[0], out[1]]);
        if i == last_edge {
            break;
        }
        std::mem::swap(&mut input, &mut out);
        out.clear();
        i += 2;
    }

    out.truncate(out.len() - 2);
    *output = out;
    *scratch = input;
    clipped
}

use crate::geometry::{SkeletonClipping, Triangulator, make_clockwise};

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= 0.001, "[{i}] expected {e}, got {a}");
    }
}

#[test]
fn square_triangulates_as_fan_from_last_vertex() {
    let mut triangulator = Triangulator::new();
    let square = [0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];

    let triangles = triangulator.triangulate(&square);
    assert_eq!(triangles, vec![3, 0, 1, 3, 1, 2]);

    let polygons = triangulator.decompose(&square, &triangles);
    assert_eq!(polygons.len(), 1);
    assert_close(&polygons[0], &[0.0, 100.0, 0.0, 0.0, 100.0, 0.0, 100.0, 100.0]);
}

#[test]
fn degenerate_input_yields_no_triangles() {
    let mut triangulator = Triangulator::new();
    assert!(triangulator.triangulate(&[]).is_empty());
    assert!(triangulator.triangulate(&[0.0, 0.0, 1.0, 1.0]).is_empty());
    assert_eq!(triangulator.triangulate(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]), vec![2, 0, 1]);
}

#[test]
fn concave_polygon_decomposes_into_several_convex_parts() {
    let mut triangulator = Triangulator::new();
    // An "L" shape.
    let polygon = [
        0.0, 0.0, 200.0, 0.0, 200.0, 100.0, 100.0, 100.0, 100.0, 200.0, 0.0, 200.0,
    ];
    let triangles = triangulator.triangulate(&polygon);
    assert_eq!(triangles.len(), 12);
    let polygons = triangulator.decompose(&polygon, &triangles);
    assert!(polygons.len() >= 2);
    let points: usize = polygons.iter().map(|p| p.len() / 2).sum();
    assert!(points >= 6);
}

#[test]
fn make_clockwise_reverses_counter_clockwise_input() {
    let mut polygon = [0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0];
    make_clockwise(&mut polygon);
    assert_eq!(polygon, [0.0, 100.0, 100.0, 100.0, 100.0, 0.0, 0.0, 0.0]);

    let before = polygon;
    make_clockwise(&mut polygon);
    assert_eq!(polygon, before);
}

#[test]
fn clip_triangle_against_band() {
    let mut clipper = SkeletonClipping::new();
    let band = [0.0, 50.0, 100.0, 50.0, 100.0, 70.0, 0.0, 70.0];
    assert_eq!(clipper.clip_start_polygon(&band, None), 1);
    assert!(clipper.is_clipping());

    let vertices = [0.0, 0.0, 100.0, 0.0, 50.0, 150.0];
    let uvs = [0.0, 0.0, 1.0, 0.0, 0.5, 1.0];
    clipper.clip_triangles(&vertices, &[0, 1, 2], Some(&uvs));

    assert_close(
        clipper.clipped_vertices(),
        &[83.333328, 50.0, 76.666664, 70.0, 23.333334, 70.0, 16.666672, 50.0],
    );
    assert_close(
        clipper.clipped_uvs(),
        &[0.833333, 0.333333, 0.766667, 0.466667, 0.233333, 0.466667, 0.166667, 0.333333],
    );
    assert_eq!(clipper.clipped_triangles(), &[0, 1, 2, 0, 2, 3]);
}

#[test]
fn triangle_inside_clip_is_kept_whole_and_outside_is_dropped() {
    let mut clipper = SkeletonClipping::new();
    clipper.clip_start_polygon(&[0.0, 0.0, 100.0, 0.0, 100.0, 100.0, 0.0, 100.0], Some(3));

    clipper.clip_triangles(&[10.0, 10.0, 20.0, 10.0, 10.0, 20.0], &[0, 1, 2], None);
    assert_close(clipper.clipped_vertices(), &[10.0, 10.0, 20.0, 10.0, 10.0, 20.0]);
    assert_eq!(clipper.clipped_triangles(), &[0, 1, 2]);
    assert!(clipper.clipped_uvs().is_empty());

    clipper.clip_triangles(&[200.0, 200.0, 300.0, 200.0, 200.0, 300.0], &[0, 1, 2], None);
    assert!(clipper.clipped_vertices().is_empty());
    assert!(clipper.clipped_triangles().is_empty());
}

#[test]
fn clip_ends_only_at_end_slot() {
    let mut clipper = SkeletonClipping::new();
    let square = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];
    assert!(clipper.clip_start_polygon(&square, Some(2)) > 0);
    assert_eq!(clipper.clip_start_polygon(&square, None), 0);

    clipper.clip_end_with_slot(1);
    assert!(clipper.is_clipping());
    clipper.clip_end_with_slot(2);
    assert!(!clipper.is_clipping());
}

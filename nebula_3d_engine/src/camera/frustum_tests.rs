use glam::{Mat4, Vec3};
use crate::camera::bounds::{AABB, BoundingSphere};
use super::*;

fn camera_frustum() -> Frustum {
    // Camera at the origin looking down -Z, 90° vertical FOV
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0);
    Frustum::from_view_projection(&Mat4::IDENTITY, &projection)
}

fn assert_inward(frustum: &Frustum, interior: Vec3) {
    for (i, plane) in frustum.planes().iter().enumerate() {
        assert!(
            plane.distance(interior) > 0.0,
            "plane {} does not face the interior point {:?}", i, interior
        );
    }
}

// ============================================================================
// Definition
// ============================================================================

#[test]
fn test_default_is_clip_volume() {
    let frustum = Frustum::default();
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, 0.5)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, 1.5)), Intersection::Outside);
    assert_eq!(frustum.is_inside_point(Vec3::new(1.5, 0.0, 0.5)), Intersection::Outside);
}

#[test]
fn test_view_projection_planes_point_inward() {
    let frustum = camera_frustum();
    assert_inward(&frustum, Vec3::new(0.0, 0.0, -10.0));

    // Near plane normal faces the view direction
    let near = frustum.planes()[PLANE_NEAR];
    assert!((near.normal - Vec3::NEG_Z).length() < 1e-3);
    let far = frustum.planes()[PLANE_FAR];
    assert!((far.normal - Vec3::Z).length() < 1e-3);
}

#[test]
fn test_vertices_lie_on_near_and_far_planes() {
    let frustum = camera_frustum();
    let vertices = frustum.vertices();
    for v in &vertices[0..4] {
        assert!((v.z + 1.0).abs() < 1e-3);
    }
    for v in &vertices[4..8] {
        assert!((v.z + 100.0).abs() < 0.05);
    }
}

#[test]
fn test_define_with_translated_view() {
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 50.0), Vec3::ZERO, Vec3::Y);
    let frustum = Frustum::from_view_projection(&view, &projection);

    assert_eq!(frustum.is_inside_point(Vec3::ZERO), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, 60.0)), Intersection::Outside);
}

#[test]
fn test_define_perspective_matches_projection() {
    let mut frustum = Frustum::default();
    frustum.define_perspective(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 0.1, 100.0, &Mat4::IDENTITY);

    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -5.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, 5.0)), Intersection::Outside);
    // tan(45°) = 1: at depth 10 the half height is 10
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 9.5, -10.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 10.5, -10.0)), Intersection::Outside);
}

#[test]
fn test_define_perspective_zoom_narrows_view() {
    let mut frustum = Frustum::default();
    frustum.define_perspective(std::f32::consts::FRAC_PI_2, 1.0, 2.0, 0.1, 100.0, &Mat4::IDENTITY);

    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 4.5, -10.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 5.5, -10.0)), Intersection::Outside);
}

#[test]
fn test_define_ortho() {
    let mut frustum = Frustum::default();
    frustum.define_ortho(10.0, 2.0, 1.0, 1.0, 50.0, &Mat4::IDENTITY);

    assert_eq!(frustum.is_inside_point(Vec3::new(9.0, 4.0, -5.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(11.0, 0.0, -5.0)), Intersection::Outside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -0.5)), Intersection::Outside);
}

#[test]
fn test_define_split_keeps_slice() {
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let mut frustum = Frustum::default();
    frustum.define_split(&projection, 10.0, 20.0);

    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -15.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -5.0)), Intersection::Outside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -25.0)), Intersection::Outside);
}

#[test]
fn test_transformed_moves_volume() {
    let frustum = camera_frustum().transformed(&Mat4::from_translation(Vec3::new(100.0, 0.0, 0.0)));

    assert_eq!(frustum.is_inside_point(Vec3::new(100.0, 0.0, -10.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -10.0)), Intersection::Outside);
}

#[test]
fn test_define_box_matches_bounds() {
    let aabb = AABB::new(Vec3::new(-2.0, -1.0, -10.0), Vec3::new(2.0, 1.0, -1.0));
    let mut frustum = Frustum::default();
    frustum.define_box(&aabb, &Mat4::IDENTITY);

    assert_inward(&frustum, aabb.center());
    assert_eq!(frustum.vertices()[0], Vec3::new(2.0, 1.0, -1.0));
    assert_eq!(frustum.vertices()[6], Vec3::new(-2.0, -1.0, -10.0));
    assert_eq!(frustum.is_inside_point(Vec3::new(1.9, 0.9, -9.9)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(2.1, 0.0, -5.0)), Intersection::Outside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -0.5)), Intersection::Outside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, -10.5)), Intersection::Outside);

    let inner = AABB::new(Vec3::new(-1.0, -0.5, -8.0), Vec3::new(1.0, 0.5, -2.0));
    assert_eq!(frustum.is_inside_box(&inner), Intersection::Inside);
    let straddling = AABB::new(Vec3::new(1.0, -0.5, -8.0), Vec3::new(3.0, 0.5, -2.0));
    assert_eq!(frustum.is_inside_box(&straddling), Intersection::Intersects);
}

#[test]
fn test_define_box_follows_transform() {
    let aabb = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let transform = Mat4::from_translation(Vec3::new(0.0, 50.0, 0.0))
        * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4)
        * Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
    let mut frustum = Frustum::default();
    frustum.define_box(&aabb, &transform);

    assert_inward(&frustum, Vec3::new(0.0, 50.0, 0.0));
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 50.5, 0.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::ZERO), Intersection::Outside);
}

// ============================================================================
// Reflected transforms
// ============================================================================

#[test]
fn test_reflected_view_self_corrects_planes() {
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let mirror = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0));
    let frustum = Frustum::from_view_projection(&mirror, &projection);

    assert_inward(&frustum, Vec3::new(0.0, 0.0, -10.0));
    assert_eq!(frustum.is_inside_point(Vec3::new(3.0, 0.0, -10.0)), Intersection::Inside);
    assert_eq!(frustum.is_inside_point(Vec3::new(0.0, 0.0, 10.0)), Intersection::Outside);
}

#[test]
fn test_reflected_rect_transform_self_corrects_planes() {
    let mut frustum = Frustum::default();
    let reflected = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
    frustum.define_perspective(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 0.1, 100.0, &reflected);

    assert_inward(&frustum, Vec3::new(0.0, 0.0, -10.0));
    let sphere = BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
    assert_eq!(frustum.is_inside_sphere(&sphere), Intersection::Inside);
}

// ============================================================================
// Sphere tests
// ============================================================================

#[test]
fn test_sphere_inside_intersects_outside() {
    let frustum = camera_frustum();

    let inside = BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
    assert_eq!(frustum.is_inside_sphere(&inside), Intersection::Inside);

    // Straddles the far plane
    let straddling = BoundingSphere::new(Vec3::new(0.0, 0.0, -100.0), 2.0);
    assert_eq!(frustum.is_inside_sphere(&straddling), Intersection::Intersects);

    let behind = BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0);
    assert_eq!(frustum.is_inside_sphere(&behind), Intersection::Outside);
}

#[test]
fn test_sphere_fast_reports_partial_as_inside() {
    let frustum = camera_frustum();

    let straddling = BoundingSphere::new(Vec3::new(0.0, 0.0, -100.0), 2.0);
    assert_eq!(frustum.is_inside_sphere_fast(&straddling), Intersection::Inside);

    let beyond = BoundingSphere::new(Vec3::new(0.0, 0.0, -110.0), 2.0);
    assert_eq!(frustum.is_inside_sphere_fast(&beyond), Intersection::Outside);
}

// ============================================================================
// Box tests
// ============================================================================

#[test]
fn test_box_centered_in_view_is_inside() {
    let frustum = camera_frustum();
    let aabb = AABB::from_center_half_extents(Vec3::new(0.0, 0.0, -50.0), Vec3::splat(1.0));

    assert_eq!(frustum.is_inside_box(&aabb), Intersection::Inside);
    assert_eq!(frustum.is_inside_box_fast(&aabb), Intersection::Inside);
}

#[test]
fn test_box_behind_far_plane_is_outside() {
    let frustum = camera_frustum();
    let aabb = AABB::from_center_half_extents(Vec3::new(0.0, 0.0, -200.0), Vec3::splat(1.0));

    assert_eq!(frustum.is_inside_box(&aabb), Intersection::Outside);
    assert_eq!(frustum.is_inside_box_fast(&aabb), Intersection::Outside);
}

#[test]
fn test_box_crossing_side_plane_intersects() {
    let frustum = camera_frustum();
    // At depth 10 the right plane is at x = 10
    let aabb = AABB::from_center_half_extents(Vec3::new(10.0, 0.0, -10.0), Vec3::splat(1.0));

    assert_eq!(frustum.is_inside_box(&aabb), Intersection::Intersects);
    assert_eq!(frustum.is_inside_box_fast(&aabb), Intersection::Inside);
}

#[test]
fn test_box_enclosing_frustum_intersects() {
    let frustum = camera_frustum();
    let aabb = AABB::from_center_half_extents(Vec3::ZERO, Vec3::splat(1000.0));

    assert_eq!(frustum.is_inside_box(&aabb), Intersection::Intersects);
}

// ============================================================================
// Distance and projection
// ============================================================================

#[test]
fn test_distance_zero_inside_positive_outside() {
    let frustum = camera_frustum();

    assert_eq!(frustum.distance(Vec3::new(0.0, 0.0, -10.0)), 0.0);
    let d = frustum.distance(Vec3::new(0.0, 0.0, -110.0));
    assert!((d - 10.0).abs() < 0.05);
}

#[test]
fn test_projected_view_frustum_covers_screen() {
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 100.0);
    let mut frustum = Frustum::default();
    frustum.define_from_projection(&projection);

    let rect = frustum.projected(&projection);
    assert!(!rect.is_empty());
    assert!((rect.min.x + 1.0).abs() < 1e-3);
    assert!((rect.max.x - 1.0).abs() < 1e-3);
    assert!((rect.min.y + 1.0).abs() < 1e-3);
    assert!((rect.max.y - 1.0).abs() < 1e-3);
}

#[test]
fn test_projected_split_is_subset() {
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let mut split = Frustum::default();
    split.define_split(&projection, 10.0, 20.0);

    let rect = split.projected(&projection).clipped();
    assert!(rect.min.x >= -1.0 && rect.max.x <= 1.0);
}

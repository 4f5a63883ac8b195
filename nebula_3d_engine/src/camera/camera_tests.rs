use glam::{Mat4, Vec3};
use crate::graphics_device::{Viewport, Rect2D};
use crate::camera::Intersection;
use super::*;

fn create_test_viewport() -> Viewport {
    Viewport {
        x: 0.0,
        y: 0.0,
        width: 1920.0,
        height: 1080.0,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

fn create_test_camera() -> Camera {
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0);
    Camera::new(view, proj, create_test_viewport())
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_camera_new() {
    let camera = create_test_camera();

    assert_eq!(camera.viewport().width, 1920.0);
    assert!(camera.scissor().is_none());
    assert_eq!(
        camera.view_projection_matrix(),
        *camera.projection_matrix() * *camera.view_matrix()
    );
}

#[test]
fn test_camera_position_from_view() {
    let camera = create_test_camera();
    assert!((camera.position() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
}

#[test]
fn test_camera_frustum_follows_view() {
    let mut camera = create_test_camera();
    assert_eq!(camera.frustum().is_inside_point(Vec3::ZERO), Intersection::Inside);

    // Turn around: the origin is now behind the camera
    camera.set_view(Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 10.0), Vec3::Y));
    assert_eq!(camera.frustum().is_inside_point(Vec3::ZERO), Intersection::Outside);
}

#[test]
fn test_camera_frustum_follows_projection() {
    let mut camera = create_test_camera();
    let far_point = Vec3::new(0.0, 0.0, -50.0);
    assert_eq!(camera.frustum().is_inside_point(far_point), Intersection::Inside);

    camera.set_projection(Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 20.0));
    assert_eq!(camera.frustum().is_inside_point(far_point), Intersection::Outside);
}

// ============================================================================
// Scissor
// ============================================================================

#[test]
fn test_effective_scissor_defaults_to_viewport() {
    let camera = create_test_camera();
    let scissor = camera.effective_scissor();
    assert_eq!(scissor, Rect2D { x: 0, y: 0, width: 1920, height: 1080 });
}

#[test]
fn test_explicit_scissor() {
    let mut camera = create_test_camera();
    let rect = Rect2D { x: 10, y: 20, width: 100, height: 50 };
    camera.set_scissor(Some(rect));
    assert_eq!(camera.effective_scissor(), rect);
    camera.set_scissor(None);
    assert_eq!(camera.effective_scissor().width, 1920);
}

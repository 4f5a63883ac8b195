/// Camera - low-level passive data container.
///
/// The caller (game engine) computes the view and projection matrices and
/// the viewport; the camera keeps its world-space frustum in sync with them
/// so the culler can read it once per view per frame.
///
/// The engine does NOT store or manage cameras. They are tools provided
/// by the engine, owned and driven by the caller.

use glam::{Mat4, Vec3};
use crate::graphics_device::{Viewport, Rect2D};
use super::frustum::Frustum;

/// Low-level camera.
///
/// The frustum is rebuilt whenever the view or projection changes and is
/// immutable for the duration of a visibility pass.
#[derive(Debug, Clone)]
pub struct Camera {
    view_matrix: Mat4,
    projection_matrix: Mat4,
    frustum: Frustum,
    position: Vec3,
    viewport: Viewport,
    scissor: Option<Rect2D>,
}

impl Camera {
    /// Create a new camera with the given parameters.
    ///
    /// The scissor defaults to `None` (same as viewport).
    pub fn new(view: Mat4, projection: Mat4, viewport: Viewport) -> Self {
        let mut camera = Self {
            view_matrix: view,
            projection_matrix: projection,
            frustum: Frustum::default(),
            position: Vec3::ZERO,
            viewport,
            scissor: None,
        };
        camera.rebuild();
        camera
    }

    fn rebuild(&mut self) {
        self.frustum = Frustum::from_view_projection(&self.view_matrix, &self.projection_matrix);
        self.position = self.view_matrix.inverse().w_axis.truncate();
    }

    // ===== GETTERS =====

    /// View matrix (inverse of the camera's world transform).
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }

    /// Projection matrix (perspective or orthographic).
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }

    /// Combined view-projection matrix (projection * view).
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    /// World-space frustum.
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// World-space eye position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scissor(&self) -> Option<&Rect2D> {
        self.scissor.as_ref()
    }

    /// Effective scissor: explicit scissor or viewport bounds as Rect2D.
    pub fn effective_scissor(&self) -> Rect2D {
        self.scissor.unwrap_or(Rect2D {
            x: self.viewport.x as i32,
            y: self.viewport.y as i32,
            width: self.viewport.width as u32,
            height: self.viewport.height as u32,
        })
    }

    // ===== SETTERS =====

    /// Set the view matrix and rebuild the frustum.
    pub fn set_view(&mut self, matrix: Mat4) {
        self.view_matrix = matrix;
        self.rebuild();
    }

    /// Set the projection matrix and rebuild the frustum.
    pub fn set_projection(&mut self, matrix: Mat4) {
        self.projection_matrix = matrix;
        self.rebuild();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Set the scissor rectangle. `None` means same as viewport.
    pub fn set_scissor(&mut self, scissor: Option<Rect2D>) {
        self.scissor = scissor;
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;

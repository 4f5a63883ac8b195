/// Frustum - six-plane convex view volume for visibility culling.
///
/// The frustum keeps its 8 corner vertices and derives the 6 planes from
/// triples of corners. Plane normals always point inward: a point is inside
/// when its signed distance to every plane is non-negative.
///
/// Conventions follow glam's right-handed helpers: the camera looks down -Z
/// in view space, and clip-space depth runs from 0 (near) to 1 (far).

use glam::{Mat4, Vec2, Vec3, Vec4};
use super::bounds::{AABB, BoundingSphere, ScreenRect};
use super::plane::Plane;

/// Frustum plane indices
pub const PLANE_NEAR: usize = 0;
pub const PLANE_LEFT: usize = 1;
pub const PLANE_RIGHT: usize = 2;
pub const PLANE_UP: usize = 3;
pub const PLANE_DOWN: usize = 4;
pub const PLANE_FAR: usize = 5;

pub const NUM_FRUSTUM_PLANES: usize = 6;
pub const NUM_FRUSTUM_VERTICES: usize = 8;

/// Closest view-space depth used when projecting frustum edges.
const MIN_NEAR_CLIP: f32 = 0.01;

/// Result of a 3-way visibility classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intersection {
    /// Entirely outside the frustum
    Outside,
    /// Entirely inside the frustum
    Inside,
    /// Straddles at least one plane
    Intersects,
}

/// Six-plane convex volume with its eight corners.
///
/// Vertices 0..4 are the near rectangle and 4..8 the far rectangle, each in
/// the order (+x,+y), (+x,-y), (-x,-y), (-x,+y).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Plane; NUM_FRUSTUM_PLANES],
    vertices: [Vec3; NUM_FRUSTUM_VERTICES],
}

impl Default for Frustum {
    /// The canonical clip volume: x, y in [-1, 1], z in [0, 1].
    fn default() -> Self {
        let mut frustum = Self::empty();
        frustum.define_from_projection(&Mat4::IDENTITY);
        frustum
    }
}

impl Frustum {
    fn empty() -> Self {
        let plane = Plane::from_vec4(Vec4::ZERO);
        Self {
            planes: [plane; NUM_FRUSTUM_PLANES],
            vertices: [Vec3::ZERO; NUM_FRUSTUM_VERTICES],
        }
    }

    /// World-space frustum of a camera.
    pub fn from_view_projection(view: &Mat4, projection: &Mat4) -> Self {
        let mut frustum = Self::empty();
        frustum.define(view, projection);
        frustum
    }

    // ===== DEFINITION =====

    /// Define from view and projection matrices (world-space result).
    pub fn define(&mut self, view: &Mat4, projection: &Mat4) {
        self.define_clip_cube(&(*projection * *view).inverse(), 0.0, 1.0);
    }

    /// Define from a projection matrix only (view-space result).
    pub fn define_from_projection(&mut self, projection: &Mat4) {
        self.define_clip_cube(&projection.inverse(), 0.0, 1.0);
    }

    /// Define from near and far rectangles.
    ///
    /// `near` and `far` hold (half width, half height, distance) in the local
    /// space of `transform`; the rectangles are placed at `-distance` on Z.
    pub fn define_rects(&mut self, near: Vec3, far: Vec3, transform: &Mat4) {
        let near_z = -near.z;
        let far_z = -far.z;
        let corners = [
            Vec3::new(near.x, near.y, near_z),
            Vec3::new(near.x, -near.y, near_z),
            Vec3::new(-near.x, -near.y, near_z),
            Vec3::new(-near.x, near.y, near_z),
            Vec3::new(far.x, far.y, far_z),
            Vec3::new(far.x, -far.y, far_z),
            Vec3::new(-far.x, -far.y, far_z),
            Vec3::new(-far.x, far.y, far_z),
        ];
        for (vertex, corner) in self.vertices.iter_mut().zip(corners) {
            *vertex = transform.transform_point3(corner);
        }
        self.update_planes();
    }

    /// Define from a box in the local space of `transform`.
    ///
    /// The box's max-Z face is the near rectangle, matching a camera looking
    /// down -Z. Useful for orthographic shadow volumes fitted to bounds.
    pub fn define_box(&mut self, aabb: &AABB, transform: &Mat4) {
        let (min, max) = (aabb.min, aabb.max);
        let corners = [
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
        ];
        for (vertex, corner) in self.vertices.iter_mut().zip(corners) {
            *vertex = transform.transform_point3(corner);
        }
        self.update_planes();
    }

    /// Define a perspective frustum.
    ///
    /// # Arguments
    ///
    /// * `fov_y` - Full vertical field of view in radians
    /// * `aspect` - Width / height
    /// * `zoom` - Zoom factor (divides the view size)
    /// * `near` - Near distance, clamped to >= 0
    /// * `far` - Far distance, clamped to >= near
    /// * `transform` - Camera world transform
    pub fn define_perspective(
        &mut self,
        fov_y: f32,
        aspect: f32,
        zoom: f32,
        near: f32,
        far: f32,
        transform: &Mat4,
    ) {
        let near = near.max(0.0);
        let far = far.max(near);
        let half_view_size = (fov_y * 0.5).tan() / zoom;

        let near_rect = Vec3::new(near * half_view_size * aspect, near * half_view_size, near);
        let far_rect = Vec3::new(far * half_view_size * aspect, far * half_view_size, far);
        self.define_rects(near_rect, far_rect, transform);
    }

    /// Define an orthographic frustum.
    ///
    /// `ortho_size` is the full view height in world units.
    pub fn define_ortho(
        &mut self,
        ortho_size: f32,
        aspect: f32,
        zoom: f32,
        near: f32,
        far: f32,
        transform: &Mat4,
    ) {
        let near = near.max(0.0);
        let far = far.max(near);
        let half_view_size = ortho_size * 0.5 / zoom;

        let half_width = half_view_size * aspect;
        self.define_rects(
            Vec3::new(half_width, half_view_size, near),
            Vec3::new(half_width, half_view_size, far),
            transform,
        );
    }

    /// Define the slice of a projection between two view distances (view space).
    ///
    /// Used for cascaded shadow splits.
    pub fn define_split(&mut self, projection: &Mat4, near: f32, far: f32) {
        let near_clip = *projection * Vec4::new(0.0, 0.0, -near, 1.0);
        let far_clip = *projection * Vec4::new(0.0, 0.0, -far, 1.0);
        self.define_clip_cube(
            &projection.inverse(),
            near_clip.z / near_clip.w,
            far_clip.z / far_clip.w,
        );
    }

    /// Corners of the clip-space box `[-1,1]² x [near_z, far_z]` through `inverse`.
    fn define_clip_cube(&mut self, inverse: &Mat4, near_z: f32, far_z: f32) {
        let corners = [
            Vec3::new(1.0, 1.0, near_z),
            Vec3::new(1.0, -1.0, near_z),
            Vec3::new(-1.0, -1.0, near_z),
            Vec3::new(-1.0, 1.0, near_z),
            Vec3::new(1.0, 1.0, far_z),
            Vec3::new(1.0, -1.0, far_z),
            Vec3::new(-1.0, -1.0, far_z),
            Vec3::new(-1.0, 1.0, far_z),
        ];
        for (vertex, corner) in self.vertices.iter_mut().zip(corners) {
            *vertex = inverse.project_point3(corner);
        }
        self.update_planes();
    }

    /// Frustum with every vertex transformed by `transform`.
    pub fn transformed(&self, transform: &Mat4) -> Frustum {
        let mut frustum = *self;
        for vertex in frustum.vertices.iter_mut() {
            *vertex = transform.transform_point3(*vertex);
        }
        frustum.update_planes();
        frustum
    }

    /// Rebuild the planes from the vertices.
    ///
    /// A reflected transform inverts the winding of every triangle, which
    /// makes all six normals point outward; this is detected through a far
    /// corner that must be on the inner side of the near plane, and fixed by
    /// negating all planes.
    fn update_planes(&mut self) {
        let v = &self.vertices;
        self.planes[PLANE_NEAR] = Plane::from_points(v[2], v[1], v[0]);
        self.planes[PLANE_LEFT] = Plane::from_points(v[3], v[7], v[6]);
        self.planes[PLANE_RIGHT] = Plane::from_points(v[1], v[5], v[4]);
        self.planes[PLANE_UP] = Plane::from_points(v[0], v[4], v[7]);
        self.planes[PLANE_DOWN] = Plane::from_points(v[6], v[5], v[1]);
        self.planes[PLANE_FAR] = Plane::from_points(v[5], v[6], v[7]);

        if self.planes[PLANE_NEAR].distance(self.vertices[5]) < 0.0 {
            for plane in self.planes.iter_mut() {
                *plane = plane.flipped();
            }
        }
    }

    // ===== ACCESSORS =====

    pub fn planes(&self) -> &[Plane; NUM_FRUSTUM_PLANES] {
        &self.planes
    }

    pub fn vertices(&self) -> &[Vec3; NUM_FRUSTUM_VERTICES] {
        &self.vertices
    }

    // ===== TESTS =====

    /// Classify a point (Inside or Outside).
    pub fn is_inside_point(&self, point: Vec3) -> Intersection {
        if self.planes.iter().any(|plane| plane.distance(point) < 0.0) {
            Intersection::Outside
        } else {
            Intersection::Inside
        }
    }

    /// Classify a sphere.
    ///
    /// Planes are visited in index order (near first) and the test returns
    /// Outside at the first plane the sphere is completely behind.
    pub fn is_inside_sphere(&self, sphere: &BoundingSphere) -> Intersection {
        let mut all_inside = true;
        for plane in &self.planes {
            let dist = plane.distance(sphere.center);
            if dist < -sphere.radius {
                return Intersection::Outside;
            } else if dist < sphere.radius {
                all_inside = false;
            }
        }
        if all_inside { Intersection::Inside } else { Intersection::Intersects }
    }

    /// Sphere test that only separates Outside from the rest.
    ///
    /// Returns Inside for both fully and partially visible spheres.
    pub fn is_inside_sphere_fast(&self, sphere: &BoundingSphere) -> Intersection {
        for plane in &self.planes {
            if plane.distance(sphere.center) < -sphere.radius {
                return Intersection::Outside;
            }
        }
        Intersection::Inside
    }

    /// Classify an axis-aligned box.
    ///
    /// The half extents are projected on each plane's absolute normal, so each
    /// plane costs two dot products instead of eight corner tests.
    pub fn is_inside_box(&self, aabb: &AABB) -> Intersection {
        let center = aabb.center();
        let edge = center - aabb.min;
        let mut all_inside = true;
        for plane in &self.planes {
            let dist = plane.distance(center);
            let abs_dist = plane.abs_normal.dot(edge);
            if dist < -abs_dist {
                return Intersection::Outside;
            } else if dist < abs_dist {
                all_inside = false;
            }
        }
        if all_inside { Intersection::Inside } else { Intersection::Intersects }
    }

    /// Box test that only separates Outside from the rest.
    pub fn is_inside_box_fast(&self, aabb: &AABB) -> Intersection {
        let center = aabb.center();
        let edge = center - aabb.min;
        for plane in &self.planes {
            if plane.distance(center) < -plane.abs_normal.dot(edge) {
                return Intersection::Outside;
            }
        }
        Intersection::Inside
    }

    /// Distance from a point to the frustum; 0 when the point is inside.
    pub fn distance(&self, point: Vec3) -> f32 {
        self.planes
            .iter()
            .fold(0.0f32, |acc, plane| acc.max(-plane.distance(point)))
    }

    /// Screen-space (NDC) bounds of a view-space frustum under `projection`.
    ///
    /// Edges crossing the camera plane are clipped at a minimal depth before
    /// projection. The result is not clamped; see `ScreenRect::clipped`.
    pub fn projected(&self, projection: &Mat4) -> ScreenRect {
        let v = &self.vertices;
        let edges = [
            (0, 4), (1, 5), (2, 6), (3, 7),
            (4, 5), (5, 6), (6, 7), (7, 4),
        ];
        let mut rect = ScreenRect::EMPTY;
        for (a, b) in edges {
            project_and_merge_edge(v[a], v[b], &mut rect, projection);
        }
        rect
    }
}

/// Project a view-space edge and grow `rect`, clipping it against the camera plane.
fn project_and_merge_edge(mut v0: Vec3, mut v1: Vec3, rect: &mut ScreenRect, projection: &Mat4) {
    // View-space depth is -z for a right-handed camera
    let depth = |v: Vec3| -v.z;

    if depth(v0) < MIN_NEAR_CLIP && depth(v1) < MIN_NEAR_CLIP {
        return;
    }
    if depth(v1) < MIN_NEAR_CLIP {
        std::mem::swap(&mut v0, &mut v1);
    }
    if depth(v0) < MIN_NEAR_CLIP {
        let t = (MIN_NEAR_CLIP - depth(v0)) / (depth(v1) - depth(v0));
        v0 += (v1 - v0) * t;
    }

    let p0 = projection.project_point3(v0);
    let p1 = projection.project_point3(v1);
    rect.merge(Vec2::new(p0.x, p0.y));
    rect.merge(Vec2::new(p1.x, p1.y));
}

#[cfg(test)]
#[path = "frustum_tests.rs"]
mod tests;

/// Plane - oriented half-space used by the frustum.
///
/// The plane satisfies `dot(normal, p) + d = 0`. Points with a positive signed
/// distance lie on the side the normal points to.

use glam::{Mat4, Vec3, Vec4};

/// Oriented plane with a cached absolute normal.
///
/// `abs_normal` is used by the box test to project a box's half extents onto
/// the plane normal without visiting the eight corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal
    pub normal: Vec3,
    /// Component-wise absolute value of `normal`
    pub abs_normal: Vec3,
    /// Signed offset: `-dot(normal, point_on_plane)`
    pub d: f32,
}

impl Plane {
    /// Plane through three points, normal = normalize((v1 - v0) x (v2 - v0)).
    ///
    /// Degenerate (collinear) points yield a zero normal; every distance to
    /// such a plane is `d`.
    pub fn from_points(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        Self::from_unit_normal_point(normal, v0)
    }

    /// Plane from a normal (normalized here) and a point on the plane.
    pub fn from_normal_point(normal: Vec3, point: Vec3) -> Self {
        Self::from_unit_normal_point(normal.normalize_or_zero(), point)
    }

    /// Plane from the (A, B, C, D) coefficients, rescaled to a unit normal.
    pub fn from_vec4(coefficients: Vec4) -> Self {
        let normal = coefficients.truncate();
        let len = normal.length();
        if len > 0.0 {
            let normal = normal / len;
            Self { normal, abs_normal: normal.abs(), d: coefficients.w / len }
        } else {
            Self { normal: Vec3::ZERO, abs_normal: Vec3::ZERO, d: coefficients.w }
        }
    }

    fn from_unit_normal_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            abs_normal: normal.abs(),
            d: -normal.dot(point),
        }
    }

    /// Signed distance from `point` to the plane.
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Same plane with the opposite orientation.
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            abs_normal: self.abs_normal,
            d: -self.d,
        }
    }

    /// Plane transformed by an affine matrix (uses the inverse transpose).
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let coefficients = matrix.inverse().transpose() * self.to_vec4();
        Self::from_vec4(coefficients)
    }

    /// Plane as (A, B, C, D) coefficients.
    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.d)
    }
}

#[cfg(test)]
#[path = "plane_tests.rs"]
mod tests;

/// Bounding volumes for visibility tests.

use glam::{Mat4, Vec2, Vec3};

// ===== AABB =====

/// Axis-Aligned Bounding Box
///
/// Drawables keep a world-space AABB; the culler derives a bounding sphere
/// from it for the fast rejection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner (x, y, z)
    pub min: Vec3,
    /// Maximum corner (x, y, z)
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self { min: center - half_extents, max: center + half_extents }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Transform this AABB by a matrix, returning a new AABB.
    ///
    /// Uses the Arvo method: projects each matrix axis onto the AABB extents
    /// for an exact (tight) result without transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        AABB { min: new_min, max: new_max }
    }

    /// Smallest AABB enclosing both boxes.
    pub fn merge(&self, other: &AABB) -> AABB {
        AABB { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

// ===== BOUNDING SPHERE =====

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere circumscribing the box (radius = half diagonal).
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self { center: aabb.center(), radius: aabb.half_extents().length() }
    }
}

// ===== SCREEN RECT =====

/// 2D rectangle in normalized device coordinates.
///
/// Starts empty (min = +inf, max = -inf) and grows with `merge`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl ScreenRect {
    pub const EMPTY: ScreenRect = ScreenRect {
        min: Vec2::splat(f32::INFINITY),
        max: Vec2::splat(f32::NEG_INFINITY),
    };

    pub fn merge(&mut self, point: Vec2) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Rectangle clamped to the [-1, 1] NDC square.
    pub fn clipped(&self) -> ScreenRect {
        if self.is_empty() {
            return *self;
        }
        ScreenRect {
            min: self.min.clamp(Vec2::NEG_ONE, Vec2::ONE),
            max: self.max.clamp(Vec2::NEG_ONE, Vec2::ONE),
        }
    }
}

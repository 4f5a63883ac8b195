//! Camera culling.
//!
//! A Culler determines which drawables are visible from a camera and
//! produces the sorted per-view draw list consumed by the batch recorder.

use crate::camera::{BoundingSphere, Camera, Intersection};
use super::drawable::Drawable;
use super::draw_list::DrawList;

/// Strategy for determining visible batches from a camera.
///
/// Called once per view per frame. `&mut self` allows stateful
/// implementations (statistics, caching) across frames.
pub trait Culler: Send + Sync {
    /// Cull the drawables against the camera into `out` (cleared first), then sort it.
    fn cull_into(&mut self, camera: &Camera, drawables: &[Drawable], out: &mut DrawList);

    /// Cull into a fresh draw list.
    fn cull(&mut self, camera: &Camera, drawables: &[Drawable]) -> DrawList {
        let mut list = DrawList::new();
        self.cull_into(camera, drawables, &mut list);
        list
    }
}

/// Counters of the last cull
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullStats {
    pub tested: usize,
    pub rejected_by_sphere: usize,
    pub rejected_by_box: usize,
    pub visible: usize,
}

/// Frustum culler: bounding sphere rejection, then the box test.
///
/// The sphere test is cheaper and rejects most invisible drawables; the box
/// test only runs on survivors to remove the sphere's false positives.
#[derive(Default)]
pub struct FrustumCuller {
    stats: CullStats,
}

impl FrustumCuller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CullStats {
        self.stats
    }
}

impl Culler for FrustumCuller {
    fn cull_into(&mut self, camera: &Camera, drawables: &[Drawable], out: &mut DrawList) {
        out.clear();
        let frustum = camera.frustum();
        let eye = camera.position();
        let mut stats = CullStats::default();

        for drawable in drawables.iter().filter(|d| d.is_enabled()) {
            stats.tested += 1;
            let bounds = drawable.world_bounds();

            if frustum.is_inside_sphere_fast(&BoundingSphere::from_aabb(bounds)) == Intersection::Outside {
                stats.rejected_by_sphere += 1;
                continue;
            }
            if frustum.is_inside_box(bounds) == Intersection::Outside {
                stats.rejected_by_box += 1;
                continue;
            }

            stats.visible += 1;
            let distance = eye.distance(bounds.center());
            for batch in drawable.batches() {
                let mut batch = batch.clone();
                batch.distance = distance;
                batch.drawable = drawable.index();
                out.push(batch);
            }
        }

        out.sort();
        self.stats = stats;
        crate::engine_trace!(
            "nebula3d::scene",
            "Culled {} drawables: {} visible, {} batches",
            stats.tested, stats.visible, out.len()
        );
    }
}

#[cfg(test)]
#[path = "culler_tests.rs"]
mod tests;

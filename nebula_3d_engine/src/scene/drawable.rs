/// Drawables - scene-owned records the culler tests against a view.

use crate::camera::AABB;
use super::draw_batch::DrawBatch;

/// Index of a drawable in the scene's flat drawable array.
///
/// Batches refer back to their drawable through this index; there is no
/// owning pointer from a batch or drawable to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableIndex(pub u32);

/// A visible object: world bounds plus the batches it draws.
///
/// The batch `distance` fields are ignored here and filled in by the culler.
pub struct Drawable {
    index: DrawableIndex,
    world_bounds: AABB,
    batches: Vec<DrawBatch>,
    enabled: bool,
}

impl Drawable {
    pub fn new(index: DrawableIndex, world_bounds: AABB, batches: Vec<DrawBatch>) -> Self {
        Self { index, world_bounds, batches, enabled: true }
    }

    pub fn index(&self) -> DrawableIndex {
        self.index
    }

    pub fn world_bounds(&self) -> &AABB {
        &self.world_bounds
    }

    pub fn set_world_bounds(&mut self, bounds: AABB) {
        self.world_bounds = bounds;
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    pub fn batches_mut(&mut self) -> &mut Vec<DrawBatch> {
        &mut self.batches
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled drawables are skipped by the culler.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

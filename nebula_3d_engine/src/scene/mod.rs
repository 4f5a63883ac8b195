//! Scene-facing side of the frame pipeline
//!
//! Provides draw batches, the drawable records the culler tests, the frustum
//! culler, and the sorted per-view draw list.

mod draw_batch;
mod drawable;
mod draw_list;
mod culler;

#[cfg(test)]
pub(crate) mod test_batches;

pub use draw_batch::{
    BlendCategory, GeometryKind, Geometry, IndexBinding, Material, DrawBatch,
};
pub use drawable::{Drawable, DrawableIndex};
pub use draw_list::DrawList;
pub use culler::{Culler, CullStats, FrustumCuller};

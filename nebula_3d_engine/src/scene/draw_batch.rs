/// Draw batches - one draw call's worth of geometry, material and transforms.
///
/// Batches are produced by drawables every frame, owned by the per-view draw
/// list for exactly one frame, and never mutated once inserted.

use std::sync::Arc;
use glam::Mat4;
use crate::graphics_device::{Buffer, BindingGroupHandle, IndexType, PipelineHandle};
use super::drawable::DrawableIndex;

/// Blend category, decides the recording path of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendCategory {
    /// Recorded in parallel, sorted by state then front-to-back
    Opaque,
    /// Recorded in parallel after the opaque batches
    AlphaTest,
    /// Recorded serially, strictly back-to-front
    AlphaBlend,
}

/// Geometry kind with per-kind data.
///
/// The recorder branches on this tag to decide how transforms reach the GPU
/// and which draw command is issued.
#[derive(Clone)]
pub enum GeometryKind {
    /// One world transform, uploaded as a per-draw uniform
    Static,
    /// Bone palette (all `world_transforms`), uploaded as a per-draw uniform
    Skinned,
    /// One instance per world transform, streamed as per-instance vertex data
    Instanced,
    /// Camera-facing quads; one transform, like Static
    Billboard,
    /// Quads rotating around a fixed axis; one transform, like Static
    DirectionalBillboard,
    /// Draw parameters read from a GPU buffer
    Indirect {
        buffer: Arc<dyn Buffer>,
        offset: u64,
        draw_count: u32,
        stride: u32,
    },
}

impl GeometryKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Static => "static",
            GeometryKind::Skinned => "skinned",
            GeometryKind::Instanced => "instanced",
            GeometryKind::Billboard => "billboard",
            GeometryKind::DirectionalBillboard => "directional_billboard",
            GeometryKind::Indirect { .. } => "indirect",
        }
    }
}

/// Index buffer binding of a geometry
#[derive(Clone)]
pub struct IndexBinding {
    pub buffer: Arc<dyn Buffer>,
    pub offset: u64,
    pub index_type: IndexType,
}

/// Vertex/index buffers and the range drawn from them.
///
/// With an index buffer, `first`/`count` address indices; without one they
/// address vertices.
#[derive(Clone)]
pub struct Geometry {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub vertex_offset: u64,
    pub index: Option<IndexBinding>,
    pub first: u32,
    pub count: u32,
    /// Added to each index before fetching the vertex
    pub base_vertex: i32,
}

/// Pipeline and resource sets shared by many batches.
#[derive(Clone)]
pub struct Material {
    pub pipeline: PipelineHandle,
    /// Bound at consecutive sets starting at `MATERIAL_SET_BASE`
    pub binding_groups: Vec<BindingGroupHandle>,
    /// State sort key (pipeline / texture set), lower draws first
    pub sort_key: u32,
    pub blend: BlendCategory,
}

/// One entry of a draw list.
#[derive(Clone)]
pub struct DrawBatch {
    /// Distance from the camera to the drawable's bounds center
    pub distance: f32,
    /// Back-reference into the scene-owned drawable array
    pub drawable: DrawableIndex,
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
    /// One matrix for static kinds, the bone palette for skinned, one per instance for instanced
    pub world_transforms: Arc<[Mat4]>,
    /// Raw per-instance vertex data; replaces the transforms as instance stream when set
    pub instance_data: Option<Arc<[u8]>>,
    pub kind: GeometryKind,
}

impl DrawBatch {
    pub fn blend(&self) -> BlendCategory {
        self.material.blend
    }

    /// Number of instances the draw command renders
    pub fn instance_count(&self) -> u32 {
        match self.kind {
            GeometryKind::Instanced => self.world_transforms.len().max(1) as u32,
            _ => 1,
        }
    }
}

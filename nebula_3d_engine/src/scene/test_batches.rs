//! Batch builders shared by the scene and frame unit tests.

use std::sync::Arc;
use glam::Mat4;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{
    BufferDesc, BufferUsage, GraphicsDevice, IndexType, MemoryLocation, PipelineHandle,
    BindingGroupHandle,
};
use super::{BlendCategory, DrawBatch, DrawableIndex, Geometry, GeometryKind, IndexBinding, Material};

/// Indexed geometry whose `first` index doubles as the batch id in draw sequences.
pub fn geometry(device: &MockGraphicsDevice, first: u32) -> Arc<Geometry> {
    let vb = device
        .create_buffer(&BufferDesc {
            size: 1024,
            usage: BufferUsage::VERTEX,
            location: MemoryLocation::GpuOnly,
            name: "test_vb".to_string(),
        })
        .unwrap();
    let ib = device
        .create_buffer(&BufferDesc {
            size: 1024,
            usage: BufferUsage::INDEX,
            location: MemoryLocation::GpuOnly,
            name: "test_ib".to_string(),
        })
        .unwrap();
    Arc::new(Geometry {
        vertex_buffer: vb,
        vertex_offset: 0,
        index: Some(IndexBinding { buffer: ib, offset: 0, index_type: IndexType::U32 }),
        first,
        count: 3,
        base_vertex: 0,
    })
}

pub fn material(sort_key: u32, blend: BlendCategory) -> Arc<Material> {
    Arc::new(Material {
        pipeline: PipelineHandle { pipeline: 1000 + sort_key as u64, layout: 1 },
        binding_groups: vec![BindingGroupHandle(500 + sort_key as u64)],
        sort_key,
        blend,
    })
}

pub fn batch(
    device: &MockGraphicsDevice,
    first: u32,
    distance: f32,
    material: Arc<Material>,
    kind: GeometryKind,
) -> DrawBatch {
    DrawBatch {
        distance,
        drawable: DrawableIndex(first),
        geometry: geometry(device, first),
        material,
        world_transforms: Arc::from(vec![Mat4::IDENTITY]),
        instance_data: None,
        kind,
    }
}

/// `count` opaque static batches with ids `0..count`, all sharing one geometry buffer pair
pub fn opaque_batches(device: &MockGraphicsDevice, count: u32) -> Vec<DrawBatch> {
    let mat = material(0, BlendCategory::Opaque);
    let base = geometry(device, 0);
    (0..count)
        .map(|i| DrawBatch {
            distance: i as f32,
            drawable: DrawableIndex(i),
            geometry: Arc::new(Geometry { first: i, ..(*base).clone() }),
            material: Arc::clone(&mat),
            world_transforms: Arc::from(vec![Mat4::from_translation(glam::Vec3::splat(i as f32))]),
            instance_data: None,
            kind: GeometryKind::Static,
        })
        .collect()
}

/// Conversions from engine device types to Vulkan types

use ash::vk;
use nebula_3d_engine::nebula3d::device::{
    BufferUsage, ClearValue, CommandListLevel, IndexType, MemoryLocation, Rect2D, ShaderStage,
    SubpassContents, Viewport,
};

pub(crate) fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    let table = [
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::UNIFORM_TEXEL, vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER),
        (BufferUsage::STORAGE_TEXEL, vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
    ];
    for (engine, vulkan) in table {
        if usage.contains(engine) {
            flags |= vulkan;
        }
    }
    flags
}

pub(crate) fn memory_location_to_gpu_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

pub(crate) fn command_list_level_to_vk(level: CommandListLevel) -> vk::CommandBufferLevel {
    match level {
        CommandListLevel::Primary => vk::CommandBufferLevel::PRIMARY,
        CommandListLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
    }
}

pub(crate) fn subpass_contents_to_vk(contents: SubpassContents) -> vk::SubpassContents {
    match contents {
        SubpassContents::Inline => vk::SubpassContents::INLINE,
        SubpassContents::SecondaryCommandBuffers => vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
    }
}

pub(crate) fn index_type_to_vk(index_type: IndexType) -> vk::IndexType {
    match index_type {
        IndexType::U16 => vk::IndexType::UINT16,
        IndexType::U32 => vk::IndexType::UINT32,
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::AllGraphics => vk::ShaderStageFlags::ALL_GRAPHICS,
    }
}

pub(crate) fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: *color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: *depth, stencil: *stencil },
        },
    }
}

pub(crate) fn viewport_to_vk(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport::default()
        .x(viewport.x)
        .y(viewport.y)
        .width(viewport.width)
        .height(viewport.height)
        .min_depth(viewport.min_depth)
        .max_depth(viewport.max_depth)
}

pub(crate) fn rect_to_vk(rect: &Rect2D) -> vk::Rect2D {
    vk::Rect2D::default()
        .offset(vk::Offset2D { x: rect.x, y: rect.y })
        .extent(vk::Extent2D { width: rect.width, height: rect.height })
}

/// Round a raw device limit to a power of two (at least 1)
pub(crate) fn limit_alignment(value: u64) -> u64 {
    value.max(1).next_power_of_two()
}

#[cfg(test)]
#[path = "vulkan_convert_tests.rs"]
mod tests;

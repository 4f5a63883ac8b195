/// GraphicsDevice trait - the explicit-API device the frame pipeline runs on
///
/// The engine core never reaches a device through global state: the transient
/// allocators, the frame-resource ring, the command-buffer pool and the batch
/// recorder all receive an `Arc<dyn GraphicsDevice>` at construction.

use std::sync::Arc;
use std::time::Duration;
use crate::error::Result;
use crate::graphics_device::{Buffer, BufferDesc, CommandList, CommandListLevel};

/// Opaque fence handle (VkFence as u64 for Vulkan)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

/// Opaque semaphore handle (VkSemaphore as u64 for Vulkan)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(pub u64);

/// Device limits consumed by the allocators
///
/// Alignments are in bytes and always a power of two (1 when the API has no minimum).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: u64,
    pub min_storage_buffer_offset_alignment: u64,
    pub min_texel_buffer_offset_alignment: u64,
    pub min_vertex_buffer_offset_alignment: u64,
    pub min_index_buffer_offset_alignment: u64,
    pub min_indirect_buffer_offset_alignment: u64,
    pub non_coherent_atom_size: u64,
    pub max_push_constants_size: u32,
}

impl Default for DeviceLimits {
    /// Conservative values that every desktop Vulkan implementation satisfies
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            min_storage_buffer_offset_alignment: 256,
            min_texel_buffer_offset_alignment: 256,
            min_vertex_buffer_offset_alignment: 16,
            min_index_buffer_offset_alignment: 4,
            min_indirect_buffer_offset_alignment: 4,
            non_coherent_atom_size: 256,
            max_push_constants_size: 128,
        }
    }
}

/// One queue submission
///
/// Waits happen at the color-attachment-output stage.
pub struct SubmitInfo<'a> {
    pub command_list: &'a dyn CommandList,
    pub wait_semaphores: &'a [SemaphoreHandle],
    pub signal_semaphores: &'a [SemaphoreHandle],
    pub fence: Option<FenceHandle>,
}

/// Graphics device trait
///
/// Factory for buffers, command lists and synchronization primitives, plus the
/// graphics queue. Implemented by VulkanGraphicsDevice and the mock device.
pub trait GraphicsDevice: Send + Sync {
    /// Limits reported by the physical device
    fn limits(&self) -> DeviceLimits;

    /// Create a buffer
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the device cannot satisfy the allocation.
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Allocate `count` command lists of the given level
    ///
    /// Each list is independently resettable and safe to record on its own thread.
    fn allocate_command_lists(
        &self,
        level: CommandListLevel,
        count: usize,
    ) -> Result<Vec<Box<dyn CommandList>>>;

    /// Create a fence, optionally in the signaled state
    fn create_fence(&self, signaled: bool) -> Result<FenceHandle>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: FenceHandle);

    /// Create a binary semaphore
    fn create_semaphore(&self) -> Result<SemaphoreHandle>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: SemaphoreHandle);

    /// Block until the fence is signaled
    ///
    /// # Errors
    ///
    /// `DeviceTimeout` when the fence is not signaled within `timeout`.
    fn wait_for_fence(&self, fence: FenceHandle, timeout: Duration) -> Result<()>;

    /// Return a signaled fence to the unsignaled state
    fn reset_fence(&self, fence: FenceHandle) -> Result<()>;

    /// Submit a primary command list to the graphics queue
    fn submit(&self, info: &SubmitInfo<'_>) -> Result<()>;

    /// Create a binding group exposing `buffer` as one dynamic uniform binding
    ///
    /// Used by the transient uniform allocator: one group per backing buffer,
    /// individual allocations are selected with a dynamic offset at bind time.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Backing buffer (must have UNIFORM usage)
    /// * `range` - Size in bytes visible through one dynamic offset
    fn create_dynamic_uniform_group(
        &self,
        buffer: &Arc<dyn Buffer>,
        range: u64,
    ) -> Result<BindingGroupHandle>;

    /// Block until the device is idle
    fn wait_idle(&self) -> Result<()>;
}

/// Opaque binding group (descriptor set) handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingGroupHandle(pub u64);

/// Graphics pipeline handle with its layout
///
/// Pipelines are authored outside the engine core; the recorder only binds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle {
    pub pipeline: u64,
    pub layout: u64,
}

/// Render pass + framebuffer pair a sub-pass records into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetBinding {
    pub render_pass: u64,
    pub subpass: u32,
    pub framebuffer: u64,
    pub width: u32,
    pub height: u32,
}

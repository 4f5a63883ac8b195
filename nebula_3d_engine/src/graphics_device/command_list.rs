/// CommandList trait - for recording rendering commands

use crate::error::Result;
use crate::graphics_device::{Buffer, BindingGroupHandle, PipelineHandle, RenderTargetBinding};

/// Primary lists are submitted to a queue, secondary lists are executed
/// from inside a primary's render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListLevel {
    Primary,
    Secondary,
}

/// How the commands of a render pass are provided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpassContents {
    /// Commands are recorded directly into the primary list
    Inline,
    /// The primary list only executes secondary lists
    SecondaryCommandBuffers,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size_bytes(&self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Shader stages visible to push constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    AllGraphics,
}

/// Inheritance state of a secondary command list
///
/// Binds the secondary to the render pass, sub-pass and framebuffer of the
/// primary it will be executed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InheritanceInfo {
    pub render_pass: u64,
    pub subpass: u32,
    pub framebuffer: u64,
}

impl From<&RenderTargetBinding> for InheritanceInfo {
    fn from(target: &RenderTargetBinding) -> Self {
        Self {
            render_pass: target.render_pass,
            subpass: target.subpass,
            framebuffer: target.framebuffer,
        }
    }
}

/// Command list for recording rendering commands
///
/// Commands are recorded and later submitted to the GPU via GraphicsDevice::submit()
/// (primary) or executed from a primary via execute_commands() (secondary).
/// A command list is `Send` so it can be recorded on a worker thread, but it is
/// never shared between threads while recording.
pub trait CommandList: Send {
    /// Level the list was allocated with
    fn level(&self) -> CommandListLevel;

    /// Backend handle (VkCommandBuffer as u64 for Vulkan)
    fn raw_handle(&self) -> u64;

    /// Begin recording a primary list (one-time submit)
    fn begin(&mut self) -> Result<()>;

    /// Begin recording a secondary list that continues a render pass
    ///
    /// # Arguments
    ///
    /// * `inheritance` - Render pass, sub-pass and framebuffer the list will execute in
    fn begin_secondary(&mut self, inheritance: &InheritanceInfo) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Return the list to the initial state, discarding recorded commands
    fn reset(&mut self) -> Result<()>;

    /// Begin a render pass
    ///
    /// # Arguments
    ///
    /// * `target` - Render pass, framebuffer and extent to render into
    /// * `render_area` - Area of the framebuffer affected by the pass
    /// * `clear_values` - Clear values for attachments
    /// * `contents` - Whether draws are inline or come from secondary lists
    fn begin_render_pass(
        &mut self,
        target: &RenderTargetBinding,
        render_area: Rect2D,
        clear_values: &[ClearValue],
        contents: SubpassContents,
    ) -> Result<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> Result<()>;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: &PipelineHandle) -> Result<()>;

    /// Bind a binding group (descriptor set) to a pipeline slot
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline whose layout the group is bound against
    /// * `set_index` - Set index (0 = per-frame, 1 = per-draw, 2 and up = per-material)
    /// * `group` - The binding group to bind
    /// * `dynamic_offsets` - One offset per dynamic buffer binding in the group
    fn bind_binding_group(
        &mut self,
        pipeline: &PipelineHandle,
        set_index: u32,
        group: BindingGroupHandle,
        dynamic_offsets: &[u32],
    ) -> Result<()>;

    /// Push constants to the pipeline
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline whose layout declares the push constant range
    /// * `stage` - Shader stages that will access the push constants
    /// * `offset` - Offset in bytes into push constant range
    /// * `data` - Data to push
    fn push_constants(
        &mut self,
        pipeline: &PipelineHandle,
        stage: ShaderStage,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    /// Bind a vertex buffer
    ///
    /// # Arguments
    ///
    /// * `binding` - Vertex input binding (0 = per-vertex, 1 = per-instance)
    /// * `buffer` - Buffer to bind
    /// * `offset` - Offset into the buffer in bytes
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: &dyn Buffer, offset: u64) -> Result<()>;

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, index_type: IndexType) -> Result<()>;

    /// Draw vertices
    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()>;

    /// Draw indexed vertices
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    /// Draw indexed vertices with parameters read from a GPU buffer
    fn draw_indexed_indirect(
        &mut self,
        buffer: &dyn Buffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()>;

    /// Execute secondary command lists from inside the current render pass
    ///
    /// The lists run in slice order. Every list must be executable (ended).
    fn execute_commands(&mut self, secondaries: &[&dyn CommandList]) -> Result<()>;
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with the [0, 1] depth range
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth/stencil clear value
    DepthStencil { depth: f32, stencil: u32 },
}

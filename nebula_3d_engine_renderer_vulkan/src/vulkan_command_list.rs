/// CommandList - Vulkan implementation of the CommandList trait

use nebula_3d_engine::nebula3d::{Result, Error};
use nebula_3d_engine::nebula3d::device::{
    BindingGroupHandle, Buffer as DeviceBuffer, ClearValue, CommandList as DeviceCommandList,
    CommandListLevel, IndexType, InheritanceInfo, PipelineHandle, Rect2D, RenderTargetBinding,
    ShaderStage, SubpassContents, Viewport,
};
use nebula_3d_engine::engine_error;
use ash::vk::{self, Handle};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{
    clear_value_to_vk, command_list_level_to_vk, index_type_to_vk, rect_to_vk,
    shader_stage_to_vk, subpass_contents_to_vk, viewport_to_vk,
};

/// Vulkan command list implementation
///
/// Each list owns its command pool, so lists handed to different worker
/// threads never share a pool.
pub struct CommandList {
    /// Shared GPU context (keeps the device alive)
    ctx: Arc<GpuContext>,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    command_buffer: vk::CommandBuffer,
    level: CommandListLevel,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a render pass (always true for a secondary that continues one)
    in_render_pass: bool,
}

impl CommandList {
    /// Create a new command list
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared GPU context
    /// * `level` - Primary or secondary
    pub(crate) fn new(ctx: Arc<GpuContext>, level: CommandListLevel) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| {
                    engine_error!("nebula3d::vulkan", "Failed to create command pool: {:?}", e);
                    out_of_memory_or(e, "create command pool")
                })?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(command_list_level_to_vk(level))
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    engine_error!("nebula3d::vulkan", "Failed to allocate command buffer: {:?}", e);
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(out_of_memory_or(e, "allocate command buffer"));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer: command_buffers[0],
                level,
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn require_recording(&self, op: &str) -> Result<()> {
        if self.is_recording {
            Ok(())
        } else {
            Err(misuse(format!("{}: command list not recording", op)))
        }
    }

    fn require_render_pass(&self, op: &str) -> Result<()> {
        self.require_recording(op)?;
        if self.in_render_pass {
            Ok(())
        } else {
            Err(misuse(format!("{}: not inside a render pass", op)))
        }
    }

    fn begin_with(&mut self, begin_info: &vk::CommandBufferBeginInfo<'_>, in_render_pass: bool) -> Result<()> {
        if self.is_recording {
            return Err(misuse("begin: command list already recording".to_string()));
        }

        unsafe {
            self.ctx.device
                .begin_command_buffer(self.command_buffer, begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }
        self.is_recording = true;
        self.in_render_pass = in_render_pass;
        Ok(())
    }
}

fn misuse(message: String) -> Error {
    engine_error!("nebula3d::vulkan", "{}", message);
    Error::SynchronizationMisuse(message)
}

fn out_of_memory_or(result: vk::Result, op: &str) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfMemory,
        other => Error::BackendError(format!("Failed to {}: {:?}", op, other)),
    }
}

impl DeviceCommandList for CommandList {
    fn level(&self) -> CommandListLevel {
        self.level
    }

    fn raw_handle(&self) -> u64 {
        self.command_buffer.as_raw()
    }

    fn begin(&mut self) -> Result<()> {
        if self.level != CommandListLevel::Primary {
            return Err(misuse("begin: secondary lists begin with begin_secondary".to_string()));
        }
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.begin_with(&begin_info, false)
    }

    fn begin_secondary(&mut self, inheritance: &InheritanceInfo) -> Result<()> {
        if self.level != CommandListLevel::Secondary {
            return Err(misuse("begin_secondary: list is not secondary".to_string()));
        }
        let inheritance_info = vk::CommandBufferInheritanceInfo::default()
            .render_pass(vk::RenderPass::from_raw(inheritance.render_pass))
            .subpass(inheritance.subpass)
            .framebuffer(vk::Framebuffer::from_raw(inheritance.framebuffer));
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
                    | vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
            )
            .inheritance_info(&inheritance_info);
        self.begin_with(&begin_info, true)
    }

    fn end(&mut self) -> Result<()> {
        self.require_recording("end")?;

        if self.in_render_pass && self.level == CommandListLevel::Primary {
            return Err(misuse("end: render pass not ended before ending command list".to_string()));
        }

        unsafe {
            self.ctx.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        self.in_render_pass = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        self.in_render_pass = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        target: &RenderTargetBinding,
        render_area: Rect2D,
        clear_values: &[ClearValue],
        contents: SubpassContents,
    ) -> Result<()> {
        self.require_recording("begin_render_pass")?;
        if self.in_render_pass {
            return Err(misuse("begin_render_pass: already inside a render pass".to_string()));
        }

        let vk_clear_values: Vec<vk::ClearValue> = clear_values.iter().map(clear_value_to_vk).collect();
        let render_pass_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk::RenderPass::from_raw(target.render_pass))
            .framebuffer(vk::Framebuffer::from_raw(target.framebuffer))
            .render_area(rect_to_vk(&render_area))
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_info,
                subpass_contents_to_vk(contents),
            );
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass("end_render_pass")?;
        if self.level == CommandListLevel::Secondary {
            return Err(misuse("end_render_pass: secondary lists cannot end the render pass".to_string()));
        }

        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.require_recording("set_viewport")?;
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[viewport_to_vk(&viewport)]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.require_recording("set_scissor")?;
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[rect_to_vk(&scissor)]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &PipelineHandle) -> Result<()> {
        self.require_recording("bind_pipeline")?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk::Pipeline::from_raw(pipeline.pipeline),
            );
        }
        Ok(())
    }

    fn bind_binding_group(
        &mut self,
        pipeline: &PipelineHandle,
        set_index: u32,
        group: BindingGroupHandle,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.require_recording("bind_binding_group")?;
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk::PipelineLayout::from_raw(pipeline.layout),
                set_index,
                &[vk::DescriptorSet::from_raw(group.0)],
                dynamic_offsets,
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: &PipelineHandle,
        stage: ShaderStage,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.require_recording("push_constants")?;
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk::PipelineLayout::from_raw(pipeline.layout),
                shader_stage_to_vk(stage),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: &dyn DeviceBuffer, offset: u64) -> Result<()> {
        self.require_recording("bind_vertex_buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                binding,
                &[vk::Buffer::from_raw(buffer.raw_handle())],
                &[offset],
            );
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_recording("bind_index_buffer")?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk::Buffer::from_raw(buffer.raw_handle()),
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_render_pass("draw")?;
        unsafe {
            self.ctx.device.cmd_draw(
                self.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.require_render_pass("draw_indexed")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn draw_indexed_indirect(
        &mut self,
        buffer: &dyn DeviceBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) -> Result<()> {
        self.require_render_pass("draw_indexed_indirect")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed_indirect(
                self.command_buffer,
                vk::Buffer::from_raw(buffer.raw_handle()),
                offset,
                draw_count,
                stride,
            );
        }
        Ok(())
    }

    fn execute_commands(&mut self, secondaries: &[&dyn DeviceCommandList]) -> Result<()> {
        self.require_render_pass("execute_commands")?;
        if self.level != CommandListLevel::Primary {
            return Err(misuse("execute_commands: only primary lists execute secondaries".to_string()));
        }
        if secondaries.is_empty() {
            return Ok(());
        }
        if let Some(wrong) = secondaries.iter().find(|s| s.level() != CommandListLevel::Secondary) {
            return Err(misuse(format!(
                "execute_commands: list {:#x} is not secondary",
                wrong.raw_handle()
            )));
        }

        let command_buffers: Vec<vk::CommandBuffer> = secondaries
            .iter()
            .map(|list| vk::CommandBuffer::from_raw(list.raw_handle()))
            .collect();
        unsafe {
            self.ctx.device.cmd_execute_commands(self.command_buffer, &command_buffers);
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer along with the pool
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Every device call and every recorded command is appended to a shared,
/// ordered log so tests can check synchronization order (fence wait before
/// slot reuse) and the merged draw sequence of a primary command list.
/// Secondary command lists are expanded in place when a primary executes them.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use rustc_hash::FxHashMap;

use crate::graphics_device::{
    GraphicsDevice, Buffer, BufferDesc, BufferUsage, CommandList, CommandListLevel,
    DeviceLimits, FenceHandle, SemaphoreHandle, SubmitInfo, BindingGroupHandle,
    PipelineHandle, RenderTargetBinding, InheritanceInfo, SubpassContents, IndexType,
    ShaderStage, Viewport, Rect2D, ClearValue, Swapchain,
};
use crate::error::{Error, Result};

// ============================================================================
// Event log
// ============================================================================

/// Device-level event
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    CreateBuffer { buffer: u64, size: u64, usage: BufferUsage },
    WriteBuffer { buffer: u64, offset: u64, len: u64 },
    FlushBuffer { buffer: u64, offset: u64, size: u64 },
    AllocateCommandLists { level: CommandListLevel, count: usize },
    CreateFence { fence: u64, signaled: bool },
    WaitFence { fence: u64 },
    ResetFence { fence: u64 },
    CreateSemaphore { semaphore: u64 },
    Submit { list: u64, waits: Vec<u64>, signals: Vec<u64>, fence: Option<u64> },
    CreateBindingGroup { group: u64, buffer: u64, range: u64 },
    AcquireImage { image: u32, signal: u64 },
    Present { image: u32, wait: u64 },
    WaitIdle,
}

/// Command recorded into a command list
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Begin,
    BeginSecondary(InheritanceInfo),
    End,
    BeginRenderPass { framebuffer: u64, contents: SubpassContents },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindPipeline(u64),
    BindBindingGroup { set: u32, group: u64, dynamic_offsets: Vec<u32> },
    PushConstants { offset: u32, size: u32 },
    BindVertexBuffer { binding: u32, buffer: u64, offset: u64 },
    BindIndexBuffer { buffer: u64, offset: u64 },
    Draw { vertex_count: u32, instance_count: u32, first_vertex: u32 },
    DrawIndexed { index_count: u32, instance_count: u32, first_index: u32 },
    DrawIndexedIndirect { buffer: u64, offset: u64, draw_count: u32 },
    ExecuteCommands(Vec<u64>),
}

/// Shared mock state
pub struct MockState {
    pub events: Vec<MockEvent>,
    pub commands: FxHashMap<u64, Vec<MockCommand>>,
    pub buffer_data: FxHashMap<u64, Vec<u8>>,
    pub fences: FxHashMap<u64, bool>,
    pub limits: DeviceLimits,
    pub coherent: bool,
    /// Submitted fences become signaled immediately (the mock GPU is instant)
    pub auto_signal_fences: bool,
    /// Sleep inside the draw whose first index (or first vertex) matches
    pub draw_delays: FxHashMap<u32, Duration>,
    pub failing_draw: Option<u32>,
    pub panicking_draw: Option<u32>,
    /// Number of upcoming secondary-list `end` calls that panic
    pub panicking_ends: usize,
    /// Called with the draw key before each draw is recorded
    pub draw_observer: Option<Arc<dyn Fn(u32) + Send + Sync>>,
    /// Number of buffers that can still be created before OutOfMemory
    pub buffer_budget: Option<usize>,
    next_handle: u64,
}

impl MockState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

#[derive(Clone)]
pub struct MockGraphicsDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                events: Vec::new(),
                commands: FxHashMap::default(),
                buffer_data: FxHashMap::default(),
                fences: FxHashMap::default(),
                limits,
                coherent: false,
                auto_signal_fences: true,
                draw_delays: FxHashMap::default(),
                failing_draw: None,
                panicking_draw: None,
                panicking_ends: 0,
                draw_observer: None,
                buffer_budget: None,
                next_handle: 0,
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn commands(&self, list: u64) -> Vec<MockCommand> {
        self.state().commands.get(&list).cloned().unwrap_or_default()
    }

    pub fn buffer_contents(&self, buffer: u64) -> Vec<u8> {
        self.state().buffer_data.get(&buffer).cloned().unwrap_or_default()
    }

    pub fn set_draw_delay(&self, key: u32, delay: Duration) {
        self.state().draw_delays.insert(key, delay);
    }

    pub fn fail_draw(&self, key: u32) {
        self.state().failing_draw = Some(key);
    }

    pub fn panic_on_draw(&self, key: u32) {
        self.state().panicking_draw = Some(key);
    }

    pub fn panic_on_secondary_ends(&self, count: usize) {
        self.state().panicking_ends = count;
    }

    pub fn observe_draws<F>(&self, observer: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.state().draw_observer = Some(Arc::new(observer));
    }

    pub fn set_buffer_budget(&self, budget: Option<usize>) {
        self.state().buffer_budget = budget;
    }

    pub fn set_auto_signal_fences(&self, enabled: bool) {
        self.state().auto_signal_fences = enabled;
    }

    pub fn signal_fence(&self, fence: FenceHandle) {
        self.state().fences.insert(fence.0, true);
    }

    /// Commands of `list` with every ExecuteCommands replaced by the executed lists' commands
    pub fn flattened_commands(&self, list: u64) -> Vec<MockCommand> {
        let state = self.state();
        let mut out = Vec::new();
        Self::flatten_into(&state, list, &mut out);
        out
    }

    /// Draw keys (first index, first vertex, or indirect offset) in execution order
    pub fn draw_sequence(&self, list: u64) -> Vec<u32> {
        self.flattened_commands(list)
            .into_iter()
            .filter_map(|cmd| match cmd {
                MockCommand::DrawIndexed { first_index, .. } => Some(first_index),
                MockCommand::Draw { first_vertex, .. } => Some(first_vertex),
                MockCommand::DrawIndexedIndirect { offset, .. } => Some(offset as u32),
                _ => None,
            })
            .collect()
    }

    fn flatten_into(state: &MockState, list: u64, out: &mut Vec<MockCommand>) {
        if let Some(commands) = state.commands.get(&list) {
            for cmd in commands {
                match cmd {
                    MockCommand::ExecuteCommands(children) => {
                        for child in children {
                            Self::flatten_into(state, *child, out);
                        }
                    }
                    other => out.push(other.clone()),
                }
            }
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.state().limits
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        let mut state = self.state();
        if let Some(budget) = state.buffer_budget.as_mut() {
            if *budget == 0 {
                return Err(Error::OutOfMemory);
            }
            *budget -= 1;
        }
        let handle = state.next_handle();
        state.buffer_data.insert(handle, vec![0u8; desc.size as usize]);
        state.events.push(MockEvent::CreateBuffer {
            buffer: handle,
            size: desc.size,
            usage: desc.usage,
        });
        let coherent = state.coherent;
        Ok(Arc::new(MockBuffer {
            handle,
            size: desc.size,
            usage: desc.usage,
            coherent,
            state: Arc::clone(&self.state),
        }))
    }

    fn allocate_command_lists(
        &self,
        level: CommandListLevel,
        count: usize,
    ) -> Result<Vec<Box<dyn CommandList>>> {
        let mut state = self.state();
        state.events.push(MockEvent::AllocateCommandLists { level, count });
        let mut lists: Vec<Box<dyn CommandList>> = Vec::with_capacity(count);
        for _ in 0..count {
            let handle = state.next_handle();
            state.commands.insert(handle, Vec::new());
            lists.push(Box::new(MockCommandList {
                handle,
                level,
                recording: false,
                state: Arc::clone(&self.state),
            }));
        }
        Ok(lists)
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let mut state = self.state();
        let handle = state.next_handle();
        state.fences.insert(handle, signaled);
        state.events.push(MockEvent::CreateFence { fence: handle, signaled });
        Ok(FenceHandle(handle))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        self.state().fences.remove(&fence.0);
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let mut state = self.state();
        let handle = state.next_handle();
        state.events.push(MockEvent::CreateSemaphore { semaphore: handle });
        Ok(SemaphoreHandle(handle))
    }

    fn destroy_semaphore(&self, _semaphore: SemaphoreHandle) {}

    fn wait_for_fence(&self, fence: FenceHandle, timeout: Duration) -> Result<()> {
        let mut state = self.state();
        state.events.push(MockEvent::WaitFence { fence: fence.0 });
        match state.fences.get(&fence.0) {
            Some(true) => Ok(()),
            Some(false) => Err(Error::DeviceTimeout(format!(
                "fence {} not signaled after {:?}", fence.0, timeout
            ))),
            None => Err(Error::InvalidResource(format!("unknown fence {}", fence.0))),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        let mut state = self.state();
        state.events.push(MockEvent::ResetFence { fence: fence.0 });
        state.fences.insert(fence.0, false);
        Ok(())
    }

    fn submit(&self, info: &SubmitInfo<'_>) -> Result<()> {
        let mut state = self.state();
        state.events.push(MockEvent::Submit {
            list: info.command_list.raw_handle(),
            waits: info.wait_semaphores.iter().map(|s| s.0).collect(),
            signals: info.signal_semaphores.iter().map(|s| s.0).collect(),
            fence: info.fence.map(|f| f.0),
        });
        if let Some(fence) = info.fence {
            if state.auto_signal_fences {
                state.fences.insert(fence.0, true);
            }
        }
        Ok(())
    }

    fn create_dynamic_uniform_group(
        &self,
        buffer: &Arc<dyn Buffer>,
        range: u64,
    ) -> Result<BindingGroupHandle> {
        let mut state = self.state();
        let handle = state.next_handle();
        state.events.push(MockEvent::CreateBindingGroup {
            group: handle,
            buffer: buffer.raw_handle(),
            range,
        });
        Ok(BindingGroupHandle(handle))
    }

    fn wait_idle(&self) -> Result<()> {
        self.state().events.push(MockEvent::WaitIdle);
        Ok(())
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub handle: u64,
    pub size: u64,
    pub usage: BufferUsage,
    pub coherent: bool,
    state: Arc<Mutex<MockState>>,
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn raw_handle(&self) -> u64 {
        self.handle
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} exceeds buffer size {}",
                data.len(), offset, self.size
            )));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(bytes) = state.buffer_data.get_mut(&self.handle) {
            bytes[offset as usize..end as usize].copy_from_slice(data);
        }
        state.events.push(MockEvent::WriteBuffer {
            buffer: self.handle,
            offset,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn flush(&self, offset: u64, size: u64) -> Result<()> {
        self.state.lock().unwrap().events.push(MockEvent::FlushBuffer {
            buffer: self.handle,
            offset,
            size,
        });
        Ok(())
    }

    fn invalidate(&self, _offset: u64, _size: u64) -> Result<()> {
        Ok(())
    }

    fn is_coherent(&self) -> bool {
        self.coherent
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub handle: u64,
    pub level: CommandListLevel,
    recording: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockCommandList {
    fn push(&self, command: MockCommand) -> Result<()> {
        if !self.recording {
            return Err(Error::SynchronizationMisuse(format!(
                "{:?} recorded into command list {} which is not recording",
                command, self.handle
            )));
        }
        self.state
            .lock()
            .unwrap()
            .commands
            .entry(self.handle)
            .or_default()
            .push(command);
        Ok(())
    }

    fn record_draw(&self, key: u32, command: MockCommand) -> Result<()> {
        let (delay, fail, panic, observer) = {
            let state = self.state.lock().unwrap();
            (
                state.draw_delays.get(&key).copied(),
                state.failing_draw == Some(key),
                state.panicking_draw == Some(key),
                state.draw_observer.clone(),
            )
        };
        if let Some(observer) = observer {
            observer(key);
        }
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if panic {
            panic!("injected panic at draw {}", key);
        }
        if fail {
            return Err(Error::BackendError(format!("injected failure at draw {}", key)));
        }
        self.push(command)
    }
}

impl CommandList for MockCommandList {
    fn level(&self) -> CommandListLevel {
        self.level
    }

    fn raw_handle(&self) -> u64 {
        self.handle
    }

    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(Error::SynchronizationMisuse("begin while recording".to_string()));
        }
        self.state.lock().unwrap().commands.insert(self.handle, Vec::new());
        self.recording = true;
        self.push(MockCommand::Begin)
    }

    fn begin_secondary(&mut self, inheritance: &InheritanceInfo) -> Result<()> {
        if self.recording {
            return Err(Error::SynchronizationMisuse("begin while recording".to_string()));
        }
        self.state.lock().unwrap().commands.insert(self.handle, Vec::new());
        self.recording = true;
        self.push(MockCommand::BeginSecondary(*inheritance))
    }

    fn end(&mut self) -> Result<()> {
        if self.level == CommandListLevel::Secondary {
            let panic = {
                let mut state = self.state.lock().unwrap();
                let panic = state.panicking_ends > 0;
                state.panicking_ends = state.panicking_ends.saturating_sub(1);
                panic
            };
            if panic {
                panic!("injected panic ending command list {}", self.handle);
            }
        }
        self.push(MockCommand::End)?;
        self.recording = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.recording = false;
        self.state.lock().unwrap().commands.insert(self.handle, Vec::new());
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        target: &RenderTargetBinding,
        _render_area: Rect2D,
        _clear_values: &[ClearValue],
        contents: SubpassContents,
    ) -> Result<()> {
        self.push(MockCommand::BeginRenderPass { framebuffer: target.framebuffer, contents })
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.push(MockCommand::EndRenderPass)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.push(MockCommand::SetViewport(viewport))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.push(MockCommand::SetScissor(scissor))
    }

    fn bind_pipeline(&mut self, pipeline: &PipelineHandle) -> Result<()> {
        self.push(MockCommand::BindPipeline(pipeline.pipeline))
    }

    fn bind_binding_group(
        &mut self,
        _pipeline: &PipelineHandle,
        set_index: u32,
        group: BindingGroupHandle,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.push(MockCommand::BindBindingGroup {
            set: set_index,
            group: group.0,
            dynamic_offsets: dynamic_offsets.to_vec(),
        })
    }

    fn push_constants(
        &mut self,
        _pipeline: &PipelineHandle,
        _stage: ShaderStage,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.push(MockCommand::PushConstants { offset, size: data.len() as u32 })
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: &dyn Buffer, offset: u64) -> Result<()> {
        self.push(MockCommand::BindVertexBuffer { binding, buffer: buffer.raw_handle(), offset })
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, offset: u64, _index_type: IndexType) -> Result<()> {
        self.push(MockCommand::BindIndexBuffer { buffer: buffer.raw_handle(), offset })
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        _first_instance: u32,
    ) -> Result<()> {
        self.record_draw(first_vertex, MockCommand::Draw { vertex_count, instance_count, first_vertex })
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        self.record_draw(first_index, MockCommand::DrawIndexed { index_count, instance_count, first_index })
    }

    fn draw_indexed_indirect(
        &mut self,
        buffer: &dyn Buffer,
        offset: u64,
        draw_count: u32,
        _stride: u32,
    ) -> Result<()> {
        self.record_draw(
            offset as u32,
            MockCommand::DrawIndexedIndirect { buffer: buffer.raw_handle(), offset, draw_count },
        )
    }

    fn execute_commands(&mut self, secondaries: &[&dyn CommandList]) -> Result<()> {
        self.push(MockCommand::ExecuteCommands(
            secondaries.iter().map(|list| list.raw_handle()).collect(),
        ))
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    image_count: usize,
    next_image: u32,
    state: Arc<Mutex<MockState>>,
}

impl MockSwapchain {
    pub fn new(device: &MockGraphicsDevice, image_count: usize) -> Self {
        Self {
            image_count,
            next_image: 0,
            state: Arc::clone(&device.state),
        }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, signal: SemaphoreHandle) -> Result<u32> {
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        self.state
            .lock()
            .unwrap()
            .events
            .push(MockEvent::AcquireImage { image, signal: signal.0 });
        Ok(image)
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .events
            .push(MockEvent::Present { image: image_index, wait: wait.0 });
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.image_count
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;

/// Frame-resource ring - N slots of per-frame resources, reused round-robin.
///
/// A slot owns its fence, its swapchain semaphores, its primary command list,
/// one pair of transient allocators per recording lane and its frame uniform
/// buffer. Reacquiring a slot waits on the fence of the frame that last used
/// it before anything in the slot is touched.

use std::sync::Arc;
use std::time::Duration;
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroupHandle, Buffer, BufferDesc, BufferUsage, CommandList, CommandListLevel,
    FenceHandle, GraphicsDevice, MemoryLocation, SemaphoreHandle,
};
use super::frame_config::FrameConfig;
use super::transient_buffer::{TransientBufferAllocator, UsageClass};

/// Action run once the GPU no longer uses the slot it was queued on
pub type DeferredAction = Box<dyn FnOnce() + Send + 'static>;

/// Transient allocators of one recording lane
///
/// Lane `i < worker_count` belongs to parallel chunk `i`; the last lane is the
/// serial lane used for alpha-blended batches.
pub struct FrameLane {
    pub uniforms: TransientBufferAllocator,
    pub vertices: TransientBufferAllocator,
}

/// Nominal backing sizes of every lane of a slot
#[derive(Debug, Clone, Copy)]
struct LaneSizes {
    uniform: u64,
    vertex: u64,
}

impl FrameLane {
    fn new(device: &Arc<dyn GraphicsDevice>, sizes: LaneSizes, name: &str) -> Result<Self> {
        Ok(Self {
            uniforms: TransientBufferAllocator::new(
                Arc::clone(device),
                UsageClass::Uniform,
                sizes.uniform,
                name,
            )?,
            vertices: TransientBufferAllocator::new(
                Arc::clone(device),
                UsageClass::Vertex,
                sizes.vertex,
                name,
            )?,
        })
    }

    pub fn reset(&mut self) {
        self.uniforms.reset();
        self.vertices.reset();
    }

    pub fn flush(&self) -> Result<()> {
        self.uniforms.flush()?;
        self.vertices.flush()
    }

    pub fn used_bytes(&self) -> u64 {
        self.uniforms.used_bytes() + self.vertices.used_bytes()
    }

    pub fn backing_count(&self) -> usize {
        self.uniforms.backing_count() + self.vertices.backing_count()
    }
}

/// CPU copy of the per-frame uniform block, uploaded at the end of the frame
pub struct FrameUniforms {
    data: Vec<u8>,
    dirty: bool,
}

impl FrameUniforms {
    fn new(size: u64) -> Self {
        Self { data: vec![0u8; size as usize], dirty: false }
    }

    /// Write a plain-old-data value at `offset`
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the value does not fit in the block.
    pub fn write<T: Pod>(&mut self, offset: usize, value: &T) -> Result<()> {
        self.write_bytes(offset, bytemuck::bytes_of(value))
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = match offset.checked_add(bytes.len()) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                return Err(Error::InvalidResource(format!(
                    "frame uniform write of {} bytes at {} exceeds block of {} bytes",
                    bytes.len(), offset, self.data.len()
                )));
            }
        };
        self.data[offset..end].copy_from_slice(bytes);
        self.dirty = true;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One slot of the ring
pub struct FrameSlot {
    device: Arc<dyn GraphicsDevice>,
    index: usize,
    frame_index: u64,
    fence: FenceHandle,
    image_available: SemaphoreHandle,
    render_finished: SemaphoreHandle,
    primary: Box<dyn CommandList>,
    lanes: Vec<FrameLane>,
    lane_total: usize,
    lane_sizes: LaneSizes,
    uniform_buffer: Arc<dyn Buffer>,
    uniform_group: BindingGroupHandle,
    uniforms: FrameUniforms,
    deferred: Vec<DeferredAction>,
    submitted: bool,
}

impl FrameSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Frame index of the last `acquire` of this slot
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn fence(&self) -> FenceHandle {
        self.fence
    }

    pub fn image_available(&self) -> SemaphoreHandle {
        self.image_available
    }

    pub fn render_finished(&self) -> SemaphoreHandle {
        self.render_finished
    }

    pub fn primary(&self) -> &dyn CommandList {
        self.primary.as_ref()
    }

    pub fn primary_mut(&mut self) -> &mut dyn CommandList {
        self.primary.as_mut()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lanes(&self) -> &[FrameLane] {
        &self.lanes
    }

    pub fn lane_mut(&mut self, lane: usize) -> Option<&mut FrameLane> {
        self.lanes.get_mut(lane)
    }

    /// Move the lanes out, e.g. into recording jobs
    ///
    /// They must be handed back with `restore_lanes` in the same order.
    pub fn take_lanes(&mut self) -> Vec<FrameLane> {
        std::mem::take(&mut self.lanes)
    }

    /// Hand back the lanes taken with `take_lanes`
    ///
    /// A `None` entry is a lane that was lost with its recording job; it is
    /// replaced by a fresh lane without backing buffers, so the slot keeps
    /// its lane count.
    ///
    /// # Errors
    ///
    /// `SynchronizationMisuse` if the slot still holds lanes or `lanes` has
    /// the wrong length, or the first error raised while creating a
    /// replacement. Every other lane is restored in the last case.
    pub fn restore_lanes(&mut self, lanes: Vec<Option<FrameLane>>) -> Result<()> {
        if !self.lanes.is_empty() || lanes.len() != self.lane_total {
            let message = format!(
                "slot {} restoring {} lanes over {} live lanes ({} expected)",
                self.index, lanes.len(), self.lanes.len(), self.lane_total
            );
            crate::engine_error!("nebula3d::frame", "{}", message);
            return Err(Error::SynchronizationMisuse(message));
        }
        let mut first_error = None;
        for (lane, restored) in lanes.into_iter().enumerate() {
            match restored {
                Some(restored) => self.lanes.push(restored),
                None => {
                    let name = format!("slot{}_lane{}", self.index, lane);
                    match FrameLane::new(&self.device, self.lane_sizes, &name) {
                        Ok(replacement) => {
                            crate::engine_warn!("nebula3d::frame", "Replaced lost lane '{}'", name);
                            self.lanes.push(replacement);
                        }
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn uniform_buffer(&self) -> &Arc<dyn Buffer> {
        &self.uniform_buffer
    }

    /// Binding group exposing the frame uniform buffer (dynamic offset 0)
    pub fn uniform_group(&self) -> BindingGroupHandle {
        self.uniform_group
    }

    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut FrameUniforms {
        &mut self.uniforms
    }

    /// Queue an action to run after this slot's next fence wait
    pub fn defer(&mut self, action: DeferredAction) {
        self.deferred.push(action);
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Record that the slot's work was submitted with its fence
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Upload the frame uniforms if written, then flush every lane
    pub fn flush(&mut self) -> Result<()> {
        if self.uniforms.dirty {
            self.uniform_buffer.update(0, self.uniforms.as_bytes())?;
            if !self.uniform_buffer.is_coherent() {
                self.uniform_buffer.flush(0, self.uniform_buffer.size())?;
            }
            self.uniforms.dirty = false;
        }
        for lane in &self.lanes {
            lane.flush()?;
        }
        Ok(())
    }

    pub fn transient_bytes(&self) -> u64 {
        self.lanes.iter().map(FrameLane::used_bytes).sum()
    }

    pub fn backing_count(&self) -> usize {
        self.lanes.iter().map(FrameLane::backing_count).sum()
    }

    fn run_deferred(&mut self) {
        for action in self.deferred.drain(..) {
            action();
        }
    }
}

/// Ring of `frames_in_flight` slots
pub struct FrameResourceRing {
    device: Arc<dyn GraphicsDevice>,
    slots: Vec<FrameSlot>,
    fence_timeout: Duration,
}

impl FrameResourceRing {
    /// Create every slot up front
    ///
    /// # Arguments
    ///
    /// * `device` - Device owning the slot resources
    /// * `config` - Ring size, lane count (`worker_count + 1`) and buffer sizes
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &FrameConfig) -> Result<Self> {
        config.validate()?;

        let primaries = device.allocate_command_lists(CommandListLevel::Primary, config.frames_in_flight)?;
        let lane_sizes = LaneSizes {
            uniform: config.transient_uniform_size,
            vertex: config.transient_vertex_size,
        };
        let mut slots = Vec::with_capacity(config.frames_in_flight);

        for (index, primary) in primaries.into_iter().enumerate() {
            let lanes = (0..=config.worker_count)
                .map(|lane| FrameLane::new(&device, lane_sizes, &format!("slot{}_lane{}", index, lane)))
                .collect::<Result<Vec<_>>>()?;

            let uniform_buffer = device.create_buffer(&BufferDesc {
                size: config.frame_uniform_size,
                usage: BufferUsage::UNIFORM,
                location: MemoryLocation::CpuToGpu,
                name: format!("slot{}_frame_uniforms", index),
            })?;
            let uniform_group = device.create_dynamic_uniform_group(&uniform_buffer, config.frame_uniform_size)?;

            slots.push(FrameSlot {
                device: Arc::clone(&device),
                index,
                frame_index: 0,
                fence: device.create_fence(false)?,
                image_available: device.create_semaphore()?,
                render_finished: device.create_semaphore()?,
                primary,
                lane_total: lanes.len(),
                lanes,
                lane_sizes,
                uniform_buffer,
                uniform_group,
                uniforms: FrameUniforms::new(config.frame_uniform_size),
                deferred: Vec::new(),
                submitted: false,
            });
        }

        if slots.len() != config.frames_in_flight {
            return Err(Error::InitializationFailed(format!(
                "device returned {} primary command lists, {} requested",
                slots.len(), config.frames_in_flight
            )));
        }

        crate::engine_debug!(
            "nebula3d::frame",
            "Frame-resource ring created: {} slots, {} lanes each",
            slots.len(), config.worker_count + 1
        );

        Ok(Self {
            device,
            slots,
            fence_timeout: config.fence_timeout,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_index(&self, frame_index: u64) -> usize {
        (frame_index % self.slots.len() as u64) as usize
    }

    /// Acquire the slot for `frame_index`, blocking until its last use retired
    ///
    /// On return the slot's fence is reset, its deferred actions have run and
    /// its transient allocators are rewound.
    ///
    /// # Errors
    ///
    /// `DeviceTimeout` if the previous use of the slot does not retire within
    /// the configured timeout. The slot is left untouched in that case.
    pub fn acquire(&mut self, frame_index: u64) -> Result<&mut FrameSlot> {
        let index = self.slot_index(frame_index);
        let timeout = self.fence_timeout;
        let device = Arc::clone(&self.device);
        let slot = &mut self.slots[index];

        if slot.submitted {
            crate::engine_trace!(
                "nebula3d::frame",
                "Frame {}: waiting on slot {} (last used by frame {})",
                frame_index, index, slot.frame_index
            );
            if let Err(e) = device.wait_for_fence(slot.fence, timeout) {
                crate::engine_error!(
                    "nebula3d::frame",
                    "Slot {} fence wait failed for frame {}: {}",
                    index, frame_index, e
                );
                return Err(e);
            }
            device.reset_fence(slot.fence)?;
            slot.submitted = false;
        }

        slot.run_deferred();
        for lane in &mut slot.lanes {
            lane.reset();
        }
        slot.frame_index = frame_index;
        Ok(slot)
    }

    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FrameSlot> {
        self.slots.get_mut(index)
    }
}

impl Drop for FrameResourceRing {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            crate::engine_warn!("nebula3d::frame", "wait_idle failed while dropping the ring: {}", e);
        }
        for slot in &mut self.slots {
            slot.run_deferred();
            self.device.destroy_fence(slot.fence);
            self.device.destroy_semaphore(slot.image_available);
            self.device.destroy_semaphore(slot.render_finished);
        }
    }
}

#[cfg(test)]
#[path = "frame_resource_ring_tests.rs"]
mod tests;

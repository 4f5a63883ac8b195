/// Frame renderer - the per-frame entry point of the pipeline.
///
/// ```ignore
/// let mut renderer = FrameRenderer::new(device, FrameConfig::default())?;
/// let main = renderer.register_pass(PassDesc { name: "main".into(), targets, clear_values })?;
///
/// for frame in 0.. {
///     renderer.begin_frame(frame)?;
///     renderer.frame_uniforms_mut()?.write(0, &camera_block)?;
///     let list = culler.cull(&camera, &drawables);
///     renderer.record_and_submit(main, viewport, scissor, &list)?;
///     let stats = renderer.end_frame()?;
/// }
/// ```
///
/// Any failure between `begin_frame` and the queue submission aborts the
/// frame: none of its commands reach the GPU and the slot is reused as if the
/// frame never happened. A swapchain image acquired by the aborted frame is
/// handed back through an empty submission and a present, so the slot's
/// semaphores stay balanced.

use std::sync::Arc;
use slotmap::{new_key_type, SlotMap};
use crate::error::{Error, Result};
use crate::graphics_device::{
    ClearValue, GraphicsDevice, InheritanceInfo, Rect2D, RenderTargetBinding, SemaphoreHandle,
    SubmitInfo, SubpassContents, Swapchain, Viewport,
};
use crate::scene::DrawList;
use super::batch_recorder::{BatchRecorder, RecordStats, RecordTarget};
use super::command_buffer_pool::CommandBufferPool;
use super::frame_config::{FrameConfig, FrameStats};
use super::frame_resource_ring::{FrameResourceRing, FrameUniforms};

new_key_type! {
    /// Key of a registered pass
    pub struct PassId;
}

/// Render pass the renderer records draw lists into
#[derive(Debug, Clone)]
pub struct PassDesc {
    pub name: String,
    /// One target per swapchain image, or a single target used every frame
    pub targets: Vec<RenderTargetBinding>,
    pub clear_values: Vec<ClearValue>,
}

impl PassDesc {
    fn target_for(&self, image_index: Option<u32>) -> Option<&RenderTargetBinding> {
        match (self.targets.len(), image_index) {
            (1, _) | (_, None) => self.targets.first(),
            (_, Some(image)) => self.targets.get(image as usize),
        }
    }
}

struct RegisteredPass {
    desc: PassDesc,
    pool: CommandBufferPool,
    recorded: bool,
}

struct ActiveFrame {
    frame_index: u64,
    slot: usize,
    image_index: Option<u32>,
    stats: FrameStats,
}

pub struct FrameRenderer {
    device: Arc<dyn GraphicsDevice>,
    config: FrameConfig,
    ring: FrameResourceRing,
    recorder: BatchRecorder,
    passes: SlotMap<PassId, RegisteredPass>,
    swapchain: Option<Box<dyn Swapchain>>,
    active: Option<ActiveFrame>,
    aborted: Option<u64>,
    last_stats: FrameStats,
}

impl FrameRenderer {
    /// Create the ring, the worker pool and every per-slot resource
    ///
    /// # Errors
    ///
    /// `InitializationFailed` for an invalid configuration, or any device
    /// error raised while creating slot resources.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        let ring = FrameResourceRing::new(Arc::clone(&device), &config)?;
        let recorder = BatchRecorder::new(&config)?;

        crate::engine_info!(
            "nebula3d::frame",
            "Frame renderer ready: {} frames in flight, {} workers, parallel recording {}",
            config.frames_in_flight,
            config.worker_count,
            if config.parallel_recording { "on" } else { "off" }
        );

        Ok(Self {
            device,
            config,
            ring,
            recorder,
            passes: SlotMap::with_key(),
            swapchain: None,
            active: None,
            aborted: None,
            last_stats: FrameStats::default(),
        })
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn frames_in_flight(&self) -> usize {
        self.ring.frames_in_flight()
    }

    /// Frame index of the frame in progress
    pub fn current_frame(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.frame_index)
    }

    /// Register a pass; its secondary command lists are allocated here
    pub fn register_pass(&mut self, desc: PassDesc) -> Result<PassId> {
        if desc.targets.is_empty() {
            return Err(Error::InvalidResource(format!("pass '{}' has no render target", desc.name)));
        }
        let mut pool = CommandBufferPool::new(
            &self.device,
            self.recorder.serial_lane() + 1,
            self.ring.frames_in_flight(),
        )?;
        if let Some(active) = &self.active {
            pool.begin_frame(active.slot)?;
        }
        crate::engine_debug!(
            "nebula3d::frame",
            "Registered pass '{}' with {} target(s)",
            desc.name, desc.targets.len()
        );
        Ok(self.passes.insert(RegisteredPass { desc, pool, recorded: false }))
    }

    pub fn pass(&self, id: PassId) -> Option<&PassDesc> {
        self.passes.get(id).map(|p| &p.desc)
    }

    /// Present through `swapchain`; frames then wait on image acquisition
    pub fn set_swapchain(&mut self, swapchain: Box<dyn Swapchain>) -> Result<()> {
        if self.active.is_some() {
            return Err(misuse("set_swapchain while a frame is in progress"));
        }
        self.swapchain = Some(swapchain);
        Ok(())
    }

    /// Start frame `frame_index`
    ///
    /// Blocks until the ring slot's previous use retired, then acquires the
    /// next swapchain image (if any) and opens the primary command list.
    ///
    /// # Errors
    ///
    /// `DeviceTimeout` if the slot's fence does not signal in time,
    /// `SynchronizationMisuse` if a frame is already in progress.
    pub fn begin_frame(&mut self, frame_index: u64) -> Result<()> {
        if let Some(active) = &self.active {
            return Err(misuse(&format!(
                "begin_frame({}) while frame {} is in progress",
                frame_index, active.frame_index
            )));
        }
        self.aborted = None;

        let slot = self.ring.acquire(frame_index)?;
        let slot_index = slot.index();
        let image_index = match self.swapchain.as_mut() {
            Some(swapchain) => Some(swapchain.acquire_next_image(slot.image_available())?),
            None => None,
        };
        let active = ActiveFrame {
            frame_index,
            slot: slot_index,
            image_index,
            stats: FrameStats { frame_index, ..FrameStats::default() },
        };

        if let Err(e) = self.open_frame(slot_index) {
            self.abort_slot(&active);
            return Err(e);
        }

        crate::engine_trace!(
            "nebula3d::frame",
            "Frame {} begun on slot {} (image {:?})",
            frame_index, slot_index, image_index
        );
        self.active = Some(active);
        Ok(())
    }

    fn open_frame(&mut self, slot_index: usize) -> Result<()> {
        let slot = self
            .ring
            .slot_mut(slot_index)
            .ok_or_else(|| Error::InvalidResource(format!("ring slot {} missing", slot_index)))?;
        let primary = slot.primary_mut();
        primary.reset()?;
        primary.begin()?;
        for pass in self.passes.values_mut() {
            pass.pool.begin_frame(slot_index)?;
            pass.recorded = false;
        }
        Ok(())
    }

    /// CPU copy of the frame uniform block, uploaded by `end_frame`
    pub fn frame_uniforms_mut(&mut self) -> Result<&mut FrameUniforms> {
        let slot = self.active_slot()?;
        self.ring
            .slot_mut(slot)
            .map(|s| s.uniforms_mut())
            .ok_or_else(|| Error::InvalidResource(format!("ring slot {} missing", slot)))
    }

    /// Run `release` once the GPU finished the frame in progress
    pub fn defer_release<F>(&mut self, release: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = self.active_slot()?;
        match self.ring.slot_mut(slot) {
            Some(s) => {
                s.defer(Box::new(release));
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("ring slot {} missing", slot))),
        }
    }

    /// Record `draw_list` into `pass` and add it to the frame's primary list
    ///
    /// Each pass records at most once per frame.
    ///
    /// # Errors
    ///
    /// Any recording error aborts the frame before it is returned.
    pub fn record_and_submit(
        &mut self,
        pass: PassId,
        viewport: Viewport,
        scissor: Rect2D,
        draw_list: &DrawList,
    ) -> Result<RecordStats> {
        match self.record_pass(pass, viewport, scissor, draw_list) {
            Ok(stats) => {
                if let Some(active) = self.active.as_mut() {
                    active.stats.draw_calls += stats.draw_calls;
                    active.stats.chunks += stats.chunks;
                    active.stats.serial_draws += stats.serial_draws;
                }
                Ok(stats)
            }
            Err(e) => {
                if self.active.is_some() {
                    self.abort_frame();
                }
                Err(e)
            }
        }
    }

    fn record_pass(
        &mut self,
        pass_id: PassId,
        viewport: Viewport,
        scissor: Rect2D,
        draw_list: &DrawList,
    ) -> Result<RecordStats> {
        let (slot_index, image_index) = match &self.active {
            Some(active) => (active.slot, active.image_index),
            None => return Err(self.no_active_frame("record_and_submit")),
        };
        let pass = self
            .passes
            .get_mut(pass_id)
            .ok_or_else(|| Error::InvalidResource("unknown pass".to_string()))?;
        if pass.recorded {
            return Err(misuse(&format!("pass '{}' recorded twice in one frame", pass.desc.name)));
        }
        let target = *pass.desc.target_for(image_index).ok_or_else(|| {
            Error::InvalidResource(format!(
                "pass '{}' has no target for image {:?}",
                pass.desc.name, image_index
            ))
        })?;
        let slot = self
            .ring
            .slot_mut(slot_index)
            .ok_or_else(|| Error::InvalidResource(format!("ring slot {} missing", slot_index)))?;

        let render_area = Rect2D { x: 0, y: 0, width: target.width, height: target.height };
        slot.primary_mut().begin_render_pass(
            &target,
            render_area,
            &pass.desc.clear_values,
            SubpassContents::SecondaryCommandBuffers,
        )?;

        let record_target = RecordTarget {
            viewport,
            scissor,
            inheritance: InheritanceInfo::from(&target),
            frame_group: Some(slot.uniform_group()),
        };
        let stats = self.recorder.record(slot, &mut pass.pool, &record_target, draw_list)?;

        slot.primary_mut().end_render_pass()?;
        pass.recorded = true;
        Ok(stats)
    }

    /// Close the primary list, submit it and present
    ///
    /// # Returns
    ///
    /// Statistics of the submitted frame
    pub fn end_frame(&mut self) -> Result<FrameStats> {
        let active = match self.active.take() {
            Some(active) => active,
            None => return Err(self.no_active_frame("end_frame")),
        };

        let stats = match self.submit_frame(&active) {
            Ok(stats) => stats,
            Err(e) => {
                self.abort_slot(&active);
                return Err(e);
            }
        };
        self.last_stats = stats;

        if let (Some(swapchain), Some(image)) = (self.swapchain.as_mut(), active.image_index) {
            let wait = self
                .ring
                .slot(active.slot)
                .map(|s| s.render_finished())
                .ok_or_else(|| Error::InvalidResource(format!("ring slot {} missing", active.slot)))?;
            swapchain.present(image, wait)?;
        }
        Ok(stats)
    }

    fn submit_frame(&mut self, active: &ActiveFrame) -> Result<FrameStats> {
        let slot = self
            .ring
            .slot_mut(active.slot)
            .ok_or_else(|| Error::InvalidResource(format!("ring slot {} missing", active.slot)))?;

        slot.flush()?;
        slot.primary_mut().end()?;

        let image_available = [slot.image_available()];
        let render_finished = [slot.render_finished()];
        let (waits, signals): (&[SemaphoreHandle], &[SemaphoreHandle]) = match active.image_index {
            Some(_) => (&image_available, &render_finished),
            None => (&[], &[]),
        };
        self.device.submit(&SubmitInfo {
            command_list: slot.primary(),
            wait_semaphores: waits,
            signal_semaphores: signals,
            fence: Some(slot.fence()),
        })?;
        slot.mark_submitted();

        Ok(FrameStats {
            transient_bytes: slot.transient_bytes(),
            backing_buffers: slot.backing_count() as u32,
            ..active.stats
        })
    }

    /// Drop the frame in progress without submitting anything
    pub fn abort_frame(&mut self) {
        if let Some(active) = self.active.take() {
            self.abort_slot(&active);
        }
    }

    fn abort_slot(&mut self, active: &ActiveFrame) {
        if let Some(slot) = self.ring.slot_mut(active.slot) {
            if let Err(e) = slot.primary_mut().reset() {
                crate::engine_warn!("nebula3d::frame", "Failed to reset aborted primary list: {}", e);
            }
        }
        if let Some(image) = active.image_index {
            if let Err(e) = self.return_image(active.slot, image) {
                crate::engine_error!(
                    "nebula3d::frame",
                    "Failed to return image {} of aborted frame {}: {}",
                    image, active.frame_index, e
                );
            }
        }
        self.aborted = Some(active.frame_index);
        crate::engine_warn!("nebula3d::frame", "Frame {} aborted", active.frame_index);
    }

    /// Present `image` unchanged after its frame was aborted
    ///
    /// An empty primary list waits on the slot's image-available semaphore
    /// and signals render-finished under the slot fence; the present waits on
    /// render-finished like a normal frame.
    fn return_image(&mut self, slot_index: usize, image: u32) -> Result<()> {
        let slot = self
            .ring
            .slot_mut(slot_index)
            .ok_or_else(|| Error::InvalidResource(format!("ring slot {} missing", slot_index)))?;
        let primary = slot.primary_mut();
        primary.begin()?;
        primary.end()?;

        self.device.submit(&SubmitInfo {
            command_list: slot.primary(),
            wait_semaphores: &[slot.image_available()],
            signal_semaphores: &[slot.render_finished()],
            fence: Some(slot.fence()),
        })?;
        slot.mark_submitted();

        let wait = slot.render_finished();
        match self.swapchain.as_mut() {
            Some(swapchain) => swapchain.present(image, wait),
            None => Err(Error::InvalidResource(format!("image {} acquired without a swapchain", image))),
        }
    }

    /// Statistics of the last submitted frame
    pub fn stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Block until the device finished all submitted frames
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    fn active_slot(&self) -> Result<usize> {
        match &self.active {
            Some(active) => Ok(active.slot),
            None => Err(self.no_active_frame("frame resource access")),
        }
    }

    fn no_active_frame(&self, operation: &str) -> Error {
        match self.aborted {
            Some(frame) => Error::FrameAborted(format!("{} after frame {} was aborted", operation, frame)),
            None => misuse(&format!("{} without begin_frame", operation)),
        }
    }
}

fn misuse(message: &str) -> Error {
    crate::engine_error!("nebula3d::frame", "{}", message);
    Error::SynchronizationMisuse(message.to_string())
}

#[cfg(test)]
#[path = "frame_renderer_tests.rs"]
mod tests;

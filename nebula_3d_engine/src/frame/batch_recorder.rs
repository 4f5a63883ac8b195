/// Parallel batch recorder.
///
/// One `record` call turns a sorted draw list into secondary command lists
/// executed into the slot's primary list:
///
/// 1. Partition the opaque + alpha-tested batches into contiguous chunks.
/// 2. Dispatch each chunk to a worker with its own secondary list and lane allocators.
/// 3. Record the alpha-blended batches serially on the calling thread.
/// 4. Join every chunk, even after a failure.
/// 5. Execute the secondaries in chunk order, then the serial lane.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use glam::Mat4;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroupHandle, CommandList, InheritanceInfo, PipelineHandle, Rect2D, Viewport,
};
use crate::scene::{DrawBatch, DrawList, GeometryKind, Material};
use super::command_buffer_pool::{CheckedOutList, CommandBufferPool};
use super::frame_config::FrameConfig;
use super::frame_resource_ring::{FrameLane, FrameSlot};
use super::transient_buffer::DYNAMIC_UNIFORM_RANGE;
use super::worker_pool::{panic_message, JobHandle, WorkerPool};

/// Set of the per-frame uniform group (dynamic offset 0)
pub const FRAME_SET: u32 = 0;
/// Set of the per-draw transient uniform (dynamic offset per draw)
pub const OBJECT_SET: u32 = 1;
/// First set of the material binding groups
pub const MATERIAL_SET_BASE: u32 = 2;
/// Vertex input binding of the geometry's vertex buffer
pub const VERTEX_BINDING: u32 = 0;
/// Vertex input binding of streamed per-instance data
pub const INSTANCE_BINDING: u32 = 1;

/// Split `len` batches into contiguous chunks for `workers` threads.
///
/// The chunk size is `ceil(len / workers)` floored at `min_chunk`, so there are
/// never more chunks than workers and small lists stay on one worker.
pub fn partition(len: usize, workers: usize, min_chunk: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunk = len.div_ceil(workers.max(1)).max(min_chunk.max(1));
    (0..len)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(len))
        .collect()
}

/// Where a sub-pass records to
#[derive(Debug, Clone, Copy)]
pub struct RecordTarget {
    pub viewport: Viewport,
    pub scissor: Rect2D,
    pub inheritance: InheritanceInfo,
    /// Per-frame uniform group bound at `FRAME_SET` after each pipeline change
    pub frame_group: Option<BindingGroupHandle>,
}

/// Counters of one `record` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub draw_calls: u32,
    pub chunks: u32,
    pub serial_draws: u32,
}

struct ChunkOutcome {
    list: CheckedOutList,
    lane: FrameLane,
    result: Result<u32>,
}

#[derive(Default)]
struct BindState {
    pipeline: Option<PipelineHandle>,
    material: Option<Arc<Material>>,
}

/// Records draw lists across the worker pool
pub struct BatchRecorder {
    workers: WorkerPool,
    min_chunk_size: usize,
    parallel: bool,
}

impl BatchRecorder {
    pub fn new(config: &FrameConfig) -> Result<Self> {
        Ok(Self {
            workers: WorkerPool::new(config.worker_count)?,
            min_chunk_size: config.min_chunk_size,
            parallel: config.parallel_recording,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.worker_count()
    }

    /// Index of the serial lane in slots and pools
    pub fn serial_lane(&self) -> usize {
        self.workers.worker_count()
    }

    /// Record `draw_list` and execute the result into the slot's primary list
    ///
    /// The primary list must be inside a render pass begun with
    /// `SubpassContents::SecondaryCommandBuffers`.
    ///
    /// # Arguments
    ///
    /// * `slot` - Acquired ring slot; its lanes feed the transient allocations
    /// * `pool` - Secondary lists of the sub-pass, switched to the slot
    /// * `target` - Viewport, scissor and inheritance of the sub-pass
    /// * `draw_list` - Culled and sorted batches
    ///
    /// # Errors
    ///
    /// `ChunkFailed` for the lowest failing chunk, raised only after every
    /// chunk was joined and every open secondary ended. Nothing is executed
    /// into the primary list in that case.
    pub fn record(
        &self,
        slot: &mut FrameSlot,
        pool: &mut CommandBufferPool,
        target: &RecordTarget,
        draw_list: &DrawList,
    ) -> Result<RecordStats> {
        let lane_count = self.serial_lane() + 1;
        if slot.lane_count() != lane_count || pool.lanes() != lane_count {
            return Err(Error::InvalidResource(format!(
                "recorder needs {} lanes, slot has {} and pool has {}",
                lane_count, slot.lane_count(), pool.lanes()
            )));
        }

        let mut lanes: Vec<Option<FrameLane>> = slot.take_lanes().into_iter().map(Some).collect();
        let mut result = self.record_lanes(&mut lanes, pool, target, draw_list);
        if let Err(e) = slot.restore_lanes(lanes) {
            result = result.and(Err(e));
        }

        let (stats, order) = match result {
            Ok(recorded) => recorded,
            Err(e) => {
                if let Err(end_error) = pool.end_open() {
                    crate::engine_warn!(
                        "nebula3d::frame",
                        "Failed to end open secondaries after a recording error: {}",
                        end_error
                    );
                }
                return Err(e);
            }
        };

        let lists = pool.executable(&order)?;
        if !lists.is_empty() {
            slot.primary_mut().execute_commands(&lists)?;
        }
        Ok(stats)
    }

    /// Dispatch, serial recording and join; returns the lanes to execute in order
    fn record_lanes(
        &self,
        lanes: &mut [Option<FrameLane>],
        pool: &mut CommandBufferPool,
        target: &RecordTarget,
        draw_list: &DrawList,
    ) -> Result<(RecordStats, Vec<usize>)> {
        let serial_lane = self.serial_lane();
        let mut stats = RecordStats::default();

        let (parallel_batches, serial_batches): (Vec<&DrawBatch>, Vec<&DrawBatch>) = if self.parallel {
            (
                draw_list.opaque().iter().chain(draw_list.alpha_test()).collect(),
                draw_list.alpha_blend().iter().collect(),
            )
        } else {
            (
                Vec::new(),
                draw_list
                    .opaque()
                    .iter()
                    .chain(draw_list.alpha_test())
                    .chain(draw_list.alpha_blend())
                    .collect(),
            )
        };

        let ranges = partition(parallel_batches.len(), self.workers.worker_count(), self.min_chunk_size);
        crate::engine_trace!(
            "nebula3d::frame",
            "Partitioned {} batches into {} chunks, {} serial",
            parallel_batches.len(), ranges.len(), serial_batches.len()
        );

        // Dispatch
        let mut first_error: Option<Error> = None;
        let mut handles: Vec<(usize, JobHandle<ChunkOutcome>)> = Vec::with_capacity(ranges.len());
        for (chunk, range) in ranges.iter().enumerate() {
            match self.dispatch(chunk, range.clone(), &parallel_batches, lanes, pool, target) {
                Ok(handle) => handles.push((chunk, handle)),
                Err(e) => {
                    first_error = Some(e);
                    break;
                }
            }
        }

        // Serial lane, on this thread while the workers record
        let mut serial_result = Ok(0);
        if first_error.is_none() && !serial_batches.is_empty() {
            serial_result = Self::record_serial(serial_lane, lanes, pool, target, &serial_batches);
        }

        // Join every dispatched chunk before reporting anything
        for (chunk, handle) in handles {
            match handle.join() {
                Ok(outcome) => {
                    lanes[chunk] = Some(outcome.lane);
                    if let Err(e) = pool.checkin(outcome.list) {
                        first_error.get_or_insert(e);
                    }
                    match outcome.result {
                        Ok(draws) => stats.draw_calls += draws,
                        Err(e) => {
                            crate::engine_error!(
                                "nebula3d::frame",
                                "Recording chunk {} failed: {}",
                                chunk, e
                            );
                            first_error.get_or_insert(Error::ChunkFailed {
                                chunk,
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    // The lane stays None and is rebuilt by the slot on restore
                    crate::engine_error!("nebula3d::frame", "Recording chunk {} was lost: {}", chunk, e);
                    first_error.get_or_insert(Error::ChunkFailed { chunk, message: e.to_string() });
                    if let Err(replace_error) = pool.replace_lost(chunk) {
                        crate::engine_error!(
                            "nebula3d::frame",
                            "Failed to replace the command list of lost chunk {}: {}",
                            chunk, replace_error
                        );
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        let serial_draws = serial_result?;

        stats.chunks = ranges.len() as u32;
        stats.serial_draws = serial_draws;
        stats.draw_calls += serial_draws;

        let mut order: Vec<usize> = (0..ranges.len()).collect();
        if !serial_batches.is_empty() {
            order.push(serial_lane);
        }
        Ok((stats, order))
    }

    fn dispatch(
        &self,
        chunk: usize,
        range: Range<usize>,
        batches: &[&DrawBatch],
        lanes: &mut [Option<FrameLane>],
        pool: &mut CommandBufferPool,
        target: &RecordTarget,
    ) -> Result<JobHandle<ChunkOutcome>> {
        let lane = lanes
            .get_mut(chunk)
            .and_then(Option::take)
            .ok_or_else(|| Error::InvalidResource(format!("no lane for chunk {}", chunk)))?;
        let list = match pool.checkout(chunk, &target.inheritance) {
            Ok(list) => list,
            Err(e) => {
                lanes[chunk] = Some(lane);
                return Err(e);
            }
        };
        // The job owns its chunk of batches
        let chunk_batches: Vec<DrawBatch> = batches[range].iter().map(|&batch| batch.clone()).collect();
        let target = *target;

        self.workers
            .spawn(move || record_chunk(list, lane, target, chunk_batches))
    }

    fn record_serial(
        serial_lane: usize,
        lanes: &mut [Option<FrameLane>],
        pool: &mut CommandBufferPool,
        target: &RecordTarget,
        batches: &[&DrawBatch],
    ) -> Result<u32> {
        let lane = lanes
            .get_mut(serial_lane)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::InvalidResource("serial lane missing".to_string()))?;
        let commands = pool.get(serial_lane, &target.inheritance)?;
        let draws = record_batches(commands, lane, target, batches.iter().copied())?;
        pool.end(serial_lane)?;
        Ok(draws)
    }
}

/// Worker side of one chunk; always hands back its list and lane
///
/// A panic anywhere in the chunk, ending the list included, becomes the
/// chunk's error. A list left open by a panic is ended by `end_open`.
fn record_chunk(
    mut list: CheckedOutList,
    mut lane: FrameLane,
    target: RecordTarget,
    batches: Vec<DrawBatch>,
) -> ChunkOutcome {
    let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
        let result = list
            .commands()
            .and_then(|commands| record_batches(commands, &mut lane, &target, batches.iter()));
        if list.is_open() {
            if let Err(e) = list.end() {
                return result.and(Err(e));
            }
        }
        result
    }));
    let result = match recorded {
        Ok(result) => result,
        Err(payload) => Err(Error::BackendError(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    };
    ChunkOutcome { list, lane, result }
}

/// Record batches in order into one list; returns the number of draws
fn record_batches<'a>(
    commands: &mut dyn CommandList,
    lane: &mut FrameLane,
    target: &RecordTarget,
    batches: impl Iterator<Item = &'a DrawBatch>,
) -> Result<u32> {
    commands.set_viewport(target.viewport)?;
    commands.set_scissor(target.scissor)?;

    let mut state = BindState::default();
    let mut draws = 0;
    for batch in batches {
        record_batch(commands, lane, target, batch, &mut state)?;
        draws += 1;
    }
    Ok(draws)
}

fn record_batch(
    commands: &mut dyn CommandList,
    lane: &mut FrameLane,
    target: &RecordTarget,
    batch: &DrawBatch,
    state: &mut BindState,
) -> Result<()> {
    let material = &batch.material;
    let pipeline = material.pipeline;

    if state.pipeline != Some(pipeline) {
        commands.bind_pipeline(&pipeline)?;
        if let Some(group) = target.frame_group {
            commands.bind_binding_group(&pipeline, FRAME_SET, group, &[0])?;
        }
        state.pipeline = Some(pipeline);
        state.material = None;
    }
    if !state.material.as_ref().is_some_and(|bound| Arc::ptr_eq(bound, material)) {
        for (set, group) in (MATERIAL_SET_BASE..).zip(&material.binding_groups) {
            commands.bind_binding_group(&pipeline, set, *group, &[])?;
        }
        state.material = Some(Arc::clone(material));
    }

    let geometry = &batch.geometry;
    commands.bind_vertex_buffer(VERTEX_BINDING, geometry.vertex_buffer.as_ref(), geometry.vertex_offset)?;
    if let Some(index) = &geometry.index {
        commands.bind_index_buffer(index.buffer.as_ref(), index.offset, index.index_type)?;
    }

    match &batch.kind {
        GeometryKind::Instanced => {
            let bytes: &[u8] = match &batch.instance_data {
                Some(data) => &data[..],
                None => bytemuck::cast_slice(&batch.world_transforms[..]),
            };
            if bytes.is_empty() {
                return Err(Error::InvalidResource(format!(
                    "instanced batch of drawable {} has no instance data",
                    batch.drawable.0
                )));
            }
            let instances = lane.vertices.allocate(bytes.len() as u64)?;
            instances.write(bytes)?;
            commands.bind_vertex_buffer(INSTANCE_BINDING, instances.buffer().as_ref(), instances.offset())?;
        }
        GeometryKind::Skinned => {
            bind_object_uniform(commands, lane, &pipeline, bytemuck::cast_slice(&batch.world_transforms[..]))?;
        }
        _ => {
            let world = batch.world_transforms.first().copied().unwrap_or(Mat4::IDENTITY);
            bind_object_uniform(commands, lane, &pipeline, bytemuck::bytes_of(&world))?;
        }
    }

    match &batch.kind {
        GeometryKind::Indirect { buffer, offset, draw_count, stride } => {
            commands.draw_indexed_indirect(buffer.as_ref(), *offset, *draw_count, *stride)
        }
        _ => {
            let instances = batch.instance_count();
            match &geometry.index {
                Some(_) => commands.draw_indexed(geometry.count, instances, geometry.first, geometry.base_vertex, 0),
                None => commands.draw(geometry.count, instances, geometry.first, 0),
            }
        }
    }
}

/// Copy per-draw uniform data into the lane and bind it at `OBJECT_SET`
fn bind_object_uniform(
    commands: &mut dyn CommandList,
    lane: &mut FrameLane,
    pipeline: &PipelineHandle,
    bytes: &[u8],
) -> Result<()> {
    if bytes.is_empty() || bytes.len() as u64 > DYNAMIC_UNIFORM_RANGE {
        return Err(Error::InvalidResource(format!(
            "per-draw uniform of {} bytes (must be 1..={})",
            bytes.len(), DYNAMIC_UNIFORM_RANGE
        )));
    }
    let uniform = lane.uniforms.allocate(bytes.len() as u64)?;
    uniform.write(bytes)?;
    let group = uniform.binding_group().ok_or_else(|| {
        Error::InvalidResource("transient uniform allocation without binding group".to_string())
    })?;
    commands.bind_binding_group(pipeline, OBJECT_SET, group, &[uniform.dynamic_offset()?])
}

#[cfg(test)]
#[path = "batch_recorder_tests.rs"]
mod tests;

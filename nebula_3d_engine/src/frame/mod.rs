//! Frame pipeline: per-frame resources, parallel recording, and submission
//!
//! `FrameRenderer` is the entry point. The other types are exposed for
//! callers that drive the ring and the recorder themselves.

mod frame_config;
mod transient_buffer;
mod frame_resource_ring;
mod command_buffer_pool;
mod worker_pool;
mod batch_recorder;
mod frame_renderer;

pub use frame_config::{FrameConfig, FrameStats};
pub use transient_buffer::{
    TransientBuffer, TransientBufferAllocator, UsageClass, DYNAMIC_UNIFORM_RANGE,
};
pub use frame_resource_ring::{
    DeferredAction, FrameLane, FrameResourceRing, FrameSlot, FrameUniforms,
};
pub use command_buffer_pool::{CheckedOutList, CommandBufferPool, EntryState};
pub use worker_pool::{JobHandle, WorkerPool};
pub use batch_recorder::{
    partition, BatchRecorder, RecordStats, RecordTarget,
    FRAME_SET, OBJECT_SET, MATERIAL_SET_BASE, VERTEX_BINDING, INSTANCE_BINDING,
};
pub use frame_renderer::{FrameRenderer, PassDesc, PassId};

/*!
# Nebula 3D Engine

Frame pipeline core of the Nebula 3D engine.

This crate turns a camera and a set of drawables into submitted GPU work.
It is backend-agnostic: the GPU is reached through the [`GraphicsDevice`]
trait, implemented by backend crates such as `nebula_3d_engine_renderer_vulkan`.

## Architecture

- **Camera / Frustum**: view volume extraction and bounding-volume tests
- **FrustumCuller**: turns drawables into a sorted per-view `DrawList`
- **TransientBufferAllocator**: per-frame bump allocation of upload memory
- **FrameResourceRing**: N frames in flight, each guarded by a fence
- **CommandBufferPool**: per-worker secondary command lists
- **BatchRecorder**: parallel recording with a deterministic merge order
- **FrameRenderer**: `begin_frame` / `record_and_submit` / `end_frame`

[`GraphicsDevice`]: crate::graphics_device::GraphicsDevice
*/

// Internal modules
mod error;
mod engine;
mod utils;
pub mod log;
pub mod camera;
pub mod graphics_device;
pub mod scene;
pub mod frame;

// Main nebula3d namespace module
pub mod nebula3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    // Frame pipeline entry point
    pub use crate::frame::{FrameConfig, FrameRenderer, FrameStats, PassDesc, PassId};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are NOT re-exported here - they are internal only
    }

    // Camera and visibility primitives
    pub mod camera {
        pub use crate::camera::*;
    }

    // Device interface implemented by backends
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Drawables, batches and culling
    pub mod scene {
        pub use crate::scene::*;
    }

    // Frame resources and recording
    pub mod frame {
        pub use crate::frame::*;
    }
}

// Re-export math library at crate root
pub use glam;

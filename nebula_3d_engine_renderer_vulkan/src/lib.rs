/*!
# Nebula 3D Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` interface consumed by the
nebula_3d_engine frame pipeline.

This crate uses the Ash library for Vulkan bindings and gpu-allocator for
memory management. The device is headless: swapchains and windows belong to
the application shell.

```no_run
use std::sync::Arc;
use nebula_3d_engine::nebula3d::device::GraphicsDevice;
use nebula_3d_engine_renderer_vulkan::nebula3d::{VulkanConfig, VulkanGraphicsDevice};

let device: Arc<dyn GraphicsDevice> = Arc::new(VulkanGraphicsDevice::new(VulkanConfig::default())?);
# Ok::<(), nebula_3d_engine::nebula3d::Error>(())
```
*/

mod vulkan_config;
mod vulkan_context;
mod vulkan_convert;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_graphics_device;
#[cfg(feature = "vulkan-validation")]
mod vulkan_debug;

pub mod nebula3d {
    pub use crate::vulkan_config::VulkanConfig;
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;

    #[cfg(feature = "vulkan-validation")]
    pub use crate::vulkan_debug::{validation_stats, reset_validation_stats, ValidationStats};
}

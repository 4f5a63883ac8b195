/// Graphics device module - the narrow device interface the frame pipeline consumes

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod command_list;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use command_list::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;

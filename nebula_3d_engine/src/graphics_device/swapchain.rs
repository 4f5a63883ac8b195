/// Swapchain trait - presentation surface consumed by the frame renderer

use crate::error::Result;
use crate::graphics_device::SemaphoreHandle;

/// Presentation swapchain
///
/// Window and surface creation are owned by the application; the frame renderer
/// only acquires images and presents them.
pub trait Swapchain: Send {
    /// Acquire the next presentable image
    ///
    /// # Arguments
    ///
    /// * `signal` - Semaphore signaled when the image is ready to be rendered to
    ///
    /// # Returns
    ///
    /// Index of the acquired image
    fn acquire_next_image(&mut self, signal: SemaphoreHandle) -> Result<u32>;

    /// Queue an image for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: SemaphoreHandle) -> Result<()>;

    /// Number of images in the swapchain
    fn image_count(&self) -> usize;
}

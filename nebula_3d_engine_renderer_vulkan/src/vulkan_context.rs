/// GpuContext - Shared Vulkan objects behind every buffer and command list
///
/// Contains everything needed for GPU operations:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics queue for submission
/// - Instance and debug messenger, destroyed last

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

/// Shared GPU context for all Vulkan resources.
///
/// Buffers and command lists each hold an `Arc<GpuContext>`, so the logical
/// device outlives every object created from it. The device and the instance
/// are destroyed when the last reference goes away.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator (shared, requires mutex for thread safety)
    /// Wrapped in ManuallyDrop to ensure it's dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Graphics queue (vkQueueSubmit requires external synchronization)
    pub graphics_queue: Mutex<vk::Queue>,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// `nonCoherentAtomSize` of the physical device
    pub non_coherent_atom_size: u64,

    /// Vulkan entry (keeps the loader library alive)
    _entry: ash::Entry,

    /// Vulkan instance
    instance: ash::Instance,

    /// Debug utils loader and messenger (validation builds only)
    pub(crate) debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl GpuContext {
    /// Create a new GPU context
    ///
    /// # Arguments
    ///
    /// * `entry` - Loaded Vulkan entry points
    /// * `instance` - Vulkan instance
    /// * `device` - Vulkan logical device
    /// * `allocator` - GPU memory allocator
    /// * `graphics_queue` - Graphics queue for command submission
    /// * `graphics_queue_family` - Graphics queue family index
    /// * `non_coherent_atom_size` - Flush granularity of host-visible memory
    /// * `debug_messenger` - Debug utils loader and messenger (if validation enabled)
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        non_coherent_atom_size: u64,
        debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
            graphics_queue: Mutex::new(graphics_queue),
            graphics_queue_family,
            non_coherent_atom_size,
            _entry: entry,
            instance,
            debug_messenger,
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Free VkDeviceMemory pages BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            // Destroy debug messenger BEFORE the instance
            #[cfg(feature = "vulkan-validation")]
            crate::vulkan_debug::cleanup_debug_config();
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

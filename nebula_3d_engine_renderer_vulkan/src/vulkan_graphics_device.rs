/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Headless: the device is created without a surface. Presentation belongs
/// to the application shell, which hands the frame renderer its own swapchain.

use nebula_3d_engine::nebula3d::{Result, Error};
use nebula_3d_engine::nebula3d::device::{
    BindingGroupHandle, Buffer as DeviceBuffer, BufferDesc, BufferUsage,
    CommandList as DeviceCommandList, CommandListLevel, DeviceLimits, FenceHandle,
    GraphicsDevice, MemoryLocation, SemaphoreHandle, SubmitInfo,
};
use nebula_3d_engine::{engine_debug, engine_info, engine_warn, engine_error, engine_err};
use ash::vk::{self, Handle};
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use rustc_hash::FxHashSet;
use std::ffi::{c_char, CString};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_config::VulkanConfig;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{buffer_usage_to_vk, limit_alignment, memory_location_to_gpu_allocator};

type DebugMessenger = (ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT);

/// Descriptor sets per pool; a new pool is created when the last one is exhausted
const SETS_PER_DESCRIPTOR_POOL: u32 = 256;

#[cfg(feature = "vulkan-validation")]
const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan graphics device
///
/// Owns the synchronization objects it hands out and destroys any that are
/// still alive when it is dropped. Buffers and command lists keep the shared
/// `GpuContext` alive on their own.
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    limits: DeviceLimits,
    device_name: String,
    /// Descriptor pools for dynamic uniform groups (grows when exhausted)
    descriptor_pools: Mutex<Vec<vk::DescriptorPool>>,
    /// Set layout: binding 0 = UNIFORM_BUFFER_DYNAMIC, vertex + fragment
    dynamic_uniform_layout: vk::DescriptorSetLayout,
    fences: Mutex<FxHashSet<u64>>,
    semaphores: Mutex<FxHashSet<u64>>,
}

impl VulkanGraphicsDevice {
    /// Create a headless Vulkan device on the first physical device with a graphics queue
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when the loader, instance, device or allocator
    /// cannot be created.
    pub fn new(config: VulkanConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("nebula3d::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| Error::InitializationFailed(format!("Invalid application name: {}", e)))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Nebula3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let validation = Self::validation_requested(&entry, &config);

            #[allow(unused_mut)]
            let mut extension_names: Vec<*const c_char> = Vec::new();
            #[allow(unused_mut)]
            let mut layer_names: Vec<*const c_char> = Vec::new();
            #[cfg(feature = "vulkan-validation")]
            {
                if validation {
                    extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                    layer_names.push(VALIDATION_LAYER.as_ptr());
                }
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("nebula3d::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            #[cfg(feature = "vulkan-validation")]
            let debug_messenger: Option<DebugMessenger> = if validation {
                match crate::vulkan_debug::create_debug_messenger(&entry, &instance) {
                    Ok(messenger) => Some(messenger),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };
            #[cfg(not(feature = "vulkan-validation"))]
            let debug_messenger: Option<DebugMessenger> = None;

            // Pick Physical Device
            let physical_device = instance
                .enumerate_physical_devices()
                .ok()
                .and_then(|devices| {
                    devices.into_iter().find(|&pd| {
                        instance
                            .get_physical_device_queue_family_properties(pd)
                            .iter()
                            .any(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    })
                });
            let Some(physical_device) = physical_device else {
                engine_error!("nebula3d::vulkan", "No Vulkan-capable GPU with a graphics queue found");
                if let Some((debug_utils, messenger)) = debug_messenger {
                    debug_utils.destroy_debug_utils_messenger(messenger, None);
                }
                instance.destroy_instance(None);
                return Err(Error::InitializationFailed("No Vulkan-capable GPU found".to_string()));
            };

            let graphics_family_index = instance
                .get_physical_device_queue_family_properties(physical_device)
                .iter()
                .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|i| i as u32)
                .unwrap_or_default();

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());
            let limits = Self::device_limits(&properties.limits);

            // Create Logical Device
            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family_index)
                .queue_priorities(&queue_priorities)];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos);

            let device = match instance.create_device(physical_device, &device_create_info, None) {
                Ok(device) => device,
                Err(e) => {
                    engine_error!("nebula3d::vulkan", "Failed to create logical device: {:?}", e);
                    if let Some((debug_utils, messenger)) = debug_messenger {
                        debug_utils.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                    return Err(Error::InitializationFailed(format!("Failed to create device: {:?}", e)));
                }
            };

            let graphics_queue = device.get_device_queue(graphics_family_index, 0);

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    engine_error!("nebula3d::vulkan", "Failed to create GPU allocator: {:?}", e);
                    device.destroy_device(None);
                    if let Some((debug_utils, messenger)) = debug_messenger {
                        debug_utils.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            // From here on GpuContext owns device, instance and messenger destruction
            let ctx = Arc::new(GpuContext::new(
                entry,
                instance,
                device,
                allocator,
                graphics_queue,
                graphics_family_index,
                limits.non_coherent_atom_size,
                debug_messenger,
            ));

            let dynamic_uniform_layout = Self::create_dynamic_uniform_layout(&ctx.device)?;
            let descriptor_pool = match Self::create_descriptor_pool(&ctx.device) {
                Ok(pool) => pool,
                Err(e) => {
                    ctx.device.destroy_descriptor_set_layout(dynamic_uniform_layout, None);
                    return Err(e);
                }
            };

            engine_info!("nebula3d::vulkan",
                "Vulkan device ready: {} (queue family {}, validation {})",
                device_name, graphics_family_index, if validation { "on" } else { "off" });
            engine_debug!("nebula3d::vulkan", "Device limits: {:?}", limits);

            Ok(Self {
                ctx,
                limits,
                device_name,
                descriptor_pools: Mutex::new(vec![descriptor_pool]),
                dynamic_uniform_layout,
                fences: Mutex::new(FxHashSet::default()),
                semaphores: Mutex::new(FxHashSet::default()),
            })
        }
    }

    /// Name of the physical device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Set layout of the groups built by `create_dynamic_uniform_group`
    ///
    /// Pipelines that consume transient uniforms declare this layout at the
    /// per-frame and per-draw set indices.
    pub fn dynamic_uniform_layout(&self) -> vk::DescriptorSetLayout {
        self.dynamic_uniform_layout
    }

    #[cfg(feature = "vulkan-validation")]
    fn validation_requested(entry: &ash::Entry, config: &VulkanConfig) -> bool {
        if !config.enable_validation {
            return false;
        }
        let available = unsafe { entry.enumerate_instance_layer_properties() }
            .map(|layers| {
                layers.iter().any(|layer| {
                    layer.layer_name_as_c_str().map_or(false, |name| name == VALIDATION_LAYER)
                })
            })
            .unwrap_or(false);
        if !available {
            engine_warn!("nebula3d::vulkan",
                "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        available
    }

    #[cfg(not(feature = "vulkan-validation"))]
    fn validation_requested(_entry: &ash::Entry, config: &VulkanConfig) -> bool {
        if config.enable_validation {
            engine_warn!("nebula3d::vulkan",
                "Validation requested but the crate was built without the vulkan-validation feature");
        }
        false
    }

    fn device_limits(limits: &vk::PhysicalDeviceLimits) -> DeviceLimits {
        DeviceLimits {
            min_uniform_buffer_offset_alignment: limit_alignment(limits.min_uniform_buffer_offset_alignment),
            min_storage_buffer_offset_alignment: limit_alignment(limits.min_storage_buffer_offset_alignment),
            min_texel_buffer_offset_alignment: limit_alignment(limits.min_texel_buffer_offset_alignment),
            min_vertex_buffer_offset_alignment: 1,
            // Offsets of index and indirect buffers must be multiples of 4
            min_index_buffer_offset_alignment: 4,
            min_indirect_buffer_offset_alignment: 4,
            non_coherent_atom_size: limit_alignment(limits.non_coherent_atom_size),
            max_push_constants_size: limits.max_push_constants_size,
        }
    }

    fn create_dynamic_uniform_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)];
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        unsafe {
            device.create_descriptor_set_layout(&info, None)
                .map_err(|e| {
                    engine_error!("nebula3d::vulkan", "Failed to create descriptor set layout: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create descriptor set layout: {:?}", e))
                })
        }
    }

    /// Create a descriptor pool with fixed capacity.
    /// Called during init and when the current pool is exhausted.
    fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: SETS_PER_DESCRIPTOR_POOL,
        }];
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(SETS_PER_DESCRIPTOR_POOL);

        unsafe {
            device.create_descriptor_pool(&info, None)
                .map_err(|e| {
                    engine_error!("nebula3d::vulkan", "Failed to create descriptor pool: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
                })
        }
    }

    fn allocate_dynamic_uniform_set(&self) -> Result<vk::DescriptorSet> {
        let layouts = [self.dynamic_uniform_layout];
        let mut pools = lock(&self.descriptor_pools, "descriptor pools")?;
        let current_pool = pools
            .last()
            .copied()
            .ok_or_else(|| engine_err!("nebula3d::vulkan", "No descriptor pool available"))?;
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(current_pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            match self.ctx.device.allocate_descriptor_sets(&allocate_info) {
                Ok(sets) => sets,
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    let new_pool = Self::create_descriptor_pool(&self.ctx.device)?;
                    pools.push(new_pool);
                    engine_info!("nebula3d::vulkan",
                        "Descriptor pool exhausted, created new pool (total: {})",
                        pools.len()
                    );
                    let retry_info = vk::DescriptorSetAllocateInfo::default()
                        .descriptor_pool(new_pool)
                        .set_layouts(&layouts);
                    self.ctx.device.allocate_descriptor_sets(&retry_info)
                        .map_err(|e| engine_err!("nebula3d::vulkan",
                            "Failed to allocate descriptor set after pool growth: {:?}", e))?
                }
                Err(e) => return Err(engine_err!("nebula3d::vulkan",
                    "Failed to allocate descriptor set: {:?}", e)),
            }
        };

        sets.into_iter()
            .next()
            .ok_or_else(|| engine_err!("nebula3d::vulkan", "Descriptor set allocation returned no set"))
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| engine_err!("nebula3d::vulkan", "Lock poisoned: {}", what))
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        if desc.size == 0 {
            return Err(Error::InvalidResource(format!("Buffer '{}' has zero size", desc.name)));
        }

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self.ctx.device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to create buffer '{}': {:?}", desc.name, e))?;

            let mut requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            if desc.location != MemoryLocation::GpuOnly {
                // Whole atoms, so flush ranges widened to atoms stay inside the allocation
                let atom = self.limits.non_coherent_atom_size;
                requirements.alignment = requirements.alignment.max(atom);
                requirements.size = requirements.size.div_ceil(atom) * atom;
            }

            let allocation = {
                let mut allocator = match self.ctx.allocator.lock() {
                    Ok(allocator) => allocator,
                    Err(_) => {
                        self.ctx.device.destroy_buffer(buffer, None);
                        return Err(engine_err!("nebula3d::vulkan", "Lock poisoned: allocator"));
                    }
                };
                allocator.allocate(&AllocationCreateDesc {
                    name: &desc.name,
                    requirements,
                    location: memory_location_to_gpu_allocator(desc.location),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("nebula3d::vulkan",
                        "Out of GPU memory for buffer '{}' ({:.2} MB): {:?}", desc.name, size_mb, e);
                    self.ctx.device.destroy_buffer(buffer, None);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = self.ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                self.ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("nebula3d::vulkan", "Failed to bind buffer memory for '{}': {:?}", desc.name, e));
            }

            engine_debug!("nebula3d::vulkan",
                "Created buffer '{}' ({} bytes, {:?}, {:?})", desc.name, desc.size, desc.usage, desc.location);

            Ok(Arc::new(Buffer::new(
                Arc::clone(&self.ctx),
                buffer,
                allocation,
                desc.size,
                desc.usage,
            )))
        }
    }

    fn allocate_command_lists(
        &self,
        level: CommandListLevel,
        count: usize,
    ) -> Result<Vec<Box<dyn DeviceCommandList>>> {
        (0..count)
            .map(|_| {
                CommandList::new(Arc::clone(&self.ctx), level)
                    .map(|list| Box::new(list) as Box<dyn DeviceCommandList>)
            })
            .collect()
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceHandle> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence_create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { self.ctx.device.create_fence(&fence_create_info, None) }
            .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to create fence: {:?}", e))?;
        lock(&self.fences, "fences")?.insert(fence.as_raw());
        Ok(FenceHandle(fence.as_raw()))
    }

    fn destroy_fence(&self, fence: FenceHandle) {
        let removed = self.fences.lock().map(|mut fences| fences.remove(&fence.0)).unwrap_or(false);
        if removed {
            unsafe { self.ctx.device.destroy_fence(vk::Fence::from_raw(fence.0), None) };
        } else {
            engine_warn!("nebula3d::vulkan", "destroy_fence: unknown fence {:#x}", fence.0);
        }
    }

    fn create_semaphore(&self) -> Result<SemaphoreHandle> {
        let semaphore = unsafe {
            self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
        }
        .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to create semaphore: {:?}", e))?;
        lock(&self.semaphores, "semaphores")?.insert(semaphore.as_raw());
        Ok(SemaphoreHandle(semaphore.as_raw()))
    }

    fn destroy_semaphore(&self, semaphore: SemaphoreHandle) {
        let removed = self.semaphores.lock().map(|mut set| set.remove(&semaphore.0)).unwrap_or(false);
        if removed {
            unsafe { self.ctx.device.destroy_semaphore(vk::Semaphore::from_raw(semaphore.0), None) };
        } else {
            engine_warn!("nebula3d::vulkan", "destroy_semaphore: unknown semaphore {:#x}", semaphore.0);
        }
    }

    fn wait_for_fence(&self, fence: FenceHandle, timeout: Duration) -> Result<()> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        let fences = [vk::Fence::from_raw(fence.0)];
        match unsafe { self.ctx.device.wait_for_fences(&fences, true, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => {
                engine_error!("nebula3d::vulkan", "Fence {:#x} not signaled after {:?}", fence.0, timeout);
                Err(Error::DeviceTimeout(format!("fence {:#x} not signaled after {:?}", fence.0, timeout)))
            }
            Err(e) => Err(engine_err!("nebula3d::vulkan", "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset_fence(&self, fence: FenceHandle) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[vk::Fence::from_raw(fence.0)]) }
            .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to reset fence: {:?}", e))
    }

    fn submit(&self, info: &SubmitInfo<'_>) -> Result<()> {
        if info.command_list.level() != CommandListLevel::Primary {
            return Err(Error::SynchronizationMisuse(
                "submit: only primary command lists can be submitted".to_string(),
            ));
        }

        let command_buffers = [vk::CommandBuffer::from_raw(info.command_list.raw_handle())];
        let wait_semaphores: Vec<vk::Semaphore> = info
            .wait_semaphores
            .iter()
            .map(|s| vk::Semaphore::from_raw(s.0))
            .collect();
        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
        let signal_semaphores: Vec<vk::Semaphore> = info
            .signal_semaphores
            .iter()
            .map(|s| vk::Semaphore::from_raw(s.0))
            .collect();

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        let fence = info
            .fence
            .map(|f| vk::Fence::from_raw(f.0))
            .unwrap_or_else(vk::Fence::null);

        let queue = lock(&self.ctx.graphics_queue, "graphics queue")?;
        unsafe { self.ctx.device.queue_submit(*queue, &[submit_info], fence) }
            .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to submit command buffer: {:?}", e))
    }

    fn create_dynamic_uniform_group(
        &self,
        buffer: &Arc<dyn DeviceBuffer>,
        range: u64,
    ) -> Result<BindingGroupHandle> {
        if !buffer.usage().contains(BufferUsage::UNIFORM) {
            return Err(Error::InvalidResource(
                "create_dynamic_uniform_group: buffer lacks UNIFORM usage".to_string(),
            ));
        }
        if range == 0 || range > buffer.size() {
            return Err(Error::InvalidResource(format!(
                "create_dynamic_uniform_group: range {} invalid for buffer of {} bytes",
                range,
                buffer.size()
            )));
        }

        let descriptor_set = self.allocate_dynamic_uniform_set()?;
        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(vk::Buffer::from_raw(buffer.raw_handle()))
            .offset(0)
            .range(range);
        let write = vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .buffer_info(std::slice::from_ref(&buffer_info));

        unsafe { self.ctx.device.update_descriptor_sets(&[write], &[]) };
        Ok(BindingGroupHandle(descriptor_set.as_raw()))
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to wait for device idle: {:?}", e))
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            if let Ok(fences) = self.fences.get_mut() {
                for fence in fences.drain() {
                    self.ctx.device.destroy_fence(vk::Fence::from_raw(fence), None);
                }
            }
            if let Ok(semaphores) = self.semaphores.get_mut() {
                for semaphore in semaphores.drain() {
                    self.ctx.device.destroy_semaphore(vk::Semaphore::from_raw(semaphore), None);
                }
            }
            if let Ok(pools) = self.descriptor_pools.get_mut() {
                for pool in pools.drain(..) {
                    self.ctx.device.destroy_descriptor_pool(pool, None);
                }
            }
            self.ctx.device.destroy_descriptor_set_layout(self.dynamic_uniform_layout, None);
        }
        // GpuContext goes with the last buffer or command list still holding it
    }
}

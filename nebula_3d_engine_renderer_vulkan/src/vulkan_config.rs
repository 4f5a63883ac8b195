/// VulkanConfig - creation parameters of the Vulkan graphics device

/// Vulkan device configuration
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Request VK_LAYER_KHRONOS_validation and route its messages to the engine logger
    ///
    /// Only honored when the crate is built with the `vulkan-validation` feature.
    pub enable_validation: bool,

    /// Application name reported to the driver
    pub app_name: String,

    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Nebula3D Application".to_string(),
            app_version: (1, 0, 0),
        }
    }
}

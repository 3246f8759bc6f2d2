use std::rc::Rc;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use vesper_graphics::GraphicsResult;

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::instance::VkInstance;

/// 窗口对应的 surface
///
/// swapchain 的延迟删除任务会持有它，保证 surface 在 swapchain 之后销毁
pub struct VkSurface {
    instance: Rc<VkInstance>,
    handle: vk::SurfaceKHR,
}

impl DebugType for VkSurface {
    fn debug_type_name() -> &'static str {
        "VkSurface"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl VkSurface {
    pub fn new(
        instance: &Rc<VkInstance>,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> GraphicsResult<Self> {
        let handle = unsafe {
            ash_window::create_surface(instance.entry(), instance.ash_instance(), display_handle, window_handle, None)
        }
        .vk_fatal("vkCreateSurfaceKHR")?;

        Ok(Self {
            instance: instance.clone(),
            handle,
        })
    }
}

// getters
impl VkSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

// tools
impl VkSurface {
    /// 查询失败视为不支持
    pub fn supports_present(&self, pdevice: vk::PhysicalDevice, family: u32) -> bool {
        unsafe {
            self.instance
                .surface_loader()
                .get_physical_device_surface_support(pdevice, family, self.handle)
                .unwrap_or(false)
        }
    }

    pub fn capabilities(&self, pdevice: vk::PhysicalDevice) -> GraphicsResult<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.instance.surface_loader().get_physical_device_surface_capabilities(pdevice, self.handle) }
            .vk_context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
    }

    pub fn formats(&self, pdevice: vk::PhysicalDevice) -> GraphicsResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.instance.surface_loader().get_physical_device_surface_formats(pdevice, self.handle) }
            .vk_context("vkGetPhysicalDeviceSurfaceFormatsKHR")
    }

    pub fn present_modes(&self, pdevice: vk::PhysicalDevice) -> GraphicsResult<Vec<vk::PresentModeKHR>> {
        unsafe { self.instance.surface_loader().get_physical_device_surface_present_modes(pdevice, self.handle) }
            .vk_context("vkGetPhysicalDeviceSurfacePresentModesKHR")
    }
}

impl Drop for VkSurface {
    fn drop(&mut self) {
        log::info!("destroying surface");
        unsafe { self.instance.surface_loader().destroy_surface(self.handle, None) }
    }
}

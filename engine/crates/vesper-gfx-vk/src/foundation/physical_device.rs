use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::basic::graphics_type::SampleCount;
use vesper_graphics::{GraphicsError, GraphicsResult};

use crate::conversion::convert_to_vk_sample_count;
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::instance::VkInstance;
use crate::swapchain::surface::VkSurface;

/// graphics / present / transfer 三个 queue family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub transfer: Option<u32>,
}

impl QueueFamilyIndices {
    /// 三个 family 都已找到
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some() && self.transfer.is_some()
    }

    /// 去重之后的 family，用于创建 device queue
    pub fn unique_families(&self) -> Vec<u32> {
        [self.graphics, self.present, self.transfer].into_iter().flatten().sorted().dedup().collect()
    }
}

/// 在 queue family 列表中查找三个 family
///
/// - present 优先和 graphics 使用同一个 family
/// - transfer 优先使用不带 graphics/compute 的专用 family，否则退回 graphics
pub fn find_queue_families(
    props: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> QueueFamilyIndices {
    let find = |include: vk::QueueFlags, exclude: vk::QueueFlags| {
        props
            .iter()
            .position(|p| p.queue_count > 0 && p.queue_flags.contains(include) && !p.queue_flags.intersects(exclude))
            .map(|idx| idx as u32)
    };

    let graphics = find(vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty());
    let present = match graphics {
        Some(idx) if supports_present(idx) => Some(idx),
        _ => (0..props.len() as u32).find(|idx| supports_present(*idx)),
    };
    let transfer = find(vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE).or(graphics);

    QueueFamilyIndices {
        graphics,
        present,
        transfer,
    }
}

/// color 与 depth 都支持的最大采样数
pub fn max_usable_sample_count(color: vk::SampleCountFlags, depth: vk::SampleCountFlags) -> SampleCount {
    let counts = color & depth;
    SampleCount::DESCENDING
        .into_iter()
        .find(|s| counts.contains(convert_to_vk_sample_count(*s)))
        .unwrap_or(SampleCount::X1)
}

/// 表示一张物理显卡
pub struct VkPhysicalDevice {
    handle: vk::PhysicalDevice,
    props: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    name: String,
}

// new & init
impl VkPhysicalDevice {
    /// device 必须支持的 extensions
    pub fn required_device_exts() -> Vec<&'static CStr> {
        let mut exts = vec![ash::khr::swapchain::NAME];
        if cfg!(target_os = "macos") {
            exts.push(ash::khr::portability_subset::NAME);
        }
        exts
    }

    /// 在支持 swapchain 的显卡中选择一个，优先使用独立显卡
    pub fn select(instance: &VkInstance) -> GraphicsResult<Self> {
        let _span = tracy_client::span!("VkPhysicalDevice::select");
        let ash_instance = instance.ash_instance();
        let pdevices =
            unsafe { ash_instance.enumerate_physical_devices() }.vk_fatal("vkEnumeratePhysicalDevices")?;

        pdevices
            .into_iter()
            .map(|pdevice| Self::new(ash_instance, pdevice))
            .filter(|pdevice| pdevice.supports_required_exts(ash_instance))
            // 优先使用独立显卡
            .find_or_first(Self::is_discrete_gpu)
            .inspect(|pdevice| log::info!("selected gpu: {}", pdevice.name))
            .ok_or_else(|| GraphicsError::NoSuitableDevice.fatal())
    }

    fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> Self {
        let props = unsafe { instance.get_physical_device_properties(pdevice) };
        let features = unsafe { instance.get_physical_device_features(pdevice) };
        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unknown>".to_string());
        log::info!("found gpu: {name}");

        Self {
            handle: pdevice,
            props,
            features,
            name,
        }
    }

    fn supports_required_exts(&self, instance: &ash::Instance) -> bool {
        let Ok(ext_props) = (unsafe { instance.enumerate_device_extension_properties(self.handle) }) else {
            return false;
        };
        Self::required_device_exts().iter().all(|required| {
            let supported = ext_props.iter().any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *required));
            if !supported {
                log::info!("gpu {} does not support {:?}", self.name, required);
            }
            supported
        })
    }
}

// getters
impl VkPhysicalDevice {
    #[inline]
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    #[inline]
    pub fn props(&self) -> &vk::PhysicalDeviceProperties {
        &self.props
    }

    #[inline]
    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前 gpu 是否是独立显卡
    #[inline]
    pub fn is_discrete_gpu(&self) -> bool {
        self.props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    /// framebuffer 的 color 与 depth 都支持的最大采样数
    #[inline]
    pub fn max_usable_sample_count(&self) -> SampleCount {
        max_usable_sample_count(
            self.props.limits.framebuffer_color_sample_counts,
            self.props.limits.framebuffer_depth_sample_counts,
        )
    }
}

// tools
impl VkPhysicalDevice {
    /// 查找 graphics / present / transfer queue family，任何一个缺失都视为失败
    pub fn resolve_queue_families(&self, instance: &VkInstance, surface: &VkSurface) -> GraphicsResult<QueueFamilyIndices> {
        let props = unsafe { instance.ash_instance().get_physical_device_queue_family_properties(self.handle) };
        log::debug!("queue family props:\n{:#?}", props);

        let indices = find_queue_families(&props, |idx| surface.supports_present(self.handle, idx));
        log::info!("queue families: {:?}", indices);
        if !indices.is_complete() {
            return Err(GraphicsError::Unsupported(format!("incomplete queue families {indices:?}")).fatal());
        }
        Ok(indices)
    }

    #[inline]
    pub fn format_props(&self, instance: &VkInstance, format: vk::Format) -> vk::FormatProperties {
        unsafe { instance.ash_instance().get_physical_device_format_properties(self.handle, format) }
    }
}

impl DebugType for VkPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "VkPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_dedicated_transfer_family() {
        let props = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = find_queue_families(&props, |idx| idx == 0);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(indices.transfer, Some(2));
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_present_on_other_family() {
        let props = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&props, |idx| idx == 1);
        assert_eq!(indices.present, Some(1));
        // 没有专用的 transfer family 时使用 graphics
        assert_eq!(indices.transfer, Some(0));
        assert_eq!(indices.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_incomplete_without_present() {
        let props = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)];
        let indices = find_queue_families(&props, |_| false);
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_max_usable_sample_count() {
        let color = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_4 | vk::SampleCountFlags::TYPE_8;
        let depth = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_4;
        assert_eq!(max_usable_sample_count(color, depth), SampleCount::X4);
        assert_eq!(max_usable_sample_count(vk::SampleCountFlags::TYPE_1, depth), SampleCount::X1);
        assert_eq!(max_usable_sample_count(vk::SampleCountFlags::empty(), depth), SampleCount::X1);
    }
}

use std::rc::Rc;

use ash::vk;
use vesper_graphics::GraphicsResult;
use vesper_graphics::basic::graphics_type::SamplerDesc;

use crate::conversion::{convert_to_vk_address_mode, convert_to_vk_filter, convert_to_vk_mipmap_mode};
use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::device::VkDevice;

/// 根据描述生成 sampler 的创建参数
///
/// - 各向异性只有在 device feature 开启时才生效，且 clamp 到设备上限
/// - max_lod 等于 mip 层数，完整的 mip 链都可以被采样
pub fn sampler_create_info(
    desc: &SamplerDesc,
    mip_levels: u32,
    anisotropy_supported: bool,
    max_anisotropy_limit: f32,
) -> vk::SamplerCreateInfo<'static> {
    let mut create_info = vk::SamplerCreateInfo::default()
        .mag_filter(convert_to_vk_filter(desc.mag_filter))
        .min_filter(convert_to_vk_filter(desc.min_filter))
        .mipmap_mode(convert_to_vk_mipmap_mode(desc.mipmap_mode))
        .address_mode_u(convert_to_vk_address_mode(desc.address_mode_u))
        .address_mode_v(convert_to_vk_address_mode(desc.address_mode_v))
        .address_mode_w(convert_to_vk_address_mode(desc.address_mode_w))
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .compare_enable(false);

    match desc.max_anisotropy {
        Some(anisotropy) if anisotropy_supported && anisotropy > 1.0 => {
            create_info = create_info.anisotropy_enable(true).max_anisotropy(anisotropy.min(max_anisotropy_limit));
        }
        _ => {
            create_info = create_info.anisotropy_enable(false).max_anisotropy(1.0);
        }
    }
    create_info
}

/// texture 自带的 sampler
pub struct VkSampler {
    device: Rc<VkDevice>,
    handle: vk::Sampler,
}

impl DebugType for VkSampler {
    fn debug_type_name() -> &'static str {
        "VkSampler"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl VkSampler {
    pub fn new(device: &Rc<VkDevice>, desc: &SamplerDesc, mip_levels: u32, name: &str) -> GraphicsResult<Self> {
        let create_info = sampler_create_info(
            desc,
            mip_levels,
            device.enabled_features().sampler_anisotropy == vk::TRUE,
            device.limits().max_sampler_anisotropy,
        );
        let handle = unsafe { device.create_sampler(&create_info, None) }.vk_context("vkCreateSampler")?;

        let sampler = Self {
            device: device.clone(),
            handle,
        };
        device.set_debug_name(&sampler, name);
        Ok(sampler)
    }
}

// getters
impl VkSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

impl Drop for VkSampler {
    fn drop(&mut self) {
        let handle = self.handle;
        self.device.defer_destroy(move |device| unsafe {
            device.destroy_sampler(handle, None);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::basic::graphics_type::Filter;

    #[test]
    fn test_anisotropy_clamped() {
        let desc = SamplerDesc::default();
        let info = sampler_create_info(&desc, 5, true, 8.0);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 8.0);
        assert_eq!(info.max_lod, 5.0);
    }

    #[test]
    fn test_anisotropy_requires_feature() {
        let info = sampler_create_info(&SamplerDesc::default(), 1, false, 16.0);
        assert_eq!(info.anisotropy_enable, vk::FALSE);

        let info = sampler_create_info(&SamplerDesc::nearest_clamp(), 1, true, 16.0);
        assert_eq!(info.anisotropy_enable, vk::FALSE);
        assert_eq!(info.mag_filter, convert_to_vk_filter(Filter::Nearest));
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    }
}

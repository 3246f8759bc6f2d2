use vesper_gfx_vk::VkContext;
use vesper_graphics::GraphicsResult;
use vesper_graphics::basic::graphics_type::GraphicsBackend;
use vesper_graphics::config::GraphicsConfig;
use vesper_graphics::interface::context::GraphicsContext;
use vesper_graphics::interface::platform::PlatformContext;
use vesper_graphics::null::NullContext;

/// 根据配置创建唯一的 GraphicsContext
///
/// 之后以引用的方式传给所有需要它的组件，不再区分后端
pub fn create_graphics_context(
    config: &GraphicsConfig,
    platform: &dyn PlatformContext,
) -> GraphicsResult<Box<dyn GraphicsContext>> {
    let _span = tracy_client::span!("create_graphics_context");
    log::info!("graphics backend: {:?}", config.backend);
    Ok(match config.backend {
        GraphicsBackend::Vulkan => Box::new(VkContext::new(config, platform)?),
        GraphicsBackend::Null => Box::new(NullContext::new(config, platform)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_graphics::basic::graphics_type::Extent2D;
    use vesper_graphics::interface::platform::HeadlessPlatform;

    #[test]
    fn test_null_backend_selected_from_config() {
        let config = GraphicsConfig::from_toml_str("backend = \"null\"\nwidth = 320\nheight = 240").unwrap();
        let ctx = create_graphics_context(&config, &HeadlessPlatform::new(320, 240)).unwrap();
        assert_eq!(ctx.backend(), GraphicsBackend::Null);
        assert_eq!(ctx.size(), Extent2D::new(320, 240));
    }
}

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use vesper_graphics::GraphicsResult;
use vesper_graphics::deletion_queue::DeletionQueue;

use crate::foundation::VkResultExt;
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::instance::VkInstance;
use crate::foundation::physical_device::{QueueFamilyIndices, VkPhysicalDevice};

/// 逻辑设备，以及所有需要在 device 生命周期内存在的对象
///
/// - vma allocator
/// - 用于一次性命令（上传、生成 mipmap）的 command pool
/// - 延迟删除队列：资源 Drop 时把销毁 native 对象的闭包推入，两帧之后执行
///
/// 以 `Rc<VkDevice>` 的形式被所有资源共享
pub struct VkDevice {
    device: ash::Device,
    instance: Rc<VkInstance>,
    pdevice: VkPhysicalDevice,

    swapchain_loader: ash::khr::swapchain::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    allocator: ManuallyDrop<vk_mem::Allocator>,

    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,

    one_time_pool: vk::CommandPool,
    one_time_cmd: vk::CommandBuffer,

    enabled_features: vk::PhysicalDeviceFeatures,

    deletion_queue: RefCell<DeletionQueue<VkDevice>>,
}

// new & init
impl VkDevice {
    pub fn new(
        instance: Rc<VkInstance>,
        pdevice: VkPhysicalDevice,
        queue_families: QueueFamilyIndices,
    ) -> GraphicsResult<Rc<Self>> {
        let _span = tracy_client::span!("VkDevice::new");
        let ash_instance = instance.ash_instance();

        let priorities = [1.0_f32];
        let queue_cis = queue_families
            .unique_families()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo::default().queue_family_index(family).queue_priorities(&priorities))
            .collect_vec();

        let device_exts = VkPhysicalDevice::required_device_exts().iter().map(|ext| ext.as_ptr()).collect_vec();
        log::info!(
            "device exts: {}",
            device_exts.iter().map(|ext| format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) })).join("")
        );

        let enabled_features = Self::features_to_enable(pdevice.features());
        let device_ci = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_cis)
            .enabled_extension_names(&device_exts)
            .enabled_features(&enabled_features);

        let device =
            unsafe { ash_instance.create_device(pdevice.handle(), &device_ci, None) }.vk_fatal("vkCreateDevice")?;

        // QueueFamilyIndices 在创建 device 之前已经检查过完整性
        let get_queue = |family: Option<u32>| unsafe { device.get_device_queue(family.unwrap_or_default(), 0) };
        let graphics_queue = get_queue(queue_families.graphics);
        let present_queue = get_queue(queue_families.present);
        let transfer_queue = get_queue(queue_families.transfer);

        let swapchain_loader = ash::khr::swapchain::Device::new(ash_instance, &device);
        let debug_utils = instance.validation().then(|| ash::ext::debug_utils::Device::new(ash_instance, &device));

        // vma 需要引用 instance 与 device，因此在它们都创建完成之后再创建
        let allocator = {
            let mut vma_ci = vk_mem::AllocatorCreateInfo::new(ash_instance, &device, pdevice.handle());
            vma_ci.vulkan_api_version = instance.api_version().min(vk::API_VERSION_1_3);
            unsafe { vk_mem::Allocator::new(vma_ci) }.vk_fatal("vmaCreateAllocator")
        };
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        let one_time = Self::create_one_time_cmd(&device, queue_families.graphics.unwrap_or_default());
        let (one_time_pool, one_time_cmd) = match one_time {
            Ok(one_time) => one_time,
            Err(e) => {
                drop(allocator);
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        let device = Rc::new(Self {
            device,
            instance,
            pdevice,
            swapchain_loader,
            debug_utils,
            allocator: ManuallyDrop::new(allocator),
            queue_families,
            graphics_queue,
            present_queue,
            transfer_queue,
            one_time_pool,
            one_time_cmd,
            enabled_features,
            deletion_queue: RefCell::new(DeletionQueue::new()),
        });
        device.set_object_debug_name(device.graphics_queue, "graphics-queue");
        device.set_object_debug_name(device.one_time_pool, "one-time-pool");
        Ok(device)
    }

    /// 只开启设备支持的可选 feature
    fn features_to_enable(supported: &vk::PhysicalDeviceFeatures) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
            .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
            .wide_lines(supported.wide_lines == vk::TRUE)
            .sample_rate_shading(supported.sample_rate_shading == vk::TRUE)
    }

    fn create_one_time_cmd(device: &ash::Device, family: u32) -> GraphicsResult<(vk::CommandPool, vk::CommandBuffer)> {
        let pool_ci = vk::CommandPoolCreateInfo::default()
            .queue_family_index(family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER | vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.create_command_pool(&pool_ci, None) }.vk_fatal("vkCreateCommandPool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        match unsafe { device.allocate_command_buffers(&alloc_info) }.vk_fatal("vkAllocateCommandBuffers") {
            Ok(cmds) => Ok((pool, cmds[0])),
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                Err(e)
            }
        }
    }
}

// getters
impl VkDevice {
    #[inline]
    pub fn handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn instance(&self) -> &Rc<VkInstance> {
        &self.instance
    }

    #[inline]
    pub fn pdevice(&self) -> &VkPhysicalDevice {
        &self.pdevice
    }

    #[inline]
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    #[inline]
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.queue_families.graphics.unwrap_or_default()
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    #[inline]
    pub fn enabled_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.enabled_features
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.pdevice.props().limits
    }

    /// 当前还在等待执行的删除任务数量
    #[inline]
    pub fn pending_deletions(&self) -> usize {
        self.deletion_queue.borrow().len()
    }
}

// tools
impl VkDevice {
    /// debug utils 未启用时什么也不做
    pub fn set_object_debug_name<T: vk::Handle>(&self, handle: T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name.as_ref()) else {
            return;
        };
        let name_info = object_name_info(handle, name.as_c_str());
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&name_info) } {
            log::warn!("failed to set debug name {:?}: {e:?}", name);
        }
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        self.set_object_debug_name(handle.vk_handle(), format!("{}::{}", T::debug_type_name(), name.as_ref()));
    }

    pub fn cmd_begin_label(&self, cmd: vk::CommandBuffer, label: &str, color: [f32; 4]) {
        let (Some(debug_utils), Ok(label)) = (&self.debug_utils, CString::new(label)) else {
            return;
        };
        let label_info = vk::DebugUtilsLabelEXT::default().label_name(label.as_c_str()).color(color);
        unsafe { debug_utils.cmd_begin_debug_utils_label(cmd, &label_info) };
    }

    pub fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(cmd) };
        }
    }

    /// 推迟销毁 native 对象，闭包只应捕获 native 句柄
    #[inline]
    pub fn defer_destroy(&self, task: impl FnOnce(&VkDevice) + 'static) {
        self.deletion_queue.borrow_mut().push(task);
    }

    /// 每帧调用一次，执行已经到期的删除任务
    pub fn advance_deletions(&self) {
        let tasks = self.deletion_queue.borrow_mut().advance();
        if !tasks.is_empty() {
            log::debug!("executing {} deferred deletions", tasks.len());
        }
        for task in tasks {
            task(self);
        }
    }

    /// 立即执行全部删除任务，调用前 GPU 必须已经 idle
    pub fn drain_deletions(&self) {
        // 任务执行时可能释放其它资源，继续推入新的任务
        loop {
            let tasks = self.deletion_queue.borrow_mut().drain_all();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                task(self);
            }
        }
    }

    /// 录制并同步执行一段命令
    ///
    /// 使用唯一的 one-time command buffer，在 graphics queue 上提交后等待 queue idle
    pub fn one_time_exec<R>(
        &self,
        name: &str,
        record: impl FnOnce(&VkDevice, vk::CommandBuffer) -> GraphicsResult<R>,
    ) -> GraphicsResult<R> {
        let _span = tracy_client::span!("VkDevice::one_time_exec");
        let cmd = self.one_time_cmd;
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .vk_context("vkResetCommandBuffer")?;
            self.device
                .begin_command_buffer(
                    cmd,
                    &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .vk_context("vkBeginCommandBuffer")?;
        }

        self.cmd_begin_label(cmd, name, [0.5, 0.5, 0.5, 1.0]);
        let result = record(self, cmd)?;
        self.cmd_end_label(cmd);

        unsafe {
            self.device.end_command_buffer(cmd).vk_context("vkEndCommandBuffer")?;
            let submit_info = vk::SubmitInfo::default().command_buffers(std::slice::from_ref(&cmd));
            self.device
                .queue_submit(self.graphics_queue, std::slice::from_ref(&submit_info), vk::Fence::null())
                .vk_context("vkQueueSubmit")?;
            self.device.queue_wait_idle(self.graphics_queue).vk_context("vkQueueWaitIdle")?;
        }
        Ok(result)
    }

    #[inline]
    pub fn wait_idle(&self) -> GraphicsResult<()> {
        unsafe { self.device.device_wait_idle() }.vk_context("vkDeviceWaitIdle")
    }

    pub fn format_props(&self, format: vk::Format) -> vk::FormatProperties {
        self.pdevice.format_props(&self.instance, format)
    }

    /// 在候选格式中找到第一个 optimal tiling 支持 `features` 的格式
    pub fn find_supported_format(&self, candidates: &[vk::Format], features: vk::FormatFeatureFlags) -> Option<vk::Format> {
        candidates.iter().copied().find(|f| self.format_props(*f).optimal_tiling_features.contains(features))
    }

    /// 生成 mipmap 需要 blit 支持线性过滤
    pub fn supports_linear_blit(&self, format: vk::Format) -> bool {
        self.format_props(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }
}

impl Deref for VkDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}

impl Drop for VkDevice {
    fn drop(&mut self) {
        log::info!("destroying device");
        if let Err(e) = self.wait_idle() {
            log::error!("{e}");
        }
        self.drain_deletions();
        unsafe {
            self.device.destroy_command_pool(self.one_time_pool, None);
            // allocator 必须在 device 之前销毁
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}

impl DebugType for VkDevice {
    fn debug_type_name() -> &'static str {
        "VkDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}

/// handle 按值传入，`DebugType::vk_handle` 返回的 `impl Handle` 也可以直接使用
fn object_name_info<T: vk::Handle>(handle: T, name: &CStr) -> vk::DebugUtilsObjectNameInfoEXT<'_> {
    vk::DebugUtilsObjectNameInfoEXT::default().object_name(name).object_handle(handle)
}

//! 基于 ash + vk-mem 的生产后端

use std::ffi::{CStr, CString, c_char};
use std::sync::OnceLock;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use vk_mem::Alloc;
use wgvk_crate_tools::config::GfxConfig;

use crate::error::{GfxError, GfxResult};
use crate::foundation::debug_messenger::DebugMessenger;
use crate::hal::{Api, DeviceApi, InstanceApi};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// 最低要求的 instance 版本
const MIN_API_VERSION: u32 = vk::API_VERSION_1_1;

/// window system 相关的 surface extension，只启用驱动报告存在的那部分
const SURFACE_EXTENSIONS: &[&CStr] = &[
    ash::khr::surface::NAME,
    ash::khr::win32_surface::NAME,
    ash::khr::xlib_surface::NAME,
    ash::khr::xcb_surface::NAME,
    ash::khr::wayland_surface::NAME,
    ash::ext::metal_surface::NAME,
    ash::khr::android_surface::NAME,
];

pub struct Vulkan;

impl Api for Vulkan {
    type Instance = VulkanInstance;
    type Device = VulkanDevice;
    type Allocation = vk_mem::Allocation;
}

/// 进程级别的 loader
///
/// 只加载一次，进程结束前不会卸载。
fn entry() -> GfxResult<&'static ash::Entry> {
    static ENTRY: OnceLock<Result<ash::Entry, String>> = OnceLock::new();

    ENTRY
        .get_or_init(|| unsafe { ash::Entry::load() }.map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|e| GfxError::Loader(e.clone()))
}

pub struct VulkanInstance {
    entry: &'static ash::Entry,
    raw: ash::Instance,
    surface_fn: ash::khr::surface::Instance,
    /// 必须先于 instance 销毁
    debug_messenger: Option<DebugMessenger>,
    api_version: u32,
}

impl VulkanInstance {
    /// 加载 loader，按配置启用 validation，创建 vk instance
    pub fn new(config: &GfxConfig) -> GfxResult<Self> {
        let entry = entry()?;

        let api_version = unsafe { entry.try_enumerate_instance_version()? }.unwrap_or(vk::API_VERSION_1_0);
        log::info!(
            "vulkan instance version: {}.{}.{}",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            vk::api_version_patch(api_version)
        );
        if api_version < MIN_API_VERSION {
            log::error!("vulkan 1.1 is required");
            return Err(GfxError::Native(vk::Result::ERROR_INCOMPATIBLE_DRIVER));
        }

        let layer_props = unsafe { entry.enumerate_instance_layer_properties()? };
        let ext_props = unsafe { entry.enumerate_instance_extension_properties(None)? };
        let layer_names = layer_props
            .iter()
            .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) })
            .collect::<Vec<_>>();
        let ext_names = ext_props
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect::<Vec<_>>();
        log::debug!("instance layers available: {:?}", layer_names);
        log::debug!("instance extensions available: {:?}", ext_names);

        let mut enabled_layers: Vec<*const c_char> = Vec::new();
        let mut enabled_exts: Vec<*const c_char> = SURFACE_EXTENSIONS
            .iter()
            .filter(|ext| ext_names.contains(ext))
            .map(|ext| ext.as_ptr())
            .collect();

        let validation = config.validation
            && layer_names.contains(&VALIDATION_LAYER)
            && ext_names.contains(&ash::ext::debug_utils::NAME);
        if validation {
            enabled_layers.push(VALIDATION_LAYER.as_ptr());
            enabled_exts.push(ash::ext::debug_utils::NAME.as_ptr());
        } else if config.validation {
            log::warn!("validation requested but the validation layer is not available");
        }

        log::info!(
            "instance extensions: {:?}",
            enabled_exts.iter().map(|ext| unsafe { CStr::from_ptr(*ext) }).collect::<Vec<_>>()
        );

        let app_name = CString::new(config.application_name.as_str()).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .api_version(api_version)
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"wgvk")
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let severity = DebugMessenger::severity_from_names(&config.debug_severity);
        let mut debug_ci = DebugMessenger::create_info(severity);
        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&enabled_layers)
            .enabled_extension_names(&enabled_exts);
        // instance 创建 / 销毁期间的消息
        if validation {
            instance_ci = instance_ci.push_next(&mut debug_ci);
        }

        let raw = unsafe { entry.create_instance(&instance_ci, None)? };

        let debug_messenger = if validation {
            match DebugMessenger::new(entry, &raw, severity) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    log::warn!("failed to create debug messenger: {:?}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            surface_fn: ash::khr::surface::Instance::new(entry, &raw),
            entry,
            raw,
            debug_messenger,
            api_version,
        })
    }
}

impl InstanceApi<Vulkan> for VulkanInstance {
    fn api_version(&self) -> u32 {
        self.api_version
    }

    unsafe fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>, vk::Result> {
        unsafe { self.raw.enumerate_physical_devices() }
    }

    unsafe fn enumerate_device_extension_properties(
        &self,
        pdevice: vk::PhysicalDevice,
    ) -> Result<Vec<vk::ExtensionProperties>, vk::Result> {
        unsafe { self.raw.enumerate_device_extension_properties(pdevice) }
    }

    unsafe fn get_physical_device_properties2(
        &self,
        pdevice: vk::PhysicalDevice,
        props: &mut vk::PhysicalDeviceProperties2<'_>,
    ) {
        unsafe { self.raw.get_physical_device_properties2(pdevice, props) }
    }

    unsafe fn get_physical_device_features2(
        &self,
        pdevice: vk::PhysicalDevice,
        features: &mut vk::PhysicalDeviceFeatures2<'_>,
    ) {
        unsafe { self.raw.get_physical_device_features2(pdevice, features) }
    }

    unsafe fn get_physical_device_format_properties(
        &self,
        pdevice: vk::PhysicalDevice,
        format: vk::Format,
    ) -> vk::FormatProperties {
        unsafe { self.raw.get_physical_device_format_properties(pdevice, format) }
    }

    unsafe fn get_physical_device_image_format_properties(
        &self,
        pdevice: vk::PhysicalDevice,
        format: vk::Format,
        ty: vk::ImageType,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        flags: vk::ImageCreateFlags,
    ) -> Result<vk::ImageFormatProperties, vk::Result> {
        unsafe { self.raw.get_physical_device_image_format_properties(pdevice, format, ty, tiling, usage, flags) }
    }

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        pdevice: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.raw.get_physical_device_queue_family_properties(pdevice) }
    }

    unsafe fn create_device(
        &self,
        pdevice: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> Result<VulkanDevice, vk::Result> {
        let raw = unsafe { self.raw.create_device(pdevice, info, None)? };

        let mut allocator_ci = vk_mem::AllocatorCreateInfo::new(&self.raw, &raw, pdevice);
        allocator_ci.vulkan_api_version = self.api_version;
        let allocator = match unsafe { vk_mem::Allocator::new(allocator_ci) } {
            Ok(allocator) => allocator,
            Err(e) => {
                log::error!("failed to create memory allocator: {:?}", e);
                unsafe { raw.destroy_device(None) };
                return Err(e);
            }
        };

        Ok(VulkanDevice {
            raw,
            allocator: Some(allocator),
        })
    }

    unsafe fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR, vk::Result> {
        unsafe { ash_window::create_surface(self.entry, &self.raw, display, window, None) }
    }

    unsafe fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_fn.destroy_surface(surface, None) }
    }

    unsafe fn get_surface_support(
        &self,
        pdevice: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool, vk::Result> {
        unsafe { self.surface_fn.get_physical_device_surface_support(pdevice, queue_family_index, surface) }
    }

    unsafe fn get_surface_capabilities(
        &self,
        pdevice: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, vk::Result> {
        unsafe { self.surface_fn.get_physical_device_surface_capabilities(pdevice, surface) }
    }

    unsafe fn get_surface_formats(
        &self,
        pdevice: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, vk::Result> {
        unsafe { self.surface_fn.get_physical_device_surface_formats(pdevice, surface) }
    }

    unsafe fn get_surface_present_modes(
        &self,
        pdevice: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, vk::Result> {
        unsafe { self.surface_fn.get_physical_device_surface_present_modes(pdevice, surface) }
    }

    unsafe fn destroy(&mut self) {
        // debug messenger 依赖 instance
        self.debug_messenger = None;
        log::info!("destroying vulkan instance");
        unsafe { self.raw.destroy_instance(None) }
    }
}

pub struct VulkanDevice {
    raw: ash::Device,
    allocator: Option<vk_mem::Allocator>,
}

impl VulkanDevice {
    fn allocator(&self) -> Result<&vk_mem::Allocator, vk::Result> {
        self.allocator.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }
}

impl DeviceApi<Vulkan> for VulkanDevice {
    unsafe fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo<'_>,
        mapped: bool,
    ) -> Result<(vk::Buffer, vk_mem::Allocation), vk::Result> {
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: if mapped {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.allocator()?.create_buffer(info, &alloc_ci) }
    }

    unsafe fn destroy_buffer(&self, buffer: vk::Buffer, mut allocation: vk_mem::Allocation) {
        if let Some(allocator) = &self.allocator {
            unsafe { allocator.destroy_buffer(buffer, &mut allocation) }
        }
    }

    unsafe fn create_image(
        &self,
        info: &vk::ImageCreateInfo<'_>,
    ) -> Result<(vk::Image, vk_mem::Allocation), vk::Result> {
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            ..Default::default()
        };
        unsafe { self.allocator()?.create_image(info, &alloc_ci) }
    }

    unsafe fn destroy_image(&self, image: vk::Image, mut allocation: vk_mem::Allocation) {
        if let Some(allocator) = &self.allocator {
            unsafe { allocator.destroy_image(image, &mut allocation) }
        }
    }

    unsafe fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result> {
        unsafe { self.raw.create_image_view(info, None) }
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.raw.destroy_image_view(view, None) }
    }

    unsafe fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, vk::Result> {
        unsafe { self.raw.create_sampler(info, None) }
    }

    unsafe fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.raw.destroy_sampler(sampler, None) }
    }

    unsafe fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result> {
        unsafe { self.raw.create_descriptor_set_layout(info, None) }
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.raw.destroy_descriptor_set_layout(layout, None) }
    }

    unsafe fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result> {
        unsafe { self.raw.create_descriptor_pool(info, None) }
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.raw.destroy_descriptor_pool(pool, None) }
    }

    unsafe fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        unsafe { self.raw.allocate_descriptor_sets(info) }
    }

    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.raw.update_descriptor_sets(writes, &[]) }
    }

    unsafe fn destroy_allocator(&mut self) {
        // vk_mem::Allocator 在 drop 时销毁
        self.allocator = None;
    }

    unsafe fn destroy_device(&mut self) {
        log::info!("destroying vulkan device");
        unsafe { self.raw.destroy_device(None) }
    }
}

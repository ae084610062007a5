//! 后端接缝
//!
//! 对象模型只通过这里的 trait 访问 Vulkan，生产环境使用 [`vulkan::Vulkan`]，
//! 单元测试使用进程内的 mock 后端，用来观察创建参数与销毁顺序。

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

#[cfg(test)]
pub mod mock;
pub mod vulkan;

pub trait Api: Sized + 'static {
    type Instance: InstanceApi<Self>;
    type Device: DeviceApi<Self>;
    /// 一次内存分配，随 buffer / image 一起销毁
    type Allocation: Send;
}

/// instance 级别的查询与创建
///
/// 所有函数都直接对应一个 Vulkan 调用，调用方负责句柄的有效性。
#[allow(clippy::missing_safety_doc)]
pub trait InstanceApi<A: Api>: Send + Sync {
    /// instance 创建时使用的 api 版本
    fn api_version(&self) -> u32;

    unsafe fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>, vk::Result>;
    unsafe fn enumerate_device_extension_properties(
        &self,
        pdevice: vk::PhysicalDevice,
    ) -> Result<Vec<vk::ExtensionProperties>, vk::Result>;

    /// 填充 `props` 以及它的 `p_next` 链
    unsafe fn get_physical_device_properties2(
        &self,
        pdevice: vk::PhysicalDevice,
        props: &mut vk::PhysicalDeviceProperties2<'_>,
    );
    /// 填充 `features` 以及它的 `p_next` 链
    unsafe fn get_physical_device_features2(
        &self,
        pdevice: vk::PhysicalDevice,
        features: &mut vk::PhysicalDeviceFeatures2<'_>,
    );
    unsafe fn get_physical_device_format_properties(
        &self,
        pdevice: vk::PhysicalDevice,
        format: vk::Format,
    ) -> vk::FormatProperties;
    unsafe fn get_physical_device_image_format_properties(
        &self,
        pdevice: vk::PhysicalDevice,
        format: vk::Format,
        ty: vk::ImageType,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        flags: vk::ImageCreateFlags,
    ) -> Result<vk::ImageFormatProperties, vk::Result>;
    unsafe fn get_physical_device_queue_family_properties(
        &self,
        pdevice: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;

    /// 创建逻辑设备以及与之绑定的内存分配器
    unsafe fn create_device(
        &self,
        pdevice: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> Result<A::Device, vk::Result>;

    unsafe fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR, vk::Result>;
    unsafe fn destroy_surface(&self, surface: vk::SurfaceKHR);
    unsafe fn get_surface_support(
        &self,
        pdevice: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> Result<bool, vk::Result>;
    unsafe fn get_surface_capabilities(
        &self,
        pdevice: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, vk::Result>;
    unsafe fn get_surface_formats(
        &self,
        pdevice: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, vk::Result>;
    unsafe fn get_surface_present_modes(
        &self,
        pdevice: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, vk::Result>;

    /// 只会被调用一次，之后不再使用
    unsafe fn destroy(&mut self);
}

/// 设备级别的资源创建与销毁
#[allow(clippy::missing_safety_doc)]
pub trait DeviceApi<A: Api>: Send + Sync {
    /// `mapped` 为 true 时分配 host 可见的内存
    unsafe fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo<'_>,
        mapped: bool,
    ) -> Result<(vk::Buffer, A::Allocation), vk::Result>;
    unsafe fn destroy_buffer(&self, buffer: vk::Buffer, allocation: A::Allocation);

    unsafe fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<(vk::Image, A::Allocation), vk::Result>;
    unsafe fn destroy_image(&self, image: vk::Image, allocation: A::Allocation);

    unsafe fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result>;
    unsafe fn destroy_image_view(&self, view: vk::ImageView);

    unsafe fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, vk::Result>;
    unsafe fn destroy_sampler(&self, sampler: vk::Sampler);

    unsafe fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result>;
    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    unsafe fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result>;
    /// 同时回收从该 pool 分配出去的所有 set
    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    unsafe fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result>;
    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    /// 必须先于 [`DeviceApi::destroy_device`] 调用
    unsafe fn destroy_allocator(&mut self);
    unsafe fn destroy_device(&mut self);
}

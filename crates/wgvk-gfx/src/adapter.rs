//! 能力协商：一张物理设备以及它的能力扫描结果

use std::ffi::{CStr, c_char};

use ash::vk;

use crate::common::ref_counted::RefPtr;
use crate::conv;
use crate::device::{Device, DeviceDescriptor};
use crate::device_info::{DeviceExtension, DeviceInfo, ExtensionSet};
use crate::error::{GfxError, GfxResult};
use crate::features::{self, CapabilitySource};
use crate::future::Future;
use crate::hal::{Api, InstanceApi};
use crate::instance::Instance;
use crate::limits::Limits;
use crate::types::{AdapterType, BackendType, FeatureName, RequestDeviceStatus};

pub type RequestDeviceCallback<A> = Box<dyn FnOnce(RequestDeviceStatus, Option<RefPtr<Device<A>>>, &str)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub vendor: String,
    pub architecture: String,
    pub device: String,
    pub description: String,
    pub backend_type: BackendType,
    pub adapter_type: AdapterType,
    pub vendor_id: u32,
    pub device_id: u32,
    pub subgroup_min_size: u32,
    pub subgroup_max_size: u32,
}

fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x1002 => "AMD",
        0x10de => "NVIDIA",
        0x8086 => "Intel",
        0x13b5 => "ARM",
        0x5143 => "Qualcomm",
        0x106b => "Apple",
        0x1010 => "ImgTec",
        0x10005 => "Mesa",
        _ => "Unknown",
    }
}

pub struct Adapter<A: Api> {
    raw: vk::PhysicalDevice,
    info: DeviceInfo,
    extensions: ExtensionSet,
    queue_families: Vec<vk::QueueFamilyProperties>,
    limits: Limits,

    /// 最后释放
    instance: RefPtr<Instance<A>>,
}

impl<A: Api> Adapter<A> {
    /// 扫描 extension，再根据 extension 构建两条查询链
    pub fn new(instance: RefPtr<Instance<A>>, raw: vk::PhysicalDevice) -> GfxResult<RefPtr<Self>> {
        let ext_props = unsafe { instance.raw().enumerate_device_extension_properties(raw)? };
        let extensions = ExtensionSet::from_properties(&ext_props);
        let info = DeviceInfo::query::<A>(instance.raw(), raw, &extensions);
        let queue_families = unsafe { instance.raw().get_physical_device_queue_family_properties(raw) };
        log::debug!("adapter {}: allowlisted extensions {:?}", info.device_name(), extensions.iter().collect::<Vec<_>>());

        Ok(RefPtr::new(Self {
            raw,
            limits: Limits::from_native(&info.properties.limits),
            info,
            extensions,
            queue_families,
            instance,
        }))
    }

    fn this(&self) -> RefPtr<Self> {
        // Adapter 只通过 RefPtr 创建
        unsafe { RefPtr::clone_from_ref(self) }
    }
}

/// getter
impl<A: Api> Adapter<A> {
    #[inline]
    pub fn raw(&self) -> vk::PhysicalDevice {
        self.raw
    }

    #[inline]
    pub fn instance(&self) -> &RefPtr<Instance<A>> {
        &self.instance
    }

    #[inline]
    pub fn queue_families(&self) -> &[vk::QueueFamilyProperties] {
        &self.queue_families
    }

    #[inline]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn adapter_type(&self) -> AdapterType {
        conv::map_adapter_type(self.info.properties.device_type)
    }

    pub fn info(&self) -> AdapterInfo {
        let props = &self.info.properties;
        let (subgroup_min_size, subgroup_max_size) = if self.has_extension(DeviceExtension::SubgroupSizeControl) {
            (
                self.info.subgroup_size_control_properties.min_subgroup_size,
                self.info.subgroup_size_control_properties.max_subgroup_size,
            )
        } else {
            (self.info.subgroup_properties.subgroup_size, self.info.subgroup_properties.subgroup_size)
        };

        AdapterInfo {
            vendor: vendor_name(props.vendor_id).to_string(),
            architecture: String::new(),
            device: self.info.device_name(),
            description: format!(
                "Vulkan {}.{}.{}, driver {:#x}",
                vk::api_version_major(props.api_version),
                vk::api_version_minor(props.api_version),
                vk::api_version_patch(props.api_version),
                props.driver_version
            ),
            backend_type: BackendType::Vulkan,
            adapter_type: self.adapter_type(),
            vendor_id: props.vendor_id,
            device_id: props.device_id,
            subgroup_min_size,
            subgroup_max_size,
        }
    }

    /// 每次调用都重新求值所有判定
    pub fn features(&self) -> Vec<FeatureName> {
        features::supported_features(self)
    }

    pub fn has_feature(&self, name: FeatureName) -> bool {
        features::find_entry(name).is_some_and(|entry| (entry.supported)(self))
    }
}

// device 创建
impl<A: Api> Adapter<A> {
    /// 同步完成：回调在返回前被调用一次，回调为空时返回 [`Future::INVALID`]
    pub fn request_device(
        &self,
        descriptor: Option<DeviceDescriptor<A>>,
        callback: Option<RequestDeviceCallback<A>>,
    ) -> Future {
        let Some(callback) = callback else {
            log::error!("request_device: callback is null");
            return Future::INVALID;
        };

        match self.create_device(descriptor.unwrap_or_default()) {
            Ok(device) => callback(RequestDeviceStatus::Success, Some(device), ""),
            Err(e) => {
                log::error!("request_device: {}", e);
                callback(RequestDeviceStatus::Error, None, &e.to_string());
            }
        }

        Future::IMMEDIATE
    }

    /// 校验 limits 与 features，构建 feature 链，选择 queue family，创建逻辑设备
    ///
    /// 所有校验都在原生调用之前完成。
    pub fn create_device(&self, descriptor: DeviceDescriptor<A>) -> GfxResult<RefPtr<Device<A>>> {
        if let Some(required) = &descriptor.required_limits {
            required.check_against(&self.limits)?;
        }

        let mut enabled = features::enable_requested(self, &descriptor.required_features)?;

        let queue_family_index = self
            .queue_families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE))
            .ok_or(GfxError::NoSuitableQueue)? as u32;
        let queue_priorities = [0.0_f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];

        // 只启用扫描时确认存在的 extension
        let extension_names: Vec<*const c_char> = self.extensions.iter().map(|ext| ext.value().as_ptr()).collect();
        log::info!(
            "device extensions: {:?}",
            self.extensions.iter().map(|ext| *ext.value()).collect::<Vec<&CStr>>()
        );

        let mut features2 = vk::PhysicalDeviceFeatures2::default();
        unsafe { enabled.link(&mut features2, &self.extensions) };
        let device_ci = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut features2);

        let raw = unsafe { self.instance.raw().create_device(self.raw, &device_ci)? };

        Ok(Device::new(self.this(), raw, descriptor))
    }
}

impl<A: Api> CapabilitySource for Adapter<A> {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    fn format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        unsafe { self.instance.raw().get_physical_device_format_properties(self.raw, format) }.optimal_tiling_features
    }

    fn supports_image_format(&self, format: vk::Format, ty: vk::ImageType, usage: vk::ImageUsageFlags) -> bool {
        unsafe {
            self.instance.raw().get_physical_device_image_format_properties(
                self.raw,
                format,
                ty,
                vk::ImageTiling::OPTIMAL,
                usage,
                vk::ImageCreateFlags::empty(),
            )
        }
        .is_ok()
    }
}

impl<A: Api> Drop for Adapter<A> {
    fn drop(&mut self) {
        log::info!("destroying adapter {}", self.info.device_name());
    }
}

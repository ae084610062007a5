//! 顶层的驱动连接

use ash::vk;
use itertools::Itertools;
use wgvk_crate_tools::config::GfxConfig;

use crate::adapter::Adapter;
use crate::common::ref_counted::RefPtr;
use crate::error::{GfxError, GfxResult};
use crate::features::CapabilitySource;
use crate::future::{self, Future, FutureWaitInfo};
use crate::hal::vulkan::{Vulkan, VulkanInstance};
use crate::hal::{Api, InstanceApi};
use crate::surface::{Surface, SurfaceSource};
use crate::types::{InstanceFeatureName, PowerPreference, RequestAdapterStatus, WaitStatus};

/// instance 支持的全部能力
pub const SUPPORTED_INSTANCE_FEATURES: &[InstanceFeatureName] = &[
    InstanceFeatureName::TimedWaitAny,
    InstanceFeatureName::ShaderSourceSPIRV,
    InstanceFeatureName::MultipleDevicesPerAdapter,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceLimits {
    pub timed_wait_any_max_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestAdapterOptions {
    pub power_preference: PowerPreference,
    pub force_fallback_adapter: bool,
}

pub type RequestAdapterCallback<A> = Box<dyn FnOnce(RequestAdapterStatus, Option<RefPtr<Adapter<A>>>, &str)>;

pub struct Instance<A: Api> {
    raw: A::Instance,
}

impl Instance<Vulkan> {
    /// 加载 loader 并创建 vk instance
    pub fn new(config: &GfxConfig) -> GfxResult<RefPtr<Self>> {
        Ok(Self::from_raw(VulkanInstance::new(config)?))
    }
}

impl<A: Api> Instance<A> {
    pub fn from_raw(raw: A::Instance) -> RefPtr<Self> {
        RefPtr::new(Self { raw })
    }

    #[inline]
    pub fn raw(&self) -> &A::Instance {
        &self.raw
    }

    pub fn features() -> &'static [InstanceFeatureName] {
        SUPPORTED_INSTANCE_FEATURES
    }

    pub fn has_feature(name: InstanceFeatureName) -> bool {
        SUPPORTED_INSTANCE_FEATURES.contains(&name)
    }

    pub fn limits() -> InstanceLimits {
        InstanceLimits {
            timed_wait_any_max_count: usize::MAX,
        }
    }

    fn this(&self) -> RefPtr<Self> {
        // Instance 只通过 RefPtr 创建
        unsafe { RefPtr::clone_from_ref(self) }
    }

    /// 为每一张物理设备创建 adapter，并打印基础属性
    pub fn enumerate_adapters(&self) -> GfxResult<Vec<RefPtr<Adapter<A>>>> {
        let pdevices = unsafe { self.raw.enumerate_physical_devices()? };

        pdevices
            .into_iter()
            .enumerate()
            .map(|(index, pdevice)| {
                let adapter = Adapter::new(self.this(), pdevice)?;
                let props = &adapter.device_info().properties;
                log::info!("========================= Device {} =========================", index);
                log::info!(
                    "[APIVersion] {}.{}.{}",
                    vk::api_version_major(props.api_version),
                    vk::api_version_minor(props.api_version),
                    vk::api_version_patch(props.api_version)
                );
                log::info!("[DriverVersion] {}", props.driver_version);
                log::info!("[VendorID] {:#x}", props.vendor_id);
                log::info!("[DeviceID] {:#x}", props.device_id);
                log::info!("[DeviceType] {:?}", props.device_type);
                log::info!("[DeviceName] {}", adapter.device_info().device_name());
                Ok(adapter)
            })
            .collect()
    }

    /// 按选项挑选 adapter，没有匹配的类型时使用第一个
    pub fn select_adapter(&self, options: &RequestAdapterOptions) -> GfxResult<RefPtr<Adapter<A>>> {
        let preferred = if options.force_fallback_adapter {
            Some(vk::PhysicalDeviceType::CPU)
        } else {
            match options.power_preference {
                PowerPreference::HighPerformance => Some(vk::PhysicalDeviceType::DISCRETE_GPU),
                PowerPreference::LowPower => Some(vk::PhysicalDeviceType::INTEGRATED_GPU),
                PowerPreference::Undefined => None,
            }
        };

        self.enumerate_adapters()?
            .into_iter()
            .find_or_first(|adapter| Some(adapter.device_info().properties.device_type) == preferred)
            .ok_or(GfxError::NoAdapter)
    }

    /// 同步完成：回调在返回前被调用一次
    pub fn request_adapter(
        &self,
        options: Option<&RequestAdapterOptions>,
        callback: Option<RequestAdapterCallback<A>>,
    ) -> Future {
        let Some(callback) = callback else {
            log::error!("request_adapter: callback is null");
            return Future::INVALID;
        };

        match self.select_adapter(&options.copied().unwrap_or_default()) {
            Ok(adapter) => callback(RequestAdapterStatus::Success, Some(adapter), ""),
            Err(GfxError::NoAdapter) => {
                log::error!("request_adapter: no adapters found");
                callback(RequestAdapterStatus::Unavailable, None, "no adapters found")
            }
            Err(e) => {
                log::error!("request_adapter: {}", e);
                callback(RequestAdapterStatus::Error, None, &e.to_string())
            }
        }

        Future::IMMEDIATE
    }

    /// 没有挂起的请求
    pub fn process_events(&self) {}

    pub fn wait_any(&self, infos: &mut [FutureWaitInfo], timeout_ns: u64) -> WaitStatus {
        future::wait_any(infos, timeout_ns);
        WaitStatus::Success
    }

    pub fn create_surface(&self, source: &SurfaceSource, label: &str) -> GfxResult<RefPtr<Surface<A>>> {
        Surface::new(self.this(), source, label)
    }
}

impl<A: Api> Drop for Instance<A> {
    fn drop(&mut self) {
        log::info!("destroying instance");
        unsafe { self.raw.destroy() }
    }
}

//! instance、adapter 与 surface 的导出函数

use wgvk_crate_tools::config::GfxConfig;
use wgvk_crate_tools::init_log;

use super::ffi::*;
use super::{bool32, into_handle, into_status};
use crate::adapter::{Adapter, RequestDeviceCallback};
use crate::common::ref_counted::RefPtr;
use crate::device::Device;
use crate::error::GfxError;
use crate::future::{Future, FutureWaitInfo};
use crate::hal::vulkan::Vulkan;
use crate::instance::{Instance, RequestAdapterCallback, SUPPORTED_INSTANCE_FEATURES};
use crate::types::{FeatureName, InstanceFeatureName, RequestAdapterStatus, RequestDeviceStatus, WaitStatus};

/// 读取一次配置并初始化日志，之后创建 instance
///
/// # Safety
/// `descriptor` 必须为空或者指向有效的描述
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuCreateInstance(descriptor: *const WGPUInstanceDescriptor) -> WGPUInstance {
    let config = GfxConfig::from_env();
    let level = config.as_ref().map(GfxConfig::log_level_filter).unwrap_or(log::LevelFilter::Info);
    init_log::init_log_with_level(level);
    let config = config.unwrap_or_else(|e| {
        log::warn!("failed to load the configuration, using defaults: {:#}", e);
        GfxConfig::default()
    });

    if let Some(descriptor) = unsafe { descriptor.as_ref() } {
        if let Err(e) = unsafe { descriptor.validate() } {
            log::error!("wgpuCreateInstance: {}", e);
            return std::ptr::null();
        }
    }

    into_handle("wgpuCreateInstance", Instance::new(&config))
}

/// # Safety
/// `features` 必须为空或者可写
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuGetInstanceFeatures(features: *mut WGPUSupportedInstanceFeatures) {
    let Some(features) = (unsafe { features.as_mut() }) else {
        log::error!("wgpuGetInstanceFeatures: features is null");
        return;
    };
    features.feature_count = SUPPORTED_INSTANCE_FEATURES.len();
    // 静态数组，FreeMembers 不需要释放
    features.features = SUPPORTED_INSTANCE_FEATURES.as_ptr() as *const u32;
}

/// # Safety
/// `limits` 必须为空或者可写
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuGetInstanceLimits(limits: *mut WGPUInstanceLimits) -> u32 {
    let result = match unsafe { limits.as_mut() } {
        None => Err(GfxError::NullArgument("limits")),
        Some(limits) if !limits.next_in_chain.is_null() => Err(GfxError::UnsupportedChain("InstanceLimits")),
        Some(limits) => {
            limits.timed_wait_any_max_count = Instance::<Vulkan>::limits().timed_wait_any_max_count;
            Ok(())
        }
    };
    into_status("wgpuGetInstanceLimits", result)
}

#[unsafe(no_mangle)]
pub extern "C" fn wgpuHasInstanceFeature(feature: u32) -> WGPUBool {
    bool32(InstanceFeatureName::from_raw(feature).is_some_and(Instance::<Vulkan>::has_feature))
}

#[unsafe(no_mangle)]
pub extern "C" fn wgpuSupportedInstanceFeaturesFreeMembers(_features: WGPUSupportedInstanceFeatures) {}

/// # Safety
/// `features` 必须来自 `wgpuAdapterGetFeatures` 或 `wgpuDeviceGetFeatures`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuSupportedFeaturesFreeMembers(features: WGPUSupportedFeatures) {
    unsafe { features.free_members() }
}

/// # Safety
/// `info` 必须由 `wgpuAdapterGetInfo` 或 `wgpuDeviceGetAdapterInfo` 填充
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuAdapterInfoFreeMembers(info: WGPUAdapterInfo) {
    unsafe { info.free_members() }
}

/// # Safety
/// `capabilities` 必须由 `wgpuSurfaceGetCapabilities` 填充
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuSurfaceCapabilitiesFreeMembers(capabilities: WGPUSurfaceCapabilities) {
    unsafe { capabilities.free_members() }
}

// instance
/// # Safety
/// 句柄与指针参数必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuInstanceRequestAdapter(
    instance: WGPUInstance,
    options: *const WGPURequestAdapterOptions,
    callback_info: WGPURequestAdapterCallbackInfo,
) -> Future {
    let Some(instance) = (unsafe { instance.as_ref() }) else {
        log::error!("wgpuInstanceRequestAdapter: instance is null");
        return Future::INVALID;
    };

    let callback = callback_info.callback.map(|callback| {
        let userdata = UserData::new(callback_info.userdata1, callback_info.userdata2);
        Box::new(move |status: RequestAdapterStatus, adapter: Option<RefPtr<Adapter<Vulkan>>>, message: &str| {
            let (userdata1, userdata2) = userdata.get();
            let adapter = adapter.map_or(std::ptr::null(), RefPtr::into_raw);
            unsafe { callback(status.to_raw(), adapter, WGPUStringView::borrowed(message), userdata1, userdata2) }
        }) as RequestAdapterCallback<Vulkan>
    });

    let options = match unsafe { options.as_ref() }.map(WGPURequestAdapterOptions::to_options).transpose() {
        Ok(options) => options,
        Err(e) => {
            log::error!("wgpuInstanceRequestAdapter: {}", e);
            return match callback {
                Some(callback) => {
                    callback(RequestAdapterStatus::Error, None, &e.to_string());
                    Future::IMMEDIATE
                }
                None => Future::INVALID,
            };
        }
    };

    instance.request_adapter(options.as_ref(), callback)
}

/// # Safety
/// `instance` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuInstanceProcessEvents(instance: WGPUInstance) {
    if let Some(instance) = unsafe { instance.as_ref() } {
        instance.process_events();
    }
}

/// # Safety
/// `futures` 必须指向 `count` 个可写元素
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuInstanceWaitAny(
    instance: WGPUInstance,
    count: usize,
    futures: *mut WGPUFutureWaitInfo,
    timeout_ns: u64,
) -> u32 {
    let Some(instance) = (unsafe { instance.as_ref() }) else {
        log::error!("wgpuInstanceWaitAny: instance is null");
        return WaitStatus::Error.to_raw();
    };
    if futures.is_null() {
        log::error!("wgpuInstanceWaitAny: futures is null");
        return WaitStatus::Error.to_raw();
    }
    if count == 0 {
        return WaitStatus::Success.to_raw();
    }

    let futures = unsafe { std::slice::from_raw_parts_mut(futures, count) };
    let mut infos: Vec<FutureWaitInfo> = futures
        .iter()
        .map(|info| FutureWaitInfo {
            future: info.future,
            completed: info.completed != 0,
        })
        .collect();
    let status = instance.wait_any(&mut infos, timeout_ns);
    for (dst, src) in futures.iter_mut().zip(&infos) {
        dst.completed = bool32(src.completed);
    }
    status.to_raw()
}

/// # Safety
/// 句柄与描述必须有效，扩展链上的平台来源必须与 `s_type` 一致
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuInstanceCreateSurface(
    instance: WGPUInstance,
    descriptor: *const WGPUSurfaceDescriptor,
) -> WGPUSurface {
    let (Some(instance), Some(descriptor)) = (unsafe { instance.as_ref() }, unsafe { descriptor.as_ref() }) else {
        log::error!("wgpuInstanceCreateSurface: instance or descriptor is null");
        return std::ptr::null();
    };
    let result = unsafe { descriptor.source() }
        .and_then(|source| instance.create_surface(&source, &unsafe { descriptor.label.to_str() }));
    into_handle("wgpuInstanceCreateSurface", result)
}

// adapter
/// # Safety
/// `adapter` 与 `features` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuAdapterGetFeatures(adapter: WGPUAdapter, features: *mut WGPUSupportedFeatures) {
    let (Some(adapter), Some(features)) = (unsafe { adapter.as_ref() }, unsafe { features.as_mut() }) else {
        log::error!("wgpuAdapterGetFeatures: adapter or features is null");
        return;
    };
    *features = WGPUSupportedFeatures::from_features(adapter.features());
}

/// # Safety
/// `adapter` 与 `info` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuAdapterGetInfo(adapter: WGPUAdapter, info: *mut WGPUAdapterInfo) -> u32 {
    let result = match (unsafe { adapter.as_ref() }, unsafe { info.as_mut() }) {
        (Some(adapter), Some(info)) => info.fill(adapter.info()),
        _ => Err(GfxError::NullArgument("adapter or info")),
    };
    into_status("wgpuAdapterGetInfo", result)
}

/// # Safety
/// `adapter` 与 `limits` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuAdapterGetLimits(adapter: WGPUAdapter, limits: *mut WGPULimits) -> u32 {
    let result = match (unsafe { adapter.as_ref() }, unsafe { limits.as_mut() }) {
        (Some(_), Some(limits)) if !limits.next_in_chain.is_null() => Err(GfxError::UnsupportedChain("Limits")),
        (Some(adapter), Some(limits)) => {
            limits.limits = adapter.limits();
            Ok(())
        }
        _ => Err(GfxError::NullArgument("adapter or limits")),
    };
    into_status("wgpuAdapterGetLimits", result)
}

/// # Safety
/// `adapter` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuAdapterHasFeature(adapter: WGPUAdapter, feature: u32) -> WGPUBool {
    let Some(adapter) = (unsafe { adapter.as_ref() }) else {
        return bool32(false);
    };
    bool32(FeatureName::from_raw(feature).is_some_and(|feature| adapter.has_feature(feature)))
}

/// # Safety
/// 句柄与描述必须有效；描述中的回调在 device 的整个生命周期内都要可用
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuAdapterRequestDevice(
    adapter: WGPUAdapter,
    descriptor: *const WGPUDeviceDescriptor,
    callback_info: WGPURequestDeviceCallbackInfo,
) -> Future {
    let Some(adapter) = (unsafe { adapter.as_ref() }) else {
        log::error!("wgpuAdapterRequestDevice: adapter is null");
        return Future::INVALID;
    };

    let callback = callback_info.callback.map(|callback| {
        let userdata = UserData::new(callback_info.userdata1, callback_info.userdata2);
        Box::new(move |status: RequestDeviceStatus, device: Option<RefPtr<Device<Vulkan>>>, message: &str| {
            let (userdata1, userdata2) = userdata.get();
            let device = device.map_or(std::ptr::null(), RefPtr::into_raw);
            unsafe { callback(status.to_raw(), device, WGPUStringView::borrowed(message), userdata1, userdata2) }
        }) as RequestDeviceCallback<Vulkan>
    });

    let descriptor = match unsafe { descriptor.as_ref() }.map(|d| unsafe { d.to_descriptor() }).transpose() {
        Ok(descriptor) => descriptor,
        Err(e) => {
            log::error!("wgpuAdapterRequestDevice: {}", e);
            return match callback {
                Some(callback) => {
                    callback(RequestDeviceStatus::Error, None, &e.to_string());
                    Future::IMMEDIATE
                }
                None => Future::INVALID,
            };
        }
    };

    adapter.request_device(descriptor, callback)
}

// surface
/// # Safety
/// 句柄与输出必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuSurfaceGetCapabilities(
    surface: WGPUSurface,
    adapter: WGPUAdapter,
    capabilities: *mut WGPUSurfaceCapabilities,
) -> u32 {
    let result = match (unsafe { surface.as_ref() }, unsafe { adapter.as_ref() }, unsafe { capabilities.as_mut() }) {
        (Some(surface), Some(adapter), Some(capabilities)) => {
            surface.get_capabilities(adapter).and_then(|caps| capabilities.fill(caps))
        }
        _ => Err(GfxError::NullArgument("surface, adapter or capabilities")),
    };
    into_status("wgpuSurfaceGetCapabilities", result)
}

/// # Safety
/// 句柄与配置必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuSurfaceConfigure(surface: WGPUSurface, config: *const WGPUSurfaceConfiguration) {
    let result = match (unsafe { surface.as_ref() }, unsafe { config.as_ref() }) {
        (Some(surface), Some(config)) => unsafe { config.to_config() }.and_then(|config| {
            surface.configure(
                config.device,
                config.format,
                config.usage,
                config.size,
                config.present_mode,
                config.alpha_mode,
            )
        }),
        _ => Err(GfxError::NullArgument("surface or config")),
    };
    if let Err(e) = result {
        log::error!("wgpuSurfaceConfigure: {}", e);
    }
}

/// # Safety
/// `surface` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuSurfaceUnconfigure(surface: WGPUSurface) {
    if let Some(surface) = unsafe { surface.as_ref() } {
        surface.unconfigure();
    }
}

/// # Safety
/// `surface` 与 `label` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuSurfaceSetLabel(surface: WGPUSurface, label: WGPUStringView) {
    if let Some(surface) = unsafe { surface.as_ref() } {
        surface.set_label(&unsafe { label.to_str() });
    }
}

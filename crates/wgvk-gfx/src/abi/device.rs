//! device 与资源对象的导出函数

use super::ffi::*;
use super::{bool32, into_handle, into_status};
use crate::common::ref_counted::RefPtr;
use crate::error::GfxError;
use crate::future::Future;
use crate::types::FeatureName;

// device
/// # Safety
/// 句柄与描述必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceCreateBuffer(
    device: WGPUDevice,
    descriptor: *const WGPUBufferDescriptor,
) -> WGPUBuffer {
    let result = match (unsafe { device.as_ref() }, unsafe { descriptor.as_ref() }) {
        (Some(device), Some(descriptor)) => {
            unsafe { descriptor.to_descriptor() }.and_then(|descriptor| device.create_buffer(&descriptor))
        }
        _ => Err(GfxError::NullArgument("device or descriptor")),
    };
    into_handle("wgpuDeviceCreateBuffer", result)
}

/// # Safety
/// 句柄与描述必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceCreateTexture(
    device: WGPUDevice,
    descriptor: *const WGPUTextureDescriptor,
) -> WGPUTexture {
    let result = match (unsafe { device.as_ref() }, unsafe { descriptor.as_ref() }) {
        (Some(device), Some(descriptor)) => {
            unsafe { descriptor.to_descriptor() }.and_then(|descriptor| device.create_texture(&descriptor))
        }
        _ => Err(GfxError::NullArgument("device or descriptor")),
    };
    into_handle("wgpuDeviceCreateTexture", result)
}

/// 描述为空时使用默认参数
///
/// # Safety
/// 句柄必须有效，描述为空或者有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceCreateSampler(
    device: WGPUDevice,
    descriptor: *const WGPUSamplerDescriptor,
) -> WGPUSampler {
    let Some(device) = (unsafe { device.as_ref() }) else {
        log::error!("wgpuDeviceCreateSampler: device is null");
        return std::ptr::null();
    };
    let result = unsafe { descriptor.as_ref() }
        .map(|descriptor| unsafe { descriptor.to_descriptor() })
        .transpose()
        .and_then(|descriptor| device.create_sampler(descriptor.as_ref()));
    into_handle("wgpuDeviceCreateSampler", result)
}

/// # Safety
/// 句柄与描述必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceCreateBindGroupLayout(
    device: WGPUDevice,
    descriptor: *const WGPUBindGroupLayoutDescriptor,
) -> WGPUBindGroupLayout {
    let result = match (unsafe { device.as_ref() }, unsafe { descriptor.as_ref() }) {
        (Some(device), Some(descriptor)) => {
            unsafe { descriptor.to_descriptor() }.and_then(|descriptor| device.create_bind_group_layout(&descriptor))
        }
        _ => Err(GfxError::NullArgument("device or descriptor")),
    };
    into_handle("wgpuDeviceCreateBindGroupLayout", result)
}

/// # Safety
/// 句柄与描述必须有效，描述中的句柄必须指向存活对象
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceCreateBindGroup(
    device: WGPUDevice,
    descriptor: *const WGPUBindGroupDescriptor,
) -> WGPUBindGroup {
    let result = match (unsafe { device.as_ref() }, unsafe { descriptor.as_ref() }) {
        (Some(device), Some(descriptor)) => {
            unsafe { descriptor.to_descriptor() }.and_then(|descriptor| device.create_bind_group(&descriptor))
        }
        _ => Err(GfxError::NullArgument("device or descriptor")),
    };
    into_handle("wgpuDeviceCreateBindGroup", result)
}

/// # Safety
/// `device` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceDestroy(device: WGPUDevice) {
    if let Some(device) = unsafe { device.as_ref() } {
        device.destroy();
    }
}

/// 返回一份新的引用，device 销毁之后返回空句柄
///
/// # Safety
/// `device` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceGetAdapter(device: WGPUDevice) -> WGPUAdapter {
    unsafe { device.as_ref() }
        .and_then(|device| device.adapter())
        .map_or(std::ptr::null(), RefPtr::into_raw)
}

/// # Safety
/// `device` 与 `info` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceGetAdapterInfo(device: WGPUDevice, info: *mut WGPUAdapterInfo) -> u32 {
    let result = match (unsafe { device.as_ref() }, unsafe { info.as_mut() }) {
        (Some(device), Some(info)) => device.adapter_info().and_then(|adapter_info| info.fill(adapter_info)),
        _ => Err(GfxError::NullArgument("device or info")),
    };
    into_status("wgpuDeviceGetAdapterInfo", result)
}

/// # Safety
/// `device` 与 `features` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceGetFeatures(device: WGPUDevice, features: *mut WGPUSupportedFeatures) {
    let (Some(device), Some(features)) = (unsafe { device.as_ref() }, unsafe { features.as_mut() }) else {
        log::error!("wgpuDeviceGetFeatures: device or features is null");
        return;
    };
    *features = WGPUSupportedFeatures::from_features(device.features());
}

/// # Safety
/// `device` 与 `limits` 必须有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceGetLimits(device: WGPUDevice, limits: *mut WGPULimits) -> u32 {
    let result = match (unsafe { device.as_ref() }, unsafe { limits.as_mut() }) {
        (Some(_), Some(limits)) if !limits.next_in_chain.is_null() => Err(GfxError::UnsupportedChain("Limits")),
        (Some(device), Some(limits)) => device.limits().map(|supported| limits.limits = supported),
        _ => Err(GfxError::NullArgument("device or limits")),
    };
    into_status("wgpuDeviceGetLimits", result)
}

/// # Safety
/// `device` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceHasFeature(device: WGPUDevice, feature: u32) -> WGPUBool {
    let Some(device) = (unsafe { device.as_ref() }) else {
        return bool32(false);
    };
    bool32(FeatureName::from_raw(feature).is_some_and(|feature| device.has_feature(feature)))
}

/// # Safety
/// `device` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuDeviceGetLostFuture(device: WGPUDevice) -> Future {
    unsafe { device.as_ref() }.map_or(Future::INVALID, |device| device.lost_future())
}

// buffer
/// # Safety
/// `buffer` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuBufferDestroy(buffer: WGPUBuffer) {
    if let Some(buffer) = unsafe { buffer.as_ref() } {
        buffer.destroy();
    }
}

/// # Safety
/// `buffer` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuBufferGetSize(buffer: WGPUBuffer) -> u64 {
    unsafe { buffer.as_ref() }.map_or(0, |buffer| buffer.size())
}

/// # Safety
/// `buffer` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuBufferGetUsage(buffer: WGPUBuffer) -> u64 {
    unsafe { buffer.as_ref() }.map_or(0, |buffer| buffer.usage().bits())
}

// texture
/// 描述为空时由纹理推导全部参数
///
/// # Safety
/// 句柄必须有效，描述为空或者有效
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuTextureCreateView(
    texture: WGPUTexture,
    descriptor: *const WGPUTextureViewDescriptor,
) -> WGPUTextureView {
    let Some(texture) = (unsafe { texture.as_ref() }) else {
        log::error!("wgpuTextureCreateView: texture is null");
        return std::ptr::null();
    };
    let result = unsafe { descriptor.as_ref() }
        .map(|descriptor| unsafe { descriptor.to_descriptor() })
        .transpose()
        .and_then(|descriptor| texture.create_view(descriptor.as_ref()));
    into_handle("wgpuTextureCreateView", result)
}

/// # Safety
/// `texture` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuTextureDestroy(texture: WGPUTexture) {
    if let Some(texture) = unsafe { texture.as_ref() } {
        texture.destroy();
    }
}

/// 为纹理的每个只读属性导出一个 getter，空句柄返回 0
macro_rules! export_texture_getters {
    ($($name:ident => |$texture:ident| $value:expr;)*) => {
        $(
            /// # Safety
            /// `texture` 必须为空或者是存活的句柄
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(texture: WGPUTexture) -> u32 {
                unsafe { texture.as_ref() }.map_or(0, |$texture| $value)
            }
        )*
    };
}

export_texture_getters! {
    wgpuTextureGetWidth => |texture| texture.width();
    wgpuTextureGetHeight => |texture| texture.height();
    wgpuTextureGetDepthOrArrayLayers => |texture| texture.depth_or_array_layers();
    wgpuTextureGetDimension => |texture| texture.dimension().to_raw();
    wgpuTextureGetFormat => |texture| texture.format().to_raw();
    wgpuTextureGetMipLevelCount => |texture| texture.mip_level_count();
    wgpuTextureGetSampleCount => |texture| texture.sample_count();
}

/// # Safety
/// `texture` 必须为空或者是存活的句柄
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wgpuTextureGetUsage(texture: WGPUTexture) -> u64 {
    unsafe { texture.as_ref() }.map_or(0, |texture| texture.usage().bits())
}

/// 为每一种对象导出 `SetLabel`
macro_rules! export_set_label {
    ($($handle:ty => $name:ident;)*) => {
        $(
            /// # Safety
            /// 句柄必须为空或者存活，`label` 必须有效
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(handle: $handle, label: WGPUStringView) {
                match unsafe { handle.as_ref() } {
                    Some(object) => object.set_label(&unsafe { label.to_str() }),
                    None => log::error!(concat!(stringify!($name), ": handle is null")),
                }
            }
        )*
    };
}

export_set_label! {
    WGPUDevice => wgpuDeviceSetLabel;
    WGPUBuffer => wgpuBufferSetLabel;
    WGPUTexture => wgpuTextureSetLabel;
    WGPUTextureView => wgpuTextureViewSetLabel;
    WGPUSampler => wgpuSamplerSetLabel;
    WGPUBindGroupLayout => wgpuBindGroupLayoutSetLabel;
    WGPUBindGroup => wgpuBindGroupSetLabel;
}

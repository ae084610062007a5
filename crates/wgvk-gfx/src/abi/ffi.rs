//! `webgpu.h` 结构体的 `#[repr(C)]` 镜像，以及到内部描述的转换
//!
//! 枚举一律以 `u32` 接收，位标志以 `u64` 接收，未知取值在转换时被拒绝，
//! 不会产生非法的枚举值。

use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_void};

use crate::adapter::{Adapter, AdapterInfo};
use crate::common::ref_counted::RefPtr;
use crate::descriptors::bind_group::{BindGroup, BindGroupDescriptor, BindGroupEntry, BindingResource};
use crate::descriptors::bind_group_layout::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BufferBindingLayout, SamplerBindingLayout,
    StorageTextureBindingLayout, TextureBindingLayout,
};
use crate::device::{Device, DeviceDescriptor, DeviceLostCallback, UncapturedErrorCallback};
use crate::error::{GfxError, GfxResult};
use crate::hal::Api;
use crate::hal::vulkan::Vulkan;
use crate::instance::{Instance, RequestAdapterOptions};
use crate::limits::Limits;
use crate::resources::buffer::{Buffer, BufferDescriptor};
use crate::resources::sampler::{Sampler, SamplerDescriptor};
use crate::resources::texture::{Extent3d, Texture, TextureDescriptor};
use crate::resources::texture_view::{TextureView, TextureViewDescriptor};
use crate::surface::{Surface, SurfaceCapabilities, SurfaceSource};
use crate::types::*;

pub type WGPUBool = u32;

// 句柄：指向引用计数对象的裸指针
pub type WGPUInstance<A = Vulkan> = *const Instance<A>;
pub type WGPUAdapter<A = Vulkan> = *const Adapter<A>;
pub type WGPUDevice<A = Vulkan> = *const Device<A>;
pub type WGPUBuffer<A = Vulkan> = *const Buffer<A>;
pub type WGPUTexture<A = Vulkan> = *const Texture<A>;
pub type WGPUTextureView<A = Vulkan> = *const TextureView<A>;
pub type WGPUSampler<A = Vulkan> = *const Sampler<A>;
pub type WGPUBindGroupLayout<A = Vulkan> = *const BindGroupLayout<A>;
pub type WGPUBindGroup<A = Vulkan> = *const BindGroup<A>;
pub type WGPUSurface<A = Vulkan> = *const Surface<A>;

/// `nextInChain` 中结构体的类型标记
pub mod s_type {
    pub const SHADER_SOURCE_SPIRV: u32 = 0x1;
    pub const SHADER_SOURCE_WGSL: u32 = 0x2;
    pub const SURFACE_SOURCE_METAL_LAYER: u32 = 0x4;
    pub const SURFACE_SOURCE_WINDOWS_HWND: u32 = 0x5;
    pub const SURFACE_SOURCE_XLIB_WINDOW: u32 = 0x6;
    pub const SURFACE_SOURCE_WAYLAND_SURFACE: u32 = 0x7;
}

/// 取值未知时返回校验错误
fn enum_value<T>(raw: u32, from_raw: fn(u32) -> Option<T>, what: &str) -> GfxResult<T> {
    from_raw(raw).ok_or_else(|| GfxError::Validation(format!("invalid {} value {:#x}", what, raw)))
}

/// 空指针或者长度为 0 时得到空切片
///
/// # Safety
/// 非空时 `ptr` 必须指向 `len` 个有效元素
pub unsafe fn slice<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if ptr.is_null() || len == 0 { &[] } else { unsafe { std::slice::from_raw_parts(ptr, len) } }
}

/// 把数组交给调用方，由对应的 `FreeMembers` 收回
pub fn leak_array<T>(values: Vec<T>) -> (usize, *const T) {
    let boxed = values.into_boxed_slice();
    let len = boxed.len();
    (len, Box::into_raw(boxed) as *const T)
}

/// # Safety
/// `ptr` 与 `len` 必须来自 [`leak_array`]
pub unsafe fn free_array<T>(ptr: *const T, len: usize) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr as *mut T, len)) });
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WGPUStringView {
    pub data: *const c_char,
    pub length: usize,
}

impl WGPUStringView {
    /// `length` 取这个值时表示 `data` 以 NUL 结尾
    pub const STRLEN: usize = usize::MAX;
    pub const NULL: Self = Self {
        data: std::ptr::null(),
        length: Self::STRLEN,
    };

    /// 借用 `s`，只在当前调用期间有效
    pub fn borrowed(s: &str) -> Self {
        Self {
            data: s.as_ptr() as *const c_char,
            length: s.len(),
        }
    }

    /// 分配一份副本，由 [`WGPUStringView::free`] 释放
    pub fn owned(s: String) -> Self {
        let (length, data) = leak_array(s.into_bytes());
        Self {
            data: data as *const c_char,
            length,
        }
    }

    /// # Safety
    /// 必须来自 [`WGPUStringView::owned`]，且只能释放一次
    pub unsafe fn free(self) {
        unsafe { free_array(self.data as *const u8, self.length) }
    }

    /// 空指针得到空串，非法 UTF-8 按替换字符处理
    ///
    /// # Safety
    /// `data` 必须有效：`length == STRLEN` 时以 NUL 结尾，否则至少 `length` 字节
    pub unsafe fn to_str<'a>(self) -> Cow<'a, str> {
        if self.data.is_null() {
            return Cow::Borrowed("");
        }
        if self.length == Self::STRLEN {
            unsafe { CStr::from_ptr(self.data) }.to_string_lossy()
        } else {
            String::from_utf8_lossy(unsafe { slice(self.data as *const u8, self.length) })
        }
    }
}

impl Default for WGPUStringView {
    fn default() -> Self {
        Self::NULL
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUChainedStruct {
    pub next: *const WGPUChainedStruct,
    pub s_type: u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUChainedStructOut {
    pub next: *mut WGPUChainedStructOut,
    pub s_type: u32,
}

/// 不接受扩展链的结构体在转换前调用
fn no_chain<T>(next: *const T, what: &'static str) -> GfxResult<()> {
    if next.is_null() { Ok(()) } else { Err(GfxError::UnsupportedChain(what)) }
}

/// C 回调的两个 userdata 指针
///
/// 由调用方保证它们可以在任意线程上使用
#[derive(Clone, Copy)]
pub struct UserData(*mut c_void, *mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    pub fn new(userdata1: *mut c_void, userdata2: *mut c_void) -> Self {
        Self(userdata1, userdata2)
    }

    #[inline]
    pub fn get(self) -> (*mut c_void, *mut c_void) {
        (self.0, self.1)
    }
}

// instance
#[repr(C)]
#[derive(Debug)]
pub struct WGPUInstanceLimits {
    pub next_in_chain: *mut WGPUChainedStructOut,
    pub timed_wait_any_max_count: usize,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUInstanceDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub required_feature_count: usize,
    pub required_features: *const u32,
    pub required_limits: *const WGPUInstanceLimits,
}

impl WGPUInstanceDescriptor {
    /// 要求的 instance feature 与 limits 都必须被支持
    ///
    /// # Safety
    /// 指针字段必须有效
    pub unsafe fn validate(&self) -> GfxResult<()> {
        no_chain(self.next_in_chain, "InstanceDescriptor")?;
        for raw in unsafe { slice(self.required_features, self.required_feature_count) } {
            let feature = enum_value(*raw, InstanceFeatureName::from_raw, "instance feature")?;
            if !Instance::<Vulkan>::has_feature(feature) {
                return Err(GfxError::Validation(format!("instance feature {:?} is not supported", feature)));
            }
        }
        if let Some(limits) = unsafe { self.required_limits.as_ref() } {
            let supported = Instance::<Vulkan>::limits().timed_wait_any_max_count;
            if limits.timed_wait_any_max_count > supported {
                return Err(GfxError::LimitExceeded {
                    name: "timed_wait_any_max_count",
                    requested: limits.timed_wait_any_max_count as u64,
                    supported: supported as u64,
                });
            }
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSupportedInstanceFeatures {
    pub feature_count: usize,
    pub features: *const u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSupportedFeatures {
    pub feature_count: usize,
    pub features: *const u32,
}

impl WGPUSupportedFeatures {
    pub fn from_features(features: Vec<FeatureName>) -> Self {
        let (feature_count, features) = leak_array(features.into_iter().map(FeatureName::to_raw).collect());
        Self {
            feature_count,
            features,
        }
    }

    /// # Safety
    /// 必须来自 [`WGPUSupportedFeatures::from_features`]
    pub unsafe fn free_members(self) {
        unsafe { free_array(self.features, self.feature_count) }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WGPUFutureWaitInfo {
    pub future: crate::future::Future,
    pub completed: WGPUBool,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPURequestAdapterOptions<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub feature_level: u32,
    pub power_preference: u32,
    pub force_fallback_adapter: WGPUBool,
    pub backend_type: u32,
    pub compatible_surface: WGPUSurface<A>,
}

impl<A: Api> WGPURequestAdapterOptions<A> {
    pub fn to_options(&self) -> GfxResult<RequestAdapterOptions> {
        no_chain(self.next_in_chain, "RequestAdapterOptions")?;
        Ok(RequestAdapterOptions {
            power_preference: enum_value(self.power_preference, PowerPreference::from_raw, "power preference")?,
            force_fallback_adapter: self.force_fallback_adapter != 0,
        })
    }
}

pub type WGPURequestAdapterCallback<A = Vulkan> = Option<
    unsafe extern "C" fn(
        status: u32,
        adapter: WGPUAdapter<A>,
        message: WGPUStringView,
        userdata1: *mut c_void,
        userdata2: *mut c_void,
    ),
>;

#[repr(C)]
pub struct WGPURequestAdapterCallbackInfo<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub mode: u32,
    pub callback: WGPURequestAdapterCallback<A>,
    pub userdata1: *mut c_void,
    pub userdata2: *mut c_void,
}

// adapter
#[repr(C)]
#[derive(Debug)]
pub struct WGPUAdapterInfo {
    pub next_in_chain: *mut WGPUChainedStructOut,
    pub vendor: WGPUStringView,
    pub architecture: WGPUStringView,
    pub device: WGPUStringView,
    pub description: WGPUStringView,
    pub backend_type: u32,
    pub adapter_type: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub subgroup_min_size: u32,
    pub subgroup_max_size: u32,
}

impl WGPUAdapterInfo {
    /// 字符串由兼容层分配，通过 `wgpuAdapterInfoFreeMembers` 释放
    pub fn fill(&mut self, info: AdapterInfo) -> GfxResult<()> {
        no_chain(self.next_in_chain, "AdapterInfo")?;
        self.vendor = WGPUStringView::owned(info.vendor);
        self.architecture = WGPUStringView::owned(info.architecture);
        self.device = WGPUStringView::owned(info.device);
        self.description = WGPUStringView::owned(info.description);
        self.backend_type = info.backend_type.to_raw();
        self.adapter_type = info.adapter_type.to_raw();
        self.vendor_id = info.vendor_id;
        self.device_id = info.device_id;
        self.subgroup_min_size = info.subgroup_min_size;
        self.subgroup_max_size = info.subgroup_max_size;
        Ok(())
    }

    /// # Safety
    /// 必须由 [`WGPUAdapterInfo::fill`] 填充
    pub unsafe fn free_members(self) {
        if !self.next_in_chain.is_null() {
            return;
        }
        unsafe {
            self.vendor.free();
            self.architecture.free();
            self.device.free();
            self.description.free();
        }
    }
}

/// 与 `WGPULimits` 布局一致：扩展链之后紧跟全部字段
#[repr(C)]
#[derive(Debug)]
pub struct WGPULimits {
    pub next_in_chain: *mut WGPUChainedStructOut,
    pub limits: Limits,
}

pub type WGPUDeviceLostCallback<A = Vulkan> = Option<
    unsafe extern "C" fn(
        device: *const WGPUDevice<A>,
        reason: u32,
        message: WGPUStringView,
        userdata1: *mut c_void,
        userdata2: *mut c_void,
    ),
>;

pub type WGPUUncapturedErrorCallback<A = Vulkan> = Option<
    unsafe extern "C" fn(
        device: *const WGPUDevice<A>,
        ty: u32,
        message: WGPUStringView,
        userdata1: *mut c_void,
        userdata2: *mut c_void,
    ),
>;

#[repr(C)]
pub struct WGPUDeviceLostCallbackInfo<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub mode: u32,
    pub callback: WGPUDeviceLostCallback<A>,
    pub userdata1: *mut c_void,
    pub userdata2: *mut c_void,
}

#[repr(C)]
pub struct WGPUUncapturedErrorCallbackInfo<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub callback: WGPUUncapturedErrorCallback<A>,
    pub userdata1: *mut c_void,
    pub userdata2: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUQueueDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
}

#[repr(C)]
pub struct WGPUDeviceDescriptor<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub required_feature_count: usize,
    pub required_features: *const u32,
    pub required_limits: *const WGPULimits,
    pub default_queue: WGPUQueueDescriptor,
    pub device_lost_callback_info: WGPUDeviceLostCallbackInfo<A>,
    pub uncaptured_error_callback_info: WGPUUncapturedErrorCallbackInfo<A>,
}

impl<A: Api> WGPUDeviceDescriptor<A> {
    /// # Safety
    /// 指针字段必须有效；回调与 userdata 在 device 的整个生命周期内都要可用
    pub unsafe fn to_descriptor(&self) -> GfxResult<DeviceDescriptor<A>> {
        no_chain(self.next_in_chain, "DeviceDescriptor")?;

        let required_features = unsafe { slice(self.required_features, self.required_feature_count) }
            .iter()
            .map(|raw| enum_value(*raw, FeatureName::from_raw, "feature"))
            .collect::<GfxResult<Vec<_>>>()?;

        let required_limits = match unsafe { self.required_limits.as_ref() } {
            Some(limits) => {
                no_chain(limits.next_in_chain, "Limits")?;
                Some(limits.limits)
            }
            None => None,
        };

        Ok(DeviceDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            required_features,
            required_limits,
            device_lost_callback: lost_callback(&self.device_lost_callback_info),
            uncaptured_error_callback: error_callback(&self.uncaptured_error_callback_info),
        })
    }
}

fn lost_callback<A: Api>(info: &WGPUDeviceLostCallbackInfo<A>) -> Option<DeviceLostCallback<A>> {
    let callback = info.callback?;
    let userdata = UserData::new(info.userdata1, info.userdata2);
    Some(Box::new(move |device: &Device<A>, reason: DeviceLostReason, message: &str| {
        let handle: WGPUDevice<A> = device;
        let (userdata1, userdata2) = userdata.get();
        unsafe { callback(&handle, reason.to_raw(), WGPUStringView::borrowed(message), userdata1, userdata2) }
    }))
}

fn error_callback<A: Api>(info: &WGPUUncapturedErrorCallbackInfo<A>) -> Option<UncapturedErrorCallback<A>> {
    let callback = info.callback?;
    let userdata = UserData::new(info.userdata1, info.userdata2);
    Some(Box::new(move |device: &Device<A>, ty: ErrorType, message: &str| {
        let handle: WGPUDevice<A> = device;
        let (userdata1, userdata2) = userdata.get();
        unsafe { callback(&handle, ty.to_raw(), WGPUStringView::borrowed(message), userdata1, userdata2) }
    }))
}

pub type WGPURequestDeviceCallback<A = Vulkan> = Option<
    unsafe extern "C" fn(
        status: u32,
        device: WGPUDevice<A>,
        message: WGPUStringView,
        userdata1: *mut c_void,
        userdata2: *mut c_void,
    ),
>;

#[repr(C)]
pub struct WGPURequestDeviceCallbackInfo<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub mode: u32,
    pub callback: WGPURequestDeviceCallback<A>,
    pub userdata1: *mut c_void,
    pub userdata2: *mut c_void,
}

// resources
#[repr(C)]
#[derive(Debug)]
pub struct WGPUBufferDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub usage: u64,
    pub size: u64,
    pub mapped_at_creation: WGPUBool,
}

impl WGPUBufferDescriptor {
    /// # Safety
    /// `label` 必须有效
    pub unsafe fn to_descriptor(&self) -> GfxResult<BufferDescriptor> {
        no_chain(self.next_in_chain, "BufferDescriptor")?;
        Ok(BufferDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            usage: BufferUsages::from_bits(self.usage)
                .ok_or_else(|| GfxError::Validation(format!("invalid buffer usage {:#x}", self.usage)))?,
            size: self.size,
            mapped_at_creation: self.mapped_at_creation != 0,
        })
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUTextureDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub usage: u64,
    pub dimension: u32,
    pub size: Extent3d,
    pub format: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub view_format_count: usize,
    pub view_formats: *const u32,
}

fn texture_usage(raw: u64) -> GfxResult<TextureUsages> {
    TextureUsages::from_bits(raw).ok_or_else(|| GfxError::Validation(format!("invalid texture usage {:#x}", raw)))
}

fn texture_formats(raw: &[u32]) -> GfxResult<Vec<TextureFormat>> {
    raw.iter().map(|format| enum_value(*format, TextureFormat::from_raw, "texture format")).collect()
}

impl WGPUTextureDescriptor {
    /// # Safety
    /// `label` 与 `view_formats` 必须有效
    pub unsafe fn to_descriptor(&self) -> GfxResult<TextureDescriptor> {
        no_chain(self.next_in_chain, "TextureDescriptor")?;
        Ok(TextureDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            usage: texture_usage(self.usage)?,
            dimension: enum_value(self.dimension, TextureDimension::from_raw, "texture dimension")?,
            size: self.size,
            format: enum_value(self.format, TextureFormat::from_raw, "texture format")?,
            mip_level_count: self.mip_level_count,
            sample_count: self.sample_count,
            view_formats: texture_formats(unsafe { slice(self.view_formats, self.view_format_count) })?,
        })
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUTextureViewDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub format: u32,
    pub dimension: u32,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    pub aspect: u32,
    pub usage: u64,
}

impl WGPUTextureViewDescriptor {
    /// # Safety
    /// `label` 必须有效
    pub unsafe fn to_descriptor(&self) -> GfxResult<TextureViewDescriptor> {
        no_chain(self.next_in_chain, "TextureViewDescriptor")?;
        Ok(TextureViewDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            format: enum_value(self.format, TextureFormat::from_raw, "texture format")?,
            dimension: enum_value(self.dimension, TextureViewDimension::from_raw, "view dimension")?,
            base_mip_level: self.base_mip_level,
            mip_level_count: self.mip_level_count,
            base_array_layer: self.base_array_layer,
            array_layer_count: self.array_layer_count,
            aspect: enum_value(self.aspect, TextureAspect::from_raw, "texture aspect")?,
            usage: texture_usage(self.usage)?,
        })
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSamplerDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub address_mode_u: u32,
    pub address_mode_v: u32,
    pub address_mode_w: u32,
    pub mag_filter: u32,
    pub min_filter: u32,
    pub mipmap_filter: u32,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: u32,
    pub max_anisotropy: u16,
}

impl WGPUSamplerDescriptor {
    /// # Safety
    /// `label` 必须有效
    pub unsafe fn to_descriptor(&self) -> GfxResult<SamplerDescriptor> {
        no_chain(self.next_in_chain, "SamplerDescriptor")?;
        Ok(SamplerDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            address_mode_u: enum_value(self.address_mode_u, AddressMode::from_raw, "address mode")?,
            address_mode_v: enum_value(self.address_mode_v, AddressMode::from_raw, "address mode")?,
            address_mode_w: enum_value(self.address_mode_w, AddressMode::from_raw, "address mode")?,
            mag_filter: enum_value(self.mag_filter, FilterMode::from_raw, "filter mode")?,
            min_filter: enum_value(self.min_filter, FilterMode::from_raw, "filter mode")?,
            mipmap_filter: enum_value(self.mipmap_filter, MipmapFilterMode::from_raw, "mipmap filter mode")?,
            lod_min_clamp: self.lod_min_clamp,
            lod_max_clamp: self.lod_max_clamp,
            compare: enum_value(self.compare, CompareFunction::from_raw, "compare function")?,
            max_anisotropy: self.max_anisotropy,
        })
    }
}

// bind groups
#[repr(C)]
#[derive(Debug)]
pub struct WGPUBufferBindingLayout {
    pub next_in_chain: *const WGPUChainedStruct,
    pub ty: u32,
    pub has_dynamic_offset: WGPUBool,
    pub min_binding_size: u64,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSamplerBindingLayout {
    pub next_in_chain: *const WGPUChainedStruct,
    pub ty: u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUTextureBindingLayout {
    pub next_in_chain: *const WGPUChainedStruct,
    pub sample_type: u32,
    pub view_dimension: u32,
    pub multisampled: WGPUBool,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUStorageTextureBindingLayout {
    pub next_in_chain: *const WGPUChainedStruct,
    pub access: u32,
    pub format: u32,
    pub view_dimension: u32,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUBindGroupLayoutEntry {
    pub next_in_chain: *const WGPUChainedStruct,
    pub binding: u32,
    pub visibility: u64,
    pub binding_array_size: u32,
    pub buffer: WGPUBufferBindingLayout,
    pub sampler: WGPUSamplerBindingLayout,
    pub texture: WGPUTextureBindingLayout,
    pub storage_texture: WGPUStorageTextureBindingLayout,
}

impl WGPUBindGroupLayoutEntry {
    pub fn to_entry(&self) -> GfxResult<BindGroupLayoutEntry> {
        no_chain(self.next_in_chain, "BindGroupLayoutEntry")?;
        Ok(BindGroupLayoutEntry {
            binding: self.binding,
            visibility: ShaderStages::from_bits(self.visibility)
                .ok_or_else(|| GfxError::Validation(format!("invalid shader stages {:#x}", self.visibility)))?,
            binding_array_size: self.binding_array_size,
            buffer: BufferBindingLayout {
                ty: enum_value(self.buffer.ty, BufferBindingType::from_raw, "buffer binding type")?,
                has_dynamic_offset: self.buffer.has_dynamic_offset != 0,
                min_binding_size: self.buffer.min_binding_size,
            },
            sampler: SamplerBindingLayout {
                ty: enum_value(self.sampler.ty, SamplerBindingType::from_raw, "sampler binding type")?,
            },
            texture: TextureBindingLayout {
                sample_type: enum_value(self.texture.sample_type, TextureSampleType::from_raw, "sample type")?,
                view_dimension: enum_value(self.texture.view_dimension, TextureViewDimension::from_raw, "view dimension")?,
                multisampled: self.texture.multisampled != 0,
            },
            storage_texture: StorageTextureBindingLayout {
                access: enum_value(self.storage_texture.access, StorageTextureAccess::from_raw, "storage access")?,
                format: enum_value(self.storage_texture.format, TextureFormat::from_raw, "texture format")?,
                view_dimension: enum_value(
                    self.storage_texture.view_dimension,
                    TextureViewDimension::from_raw,
                    "view dimension",
                )?,
            },
        })
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUBindGroupLayoutDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub entry_count: usize,
    pub entries: *const WGPUBindGroupLayoutEntry,
}

impl WGPUBindGroupLayoutDescriptor {
    /// # Safety
    /// `label` 与 `entries` 必须有效
    pub unsafe fn to_descriptor(&self) -> GfxResult<BindGroupLayoutDescriptor> {
        no_chain(self.next_in_chain, "BindGroupLayoutDescriptor")?;
        Ok(BindGroupLayoutDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            entries: unsafe { slice(self.entries, self.entry_count) }
                .iter()
                .map(WGPUBindGroupLayoutEntry::to_entry)
                .collect::<GfxResult<_>>()?,
        })
    }
}

/// 借用句柄并增加一份引用，空句柄得到 `None`
///
/// # Safety
/// 非空时必须是存活对象的句柄
pub unsafe fn retain<T>(handle: *const T) -> Option<RefPtr<T>> {
    unsafe { handle.as_ref().map(|value| RefPtr::clone_from_ref(value)) }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUBindGroupEntry<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub binding: u32,
    pub buffer: WGPUBuffer<A>,
    pub offset: u64,
    pub size: u64,
    pub sampler: WGPUSampler<A>,
    pub texture_view: WGPUTextureView<A>,
}

impl<A: Api> WGPUBindGroupEntry<A> {
    /// 三个句柄中必须恰好有一个非空
    ///
    /// # Safety
    /// 非空句柄必须指向存活对象
    pub unsafe fn to_entry(&self) -> GfxResult<BindGroupEntry<A>> {
        no_chain(self.next_in_chain, "BindGroupEntry")?;
        let resource = unsafe {
            match (retain(self.buffer), retain(self.sampler), retain(self.texture_view)) {
                (Some(buffer), None, None) => BindingResource::Buffer {
                    buffer,
                    offset: self.offset,
                    size: self.size,
                },
                (None, Some(sampler), None) => BindingResource::Sampler(sampler),
                (None, None, Some(view)) => BindingResource::TextureView(view),
                _ => {
                    return Err(GfxError::Validation(format!(
                        "bind group entry {} must set exactly one resource",
                        self.binding
                    )));
                }
            }
        };
        Ok(BindGroupEntry {
            binding: self.binding,
            resource,
        })
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUBindGroupDescriptor<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub layout: WGPUBindGroupLayout<A>,
    pub entry_count: usize,
    pub entries: *const WGPUBindGroupEntry<A>,
}

impl<A: Api> WGPUBindGroupDescriptor<A> {
    /// # Safety
    /// `label`、`layout` 与 `entries` 必须有效
    pub unsafe fn to_descriptor(&self) -> GfxResult<BindGroupDescriptor<A>> {
        no_chain(self.next_in_chain, "BindGroupDescriptor")?;
        let layout = unsafe { retain(self.layout) }.ok_or(GfxError::NullArgument("layout"))?;
        Ok(BindGroupDescriptor {
            label: unsafe { self.label.to_str() }.into_owned(),
            layout,
            entries: unsafe { slice(self.entries, self.entry_count) }
                .iter()
                .map(|entry| unsafe { entry.to_entry() })
                .collect::<GfxResult<_>>()?,
        })
    }
}

// surface
#[repr(C)]
#[derive(Debug)]
pub struct WGPUSurfaceSourceWindowsHWND {
    pub chain: WGPUChainedStruct,
    pub hinstance: *mut c_void,
    pub hwnd: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSurfaceSourceXlibWindow {
    pub chain: WGPUChainedStruct,
    pub display: *mut c_void,
    pub window: u64,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSurfaceSourceWaylandSurface {
    pub chain: WGPUChainedStruct,
    pub display: *mut c_void,
    pub surface: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSurfaceDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
}

impl WGPUSurfaceDescriptor {
    /// 沿扩展链找到第一个认识的平台来源
    ///
    /// # Safety
    /// 扩展链上每个节点的实际类型必须与 `s_type` 一致
    pub unsafe fn source(&self) -> GfxResult<SurfaceSource> {
        let mut next = self.next_in_chain;
        while let Some(chain) = unsafe { next.as_ref() } {
            match chain.s_type {
                s_type::SURFACE_SOURCE_WINDOWS_HWND => {
                    let source = unsafe { &*(next as *const WGPUSurfaceSourceWindowsHWND) };
                    return Ok(SurfaceSource::WindowsHwnd {
                        hinstance: source.hinstance,
                        hwnd: source.hwnd,
                    });
                }
                s_type::SURFACE_SOURCE_XLIB_WINDOW => {
                    let source = unsafe { &*(next as *const WGPUSurfaceSourceXlibWindow) };
                    return Ok(SurfaceSource::Xlib {
                        display: source.display,
                        window: source.window,
                    });
                }
                s_type::SURFACE_SOURCE_WAYLAND_SURFACE => {
                    let source = unsafe { &*(next as *const WGPUSurfaceSourceWaylandSurface) };
                    return Ok(SurfaceSource::Wayland {
                        display: source.display,
                        surface: source.surface,
                    });
                }
                other => log::warn!("ignoring unsupported surface source {:#x}", other),
            }
            next = chain.next;
        }
        Err(GfxError::UnsupportedChain("SurfaceDescriptor"))
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSurfaceCapabilities {
    pub next_in_chain: *mut WGPUChainedStructOut,
    pub usages: u64,
    pub format_count: usize,
    pub formats: *const u32,
    pub present_mode_count: usize,
    pub present_modes: *const u32,
    pub alpha_mode_count: usize,
    pub alpha_modes: *const u32,
}

impl WGPUSurfaceCapabilities {
    /// 三个数组由兼容层分配，通过 `wgpuSurfaceCapabilitiesFreeMembers` 释放
    pub fn fill(&mut self, caps: SurfaceCapabilities) -> GfxResult<()> {
        no_chain(self.next_in_chain, "SurfaceCapabilities")?;
        self.usages = caps.usages.bits();
        (self.format_count, self.formats) = leak_array(caps.formats.into_iter().map(TextureFormat::to_raw).collect());
        (self.present_mode_count, self.present_modes) =
            leak_array(caps.present_modes.into_iter().map(PresentMode::to_raw).collect());
        (self.alpha_mode_count, self.alpha_modes) =
            leak_array(caps.alpha_modes.into_iter().map(CompositeAlphaMode::to_raw).collect());
        Ok(())
    }

    /// # Safety
    /// 必须由 [`WGPUSurfaceCapabilities::fill`] 填充
    pub unsafe fn free_members(self) {
        unsafe {
            free_array(self.formats, self.format_count);
            free_array(self.present_modes, self.present_mode_count);
            free_array(self.alpha_modes, self.alpha_mode_count);
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WGPUSurfaceConfiguration<A: Api = Vulkan> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub device: WGPUDevice<A>,
    pub format: u32,
    pub usage: u64,
    pub width: u32,
    pub height: u32,
    pub view_format_count: usize,
    pub view_formats: *const u32,
    pub alpha_mode: u32,
    pub present_mode: u32,
}

/// 已经解析完毕的 surface 配置
pub struct SurfaceConfig<'a, A: Api> {
    pub device: &'a Device<A>,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub size: (u32, u32),
    pub present_mode: PresentMode,
    pub alpha_mode: CompositeAlphaMode,
}

impl<A: Api> WGPUSurfaceConfiguration<A> {
    /// # Safety
    /// `device` 必须为空或者指向存活的 device
    pub unsafe fn to_config(&self) -> GfxResult<SurfaceConfig<'_, A>> {
        no_chain(self.next_in_chain, "SurfaceConfiguration")?;
        let device = unsafe { self.device.as_ref() }.ok_or(GfxError::NullArgument("device"))?;
        texture_formats(unsafe { slice(self.view_formats, self.view_format_count) })?;
        Ok(SurfaceConfig {
            device,
            format: enum_value(self.format, TextureFormat::from_raw, "texture format")?,
            usage: texture_usage(self.usage)?,
            size: (self.width, self.height),
            present_mode: enum_value(self.present_mode, PresentMode::from_raw, "present mode")?,
            alpha_mode: enum_value(self.alpha_mode, CompositeAlphaMode::from_raw, "alpha mode")?,
        })
    }
}

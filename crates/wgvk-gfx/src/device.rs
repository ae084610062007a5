//! 资源工厂：逻辑设备、vma 分配器，以及设备级错误的回调路由

use std::sync::atomic::{AtomicUsize, Ordering};

use ash::vk;
use parking_lot::{Mutex, RwLock};

use crate::adapter::{Adapter, AdapterInfo};
use crate::common::ref_counted::RefPtr;
use crate::common::weak_ptr::{WeakPtr, WeakPtrFactory};
use crate::descriptors::bind_group::{BindGroup, BindGroupDescriptor};
use crate::descriptors::bind_group_layout::{BindGroupLayout, BindGroupLayoutDescriptor};
use crate::error::{GfxError, GfxResult};
use crate::features::CapabilitySource;
use crate::future::Future;
use crate::hal::{Api, DeviceApi};
use crate::limits::Limits;
use crate::resources::buffer::{Buffer, BufferDescriptor};
use crate::resources::sampler::{Sampler, SamplerDescriptor};
use crate::resources::texture::{Texture, TextureDescriptor};
use crate::types::{DeviceLostReason, ErrorType, FeatureName};

pub type DeviceLostCallback<A> = Box<dyn Fn(&Device<A>, DeviceLostReason, &str) + Send + Sync>;
pub type UncapturedErrorCallback<A> = Box<dyn Fn(&Device<A>, ErrorType, &str) + Send + Sync>;

pub struct DeviceDescriptor<A: Api> {
    pub label: String,
    pub required_features: Vec<FeatureName>,
    /// `None` 或者字段为哨兵值表示不做要求
    pub required_limits: Option<Limits>,
    pub device_lost_callback: Option<DeviceLostCallback<A>>,
    pub uncaptured_error_callback: Option<UncapturedErrorCallback<A>>,
}

impl<A: Api> Default for DeviceDescriptor<A> {
    fn default() -> Self {
        Self {
            label: String::new(),
            required_features: Vec::new(),
            required_limits: None,
            device_lost_callback: None,
            uncaptured_error_callback: None,
        }
    }
}

pub struct Device<A: Api> {
    /// `destroy` 之后为 `None`
    raw: RwLock<Option<A::Device>>,
    label: Mutex<String>,

    /// 创建时是否启用了各向异性过滤
    anisotropy_enabled: bool,
    /// 采样器各向异性的上限，来自 adapter 的 `maxSamplerAnisotropy`
    max_sampler_anisotropy: f32,

    /// 尚未释放的 buffer / texture 内存
    live_allocations: AtomicUsize,

    /// 只会触发一次，触发后被取走
    lost_callback: Mutex<Option<DeviceLostCallback<A>>>,
    error_callback: Option<UncapturedErrorCallback<A>>,

    weak_factory: WeakPtrFactory<Device<A>>,

    /// 在 `destroy` 中最后释放
    adapter: Mutex<Option<RefPtr<Adapter<A>>>>,
}

// new & init
impl<A: Api> Device<A> {
    pub(crate) fn new(adapter: RefPtr<Adapter<A>>, raw: A::Device, descriptor: DeviceDescriptor<A>) -> RefPtr<Self> {
        log::info!("device created: {:?}", descriptor.label);
        let anisotropy_enabled = adapter.device_info().features.sampler_anisotropy == vk::TRUE;
        let max_sampler_anisotropy = adapter.device_info().properties.limits.max_sampler_anisotropy;

        RefPtr::new(Self {
            raw: RwLock::new(Some(raw)),
            label: Mutex::new(descriptor.label),
            anisotropy_enabled,
            max_sampler_anisotropy,
            live_allocations: AtomicUsize::new(0),
            lost_callback: Mutex::new(descriptor.device_lost_callback),
            error_callback: descriptor.uncaptured_error_callback,
            weak_factory: WeakPtrFactory::new(),
            adapter: Mutex::new(Some(adapter)),
        })
    }

    fn this(&self) -> RefPtr<Self> {
        // Device 只通过 RefPtr 创建
        unsafe { RefPtr::clone_from_ref(self) }
    }
}

// destroy
impl<A: Api> Device<A> {
    /// 依次释放分配器、逻辑设备、对 adapter 的强引用
    ///
    /// 可以重复调用；析构时会自动调用。
    pub fn destroy(&self) {
        let Some(mut raw) = self.raw.write().take() else {
            return;
        };

        log::info!("destroying device {:?}", self.label.lock());
        let live = self.live_allocations();
        if live > 0 {
            log::warn!(
                "device {:?} is destroyed with {} live allocation(s), their memory is leaked",
                self.label.lock(),
                live
            );
        }
        unsafe {
            raw.destroy_allocator();
            raw.destroy_device();
        }
        drop(raw);
        self.weak_factory.invalidate_weak_ptrs();

        self.notify_lost(DeviceLostReason::Destroyed, "device was destroyed");

        let adapter = self.adapter.lock().take();
        drop(adapter);
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.raw.read().is_none()
    }
}

impl<A: Api> Drop for Device<A> {
    fn drop(&mut self) {
        self.destroy();
    }
}

// native 调用与错误路由
impl<A: Api> Device<A> {
    /// 在存活的逻辑设备上执行一次原生创建
    ///
    /// 设备级错误会先路由到回调，再以 `Err` 返回给调用方。
    pub(crate) fn with_raw<R>(&self, f: impl FnOnce(&A::Device) -> Result<R, vk::Result>) -> GfxResult<R> {
        let guard = self.raw.read();
        let raw = guard.as_ref().ok_or(GfxError::DeviceDestroyed)?;
        let result = f(raw);
        drop(guard);

        result.map_err(|e| {
            self.handle_native_error(e);
            GfxError::Native(e)
        })
    }

    /// buffer / texture 的内存分配成功后调用
    pub(crate) fn track_allocation(&self) {
        self.live_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// 与 [`Device::release_with`] 一样，设备已经销毁时只记录日志，计数照常减少
    pub(crate) fn release_allocation(&self, what: &str, f: impl FnOnce(&A::Device)) {
        self.release_with(what, f);
        self.live_allocations.fetch_sub(1, Ordering::Relaxed);
    }

    /// 释放子资源的原生句柄；设备已经销毁时句柄已随之失效，只记录一条日志
    pub(crate) fn release_with(&self, what: &str, f: impl FnOnce(&A::Device)) {
        match self.raw.read().as_ref() {
            Some(raw) => f(raw),
            None => log::warn!("{} outlived its device, native handle is dropped with the device", what),
        }
    }

    fn handle_native_error(&self, error: vk::Result) {
        let message = format!("vulkan error: {}", error);
        match error {
            vk::Result::ERROR_DEVICE_LOST => self.notify_lost(DeviceLostReason::Unknown, &message),
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                self.report_error(ErrorType::OutOfMemory, &message)
            }
            _ => self.report_error(ErrorType::Internal, &message),
        }
    }

    fn notify_lost(&self, reason: DeviceLostReason, message: &str) {
        let callback = self.lost_callback.lock().take();
        match callback {
            Some(callback) => callback(self, reason, message),
            None => log::warn!("device lost ({:?}): {}", reason, message),
        }
    }

    /// 没有注册回调时只写日志
    pub fn report_error(&self, ty: ErrorType, message: &str) {
        match &self.error_callback {
            Some(callback) => callback(self, ty, message),
            None => log::error!("uncaptured {:?} error: {}", ty, message),
        }
    }
}

/// getter
impl<A: Api> Device<A> {
    pub fn label(&self) -> String {
        self.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.label.lock() = label.to_string();
    }

    /// `destroy` 之后返回 `None`
    pub fn adapter(&self) -> Option<RefPtr<Adapter<A>>> {
        self.adapter.lock().clone()
    }

    pub fn adapter_info(&self) -> GfxResult<AdapterInfo> {
        self.adapter().map(|adapter| adapter.info()).ok_or(GfxError::DeviceDestroyed)
    }

    pub fn features(&self) -> Vec<FeatureName> {
        self.adapter().map(|adapter| adapter.features()).unwrap_or_default()
    }

    pub fn limits(&self) -> GfxResult<Limits> {
        self.adapter().map(|adapter| adapter.limits()).ok_or(GfxError::DeviceDestroyed)
    }

    pub fn has_feature(&self, name: FeatureName) -> bool {
        self.adapter().is_some_and(|adapter| adapter.has_feature(name))
    }

    /// 没有任何挂起的工作
    pub fn lost_future(&self) -> Future {
        Future::INVALID
    }

    #[inline]
    pub fn anisotropy_enabled(&self) -> bool {
        self.anisotropy_enabled
    }

    #[inline]
    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.max_sampler_anisotropy
    }

    /// 还没有释放内存的 buffer 与 texture 数量
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Relaxed)
    }

    /// 在 `destroy` 之后失效
    pub fn weak_ptr(&self) -> WeakPtr<Self> {
        self.weak_factory.get_weak_ptr(self)
    }
}

// 资源创建，每次都把唯一一份引用交给调用方
impl<A: Api> Device<A> {
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> GfxResult<RefPtr<Buffer<A>>> {
        Buffer::new(self.this(), descriptor)
    }

    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> GfxResult<RefPtr<Texture<A>>> {
        Texture::new(self.this(), descriptor)
    }

    /// 描述为空时使用默认参数
    pub fn create_sampler(&self, descriptor: Option<&SamplerDescriptor>) -> GfxResult<RefPtr<Sampler<A>>> {
        let default = SamplerDescriptor::default();
        Sampler::new(self.this(), descriptor.unwrap_or(&default))
    }

    pub fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> GfxResult<RefPtr<BindGroupLayout<A>>> {
        BindGroupLayout::new(self.this(), descriptor)
    }

    pub fn create_bind_group(&self, descriptor: &BindGroupDescriptor<A>) -> GfxResult<RefPtr<BindGroup<A>>> {
        BindGroup::new(self.this(), descriptor)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hal::mock::{self, Fixture, MockEvent};
    use crate::instance::Instance;
    use crate::types::BufferUsages;

    type Events<T> = Arc<Mutex<Vec<T>>>;

    fn buffer_descriptor() -> BufferDescriptor {
        BufferDescriptor {
            label: "vertices".to_string(),
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            size: 256,
            mapped_at_creation: false,
        }
    }

    fn with_callbacks() -> (DeviceDescriptor<mock::Mock>, Events<DeviceLostReason>, Events<ErrorType>) {
        let lost = Events::default();
        let errors = Events::default();
        let lost_sink = lost.clone();
        let error_sink = errors.clone();
        let descriptor = DeviceDescriptor {
            label: "main".to_string(),
            device_lost_callback: Some(Box::new(move |_: &Device<mock::Mock>, reason, _: &str| {
                lost_sink.lock().push(reason)
            })),
            uncaptured_error_callback: Some(Box::new(move |_: &Device<mock::Mock>, ty, _: &str| {
                error_sink.lock().push(ty)
            })),
            ..Default::default()
        };
        (descriptor, lost, errors)
    }

    #[test]
    fn resources_keep_the_whole_chain_alive() {
        let (raw, state) = mock::MockInstance::new(vec![Fixture::discrete("gpu")]);
        let instance = Instance::<mock::Mock>::from_raw(raw);
        let adapter = instance.select_adapter(&Default::default()).unwrap();
        let device = adapter.create_device(Default::default()).unwrap();
        let buffer = device.create_buffer(&buffer_descriptor()).unwrap();

        drop(instance);
        drop(adapter);
        drop(device);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyDevice | MockEvent::DestroyInstance)), 0);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyBuffer(_))), 0);

        drop(buffer);
        let buffer_at = state.position(|e| matches!(e, MockEvent::DestroyBuffer(_))).unwrap();
        let allocator_at = state.position(|e| matches!(e, MockEvent::DestroyAllocator)).unwrap();
        let device_at = state.position(|e| matches!(e, MockEvent::DestroyDevice)).unwrap();
        let instance_at = state.position(|e| matches!(e, MockEvent::DestroyInstance)).unwrap();
        assert!(buffer_at < allocator_at);
        assert!(allocator_at < device_at);
        assert!(device_at < instance_at);
    }

    #[test]
    fn destroy_is_idempotent() {
        let (descriptor, lost, _) = with_callbacks();
        let (device, state) = mock::device(Fixture::discrete("gpu"), descriptor);

        device.destroy();
        device.destroy();
        assert!(device.is_destroyed());
        assert!(device.adapter().is_none());
        drop(device);

        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyAllocator)), 1);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyDevice)), 1);
        assert_eq!(*lost.lock(), vec![DeviceLostReason::Destroyed]);
    }

    #[test]
    fn destroyed_device_refuses_work() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let weak = device.weak_ptr();
        device.destroy();

        assert!(!weak.is_valid());
        assert!(matches!(device.create_buffer(&buffer_descriptor()), Err(GfxError::DeviceDestroyed)));
        assert!(device.features().is_empty());
        assert!(!device.has_feature(FeatureName::CoreFeaturesAndLimits));
        assert!(device.limits().is_err());
        assert!(device.adapter_info().is_err());
        assert_eq!(state.count(|e| matches!(e, MockEvent::CreateBuffer { .. })), 0);
    }

    #[test]
    fn native_faults_reach_the_callbacks() {
        let (descriptor, lost, errors) = with_callbacks();
        let (device, state) = mock::device(Fixture::discrete("gpu"), descriptor);

        state.fail_next_create(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(device.create_buffer(&buffer_descriptor()).is_err());
        state.fail_next_create(vk::Result::ERROR_FORMAT_NOT_SUPPORTED);
        assert!(device.create_buffer(&buffer_descriptor()).is_err());
        assert_eq!(*errors.lock(), vec![ErrorType::OutOfMemory, ErrorType::Internal]);

        state.fail_next_create(vk::Result::ERROR_DEVICE_LOST);
        assert!(device.create_buffer(&buffer_descriptor()).is_err());
        device.destroy();
        // lost 回调只触发一次
        assert_eq!(*lost.lock(), vec![DeviceLostReason::Unknown]);
    }

    #[test]
    fn live_allocations_are_counted_through_destroy() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let freed = device.create_buffer(&buffer_descriptor()).unwrap();
        let kept = device.create_buffer(&buffer_descriptor()).unwrap();
        assert_eq!(device.live_allocations(), 2);

        freed.destroy();
        freed.destroy();
        assert_eq!(device.live_allocations(), 1);

        // 剩下的一块内存在分配器销毁时仍然存活，只能记录日志
        device.destroy();
        assert_eq!(device.live_allocations(), 1);
        drop(kept);
        assert_eq!(device.live_allocations(), 0);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyBuffer(_))), 1);
    }

    #[test]
    fn forwards_to_adapter_while_alive() {
        let (device, _state) = mock::device(Fixture::discrete("gpu"), Default::default());
        device.set_label("renamed");
        assert_eq!(device.label(), "renamed");
        assert_eq!(device.adapter_info().unwrap().vendor, "NVIDIA");
        assert_eq!(device.limits().unwrap().max_bind_groups, 8);
        assert!(device.has_feature(FeatureName::CoreFeaturesAndLimits));
        assert_eq!(device.lost_future(), Future::INVALID);
    }
}

use ash::vk;
use parking_lot::Mutex;

use crate::common::ref_counted::RefPtr;
use crate::conv;
use crate::device::Device;
use crate::error::{GfxError, GfxResult};
use crate::hal::{Api, DeviceApi};
use crate::limits::ASSUMED_MAX_BUFFER_SIZE;
use crate::types::BufferUsages;

/// Vulkan 不允许大小为 0 的 buffer，空 buffer 在原生层面按这个大小创建
const MIN_NATIVE_BUFFER_SIZE: u64 = 4;

#[derive(Debug, Clone, Default)]
pub struct BufferDescriptor {
    pub label: String,
    pub usage: BufferUsages,
    pub size: u64,
    /// 需要 host 可访问的内存
    pub mapped_at_creation: bool,
}

pub struct Buffer<A: Api> {
    /// 句柄与分配总是一起释放
    raw: Mutex<Option<(vk::Buffer, A::Allocation)>>,
    size: u64,
    usage: BufferUsages,
    label: Mutex<String>,

    device: RefPtr<Device<A>>,
}

// new & init
impl<A: Api> Buffer<A> {
    pub(crate) fn new(device: RefPtr<Device<A>>, descriptor: &BufferDescriptor) -> GfxResult<RefPtr<Self>> {
        if descriptor.usage.is_empty() {
            return Err(GfxError::Validation(format!("buffer {:?}: usage is empty", descriptor.label)));
        }
        if descriptor.size > ASSUMED_MAX_BUFFER_SIZE {
            return Err(GfxError::Validation(format!(
                "buffer {:?}: size {} exceeds {}",
                descriptor.label, descriptor.size, ASSUMED_MAX_BUFFER_SIZE
            )));
        }

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(descriptor.size.max(MIN_NATIVE_BUFFER_SIZE))
            .usage(conv::map_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let raw = device.with_raw(|raw| unsafe { raw.create_buffer(&buffer_ci, descriptor.mapped_at_creation) })?;
        device.track_allocation();

        Ok(RefPtr::new(Self {
            raw: Mutex::new(Some(raw)),
            size: descriptor.size,
            usage: descriptor.usage,
            label: Mutex::new(descriptor.label.clone()),
            device,
        }))
    }
}

// destroy
impl<A: Api> Buffer<A> {
    /// 同时释放句柄与内存，可以重复调用
    pub fn destroy(&self) {
        let Some((buffer, allocation)) = self.raw.lock().take() else {
            return;
        };
        self.device.release_allocation("buffer", |raw| unsafe { raw.destroy_buffer(buffer, allocation) });
    }
}

impl<A: Api> Drop for Buffer<A> {
    fn drop(&mut self) {
        self.destroy();
    }
}

// getters
impl<A: Api> Buffer<A> {
    /// `destroy` 之后返回 `None`
    #[inline]
    pub fn raw(&self) -> Option<vk::Buffer> {
        self.raw.lock().as_ref().map(|(buffer, _)| *buffer)
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsages {
        self.usage
    }

    #[inline]
    pub fn device(&self) -> &RefPtr<Device<A>> {
        &self.device
    }

    pub fn label(&self) -> String {
        self.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.label.lock() = label.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{self, Fixture, MockEvent};

    fn uniform(size: u64, mapped: bool) -> BufferDescriptor {
        BufferDescriptor {
            label: "uniforms".to_string(),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            size,
            mapped_at_creation: mapped,
        }
    }

    #[test]
    fn creation_translates_usage() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let buffer = device.create_buffer(&uniform(64, true)).unwrap();
        assert_eq!(RefPtr::ref_count(&buffer), 1);
        assert_eq!(buffer.size(), 64);
        assert_eq!(buffer.usage(), BufferUsages::UNIFORM | BufferUsages::COPY_DST);

        let created = state
            .events()
            .into_iter()
            .find_map(|e| match e {
                MockEvent::CreateBuffer { size, usage, mapped, .. } => Some((size, usage, mapped)),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            created,
            (64, vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST, true)
        );
    }

    #[test]
    fn destroy_releases_once() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let buffer = device.create_buffer(&uniform(64, false)).unwrap();
        buffer.destroy();
        buffer.destroy();
        assert!(buffer.raw().is_none());
        drop(buffer);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyBuffer(_))), 1);
    }

    #[test]
    fn invalid_descriptors_never_reach_the_driver() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let empty_usage = BufferDescriptor {
            size: 16,
            ..Default::default()
        };
        assert!(matches!(device.create_buffer(&empty_usage), Err(GfxError::Validation(_))));
        assert!(matches!(
            device.create_buffer(&uniform(ASSUMED_MAX_BUFFER_SIZE + 1, false)),
            Err(GfxError::Validation(_))
        ));
        assert_eq!(state.count(|e| matches!(e, MockEvent::CreateBuffer { .. })), 0);
    }

    #[test]
    fn zero_sized_buffer_gets_a_native_minimum() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let buffer = device.create_buffer(&uniform(0, false)).unwrap();
        assert_eq!(buffer.size(), 0);
        assert_eq!(
            state.count(|e| matches!(e, MockEvent::CreateBuffer { size, .. } if *size == MIN_NATIVE_BUFFER_SIZE)),
            1
        );
    }

    #[test]
    fn outliving_the_destroyed_device_is_harmless() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let buffer = device.create_buffer(&uniform(64, false)).unwrap();
        device.destroy();
        drop(buffer);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyBuffer(_))), 0);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyDevice)), 1);
    }
}

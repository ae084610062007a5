//! 绑定好的资源集合
//!
//! 每个 bind group 独占一个只容纳一个 set 的 descriptor pool，销毁 pool 即释放 set。

use std::collections::HashMap;

use ash::vk;
use itertools::Itertools;
use parking_lot::Mutex;

use crate::common::ref_counted::RefPtr;
use crate::descriptors::bind_group_layout::{BindGroupLayout, BindingKind, LayoutEntry};
use crate::device::Device;
use crate::error::{GfxError, GfxResult};
use crate::hal::{Api, DeviceApi};
use crate::resources::buffer::Buffer;
use crate::resources::sampler::Sampler;
use crate::resources::texture_view::TextureView;

/// buffer 绑定大小的哨兵值：一直延伸到 buffer 末尾
pub const WHOLE_SIZE: u64 = u64::MAX;

pub enum BindingResource<A: Api> {
    Buffer {
        buffer: RefPtr<Buffer<A>>,
        offset: u64,
        size: u64,
    },
    Sampler(RefPtr<Sampler<A>>),
    TextureView(RefPtr<TextureView<A>>),
}

impl<A: Api> Clone for BindingResource<A> {
    fn clone(&self) -> Self {
        match self {
            Self::Buffer { buffer, offset, size } => Self::Buffer {
                buffer: buffer.clone(),
                offset: *offset,
                size: *size,
            },
            Self::Sampler(sampler) => Self::Sampler(sampler.clone()),
            Self::TextureView(view) => Self::TextureView(view.clone()),
        }
    }
}

pub struct BindGroupEntry<A: Api> {
    pub binding: u32,
    pub resource: BindingResource<A>,
}

pub struct BindGroupDescriptor<A: Api> {
    pub label: String,
    pub layout: RefPtr<BindGroupLayout<A>>,
    pub entries: Vec<BindGroupEntry<A>>,
}

/// 一条待提交的 descriptor 写入，覆盖一个 layout entry 的全部数组元素
///
/// 使用 buffer 还是 image 由 descriptor type 决定。
struct PendingWrite {
    dst_binding: u32,
    descriptor_type: vk::DescriptorType,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    image_infos: Vec<vk::DescriptorImageInfo>,
}

impl PendingWrite {
    fn new(layout_entry: &LayoutEntry) -> Self {
        Self {
            dst_binding: layout_entry.entry.binding,
            descriptor_type: layout_entry.descriptor_type,
            buffer_infos: Vec::new(),
            image_infos: Vec::new(),
        }
    }

    /// 追加下一个数组元素；`binding` 是该元素在 bind group 中的 binding 号
    fn push<A: Api>(&mut self, kind: BindingKind, binding: u32, resource: &BindingResource<A>) -> GfxResult<()> {
        match (kind, resource) {
            (BindingKind::Buffer(_), BindingResource::Buffer { buffer, offset, size }) => {
                let raw = buffer.raw().ok_or(GfxError::ObjectDestroyed)?;
                let range = if *size == WHOLE_SIZE {
                    if *offset > buffer.size() {
                        return Err(GfxError::Validation(format!(
                            "binding {}: offset {} is past the end of the buffer",
                            binding, offset
                        )));
                    }
                    vk::WHOLE_SIZE
                } else {
                    if offset.checked_add(*size).is_none_or(|end| end > buffer.size()) {
                        return Err(GfxError::Validation(format!(
                            "binding {}: range {}+{} exceeds buffer size {}",
                            binding,
                            offset,
                            size,
                            buffer.size()
                        )));
                    }
                    *size
                };
                self.buffer_infos.push(vk::DescriptorBufferInfo {
                    buffer: raw,
                    offset: *offset,
                    range,
                });
            }
            (BindingKind::Sampler(_), BindingResource::Sampler(sampler)) => {
                self.image_infos.push(vk::DescriptorImageInfo {
                    sampler: sampler.raw(),
                    ..Default::default()
                });
            }
            (BindingKind::Texture(_), BindingResource::TextureView(view)) => {
                self.image_infos.push(vk::DescriptorImageInfo {
                    image_view: view.raw(),
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    ..Default::default()
                });
            }
            (BindingKind::StorageTexture(_), BindingResource::TextureView(view)) => {
                self.image_infos.push(vk::DescriptorImageInfo {
                    image_view: view.raw(),
                    image_layout: vk::ImageLayout::GENERAL,
                    ..Default::default()
                });
            }
            (kind, _) => {
                return Err(GfxError::Validation(format!(
                    "binding {}: resource does not match the {:?} layout",
                    binding, kind
                )));
            }
        }
        Ok(())
    }

    fn to_vk_type(&self, dst_set: vk::DescriptorSet) -> vk::WriteDescriptorSet<'_> {
        let write = vk::WriteDescriptorSet::default()
            .dst_set(dst_set)
            .dst_binding(self.dst_binding)
            .dst_array_element(0)
            .descriptor_type(self.descriptor_type);
        if self.buffer_infos.is_empty() {
            write.image_info(&self.image_infos)
        } else {
            write.buffer_info(&self.buffer_infos)
        }
    }
}

pub struct BindGroup<A: Api> {
    pool: vk::DescriptorPool,
    /// 随 pool 一起释放
    set: vk::DescriptorSet,
    label: Mutex<String>,

    layout: RefPtr<BindGroupLayout<A>>,
    resources: Vec<BindingResource<A>>,
    device: RefPtr<Device<A>>,
}

// new & init
impl<A: Api> BindGroup<A> {
    pub(crate) fn new(device: RefPtr<Device<A>>, descriptor: &BindGroupDescriptor<A>) -> GfxResult<RefPtr<Self>> {
        let layout = &descriptor.layout;
        let invalid = |what: String| GfxError::Validation(format!("bind group {:?}: {}", descriptor.label, what));

        if !RefPtr::ptr_eq(layout.device(), &device) {
            return Err(invalid("layout belongs to another device".to_string()));
        }
        if let Some(binding) = descriptor.entries.iter().map(|entry| entry.binding).duplicates().next() {
            return Err(invalid(format!("binding {} is bound twice", binding)));
        }
        if let Some(entry) = descriptor.entries.iter().find(|entry| layout.slot(entry.binding).is_none()) {
            return Err(invalid(format!("binding {} is not in the layout", entry.binding)));
        }
        if descriptor.entries.len() != layout.descriptor_total() {
            return Err(invalid(format!(
                "layout expects {} entries, got {}",
                layout.descriptor_total(),
                descriptor.entries.len()
            )));
        }

        // 先完成所有校验与转换，再触碰原生对象
        let by_binding: HashMap<u32, &BindingResource<A>> =
            descriptor.entries.iter().map(|entry| (entry.binding, &entry.resource)).collect();
        let writes = layout
            .entries()
            .iter()
            .map(|layout_entry| {
                let mut write = PendingWrite::new(layout_entry);
                for index in 0..layout_entry.entry.descriptor_count() {
                    let binding = layout_entry.entry.binding + index;
                    let resource = by_binding
                        .get(&binding)
                        .ok_or_else(|| invalid(format!("binding {} is missing", binding)))?;
                    write.push(layout_entry.kind, binding, resource)?;
                }
                Ok(write)
            })
            .collect::<GfxResult<Vec<_>>>()?;

        let mut pool_sizes = layout.pool_sizes();
        if pool_sizes.is_empty() {
            // 空布局仍然需要一个合法的 pool
            pool_sizes.push(vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            });
        }
        let pool_ci = vk::DescriptorPoolCreateInfo::default().max_sets(1).pool_sizes(&pool_sizes);
        let pool = device.with_raw(|raw| unsafe { raw.create_descriptor_pool(&pool_ci) })?;

        let set_layouts = [layout.raw()];
        let allocate_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(pool).set_layouts(&set_layouts);
        let set = device
            .with_raw(|raw| unsafe { raw.allocate_descriptor_sets(&allocate_info) })
            .and_then(|sets| sets.into_iter().next().ok_or(GfxError::Native(vk::Result::ERROR_UNKNOWN)));
        let set = match set {
            Ok(set) => set,
            Err(e) => {
                device.release_with("descriptor pool", |raw| unsafe { raw.destroy_descriptor_pool(pool) });
                return Err(e);
            }
        };

        let vk_writes = writes.iter().map(|write| write.to_vk_type(set)).collect_vec();
        device.with_raw(|raw| {
            unsafe { raw.update_descriptor_sets(&vk_writes) };
            Ok(())
        })?;

        Ok(RefPtr::new(Self {
            pool,
            set,
            label: Mutex::new(descriptor.label.clone()),
            layout: layout.clone(),
            resources: descriptor.entries.iter().map(|entry| entry.resource.clone()).collect(),
            device,
        }))
    }
}

impl<A: Api> Drop for BindGroup<A> {
    fn drop(&mut self) {
        let pool = self.pool;
        self.device.release_with("bind group", |raw| unsafe { raw.destroy_descriptor_pool(pool) });
    }
}

// getters
impl<A: Api> BindGroup<A> {
    #[inline]
    pub fn raw(&self) -> vk::DescriptorSet {
        self.set
    }

    #[inline]
    pub fn layout(&self) -> &RefPtr<BindGroupLayout<A>> {
        &self.layout
    }

    #[inline]
    pub fn resources(&self) -> &[BindingResource<A>] {
        &self.resources
    }

    pub fn label(&self) -> String {
        self.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.label.lock() = label.to_string();
    }
}

//! 资源绑定布局
//!
//! 每个 entry 恰好属于四种绑定类别之一（buffer / sampler / texture / storage texture），
//! 解析后的 entry 列表保留下来，用于创建 bind group 时计算 pool 大小与校验资源。
//!
//! binding 为 `b`、大小为 `N` 的 binding array 占用 `b..b + N` 这段 binding 号，
//! bind group 中 binding 为 `b + i` 的 entry 写入数组的第 `i` 个元素。

use ash::vk;
use itertools::Itertools;
use parking_lot::Mutex;

use crate::common::ref_counted::RefPtr;
use crate::conv;
use crate::device::Device;
use crate::error::{GfxError, GfxResult};
use crate::hal::{Api, DeviceApi};
use crate::types::{
    BufferBindingType, SamplerBindingType, ShaderStages, StorageTextureAccess, TextureFormat, TextureSampleType,
    TextureViewDimension,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBindingLayout {
    pub ty: BufferBindingType,
    pub has_dynamic_offset: bool,
    pub min_binding_size: u64,
}

impl Default for BufferBindingLayout {
    fn default() -> Self {
        Self {
            ty: BufferBindingType::BindingNotUsed,
            has_dynamic_offset: false,
            min_binding_size: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBindingLayout {
    pub ty: SamplerBindingType,
}

impl Default for SamplerBindingLayout {
    fn default() -> Self {
        Self {
            ty: SamplerBindingType::BindingNotUsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBindingLayout {
    pub sample_type: TextureSampleType,
    pub view_dimension: TextureViewDimension,
    pub multisampled: bool,
}

impl Default for TextureBindingLayout {
    fn default() -> Self {
        Self {
            sample_type: TextureSampleType::BindingNotUsed,
            view_dimension: TextureViewDimension::Undefined,
            multisampled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageTextureBindingLayout {
    pub access: StorageTextureAccess,
    pub format: TextureFormat,
    pub view_dimension: TextureViewDimension,
}

impl Default for StorageTextureBindingLayout {
    fn default() -> Self {
        Self {
            access: StorageTextureAccess::BindingNotUsed,
            format: TextureFormat::Undefined,
            view_dimension: TextureViewDimension::Undefined,
        }
    }
}

/// 四个子布局中只能有一个处于使用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStages,
    /// 0 与 1 都表示不是数组；大于 1 时占用后续的 binding 号
    pub binding_array_size: u32,
    pub buffer: BufferBindingLayout,
    pub sampler: SamplerBindingLayout,
    pub texture: TextureBindingLayout,
    pub storage_texture: StorageTextureBindingLayout,
}

/// entry 的绑定类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Buffer(BufferBindingLayout),
    Sampler(SamplerBindingLayout),
    Texture(TextureBindingLayout),
    StorageTexture(StorageTextureBindingLayout),
}

impl BindingKind {
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::Buffer(buffer) => match (buffer.ty, buffer.has_dynamic_offset) {
                (BufferBindingType::Storage | BufferBindingType::ReadOnlyStorage, false) => {
                    vk::DescriptorType::STORAGE_BUFFER
                }
                (BufferBindingType::Storage | BufferBindingType::ReadOnlyStorage, true) => {
                    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
                }
                (_, false) => vk::DescriptorType::UNIFORM_BUFFER,
                (_, true) => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            },
            Self::Sampler(_) => vk::DescriptorType::SAMPLER,
            Self::Texture(_) => vk::DescriptorType::SAMPLED_IMAGE,
            Self::StorageTexture(_) => vk::DescriptorType::STORAGE_IMAGE,
        }
    }
}

impl BindGroupLayoutEntry {
    /// 按 buffer > sampler > texture > storage texture 的优先级分类
    ///
    /// 同时使用多个类别属于调用方的错误，只在 debug 构建中断言。
    pub fn classify(&self) -> GfxResult<BindingKind> {
        let buffer = self.buffer.ty != BufferBindingType::BindingNotUsed;
        let sampler = self.sampler.ty != SamplerBindingType::BindingNotUsed;
        let texture = self.texture.sample_type != TextureSampleType::BindingNotUsed;
        let storage_texture = self.storage_texture.access != StorageTextureAccess::BindingNotUsed;
        debug_assert!(
            [buffer, sampler, texture, storage_texture].iter().filter(|used| **used).count() <= 1,
            "binding {} uses more than one binding category",
            self.binding
        );

        if buffer {
            Ok(BindingKind::Buffer(self.buffer))
        } else if sampler {
            Ok(BindingKind::Sampler(self.sampler))
        } else if texture {
            Ok(BindingKind::Texture(self.texture))
        } else if storage_texture {
            Ok(BindingKind::StorageTexture(self.storage_texture))
        } else {
            Err(GfxError::Validation(format!("binding {} has no binding layout", self.binding)))
        }
    }

    #[inline]
    pub fn descriptor_count(&self) -> u32 {
        self.binding_array_size.max(1)
    }

    /// 占用的最后一个 binding 号之后的位置，用 u64 避免溢出
    #[inline]
    fn binding_end(&self) -> u64 {
        u64::from(self.binding) + u64::from(self.descriptor_count())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindGroupLayoutDescriptor {
    pub label: String,
    pub entries: Vec<BindGroupLayoutEntry>,
}

/// 解析后的 entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub entry: BindGroupLayoutEntry,
    pub kind: BindingKind,
    pub descriptor_type: vk::DescriptorType,
}

pub struct BindGroupLayout<A: Api> {
    raw: vk::DescriptorSetLayout,
    entries: Vec<LayoutEntry>,
    label: Mutex<String>,

    device: RefPtr<Device<A>>,
}

// new & init
impl<A: Api> BindGroupLayout<A> {
    pub(crate) fn new(device: RefPtr<Device<A>>, descriptor: &BindGroupLayoutDescriptor) -> GfxResult<RefPtr<Self>> {
        let invalid = |what: String| GfxError::Validation(format!("bind group layout {:?}: {}", descriptor.label, what));

        if let Some(entry) = descriptor.entries.iter().find(|entry| entry.binding_end() > u64::from(u32::MAX) + 1) {
            return Err(invalid(format!(
                "binding array at {} with {} elements runs past the last binding number",
                entry.binding,
                entry.descriptor_count()
            )));
        }
        // 单个 binding 等价于大小为 1 的数组，重复声明也在这里报告
        if let Some((prev, next)) = descriptor
            .entries
            .iter()
            .sorted_by_key(|entry| entry.binding)
            .tuple_windows()
            .find(|(prev, next)| prev.binding_end() > u64::from(next.binding))
        {
            return Err(invalid(format!("binding {} overlaps the binding at {}", next.binding, prev.binding)));
        }

        let entries = descriptor
            .entries
            .iter()
            .map(|entry| {
                let kind = entry.classify()?;
                Ok(LayoutEntry {
                    entry: *entry,
                    kind,
                    descriptor_type: kind.descriptor_type(),
                })
            })
            .collect::<GfxResult<Vec<_>>>()?;

        let bindings = entries
            .iter()
            .map(|layout_entry| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(layout_entry.entry.binding)
                    .descriptor_type(layout_entry.descriptor_type)
                    .descriptor_count(layout_entry.entry.descriptor_count())
                    .stage_flags(conv::map_shader_stages(layout_entry.entry.visibility))
            })
            .collect_vec();
        let layout_ci = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let raw = device.with_raw(|raw| unsafe { raw.create_descriptor_set_layout(&layout_ci) })?;

        Ok(RefPtr::new(Self {
            raw,
            entries,
            label: Mutex::new(descriptor.label.clone()),
            device,
        }))
    }
}

impl<A: Api> Drop for BindGroupLayout<A> {
    fn drop(&mut self) {
        let layout = self.raw;
        self.device.release_with("bind group layout", |raw| unsafe { raw.destroy_descriptor_set_layout(layout) });
    }
}

// getters
impl<A: Api> BindGroupLayout<A> {
    #[inline]
    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.raw
    }

    #[inline]
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// 找到覆盖该 binding 号的 entry，以及它在数组中的下标
    pub fn slot(&self, binding: u32) -> Option<(&LayoutEntry, u32)> {
        self.entries.iter().find_map(|layout_entry| {
            let index = binding.checked_sub(layout_entry.entry.binding)?;
            (index < layout_entry.entry.descriptor_count()).then_some((layout_entry, index))
        })
    }

    /// 一个 bind group 需要提供的 entry 数量
    pub fn descriptor_total(&self) -> usize {
        self.entries.iter().map(|layout_entry| layout_entry.entry.descriptor_count() as usize).sum()
    }

    #[inline]
    pub fn device(&self) -> &RefPtr<Device<A>> {
        &self.device
    }

    /// 按描述符类型合并数量，顺序与类型首次出现的顺序一致
    pub fn pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for layout_entry in &self.entries {
            let count = layout_entry.entry.descriptor_count();
            match sizes.iter_mut().find(|size| size.ty == layout_entry.descriptor_type) {
                Some(size) => size.descriptor_count += count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: layout_entry.descriptor_type,
                    descriptor_count: count,
                }),
            }
        }
        sizes
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

    fn uniform(binding: u32) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            buffer: BufferBindingLayout {
                ty: BufferBindingType::Uniform,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn sampler(binding: u32) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::FRAGMENT,
            sampler: SamplerBindingLayout {
                ty: SamplerBindingType::Filtering,
            },
            ..Default::default()
        }
    }

    #[test]
    fn classification_picks_the_used_category() {
        assert!(matches!(uniform(0).classify(), Ok(BindingKind::Buffer(_))));
        assert!(matches!(sampler(0).classify(), Ok(BindingKind::Sampler(_))));

        let storage = BindGroupLayoutEntry {
            storage_texture: StorageTextureBindingLayout {
                access: StorageTextureAccess::WriteOnly,
                format: TextureFormat::RGBA8Unorm,
                view_dimension: TextureViewDimension::D2,
            },
            ..Default::default()
        };
        let kind = storage.classify().unwrap();
        assert_eq!(kind.descriptor_type(), vk::DescriptorType::STORAGE_IMAGE);

        assert!(BindGroupLayoutEntry::default().classify().is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "more than one binding category")]
    fn mixed_categories_are_asserted() {
        let mixed = BindGroupLayoutEntry {
            sampler: SamplerBindingLayout {
                ty: SamplerBindingType::Filtering,
            },
            ..uniform(0)
        };
        let _ = mixed.classify();
    }

    #[test]
    fn buffer_descriptor_types() {
        let dynamic_storage = BindingKind::Buffer(BufferBindingLayout {
            ty: BufferBindingType::ReadOnlyStorage,
            has_dynamic_offset: true,
            min_binding_size: 0,
        });
        assert_eq!(dynamic_storage.descriptor_type(), vk::DescriptorType::STORAGE_BUFFER_DYNAMIC);
        let undefined = BindingKind::Buffer(BufferBindingLayout {
            ty: BufferBindingType::Undefined,
            ..Default::default()
        });
        assert_eq!(undefined.descriptor_type(), vk::DescriptorType::UNIFORM_BUFFER);
    }

    #[test]
    fn pool_sizes_are_coalesced_by_type() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: "material".to_string(),
                entries: vec![uniform(0), sampler(1), uniform(2), sampler(3), uniform(4)],
            })
            .unwrap();

        let sizes = layout.pool_sizes().iter().map(|size| (size.ty, size.descriptor_count)).collect_vec();
        assert_eq!(sizes, vec![(vk::DescriptorType::UNIFORM_BUFFER, 3), (vk::DescriptorType::SAMPLER, 2)]);

        let bindings = state
            .events()
            .into_iter()
            .find_map(|e| match e {
                MockEvent::CreateDescriptorSetLayout { bindings, .. } => Some(bindings),
                _ => None,
            })
            .unwrap();
        assert_eq!(bindings.len(), 5);
        assert_eq!(bindings[1], (1, vk::DescriptorType::SAMPLER, 1));
    }

    #[test]
    fn binding_arrays_count_every_element() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                entries: vec![
                    BindGroupLayoutEntry {
                        binding_array_size: 4,
                        ..sampler(0)
                    },
                    uniform(4),
                ],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(layout.pool_sizes()[0].descriptor_count, 4);
        assert_eq!(layout.descriptor_total(), 5);

        let bindings = state
            .events()
            .into_iter()
            .find_map(|e| match e {
                MockEvent::CreateDescriptorSetLayout { bindings, .. } => Some(bindings),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            bindings,
            vec![(0, vk::DescriptorType::SAMPLER, 4), (4, vk::DescriptorType::UNIFORM_BUFFER, 1)]
        );

        // 数组元素按 binding 号寻址
        assert_eq!(layout.slot(3).map(|(entry, index)| (entry.entry.binding, index)), Some((0, 3)));
        assert_eq!(layout.slot(4).map(|(entry, index)| (entry.entry.binding, index)), Some((4, 0)));
        assert!(layout.slot(5).is_none());
    }

    #[test]
    fn overlapping_binding_arrays_are_rejected() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let result = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: vec![
                uniform(2),
                BindGroupLayoutEntry {
                    binding_array_size: 3,
                    ..sampler(0)
                },
            ],
            ..Default::default()
        });
        assert!(matches!(result, Err(GfxError::Validation(_))));

        let result = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: vec![BindGroupLayoutEntry {
                binding_array_size: 2,
                ..sampler(u32::MAX)
            }],
            ..Default::default()
        });
        assert!(matches!(result, Err(GfxError::Validation(_))));
        assert_eq!(state.count(|e| matches!(e, MockEvent::CreateDescriptorSetLayout { .. })), 0);
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let result = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            entries: vec![uniform(0), sampler(0)],
            ..Default::default()
        });
        assert!(matches!(result, Err(GfxError::Validation(_))));
        assert_eq!(state.count(|e| matches!(e, MockEvent::CreateDescriptorSetLayout { .. })), 0);
    }
}

//! 进程内的测试后端
//!
//! 能力查询由 [`Fixture`] 回答，所有原生对象的创建与销毁都记录为 [`MockEvent`]。

use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::foundation::chain::{chain_iter_mut, find_in_chain};
use crate::hal::{Api, DeviceApi, InstanceApi};

pub struct Mock;

impl Api for Mock {
    type Instance = MockInstance;
    type Device = MockDevice;
    type Allocation = MockAllocation;
}

#[derive(Debug)]
pub struct MockAllocation(pub u64);

/// device 创建时收到的参数
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub features: vk::PhysicalDeviceFeatures,
    /// 链上有该节点时为 Some，值为节点中对应的开关
    pub storage_buffer16: Option<bool>,
    pub shader_float16: Option<bool>,
    pub subgroup_size_control: Option<bool>,
    pub extensions: Vec<String>,
    pub queue_family_index: u32,
    pub queue_priorities: Vec<f32>,
}

#[derive(Debug, Clone)]
pub enum MockEvent {
    CreateDevice(Box<DeviceRequest>),
    CreateBuffer {
        handle: u64,
        size: u64,
        usage: vk::BufferUsageFlags,
        mapped: bool,
    },
    DestroyBuffer(u64),
    CreateImage {
        handle: u64,
        image_type: vk::ImageType,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        flags: vk::ImageCreateFlags,
        array_layers: u32,
    },
    DestroyImage(u64),
    CreateImageView {
        handle: u64,
        view_type: vk::ImageViewType,
        aspect: vk::ImageAspectFlags,
        base_mip_level: u32,
        level_count: u32,
        base_array_layer: u32,
        layer_count: u32,
    },
    DestroyImageView(u64),
    CreateSampler {
        handle: u64,
        anisotropy_enable: bool,
        max_anisotropy: f32,
        compare_enable: bool,
        compare_op: vk::CompareOp,
    },
    DestroySampler(u64),
    CreateDescriptorSetLayout {
        handle: u64,
        bindings: Vec<(u32, vk::DescriptorType, u32)>,
    },
    DestroyDescriptorSetLayout(u64),
    CreateDescriptorPool {
        handle: u64,
        max_sets: u32,
        sizes: Vec<(vk::DescriptorType, u32)>,
    },
    DestroyDescriptorPool(u64),
    AllocateDescriptorSet(u64),
    /// 每个 write 记录为 (binding, 类型, 数量)
    UpdateDescriptorSets(Vec<(u32, vk::DescriptorType, u32)>),
    DestroyAllocator,
    DestroyDevice,
    CreateSurface(u64),
    DestroySurface(u64),
    DestroyInstance,
}

/// 后端与测试共享的记录
#[derive(Default)]
pub struct MockState {
    events: Mutex<Vec<MockEvent>>,
    next_handle: AtomicU64,
    fail_next: Mutex<Option<vk::Result>>,
}

impl MockState {
    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    /// 满足条件的第一个事件的下标
    pub fn position(&self, pred: impl Fn(&MockEvent) -> bool) -> Option<usize> {
        self.events.lock().iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&MockEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// 让下一次原生创建调用返回 `result`
    pub fn fail_next_create(&self, result: vk::Result) {
        *self.fail_next.lock() = Some(result);
    }

    fn record(&self, event: MockEvent) {
        self.events.lock().push(event);
    }

    fn next_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 0x1000
    }

    fn take_failure(&self) -> Result<(), vk::Result> {
        match self.fail_next.lock().take() {
            Some(result) => Err(result),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SurfaceFixture {
    pub usage: vk::ImageUsageFlags,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub formats: Vec<vk::Format>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// 一张虚拟的物理设备
#[derive(Debug, Clone)]
pub struct Fixture {
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub subgroup_size: u32,
    pub subgroup_stages: vk::ShaderStageFlags,
    pub subgroup_ops: vk::SubgroupFeatureFlags,
    pub min_subgroup_size: u32,
    pub max_subgroup_size: u32,
    pub subgroup_size_control: bool,
    pub shader_float16: bool,
    pub storage_buffer16: bool,
    pub extensions: Vec<&'static CStr>,
    /// optimal tiling 下的 format features，缺省为空
    pub format_features: HashMap<vk::Format, vk::FormatFeatureFlags>,
    /// image format 查询成功的 (format, image type)
    pub image_formats: HashSet<(vk::Format, vk::ImageType)>,
    pub queue_families: Vec<vk::QueueFlags>,
    pub surface: SurfaceFixture,
}

impl Fixture {
    /// 一张没有任何可选能力的独显
    pub fn discrete(name: &str) -> Self {
        let mut properties = vk::PhysicalDeviceProperties {
            api_version: vk::API_VERSION_1_3,
            driver_version: 42,
            vendor_id: 0x10de,
            device_id: 0x2204,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            ..Default::default()
        };
        for (dst, src) in properties.device_name.iter_mut().zip(name.bytes()) {
            *dst = src as std::ffi::c_char;
        }
        properties.limits.max_image_dimension1_d = 16384;
        properties.limits.max_image_dimension2_d = 16384;
        properties.limits.max_image_dimension3_d = 2048;
        properties.limits.max_image_array_layers = 2048;
        properties.limits.max_bound_descriptor_sets = 8;
        properties.limits.max_vertex_input_bindings = 32;
        properties.limits.max_color_attachments = 8;
        properties.limits.min_uniform_buffer_offset_alignment = 256;
        properties.limits.min_storage_buffer_offset_alignment = 64;
        properties.limits.max_compute_work_group_count = [65535, 65535, 65535];
        properties.limits.max_sampler_anisotropy = 16.0;

        Self {
            properties,
            features: vk::PhysicalDeviceFeatures::default(),
            subgroup_size: 32,
            subgroup_stages: vk::ShaderStageFlags::empty(),
            subgroup_ops: vk::SubgroupFeatureFlags::empty(),
            min_subgroup_size: 0,
            max_subgroup_size: 0,
            subgroup_size_control: false,
            shader_float16: false,
            storage_buffer16: false,
            extensions: Vec::new(),
            format_features: HashMap::new(),
            image_formats: HashSet::new(),
            queue_families: vec![vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE],
            surface: SurfaceFixture {
                usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
                composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                formats: vec![vk::Format::B8G8R8A8_SRGB, vk::Format::R5G6B5_UNORM_PACK16],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::SHARED_DEMAND_REFRESH],
            },
        }
    }

    pub fn with_type(mut self, device_type: vk::PhysicalDeviceType) -> Self {
        self.properties.device_type = device_type;
        self
    }

    fn has_extension(&self, name: &CStr) -> bool {
        self.extensions.contains(&name)
    }
}

fn bool32(value: bool) -> vk::Bool32 {
    if value { vk::TRUE } else { vk::FALSE }
}

pub struct MockInstance {
    fixtures: Vec<Fixture>,
    state: Arc<MockState>,
    api_version: u32,
}

impl MockInstance {
    pub fn new(fixtures: Vec<Fixture>) -> (Self, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        let instance = Self {
            fixtures,
            state: state.clone(),
            api_version: vk::API_VERSION_1_3,
        };
        (instance, state)
    }

    fn fixture(&self, pdevice: vk::PhysicalDevice) -> &Fixture {
        &self.fixtures[pdevice.as_raw() as usize - 1]
    }
}

impl InstanceApi<Mock> for MockInstance {
    fn api_version(&self) -> u32 {
        self.api_version
    }

    unsafe fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>, vk::Result> {
        Ok((1..=self.fixtures.len() as u64).map(vk::PhysicalDevice::from_raw).collect())
    }

    unsafe fn enumerate_device_extension_properties(
        &self,
        pdevice: vk::PhysicalDevice,
    ) -> Result<Vec<vk::ExtensionProperties>, vk::Result> {
        Ok(self
            .fixture(pdevice)
            .extensions
            .iter()
            .map(|name| {
                let mut props = vk::ExtensionProperties::default();
                for (dst, src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
                    *dst = *src as std::ffi::c_char;
                }
                props
            })
            .collect())
    }

    unsafe fn get_physical_device_properties2(
        &self,
        pdevice: vk::PhysicalDevice,
        props: &mut vk::PhysicalDeviceProperties2<'_>,
    ) {
        let fixture = self.fixture(pdevice);
        props.properties = fixture.properties;

        for node in unsafe { chain_iter_mut(props.p_next.cast()) } {
            match unsafe { (*node).s_type } {
                vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_PROPERTIES => {
                    let node = unsafe { &mut *node.cast::<vk::PhysicalDeviceSubgroupProperties<'static>>() };
                    node.subgroup_size = fixture.subgroup_size;
                    node.supported_stages = fixture.subgroup_stages;
                    node.supported_operations = fixture.subgroup_ops;
                }
                vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_SIZE_CONTROL_PROPERTIES => {
                    let node = unsafe { &mut *node.cast::<vk::PhysicalDeviceSubgroupSizeControlProperties<'static>>() };
                    node.min_subgroup_size = fixture.min_subgroup_size;
                    node.max_subgroup_size = fixture.max_subgroup_size;
                }
                _ => {}
            }
        }
    }

    unsafe fn get_physical_device_features2(
        &self,
        pdevice: vk::PhysicalDevice,
        features: &mut vk::PhysicalDeviceFeatures2<'_>,
    ) {
        let fixture = self.fixture(pdevice);
        features.features = fixture.features;

        for node in unsafe { chain_iter_mut(features.p_next.cast()) } {
            match unsafe { (*node).s_type } {
                vk::StructureType::PHYSICAL_DEVICE_16BIT_STORAGE_FEATURES => {
                    let node = unsafe { &mut *node.cast::<vk::PhysicalDevice16BitStorageFeatures<'static>>() };
                    node.storage_buffer16_bit_access = bool32(fixture.storage_buffer16);
                }
                vk::StructureType::PHYSICAL_DEVICE_SHADER_FLOAT16_INT8_FEATURES => {
                    let node = unsafe { &mut *node.cast::<vk::PhysicalDeviceShaderFloat16Int8Features<'static>>() };
                    node.shader_float16 = bool32(fixture.shader_float16);
                }
                vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_SIZE_CONTROL_FEATURES => {
                    let node = unsafe { &mut *node.cast::<vk::PhysicalDeviceSubgroupSizeControlFeatures<'static>>() };
                    node.subgroup_size_control = bool32(fixture.subgroup_size_control);
                }
                _ => {}
            }
        }
    }

    unsafe fn get_physical_device_format_properties(
        &self,
        pdevice: vk::PhysicalDevice,
        format: vk::Format,
    ) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: self.fixture(pdevice).format_features.get(&format).copied().unwrap_or_default(),
            ..Default::default()
        }
    }

    unsafe fn get_physical_device_image_format_properties(
        &self,
        pdevice: vk::PhysicalDevice,
        format: vk::Format,
        ty: vk::ImageType,
        _tiling: vk::ImageTiling,
        _usage: vk::ImageUsageFlags,
        _flags: vk::ImageCreateFlags,
    ) -> Result<vk::ImageFormatProperties, vk::Result> {
        if self.fixture(pdevice).image_formats.contains(&(format, ty)) {
            Ok(vk::ImageFormatProperties::default())
        } else {
            Err(vk::Result::ERROR_FORMAT_NOT_SUPPORTED)
        }
    }

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        pdevice: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.fixture(pdevice)
            .queue_families
            .iter()
            .map(|flags| vk::QueueFamilyProperties {
                queue_flags: *flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    unsafe fn create_device(
        &self,
        pdevice: vk::PhysicalDevice,
        info: &vk::DeviceCreateInfo<'_>,
    ) -> Result<MockDevice, vk::Result> {
        self.state.take_failure()?;
        let fixture = self.fixture(pdevice);

        let features = unsafe {
            find_in_chain::<vk::PhysicalDeviceFeatures2>(info.p_next, vk::StructureType::PHYSICAL_DEVICE_FEATURES_2)
        }
        .map(|f| f.features)
        .or_else(|| unsafe { info.p_enabled_features.as_ref() }.copied())
        .unwrap_or_default();

        let storage_buffer16 = unsafe {
            find_in_chain::<vk::PhysicalDevice16BitStorageFeatures>(
                info.p_next,
                vk::StructureType::PHYSICAL_DEVICE_16BIT_STORAGE_FEATURES,
            )
        }
        .map(|f| f.storage_buffer16_bit_access == vk::TRUE);
        let shader_float16 = unsafe {
            find_in_chain::<vk::PhysicalDeviceShaderFloat16Int8Features>(
                info.p_next,
                vk::StructureType::PHYSICAL_DEVICE_SHADER_FLOAT16_INT8_FEATURES,
            )
        }
        .map(|f| f.shader_float16 == vk::TRUE);
        let subgroup_size_control = unsafe {
            find_in_chain::<vk::PhysicalDeviceSubgroupSizeControlFeatures>(
                info.p_next,
                vk::StructureType::PHYSICAL_DEVICE_SUBGROUP_SIZE_CONTROL_FEATURES,
            )
        }
        .map(|f| f.subgroup_size_control == vk::TRUE);

        let extensions = (0..info.enabled_extension_count as usize)
            .map(|i| unsafe { CStr::from_ptr(*info.pp_enabled_extension_names.add(i)) })
            .collect::<Vec<_>>();
        // 驱动会拒绝未报告的 extension
        if extensions.iter().any(|ext| !fixture.has_extension(ext)) {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }

        let queue_infos = unsafe { std::slice::from_raw_parts(info.p_queue_create_infos, info.queue_create_info_count as usize) };
        let queue = queue_infos.first().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let queue_priorities =
            unsafe { std::slice::from_raw_parts(queue.p_queue_priorities, queue.queue_count as usize) }.to_vec();

        self.state.record(MockEvent::CreateDevice(Box::new(DeviceRequest {
            features,
            storage_buffer16,
            shader_float16,
            subgroup_size_control,
            extensions: extensions.iter().map(|ext| ext.to_string_lossy().into_owned()).collect(),
            queue_family_index: queue.queue_family_index,
            queue_priorities,
        })));

        Ok(MockDevice {
            state: self.state.clone(),
        })
    }

    unsafe fn create_surface(
        &self,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> Result<vk::SurfaceKHR, vk::Result> {
        self.state.take_failure()?;
        let handle = self.state.next_handle();
        self.state.record(MockEvent::CreateSurface(handle));
        Ok(vk::SurfaceKHR::from_raw(handle))
    }

    unsafe fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.state.record(MockEvent::DestroySurface(surface.as_raw()));
    }

    unsafe fn get_surface_support(
        &self,
        _pdevice: vk::PhysicalDevice,
        _queue_family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> Result<bool, vk::Result> {
        Ok(true)
    }

    unsafe fn get_surface_capabilities(
        &self,
        pdevice: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<vk::SurfaceCapabilitiesKHR, vk::Result> {
        let surface = &self.fixture(pdevice).surface;
        Ok(vk::SurfaceCapabilitiesKHR {
            supported_usage_flags: surface.usage,
            supported_composite_alpha: surface.composite_alpha,
            ..Default::default()
        })
    }

    unsafe fn get_surface_formats(
        &self,
        pdevice: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, vk::Result> {
        Ok(self
            .fixture(pdevice)
            .surface
            .formats
            .iter()
            .map(|format| vk::SurfaceFormatKHR {
                format: *format,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            })
            .collect())
    }

    unsafe fn get_surface_present_modes(
        &self,
        pdevice: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> Result<Vec<vk::PresentModeKHR>, vk::Result> {
        Ok(self.fixture(pdevice).surface.present_modes.clone())
    }

    unsafe fn destroy(&mut self) {
        self.state.record(MockEvent::DestroyInstance);
    }
}

pub struct MockDevice {
    state: Arc<MockState>,
}

impl MockDevice {
    fn create(&self) -> Result<u64, vk::Result> {
        self.state.take_failure()?;
        Ok(self.state.next_handle())
    }
}

impl DeviceApi<Mock> for MockDevice {
    unsafe fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo<'_>,
        mapped: bool,
    ) -> Result<(vk::Buffer, MockAllocation), vk::Result> {
        let handle = self.create()?;
        self.state.record(MockEvent::CreateBuffer {
            handle,
            size: info.size,
            usage: info.usage,
            mapped,
        });
        Ok((vk::Buffer::from_raw(handle), MockAllocation(handle)))
    }

    unsafe fn destroy_buffer(&self, buffer: vk::Buffer, allocation: MockAllocation) {
        assert_eq!(buffer.as_raw(), allocation.0, "buffer and allocation released apart");
        self.state.record(MockEvent::DestroyBuffer(buffer.as_raw()));
    }

    unsafe fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> Result<(vk::Image, MockAllocation), vk::Result> {
        let handle = self.create()?;
        self.state.record(MockEvent::CreateImage {
            handle,
            image_type: info.image_type,
            format: info.format,
            usage: info.usage,
            flags: info.flags,
            array_layers: info.array_layers,
        });
        Ok((vk::Image::from_raw(handle), MockAllocation(handle)))
    }

    unsafe fn destroy_image(&self, image: vk::Image, allocation: MockAllocation) {
        assert_eq!(image.as_raw(), allocation.0, "image and allocation released apart");
        self.state.record(MockEvent::DestroyImage(image.as_raw()));
    }

    unsafe fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> Result<vk::ImageView, vk::Result> {
        let handle = self.create()?;
        let range = info.subresource_range;
        self.state.record(MockEvent::CreateImageView {
            handle,
            view_type: info.view_type,
            aspect: range.aspect_mask,
            base_mip_level: range.base_mip_level,
            level_count: range.level_count,
            base_array_layer: range.base_array_layer,
            layer_count: range.layer_count,
        });
        Ok(vk::ImageView::from_raw(handle))
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        self.state.record(MockEvent::DestroyImageView(view.as_raw()));
    }

    unsafe fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Result<vk::Sampler, vk::Result> {
        let handle = self.create()?;
        self.state.record(MockEvent::CreateSampler {
            handle,
            anisotropy_enable: info.anisotropy_enable == vk::TRUE,
            max_anisotropy: info.max_anisotropy,
            compare_enable: info.compare_enable == vk::TRUE,
            compare_op: info.compare_op,
        });
        Ok(vk::Sampler::from_raw(handle))
    }

    unsafe fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.state.record(MockEvent::DestroySampler(sampler.as_raw()));
    }

    unsafe fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> Result<vk::DescriptorSetLayout, vk::Result> {
        let handle = self.create()?;
        let bindings = unsafe { std::slice::from_raw_parts(info.p_bindings, info.binding_count as usize) };
        self.state.record(MockEvent::CreateDescriptorSetLayout {
            handle,
            bindings: bindings.iter().map(|b| (b.binding, b.descriptor_type, b.descriptor_count)).collect(),
        });
        Ok(vk::DescriptorSetLayout::from_raw(handle))
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.state.record(MockEvent::DestroyDescriptorSetLayout(layout.as_raw()));
    }

    unsafe fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> Result<vk::DescriptorPool, vk::Result> {
        let handle = self.create()?;
        let sizes = unsafe { std::slice::from_raw_parts(info.p_pool_sizes, info.pool_size_count as usize) };
        self.state.record(MockEvent::CreateDescriptorPool {
            handle,
            max_sets: info.max_sets,
            sizes: sizes.iter().map(|s| (s.ty, s.descriptor_count)).collect(),
        });
        Ok(vk::DescriptorPool::from_raw(handle))
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state.record(MockEvent::DestroyDescriptorPool(pool.as_raw()));
    }

    unsafe fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        (0..info.descriptor_set_count)
            .map(|_| {
                let handle = self.create()?;
                self.state.record(MockEvent::AllocateDescriptorSet(handle));
                Ok(vk::DescriptorSet::from_raw(handle))
            })
            .collect()
    }

    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        self.state.record(MockEvent::UpdateDescriptorSets(
            writes.iter().map(|w| (w.dst_binding, w.descriptor_type, w.descriptor_count)).collect(),
        ));
    }

    unsafe fn destroy_allocator(&mut self) {
        self.state.record(MockEvent::DestroyAllocator);
    }

    unsafe fn destroy_device(&mut self) {
        self.state.record(MockEvent::DestroyDevice);
    }
}

/// 由单个 fixture 直接得到一个逻辑设备
///
/// instance 与 adapter 只由 device 间接持有。
pub fn device(
    fixture: Fixture,
    descriptor: crate::device::DeviceDescriptor<Mock>,
) -> (crate::RefPtr<crate::Device<Mock>>, Arc<MockState>) {
    let (raw, state) = MockInstance::new(vec![fixture]);
    let instance = crate::Instance::<Mock>::from_raw(raw);
    let adapter = instance.select_adapter(&Default::default()).unwrap();
    let device = adapter.create_device(descriptor).unwrap();
    (device, state)
}

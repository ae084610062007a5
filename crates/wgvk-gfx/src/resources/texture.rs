use ash::vk;
use parking_lot::Mutex;

use crate::common::ref_counted::RefPtr;
use crate::conv;
use crate::device::Device;
use crate::error::{GfxError, GfxResult};
use crate::hal::{Api, DeviceApi};
use crate::resources::texture_view::{TextureView, TextureViewDescriptor};
use crate::types::{TextureDimension, TextureFormat, TextureUsages};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: String,
    pub usage: TextureUsages,
    pub dimension: TextureDimension,
    pub size: Extent3d,
    pub format: TextureFormat,
    pub mip_level_count: u32,
    pub sample_count: u32,
    /// 创建 view 时允许使用的其他格式
    pub view_formats: Vec<TextureFormat>,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: String::new(),
            usage: TextureUsages::empty(),
            dimension: TextureDimension::D2,
            size: Extent3d::default(),
            format: TextureFormat::Undefined,
            mip_level_count: 1,
            sample_count: 1,
            view_formats: Vec::new(),
        }
    }
}

/// image 的 extent、层数与创建标志
struct ImageLayout {
    image_type: vk::ImageType,
    extent: vk::Extent3D,
    array_layers: u32,
    flags: vk::ImageCreateFlags,
}

impl ImageLayout {
    fn new(descriptor: &TextureDescriptor) -> Self {
        let size = descriptor.size;
        let (extent, array_layers) = match descriptor.dimension {
            TextureDimension::D1 => (
                vk::Extent3D {
                    width: size.width,
                    height: 1,
                    depth: 1,
                },
                1,
            ),
            TextureDimension::Undefined | TextureDimension::D2 => (
                vk::Extent3D {
                    width: size.width,
                    height: size.height,
                    depth: 1,
                },
                size.depth_or_array_layers,
            ),
            TextureDimension::D3 => (
                vk::Extent3D {
                    width: size.width,
                    height: size.height,
                    depth: size.depth_or_array_layers,
                },
                1,
            ),
        };
        let image_type = conv::map_texture_dimension(descriptor.dimension);

        let mut flags = vk::ImageCreateFlags::empty();
        // 满足条件的 2D 纹理总是允许以 cube 的方式创建 view
        if image_type == vk::ImageType::TYPE_2D
            && array_layers % 6 == 0
            && size.width == size.height
            && descriptor.sample_count == 1
        {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }
        if descriptor.view_formats.iter().any(|format| *format != descriptor.format) {
            flags |= vk::ImageCreateFlags::MUTABLE_FORMAT;
        }

        Self {
            image_type,
            extent,
            array_layers,
            flags,
        }
    }
}

pub struct Texture<A: Api> {
    /// 句柄与分配总是一起释放
    raw: Mutex<Option<(vk::Image, A::Allocation)>>,

    size: Extent3d,
    dimension: TextureDimension,
    format: TextureFormat,
    mip_level_count: u32,
    sample_count: u32,
    usage: TextureUsages,
    view_formats: Vec<TextureFormat>,
    label: Mutex<String>,

    device: RefPtr<Device<A>>,
}

// new & init
impl<A: Api> Texture<A> {
    pub(crate) fn new(device: RefPtr<Device<A>>, descriptor: &TextureDescriptor) -> GfxResult<RefPtr<Self>> {
        validate(descriptor)?;

        let layout = ImageLayout::new(descriptor);
        let image_ci = vk::ImageCreateInfo::default()
            .flags(layout.flags)
            .image_type(layout.image_type)
            .format(conv::map_texture_format(descriptor.format))
            .extent(layout.extent)
            .mip_levels(descriptor.mip_level_count)
            .array_layers(layout.array_layers)
            .samples(conv::map_sample_count(descriptor.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(conv::map_texture_usage(descriptor.usage, descriptor.format.is_depth_stencil()))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let raw = device.with_raw(|raw| unsafe { raw.create_image(&image_ci) })?;
        device.track_allocation();

        Ok(RefPtr::new(Self {
            raw: Mutex::new(Some(raw)),
            size: descriptor.size,
            dimension: match descriptor.dimension {
                TextureDimension::Undefined => TextureDimension::D2,
                dimension => dimension,
            },
            format: descriptor.format,
            mip_level_count: descriptor.mip_level_count,
            sample_count: descriptor.sample_count,
            usage: descriptor.usage,
            view_formats: descriptor.view_formats.clone(),
            label: Mutex::new(descriptor.label.clone()),
            device,
        }))
    }

    fn this(&self) -> RefPtr<Self> {
        // Texture 只通过 RefPtr 创建
        unsafe { RefPtr::clone_from_ref(self) }
    }

    /// 描述为空时 view 覆盖整张纹理
    pub fn create_view(&self, descriptor: Option<&TextureViewDescriptor>) -> GfxResult<RefPtr<TextureView<A>>> {
        let default = TextureViewDescriptor::default();
        TextureView::new(self.this(), descriptor.unwrap_or(&default))
    }
}

fn validate(descriptor: &TextureDescriptor) -> GfxResult<()> {
    let fail = |what: &str| Err(GfxError::Validation(format!("texture {:?}: {}", descriptor.label, what)));

    if descriptor.format == TextureFormat::Undefined {
        return fail("format is undefined");
    }
    if descriptor.usage.is_empty() {
        return fail("usage is empty");
    }
    let size = descriptor.size;
    if size.width == 0 || size.height == 0 || size.depth_or_array_layers == 0 {
        return fail("size has a zero component");
    }
    if descriptor.mip_level_count == 0 {
        return fail("mip level count is zero");
    }
    if !descriptor.sample_count.is_power_of_two() || descriptor.sample_count > 64 {
        return fail("sample count must be a power of two no greater than 64");
    }
    Ok(())
}

// destroy
impl<A: Api> Texture<A> {
    /// 同时释放句柄与内存，可以重复调用
    pub fn destroy(&self) {
        let Some((image, allocation)) = self.raw.lock().take() else {
            return;
        };
        self.device.release_allocation("texture", |raw| unsafe { raw.destroy_image(image, allocation) });
    }
}

impl<A: Api> Drop for Texture<A> {
    fn drop(&mut self) {
        self.destroy();
    }
}

// getters
impl<A: Api> Texture<A> {
    /// `destroy` 之后返回 `None`
    #[inline]
    pub fn raw(&self) -> Option<vk::Image> {
        self.raw.lock().as_ref().map(|(image, _)| *image)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.height
    }

    #[inline]
    pub fn depth_or_array_layers(&self) -> u32 {
        self.size.depth_or_array_layers
    }

    /// 3D 纹理只有一层
    pub fn array_layer_count(&self) -> u32 {
        match self.dimension {
            TextureDimension::D2 | TextureDimension::Undefined => self.size.depth_or_array_layers,
            TextureDimension::D1 | TextureDimension::D3 => 1,
        }
    }

    #[inline]
    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    #[inline]
    pub fn view_formats(&self) -> &[TextureFormat] {
        &self.view_formats
    }

    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    pub fn usage(&self) -> TextureUsages {
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

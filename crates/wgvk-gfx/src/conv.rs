//! 声明式枚举 / 位标志到 Vulkan 的确定性转换表

use ash::vk;

use crate::types::{
    AdapterType, AddressMode, BufferUsages, CompareFunction, CompositeAlphaMode, FilterMode, MipmapFilterMode,
    PresentMode, ShaderStages, TextureAspect, TextureDimension, TextureFormat, TextureUsages, TextureViewDimension,
};

pub fn map_buffer_usage(usage: BufferUsages) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsages::COPY_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsages::COPY_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsages::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsages::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsages::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsages::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsages::INDIRECT) {
        flags |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    // query 结果通过 copy 写入 buffer
    if usage.contains(BufferUsages::QUERY_RESOLVE) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    flags
}

/// depth / stencil 格式的 attachment 需要使用不同的 usage bit
pub fn map_texture_usage(usage: TextureUsages, is_depth_stencil: bool) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsages::COPY_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsages::COPY_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsages::TEXTURE_BINDING) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsages::STORAGE_BINDING) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsages::RENDER_ATTACHMENT) {
        flags |= if is_depth_stencil {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };
    }
    flags
}

/// surface 报告的 usage 反向映射
pub fn map_vk_image_usage(usage: vk::ImageUsageFlags) -> TextureUsages {
    let mut bits = TextureUsages::empty();
    if usage.contains(vk::ImageUsageFlags::TRANSFER_SRC) {
        bits |= TextureUsages::COPY_SRC;
    }
    if usage.contains(vk::ImageUsageFlags::TRANSFER_DST) {
        bits |= TextureUsages::COPY_DST;
    }
    if usage.contains(vk::ImageUsageFlags::SAMPLED) {
        bits |= TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(vk::ImageUsageFlags::STORAGE) {
        bits |= TextureUsages::STORAGE_BINDING;
    }
    if usage.intersects(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
        bits |= TextureUsages::RENDER_ATTACHMENT;
    }
    bits
}

pub fn map_texture_format(format: TextureFormat) -> vk::Format {
    use TextureFormat as Tf;
    match format {
        Tf::Undefined => vk::Format::UNDEFINED,
        Tf::R8Unorm => vk::Format::R8_UNORM,
        Tf::R8Snorm => vk::Format::R8_SNORM,
        Tf::R8Uint => vk::Format::R8_UINT,
        Tf::R8Sint => vk::Format::R8_SINT,
        Tf::R16Uint => vk::Format::R16_UINT,
        Tf::R16Sint => vk::Format::R16_SINT,
        Tf::R16Float => vk::Format::R16_SFLOAT,
        Tf::RG8Unorm => vk::Format::R8G8_UNORM,
        Tf::RG8Snorm => vk::Format::R8G8_SNORM,
        Tf::RG8Uint => vk::Format::R8G8_UINT,
        Tf::RG8Sint => vk::Format::R8G8_SINT,
        Tf::R32Float => vk::Format::R32_SFLOAT,
        Tf::R32Uint => vk::Format::R32_UINT,
        Tf::R32Sint => vk::Format::R32_SINT,
        Tf::RG16Uint => vk::Format::R16G16_UINT,
        Tf::RG16Sint => vk::Format::R16G16_SINT,
        Tf::RG16Float => vk::Format::R16G16_SFLOAT,
        Tf::RGBA8Unorm => vk::Format::R8G8B8A8_UNORM,
        Tf::RGBA8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        Tf::RGBA8Snorm => vk::Format::R8G8B8A8_SNORM,
        Tf::RGBA8Uint => vk::Format::R8G8B8A8_UINT,
        Tf::RGBA8Sint => vk::Format::R8G8B8A8_SINT,
        Tf::BGRA8Unorm => vk::Format::B8G8R8A8_UNORM,
        Tf::BGRA8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        Tf::RGB10A2Uint => vk::Format::A2B10G10R10_UINT_PACK32,
        Tf::RGB10A2Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        Tf::RG11B10Ufloat => vk::Format::B10G11R11_UFLOAT_PACK32,
        Tf::RGB9E5Ufloat => vk::Format::E5B9G9R9_UFLOAT_PACK32,
        Tf::RG32Float => vk::Format::R32G32_SFLOAT,
        Tf::RG32Uint => vk::Format::R32G32_UINT,
        Tf::RG32Sint => vk::Format::R32G32_SINT,
        Tf::RGBA16Uint => vk::Format::R16G16B16A16_UINT,
        Tf::RGBA16Sint => vk::Format::R16G16B16A16_SINT,
        Tf::RGBA16Float => vk::Format::R16G16B16A16_SFLOAT,
        Tf::RGBA32Float => vk::Format::R32G32B32A32_SFLOAT,
        Tf::RGBA32Uint => vk::Format::R32G32B32A32_UINT,
        Tf::RGBA32Sint => vk::Format::R32G32B32A32_SINT,
        Tf::Stencil8 => vk::Format::S8_UINT,
        Tf::Depth16Unorm => vk::Format::D16_UNORM,
        Tf::Depth24Plus => vk::Format::D32_SFLOAT,
        Tf::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
        Tf::Depth32Float => vk::Format::D32_SFLOAT,
        Tf::Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
        Tf::BC1RGBAUnorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Tf::BC1RGBAUnormSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Tf::BC2RGBAUnorm => vk::Format::BC2_UNORM_BLOCK,
        Tf::BC2RGBAUnormSrgb => vk::Format::BC2_SRGB_BLOCK,
        Tf::BC3RGBAUnorm => vk::Format::BC3_UNORM_BLOCK,
        Tf::BC3RGBAUnormSrgb => vk::Format::BC3_SRGB_BLOCK,
        Tf::BC4RUnorm => vk::Format::BC4_UNORM_BLOCK,
        Tf::BC4RSnorm => vk::Format::BC4_SNORM_BLOCK,
        Tf::BC5RGUnorm => vk::Format::BC5_UNORM_BLOCK,
        Tf::BC5RGSnorm => vk::Format::BC5_SNORM_BLOCK,
        Tf::BC6HRGBUfloat => vk::Format::BC6H_UFLOAT_BLOCK,
        Tf::BC6HRGBFloat => vk::Format::BC6H_SFLOAT_BLOCK,
        Tf::BC7RGBAUnorm => vk::Format::BC7_UNORM_BLOCK,
        Tf::BC7RGBAUnormSrgb => vk::Format::BC7_SRGB_BLOCK,
    }
}

/// surface 只对外暴露这几种格式
pub fn map_vk_surface_format(format: vk::Format) -> Option<TextureFormat> {
    match format {
        vk::Format::R8G8B8A8_UNORM => Some(TextureFormat::RGBA8Unorm),
        vk::Format::R8G8B8A8_SRGB => Some(TextureFormat::RGBA8UnormSrgb),
        vk::Format::B8G8R8A8_UNORM => Some(TextureFormat::BGRA8Unorm),
        vk::Format::B8G8R8A8_SRGB => Some(TextureFormat::BGRA8UnormSrgb),
        vk::Format::A2B10G10R10_UNORM_PACK32 => Some(TextureFormat::RGB10A2Unorm),
        vk::Format::R16G16B16A16_SFLOAT => Some(TextureFormat::RGBA16Float),
        _ => None,
    }
}

/// 根据格式与请求的 aspect 计算 image aspect
pub fn map_aspects(format: TextureFormat, aspect: TextureAspect) -> vk::ImageAspectFlags {
    let mut all = vk::ImageAspectFlags::empty();
    if format.has_depth() {
        all |= vk::ImageAspectFlags::DEPTH;
    }
    if format.has_stencil() {
        all |= vk::ImageAspectFlags::STENCIL;
    }
    if all.is_empty() {
        all = vk::ImageAspectFlags::COLOR;
    }

    match aspect {
        TextureAspect::Undefined | TextureAspect::All => all,
        TextureAspect::DepthOnly => all & vk::ImageAspectFlags::DEPTH,
        TextureAspect::StencilOnly => all & vk::ImageAspectFlags::STENCIL,
    }
}

pub fn map_texture_dimension(dimension: TextureDimension) -> vk::ImageType {
    match dimension {
        TextureDimension::D1 => vk::ImageType::TYPE_1D,
        TextureDimension::Undefined | TextureDimension::D2 => vk::ImageType::TYPE_2D,
        TextureDimension::D3 => vk::ImageType::TYPE_3D,
    }
}

pub fn map_view_dimension(dimension: TextureViewDimension) -> vk::ImageViewType {
    match dimension {
        TextureViewDimension::D1 => vk::ImageViewType::TYPE_1D,
        TextureViewDimension::Undefined | TextureViewDimension::D2 => vk::ImageViewType::TYPE_2D,
        TextureViewDimension::D2Array => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureViewDimension::Cube => vk::ImageViewType::CUBE,
        TextureViewDimension::CubeArray => vk::ImageViewType::CUBE_ARRAY,
        TextureViewDimension::D3 => vk::ImageViewType::TYPE_3D,
    }
}

pub fn map_sample_count(count: u32) -> vk::SampleCountFlags {
    match count {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        32 => vk::SampleCountFlags::TYPE_32,
        64 => vk::SampleCountFlags::TYPE_64,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub fn map_filter_mode(mode: FilterMode) -> vk::Filter {
    match mode {
        FilterMode::Undefined | FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

pub fn map_mip_filter_mode(mode: MipmapFilterMode) -> vk::SamplerMipmapMode {
    match mode {
        MipmapFilterMode::Undefined | MipmapFilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        MipmapFilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn map_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Undefined | AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

/// `Undefined` 表示不做比较
pub fn map_compare_function(function: CompareFunction) -> Option<vk::CompareOp> {
    Some(match function {
        CompareFunction::Undefined => return None,
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    })
}

pub fn map_shader_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

pub fn map_adapter_type(device_type: vk::PhysicalDeviceType) -> AdapterType {
    match device_type {
        vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterType::IntegratedGPU,
        vk::PhysicalDeviceType::DISCRETE_GPU => AdapterType::DiscreteGPU,
        vk::PhysicalDeviceType::CPU => AdapterType::CPU,
        _ => AdapterType::Unknown,
    }
}

pub fn map_vk_present_mode(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        _ => None,
    }
}

pub fn map_vk_composite_alpha(flags: vk::CompositeAlphaFlagsKHR) -> Vec<CompositeAlphaMode> {
    let mut modes = Vec::new();
    if flags.contains(vk::CompositeAlphaFlagsKHR::OPAQUE) {
        modes.push(CompositeAlphaMode::Opaque);
    }
    if flags.contains(vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED) {
        modes.push(CompositeAlphaMode::Premultiplied);
    }
    if flags.contains(vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED) {
        modes.push(CompositeAlphaMode::Unpremultiplied);
    }
    if flags.contains(vk::CompositeAlphaFlagsKHR::INHERIT) {
        modes.push(CompositeAlphaMode::Inherit);
    }
    modes
}

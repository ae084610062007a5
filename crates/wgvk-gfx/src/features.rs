//! 对外 feature 的判定与开启
//!
//! 每个 feature 在 [`FEATURE_TABLE`] 中只有一条记录：枚举 feature 与创建 device
//! 时的校验使用同一个 `supported`，开启时使用同一条记录里的 `enable`。

use ash::vk;

use crate::device_info::{DeviceExtension, DeviceInfo, ExtensionSet};
use crate::error::{GfxError, GfxResult};
use crate::foundation::chain::NextChainBuilder;
use crate::types::FeatureName;

/// feature 判定所需的能力来源
pub trait CapabilitySource {
    fn device_info(&self) -> &DeviceInfo;
    fn extensions(&self) -> &ExtensionSet;
    /// optimal tiling 下的 format features
    fn format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags;
    fn supports_image_format(&self, format: vk::Format, ty: vk::ImageType, usage: vk::ImageUsageFlags) -> bool;

    fn has_extension(&self, ext: DeviceExtension) -> bool {
        self.extensions().contains(ext)
    }
}

/// 创建 device 时需要开启的原生 feature
///
/// 扩展节点为 `None` 时不会出现在链上。
#[derive(Debug, Clone, Copy, Default)]
pub struct EnabledFeatures {
    pub core: vk::PhysicalDeviceFeatures,
    pub storage16: Option<vk::PhysicalDevice16BitStorageFeatures<'static>>,
    pub float16_int8: Option<vk::PhysicalDeviceShaderFloat16Int8Features<'static>>,
    pub subgroup_size_control: Option<vk::PhysicalDeviceSubgroupSizeControlFeatures<'static>>,
}

// 节点在 link 之前 p_next 都为空
unsafe impl Send for EnabledFeatures {}
unsafe impl Sync for EnabledFeatures {}

impl EnabledFeatures {
    /// 无条件开启的基础能力，各向异性过滤只在设备报告时开启
    pub fn baseline(info: &DeviceInfo) -> Self {
        let core = vk::PhysicalDeviceFeatures {
            independent_blend: vk::TRUE,
            image_cube_array: vk::TRUE,
            full_draw_index_uint32: vk::TRUE,
            fragment_stores_and_atomics: vk::TRUE,
            sample_rate_shading: vk::TRUE,
            depth_bias_clamp: vk::TRUE,
            sampler_anisotropy: info.features.sampler_anisotropy,
            ..Default::default()
        };

        Self {
            core,
            ..Default::default()
        }
    }

    /// 把 core feature 与扩展节点挂到 `features2` 上
    ///
    /// 依赖 extension 的节点只在 extension 存在时挂上。
    ///
    /// # Safety
    /// 在 `features2` 被使用期间，`self` 不能移动
    pub unsafe fn link(&mut self, features2: &mut vk::PhysicalDeviceFeatures2<'_>, extensions: &ExtensionSet) {
        features2.features = self.core;
        unsafe {
            let mut chain = NextChainBuilder::new(features2);
            // 16bit storage 在 1.1 中是核心功能
            if let Some(node) = self.storage16.as_mut() {
                chain.push(node);
            }
            if extensions.contains(DeviceExtension::ShaderFloat16Int8) {
                if let Some(node) = self.float16_int8.as_mut() {
                    chain.push(node);
                }
            }
            if extensions.contains(DeviceExtension::SubgroupSizeControl) {
                if let Some(node) = self.subgroup_size_control.as_mut() {
                    chain.push(node);
                }
            }
        }
    }
}

pub struct FeatureEntry {
    pub name: FeatureName,
    pub supported: fn(&dyn CapabilitySource) -> bool,
    pub enable: fn(&mut EnabledFeatures),
}

const ASTC_FORMATS: [vk::Format; 28] = [
    vk::Format::ASTC_4X4_UNORM_BLOCK,
    vk::Format::ASTC_4X4_SRGB_BLOCK,
    vk::Format::ASTC_5X4_UNORM_BLOCK,
    vk::Format::ASTC_5X4_SRGB_BLOCK,
    vk::Format::ASTC_5X5_UNORM_BLOCK,
    vk::Format::ASTC_5X5_SRGB_BLOCK,
    vk::Format::ASTC_6X5_UNORM_BLOCK,
    vk::Format::ASTC_6X5_SRGB_BLOCK,
    vk::Format::ASTC_6X6_UNORM_BLOCK,
    vk::Format::ASTC_6X6_SRGB_BLOCK,
    vk::Format::ASTC_8X5_UNORM_BLOCK,
    vk::Format::ASTC_8X5_SRGB_BLOCK,
    vk::Format::ASTC_8X6_UNORM_BLOCK,
    vk::Format::ASTC_8X6_SRGB_BLOCK,
    vk::Format::ASTC_8X8_UNORM_BLOCK,
    vk::Format::ASTC_8X8_SRGB_BLOCK,
    vk::Format::ASTC_10X5_UNORM_BLOCK,
    vk::Format::ASTC_10X5_SRGB_BLOCK,
    vk::Format::ASTC_10X6_UNORM_BLOCK,
    vk::Format::ASTC_10X6_SRGB_BLOCK,
    vk::Format::ASTC_10X8_UNORM_BLOCK,
    vk::Format::ASTC_10X8_SRGB_BLOCK,
    vk::Format::ASTC_10X10_UNORM_BLOCK,
    vk::Format::ASTC_10X10_SRGB_BLOCK,
    vk::Format::ASTC_12X10_UNORM_BLOCK,
    vk::Format::ASTC_12X10_SRGB_BLOCK,
    vk::Format::ASTC_12X12_UNORM_BLOCK,
    vk::Format::ASTC_12X12_SRGB_BLOCK,
];

/// Tier1 / Tier2 要求可渲染且可混合的格式
const TIER_FORMATS: [vk::Format; 10] = [
    vk::Format::R16_UNORM,
    vk::Format::R16_SNORM,
    vk::Format::R16G16_UNORM,
    vk::Format::R16G16_SNORM,
    vk::Format::R16G16B16A16_UNORM,
    vk::Format::R16G16B16A16_SNORM,
    vk::Format::R8_SNORM,
    vk::Format::R8G8_SNORM,
    vk::Format::R8G8B8A8_SNORM,
    vk::Format::B10G11R11_UFLOAT_PACK32,
];

const SUBGROUP_OPS: vk::SubgroupFeatureFlags = vk::SubgroupFeatureFlags::from_raw(
    vk::SubgroupFeatureFlags::BASIC.as_raw()
        | vk::SubgroupFeatureFlags::BALLOT.as_raw()
        | vk::SubgroupFeatureFlags::SHUFFLE.as_raw()
        | vk::SubgroupFeatureFlags::SHUFFLE_RELATIVE.as_raw()
        | vk::SubgroupFeatureFlags::ARITHMETIC.as_raw()
        | vk::SubgroupFeatureFlags::QUAD.as_raw(),
);

fn format_has(caps: &dyn CapabilitySource, format: vk::Format, required: vk::FormatFeatureFlags) -> bool {
    caps.format_features(format).contains(required)
}

fn astc_sliced3d(caps: &dyn CapabilitySource) -> bool {
    caps.device_info().features.texture_compression_astc_ldr == vk::TRUE
        && ASTC_FORMATS
            .iter()
            .all(|format| caps.supports_image_format(*format, vk::ImageType::TYPE_3D, vk::ImageUsageFlags::SAMPLED))
}

fn subgroups(caps: &dyn CapabilitySource) -> bool {
    let props = &caps.device_info().subgroup_properties;
    props.supported_stages.contains(vk::ShaderStageFlags::COMPUTE | vk::ShaderStageFlags::FRAGMENT)
        && props.supported_operations.contains(SUBGROUP_OPS)
        && caps.has_extension(DeviceExtension::SubgroupSizeControl)
        && caps.device_info().subgroup_size_control_features.subgroup_size_control == vk::TRUE
}

fn texture_formats_tier(caps: &dyn CapabilitySource) -> bool {
    caps.device_info().features.shader_storage_image_extended_formats == vk::TRUE
        && TIER_FORMATS.iter().all(|format| {
            format_has(
                caps,
                *format,
                vk::FormatFeatureFlags::COLOR_ATTACHMENT | vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND,
            )
        })
}

fn shader_f16(caps: &dyn CapabilitySource) -> bool {
    let info = caps.device_info();
    caps.has_extension(DeviceExtension::ShaderFloat16Int8)
        && info.storage16_features.storage_buffer16_bit_access == vk::TRUE
        && info.float16_int8_features.shader_float16 == vk::TRUE
}

fn enable_nothing(_: &mut EnabledFeatures) {}

pub static FEATURE_TABLE: &[FeatureEntry] = &[
    FeatureEntry {
        name: FeatureName::CoreFeaturesAndLimits,
        supported: |_| true,
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::DepthClipControl,
        supported: |caps| caps.device_info().features.depth_clamp == vk::TRUE,
        enable: |f| f.core.depth_clamp = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::Depth32FloatStencil8,
        supported: |caps| {
            format_has(caps, vk::Format::D32_SFLOAT_S8_UINT, vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        },
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::TextureCompressionBC,
        supported: |caps| caps.device_info().features.texture_compression_bc == vk::TRUE,
        enable: |f| f.core.texture_compression_bc = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TextureCompressionBCSliced3D,
        supported: |caps| caps.device_info().features.texture_compression_bc == vk::TRUE,
        enable: |f| f.core.texture_compression_bc = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TextureCompressionETC2,
        supported: |caps| caps.device_info().features.texture_compression_etc2 == vk::TRUE,
        enable: |f| f.core.texture_compression_etc2 = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TextureCompressionASTC,
        supported: |caps| caps.device_info().features.texture_compression_astc_ldr == vk::TRUE,
        enable: |f| f.core.texture_compression_astc_ldr = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TextureCompressionASTCSliced3D,
        supported: astc_sliced3d,
        enable: |f| f.core.texture_compression_astc_ldr = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TimestampQuery,
        supported: |caps| caps.device_info().properties.limits.timestamp_compute_and_graphics == vk::TRUE,
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::IndirectFirstInstance,
        supported: |caps| caps.device_info().features.draw_indirect_first_instance == vk::TRUE,
        enable: |f| f.core.draw_indirect_first_instance = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::ShaderF16,
        supported: shader_f16,
        enable: |f| {
            f.float16_int8.get_or_insert_with(Default::default).shader_float16 = vk::TRUE;
            f.storage16.get_or_insert_with(Default::default).storage_buffer16_bit_access = vk::TRUE;
        },
    },
    FeatureEntry {
        name: FeatureName::RG11B10UfloatRenderable,
        supported: |caps| {
            format_has(caps, vk::Format::B10G11R11_UFLOAT_PACK32, vk::FormatFeatureFlags::COLOR_ATTACHMENT)
        },
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::BGRA8UnormStorage,
        supported: |caps| format_has(caps, vk::Format::B8G8R8A8_UNORM, vk::FormatFeatureFlags::STORAGE_IMAGE),
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::Float32Filterable,
        supported: |caps| {
            format_has(caps, vk::Format::R32_SFLOAT, vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        },
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::Float32Blendable,
        supported: |caps| {
            format_has(caps, vk::Format::R32G32B32A32_SFLOAT, vk::FormatFeatureFlags::COLOR_ATTACHMENT_BLEND)
        },
        enable: enable_nothing,
    },
    FeatureEntry {
        name: FeatureName::ClipDistances,
        supported: |caps| caps.device_info().features.shader_clip_distance == vk::TRUE,
        enable: |f| f.core.shader_clip_distance = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::DualSourceBlending,
        supported: |caps| caps.device_info().features.dual_src_blend == vk::TRUE,
        enable: |f| f.core.dual_src_blend = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::Subgroups,
        supported: subgroups,
        enable: |f| f.subgroup_size_control.get_or_insert_with(Default::default).subgroup_size_control = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TextureFormatsTier1,
        supported: texture_formats_tier,
        enable: |f| f.core.shader_storage_image_extended_formats = vk::TRUE,
    },
    // Tier2 只额外依赖 shaderStorageImageExtendedFormats，与 Tier1 共用判定
    FeatureEntry {
        name: FeatureName::TextureFormatsTier2,
        supported: texture_formats_tier,
        enable: |f| f.core.shader_storage_image_extended_formats = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::PrimitiveIndex,
        supported: |caps| caps.device_info().features.geometry_shader == vk::TRUE,
        enable: |f| f.core.geometry_shader = vk::TRUE,
    },
    FeatureEntry {
        name: FeatureName::TextureComponentSwizzle,
        supported: |_| true,
        enable: enable_nothing,
    },
];

pub fn find_entry(name: FeatureName) -> Option<&'static FeatureEntry> {
    FEATURE_TABLE.iter().find(|entry| entry.name == name)
}

/// 按表的顺序列出所有满足判定的 feature
pub fn supported_features(caps: &dyn CapabilitySource) -> Vec<FeatureName> {
    FEATURE_TABLE.iter().filter(|entry| (entry.supported)(caps)).map(|entry| entry.name).collect()
}

/// 校验请求的 feature，并在基础能力之上开启它们
///
/// 遇到第一个不支持的 feature 就返回错误，此时没有任何原生对象被创建。
pub fn enable_requested(caps: &dyn CapabilitySource, requested: &[FeatureName]) -> GfxResult<EnabledFeatures> {
    let mut enabled = EnabledFeatures::baseline(caps.device_info());
    for name in requested {
        let entry = find_entry(*name).ok_or(GfxError::FeatureUnsupported(*name))?;
        if !(entry.supported)(caps) {
            return Err(GfxError::FeatureUnsupported(*name));
        }
        (entry.enable)(&mut enabled);
    }
    Ok(enabled)
}

use ash::vk;
use parking_lot::Mutex;

use crate::common::ref_counted::RefPtr;
use crate::conv;
use crate::device::Device;
use crate::error::GfxResult;
use crate::hal::{Api, DeviceApi};
use crate::types::{AddressMode, CompareFunction, FilterMode, MipmapFilterMode};

#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub label: String,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: MipmapFilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    /// `Undefined` 表示不是比较采样器
    pub compare: CompareFunction,
    pub max_anisotropy: u16,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: String::new(),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: MipmapFilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: CompareFunction::Undefined,
            max_anisotropy: 1,
        }
    }
}

pub struct Sampler<A: Api> {
    raw: vk::Sampler,
    label: Mutex<String>,

    device: RefPtr<Device<A>>,
}

// new & init
impl<A: Api> Sampler<A> {
    pub(crate) fn new(device: RefPtr<Device<A>>, descriptor: &SamplerDescriptor) -> GfxResult<RefPtr<Self>> {
        let mut sampler_ci = vk::SamplerCreateInfo::default()
            .mag_filter(conv::map_filter_mode(descriptor.mag_filter))
            .min_filter(conv::map_filter_mode(descriptor.min_filter))
            .mipmap_mode(conv::map_mip_filter_mode(descriptor.mipmap_filter))
            .address_mode_u(conv::map_address_mode(descriptor.address_mode_u))
            .address_mode_v(conv::map_address_mode(descriptor.address_mode_v))
            .address_mode_w(conv::map_address_mode(descriptor.address_mode_w))
            .min_lod(descriptor.lod_min_clamp)
            .max_lod(descriptor.lod_max_clamp);

        let max_anisotropy = Self::clamp_anisotropy(&device, descriptor.max_anisotropy);
        sampler_ci = sampler_ci.anisotropy_enable(max_anisotropy > 1.0).max_anisotropy(max_anisotropy);

        sampler_ci = match conv::map_compare_function(descriptor.compare) {
            Some(op) => sampler_ci.compare_enable(true).compare_op(op),
            None => sampler_ci.compare_enable(false).compare_op(vk::CompareOp::NEVER),
        };

        let raw = device.with_raw(|raw| unsafe { raw.create_sampler(&sampler_ci) })?;

        Ok(RefPtr::new(Self {
            raw,
            label: Mutex::new(descriptor.label.clone()),
            device,
        }))
    }
}

// tools
impl<A: Api> Sampler<A> {
    /// 限制在 adapter 的 `maxSamplerAnisotropy` 以内；设备未启用各向异性时固定为 1
    fn clamp_anisotropy(device: &Device<A>, requested: u16) -> f32 {
        if !device.anisotropy_enabled() {
            return 1.0;
        }
        f32::from(requested).min(device.max_sampler_anisotropy()).max(1.0)
    }
}

impl<A: Api> Drop for Sampler<A> {
    fn drop(&mut self) {
        let sampler = self.raw;
        self.device.release_with("sampler", |raw| unsafe { raw.destroy_sampler(sampler) });
    }
}

// getters
impl<A: Api> Sampler<A> {
    #[inline]
    pub fn raw(&self) -> vk::Sampler {
        self.raw
    }

    pub fn label(&self) -> String {
        self.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.label.lock() = label.to_string();
    }
}

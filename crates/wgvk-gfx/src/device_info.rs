//! 物理设备的能力扫描
//!
//! 一次 properties2 查询与一次 features2 查询填充所有的扩展节点，
//! 节点是否挂到链上由 extension 是否存在决定。

use std::ffi::CStr;
use std::ptr;

use ash::vk;
use wgvk_crate_tools::enumed_map;

use crate::foundation::chain::NextChainBuilder;
use crate::hal::{Api, InstanceApi};

enumed_map!(pub DeviceExtension<&'static CStr>: {
    SubgroupSizeControl: ash::ext::subgroup_size_control::NAME,
    ShaderFloat16Int8: ash::khr::shader_float16_int8::NAME,
    Swapchain: ash::khr::swapchain::NAME,
});

/// 允许列表中每个 extension 是否被物理设备报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    present: [bool; DeviceExtension::COUNT],
}

impl ExtensionSet {
    /// 与允许列表求交集
    pub fn from_properties(props: &[vk::ExtensionProperties]) -> Self {
        let mut set = Self::default();
        for prop in props {
            let Ok(name) = prop.extension_name_as_c_str() else {
                continue;
            };
            if let Some(ext) = DeviceExtension::iter().find(|ext| *ext.value() == name) {
                set.present[ext.index()] = true;
            }
        }
        set
    }

    #[inline]
    pub fn contains(&self, ext: DeviceExtension) -> bool {
        self.present[ext.index()]
    }

    pub fn insert(&mut self, ext: DeviceExtension) {
        self.present[ext.index()] = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = DeviceExtension> + '_ {
        DeviceExtension::iter().filter(|ext| self.contains(*ext))
    }
}

/// 查询得到的 properties 与 features
///
/// 查询结束后所有 `p_next` 都被置空，结构体可以自由移动与共享。
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub properties: vk::PhysicalDeviceProperties,
    pub subgroup_properties: vk::PhysicalDeviceSubgroupProperties<'static>,
    /// 仅在 SubgroupSizeControl 存在时被填充
    pub subgroup_size_control_properties: vk::PhysicalDeviceSubgroupSizeControlProperties<'static>,

    pub features: vk::PhysicalDeviceFeatures,
    pub storage16_features: vk::PhysicalDevice16BitStorageFeatures<'static>,
    /// 仅在 ShaderFloat16Int8 存在时被填充
    pub float16_int8_features: vk::PhysicalDeviceShaderFloat16Int8Features<'static>,
    /// 仅在 SubgroupSizeControl 存在时被填充
    pub subgroup_size_control_features: vk::PhysicalDeviceSubgroupSizeControlFeatures<'static>,
}

// p_next 都是空指针，剩下的都是纯数据
unsafe impl Send for DeviceInfo {}
unsafe impl Sync for DeviceInfo {}

impl DeviceInfo {
    pub fn query<A: Api>(instance: &A::Instance, pdevice: vk::PhysicalDevice, extensions: &ExtensionSet) -> Self {
        let mut subgroup_properties = vk::PhysicalDeviceSubgroupProperties::default();
        let mut subgroup_size_control_properties = vk::PhysicalDeviceSubgroupSizeControlProperties::default();
        let mut properties2 = vk::PhysicalDeviceProperties2::default();

        let mut storage16_features = vk::PhysicalDevice16BitStorageFeatures::default();
        let mut float16_int8_features = vk::PhysicalDeviceShaderFloat16Int8Features::default();
        let mut subgroup_size_control_features = vk::PhysicalDeviceSubgroupSizeControlFeatures::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default();

        unsafe {
            let mut props_chain = NextChainBuilder::new(&mut properties2);
            props_chain.push(&mut subgroup_properties);
            if extensions.contains(DeviceExtension::SubgroupSizeControl) {
                props_chain.push(&mut subgroup_size_control_properties);
            }
            instance.get_physical_device_properties2(pdevice, &mut properties2);

            let mut features_chain = NextChainBuilder::new(&mut features2);
            features_chain.push(&mut storage16_features);
            if extensions.contains(DeviceExtension::ShaderFloat16Int8) {
                features_chain.push(&mut float16_int8_features);
            }
            if extensions.contains(DeviceExtension::SubgroupSizeControl) {
                features_chain.push(&mut subgroup_size_control_features);
            }
            instance.get_physical_device_features2(pdevice, &mut features2);
        }

        subgroup_properties.p_next = ptr::null_mut();
        subgroup_size_control_properties.p_next = ptr::null_mut();
        storage16_features.p_next = ptr::null_mut();
        float16_int8_features.p_next = ptr::null_mut();
        subgroup_size_control_features.p_next = ptr::null_mut();

        Self {
            properties: properties2.properties,
            subgroup_properties,
            subgroup_size_control_properties,
            features: features2.features,
            storage16_features,
            float16_int8_features,
            subgroup_size_control_features,
        }
    }

    pub fn device_name(&self) -> String {
        self.properties.device_name_as_c_str().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

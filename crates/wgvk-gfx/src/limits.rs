//! 对外的 limits 结构，以及请求 limits 的校验

use ash::vk;

use crate::error::{GfxError, GfxResult};

/// 默认假定的最大 buffer 尺寸：2 GiB
pub const ASSUMED_MAX_BUFFER_SIZE: u64 = 0x8000_0000;
/// immediate data 暂不支持
pub const MAX_IMMEDIATE_SIZE: u32 = 0;

/// limit 的校验类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitClass {
    /// 请求值不能超过 adapter 报告的值
    Max,
    /// 同 Max，另外必须是 2 的幂
    Alignment,
}

macro_rules! define_limits {
    ($($(#[$meta:meta])* $name:ident: $ty:ty => $class:ident,)*) => {
        /// 与 `WGPULimits` 字段顺序一致（不含 `nextInChain`）
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Limits {
            $($(#[$meta])* pub $name: $ty,)*
        }

        impl Limits {
            /// 所有字段都是 "undefined" 哨兵值，表示不做任何要求
            pub const fn undefined() -> Self {
                Self {
                    $($name: <$ty>::MAX,)*
                }
            }

            /// 按 (名字, 类别, 请求值, 支持值, 哨兵值) 逐项访问
            fn entries(requested: &Self, supported: &Self) -> Vec<(&'static str, LimitClass, u64, u64, u64)> {
                vec![
                    $((
                        stringify!($name),
                        LimitClass::$class,
                        requested.$name as u64,
                        supported.$name as u64,
                        <$ty>::MAX as u64,
                    ),)*
                ]
            }
        }
    };
}

define_limits! {
    max_texture_dimension_1d: u32 => Max,
    max_texture_dimension_2d: u32 => Max,
    max_texture_dimension_3d: u32 => Max,
    max_texture_array_layers: u32 => Max,
    max_bind_groups: u32 => Max,
    max_bind_groups_plus_vertex_buffers: u32 => Max,
    max_bindings_per_bind_group: u32 => Max,
    max_dynamic_uniform_buffers_per_pipeline_layout: u32 => Max,
    max_dynamic_storage_buffers_per_pipeline_layout: u32 => Max,
    max_sampled_textures_per_shader_stage: u32 => Max,
    max_samplers_per_shader_stage: u32 => Max,
    max_storage_buffers_per_shader_stage: u32 => Max,
    max_storage_textures_per_shader_stage: u32 => Max,
    max_uniform_buffers_per_shader_stage: u32 => Max,
    max_uniform_buffer_binding_size: u64 => Max,
    max_storage_buffer_binding_size: u64 => Max,
    min_uniform_buffer_offset_alignment: u32 => Alignment,
    min_storage_buffer_offset_alignment: u32 => Alignment,
    max_vertex_buffers: u32 => Max,
    max_buffer_size: u64 => Max,
    max_vertex_attributes: u32 => Max,
    max_vertex_buffer_array_stride: u32 => Max,
    max_inter_stage_shader_variables: u32 => Max,
    max_color_attachments: u32 => Max,
    max_color_attachment_bytes_per_sample: u32 => Max,
    max_compute_workgroup_storage_size: u32 => Max,
    max_compute_invocations_per_workgroup: u32 => Max,
    max_compute_workgroup_size_x: u32 => Max,
    max_compute_workgroup_size_y: u32 => Max,
    max_compute_workgroup_size_z: u32 => Max,
    max_compute_workgroups_per_dimension: u32 => Max,
    max_immediate_size: u32 => Max,
}

impl Default for Limits {
    fn default() -> Self {
        Self::undefined()
    }
}

impl Limits {
    /// 把物理设备的 limits 映射到对外的 limits
    pub fn from_native(limits: &vk::PhysicalDeviceLimits) -> Self {
        Self {
            max_texture_dimension_1d: limits.max_image_dimension1_d,
            max_texture_dimension_2d: limits.max_image_dimension2_d,
            max_texture_dimension_3d: limits.max_image_dimension3_d,
            max_texture_array_layers: limits.max_image_array_layers,
            max_bind_groups: limits.max_bound_descriptor_sets,
            max_bind_groups_plus_vertex_buffers: limits
                .max_bound_descriptor_sets
                .saturating_add(limits.max_vertex_input_bindings),
            max_bindings_per_bind_group: limits.max_descriptor_set_uniform_buffers,
            max_dynamic_uniform_buffers_per_pipeline_layout: limits.max_descriptor_set_uniform_buffers_dynamic,
            max_dynamic_storage_buffers_per_pipeline_layout: limits.max_descriptor_set_storage_buffers_dynamic,
            max_sampled_textures_per_shader_stage: limits.max_per_stage_descriptor_sampled_images,
            max_samplers_per_shader_stage: limits.max_per_stage_descriptor_samplers,
            max_storage_buffers_per_shader_stage: limits.max_per_stage_descriptor_storage_buffers,
            max_storage_textures_per_shader_stage: limits.max_per_stage_descriptor_storage_images,
            max_uniform_buffers_per_shader_stage: limits.max_per_stage_descriptor_uniform_buffers,
            max_uniform_buffer_binding_size: limits.max_uniform_buffer_range as u64,
            max_storage_buffer_binding_size: limits.max_storage_buffer_range as u64,
            min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment as u32,
            min_storage_buffer_offset_alignment: limits.min_storage_buffer_offset_alignment as u32,
            max_vertex_buffers: limits.max_vertex_input_bindings,
            max_buffer_size: ASSUMED_MAX_BUFFER_SIZE,
            max_vertex_attributes: limits.max_vertex_input_attributes,
            max_vertex_buffer_array_stride: limits.max_vertex_input_binding_stride,
            max_inter_stage_shader_variables: limits.max_fragment_input_components,
            max_color_attachments: limits.max_color_attachments,
            max_color_attachment_bytes_per_sample: limits.max_color_attachments.saturating_mul(32),
            max_compute_workgroup_storage_size: limits.max_compute_shared_memory_size,
            max_compute_invocations_per_workgroup: limits.max_compute_work_group_invocations,
            max_compute_workgroup_size_x: limits.max_compute_work_group_size[0],
            max_compute_workgroup_size_y: limits.max_compute_work_group_size[1],
            max_compute_workgroup_size_z: limits.max_compute_work_group_size[2],
            max_compute_workgroups_per_dimension: limits.max_compute_work_group_count.iter().copied().min().unwrap_or(0),
            max_immediate_size: MAX_IMMEDIATE_SIZE,
        }
    }

    /// 校验请求的 limits 是否在 `supported` 之内，遇到第一个违规项就返回
    ///
    /// 等于哨兵值的字段表示没有请求，直接跳过。
    pub fn check_against(&self, supported: &Limits) -> GfxResult<()> {
        for (name, class, requested, supported, undefined) in Self::entries(self, supported) {
            if requested == undefined {
                continue;
            }

            if requested > supported {
                return Err(GfxError::LimitExceeded {
                    name,
                    requested,
                    supported,
                });
            }

            if class == LimitClass::Alignment && !requested.is_power_of_two() {
                return Err(GfxError::LimitAlignment { name, requested });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter_limits() -> Limits {
        let mut native = vk::PhysicalDeviceLimits::default();
        native.max_image_dimension1_d = 100;
        native.min_uniform_buffer_offset_alignment = 256;
        native.min_storage_buffer_offset_alignment = 64;
        native.max_compute_work_group_count = [65535, 1024, 4096];
        native.max_bound_descriptor_sets = 8;
        native.max_vertex_input_bindings = 16;
        native.max_color_attachments = 8;
        Limits::from_native(&native)
    }

    #[test]
    fn native_mapping() {
        let limits = adapter_limits();
        assert_eq!(limits.max_compute_workgroups_per_dimension, 1024);
        assert_eq!(limits.max_bind_groups_plus_vertex_buffers, 24);
        assert_eq!(limits.max_color_attachment_bytes_per_sample, 256);
        assert_eq!(limits.max_buffer_size, ASSUMED_MAX_BUFFER_SIZE);
    }

    #[test]
    fn undefined_request_always_passes() {
        assert!(Limits::undefined().check_against(&adapter_limits()).is_ok());
    }

    #[test]
    fn max_class() {
        let supported = adapter_limits();
        let mut requested = Limits::undefined();

        requested.max_texture_dimension_1d = 101;
        assert!(matches!(
            requested.check_against(&supported),
            Err(GfxError::LimitExceeded {
                name: "max_texture_dimension_1d",
                requested: 101,
                supported: 100
            })
        ));

        requested.max_texture_dimension_1d = 100;
        assert!(requested.check_against(&supported).is_ok());
    }

    #[test]
    fn alignment_class() {
        let supported = adapter_limits();
        let mut requested = Limits::undefined();

        requested.min_uniform_buffer_offset_alignment = 255;
        assert!(matches!(requested.check_against(&supported), Err(GfxError::LimitAlignment { requested: 255, .. })));

        requested.min_uniform_buffer_offset_alignment = 256;
        assert!(requested.check_against(&supported).is_ok());

        requested.min_uniform_buffer_offset_alignment = 512;
        assert!(matches!(requested.check_against(&supported), Err(GfxError::LimitExceeded { requested: 512, .. })));
    }

    #[test]
    fn first_violation_wins() {
        let supported = adapter_limits();
        let mut requested = Limits::undefined();
        requested.max_bind_groups = 9;
        requested.min_storage_buffer_offset_alignment = 3;
        assert!(matches!(
            requested.check_against(&supported),
            Err(GfxError::LimitExceeded { name: "max_bind_groups", .. })
        ));
    }
}

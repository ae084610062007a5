//! `wgpu*` 形式的 C 导出函数
//!
//! 句柄就是 [`RefPtr`] 管理的对象指针：创建函数把唯一的一份引用交给调用方，
//! `AddRef` / `Release` 直接操作引用计数。内部错误在这里被折算成空句柄、
//! 状态码或者回调状态，并写入日志。

#![allow(non_snake_case)]

pub mod ffi;

mod device;
mod instance;

use crate::common::ref_counted::RefPtr;
use crate::error::GfxResult;
use crate::hal::vulkan::Vulkan;
use crate::types::Status;

use ffi::WGPUBool;

/// 把创建结果交给调用方，失败时记录日志并返回空句柄
fn into_handle<T>(what: &str, result: GfxResult<RefPtr<T>>) -> *const T {
    match result {
        Ok(object) => object.into_raw(),
        Err(e) => {
            log::error!("{}: {}", what, e);
            std::ptr::null()
        }
    }
}

fn into_status(what: &str, result: GfxResult<()>) -> u32 {
    match result {
        Ok(()) => Status::Success.to_raw(),
        Err(e) => {
            log::error!("{}: {}", what, e);
            Status::Error.to_raw()
        }
    }
}

#[inline]
fn bool32(value: bool) -> WGPUBool {
    value as WGPUBool
}

/// # Safety
/// 非空时必须是存活对象的句柄
unsafe fn add_ref<T>(what: &str, handle: *const T) {
    if handle.is_null() {
        log::error!("{}: handle is null", what);
        return;
    }
    unsafe { RefPtr::add_ref_raw(handle) }
}

/// # Safety
/// 非空时必须是存活对象的句柄，并且调用方持有一份引用
unsafe fn release<T>(what: &str, handle: *const T) {
    if handle.is_null() {
        log::error!("{}: handle is null", what);
        return;
    }
    unsafe { RefPtr::release_raw(handle) };
}

/// 为每一种对象导出 `AddRef` / `Release`
macro_rules! export_ref_counting {
    ($($ty:ty => $add_ref:ident, $release:ident;)*) => {
        $(
            /// # Safety
            /// `handle` 必须为空或者是存活对象的句柄
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $add_ref(handle: *const $ty) {
                unsafe { add_ref(stringify!($add_ref), handle) }
            }

            /// # Safety
            /// `handle` 必须为空或者是存活对象的句柄，调用方放弃自己持有的那一份引用
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $release(handle: *const $ty) {
                unsafe { release(stringify!($release), handle) }
            }
        )*
    };
}

export_ref_counting! {
    crate::instance::Instance<Vulkan> => wgpuInstanceAddRef, wgpuInstanceRelease;
    crate::adapter::Adapter<Vulkan> => wgpuAdapterAddRef, wgpuAdapterRelease;
    crate::device::Device<Vulkan> => wgpuDeviceAddRef, wgpuDeviceRelease;
    crate::resources::buffer::Buffer<Vulkan> => wgpuBufferAddRef, wgpuBufferRelease;
    crate::resources::texture::Texture<Vulkan> => wgpuTextureAddRef, wgpuTextureRelease;
    crate::resources::texture_view::TextureView<Vulkan> => wgpuTextureViewAddRef, wgpuTextureViewRelease;
    crate::resources::sampler::Sampler<Vulkan> => wgpuSamplerAddRef, wgpuSamplerRelease;
    crate::descriptors::bind_group_layout::BindGroupLayout<Vulkan> => wgpuBindGroupLayoutAddRef, wgpuBindGroupLayoutRelease;
    crate::descriptors::bind_group::BindGroup<Vulkan> => wgpuBindGroupAddRef, wgpuBindGroupRelease;
    crate::surface::Surface<Vulkan> => wgpuSurfaceAddRef, wgpuSurfaceRelease;
}

//! wgvk-gfx：在 Vulkan 之上实现的 WebGPU 风格接口
//!
//! # 分层
//! - [`common`]：引用计数（[`RefPtr`]）与弱观察（[`WeakPtr`]），所有对外对象都依赖它们
//! - [`adapter`]：能力协商。查询物理设备的 properties / features 链，推导对外的 feature 集合，驱动 device 创建
//! - [`device`]：资源工厂。持有逻辑设备与 vma 分配器，创建 buffer / texture / sampler / bind group
//! - [`future`]：完成协议。所有请求都在调用线程上同步完成，以 `IMMEDIATE` future 返回
//! - [`surface`]：只做能力查询的呈现桥
//! - [`abi`]：`wgpu*` 形式的 C 导出函数
//!
//! # 后端
//! 核心对象模型对 [`hal::Api`] 泛型，生产环境使用 [`hal::vulkan::Vulkan`]，
//! 测试使用进程内的 mock 后端。

pub mod abi;
pub mod adapter;
pub mod common;
pub mod conv;
pub mod descriptors;
pub mod device;
pub mod device_info;
pub mod error;
pub mod features;
pub mod foundation;
pub mod future;
pub mod hal;
pub mod instance;
pub mod limits;
pub mod resources;
pub mod surface;
pub mod types;

pub use adapter::Adapter;
pub use common::ref_counted::RefPtr;
pub use common::weak_ptr::{WeakPtr, WeakPtrFactory};
pub use descriptors::bind_group::BindGroup;
pub use descriptors::bind_group_layout::BindGroupLayout;
pub use device::Device;
pub use error::{GfxError, GfxResult};
pub use future::{Future, FutureWaitInfo};
pub use instance::Instance;
pub use limits::Limits;
pub use resources::buffer::Buffer;
pub use resources::sampler::Sampler;
pub use resources::texture::Texture;
pub use resources::texture_view::TextureView;
pub use surface::Surface;

//! 呈现桥：只负责 surface 的创建与能力查询，不创建 swapchain

use std::ffi::c_void;
use std::num::NonZeroIsize;
use std::ptr::NonNull;

use ash::vk;
use itertools::Itertools;
use parking_lot::Mutex;
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle, Win32WindowHandle,
    WindowsDisplayHandle, XlibDisplayHandle, XlibWindowHandle,
};

use crate::adapter::Adapter;
use crate::common::ref_counted::RefPtr;
use crate::common::weak_ptr::WeakPtr;
use crate::conv;
use crate::device::Device;
use crate::error::{GfxError, GfxResult};
use crate::hal::{Api, InstanceApi};
use crate::instance::Instance;
use crate::types::{CompositeAlphaMode, PresentMode, TextureFormat, TextureUsages};

/// 平台相关的窗口来源
#[derive(Debug, Clone, Copy)]
pub enum SurfaceSource {
    WindowsHwnd { hinstance: *mut c_void, hwnd: *mut c_void },
    Xlib { display: *mut c_void, window: u64 },
    Wayland { display: *mut c_void, surface: *mut c_void },
}

impl SurfaceSource {
    fn handles(&self) -> GfxResult<(RawDisplayHandle, RawWindowHandle)> {
        match *self {
            SurfaceSource::WindowsHwnd { hinstance, hwnd } => {
                let hwnd = NonZeroIsize::new(hwnd as isize).ok_or(GfxError::NullArgument("hwnd"))?;
                let mut window = Win32WindowHandle::new(hwnd);
                window.hinstance = NonZeroIsize::new(hinstance as isize);
                Ok((RawDisplayHandle::Windows(WindowsDisplayHandle::new()), RawWindowHandle::Win32(window)))
            }
            SurfaceSource::Xlib { display, window } => {
                if window == 0 {
                    return Err(GfxError::NullArgument("window"));
                }
                let display = NonNull::new(display).ok_or(GfxError::NullArgument("display"))?;
                Ok((
                    RawDisplayHandle::Xlib(XlibDisplayHandle::new(Some(display), 0)),
                    RawWindowHandle::Xlib(XlibWindowHandle::new(window as _)),
                ))
            }
            SurfaceSource::Wayland { display, surface } => {
                let display = NonNull::new(display).ok_or(GfxError::NullArgument("display"))?;
                let surface = NonNull::new(surface).ok_or(GfxError::NullArgument("surface"))?;
                Ok((
                    RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display)),
                    RawWindowHandle::Wayland(WaylandWindowHandle::new(surface)),
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub usages: TextureUsages,
    pub formats: Vec<TextureFormat>,
    pub present_modes: Vec<PresentMode>,
    pub alpha_modes: Vec<CompositeAlphaMode>,
}

pub struct SurfaceConfiguration<A: Api> {
    /// 只观察，不延长 device 的生命周期
    pub device: WeakPtr<Device<A>>,
    pub format: TextureFormat,
    pub usage: TextureUsages,
    pub width: u32,
    pub height: u32,
    pub present_mode: PresentMode,
    pub alpha_mode: CompositeAlphaMode,
}

impl<A: Api> Clone for SurfaceConfiguration<A> {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            format: self.format,
            usage: self.usage,
            width: self.width,
            height: self.height,
            present_mode: self.present_mode,
            alpha_mode: self.alpha_mode,
        }
    }
}

pub struct Surface<A: Api> {
    raw: vk::SurfaceKHR,
    label: Mutex<String>,
    config: Mutex<Option<SurfaceConfiguration<A>>>,

    instance: RefPtr<Instance<A>>,
}

// new & init
impl<A: Api> Surface<A> {
    pub(crate) fn new(instance: RefPtr<Instance<A>>, source: &SurfaceSource, label: &str) -> GfxResult<RefPtr<Self>> {
        let (display, window) = source.handles()?;
        let raw = unsafe { instance.raw().create_surface(display, window)? };
        log::info!("created surface {:?} from {:?}", label, display);

        Ok(RefPtr::new(Self {
            raw,
            label: Mutex::new(label.to_string()),
            config: Mutex::new(None),
            instance,
        }))
    }
}

// destroy
impl<A: Api> Drop for Surface<A> {
    fn drop(&mut self) {
        log::info!("destroying surface {:?}", self.label.get_mut());
        unsafe { self.instance.raw().destroy_surface(self.raw) }
    }
}

// tools
impl<A: Api> Surface<A> {
    /// 查询 surface 在 adapter 上支持的 usage / format / present mode / alpha mode
    ///
    /// 不在对外格式集合中的 native 格式与 present mode 被丢弃
    pub fn get_capabilities(&self, adapter: &Adapter<A>) -> GfxResult<SurfaceCapabilities> {
        let raw = self.instance.raw();
        let pdevice = adapter.raw();

        let caps = unsafe { raw.get_surface_capabilities(pdevice, self.raw)? };
        let formats = unsafe { raw.get_surface_formats(pdevice, self.raw)? };
        let present_modes = unsafe { raw.get_surface_present_modes(pdevice, self.raw)? };

        Ok(SurfaceCapabilities {
            usages: conv::map_vk_image_usage(caps.supported_usage_flags),
            formats: formats.iter().filter_map(|f| conv::map_vk_surface_format(f.format)).unique().collect(),
            present_modes: present_modes.iter().filter_map(|m| conv::map_vk_present_mode(*m)).unique().collect(),
            alpha_modes: conv::map_vk_composite_alpha(caps.supported_composite_alpha),
        })
    }

    /// 只记录配置，不创建 swapchain
    pub fn configure(
        &self,
        device: &Device<A>,
        format: TextureFormat,
        usage: TextureUsages,
        (width, height): (u32, u32),
        present_mode: PresentMode,
        alpha_mode: CompositeAlphaMode,
    ) -> GfxResult<()> {
        if device.is_destroyed() {
            return Err(GfxError::DeviceDestroyed);
        }
        if format == TextureFormat::Undefined {
            return Err(GfxError::Validation("surface format is undefined".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(GfxError::Validation(format!("surface size {}x{} is empty", width, height)));
        }

        *self.config.lock() = Some(SurfaceConfiguration {
            device: device.weak_ptr(),
            format,
            usage,
            width,
            height,
            present_mode,
            alpha_mode,
        });
        Ok(())
    }

    pub fn unconfigure(&self) {
        self.config.lock().take();
    }
}

// getters
impl<A: Api> Surface<A> {
    #[inline]
    pub fn raw(&self) -> vk::SurfaceKHR {
        self.raw
    }

    #[inline]
    pub fn instance(&self) -> &RefPtr<Instance<A>> {
        &self.instance
    }

    pub fn configuration(&self) -> Option<SurfaceConfiguration<A>> {
        self.config.lock().clone()
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
    use crate::hal::mock::{Fixture, Mock, MockEvent, MockInstance};

    fn xlib() -> SurfaceSource {
        SurfaceSource::Xlib {
            display: 0x1000 as *mut c_void,
            window: 7,
        }
    }

    #[test]
    fn capabilities_are_restricted_to_the_public_sets() {
        let mut fixture = Fixture::discrete("gpu");
        fixture.surface.formats.push(vk::Format::B8G8R8A8_SRGB);
        let (raw, _state) = MockInstance::new(vec![fixture]);
        let instance = Instance::<Mock>::from_raw(raw);
        let adapter = instance.select_adapter(&Default::default()).unwrap();
        let surface = instance.create_surface(&xlib(), "main").unwrap();

        let caps = surface.get_capabilities(&adapter).unwrap();
        assert_eq!(caps.usages, TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_DST);
        assert_eq!(caps.formats, vec![TextureFormat::BGRA8UnormSrgb]);
        assert_eq!(caps.present_modes, vec![PresentMode::Fifo]);
        assert_eq!(caps.alpha_modes, vec![CompositeAlphaMode::Opaque]);
    }

    #[test]
    fn null_window_token_creates_nothing() {
        let (raw, state) = MockInstance::new(vec![Fixture::discrete("gpu")]);
        let instance = Instance::<Mock>::from_raw(raw);
        let wayland = SurfaceSource::Wayland {
            display: std::ptr::null_mut(),
            surface: 0x10 as *mut c_void,
        };
        let hwnd = SurfaceSource::WindowsHwnd {
            hinstance: std::ptr::null_mut(),
            hwnd: std::ptr::null_mut(),
        };
        assert!(matches!(instance.create_surface(&wayland, ""), Err(GfxError::NullArgument("display"))));
        assert!(matches!(instance.create_surface(&hwnd, ""), Err(GfxError::NullArgument("hwnd"))));
        assert_eq!(state.count(|e| matches!(e, MockEvent::CreateSurface(_))), 0);
    }

    #[test]
    fn surface_keeps_instance_alive() {
        let (raw, state) = MockInstance::new(vec![Fixture::discrete("gpu")]);
        let instance = Instance::<Mock>::from_raw(raw);
        let surface = instance.create_surface(&xlib(), "main").unwrap();
        drop(instance);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyInstance)), 0);

        drop(surface);
        let surface_at = state.position(|e| matches!(e, MockEvent::DestroySurface(_))).unwrap();
        let instance_at = state.position(|e| matches!(e, MockEvent::DestroyInstance)).unwrap();
        assert!(surface_at < instance_at);
    }

    #[test]
    fn configuration_observes_the_device_weakly() {
        let (raw, _state) = MockInstance::new(vec![Fixture::discrete("gpu")]);
        let instance = Instance::<Mock>::from_raw(raw);
        let adapter = instance.select_adapter(&Default::default()).unwrap();
        let device = adapter.create_device(Default::default()).unwrap();
        let surface = instance.create_surface(&xlib(), "main").unwrap();

        surface
            .configure(
                &device,
                TextureFormat::BGRA8UnormSrgb,
                TextureUsages::RENDER_ATTACHMENT,
                (800, 600),
                PresentMode::Fifo,
                CompositeAlphaMode::Opaque,
            )
            .unwrap();
        let config = surface.configuration().unwrap();
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.device.is_valid());

        device.destroy();
        assert!(!surface.configuration().unwrap().device.is_valid());

        surface.unconfigure();
        assert!(surface.configuration().is_none());
    }

    #[test]
    fn configure_rejects_empty_size() {
        let (raw, _state) = MockInstance::new(vec![Fixture::discrete("gpu")]);
        let instance = Instance::<Mock>::from_raw(raw);
        let device = instance.select_adapter(&Default::default()).unwrap().create_device(Default::default()).unwrap();
        let surface = instance.create_surface(&xlib(), "").unwrap();
        let result = surface.configure(
            &device,
            TextureFormat::BGRA8Unorm,
            TextureUsages::RENDER_ATTACHMENT,
            (0, 600),
            PresentMode::Fifo,
            CompositeAlphaMode::Auto,
        );
        assert!(matches!(result, Err(GfxError::Validation(_))));
        assert!(surface.configuration().is_none());
    }
}

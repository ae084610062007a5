use ash::vk;
use parking_lot::Mutex;

use crate::common::ref_counted::RefPtr;
use crate::conv;
use crate::error::{GfxError, GfxResult};
use crate::hal::{Api, DeviceApi};
use crate::resources::texture::Texture;
use crate::types::{TextureAspect, TextureDimension, TextureFormat, TextureUsages, TextureViewDimension};

/// mip / layer 数量的哨兵值：一直延伸到纹理末尾
pub const COUNT_UNDEFINED: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct TextureViewDescriptor {
    pub label: String,
    /// `Undefined` 表示沿用纹理的格式
    pub format: TextureFormat,
    /// `Undefined` 表示由纹理推导
    pub dimension: TextureViewDimension,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
    pub aspect: TextureAspect,
    /// 为空表示沿用纹理的 usage
    pub usage: TextureUsages,
}

impl Default for TextureViewDescriptor {
    fn default() -> Self {
        Self {
            label: String::new(),
            format: TextureFormat::Undefined,
            dimension: TextureViewDimension::Undefined,
            base_mip_level: 0,
            mip_level_count: COUNT_UNDEFINED,
            base_array_layer: 0,
            array_layer_count: COUNT_UNDEFINED,
            aspect: TextureAspect::All,
            usage: TextureUsages::empty(),
        }
    }
}

/// 把描述中未指定的部分用纹理补全之后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedView {
    format: TextureFormat,
    dimension: TextureViewDimension,
    aspect: vk::ImageAspectFlags,
    base_mip_level: u32,
    mip_level_count: u32,
    base_array_layer: u32,
    array_layer_count: u32,
    usage: TextureUsages,
}

fn resolve<A: Api>(texture: &Texture<A>, descriptor: &TextureViewDescriptor) -> GfxResult<ResolvedView> {
    let fail = |what: String| Err(GfxError::Validation(format!("texture view {:?}: {}", descriptor.label, what)));

    let format = match descriptor.format {
        TextureFormat::Undefined => texture.format(),
        format => format,
    };
    if format != texture.format() && !texture.view_formats().contains(&format) {
        return fail(format!("format {:?} is not in the texture's view formats", format));
    }

    let mips = texture.mip_level_count();
    if descriptor.base_mip_level >= mips {
        return fail(format!("base mip level {} out of {}", descriptor.base_mip_level, mips));
    }
    let mip_level_count = match descriptor.mip_level_count {
        COUNT_UNDEFINED => mips - descriptor.base_mip_level,
        count => count,
    };
    if mip_level_count == 0 || descriptor.base_mip_level + mip_level_count > mips {
        return fail(format!("mip range {}+{} out of {}", descriptor.base_mip_level, mip_level_count, mips));
    }

    let layers = texture.array_layer_count();
    if descriptor.base_array_layer >= layers {
        return fail(format!("base array layer {} out of {}", descriptor.base_array_layer, layers));
    }
    let array_layer_count = match descriptor.array_layer_count {
        COUNT_UNDEFINED => match descriptor.dimension {
            TextureViewDimension::D1 | TextureViewDimension::D2 | TextureViewDimension::D3 => 1,
            TextureViewDimension::Cube => 6,
            _ => layers - descriptor.base_array_layer,
        },
        count => count,
    };
    if array_layer_count == 0 || descriptor.base_array_layer + array_layer_count > layers {
        return fail(format!(
            "layer range {}+{} out of {}",
            descriptor.base_array_layer, array_layer_count, layers
        ));
    }

    let dimension = match (descriptor.dimension, texture.dimension()) {
        (TextureViewDimension::Undefined, TextureDimension::D1) => TextureViewDimension::D1,
        (TextureViewDimension::Undefined, TextureDimension::D3) => TextureViewDimension::D3,
        (TextureViewDimension::Undefined, _) if array_layer_count == 1 => TextureViewDimension::D2,
        (TextureViewDimension::Undefined, _) => TextureViewDimension::D2Array,
        (dimension, _) => dimension,
    };

    let aspect = conv::map_aspects(format, descriptor.aspect);
    if aspect.is_empty() {
        return fail(format!("aspect {:?} does not exist in {:?}", descriptor.aspect, format));
    }

    let usage = if descriptor.usage.is_empty() { texture.usage() } else { descriptor.usage };
    if !texture.usage().contains(usage) {
        return fail(format!("usage {:?} is not a subset of the texture's usage", usage));
    }

    Ok(ResolvedView {
        format,
        dimension,
        aspect,
        base_mip_level: descriptor.base_mip_level,
        mip_level_count,
        base_array_layer: descriptor.base_array_layer,
        array_layer_count,
        usage,
    })
}

pub struct TextureView<A: Api> {
    raw: vk::ImageView,
    view: ResolvedView,
    label: Mutex<String>,

    texture: RefPtr<Texture<A>>,
}

// new & init
impl<A: Api> TextureView<A> {
    pub(crate) fn new(texture: RefPtr<Texture<A>>, descriptor: &TextureViewDescriptor) -> GfxResult<RefPtr<Self>> {
        let image = texture.raw().ok_or(GfxError::ObjectDestroyed)?;
        let view = resolve(&texture, descriptor)?;

        let view_ci = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(conv::map_view_dimension(view.dimension))
            .format(conv::map_texture_format(view.format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: view.aspect,
                base_mip_level: view.base_mip_level,
                level_count: view.mip_level_count,
                base_array_layer: view.base_array_layer,
                layer_count: view.array_layer_count,
            });
        let raw = texture.device().with_raw(|raw| unsafe { raw.create_image_view(&view_ci) })?;

        Ok(RefPtr::new(Self {
            raw,
            view,
            label: Mutex::new(descriptor.label.clone()),
            texture,
        }))
    }
}

impl<A: Api> Drop for TextureView<A> {
    fn drop(&mut self) {
        let view = self.raw;
        self.texture.device().release_with("texture view", |raw| unsafe { raw.destroy_image_view(view) });
    }
}

// getters
impl<A: Api> TextureView<A> {
    #[inline]
    pub fn raw(&self) -> vk::ImageView {
        self.raw
    }

    #[inline]
    pub fn texture(&self) -> &RefPtr<Texture<A>> {
        &self.texture
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.view.format
    }

    #[inline]
    pub fn dimension(&self) -> TextureViewDimension {
        self.view.dimension
    }

    #[inline]
    pub fn usage(&self) -> TextureUsages {
        self.view.usage
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
    use crate::hal::mock::{self, Fixture, MockEvent};
    use crate::resources::texture::{Extent3d, TextureDescriptor};

    type CreatedView = (vk::ImageViewType, vk::ImageAspectFlags, u32, u32, u32, u32);

    fn last_view(state: &mock::MockState) -> CreatedView {
        state
            .events()
            .into_iter()
            .rev()
            .find_map(|e| match e {
                MockEvent::CreateImageView {
                    view_type,
                    aspect,
                    base_mip_level,
                    level_count,
                    base_array_layer,
                    layer_count,
                    ..
                } => Some((view_type, aspect, base_mip_level, level_count, base_array_layer, layer_count)),
                _ => None,
            })
            .unwrap()
    }

    fn texture(
        format: TextureFormat,
        layers: u32,
        mips: u32,
    ) -> (RefPtr<Texture<mock::Mock>>, std::sync::Arc<mock::MockState>) {
        let (device, state) = mock::device(Fixture::discrete("gpu"), Default::default());
        let texture = device
            .create_texture(&TextureDescriptor {
                usage: TextureUsages::TEXTURE_BINDING | TextureUsages::RENDER_ATTACHMENT,
                size: Extent3d {
                    width: 64,
                    height: 64,
                    depth_or_array_layers: layers,
                },
                format,
                mip_level_count: mips,
                ..Default::default()
            })
            .unwrap();
        (texture, state)
    }

    #[test]
    fn default_view_covers_the_whole_texture() {
        let (texture, state) = texture(TextureFormat::RGBA8Unorm, 1, 4);
        let view = texture.create_view(None).unwrap();
        assert_eq!(view.format(), TextureFormat::RGBA8Unorm);
        assert_eq!(view.dimension(), TextureViewDimension::D2);
        assert_eq!(last_view(&state), (vk::ImageViewType::TYPE_2D, vk::ImageAspectFlags::COLOR, 0, 4, 0, 1));
    }

    #[test]
    fn layered_texture_defaults_to_an_array_view() {
        let (texture, state) = texture(TextureFormat::RGBA8Unorm, 4, 1);
        let view = texture.create_view(None).unwrap();
        assert_eq!(view.dimension(), TextureViewDimension::D2Array);
        assert_eq!(last_view(&state).5, 4);

        let cube = texture.create_view(Some(&TextureViewDescriptor {
            dimension: TextureViewDimension::Cube,
            ..Default::default()
        }));
        // 4 层不足以组成 cube
        assert!(matches!(cube, Err(GfxError::Validation(_))));
    }

    #[test]
    fn depth_only_aspect_of_a_depth_stencil_texture() {
        let (texture, state) = texture(TextureFormat::Depth24PlusStencil8, 1, 1);
        let _all = texture.create_view(None).unwrap();
        assert_eq!(last_view(&state).1, vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);

        let _depth = texture
            .create_view(Some(&TextureViewDescriptor {
                aspect: TextureAspect::DepthOnly,
                ..Default::default()
            }))
            .unwrap();
        assert_eq!(last_view(&state).1, vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn out_of_range_subresources_are_rejected() {
        let (texture, state) = texture(TextureFormat::RGBA8Unorm, 1, 2);
        let too_many_mips = TextureViewDescriptor {
            base_mip_level: 1,
            mip_level_count: 2,
            ..Default::default()
        };
        let foreign_format = TextureViewDescriptor {
            format: TextureFormat::BGRA8Unorm,
            ..Default::default()
        };
        let stencil_of_color = TextureViewDescriptor {
            aspect: TextureAspect::StencilOnly,
            ..Default::default()
        };
        assert!(texture.create_view(Some(&too_many_mips)).is_err());
        assert!(texture.create_view(Some(&foreign_format)).is_err());
        assert!(texture.create_view(Some(&stencil_of_color)).is_err());
        assert_eq!(state.count(|e| matches!(e, MockEvent::CreateImageView { .. })), 0);
    }

    #[test]
    fn view_keeps_its_texture_alive() {
        let (texture, state) = texture(TextureFormat::RGBA8Unorm, 1, 1);
        let view = texture.create_view(None).unwrap();
        drop(texture);
        assert_eq!(state.count(|e| matches!(e, MockEvent::DestroyImage(_))), 0);

        drop(view);
        let view_at = state.position(|e| matches!(e, MockEvent::DestroyImageView(_))).unwrap();
        let image_at = state.position(|e| matches!(e, MockEvent::DestroyImage(_))).unwrap();
        assert!(view_at < image_at);
    }

    #[test]
    fn destroyed_texture_cannot_be_viewed() {
        let (texture, _state) = texture(TextureFormat::RGBA8Unorm, 1, 1);
        texture.destroy();
        assert!(matches!(texture.create_view(None), Err(GfxError::ObjectDestroyed)));
    }
}

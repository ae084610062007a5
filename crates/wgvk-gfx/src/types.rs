//! 对外暴露的枚举与位标志
//!
//! 数值与 `webgpu.h` 保持一致，C ABI 直接以 `u32` / `u64` 传递。

use bitflags::bitflags;

/// 定义一个 `#[repr(u32)]` 枚举，并提供 `from_raw` 与 `ALL`
macro_rules! webgpu_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr,)*
        }
    ) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $(x if x == $value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            #[inline]
            pub const fn to_raw(self) -> u32 {
                self as u32
            }
        }
    };
}

webgpu_enum! {
    pub enum Status {
        Success = 0x1,
        Error = 0x2,
    }
}

webgpu_enum! {
    pub enum RequestAdapterStatus {
        Success = 0x1,
        CallbackCancelled = 0x2,
        Unavailable = 0x3,
        Error = 0x4,
    }
}

webgpu_enum! {
    pub enum RequestDeviceStatus {
        Success = 0x1,
        CallbackCancelled = 0x2,
        Error = 0x3,
    }
}

webgpu_enum! {
    pub enum WaitStatus {
        Success = 0x1,
        TimedOut = 0x2,
        Error = 0x3,
    }
}

webgpu_enum! {
    pub enum CallbackMode {
        WaitAnyOnly = 0x1,
        AllowProcessEvents = 0x2,
        AllowSpontaneous = 0x3,
    }
}

webgpu_enum! {
    pub enum DeviceLostReason {
        Unknown = 0x1,
        Destroyed = 0x2,
        CallbackCancelled = 0x3,
        FailedCreation = 0x4,
    }
}

webgpu_enum! {
    pub enum ErrorType {
        NoError = 0x1,
        Validation = 0x2,
        OutOfMemory = 0x3,
        Internal = 0x4,
        Unknown = 0x5,
    }
}

webgpu_enum! {
    pub enum BackendType {
        Undefined = 0x0,
        Null = 0x1,
        WebGPU = 0x2,
        D3D11 = 0x3,
        D3D12 = 0x4,
        Metal = 0x5,
        Vulkan = 0x6,
        OpenGL = 0x7,
        OpenGLES = 0x8,
    }
}

webgpu_enum! {
    pub enum AdapterType {
        DiscreteGPU = 0x1,
        IntegratedGPU = 0x2,
        CPU = 0x3,
        Unknown = 0x4,
    }
}

webgpu_enum! {
    pub enum PowerPreference {
        Undefined = 0x0,
        LowPower = 0x1,
        HighPerformance = 0x2,
    }
}

impl Default for PowerPreference {
    fn default() -> Self {
        Self::Undefined
    }
}

webgpu_enum! {
    pub enum FeatureLevel {
        Undefined = 0x0,
        Compatibility = 0x1,
        Core = 0x2,
    }
}

webgpu_enum! {
    pub enum InstanceFeatureName {
        TimedWaitAny = 0x1,
        ShaderSourceSPIRV = 0x2,
        MultipleDevicesPerAdapter = 0x3,
    }
}

webgpu_enum! {
    /// adapter / device 可以暴露的能力
    pub enum FeatureName {
        CoreFeaturesAndLimits = 0x01,
        DepthClipControl = 0x02,
        Depth32FloatStencil8 = 0x03,
        TextureCompressionBC = 0x04,
        TextureCompressionBCSliced3D = 0x05,
        TextureCompressionETC2 = 0x06,
        TextureCompressionASTC = 0x07,
        TextureCompressionASTCSliced3D = 0x08,
        TimestampQuery = 0x09,
        IndirectFirstInstance = 0x0A,
        ShaderF16 = 0x0B,
        RG11B10UfloatRenderable = 0x0C,
        BGRA8UnormStorage = 0x0D,
        Float32Filterable = 0x0E,
        Float32Blendable = 0x0F,
        ClipDistances = 0x10,
        DualSourceBlending = 0x11,
        Subgroups = 0x12,
        TextureFormatsTier1 = 0x13,
        TextureFormatsTier2 = 0x14,
        PrimitiveIndex = 0x15,
        TextureComponentSwizzle = 0x16,
    }
}

webgpu_enum! {
    pub enum TextureDimension {
        Undefined = 0x0,
        D1 = 0x1,
        D2 = 0x2,
        D3 = 0x3,
    }
}

webgpu_enum! {
    pub enum TextureViewDimension {
        Undefined = 0x0,
        D1 = 0x1,
        D2 = 0x2,
        D2Array = 0x3,
        Cube = 0x4,
        CubeArray = 0x5,
        D3 = 0x6,
    }
}

webgpu_enum! {
    pub enum TextureAspect {
        Undefined = 0x0,
        All = 0x1,
        StencilOnly = 0x2,
        DepthOnly = 0x3,
    }
}

webgpu_enum! {
    pub enum TextureFormat {
        Undefined = 0x00,
        R8Unorm = 0x01,
        R8Snorm = 0x02,
        R8Uint = 0x03,
        R8Sint = 0x04,
        R16Uint = 0x05,
        R16Sint = 0x06,
        R16Float = 0x07,
        RG8Unorm = 0x08,
        RG8Snorm = 0x09,
        RG8Uint = 0x0A,
        RG8Sint = 0x0B,
        R32Float = 0x0C,
        R32Uint = 0x0D,
        R32Sint = 0x0E,
        RG16Uint = 0x0F,
        RG16Sint = 0x10,
        RG16Float = 0x11,
        RGBA8Unorm = 0x12,
        RGBA8UnormSrgb = 0x13,
        RGBA8Snorm = 0x14,
        RGBA8Uint = 0x15,
        RGBA8Sint = 0x16,
        BGRA8Unorm = 0x17,
        BGRA8UnormSrgb = 0x18,
        RGB10A2Uint = 0x19,
        RGB10A2Unorm = 0x1A,
        RG11B10Ufloat = 0x1B,
        RGB9E5Ufloat = 0x1C,
        RG32Float = 0x1D,
        RG32Uint = 0x1E,
        RG32Sint = 0x1F,
        RGBA16Uint = 0x20,
        RGBA16Sint = 0x21,
        RGBA16Float = 0x22,
        RGBA32Float = 0x23,
        RGBA32Uint = 0x24,
        RGBA32Sint = 0x25,
        Stencil8 = 0x26,
        Depth16Unorm = 0x27,
        Depth24Plus = 0x28,
        Depth24PlusStencil8 = 0x29,
        Depth32Float = 0x2A,
        Depth32FloatStencil8 = 0x2B,
        BC1RGBAUnorm = 0x2C,
        BC1RGBAUnormSrgb = 0x2D,
        BC2RGBAUnorm = 0x2E,
        BC2RGBAUnormSrgb = 0x2F,
        BC3RGBAUnorm = 0x30,
        BC3RGBAUnormSrgb = 0x31,
        BC4RUnorm = 0x32,
        BC4RSnorm = 0x33,
        BC5RGUnorm = 0x34,
        BC5RGSnorm = 0x35,
        BC6HRGBUfloat = 0x36,
        BC6HRGBFloat = 0x37,
        BC7RGBAUnorm = 0x38,
        BC7RGBAUnormSrgb = 0x39,
    }
}

impl TextureFormat {
    /// 是否包含 depth 或 stencil 分量
    pub fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            Self::Stencil8
                | Self::Depth16Unorm
                | Self::Depth24Plus
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    pub fn has_depth(self) -> bool {
        self.is_depth_stencil() && self != Self::Stencil8
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Stencil8 | Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }
}

webgpu_enum! {
    pub enum AddressMode {
        Undefined = 0x0,
        ClampToEdge = 0x1,
        Repeat = 0x2,
        MirrorRepeat = 0x3,
    }
}

webgpu_enum! {
    pub enum FilterMode {
        Undefined = 0x0,
        Nearest = 0x1,
        Linear = 0x2,
    }
}

webgpu_enum! {
    pub enum MipmapFilterMode {
        Undefined = 0x0,
        Nearest = 0x1,
        Linear = 0x2,
    }
}

webgpu_enum! {
    pub enum CompareFunction {
        Undefined = 0x0,
        Never = 0x1,
        Less = 0x2,
        Equal = 0x3,
        LessEqual = 0x4,
        Greater = 0x5,
        NotEqual = 0x6,
        GreaterEqual = 0x7,
        Always = 0x8,
    }
}

webgpu_enum! {
    pub enum BufferBindingType {
        BindingNotUsed = 0x0,
        Undefined = 0x1,
        Uniform = 0x2,
        Storage = 0x3,
        ReadOnlyStorage = 0x4,
    }
}

webgpu_enum! {
    pub enum SamplerBindingType {
        BindingNotUsed = 0x0,
        Undefined = 0x1,
        Filtering = 0x2,
        NonFiltering = 0x3,
        Comparison = 0x4,
    }
}

webgpu_enum! {
    pub enum TextureSampleType {
        BindingNotUsed = 0x0,
        Undefined = 0x1,
        Float = 0x2,
        UnfilterableFloat = 0x3,
        Depth = 0x4,
        Sint = 0x5,
        Uint = 0x6,
    }
}

webgpu_enum! {
    pub enum StorageTextureAccess {
        BindingNotUsed = 0x0,
        Undefined = 0x1,
        WriteOnly = 0x2,
        ReadOnly = 0x3,
        ReadWrite = 0x4,
    }
}

webgpu_enum! {
    pub enum PresentMode {
        Undefined = 0x0,
        Fifo = 0x1,
        FifoRelaxed = 0x2,
        Immediate = 0x3,
        Mailbox = 0x4,
    }
}

webgpu_enum! {
    pub enum CompositeAlphaMode {
        Auto = 0x0,
        Opaque = 0x1,
        Premultiplied = 0x2,
        Unpremultiplied = 0x3,
        Inherit = 0x4,
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsages: u64 {
        const MAP_READ = 0x0001;
        const MAP_WRITE = 0x0002;
        const COPY_SRC = 0x0004;
        const COPY_DST = 0x0008;
        const INDEX = 0x0010;
        const VERTEX = 0x0020;
        const UNIFORM = 0x0040;
        const STORAGE = 0x0080;
        const INDIRECT = 0x0100;
        const QUERY_RESOLVE = 0x0200;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsages: u64 {
        const COPY_SRC = 0x01;
        const COPY_DST = 0x02;
        const TEXTURE_BINDING = 0x04;
        const STORAGE_BINDING = 0x08;
        const RENDER_ATTACHMENT = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStages: u64 {
        const VERTEX = 0x1;
        const FRAGMENT = 0x2;
        const COMPUTE = 0x4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_matches_discriminant() {
        for feature in FeatureName::ALL {
            assert_eq!(FeatureName::from_raw(feature.to_raw()), Some(*feature));
        }
        assert_eq!(FeatureName::from_raw(0), None);
        assert_eq!(TextureFormat::from_raw(0x2B), Some(TextureFormat::Depth32FloatStencil8));
    }

    #[test]
    fn depth_stencil_classification() {
        assert!(TextureFormat::Depth24PlusStencil8.has_depth());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Stencil8.has_depth());
        assert!(!TextureFormat::RGBA8Unorm.is_depth_stencil());
    }
}

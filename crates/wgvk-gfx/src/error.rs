use ash::vk;

use crate::types::FeatureName;

/// 兼容层内部的错误
///
/// 对外不会以 panic 的形式出现：C ABI 会把它折算成状态码、空句柄或回调状态。
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("{0} is null")]
    NullArgument(&'static str),

    #[error("{0}: chained structs are not supported here")]
    UnsupportedChain(&'static str),

    #[error("limit {name} requested {requested}, adapter supports {supported}")]
    LimitExceeded {
        name: &'static str,
        requested: u64,
        supported: u64,
    },

    #[error("limit {name} requested {requested}, which is not a power of two")]
    LimitAlignment { name: &'static str, requested: u64 },

    #[error("feature {0:?} is not supported by the adapter")]
    FeatureUnsupported(FeatureName),

    #[error("no queue family supports both graphics and compute")]
    NoSuitableQueue,

    #[error("no adapters found")]
    NoAdapter,

    #[error("the device has been destroyed")]
    DeviceDestroyed,

    #[error("the object has been destroyed")]
    ObjectDestroyed,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("vulkan error: {0}")]
    Native(#[from] vk::Result),

    #[error("failed to load the vulkan loader: {0}")]
    Loader(String),
}

pub type GfxResult<T> = Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_errors_convert() {
        fn create() -> GfxResult<()> {
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)?
        }
        assert!(matches!(create(), Err(GfxError::Native(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))));
    }

    #[test]
    fn messages_name_the_limit() {
        let err = GfxError::LimitExceeded {
            name: "max_bind_groups",
            requested: 9,
            supported: 8,
        };
        assert_eq!(err.to_string(), "limit max_bind_groups requested 9, adapter supports 8");
    }
}

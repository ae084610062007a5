pub mod buffer;
pub mod sampler;
pub mod texture;
pub mod texture_view;

//! wgvk 工具集
//!
//! 提供日志初始化、TOML 配置加载、命名数组等通用工具。
//!
//! # GfxConfig
//! 兼容层的运行时配置，通过环境变量 `WGVK_CONFIG` 指向的 TOML 文件加载，
//! 未设置时使用默认值。

pub mod config;
pub mod init_log;
pub mod named_array;

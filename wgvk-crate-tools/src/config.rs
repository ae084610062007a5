use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 指向配置文件的环境变量
pub const CONFIG_ENV: &str = "WGVK_CONFIG";

/// 兼容层的运行时配置
///
/// 所有字段都有默认值，配置文件里只需要写想要覆盖的部分。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfxConfig {
    /// 是否开启 validation layer 以及 debug utils
    pub validation: bool,

    /// debug messenger 关心的消息等级：verbose / info / warning / error
    pub debug_severity: Vec<String>,

    /// 日志等级：off / error / warn / info / debug / trace
    pub log_level: String,

    /// 写入 VkApplicationInfo 的应用名
    pub application_name: String,
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            debug_severity: vec!["warning".to_string(), "error".to_string()],
            log_level: "info".to_string(),
            application_name: "wgvk".to_string(),
        }
    }
}

impl GfxConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;

        Self::from_toml_str(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 读取 `WGVK_CONFIG` 指向的配置文件；环境变量不存在时使用默认配置
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        fs::write(path.as_ref(), content).with_context(|| format!("写入配置文件失败: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// 解析日志等级，无法识别时退回 Info
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    #[inline]
    pub fn wants_severity(&self, severity: &str) -> bool {
        self.debug_severity.iter().any(|s| s.eq_ignore_ascii_case(severity))
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub audit: AuditPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 上传请求体上限 (MB)
    pub max_upload_mb: usize,
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            max_upload_mb: 25,
        }
    }
}

/// 外部能力 (Gemini) 配置
#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// 仅当存在非空密钥时才启用远程能力
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 30,
        }
    }
}

// 密钥不进日志
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("configured", &self.is_configured())
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// 审计规则参数
///
/// `amount_tolerance` 同时用于金额超限规则和匹配评分的金额维度。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPolicy {
    pub amount_tolerance: f64,
    pub tax_tolerance: f64,
    pub gst_rate: f64,
    pub min_gst_length: usize,
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self {
            amount_tolerance: 0.10,
            tax_tolerance: 1000.0,
            gst_rate: 0.18,
            min_gst_length: 15,
        }
    }
}

impl AppConfig {
    /// 加载配置：默认值 -> verifix.toml (可选) -> VERIFIX_* 环境变量 -> GEMINI_API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();

        let settings = config::Config::builder()
            .set_default("server.host", defaults.server.host.clone())?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.max_upload_mb", defaults.server.max_upload_mb as i64)?
            .set_default("gemini.model", defaults.gemini.model.clone())?
            .set_default("gemini.endpoint", defaults.gemini.endpoint.clone())?
            .set_default("gemini.timeout_secs", defaults.gemini.timeout_secs as i64)?
            .set_default("audit.amount_tolerance", defaults.audit.amount_tolerance)?
            .set_default("audit.tax_tolerance", defaults.audit.tax_tolerance)?
            .set_default("audit.gst_rate", defaults.audit.gst_rate)?
            .set_default("audit.min_gst_length", defaults.audit.min_gst_length as i64)?
            .add_source(config::File::with_name("verifix").required(false))
            .add_source(
                config::Environment::with_prefix("VERIFIX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("gemini.api_key", std::env::var("GEMINI_API_KEY").ok())?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// 从环境变量加载配置，失败时回退默认值
    pub fn from_env() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load configuration, using defaults: {}", e);
            Self::default()
        })
    }
}

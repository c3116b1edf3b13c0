use thiserror::Error;

use crate::models::AgentStep;

/// 外部能力 (抽取 / 等价判断 / 生成 / 推理) 调用失败
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability is not configured")]
    NotConfigured,

    #[error("capability call timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("empty response")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),
}

// 去掉 URL，避免请求地址进入错误信息和审计轨迹
impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        CapabilityError::Transport(e.without_url().to_string())
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(e: serde_json::Error) -> Self {
        CapabilityError::Malformed(e.to_string())
    }
}

/// 流水线对外暴露的唯一错误：抽取失败，不产生部分结果
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("{message}")]
    Extraction {
        message: String,
        /// 含终止 SYSTEM 步骤的轨迹快照
        trace: Vec<AgentStep>,
    },
}

impl AuditError {
    pub fn trace(&self) -> &[AgentStep] {
        match self {
            AuditError::Extraction { trace, .. } => trace,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

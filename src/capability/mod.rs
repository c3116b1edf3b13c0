//! 外部能力边界：文档抽取、实体等价判断、参考单据生成、风险推理。
//!
//! 核心逻辑只依赖这里的 trait；远程实现见 [`gemini`]，确定性兜底见 [`fallback`]
//! (决策兜底在 `service::risk`)。

pub mod fallback;
pub mod gemini;
pub mod response;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GeminiConfig;
use crate::error::CapabilityError;
use crate::models::{AuditDecision, AuditFlag, ExtractedData};

pub use fallback::{NormalizedNameOracle, TemplateReferenceGenerator, UnconfiguredExtractor};
pub use gemini::GeminiClient;

/// 文档字节 -> 结构化字段
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<ExtractedData, CapabilityError>;
}

/// 判断两个实体名称是否指向同一组织
#[async_trait]
pub trait EquivalenceOracle: Send + Sync {
    async fn judge(&self, name1: &str, name2: &str) -> Result<bool, CapabilityError>;
}

/// 为发票合成参考采购单
#[async_trait]
pub trait ReferenceGenerator: Send + Sync {
    async fn generate(&self, invoice: &ExtractedData) -> Result<ExtractedData, CapabilityError>;
}

/// 汇总发票、参考单据与违例得出决策
#[async_trait]
pub trait DecisionReasoner: Send + Sync {
    async fn reason(
        &self,
        invoice: &ExtractedData,
        reference: Option<&ExtractedData>,
        flags: &[AuditFlag],
    ) -> Result<AuditDecision, CapabilityError>;
}

/// 一次装配好的全部外部能力；reasoner 为 None 时走确定性决策
#[derive(Clone)]
pub struct Capabilities {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub oracle: Option<Arc<dyn EquivalenceOracle>>,
    pub generator: Option<Arc<dyn ReferenceGenerator>>,
    pub reasoner: Option<Arc<dyn DecisionReasoner>>,
    pub timeout: Duration,
}

impl Capabilities {
    /// 无远程服务：抽取不可用，其余走本地实现
    pub fn deterministic(timeout: Duration) -> Self {
        Self {
            extractor: Arc::new(UnconfiguredExtractor),
            oracle: Some(Arc::new(NormalizedNameOracle)),
            generator: Some(Arc::new(TemplateReferenceGenerator)),
            reasoner: None,
            timeout,
        }
    }

    pub fn from_config(config: &GeminiConfig) -> Result<Self, CapabilityError> {
        match GeminiClient::from_config(config)? {
            Some(client) => {
                tracing::info!("Gemini capabilities enabled (model: {})", config.model);
                let client = Arc::new(client);
                Ok(Self {
                    extractor: client.clone(),
                    oracle: Some(client.clone()),
                    generator: Some(client.clone()),
                    reasoner: Some(client),
                    timeout: config.timeout(),
                })
            }
            None => {
                tracing::warn!("GEMINI_API_KEY not set, running with deterministic fallbacks only");
                Ok(Self::deterministic(config.timeout()))
            }
        }
    }
}

/// 带超时的能力调用；超时等同于调用失败
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("capability call exceeded {:?}", timeout);
            Err(CapabilityError::Timeout(timeout.as_secs()))
        }
    }
}

use chrono::Local;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::matcher::MatchingService;
use super::risk::RiskScoringService;
use super::rules::{RuleDescriptor, RulesEngine};
use crate::capability::{bounded, Capabilities, DocumentExtractor};
use crate::config::{AppConfig, AuditPolicy};
use crate::error::{AuditError, CapabilityError};
use crate::models::{AgentStep, AuditResult, AuditStatus, ExtractedData, StepStatus};
use crate::store::{sample_invoice, StatutoryArchive};
use crate::utils::{now_clock, now_rfc3339, sha256_hex};

const DOC_TYPE: &str = "INVOICE";
const HASH_PREFIX_LEN: usize = 15;

/// 进程内审计序号，保证同一秒内的结果标识不重复
static AUDIT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// AUDIT-IND-<本地时间 年月日时分秒>-<序号>
fn next_audit_id() -> String {
    let seq = AUDIT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("AUDIT-IND-{}-{:06}", Local::now().format("%Y%m%d%H%M%S"), seq % 1_000_000)
}

/// 上传的原始单据
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadedDocument {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// 单次请求的执行轨迹，按调用顺序追加
#[derive(Debug, Default)]
pub struct TraceCollector {
    steps: Vec<AgentStep>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, agent: &str, action: impl Into<String>, status: StepStatus) {
        let action = action.into();
        match status {
            StepStatus::Error => tracing::error!("[{}] {}", agent, action),
            StepStatus::Warning => tracing::warn!("[{}] {}", agent, action),
            StepStatus::Info | StepStatus::Success => tracing::info!("[{}] {}", agent, action),
        }
        self.steps.push(AgentStep {
            agent: agent.to_string(),
            action,
            status,
            timestamp: now_clock(),
        });
    }

    pub fn into_steps(self) -> Vec<AgentStep> {
        self.steps
    }
}

/// 审计编排：抽取 -> 参考单据 -> 规则 -> 决策 -> 匹配度 -> 组装 -> 归档
pub struct AuditOrchestrator {
    archive: Arc<StatutoryArchive>,
    extractor: Arc<dyn DocumentExtractor>,
    timeout: Duration,
    matcher: MatchingService,
    rules: RulesEngine,
    risk: RiskScoringService,
}

impl AuditOrchestrator {
    pub fn new(archive: Arc<StatutoryArchive>, policy: AuditPolicy, capabilities: Capabilities) -> Self {
        let Capabilities {
            extractor,
            oracle,
            generator,
            reasoner,
            timeout,
        } = capabilities;

        let mut matcher = MatchingService::new(policy.clone(), timeout);
        if let Some(oracle) = oracle {
            matcher = matcher.with_oracle(oracle);
        }
        if let Some(generator) = generator {
            matcher = matcher.with_generator(generator);
        }

        let mut risk = RiskScoringService::new(timeout);
        if let Some(reasoner) = reasoner {
            risk = risk.with_reasoner(reasoner);
        }

        Self {
            archive,
            extractor,
            timeout,
            matcher,
            rules: RulesEngine::new(policy),
            risk,
        }
    }

    pub fn from_config(config: &AppConfig, archive: Arc<StatutoryArchive>) -> Result<Self, CapabilityError> {
        let capabilities = Capabilities::from_config(&config.gemini)?;
        Ok(Self::new(archive, config.audit.clone(), capabilities))
    }

    pub fn archive(&self) -> &Arc<StatutoryArchive> {
        &self.archive
    }

    pub fn rules_catalogue(&self) -> Vec<RuleDescriptor> {
        self.rules.catalogue()
    }

    /// 审计上传的发票；可附带人工参考采购单
    pub async fn process_document(
        &self,
        invoice_doc: &UploadedDocument,
        reference_doc: Option<&UploadedDocument>,
    ) -> Result<AuditResult, AuditError> {
        let mut trace = TraceCollector::new();

        trace.record("DOC_INTEL", "Executing OCR + Spatial Frame Annotation...", StepStatus::Info);
        let invoice = match self.extract(invoice_doc).await {
            Ok(invoice) => invoice,
            Err(e) => return Err(Self::abort(trace, e)),
        };
        trace.record("DOC_INTEL", format!("Entity Framed: {}", invoice.vendor), StepStatus::Success);

        let reference = match reference_doc {
            Some(doc) => {
                trace.record(
                    "REFERENCE_AGENT",
                    "Processing Manually Uploaded Reference PO...",
                    StepStatus::Info,
                );
                let reference = match self.extract(doc).await {
                    Ok(reference) => reference,
                    Err(e) => return Err(Self::abort(trace, e)),
                };
                trace.record("REFERENCE_AGENT", "Manual Reference PO Extracted.", StepStatus::Success);
                reference
            }
            None => self.resolve_from_archive(&invoice, &mut trace).await,
        };

        let result = self.audit(invoice.clone(), Some(reference), trace).await;
        self.archive.add_invoice(invoice);
        tracing::info!(
            "Audit {} archived (archive now holds {} invoices)",
            result.id,
            self.archive.invoice_count()
        );
        Ok(result)
    }

    /// 内置样例发票审计，不写入已上传发票
    pub async fn process_sample(&self) -> AuditResult {
        let mut trace = TraceCollector::new();
        trace.record("DOC_INTEL", "Loading Govt Sample from statutory archive...", StepStatus::Success);

        let invoice = sample_invoice();
        let reference = self.resolve_from_archive(&invoice, &mut trace).await;
        self.audit(invoice, Some(reference), trace).await
    }

    async fn extract(&self, doc: &UploadedDocument) -> Result<ExtractedData, CapabilityError> {
        bounded(self.timeout, self.extractor.extract(&doc.bytes, &doc.mime_type)).await
    }

    fn abort(mut trace: TraceCollector, error: CapabilityError) -> AuditError {
        trace.record(
            "SYSTEM",
            format!("Critical Agent Chain Violation: {}", error),
            StepStatus::Error,
        );
        AuditError::Extraction {
            message: error.to_string(),
            trace: trace.into_steps(),
        }
    }

    async fn resolve_from_archive(&self, invoice: &ExtractedData, trace: &mut TraceCollector) -> ExtractedData {
        trace.record(
            "REFERENCE_AGENT",
            "Searching /statutory_archive/reference_documents/ for matching PO...",
            StepStatus::Info,
        );

        if let Some(found) = self.matcher.find_reference(invoice, &self.archive) {
            trace.record(
                "REFERENCE_AGENT",
                "Found existing matching reference in archive.",
                StepStatus::Success,
            );
            return found;
        }

        trace.record(
            "REFERENCE_AGENT",
            "No PO found. Synthesizing realistic Indian Reference PO...",
            StepStatus::Info,
        );
        let synthesized = self.matcher.synthesize_reference(invoice, &self.archive).await;
        trace.record(
            "REFERENCE_AGENT",
            "Reference PO generated and saved to /reference_documents/",
            StepStatus::Success,
        );
        synthesized
    }

    /// 规则、决策、匹配度与结果组装
    async fn audit(
        &self,
        invoice: ExtractedData,
        reference: Option<ExtractedData>,
        mut trace: TraceCollector,
    ) -> AuditResult {
        trace.record("RULE_ENGINE", "Cross-verifying Upload vs Reference Document...", StepStatus::Info);
        let flags = self.rules.validate(&invoice, reference.as_ref(), &self.matcher).await;
        let rule_status = if flags.is_empty() {
            StepStatus::Success
        } else {
            StepStatus::Warning
        };
        trace.record(
            "RULE_ENGINE",
            format!("Audit Check Complete. Identified {} deviations.", flags.len()),
            rule_status,
        );

        trace.record(
            "DECISION_AGENT",
            "Executing multi-step reasoning determination...",
            StepStatus::Info,
        );
        let decision = self.risk.decide(&invoice, reference.as_ref(), &flags).await;
        trace.record("DECISION_AGENT", "Autonomous legal determination reached.", StepStatus::Success);

        let match_score = match &reference {
            Some(reference) => self.matcher.match_score(&invoice, reference).await,
            None => 0.0,
        };

        let id = next_audit_id();
        let digest = sha256_hex(id.as_bytes());
        let hash = format!("SHA256:{}", &digest[..HASH_PREFIX_LEN]);

        tracing::info!(
            "Audit {} for invoice {}: score {} ({}), {} flags, match {:.2}",
            id,
            invoice.invoice_no,
            decision.risk_score,
            decision.risk_level,
            flags.len(),
            match_score
        );

        AuditResult {
            id,
            timestamp: now_rfc3339(),
            status: AuditStatus::Completed,
            doc_type: DOC_TYPE.to_string(),
            extracted_data: invoice,
            po_match: reference,
            risk_score: decision.risk_score,
            risk_level: decision.risk_level,
            flags,
            reasoning: decision.reasoning_steps,
            explanation: decision.explanation,
            recommendation: decision.recommendation,
            match_score,
            hash,
            agent_trace: trace.into_steps(),
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use crate::capability::{bounded, EquivalenceOracle, ReferenceGenerator, TemplateReferenceGenerator};
use crate::config::AuditPolicy;
use crate::models::{ExtractedData, LineItem};
use crate::store::StatutoryArchive;
use crate::utils::{descriptions_overlap, normalize_name};

const VENDOR_WEIGHT: f64 = 0.3;
const AMOUNT_WEIGHT: f64 = 0.3;
const GST_WEIGHT: f64 = 0.2;
const LINE_ITEM_WEIGHT: f64 = 0.2;

/// 参考单据解析结果
#[derive(Debug, Clone)]
pub struct ResolvedReference {
    pub document: ExtractedData,
    /// true: 档案库未命中，已合成
    pub synthesized: bool,
}

/// 匹配服务：查找/合成参考采购单，计算匹配度
pub struct MatchingService {
    policy: AuditPolicy,
    oracle: Option<Arc<dyn EquivalenceOracle>>,
    generator: Option<Arc<dyn ReferenceGenerator>>,
    timeout: Duration,
}

impl MatchingService {
    pub fn new(policy: AuditPolicy, timeout: Duration) -> Self {
        Self {
            policy,
            oracle: None,
            generator: None,
            timeout,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn EquivalenceOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ReferenceGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    /// 按发票的参考单据键查找
    pub fn find_reference(&self, invoice: &ExtractedData, archive: &StatutoryArchive) -> Option<ExtractedData> {
        let key = invoice.reference_key()?;
        archive.reference(key)
    }

    /// 合成参考单据；发票带键时写回档案库 (同键并发时后写覆盖)
    pub async fn synthesize_reference(&self, invoice: &ExtractedData, archive: &StatutoryArchive) -> ExtractedData {
        let reference = match &self.generator {
            Some(generator) => match bounded(self.timeout, generator.generate(invoice)).await {
                Ok(reference) => reference,
                Err(e) => {
                    tracing::warn!(
                        "Reference generation failed for invoice {}, using template: {}",
                        invoice.invoice_no, e
                    );
                    TemplateReferenceGenerator::synthesize(invoice)
                }
            },
            None => {
                tracing::info!("No reference generator configured, using template for {}", invoice.invoice_no);
                TemplateReferenceGenerator::synthesize(invoice)
            }
        };

        if let Some(key) = invoice.reference_key() {
            archive.add_reference(key, reference.clone());
            tracing::info!("Synthesized reference stored under {}", key);
        }

        reference
    }

    pub async fn resolve_reference(&self, invoice: &ExtractedData, archive: &StatutoryArchive) -> ResolvedReference {
        if let Some(document) = self.find_reference(invoice, archive) {
            return ResolvedReference {
                document,
                synthesized: false,
            };
        }
        ResolvedReference {
            document: self.synthesize_reference(invoice, archive).await,
            synthesized: true,
        }
    }

    /// 实体名称等价：规范化相等直接为真，否则询问外部判断；任何失败按不等价处理
    pub async fn semantically_equivalent(&self, name1: &str, name2: &str) -> bool {
        if name1.trim().is_empty() || name2.trim().is_empty() {
            return false;
        }
        if normalize_name(name1) == normalize_name(name2) {
            return true;
        }

        let Some(oracle) = &self.oracle else {
            return false;
        };
        match bounded(self.timeout, oracle.judge(name1, name2)).await {
            Ok(same) => same,
            Err(e) => {
                tracing::warn!("Equivalence check '{}' vs '{}' failed: {}", name1, name2, e);
                false
            }
        }
    }

    /// 先比对 vendor，失败再比对 seller
    pub async fn vendor_matches(&self, invoice: &ExtractedData, reference: &ExtractedData) -> bool {
        if self.semantically_equivalent(&invoice.vendor, &reference.vendor).await {
            return true;
        }
        match invoice.seller.as_deref() {
            Some(seller) => self.semantically_equivalent(seller, &reference.vendor).await,
            None => false,
        }
    }

    /// 加权匹配度，分母固定为 1.0
    pub async fn match_score(&self, invoice: &ExtractedData, reference: &ExtractedData) -> f64 {
        let mut score = 0.0;

        if self.vendor_matches(invoice, reference).await {
            score += VENDOR_WEIGHT;
        }

        score += AMOUNT_WEIGHT * self.amount_closeness(invoice.total_amount, reference.total_amount);

        if let (Some(a), Some(b)) = (invoice.gst_no.as_deref(), reference.gst_no.as_deref()) {
            if a == b {
                score += GST_WEIGHT;
            }
        }

        score += LINE_ITEM_WEIGHT * line_item_similarity(&invoice.line_items, &reference.line_items);

        score.clamp(0.0, 1.0)
    }

    /// 金额接近度：偏差 0 为 1，线性衰减到容差边界为 0
    fn amount_closeness(&self, invoice_total: f64, reference_total: f64) -> f64 {
        let tolerance = self.policy.amount_tolerance;
        let diff = if reference_total > 0.0 {
            (invoice_total - reference_total).abs() / reference_total
        } else {
            0.0
        };
        if tolerance <= 0.0 {
            return if diff == 0.0 { 1.0 } else { 0.0 };
        }
        if diff <= tolerance {
            1.0 - diff / tolerance
        } else {
            0.0
        }
    }
}

/// 发票明细中能在参考明细里找到 (子串匹配) 的比例
pub fn line_item_similarity(invoice_items: &[LineItem], reference_items: &[LineItem]) -> f64 {
    if invoice_items.is_empty() || reference_items.is_empty() {
        return 0.0;
    }
    let matched = invoice_items
        .iter()
        .filter(|inv| {
            reference_items
                .iter()
                .any(|r| descriptions_overlap(&inv.description, &r.description))
        })
        .count();
    matched as f64 / invoice_items.len() as f64
}

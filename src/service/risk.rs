use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::capability::{bounded, DecisionReasoner};
use crate::error::CapabilityError;
use crate::models::{AuditDecision, AuditFlag, ExtractedData, Recommendation, RiskLevel};

/// 风险分 = min(100, Σ 严重度权重)
pub fn calculate_risk_score(flags: &[AuditFlag]) -> u8 {
    let total: u32 = flags.iter().map(|f| f.severity.weight()).sum();
    total.min(100) as u8
}

/// 确定性决策：分数、等级、建议全部由违例推出
pub struct DeterministicReasoner;

impl DeterministicReasoner {
    pub fn decide(flags: &[AuditFlag]) -> AuditDecision {
        let risk_score = calculate_risk_score(flags);
        let risk_level = RiskLevel::from_score(risk_score);

        let explanation = match risk_level {
            RiskLevel::High => {
                "Critical compliance violations detected. Invoice does not meet statutory requirements."
            }
            RiskLevel::Medium => {
                "Potential compliance issues identified. Manual review recommended before approval."
            }
            RiskLevel::Low => "Invoice meets statutory requirements and aligns with reference documentation.",
        };

        AuditDecision {
            risk_score,
            risk_level,
            reasoning_steps: vec![
                format!("Detected {} compliance issues", flags.len()),
                "Cross-verified with reference documents".to_string(),
                "Applied statutory rules engine".to_string(),
                format!("Calculated risk score: {}/100", risk_score),
            ],
            explanation: explanation.to_string(),
            recommendation: Recommendation::for_level(risk_level),
        }
    }
}

#[async_trait]
impl DecisionReasoner for DeterministicReasoner {
    async fn reason(
        &self,
        _invoice: &ExtractedData,
        _reference: Option<&ExtractedData>,
        flags: &[AuditFlag],
    ) -> Result<AuditDecision, CapabilityError> {
        Ok(Self::decide(flags))
    }
}

/// 风险评估：优先外部推理，任何失败回退到确定性决策
pub struct RiskScoringService {
    reasoner: Option<Arc<dyn DecisionReasoner>>,
    timeout: Duration,
}

impl RiskScoringService {
    pub fn new(timeout: Duration) -> Self {
        Self { reasoner: None, timeout }
    }

    pub fn with_reasoner(mut self, reasoner: Arc<dyn DecisionReasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub async fn decide(
        &self,
        invoice: &ExtractedData,
        reference: Option<&ExtractedData>,
        flags: &[AuditFlag],
    ) -> AuditDecision {
        let Some(reasoner) = &self.reasoner else {
            return DeterministicReasoner::decide(flags);
        };

        let outcome = bounded(self.timeout, reasoner.reason(invoice, reference, flags))
            .await
            .and_then(|decision| {
                decision.check_consistency().map_err(CapabilityError::Malformed)?;
                Ok(decision)
            });

        match outcome {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    "Decision reasoning failed for invoice {}, using deterministic fallback: {}",
                    invoice.invoice_no, e
                );
                DeterministicReasoner::decide(flags)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use crate::store::sample_invoice;

    fn flag(severity: Severity) -> AuditFlag {
        AuditFlag {
            id: "R-TEST".to_string(),
            rule: "Test".to_string(),
            severity,
            description: String::new(),
            field: "document".to_string(),
            coords: None,
        }
    }

    struct FailingReasoner;

    #[async_trait]
    impl DecisionReasoner for FailingReasoner {
        async fn reason(
            &self,
            _invoice: &ExtractedData,
            _reference: Option<&ExtractedData>,
            _flags: &[AuditFlag],
        ) -> Result<AuditDecision, CapabilityError> {
            Err(CapabilityError::Malformed("riskLevel missing".to_string()))
        }
    }

    struct CannedReasoner(AuditDecision);

    #[async_trait]
    impl DecisionReasoner for CannedReasoner {
        async fn reason(
            &self,
            _invoice: &ExtractedData,
            _reference: Option<&ExtractedData>,
            _flags: &[AuditFlag],
        ) -> Result<AuditDecision, CapabilityError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn no_flags_is_low_approve() {
        let decision = DeterministicReasoner::decide(&[]);
        assert_eq!(decision.risk_score, 0);
        assert_eq!(decision.risk_level, RiskLevel::Low);
        assert_eq!(decision.recommendation, Recommendation::Approve);
        assert_eq!(decision.reasoning_steps.len(), 4);
        assert_eq!(decision.reasoning_steps[0], "Detected 0 compliance issues");
    }

    #[test]
    fn two_high_flags_reject() {
        let decision = DeterministicReasoner::decide(&[flag(Severity::High), flag(Severity::High)]);
        assert_eq!(decision.risk_score, 70);
        assert_eq!(decision.risk_level, RiskLevel::High);
        assert_eq!(decision.recommendation, Recommendation::Reject);
        assert_eq!(decision.reasoning_steps[3], "Calculated risk score: 70/100");
    }

    #[test]
    fn medium_band_recommends_review() {
        let decision = DeterministicReasoner::decide(&[flag(Severity::High), flag(Severity::Medium)]);
        assert_eq!(decision.risk_score, 55);
        assert_eq!(decision.risk_level, RiskLevel::Medium);
        assert_eq!(decision.recommendation, Recommendation::Review);
    }

    #[test]
    fn score_is_capped() {
        let flags: Vec<_> = (0..5).map(|_| flag(Severity::High)).collect();
        assert_eq!(calculate_risk_score(&flags), 100);
        assert_eq!(calculate_risk_score(&[flag(Severity::Low)]), 10);
    }

    #[tokio::test]
    async fn failing_reasoner_falls_back() {
        let service = RiskScoringService::new(Duration::from_secs(5)).with_reasoner(Arc::new(FailingReasoner));
        let flags = [flag(Severity::Medium)];
        let decision = service.decide(&sample_invoice(), None, &flags).await;
        assert_eq!(decision, DeterministicReasoner::decide(&flags));
    }

    #[tokio::test]
    async fn inconsistent_decision_falls_back() {
        let canned = AuditDecision {
            risk_score: 10,
            risk_level: RiskLevel::High,
            reasoning_steps: vec!["Looks risky".to_string()],
            explanation: "Reject.".to_string(),
            recommendation: Recommendation::Reject,
        };
        let service = RiskScoringService::new(Duration::from_secs(5)).with_reasoner(Arc::new(CannedReasoner(canned)));
        let flags = [flag(Severity::Medium)];
        let decision = service.decide(&sample_invoice(), None, &flags).await;

        assert_eq!(decision, DeterministicReasoner::decide(&flags));
        assert_eq!(decision.risk_score, 20);
        assert_eq!(decision.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn out_of_range_decision_falls_back() {
        let canned = AuditDecision {
            risk_score: 150,
            risk_level: RiskLevel::High,
            reasoning_steps: Vec::new(),
            explanation: String::new(),
            recommendation: Recommendation::Reject,
        };
        let service = RiskScoringService::new(Duration::from_secs(5)).with_reasoner(Arc::new(CannedReasoner(canned)));
        let decision = service.decide(&sample_invoice(), None, &[]).await;
        assert_eq!(decision.risk_score, 0);
        assert_eq!(decision.recommendation, Recommendation::Approve);
    }

    #[tokio::test]
    async fn remote_decision_is_used_when_valid() {
        let canned = AuditDecision {
            risk_score: 45,
            risk_level: RiskLevel::Medium,
            reasoning_steps: vec!["Vendor verified against PO".to_string()],
            explanation: "Amount deviation needs sign-off.".to_string(),
            recommendation: Recommendation::Review,
        };
        let service =
            RiskScoringService::new(Duration::from_secs(5)).with_reasoner(Arc::new(CannedReasoner(canned.clone())));
        let decision = service.decide(&sample_invoice(), None, &[]).await;
        assert_eq!(decision, canned);
    }
}

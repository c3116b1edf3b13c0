use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use verifix_audit::capability::{Capabilities, DecisionReasoner, DocumentExtractor, EquivalenceOracle};
use verifix_audit::config::AuditPolicy;
use verifix_audit::models::{
    AuditDecision, AuditFlag, ExtractedData, LineItem, Recommendation, RiskLevel, StepStatus,
};
use verifix_audit::store::{sample_reference, SAMPLE_PO_KEY};
use verifix_audit::{AuditOrchestrator, CapabilityError, StatutoryArchive, UploadedDocument};

/// 按文档字节中的发票号返回单据
struct ByteKeyedExtractor;

#[async_trait]
impl DocumentExtractor for ByteKeyedExtractor {
    async fn extract(&self, bytes: &[u8], _mime_type: &str) -> Result<ExtractedData, CapabilityError> {
        let key = String::from_utf8_lossy(bytes).to_string();
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(ExtractedData {
            vendor: "Tech Solutions India Pvt Ltd".to_string(),
            seller: None,
            invoice_no: key.clone(),
            date: "2024-03-01".to_string(),
            total_amount: 118_000.0,
            tax_amount: 18_000.0,
            gst_no: Some("29ABCDE1234F1Z5".to_string()),
            po_no: Some(format!("PO-{}", key)),
            anomalies: None,
            line_items: vec![LineItem::new("Laptops", 10.0, 10_000.0, 100_000.0)],
            field_coords: None,
        })
    }
}

struct AlwaysEquivalent;

#[async_trait]
impl EquivalenceOracle for AlwaysEquivalent {
    async fn judge(&self, _name1: &str, _name2: &str) -> Result<bool, CapabilityError> {
        Ok(true)
    }
}

struct GarbledReasoner;

#[async_trait]
impl DecisionReasoner for GarbledReasoner {
    async fn reason(
        &self,
        _invoice: &ExtractedData,
        _reference: Option<&ExtractedData>,
        _flags: &[AuditFlag],
    ) -> Result<AuditDecision, CapabilityError> {
        Err(CapabilityError::Malformed("expected value at line 1 column 1".to_string()))
    }
}

struct HangingReasoner;

#[async_trait]
impl DecisionReasoner for HangingReasoner {
    async fn reason(
        &self,
        _invoice: &ExtractedData,
        _reference: Option<&ExtractedData>,
        _flags: &[AuditFlag],
    ) -> Result<AuditDecision, CapabilityError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(CapabilityError::EmptyResponse)
    }
}

fn orchestrator(capabilities: Capabilities) -> AuditOrchestrator {
    AuditOrchestrator::new(Arc::new(StatutoryArchive::new()), AuditPolicy::default(), capabilities)
}

fn stubbed() -> Capabilities {
    Capabilities {
        extractor: Arc::new(ByteKeyedExtractor),
        ..Capabilities::deterministic(Duration::from_secs(5))
    }
}

#[tokio::test]
async fn concurrent_audits_keep_their_own_trace_and_archive_everything() {
    let orch = Arc::new(orchestrator(stubbed()));
    let docs: Vec<_> = (0..16)
        .map(|i| UploadedDocument::new(format!("INV-{:03}", i).into_bytes(), "application/pdf"))
        .collect();

    let results = join_all(docs.iter().map(|doc| orch.process_document(doc, None))).await;

    let mut ids = std::collections::HashSet::new();
    for (i, result) in results.into_iter().enumerate() {
        let result = result.unwrap();
        assert!(ids.insert(result.id.clone()), "duplicate id {}", result.id);
        assert_eq!(result.extracted_data.invoice_no, format!("INV-{:03}", i));
        assert_eq!(result.agent_trace.len(), 10);
        assert_eq!(
            result.agent_trace[1].action,
            "Entity Framed: Tech Solutions India Pvt Ltd"
        );
        assert_eq!(result.risk_level, RiskLevel::Low);
    }

    let archive = orch.archive();
    assert_eq!(archive.invoice_count(), 16);
    // 预置 1 份 + 每张发票合成 1 份
    assert_eq!(archive.reference_count(), 17);
}

#[tokio::test]
async fn remote_equivalence_suppresses_vendor_flag() {
    let archive = Arc::new(StatutoryArchive::new());
    let mut reference = sample_reference();
    reference.vendor = "TSI Pvt Ltd".to_string();
    archive.add_reference("PO-INV-900", reference);

    let caps = Capabilities {
        oracle: Some(Arc::new(AlwaysEquivalent)),
        ..stubbed()
    };
    let orch = AuditOrchestrator::new(archive, AuditPolicy::default(), caps);
    let result = orch
        .process_document(&UploadedDocument::new(b"INV-900".to_vec(), "application/pdf"), None)
        .await
        .unwrap();

    assert!(!result.flags.iter().any(|f| f.id == "R-SEM-001"));
}

#[tokio::test]
async fn malformed_reasoning_falls_back_to_rules_score() {
    let caps = Capabilities {
        reasoner: Some(Arc::new(GarbledReasoner)),
        ..stubbed()
    };
    let orch = orchestrator(caps);
    let result = orch
        .process_document(&UploadedDocument::new(b"INV-1".to_vec(), "application/pdf"), None)
        .await
        .unwrap();

    assert_eq!(result.risk_score, 0);
    assert_eq!(result.recommendation, Recommendation::Approve);
    assert_eq!(result.reasoning[3], "Calculated risk score: 0/100");
    assert_eq!(result.agent_trace.last().unwrap().status, StepStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn hanging_reasoner_times_out_to_fallback() {
    let caps = Capabilities {
        reasoner: Some(Arc::new(HangingReasoner)),
        ..stubbed()
    };
    let orch = orchestrator(caps);
    let result = orch
        .process_document(&UploadedDocument::new(b"INV-2".to_vec(), "application/pdf"), None)
        .await
        .unwrap();

    assert_eq!(
        result.explanation,
        "Invoice meets statutory requirements and aligns with reference documentation."
    );
}

#[tokio::test]
async fn sample_reference_is_left_untouched_by_uploads() {
    let orch = orchestrator(stubbed());
    orch.process_document(&UploadedDocument::new(b"INV-3".to_vec(), "application/pdf"), None)
        .await
        .unwrap();

    let seeded = orch.archive().reference(SAMPLE_PO_KEY).unwrap();
    assert_eq!(seeded.total_amount, 500_000.0);
    assert!((0.0..=1.0).contains(&orch.process_sample().await.match_score));
}

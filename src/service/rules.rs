use serde::Serialize;

use super::matcher::MatchingService;
use crate::config::AuditPolicy;
use crate::models::{AuditFlag, ExtractedData, Severity};
use crate::utils::{descriptions_overlap, format_amount, parse_date};

/// 确定性校验规则 (按执行顺序)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    VendorMismatch,
    AmountExceedsReference,
    InvalidGstNumber,
    TaxCalculation,
    MissingReference,
    DateSequence,
    LineItemsMismatch,
    StructuralAnomaly,
}

impl Rule {
    pub const ORDERED: [Rule; 8] = [
        Rule::VendorMismatch,
        Rule::AmountExceedsReference,
        Rule::InvalidGstNumber,
        Rule::TaxCalculation,
        Rule::MissingReference,
        Rule::DateSequence,
        Rule::LineItemsMismatch,
        Rule::StructuralAnomaly,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Rule::VendorMismatch => "R-SEM-001",
            Rule::AmountExceedsReference => "R-GST-002",
            Rule::InvalidGstNumber => "R-GST-003",
            Rule::TaxCalculation => "R-FIN-004",
            Rule::MissingReference => "R-PO-005",
            Rule::DateSequence => "R-DATE-006",
            Rule::LineItemsMismatch => "R-ITEM-007",
            Rule::StructuralAnomaly => "R-STR-008",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rule::VendorMismatch => "Vendor Mismatch",
            Rule::AmountExceedsReference => "Amount Exceeds PO",
            Rule::InvalidGstNumber => "Invalid GST Number",
            Rule::TaxCalculation => "Tax Calculation Error",
            Rule::MissingReference => "Missing PO Reference",
            Rule::DateSequence => "Invalid Date Sequence",
            Rule::LineItemsMismatch => "Line Items Mismatch",
            Rule::StructuralAnomaly => "Structural Anomaly",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Rule::VendorMismatch => "Check vendor name matches PO",
            Rule::AmountExceedsReference => "Check invoice amount doesn't exceed PO",
            Rule::InvalidGstNumber => "Check GST number is present and valid",
            Rule::TaxCalculation => "Check tax calculation is correct",
            Rule::MissingReference => "Check PO reference exists",
            Rule::DateSequence => "Check invoice date is after PO date",
            Rule::LineItemsMismatch => "Check line items match PO",
            Rule::StructuralAnomaly => "Surface structural anomalies found during extraction",
        }
    }

    /// None: 严重度按条目决定
    pub fn severity(self) -> Option<Severity> {
        match self {
            Rule::VendorMismatch | Rule::AmountExceedsReference | Rule::MissingReference => Some(Severity::High),
            Rule::InvalidGstNumber | Rule::TaxCalculation | Rule::DateSequence | Rule::LineItemsMismatch => {
                Some(Severity::Medium)
            }
            Rule::StructuralAnomaly => None,
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            Rule::VendorMismatch => "vendor",
            Rule::AmountExceedsReference => "totalAmount",
            Rule::InvalidGstNumber => "gstNo",
            Rule::TaxCalculation => "taxAmount",
            Rule::MissingReference => "poNo",
            Rule::DateSequence => "date",
            Rule::LineItemsMismatch => "lineItems",
            Rule::StructuralAnomaly => "document",
        }
    }
}

/// 规则目录条目 (对外展示)
#[derive(Debug, Clone, Serialize)]
pub struct RuleDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Option<Severity>,
}

impl From<Rule> for RuleDescriptor {
    fn from(rule: Rule) -> Self {
        Self {
            id: rule.id(),
            name: rule.name(),
            description: rule.summary(),
            severity: rule.severity(),
        }
    }
}

/// 规则引擎：按固定顺序执行相互独立的检查，不去重、不排序
pub struct RulesEngine {
    policy: AuditPolicy,
    rules: Vec<Rule>,
}

impl RulesEngine {
    pub fn new(policy: AuditPolicy) -> Self {
        Self {
            policy,
            rules: Rule::ORDERED.to_vec(),
        }
    }

    pub fn catalogue(&self) -> Vec<RuleDescriptor> {
        self.rules.iter().copied().map(RuleDescriptor::from).collect()
    }

    pub async fn validate(
        &self,
        invoice: &ExtractedData,
        reference: Option<&ExtractedData>,
        equivalence: &MatchingService,
    ) -> Vec<AuditFlag> {
        let mut flags = Vec::new();
        for rule in &self.rules {
            let found = self.evaluate(*rule, invoice, reference, equivalence).await;
            if !found.is_empty() {
                tracing::debug!("Rule {} raised {} flag(s)", rule.id(), found.len());
            }
            flags.extend(found);
        }
        flags
    }

    async fn evaluate(
        &self,
        rule: Rule,
        invoice: &ExtractedData,
        reference: Option<&ExtractedData>,
        equivalence: &MatchingService,
    ) -> Vec<AuditFlag> {
        let single = match rule {
            Rule::VendorMismatch => match reference {
                Some(reference) => check_vendor_mismatch(invoice, reference, equivalence).await,
                None => None,
            },
            Rule::AmountExceedsReference => reference.and_then(|r| check_amount_exceeds(invoice, r, &self.policy)),
            Rule::InvalidGstNumber => check_gst_number(invoice, &self.policy),
            Rule::TaxCalculation => check_tax_calculation(invoice, &self.policy),
            Rule::MissingReference => check_missing_reference(invoice),
            Rule::DateSequence => reference.and_then(|r| check_date_sequence(invoice, r)),
            Rule::LineItemsMismatch => reference.and_then(|r| check_line_items(invoice, r)),
            Rule::StructuralAnomaly => return check_anomalies(invoice),
        };
        single.into_iter().collect()
    }
}

fn flag(rule: Rule, severity: Severity, description: String, invoice: &ExtractedData) -> AuditFlag {
    AuditFlag {
        id: rule.id().to_string(),
        rule: rule.name().to_string(),
        severity,
        description,
        field: rule.field().to_string(),
        coords: invoice.field_locator(rule.field()),
    }
}

async fn check_vendor_mismatch(
    invoice: &ExtractedData,
    reference: &ExtractedData,
    equivalence: &MatchingService,
) -> Option<AuditFlag> {
    if equivalence.vendor_matches(invoice, reference).await {
        return None;
    }
    Some(flag(
        Rule::VendorMismatch,
        Severity::High,
        format!(
            "Invoice vendor '{}' does not match PO vendor '{}'",
            invoice.vendor, reference.vendor
        ),
        invoice,
    ))
}

fn check_amount_exceeds(invoice: &ExtractedData, reference: &ExtractedData, policy: &AuditPolicy) -> Option<AuditFlag> {
    let max_allowed = reference.total_amount * (1.0 + policy.amount_tolerance);
    if invoice.total_amount <= max_allowed {
        return None;
    }

    let description = if reference.total_amount > 0.0 {
        let excess_percent = (invoice.total_amount - reference.total_amount) / reference.total_amount * 100.0;
        format!(
            "Invoice amount ₹{} exceeds PO amount ₹{} by {:.1}%",
            format_amount(invoice.total_amount),
            format_amount(reference.total_amount),
            excess_percent
        )
    } else {
        format!(
            "Invoice amount ₹{} exceeds PO amount ₹{}",
            format_amount(invoice.total_amount),
            format_amount(reference.total_amount)
        )
    };
    Some(flag(Rule::AmountExceedsReference, Severity::High, description, invoice))
}

fn check_gst_number(invoice: &ExtractedData, policy: &AuditPolicy) -> Option<AuditFlag> {
    let valid = invoice
        .gst_no
        .as_deref()
        .map(str::trim)
        .is_some_and(|gst| gst.chars().count() >= policy.min_gst_length);
    if valid {
        return None;
    }
    Some(flag(
        Rule::InvalidGstNumber,
        Severity::Medium,
        format!(
            "GST number is missing or invalid format (must be {} characters)",
            policy.min_gst_length
        ),
        invoice,
    ))
}

fn check_tax_calculation(invoice: &ExtractedData, policy: &AuditPolicy) -> Option<AuditFlag> {
    let taxable_amount = invoice.total_amount - invoice.tax_amount;
    let expected_tax = taxable_amount * policy.gst_rate;
    let difference = (invoice.tax_amount - expected_tax).abs();

    if difference <= policy.tax_tolerance {
        return None;
    }
    Some(flag(
        Rule::TaxCalculation,
        Severity::Medium,
        format!(
            "Tax amount ₹{} does not match expected ₹{} (difference: ₹{})",
            format_amount(invoice.tax_amount),
            format_amount(expected_tax),
            format_amount(difference)
        ),
        invoice,
    ))
}

fn check_missing_reference(invoice: &ExtractedData) -> Option<AuditFlag> {
    if invoice.reference_key().is_some() {
        return None;
    }
    Some(flag(
        Rule::MissingReference,
        Severity::High,
        "Invoice does not reference any Purchase Order".to_string(),
        invoice,
    ))
}

/// 日期无法解析时静默跳过
fn check_date_sequence(invoice: &ExtractedData, reference: &ExtractedData) -> Option<AuditFlag> {
    let (Some(invoice_date), Some(reference_date)) = (parse_date(&invoice.date), parse_date(&reference.date)) else {
        tracing::debug!(
            "Skipping date sequence check: invoice '{}' / PO '{}' not in YYYY-MM-DD",
            invoice.date, reference.date
        );
        return None;
    };

    if invoice_date >= reference_date {
        return None;
    }
    Some(flag(
        Rule::DateSequence,
        Severity::Medium,
        format!("Invoice date ({}) is before PO date ({})", invoice.date, reference.date),
        invoice,
    ))
}

fn check_line_items(invoice: &ExtractedData, reference: &ExtractedData) -> Option<AuditFlag> {
    if reference.line_items.is_empty() {
        return None;
    }

    let unmatched: Vec<&str> = invoice
        .line_items
        .iter()
        .filter(|inv| {
            !reference
                .line_items
                .iter()
                .any(|r| descriptions_overlap(&inv.description, &r.description))
        })
        .map(|inv| inv.description.as_str())
        .collect();

    // 未匹配数 >= 发票明细数的一半
    if unmatched.is_empty() || unmatched.len() * 2 < invoice.line_items.len() {
        return None;
    }

    let shown: Vec<&str> = unmatched.iter().take(3).copied().collect();
    Some(flag(
        Rule::LineItemsMismatch,
        Severity::Medium,
        format!("Multiple line items not found in PO: {}", shown.join(", ")),
        invoice,
    ))
}

fn check_anomalies(invoice: &ExtractedData) -> Vec<AuditFlag> {
    invoice
        .anomalies()
        .iter()
        .enumerate()
        .map(|(idx, anomaly)| {
            let lowered = anomaly.to_lowercase();
            let severity = if lowered.contains("mathematical") || lowered.contains("suspicious") {
                Severity::High
            } else {
                Severity::Medium
            };
            AuditFlag {
                id: format!("{}-{}", Rule::StructuralAnomaly.id(), idx),
                rule: Rule::StructuralAnomaly.name().to_string(),
                severity,
                description: anomaly.clone(),
                field: Rule::StructuralAnomaly.field().to_string(),
                coords: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, LineItem};
    use std::time::Duration;

    fn matcher() -> MatchingService {
        MatchingService::new(AuditPolicy::default(), Duration::from_secs(5))
    }

    fn clean_invoice() -> ExtractedData {
        ExtractedData {
            vendor: "Acme Traders".to_string(),
            seller: None,
            invoice_no: "INV-1".to_string(),
            date: "2024-02-20".to_string(),
            total_amount: 118.0,
            tax_amount: 18.0,
            gst_no: Some("29ABCDE1234F1Z5".to_string()),
            po_no: Some("PO-1".to_string()),
            anomalies: None,
            line_items: vec![LineItem::new("Office Chairs", 1.0, 100.0, 100.0)],
            field_coords: None,
        }
    }

    fn reference_for(invoice: &ExtractedData, total: f64) -> ExtractedData {
        ExtractedData {
            total_amount: total,
            date: "2024-01-15".to_string(),
            ..invoice.clone()
        }
    }

    async fn run(invoice: &ExtractedData, reference: Option<&ExtractedData>) -> Vec<AuditFlag> {
        RulesEngine::new(AuditPolicy::default())
            .validate(invoice, reference, &matcher())
            .await
    }

    #[tokio::test]
    async fn clean_invoice_raises_nothing() {
        let inv = clean_invoice();
        let po = reference_for(&inv, 118.0);
        assert!(run(&inv, Some(&po)).await.is_empty());
    }

    #[tokio::test]
    async fn amount_tolerance_boundary() {
        let mut inv = clean_invoice();
        inv.tax_amount = 0.0;
        let policy = AuditPolicy::default();

        inv.total_amount = 110.0;
        assert!(check_amount_exceeds(&inv, &reference_for(&inv, 100.0), &policy).is_none());

        inv.total_amount = 110.01;
        assert!(check_amount_exceeds(&inv, &reference_for(&inv, 100.0), &policy).is_some());

        inv.total_amount = 111.0;
        let flag = check_amount_exceeds(&inv, &reference_for(&inv, 100.0), &policy).unwrap();
        assert_eq!(flag.severity, Severity::High);
        assert_eq!(flag.field, "totalAmount");
        assert!(flag.description.ends_with("by 11.0%"), "{}", flag.description);
    }

    #[test]
    fn tax_rule_uses_taxable_base() {
        let mut inv = clean_invoice();
        assert!(check_tax_calculation(&inv, &AuditPolicy::default()).is_none());

        // 绝对容差 1000 下小额偏差不触发
        inv.tax_amount = 0.0;
        assert!(check_tax_calculation(&inv, &AuditPolicy::default()).is_none());

        let strict = AuditPolicy {
            tax_tolerance: 1.0,
            ..AuditPolicy::default()
        };
        let flag = check_tax_calculation(&inv, &strict).unwrap();
        assert_eq!(flag.severity, Severity::Medium);
        assert!(flag.description.contains("expected ₹21.24"), "{}", flag.description);
    }

    #[test]
    fn large_tax_deviation_fires_with_default_tolerance() {
        let mut inv = clean_invoice();
        inv.total_amount = 590_000.0;
        inv.tax_amount = 50_000.0;
        let flag = check_tax_calculation(&inv, &AuditPolicy::default()).unwrap();
        assert_eq!(flag.id, "R-FIN-004");
        assert_eq!(flag.field, "taxAmount");
    }

    #[tokio::test]
    async fn short_or_missing_gst_gives_one_medium_flag() {
        for gst in [None, Some("29ABCDE1234"), Some("   "), Some("29ABCDE1234F1Z"), Some(" 29ABCDE1234F1Z ")] {
            let mut inv = clean_invoice();
            inv.gst_no = gst.map(str::to_string);
            let flags = run(&inv, None).await;
            let gst_flags: Vec<_> = flags.iter().filter(|f| f.field == "gstNo").collect();
            assert_eq!(gst_flags.len(), 1);
            assert_eq!(gst_flags[0].severity, Severity::Medium);
        }
    }

    #[test]
    fn fifteen_character_gst_passes() {
        let policy = AuditPolicy::default();
        let mut inv = clean_invoice();
        inv.gst_no = Some("29ABCDE1234F1Z5".to_string());
        assert!(check_gst_number(&inv, &policy).is_none());
        inv.gst_no = Some("29ABCDE1234F1Z".to_string());
        assert!(check_gst_number(&inv, &policy).is_some());
    }

    #[tokio::test]
    async fn missing_reference_key_is_high() {
        let mut inv = clean_invoice();
        inv.po_no = Some("  ".to_string());
        let flags = run(&inv, None).await;
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].id, "R-PO-005");
        assert_eq!(flags[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn date_sequence_fires_only_on_parsable_dates() {
        let mut inv = clean_invoice();
        inv.date = "2024-01-10".to_string();
        let po = reference_for(&inv, 118.0);
        let flags = run(&inv, Some(&po)).await;
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].id, "R-DATE-006");
        assert_eq!(flags[0].severity, Severity::Medium);

        inv.date = "10/01/2024".to_string();
        assert!(run(&inv, Some(&po)).await.is_empty());

        let mut bad_po = po.clone();
        bad_po.date = "Jan 15".to_string();
        inv.date = "2024-01-10".to_string();
        assert!(run(&inv, Some(&bad_po)).await.is_empty());
    }

    #[tokio::test]
    async fn line_items_half_unmatched_fires() {
        let mut inv = clean_invoice();
        inv.line_items = vec![
            LineItem::new("office chairs", 1.0, 50.0, 50.0),
            LineItem::new("Consulting", 1.0, 50.0, 50.0),
        ];
        let po = reference_for(&clean_invoice(), 118.0);
        let flags = run(&inv, Some(&po)).await;
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].id, "R-ITEM-007");
        assert!(flags[0].description.ends_with("Consulting"));

        // 参考单据无明细时不检查
        let mut empty_po = po.clone();
        empty_po.line_items.clear();
        assert!(run(&inv, Some(&empty_po)).await.is_empty());
    }

    #[tokio::test]
    async fn vendor_mismatch_uses_seller_fallback() {
        let mut inv = clean_invoice();
        inv.vendor = "Acme Holdings".to_string();
        let po = reference_for(&clean_invoice(), 118.0);

        let flags = run(&inv, Some(&po)).await;
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].id, "R-SEM-001");

        inv.seller = Some(" acme traders".to_string());
        assert!(run(&inv, Some(&po)).await.is_empty());
    }

    #[tokio::test]
    async fn anomalies_pass_through_with_positional_ids() {
        let mut inv = clean_invoice();
        inv.anomalies = Some(vec![
            "MATHEMATICAL error: line total mismatch".to_string(),
            "Font inconsistency near header".to_string(),
            "Suspicious stamp overlay".to_string(),
        ]);
        let flags = run(&inv, None).await;
        assert_eq!(flags.len(), 3);
        let ids: Vec<_> = flags.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["R-STR-008-0", "R-STR-008-1", "R-STR-008-2"]);
        let severities: Vec<_> = flags.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium, Severity::High]);
    }

    #[tokio::test]
    async fn flags_carry_field_locators() {
        let mut inv = clean_invoice();
        inv.gst_no = None;
        let bbox = BoundingBox::new(15.0, 18.0, 30.0, 3.0);
        inv.field_coords = Some([("gstNo".to_string(), bbox)].into_iter().collect());
        let flags = run(&inv, None).await;
        assert_eq!(flags[0].coords, Some(bbox));
    }

    #[tokio::test]
    async fn rules_without_reference_are_skipped() {
        let mut inv = clean_invoice();
        inv.vendor = "Somebody Else".to_string();
        inv.total_amount = 1_000_000.0;
        inv.tax_amount = 152_542.37;
        inv.date = "1999-01-01".to_string();
        assert!(run(&inv, None).await.is_empty());
    }

    #[test]
    fn catalogue_follows_rule_order() {
        let catalogue = RulesEngine::new(AuditPolicy::default()).catalogue();
        assert_eq!(catalogue.len(), 8);
        assert_eq!(catalogue[0].id, "R-SEM-001");
        assert_eq!(catalogue[7].severity, None);
        assert_eq!(catalogue[2].severity, Some(Severity::Medium));
    }
}

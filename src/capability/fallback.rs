use async_trait::async_trait;
use chrono::Duration;

use super::{DocumentExtractor, EquivalenceOracle, ReferenceGenerator};
use crate::error::CapabilityError;
use crate::models::{ExtractedData, LineItem};
use crate::utils::{normalize_name, parse_date, sha256_hex, DATE_FORMAT};

const TEMPLATE_GST_NO: &str = "27AABCU9603R1ZN";
const TEMPLATE_FALLBACK_DATE: &str = "2023-01-01";
const TEMPLATE_LEAD_DAYS: i64 = 10;

/// 未配置远程能力时的抽取器：抽取没有兜底，直接失败
pub struct UnconfiguredExtractor;

#[async_trait]
impl DocumentExtractor for UnconfiguredExtractor {
    async fn extract(&self, _bytes: &[u8], _mime_type: &str) -> Result<ExtractedData, CapabilityError> {
        Err(CapabilityError::NotConfigured)
    }
}

/// 仅做规范化精确比较的等价判断
pub struct NormalizedNameOracle;

#[async_trait]
impl EquivalenceOracle for NormalizedNameOracle {
    async fn judge(&self, name1: &str, name2: &str) -> Result<bool, CapabilityError> {
        Ok(normalize_name(name1) == normalize_name(name2))
    }
}

/// 按发票模板合成参考采购单
pub struct TemplateReferenceGenerator;

impl TemplateReferenceGenerator {
    pub fn synthesize(invoice: &ExtractedData) -> ExtractedData {
        let date = parse_date(&invoice.date)
            .map(|d| (d - Duration::days(TEMPLATE_LEAD_DAYS)).format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| TEMPLATE_FALLBACK_DATE.to_string());

        let line_items = invoice
            .line_items
            .iter()
            .map(|item| LineItem {
                coords: None,
                ..item.clone()
            })
            .collect();

        let po_no = invoice
            .reference_key()
            .map(str::to_string)
            .unwrap_or_else(|| derived_po_number(&invoice.invoice_no));

        ExtractedData {
            vendor: invoice.vendor.clone(),
            seller: None,
            invoice_no: format!("REF-{}", invoice.invoice_no),
            date,
            total_amount: invoice.total_amount,
            tax_amount: invoice.tax_amount,
            gst_no: Some(TEMPLATE_GST_NO.to_string()),
            po_no: Some(po_no),
            anomalies: None,
            line_items,
            field_coords: None,
        }
    }
}

#[async_trait]
impl ReferenceGenerator for TemplateReferenceGenerator {
    async fn generate(&self, invoice: &ExtractedData) -> Result<ExtractedData, CapabilityError> {
        Ok(Self::synthesize(invoice))
    }
}

/// PO-xxxxx，由发票号稳定派生
fn derived_po_number(invoice_no: &str) -> String {
    let digest = sha256_hex(invoice_no.as_bytes());
    let seed = u32::from_str_radix(&digest[..8], 16).unwrap_or(0);
    format!("PO-{}", 10_000 + seed % 90_000)
}

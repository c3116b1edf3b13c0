use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};

use super::response::{parse_decision, parse_document};
use super::{DecisionReasoner, DocumentExtractor, EquivalenceOracle, ReferenceGenerator};
use crate::config::GeminiConfig;
use crate::error::CapabilityError;
use crate::models::{AuditDecision, AuditFlag, ExtractedData};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini generateContent 远程适配器
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// 未配置密钥时返回 None
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>, CapabilityError> {
        let Some(api_key) = config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Some(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }))
    }

    /// 密钥走请求头，不进 URL (reqwest 错误信息会带上 URL)
    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn generate_text(&self, parts: Vec<Value>) -> Result<String, CapabilityError> {
        let payload = json!({ "contents": [ { "parts": parts } ] });

        let response = self
            .client
            .post(self.url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Upstream {
                status,
                body: truncate(&body, 320),
            });
        }

        let body: Value = response.json().await?;
        let output = body["candidates"]
            .as_array()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate["content"]["parts"].as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if output.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(output)
    }

    async fn prompt(&self, prompt: String) -> Result<String, CapabilityError> {
        self.generate_text(vec![json!({ "text": prompt })]).await
    }
}

#[async_trait]
impl DocumentExtractor for GeminiClient {
    async fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<ExtractedData, CapabilityError> {
        let parts = vec![
            json!({ "text": extraction_prompt() }),
            json!({
                "inline_data": {
                    "mime_type": mime_type,
                    "data": BASE64.encode(bytes),
                }
            }),
        ];
        let raw = self.generate_text(parts).await?;
        parse_document(&raw)
    }
}

#[async_trait]
impl EquivalenceOracle for GeminiClient {
    async fn judge(&self, name1: &str, name2: &str) -> Result<bool, CapabilityError> {
        let raw = self.prompt(equivalence_prompt(name1, name2)).await?;
        Ok(raw.to_lowercase().contains("true"))
    }
}

#[async_trait]
impl ReferenceGenerator for GeminiClient {
    async fn generate(&self, invoice: &ExtractedData) -> Result<ExtractedData, CapabilityError> {
        let raw = self.prompt(generation_prompt(invoice)?).await?;
        let mut reference = parse_document(&raw)?;
        // 生成的参考单据不携带发票侧信息
        reference.seller = None;
        reference.anomalies = None;
        reference.field_coords = None;
        Ok(reference)
    }
}

#[async_trait]
impl DecisionReasoner for GeminiClient {
    async fn reason(
        &self,
        invoice: &ExtractedData,
        reference: Option<&ExtractedData>,
        flags: &[AuditFlag],
    ) -> Result<AuditDecision, CapabilityError> {
        let raw = self.prompt(decision_prompt(invoice, reference, flags)?).await?;
        parse_decision(&raw)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn extraction_prompt() -> &'static str {
    r#"You are an expert Indian statutory auditor and data extractor.
Deeply analyze this invoice and extract the following data with high precision.

REQUIRED FIELDS:
1. Vendor name (primary entity)
2. Seller name (specific seller/branch if mentioned separately)
3. Invoice number
4. Date (YYYY-MM-DD)
5. GST number (if present, must be 15 chars)
6. PO number (if present)
7. Total amount (numeric only)
8. Tax/GST amount (numeric only)
9. Line items with: description, quantity, unit price, total, HSN/SAC code

DEEP AUDIT ANALYSIS:
Also perform a structural audit of the document and list "anomalies":
- Mathematical errors: do line totals equal qty * price? Does the sum of line totals + tax match the total?
- Visual flags: font mismatches, suspicious stamp overlays, digitally altered text areas.
- Compliance flags: is the GST number valid (state code 1-37, PAN, 1, Z, checksum)?
- Logic flags: is the date valid? Are there unrealistic amounts?

Return ONLY a valid JSON object with this exact structure:
{
  "vendor": "string",
  "seller": "string or null",
  "invoiceNo": "string",
  "date": "string",
  "totalAmount": number,
  "taxAmount": number,
  "gstNo": "string or null",
  "poNo": "string or null",
  "anomalies": ["list of strings or empty"],
  "lineItems": [
    {"description": "string", "quantity": number, "unitPrice": number, "total": number, "hsnCode": "string or null"}
  ]
}

Do not include any markdown formatting or explanation, only the JSON."#
}

fn equivalence_prompt(name1: &str, name2: &str) -> String {
    format!(
        r#"Determine if these two entity names refer to the same organization/vendor:
1. "{}"
2. "{}"

Consider common abbreviations (Ltd vs Limited), branch names, and minor typos.
Return ONLY 'True' if they are the same entity, 'False' otherwise."#,
        name1, name2
    )
}

fn generation_prompt(invoice: &ExtractedData) -> Result<String, CapabilityError> {
    let items = serde_json::to_string(&invoice.line_items)?;
    Ok(format!(
        r#"You are generating a realistic Indian Government Purchase Order (PO) document.

Based on this invoice:
- Vendor: {}
- Invoice No: {}
- Total: ₹{}
- Line Items: {}

Generate a corresponding PO that would have authorized this purchase.
The PO should have:
- A PO number in format: PO/[MINISTRY]/2024/[NUMBER]
- Same vendor
- Same or slightly different amounts (within 10%)
- Similar line items
- Date before the invoice date (YYYY-MM-DD)

Return ONLY a valid JSON object with the same structure as the invoice extraction format
(vendor, invoiceNo, date, totalAmount, taxAmount, gstNo, poNo, lineItems)."#,
        invoice.vendor, invoice.invoice_no, invoice.total_amount, items
    ))
}

fn decision_prompt(
    invoice: &ExtractedData,
    reference: Option<&ExtractedData>,
    flags: &[AuditFlag],
) -> Result<String, CapabilityError> {
    let invoice_json = serde_json::to_string_pretty(invoice)?;
    let reference_json = match reference {
        Some(reference) => serde_json::to_string_pretty(reference)?,
        None => "{}".to_string(),
    };
    let flags_json = serde_json::to_string_pretty(flags)?;

    Ok(format!(
        r#"You are an expert Indian statutory auditor analyzing invoice compliance.

INVOICE DATA:
{}

REFERENCE PO:
{}

IDENTIFIED FLAGS:
{}

Provide a comprehensive audit decision with:
1. Risk score (0-100, where 100 is highest risk)
2. Risk level (LOW below 30, MEDIUM from 30, HIGH from 60)
3. Step-by-step reasoning (as array of strings)
4. Overall explanation
5. Recommendation (APPROVE, REVIEW, REJECT)

Consider:
- Severity and number of compliance violations
- Financial impact and materiality
- Statutory requirements under Indian law
- Government procurement guidelines

Return ONLY valid JSON:
{{
  "riskScore": number,
  "riskLevel": "LOW|MEDIUM|HIGH",
  "reasoningSteps": ["step1", "step2"],
  "explanation": "string",
  "recommendation": "APPROVE|REVIEW|REJECT"
}}"#,
        invoice_json, reference_json, flags_json
    ))
}

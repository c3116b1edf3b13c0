use serde::Deserialize;

use crate::error::CapabilityError;
use crate::models::{AuditDecision, ExtractedData, Recommendation, RiskLevel};

/// 去掉 ```json / ``` 围栏
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// 文档字段形状 -> ExtractedData
pub fn parse_document(raw: &str) -> Result<ExtractedData, CapabilityError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(CapabilityError::EmptyResponse);
    }
    let data: ExtractedData = serde_json::from_str(body)?;
    if data.vendor.trim().is_empty() {
        return Err(CapabilityError::Malformed("vendor is empty".to_string()));
    }
    Ok(data)
}

/// 决策形状 (兼容 score/level/steps 简写)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionPayload {
    #[serde(alias = "score")]
    risk_score: i64,
    #[serde(alias = "level")]
    risk_level: String,
    #[serde(alias = "steps")]
    reasoning_steps: Vec<String>,
    explanation: String,
    recommendation: String,
}

pub fn parse_decision(raw: &str) -> Result<AuditDecision, CapabilityError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(CapabilityError::EmptyResponse);
    }
    let payload: DecisionPayload = serde_json::from_str(body)?;

    let risk_score = u8::try_from(payload.risk_score)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| CapabilityError::Malformed(format!("score {} out of range", payload.risk_score)))?;
    let risk_level: RiskLevel = payload.risk_level.parse().map_err(CapabilityError::Malformed)?;
    let recommendation: Recommendation = payload.recommendation.parse().map_err(CapabilityError::Malformed)?;

    let decision = AuditDecision {
        risk_score,
        risk_level,
        reasoning_steps: payload.reasoning_steps,
        explanation: payload.explanation,
        recommendation,
    };
    decision.check_consistency().map_err(CapabilityError::Malformed)?;
    Ok(decision)
}

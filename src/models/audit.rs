use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::document::{BoundingBox, ExtractedData};

/// 风险等级 / 规则严重度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

pub type Severity = RiskLevel;

impl RiskLevel {
    pub const HIGH_THRESHOLD: u8 = 60;
    pub const MEDIUM_THRESHOLD: u8 = 30;

    /// 分数 -> 等级
    pub fn from_score(score: u8) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// 严重度权重
    pub fn weight(self) -> u32 {
        match self {
            RiskLevel::High => 35,
            RiskLevel::Medium => 20,
            RiskLevel::Low => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Approve,
    Review,
    Reject,
}

impl Recommendation {
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::High => Recommendation::Reject,
            RiskLevel::Medium => Recommendation::Review,
            RiskLevel::Low => Recommendation::Approve,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Approve => "APPROVE",
            Recommendation::Review => "REVIEW",
            Recommendation::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Recommendation::Approve),
            "REVIEW" => Ok(Recommendation::Review),
            "REJECT" => Ok(Recommendation::Reject),
            other => Err(format!("unknown recommendation '{}'", other)),
        }
    }
}

/// 结果状态；失败的审计不产生结果，因此只有 completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Completed,
}

/// 规则违例记录 (纯描述，无处理状态)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFlag {
    pub id: String,
    pub rule: String,
    pub severity: Severity,
    pub description: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<BoundingBox>,
}

/// 风险决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDecision {
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub reasoning_steps: Vec<String>,
    pub explanation: String,
    pub recommendation: Recommendation,
}

impl AuditDecision {
    /// 分数在 0..=100 且与等级一致
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.risk_score > 100 {
            return Err(format!("score {} out of range", self.risk_score));
        }
        if RiskLevel::from_score(self.risk_score) != self.risk_level {
            return Err(format!(
                "level {} inconsistent with score {}",
                self.risk_level, self.risk_score
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Info,
    Success,
    Warning,
    Error,
}

/// 执行轨迹条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    pub timestamp: String,
}

/// 审计结果：每个请求生成一次，之后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    pub id: String,
    pub timestamp: String,
    pub status: AuditStatus,
    pub doc_type: String,
    pub extracted_data: ExtractedData,
    pub po_match: Option<ExtractedData>,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub flags: Vec<AuditFlag>,
    pub reasoning: Vec<String>,
    pub explanation: String,
    pub recommendation: Recommendation,
    pub match_score: f64,
    pub hash: String,
    pub agent_trace: Vec<AgentStep>,
}

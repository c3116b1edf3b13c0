pub mod audit;
pub mod document;

pub use audit::{
    AgentStep, AuditDecision, AuditFlag, AuditResult, AuditStatus, Recommendation, RiskLevel,
    Severity, StepStatus,
};
pub use document::{BoundingBox, ExtractedData, FieldCoordinates, LineItem};

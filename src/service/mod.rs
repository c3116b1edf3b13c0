pub mod matcher;
pub mod orchestrator;
pub mod risk;
pub mod rules;

pub use matcher::{line_item_similarity, MatchingService, ResolvedReference};
pub use orchestrator::{AuditOrchestrator, TraceCollector, UploadedDocument};
pub use risk::{calculate_risk_score, DeterministicReasoner, RiskScoringService};
pub use rules::{Rule, RuleDescriptor, RulesEngine};

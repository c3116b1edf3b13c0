pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::service::AuditOrchestrator;

pub use handlers::*;

/// 共享状态：编排器 + 远程能力是否启用
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AuditOrchestrator>,
    pub gemini_configured: bool,
    /// 上传请求体上限 (字节)
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(orchestrator: Arc<AuditOrchestrator>, gemini_configured: bool) -> Self {
        Self {
            orchestrator,
            gemini_configured,
            max_upload_bytes: ServerConfig::default().max_upload_bytes(),
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

pub fn router(state: AppState) -> Router {
    // 审计路由
    let audit_routes = Router::new()
        .route("/api/audit/sample", post(audit_sample))
        .route("/api/audit/upload", post(audit_upload))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    // 档案库只读路由
    let archive_routes = Router::new()
        .route("/api/archive", get(archive_overview))
        .route("/api/archive/invoices", get(archive_invoices))
        .route("/api/archive/pos", get(archive_references))
        .route("/api/archive/invoices.csv", get(archive_invoices_csv));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/rules/list", get(rules_list))
        .merge(audit_routes)
        .merge(archive_routes)
        .with_state(state)
}

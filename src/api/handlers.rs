use axum::{
    extract::{Json, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use indexmap::IndexMap;
use serde::Serialize;

use super::AppState;
use crate::models::ExtractedData;
use crate::service::{RuleDescriptor, UploadedDocument};
use crate::store::export_invoices_csv;

const SERVICE_NAME: &str = "VerifiX Invoice Audit Agent";
const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// 健康检查响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub gemini_configured: bool,
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// 档案库全量视图
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub user_uploaded_invoice: Vec<ExtractedData>,
    pub reference_documents: IndexMap<String, ExtractedData>,
}

/// 规则目录
#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleDescriptor>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let response = ErrorResponse { error: message.into() };
    (status, Json(response)).into_response()
}

/// 健康检查
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        gemini_configured: state.gemini_configured,
    })
}

/// 内置样例审计
pub async fn audit_sample(State(state): State<AppState>) -> Response {
    let result = state.orchestrator.process_sample().await;
    (StatusCode::OK, Json(result)).into_response()
}

/// 上传发票 (file) 及可选参考采购单 (po_file) 审计
pub async fn audit_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut invoice: Option<UploadedDocument> = None;
    let mut reference: Option<UploadedDocument> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(e.status(), format!("Invalid multipart body: {}", e)),
        };

        let name = field.name().unwrap_or_default().to_string();
        if name != "file" && name != "po_file" {
            continue;
        }
        if field.file_name().is_some_and(str::is_empty) {
            continue;
        }

        let mime_type = field.content_type().unwrap_or(DEFAULT_MIME_TYPE).to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return error_response(e.status(), format!("Failed to read {}: {}", name, e)),
        };
        if bytes.is_empty() {
            continue;
        }

        let doc = UploadedDocument::new(bytes.to_vec(), mime_type);
        if name == "file" {
            invoice = Some(doc);
        } else {
            reference = Some(doc);
        }
    }

    let Some(invoice) = invoice else {
        return error_response(StatusCode::BAD_REQUEST, "No file provided");
    };

    match state.orchestrator.process_document(&invoice, reference.as_ref()).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            tracing::error!("Audit failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn archive_overview(State(state): State<AppState>) -> Json<ArchiveResponse> {
    let archive = state.orchestrator.archive();
    Json(ArchiveResponse {
        user_uploaded_invoice: archive.invoices(),
        reference_documents: archive.references().into_iter().collect(),
    })
}

pub async fn archive_invoices(State(state): State<AppState>) -> Json<Vec<ExtractedData>> {
    Json(state.orchestrator.archive().invoices())
}

pub async fn archive_references(State(state): State<AppState>) -> Json<IndexMap<String, ExtractedData>> {
    Json(state.orchestrator.archive().references().into_iter().collect())
}

/// 已上传发票导出 CSV
pub async fn archive_invoices_csv(State(state): State<AppState>) -> Response {
    let invoices = state.orchestrator.archive().invoices();
    let mut buf = Vec::new();
    if let Err(e) = export_invoices_csv(&invoices, &mut buf) {
        tracing::error!("CSV export failed: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/csv; charset=utf-8")], buf).into_response()
}

pub async fn rules_list(State(state): State<AppState>) -> Json<RulesResponse> {
    Json(RulesResponse {
        rules: state.orchestrator.rules_catalogue(),
    })
}

use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};
use verifix_audit::{api, AppConfig, AuditOrchestrator, StatutoryArchive};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式，RUST_LOG 控制级别 (默认 info)
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    // 档案库 (含预置参考单据) + 审计编排
    let archive = Arc::new(StatutoryArchive::new());
    info!("Statutory archive seeded with {} reference documents", archive.reference_count());
    let orchestrator = Arc::new(AuditOrchestrator::from_config(&config, archive)?);

    let state = api::AppState::new(orchestrator, config.gemini.is_configured())
        .with_upload_limit(config.server.max_upload_bytes());
    let app = api::router(state).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/health");
    info!("  POST /api/audit/sample          - built-in sample invoice");
    info!("  POST /api/audit/upload          - multipart: file, po_file (optional)");
    info!("  GET  /api/archive               - archived invoices + reference POs");
    info!("  GET  /api/archive/invoices.csv  - CSV export");
    info!("  GET  /api/rules/list");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

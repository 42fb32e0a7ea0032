use price_lookup::api::{create_router, AppState};
use price_lookup::AppConfig;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::from_env();
    info!("Starting server with config: {:?}", config);

    let state = Arc::new(AppState {
        tuning: config.lookup.clone(),
    });

    let app = create_router(state).layer(ServiceBuilder::new());

    // 启动服务器
    let addr = config.bind_addr();
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/lookup  - 价目匹配 + 计费");
    info!("  POST /api/import  - CSV 导入 + 过滤");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! 主应用程序入口
//!
//! 启动 Axum Web API 服务。

use std::sync::Arc;

use application::{ChatService, ChatServiceDependencies, LocalRoomBroadcaster, SystemClock};
use config::AppConfig;
use infrastructure::{create_pg_pool, PgChatRoomRepository};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();
    config.validate().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "配置未通过生产校验，仅适合开发环境运行");
    });

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(&config.database.url).await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let room_repository = Arc::new(PgChatRoomRepository::new(pg_pool));
    let clock = Arc::new(SystemClock);
    let broadcaster = Arc::new(LocalRoomBroadcaster::with_capacity(
        config.broadcast.capacity,
    ));

    let chat_service = ChatService::new(ChatServiceDependencies {
        room_repository,
        clock,
        broadcaster: broadcaster.clone(),
    });

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(Arc::new(chat_service), broadcaster, jwt_service);

    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("聊天服务器启动在 http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

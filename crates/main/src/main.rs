//! 主应用程序入口
//!
//! 加载配置、连接数据库、组装各层依赖并启动 Axum 服务。

use std::sync::Arc;

use application::{
    BroadcastCoordinator, CoordinatorDependencies, CredentialAuthority, IdentityResolver,
    PresenceRegistry, SystemClock, UserService, UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig, JwtCredentialAuthority};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "configuration loaded");

    let infrastructure = Infrastructure::connect(InfrastructureConfig::from(&config)).await?;
    let user_repository = infrastructure.user_repository();
    let credentials: Arc<dyn CredentialAuthority> =
        Arc::new(JwtCredentialAuthority::new(&config.jwt));

    let user_service = Arc::new(UserService::new(UserServiceDependencies {
        user_repository: user_repository.clone(),
        password_hasher: infrastructure.password_hasher(),
        clock: Arc::new(SystemClock),
    }));

    // 在线注册表只存在于本进程内存中
    let coordinator = Arc::new(BroadcastCoordinator::new(CoordinatorDependencies {
        identity_resolver: Arc::new(IdentityResolver::new(
            credentials.clone(),
            user_repository.clone(),
        )),
        message_repository: infrastructure.message_repository(),
        user_repository,
        registry: Arc::new(PresenceRegistry::new()),
    }));

    let state = AppState::new(
        user_service,
        coordinator,
        credentials,
        config.broadcast.outbox_capacity,
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "chat server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}

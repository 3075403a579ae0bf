//! 只读数据库巡检服务
//!
//! 启动流程：
//! - 读取环境变量中的服务设置
//! - 加载并校验后端配置文件（失败即退出）
//! - 启动 HTTP 服务，退出时关闭所有数据库连接

use anyhow::Context;
use common::config::AppConfig;
use inspect_service::config_store::ConfigStore;
use inspect_service::create_router;
use inspect_service::state::AppState;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "inspect-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 须在读取任何设置之前加载
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);
    let store = match ConfigStore::load(&config.db_config_path, config.env_prefix.clone()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(path = %config.db_config_path, error = %e, "加载后端配置失败");
            std::process::exit(1);
        }
    };

    let state = AppState::new(config.clone(), store);
    let registry = state.registry.clone();
    let app = create_router(state);

    // 启动服务
    let addr = format!("{}:{}", config.host, config.port);
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    let released = registry.release_all().await;
    info!(service = SERVICE_NAME, released, "服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，开始关闭");
}

/// Loads `KEY=VALUE` lines from `.env` in the working directory. Variables
/// already present in the environment win.
fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value);
            }
        }
    }
}

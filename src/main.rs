//! chainvault 主入口
//! 加载配置、校验链表，并探测每条外部链的 RPC 健康状况

use std::{sync::Arc, time::Instant};

use anyhow::Result;
use chainvault::{app_state::AppState, config::Config, infrastructure::logging, metrics};
use futures::future::join_all;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量与配置
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    config.validate()?;

    // 2. 初始化日志
    logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    tracing::info!("starting chainvault probe");

    // 3. 组装服务（注册表校验失败直接退出）
    let state = AppState::new(Arc::new(config))?;
    let wallets = state.engine.list_wallets().await?;
    tracing::info!(
        chains = state.registry.len(),
        wallets = wallets.len(),
        store = %state.config.store.backend,
        "wallet engine ready"
    );

    // 4. 并发探测外部链
    let timeout = state.config.engine.balance_timeout();
    let probes = state.registry.external().map(|chain| {
        let client = state.blockchain_client.clone();
        async move {
            let start = Instant::now();
            let result = tokio::time::timeout(timeout, client.get_block_number(chain)).await;
            (chain, result, start.elapsed())
        }
    });

    let mut healthy = 0usize;
    for (chain, result, elapsed) in join_all(probes).await {
        let latency_ms = elapsed.as_millis() as u64;
        match result {
            Ok(Ok(height)) => {
                healthy += 1;
                tracing::info!(chain = %chain.id, height, latency_ms, "rpc healthy");
            }
            Ok(Err(e)) => {
                tracing::warn!(chain = %chain.id, error = %e, code = e.code(), latency_ms, "rpc unhealthy");
            }
            Err(_) => {
                tracing::warn!(chain = %chain.id, latency_ms, "rpc probe timed out");
            }
        }
    }

    let total = state.registry.external().count();
    tracing::info!(healthy, total, "probe finished");
    tracing::debug!(metrics = %metrics::render_prometheus(), "metrics snapshot");

    Ok(())
}

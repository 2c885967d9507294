//! Deskbee - 弹性 IT 工单助理
//!
//! 入口：初始化日志与配置，搭好存储（内存 + 故障注入）、分发器与推荐引擎，
//! 启动自检后进入操作员 REPL。Ctrl-C 触发取消令牌，优雅退出。

use std::sync::Arc;

use anyhow::Context;
use deskbee::cli::run_repl;
use deskbee::config::load_config;
use deskbee::dispatch::Dispatcher;
use deskbee::orchestrate::OrchestrationCore;
use deskbee::recommend::RecommendationEngine;
use deskbee::store::{FlakyStore, InMemoryStore, SharedStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer())
        .init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;
    tracing::info!(
        name = cfg.app.name.as_deref().unwrap_or("deskbee"),
        failure_rate = cfg.store.failure_rate,
        max_attempts = cfg.dispatch.max_attempts,
        "Starting up"
    );

    // 存储：内存实现外面套一层故障注入，整个上层只看得到读写契约
    let inner = Arc::new(InMemoryStore::new());
    if cfg.app.seed_sample_data {
        inner.seed_sample_data().await;
    }
    let store: SharedStore = Arc::new(FlakyStore::new(inner, cfg.store.clone()));

    let policy = cfg
        .dispatch
        .into_policy()
        .context("Invalid dispatch configuration")?;
    let dispatcher = match cfg.dispatch.jitter_seed {
        Some(seed) => Dispatcher::with_seed(policy, seed),
        None => Dispatcher::new(policy),
    };
    let engine = RecommendationEngine::new(cfg.recommend.clone());
    let core = Arc::new(OrchestrationCore::new(store, Arc::new(dispatcher), engine));

    // Ctrl-C -> 取消令牌，REPL 与进行中的分发都会看到
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            ctrl_c_cancel.cancel();
        }
    });

    // 启动自检：连不上存储直接退出非零
    let attempts = core
        .ping(&cancel)
        .await
        .map_err(|report| anyhow::anyhow!("{}", report.reason))
        .context("Ticket store is unreachable at startup")?;
    tracing::info!(attempts, "Store connectivity verified");

    run_repl(core, cancel).await.context("REPL failed")?;

    tracing::info!("Goodbye");
    Ok(())
}

//! 故障注入存储
//!
//! 包装任意 TicketStore，在每次调用前注入均匀分布的延迟与按概率触发的 500/503，
//! 模拟不可靠网络。ping 放行（对齐原型中 /health 跳过模拟）。
//! RNG 可播种，测试中可完全复现注入序列。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::store::{ListFilter, SharedStore, StoreError, TicketStore};
use crate::ticket::{Ticket, TicketDraft, TicketPatch};

/// 网络模拟参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 注入延迟下限（毫秒）
    pub min_latency_ms: u64,
    /// 注入延迟上限（毫秒）
    pub max_latency_ms: u64,
    /// 每次调用返回注入 5xx 的概率 [0,1]
    pub failure_rate: f64,
    /// RNG 种子；None 时取随机熵
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: 25,
            max_latency_ms: 200,
            failure_rate: 0.25,
            seed: None,
        }
    }
}

/// 故障注入包装层：调用先经过 inject()，再转发给内层存储
pub struct FlakyStore {
    inner: SharedStore,
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl FlakyStore {
    pub fn new(inner: SharedStore, config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// 抽取本次调用的延迟与是否注入失败。锁只覆盖抽样，不跨 await。
    fn draw(&self) -> (Duration, Option<u16>) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let lo = self.config.min_latency_ms.min(self.config.max_latency_ms);
        let hi = self.config.min_latency_ms.max(self.config.max_latency_ms);
        let latency = Duration::from_millis(rng.gen_range(lo..=hi));
        let failure = if rng.gen::<f64>() < self.config.failure_rate {
            // 与原型一致：在 500 / 503 间随机挑一个
            Some(if rng.gen::<bool>() { 500 } else { 503 })
        } else {
            None
        };
        (latency, failure)
    }

    async fn inject(&self, op: &str) -> Result<(), StoreError> {
        let (latency, failure) = self.draw();
        tokio::time::sleep(latency).await;
        if let Some(status) = failure {
            tracing::debug!(op, status, latency_ms = latency.as_millis() as u64, "Injected server error");
            return Err(StoreError::server(
                status,
                format!("Simulated failure during {op}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        // 健康检查不参与模拟
        self.inner.ping().await
    }

    async fn create(&self, draft: TicketDraft) -> Result<Ticket, StoreError> {
        self.inject("create").await?;
        self.inner.create(draft).await
    }

    async fn get(&self, id: &str) -> Result<Ticket, StoreError> {
        self.inject("get").await?;
        self.inner.get(id).await
    }

    async fn update(&self, id: &str, patch: TicketPatch) -> Result<Ticket, StoreError> {
        self.inject("update").await?;
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inject("delete").await?;
        self.inner.delete(id).await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Ticket>, StoreError> {
        self.inject("list").await?;
        self.inner.list(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn flaky(failure_rate: f64, seed: u64) -> FlakyStore {
        FlakyStore::new(
            Arc::new(InMemoryStore::new()),
            SimulationConfig {
                min_latency_ms: 0,
                max_latency_ms: 0,
                failure_rate,
                seed: Some(seed),
            },
        )
    }

    #[tokio::test]
    async fn test_always_failing_injects_server_error() {
        let store = flaky(1.0, 7);
        let err = store
            .create(TicketDraft::new("t", "d"))
            .await
            .unwrap_err();
        match err {
            StoreError::Server { status, .. } => assert!(status == 500 || status == 503),
            other => panic!("Expected injected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_never_failing_passes_through() {
        let store = flaky(0.0, 7);
        let ticket = store.create(TicketDraft::new("t", "d")).await.unwrap();
        let fetched = store.get(&ticket.id).await.unwrap();
        assert_eq!(fetched.id, ticket.id);
    }

    #[tokio::test]
    async fn test_ping_bypasses_injection() {
        let store = flaky(1.0, 7);
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_seeded_injection_is_reproducible() {
        let a = flaky(0.5, 42);
        let b = flaky(0.5, 42);
        for _ in 0..10 {
            assert_eq!(a.draw().1.is_some(), b.draw().1.is_some());
        }
    }
}

//! 弹性分发器
//!
//! 系统里唯一做重试的地方。执行一次后端操作：尝试 -> 分类 -> 按策略指数退避重试，
//! Validation / NotFound / Terminal 立即停止；预算耗尽返回 ExhaustedRetries。
//! 每次尝试输出一条结构化审计日志（JSON），退避睡眠与取消令牌竞争，取消即刻中止。

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::dispatch::classify::{classify, ErrorClass};
use crate::dispatch::retry::RetryPolicy;
use crate::store::StoreError;

/// 单次尝试的记录（一个重试序列内有效，序列结束即丢弃）
#[derive(Debug, Clone)]
pub struct CallAttempt {
    /// 尝试序号，从 1 开始
    pub attempt: u32,
    /// 本次尝试之前经历的退避时长（首次为零）
    pub delay: Duration,
    pub outcome: AttemptOutcome,
}

/// 尝试结果
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success,
    Failed { class: ErrorClass, reason: String },
}

/// 分发成功：负载 + 完整尝试轨迹（轨迹是重试行为对外唯一可见的痕迹）
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    pub value: T,
    pub trace: Vec<CallAttempt>,
}

impl<T> DispatchOutcome<T> {
    pub fn attempts(&self) -> u32 {
        self.trace.len() as u32
    }

    /// 重试序列累计退避时长
    pub fn total_delay(&self) -> Duration {
        self.trace.iter().map(|a| a.delay).sum()
    }
}

/// 分发失败的种类（比 ErrorClass 多出预算耗尽与取消两种终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    NotFound,
    Terminal,
    ExhaustedRetries,
    Cancelled,
}

/// 分发失败报告：种类 + 尝试次数 + 最后一次的原始原因 + 尝试轨迹
#[derive(Debug)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub attempts: u32,
    pub reason: String,
    pub trace: Vec<CallAttempt>,
}

impl FailureReport {
    fn from_trace(kind: FailureKind, reason: String, trace: Vec<CallAttempt>) -> Self {
        Self {
            kind,
            attempts: trace.len() as u32,
            reason,
            trace,
        }
    }
}

/// 弹性分发器：持有只读策略与可播种的抖动源
pub struct Dispatcher {
    policy: RetryPolicy,
    jitter_rng: Mutex<StdRng>,
}

impl Dispatcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            jitter_rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// 播种抖动源，重试序列（含退避时长）完全可复现
    pub fn with_seed(policy: RetryPolicy, seed: u64) -> Self {
        Self {
            policy,
            jitter_rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn jitter_offset(&self) -> f64 {
        let mut rng = self.jitter_rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(-1.0..=1.0)
    }

    /// 执行一个后端操作。f 按尝试序号构造每次调用的 Future；
    /// 单次尝试受 attempt_timeout 约束，超时按 Retryable 处理；
    /// 任一次成功立即短路返回，剩余预算作废。
    pub async fn execute<T, F, Fut>(
        &self,
        op: &str,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<DispatchOutcome<T>, FailureReport>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max = self.policy.max_attempts();
        let mut trace: Vec<CallAttempt> = Vec::new();
        let mut delay = Duration::ZERO;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = match timeout(self.policy.attempt_timeout(), f(attempt)).await {
                Ok(inner) => inner,
                Err(_) => Err(StoreError::Timeout(self.policy.attempt_timeout())),
            };

            match result {
                Ok(value) => {
                    trace.push(CallAttempt {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::Success,
                    });
                    self.audit(op, attempt, delay, "success", None);
                    return Ok(DispatchOutcome { value, trace });
                }
                Err(err) => {
                    let class = classify(&err);
                    let reason = err.to_string();
                    trace.push(CallAttempt {
                        attempt,
                        delay,
                        outcome: AttemptOutcome::Failed {
                            class,
                            reason: reason.clone(),
                        },
                    });
                    self.audit(op, attempt, delay, class_label(class), Some(&reason));

                    match class {
                        ErrorClass::Retryable if attempt < max => {
                            delay = self.policy.backoff_delay(attempt, self.jitter_offset());
                            tracing::debug!(op, attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                            // 取消信号在每次退避睡眠开始处被观察
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    tracing::warn!(op, attempt, "Dispatch cancelled during backoff");
                                    return Err(FailureReport::from_trace(
                                        FailureKind::Cancelled,
                                        reason,
                                        trace,
                                    ));
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        ErrorClass::Retryable => {
                            tracing::warn!(op, attempts = attempt, "Retry budget exhausted");
                            return Err(FailureReport::from_trace(
                                FailureKind::ExhaustedRetries,
                                reason,
                                trace,
                            ));
                        }
                        ErrorClass::Validation => {
                            return Err(FailureReport::from_trace(
                                FailureKind::Validation,
                                reason,
                                trace,
                            ));
                        }
                        ErrorClass::NotFound => {
                            return Err(FailureReport::from_trace(
                                FailureKind::NotFound,
                                reason,
                                trace,
                            ));
                        }
                        ErrorClass::Terminal => {
                            tracing::error!(op, attempt, reason = %reason, "Terminal dispatch failure");
                            return Err(FailureReport::from_trace(
                                FailureKind::Terminal,
                                reason,
                                trace,
                            ));
                        }
                    }
                }
            }
        }
    }

    /// 每次尝试一条审计日志（JSON），测试与排障都以此为准
    fn audit(&self, op: &str, attempt: u32, delay: Duration, outcome: &str, reason: Option<&str>) {
        let audit = serde_json::json!({
            "event": "dispatch_attempt",
            "op": op,
            "attempt": attempt,
            "delay_ms": delay.as_millis() as u64,
            "outcome": outcome,
            "reason": reason,
        });
        tracing::info!(audit = %audit.to_string(), "dispatch");
    }
}

fn class_label(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::Retryable => "retryable",
        ErrorClass::Validation => "validation",
        ErrorClass::NotFound => "not_found",
        ErrorClass::Terminal => "terminal",
    }
}

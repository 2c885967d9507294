//! 重试策略
//!
//! 不可变配置：最大尝试次数、基础延迟、指数退避倍率、抖动幅度、单次尝试超时。
//! 非法配置（max_attempts = 0、倍率 < 1）在构造时拒绝，而不是运行时爆炸。

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// 策略构造错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("backoff multiplier must be at least 1.0 (got {0})")]
    InvalidMultiplier(String),
}

/// 重试策略：所有 dispatch 调用只读共享同一份
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    jitter: Duration,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: f64,
        jitter: Duration,
        attempt_timeout: Duration,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(PolicyError::InvalidMultiplier(multiplier.to_string()));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            multiplier,
            jitter,
            attempt_timeout,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// 第 attempt 次尝试失败后的退避时长：base * multiplier^(attempt-1) + jitter * offset。
    /// offset ∈ [-1, 1] 由调用方的（可播种）抖动源提供；结果不会为负。
    pub fn backoff_delay(&self, attempt: u32, jitter_offset: f64) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let backoff = self.base_delay.as_secs_f64() * self.multiplier.powi(exp as i32);
        let jitter = self.jitter.as_secs_f64() * jitter_offset.clamp(-1.0, 1.0);
        Duration::from_secs_f64((backoff + jitter).max(0.0))
    }

    /// 全部重试都走满时的累计退避上界（不含抖动），用于测试断言
    pub fn total_backoff_without_jitter(&self) -> Duration {
        let mut total = 0.0;
        for attempt in 1..self.max_attempts {
            total += self.base_delay.as_secs_f64() * self.multiplier.powi((attempt - 1) as i32);
        }
        Duration::from_secs_f64(total)
    }
}

/// [dispatch] 配置段（毫秒粒度），经 into_policy 转为 RetryPolicy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
    pub attempt_timeout_ms: u64,
    /// 抖动源种子；None 时取随机熵
    pub jitter_seed: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            jitter_ms: 100,
            attempt_timeout_ms: 10_000,
            jitter_seed: None,
        }
    }
}

impl DispatchConfig {
    pub fn into_policy(&self) -> Result<RetryPolicy, PolicyError> {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            self.multiplier,
            Duration::from_millis(self.jitter_ms),
            Duration::from_millis(self.attempt_timeout_ms),
        )
    }
}

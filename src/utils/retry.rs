//! 指数退避重试策略
//!
//! 只对瞬时故障（[`AppError::is_transient`]）重试；服务端返回的格式良好的
//! 错误被视为最终结果，直接返回。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间
    pub base_delay: Duration,
    /// 每次重试等待时间的倍数
    pub backoff_factor: u32,
    /// 等待时间上限
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_factor: 2,
            max_delay,
        }
    }

    /// 不等待的策略，测试中使用
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// 第 `attempt` 次失败（从 1 开始）之后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// 执行操作，瞬时故障时按退避策略重试
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "⚠️ {} 失败 (尝试 {}/{}): {}，{:?} 后重试",
                        label, attempt, self.max_attempts, err, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(log_final(label, attempt, err)),
            }
        }
    }
}

fn log_final(label: &str, attempt: u32, err: AppError) -> AppError {
    if err.is_transient() {
        warn!("❌ {} 在 {} 次尝试后仍然失败: {}", label, attempt, err);
    }
    err
}

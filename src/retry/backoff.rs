//! 重试间隔策略
//!
//! 间隔只在同一次逻辑调用的两次尝试之间生效，不做后台调度。

use std::time::Duration;

use crate::config::BackoffConfig;

/// 重试间隔 trait
pub trait BackOffPolicy: Send + Sync {
    /// 第 `retry` 次重试（从 1 开始）前的等待时间
    fn backoff_duration(&self, retry: usize) -> Duration;
}

/// 根据配置创建
pub fn backoff_for(config: &BackoffConfig) -> Box<dyn BackOffPolicy> {
    match *config {
        BackoffConfig::None => Box::new(NoBackOff),
        BackoffConfig::Fixed { delay_ms } => {
            Box::new(FixedBackOff::new(Duration::from_millis(delay_ms)))
        }
        BackoffConfig::Exponential {
            initial_ms,
            max_ms,
            multiplier,
        } => Box::new(ExponentialBackOff::new(
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            multiplier,
        )),
    }
}

/// 不等待
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackOff;

impl BackOffPolicy for NoBackOff {
    fn backoff_duration(&self, _retry: usize) -> Duration {
        Duration::ZERO
    }
}

/// 固定间隔
#[derive(Debug, Clone, Copy)]
pub struct FixedBackOff {
    delay: Duration,
}

impl FixedBackOff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackOffPolicy for FixedBackOff {
    fn backoff_duration(&self, _retry: usize) -> Duration {
        self.delay
    }
}

/// 指数退避
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackOff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl ExponentialBackOff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max,
            multiplier: multiplier.max(1.0),
        }
    }
}

impl BackOffPolicy for ExponentialBackOff {
    fn backoff_duration(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(30) as i32;
        let millis = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(millis.min(self.max.as_millis() as f64) as u64);
        delay.min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_is_capped() {
        let policy = ExponentialBackOff::new(Duration::from_millis(10), Duration::from_millis(50), 2.0);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(10));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(20));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(40));
        assert_eq!(policy.backoff_duration(4), Duration::from_millis(50));
        assert_eq!(policy.backoff_duration(100), Duration::from_millis(50));
    }

    #[test]
    fn test_from_config() {
        assert_eq!(backoff_for(&BackoffConfig::None).backoff_duration(3), Duration::ZERO);
        assert_eq!(
            backoff_for(&BackoffConfig::Fixed { delay_ms: 25 }).backoff_duration(7),
            Duration::from_millis(25)
        );
    }
}

//! 重试模块
//!
//! 重试策略决定单次调用内每个实例尝试几次、最多换几个实例，
//! 以及哪些结果值得重试。

pub mod backoff;
pub mod policy;
pub mod state;

pub use backoff::{BackOffPolicy, ExponentialBackOff, FixedBackOff, NoBackOff, backoff_for};
pub use policy::{DefaultRetryPolicy, LoadBalancedRetryPolicy, Outcome};
pub use state::RetryState;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::error::Result;

/// 按服务创建重试策略
pub trait LoadBalancedRetryFactory: Send + Sync {
    /// 返回 None 时退化为单次尝试
    fn create_retry_policy(&self, service_id: &str) -> Option<Arc<dyn LoadBalancedRetryPolicy>>;

    fn create_back_off_policy(&self, _service_id: &str) -> Arc<dyn BackOffPolicy> {
        Arc::new(NoBackOff)
    }
}

/// 基于配置的重试工厂，支持按服务覆盖
#[derive(Debug, Clone, Default)]
pub struct ConfigRetryFactory {
    default: RetryConfig,
    overrides: HashMap<String, RetryConfig>,
}

impl ConfigRetryFactory {
    pub fn new(default: RetryConfig) -> Result<Self> {
        default.validate()?;
        Ok(Self {
            default,
            overrides: HashMap::new(),
        })
    }

    /// 为单个服务覆盖重试配置
    pub fn with_service(mut self, service_id: impl Into<String>, config: RetryConfig) -> Result<Self> {
        config.validate()?;
        self.overrides.insert(service_id.into(), config);
        Ok(self)
    }

    fn config_for(&self, service_id: &str) -> &RetryConfig {
        self.overrides.get(service_id).unwrap_or(&self.default)
    }
}

impl LoadBalancedRetryFactory for ConfigRetryFactory {
    fn create_retry_policy(&self, service_id: &str) -> Option<Arc<dyn LoadBalancedRetryPolicy>> {
        let config = self.config_for(service_id);
        if !config.enabled {
            return None;
        }
        Some(Arc::new(DefaultRetryPolicy::from_config(config)))
    }

    fn create_back_off_policy(&self, service_id: &str) -> Arc<dyn BackOffPolicy> {
        Arc::from(backoff_for(&self.config_for(service_id).backoff))
    }
}

/// 不提供任何重试策略
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryFactory;

impl LoadBalancedRetryFactory for NoRetryFactory {
    fn create_retry_policy(&self, _service_id: &str) -> Option<Arc<dyn LoadBalancedRetryPolicy>> {
        None
    }
}

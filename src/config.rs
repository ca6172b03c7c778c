//! 配置模块
//!
//! 所有字段都有默认值，默认行为等价于单次尝试的普通拦截器。

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::discovery::ServiceInstance;
use crate::error::{InfraResult, LoadBalancerError, Result, TransportErrorKind};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub load_balancer: LoadBalancerConfig,
    pub retry: RetryConfig,
    pub services: Vec<ServiceConfig>,
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> InfraResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> InfraResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.retry.validate()?;
        Ok(config)
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter 指令，`RUST_LOG` 存在时优先
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// 轮询
    #[default]
    RoundRobin,
    /// 随机
    Random,
    /// 加权随机（权重取自实例元数据 `weight`）
    WeightedRandom,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace("-", "_").as_str() {
            "round_robin" | "roundrobin" => Ok(StrategyKind::RoundRobin),
            "random" => Ok(StrategyKind::Random),
            "weighted_random" | "weightedrandom" => Ok(StrategyKind::WeightedRandom),
            _ => Err(format!("Unknown load balance strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub strategy: StrategyKind,
    /// 把所选实例的元数据键写入请求头（`x-lb-meta-<key>`）
    pub forward_metadata: Vec<String>,
    /// 写入 `x-lb-instance-id` 请求头
    pub instance_id_header: bool,
}

/// 重试间隔配置
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    #[default]
    None,
    Fixed {
        delay_ms: u64,
    },
    Exponential {
        initial_ms: u64,
        max_ms: u64,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
}

fn default_multiplier() -> f64 {
    2.0
}

/// 重试配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 关闭时使用普通拦截器（单次尝试）
    pub enabled: bool,
    /// 同一实例的最大尝试次数
    pub max_attempts_per_instance: usize,
    /// 单次调用最多尝试的不同实例数
    pub max_instances_per_call: usize,
    /// 视为可重试的响应状态码
    pub retryable_status_codes: Vec<u16>,
    /// 视为可重试的传输错误
    pub retryable_errors: Vec<TransportErrorKind>,
    /// 非幂等方法是否也允许重试
    pub retry_on_all_operations: bool,
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts_per_instance: 1,
            max_instances_per_call: 1,
            retryable_status_codes: Vec::new(),
            retryable_errors: vec![TransportErrorKind::Connect, TransportErrorKind::Timeout],
            retry_on_all_operations: false,
            backoff: BackoffConfig::None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_attempts_per_instance(mut self, attempts: usize) -> Self {
        self.max_attempts_per_instance = attempts;
        self
    }

    pub fn with_max_instances_per_call(mut self, instances: usize) -> Self {
        self.max_instances_per_call = instances;
        self
    }

    pub fn with_retryable_status(mut self, status: u16) -> Self {
        if !self.retryable_status_codes.contains(&status) {
            self.retryable_status_codes.push(status);
        }
        self
    }

    pub fn with_retryable_errors(mut self, kinds: Vec<TransportErrorKind>) -> Self {
        self.retryable_errors = kinds;
        self
    }

    pub fn with_retry_on_all_operations(mut self, enable: bool) -> Self {
        self.retry_on_all_operations = enable;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts_per_instance == 0 {
            return Err(LoadBalancerError::Configuration(
                "retry.max_attempts_per_instance must be at least 1".to_string(),
            ));
        }
        if self.max_instances_per_call == 0 {
            return Err(LoadBalancerError::Configuration(
                "retry.max_instances_per_call must be at least 1".to_string(),
            ));
        }
        if let Some(code) = self
            .retryable_status_codes
            .iter()
            .find(|c| !(100..=999).contains(*c))
        {
            return Err(LoadBalancerError::Configuration(format!(
                "retry.retryable_status_codes contains invalid status {}",
                code
            )));
        }
        if let BackoffConfig::Exponential { multiplier, .. } = self.backoff {
            if multiplier < 1.0 {
                return Err(LoadBalancerError::Configuration(
                    "retry.backoff.multiplier must be >= 1.0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// 固定间隔的便捷构造
    pub fn fixed_backoff(delay: Duration) -> BackoffConfig {
        BackoffConfig::Fixed {
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// 静态服务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub service_id: String,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    #[serde(default)]
    pub instance_id: Option<String>,
    pub host: String,
    pub port: u32,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceConfig {
    pub fn to_instances(&self) -> Result<Vec<ServiceInstance>> {
        self.instances
            .iter()
            .map(|cfg| {
                let mut instance = ServiceInstance::new(&self.service_id, &cfg.host, cfg.port)?
                    .with_secure(cfg.secure);
                if let Some(id) = &cfg.instance_id {
                    instance = instance.with_instance_id(id);
                }
                if let Some(scheme) = &cfg.scheme {
                    instance = instance.with_scheme(scheme);
                }
                for (key, value) in &cfg.metadata {
                    instance = instance.with_metadata(key, value);
                }
                Ok(instance)
            })
            .collect()
    }
}

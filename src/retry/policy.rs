//! 重试策略

use std::collections::HashSet;

use bytes::Bytes;
use http::{Method, Response, StatusCode};

use crate::config::RetryConfig;
use crate::error::{LoadBalancerError, TransportErrorKind};

/// 一次尝试的结果
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Response(&'a Response<Bytes>),
    Error(&'a LoadBalancerError),
}

/// 负载均衡重试策略
pub trait LoadBalancedRetryPolicy: Send + Sync {
    /// 同一实例的最大尝试次数（含第一次）
    fn max_attempts_per_instance(&self) -> usize;

    /// 单次调用最多尝试的不同实例数
    fn max_instances_per_call(&self) -> usize;

    /// 该方法的请求是否允许重试
    fn can_retry(&self, method: &Method) -> bool;

    /// 结果是否可重试；不可重试的响应视为成功，不可重试的错误直接返回
    fn is_retryable(&self, outcome: Outcome<'_>) -> bool;
}

/// 基于 `RetryConfig` 的默认策略
#[derive(Debug, Clone)]
pub struct DefaultRetryPolicy {
    max_attempts_per_instance: usize,
    max_instances_per_call: usize,
    retryable_statuses: HashSet<u16>,
    retryable_errors: HashSet<TransportErrorKind>,
    retry_on_all_operations: bool,
}

impl DefaultRetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts_per_instance: config.max_attempts_per_instance.max(1),
            max_instances_per_call: config.max_instances_per_call.max(1),
            retryable_statuses: config.retryable_status_codes.iter().copied().collect(),
            retryable_errors: config.retryable_errors.iter().copied().collect(),
            retry_on_all_operations: config.retry_on_all_operations,
        }
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_statuses.contains(&status.as_u16())
    }
}

impl LoadBalancedRetryPolicy for DefaultRetryPolicy {
    fn max_attempts_per_instance(&self) -> usize {
        self.max_attempts_per_instance
    }

    fn max_instances_per_call(&self) -> usize {
        self.max_instances_per_call
    }

    fn can_retry(&self, method: &Method) -> bool {
        self.retry_on_all_operations || method.is_idempotent()
    }

    fn is_retryable(&self, outcome: Outcome<'_>) -> bool {
        match outcome {
            Outcome::Response(response) => self.is_retryable_status(response.status()),
            Outcome::Error(err) if err.is_fatal() => false,
            Outcome::Error(err) => {
                if let Some(kind) = err.transport_kind() {
                    return self.retryable_errors.contains(&kind);
                }
                err.upstream_status()
                    .is_some_and(|status| self.is_retryable_status(status))
            }
        }
    }
}

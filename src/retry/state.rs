//! 单次逻辑调用的重试状态
//!
//! 调用开始时创建，调用结束时丢弃，不在调用之间或线程之间共享。

use std::collections::{HashMap, HashSet};

use crate::discovery::ServiceInstance;
use crate::error::LoadBalancerError;

#[derive(Debug)]
pub struct RetryState {
    service_id: String,
    current: Option<ServiceInstance>,
    attempts: HashMap<String, usize>,
    tried: HashSet<String>,
    total_attempts: usize,
    last_failure: Option<LoadBalancerError>,
}

impl RetryState {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            current: None,
            attempts: HashMap::new(),
            tried: HashSet::new(),
            total_attempts: 0,
            last_failure: None,
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn current(&self) -> Option<&ServiceInstance> {
        self.current.as_ref()
    }

    /// 当前实例上已尝试次数
    pub fn attempts_on_current(&self) -> usize {
        self.current
            .as_ref()
            .and_then(|instance| self.attempts.get(&instance.key()).copied())
            .unwrap_or(0)
    }

    /// 指定实例上已尝试次数
    pub fn attempts_for(&self, instance_key: &str) -> usize {
        self.attempts.get(instance_key).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> usize {
        self.total_attempts
    }

    /// 已选中过的不同实例数
    pub fn instances_tried(&self) -> usize {
        self.tried.len()
    }

    /// 需要排除的实例（本次调用内已用尽）
    pub fn excluded(&self) -> &HashSet<String> {
        &self.tried
    }

    /// 是否需要（重新）选择实例
    pub fn needs_instance(&self, max_attempts_per_instance: usize) -> bool {
        self.current.is_none() || self.attempts_on_current() >= max_attempts_per_instance
    }

    pub fn select(&mut self, instance: ServiceInstance) {
        self.tried.insert(instance.key());
        self.current = Some(instance);
    }

    pub fn record_attempt(&mut self) {
        if let Some(instance) = &self.current {
            *self.attempts.entry(instance.key()).or_insert(0) += 1;
        }
        self.total_attempts += 1;
    }

    /// 记录可重试的失败，覆盖之前的失败
    pub fn record_failure(&mut self, failure: LoadBalancerError) {
        self.last_failure = Some(failure);
    }

    pub fn last_failure(&self) -> Option<&LoadBalancerError> {
        self.last_failure.as_ref()
    }

    /// 结束调用：有失败记录时返回最后一次失败，否则返回给定错误
    pub fn finish(self, fallback: LoadBalancerError) -> LoadBalancerError {
        self.last_failure.unwrap_or(fallback)
    }
}

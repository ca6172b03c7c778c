//! 客户端负载均衡
//!
//! `ServiceInstanceChooser` 负责按服务名选出实例，`LoadBalancerClient`
//! 在此基础上负责 URI 重建和执行。本身不重试，重试由重试拦截器负责。

pub mod strategy;
pub mod uri;

pub use strategy::{
    RandomStrategy, RoundRobinStrategy, SelectionStrategy, WeightedRandomStrategy, strategy_for,
};
pub use uri::{reconstruct_uri, resolve_scheme, service_name};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, Uri};
use tracing::debug;

use crate::discovery::{DiscoveryClient, ServiceInstance};
use crate::error::{LoadBalancerError, Result};
use crate::request::LoadBalancerRequest;

/// 实例选择器
#[async_trait]
pub trait ServiceInstanceChooser: Send + Sync {
    /// 为服务选择一个实例，没有实例时返回 `NoInstanceAvailable`
    async fn choose(&self, service_id: &str) -> Result<ServiceInstance> {
        self.choose_excluding(service_id, &HashSet::new()).await
    }

    /// 选择实例，跳过 `excluded` 中列出的实例（按 `ServiceInstance::key`）
    async fn choose_excluding(
        &self,
        service_id: &str,
        excluded: &HashSet<String>,
    ) -> Result<ServiceInstance>;
}

/// 负载均衡客户端
#[async_trait]
pub trait LoadBalancerClient: ServiceInstanceChooser {
    /// 选择实例并执行请求，传输错误原样返回
    async fn execute(
        &self,
        service_id: &str,
        request: &LoadBalancerRequest,
    ) -> Result<Response<Bytes>> {
        let instance = self.choose(service_id).await?;
        self.execute_with_instance(service_id, &instance, request).await
    }

    /// 对指定实例执行请求
    async fn execute_with_instance(
        &self,
        service_id: &str,
        instance: &ServiceInstance,
        request: &LoadBalancerRequest,
    ) -> Result<Response<Bytes>> {
        debug!(service_id = %service_id, instance = %instance, "Executing request");
        request.apply(instance, self).await
    }

    /// 把逻辑 URI 重建为指向实例的 URI
    fn reconstruct_uri(&self, instance: &ServiceInstance, original: &Uri) -> Result<Uri> {
        uri::reconstruct_uri(instance, original)
    }
}

/// 基于服务发现和选择策略的负载均衡客户端
#[derive(Clone)]
pub struct DiscoveryLoadBalancerClient {
    discovery: Arc<dyn DiscoveryClient>,
    strategy: Arc<dyn SelectionStrategy>,
}

impl DiscoveryLoadBalancerClient {
    pub fn new(discovery: Arc<dyn DiscoveryClient>, strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self {
            discovery,
            strategy,
        }
    }

    pub fn discovery(&self) -> &Arc<dyn DiscoveryClient> {
        &self.discovery
    }

    pub fn strategy(&self) -> &Arc<dyn SelectionStrategy> {
        &self.strategy
    }
}

#[async_trait]
impl ServiceInstanceChooser for DiscoveryLoadBalancerClient {
    async fn choose_excluding(
        &self,
        service_id: &str,
        excluded: &HashSet<String>,
    ) -> Result<ServiceInstance> {
        let mut candidates = self.discovery.instances(service_id).await;
        if !excluded.is_empty() {
            candidates.retain(|instance| !excluded.contains(&instance.key()));
        }

        let instance = self
            .strategy
            .select(service_id, &candidates)
            .cloned()
            .ok_or_else(|| LoadBalancerError::no_instance(service_id))?;

        debug!(
            service_id = %service_id,
            instance = %instance,
            strategy = self.strategy.name(),
            candidates = candidates.len(),
            "Chose service instance"
        );
        Ok(instance)
    }
}

impl LoadBalancerClient for DiscoveryLoadBalancerClient {}

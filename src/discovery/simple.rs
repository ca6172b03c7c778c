//! 基于内存的服务发现客户端
//!
//! 实例列表来自配置，也可以在运行时整体替换。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{DEFAULT_ORDER, DiscoveryClient, ServiceInstance};
use crate::config::ServiceConfig;
use crate::error::{LoadBalancerError, Result};

/// 简单服务发现客户端
#[derive(Clone, Default)]
pub struct SimpleDiscoveryClient {
    instances: Arc<RwLock<HashMap<String, Vec<ServiceInstance>>>>,
    order: i32,
}

impl SimpleDiscoveryClient {
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            order: DEFAULT_ORDER,
        }
    }

    /// 从服务配置创建
    pub fn from_config(services: &[ServiceConfig]) -> Result<Self> {
        let mut map: HashMap<String, Vec<ServiceInstance>> = HashMap::new();
        for service in services {
            let instances = service.to_instances()?;
            map.entry(service.service_id.clone())
                .or_default()
                .extend(instances);
        }
        Ok(Self {
            instances: Arc::new(RwLock::new(map)),
            order: DEFAULT_ORDER,
        })
    }

    /// 设置排序值
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// 替换某个服务的实例列表
    ///
    /// 所有实例的 service_id 必须与目标服务一致。
    pub async fn set_instances(
        &self,
        service_id: impl Into<String>,
        instances: Vec<ServiceInstance>,
    ) -> Result<()> {
        let service_id = service_id.into();
        if let Some(other) = instances.iter().find(|i| i.service_id() != service_id) {
            return Err(LoadBalancerError::InvalidInstance(format!(
                "instance {} does not belong to service '{}'",
                other, service_id
            )));
        }
        debug!(service_id = %service_id, count = instances.len(), "Replacing service instances");
        self.instances.write().await.insert(service_id, instances);
        Ok(())
    }

    /// 移除某个服务
    pub async fn remove_service(&self, service_id: &str) -> Option<Vec<ServiceInstance>> {
        self.instances.write().await.remove(service_id)
    }
}

#[async_trait]
impl DiscoveryClient for SimpleDiscoveryClient {
    fn description(&self) -> &str {
        "Simple Discovery Client"
    }

    async fn instances(&self, service_id: &str) -> Vec<ServiceInstance> {
        self.instances
            .read()
            .await
            .get(service_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn order(&self) -> i32 {
        self.order
    }
}

//! 组合服务发现客户端

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::{DiscoveryClient, ServiceInstance};

/// 组合多个发现客户端
///
/// 按 `order()` 升序查询，`instances` 取第一个非空结果，`services` 取并集。
pub struct CompositeDiscoveryClient {
    clients: Vec<Arc<dyn DiscoveryClient>>,
}

impl CompositeDiscoveryClient {
    pub fn new(mut clients: Vec<Arc<dyn DiscoveryClient>>) -> Self {
        // 稳定排序，相同 order 保留注册顺序
        clients.sort_by_key(|c| c.order());
        Self { clients }
    }

    pub fn clients(&self) -> &[Arc<dyn DiscoveryClient>] {
        &self.clients
    }
}

#[async_trait]
impl DiscoveryClient for CompositeDiscoveryClient {
    fn description(&self) -> &str {
        "Composite Discovery Client"
    }

    async fn instances(&self, service_id: &str) -> Vec<ServiceInstance> {
        for client in &self.clients {
            let instances = client.instances(service_id).await;
            if !instances.is_empty() {
                trace!(
                    service_id = %service_id,
                    source = client.description(),
                    count = instances.len(),
                    "Resolved instances"
                );
                return instances;
            }
        }
        Vec::new()
    }

    async fn services(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for client in &self.clients {
            names.extend(client.services().await);
        }
        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::SimpleDiscoveryClient;

    fn instance(service: &str, host: &str) -> ServiceInstance {
        ServiceInstance::new(service, host, 8080).unwrap()
    }

    #[tokio::test]
    async fn test_lower_order_wins() {
        let primary = SimpleDiscoveryClient::new().with_order(-1);
        primary.set_instances("orders", vec![instance("orders", "10.0.0.1")]).await.unwrap();
        let fallback = SimpleDiscoveryClient::new().with_order(10);
        fallback.set_instances("orders", vec![instance("orders", "10.0.0.9")]).await.unwrap();
        fallback.set_instances("users", vec![instance("users", "10.0.1.1")]).await.unwrap();

        let composite = CompositeDiscoveryClient::new(vec![Arc::new(fallback), Arc::new(primary)]);

        let orders = composite.instances("orders").await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].host(), "10.0.0.1");
        assert_eq!(composite.instances("users").await[0].host(), "10.0.1.1");
        assert_eq!(
            composite.services().await,
            vec!["orders".to_string(), "users".to_string()]
        );
    }
}

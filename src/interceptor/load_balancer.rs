use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::{debug, warn};

use super::{ClientHttpInterceptor, Execution};
use crate::error::Result;
use crate::loadbalancer::{LoadBalancerClient, service_name};
use crate::request::LoadBalancerRequestFactory;

/// 负载均衡拦截器
///
/// 从请求 URI 的 host 中取出服务名，交给负载均衡客户端执行，单次尝试。
pub struct LoadBalancerInterceptor {
    balancer: Arc<dyn LoadBalancerClient>,
    request_factory: LoadBalancerRequestFactory,
}

impl LoadBalancerInterceptor {
    pub fn new(
        balancer: Arc<dyn LoadBalancerClient>,
        request_factory: LoadBalancerRequestFactory,
    ) -> Self {
        Self {
            balancer,
            request_factory,
        }
    }

    /// 不带请求转换器
    pub fn with_balancer(balancer: Arc<dyn LoadBalancerClient>) -> Self {
        Self::new(balancer, LoadBalancerRequestFactory::default())
    }
}

#[async_trait]
impl ClientHttpInterceptor for LoadBalancerInterceptor {
    async fn intercept(
        &self,
        request: Request<Bytes>,
        next: Arc<dyn Execution>,
    ) -> Result<Response<Bytes>> {
        let service_id = service_name(request.uri()).inspect_err(|err| {
            warn!(error = %err, "Rejecting request without service name");
        })?;
        debug!(service_id = %service_id, method = %request.method(), "Load balancing request");

        let lb_request = self.request_factory.create_request(request, next);
        self.balancer.execute(&service_id, &lb_request).await
    }

    fn name(&self) -> &'static str {
        "load_balancer"
    }
}

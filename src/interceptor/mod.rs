//! HTTP 客户端拦截器模块
//!
//! 拦截器按注册顺序组成调用链，链的末端是传输层。

pub mod load_balancer;
pub mod logging;
pub mod retry;

pub use load_balancer::LoadBalancerInterceptor;
pub use logging::LoggingInterceptor;
pub use retry::RetryLoadBalancerInterceptor;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::error::{LoadBalancerError, Result};
use crate::transport::Transport;

/// 执行请求的能力（链上剩余部分）
#[async_trait]
pub trait Execution: Send + Sync {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>>;
}

/// 客户端拦截器
#[async_trait]
pub trait ClientHttpInterceptor: Send + Sync {
    /// 处理请求，`next` 为链上后续部分，可以调用零次或多次
    async fn intercept(
        &self,
        request: Request<Bytes>,
        next: Arc<dyn Execution>,
    ) -> Result<Response<Bytes>>;

    fn name(&self) -> &'static str;
}

/// 拦截器链
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Arc<[Arc<dyn ClientHttpInterceptor>]>,
    position: usize,
    transport: Arc<dyn Transport>,
}

impl InterceptorChain {
    pub fn new(
        interceptors: Vec<Arc<dyn ClientHttpInterceptor>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            interceptors: interceptors.into(),
            position: 0,
            transport,
        }
    }

    /// 拦截器名称（按执行顺序）
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    fn next(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
            position: self.position + 1,
            transport: self.transport.clone(),
        }
    }
}

#[async_trait]
impl Execution for InterceptorChain {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        match self.interceptors.get(self.position) {
            Some(interceptor) => {
                let next: Arc<dyn Execution> = Arc::new(self.next());
                interceptor.intercept(request, next).await
            }
            None => {
                let uri = request.uri().clone();
                self.transport
                    .execute(request)
                    .await
                    .map_err(|e| LoadBalancerError::transport(uri, e))
            }
        }
    }
}

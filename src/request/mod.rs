//! 负载均衡请求
//!
//! `LoadBalancerRequestFactory` 把拦截到的请求包装成延迟执行的 `LoadBalancerRequest`。
//! 每次 `apply` 都从原始请求重新构建，不会缓存上一次重建出的 URI。

pub mod transformer;

pub use transformer::{
    INSTANCE_ID_HEADER, InstanceHeaderTransformer, METADATA_HEADER_PREFIX, RequestTransformer,
};

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, Uri, Version};

use crate::discovery::ServiceInstance;
use crate::error::Result;
use crate::interceptor::Execution;
use crate::loadbalancer::LoadBalancerClient;

/// 请求工厂
#[derive(Clone, Default)]
pub struct LoadBalancerRequestFactory {
    transformers: Arc<[Arc<dyn RequestTransformer>]>,
}

impl LoadBalancerRequestFactory {
    pub fn new(transformers: Vec<Arc<dyn RequestTransformer>>) -> Self {
        Self {
            transformers: transformers.into(),
        }
    }

    pub fn transformers(&self) -> &[Arc<dyn RequestTransformer>] {
        &self.transformers
    }

    /// 创建延迟执行的请求
    pub fn create_request(
        &self,
        request: Request<Bytes>,
        execution: Arc<dyn Execution>,
    ) -> LoadBalancerRequest {
        let (parts, body) = request.into_parts();
        LoadBalancerRequest {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            transformers: self.transformers.clone(),
            execution,
        }
    }
}

/// 绑定到实例后才执行的请求
pub struct LoadBalancerRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    transformers: Arc<[Arc<dyn RequestTransformer>]>,
    execution: Arc<dyn Execution>,
}

impl LoadBalancerRequest {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// 原始（逻辑）URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 构建指向实例的请求并依次应用转换器
    pub fn resolve<B>(&self, instance: &ServiceInstance, balancer: &B) -> Result<Request<Bytes>>
    where
        B: LoadBalancerClient + ?Sized,
    {
        let uri = balancer.reconstruct_uri(instance, &self.uri)?;

        let mut request = Request::new(self.body.clone());
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = uri;
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();

        self.transformers
            .iter()
            .try_fold(request, |request, transformer| {
                transformer.transform(request, instance)
            })
    }

    /// 针对实例执行一次
    pub async fn apply<B>(&self, instance: &ServiceInstance, balancer: &B) -> Result<Response<Bytes>>
    where
        B: LoadBalancerClient + ?Sized,
    {
        let request = self.resolve(instance, balancer)?;
        self.execution.execute(request).await
    }
}

impl std::fmt::Debug for LoadBalancerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancerRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("transformers", &self.transformers.len())
            .finish()
    }
}

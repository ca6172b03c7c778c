//! 负载均衡 HTTP 客户端
//!
//! 应用启动时在这里组装拦截器链：服务发现 → 选择策略 → 负载均衡客户端 →
//! 请求转换器 → 拦截器（普通或重试，由 `retry.enabled` 或显式重试工厂决定） → 传输层。

pub mod service;

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use tracing::info;

use crate::config::Config;
use crate::discovery::{DiscoveryClient, SimpleDiscoveryClient};
use crate::error::Result;
use crate::interceptor::{
    ClientHttpInterceptor, Execution, InterceptorChain, LoadBalancerInterceptor,
    LoggingInterceptor, RetryLoadBalancerInterceptor,
};
use crate::loadbalancer::{
    DiscoveryLoadBalancerClient, LoadBalancerClient, SelectionStrategy, strategy_for,
};
use crate::request::{InstanceHeaderTransformer, LoadBalancerRequestFactory, RequestTransformer};
use crate::retry::{ConfigRetryFactory, LoadBalancedRetryFactory};
use crate::transport::Transport;

/// 客户端构建器
pub struct ClientBuilder {
    config: Config,
    discovery: Option<Arc<dyn DiscoveryClient>>,
    strategy: Option<Arc<dyn SelectionStrategy>>,
    balancer: Option<Arc<dyn LoadBalancerClient>>,
    transport: Option<Arc<dyn Transport>>,
    retry_factory: Option<Arc<dyn LoadBalancedRetryFactory>>,
    transformers: Vec<Arc<dyn RequestTransformer>>,
    interceptors: Vec<Arc<dyn ClientHttpInterceptor>>,
    attempt_logging: bool,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            discovery: None,
            strategy: None,
            balancer: None,
            transport: None,
            retry_factory: None,
            transformers: Vec::new(),
            interceptors: Vec::new(),
            attempt_logging: false,
        }
    }

    /// 替换配置
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// 使用自定义服务发现（默认使用配置中的静态服务）
    pub fn discovery(mut self, discovery: Arc<dyn DiscoveryClient>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// 使用自定义选择策略（默认按配置创建）
    pub fn strategy(mut self, strategy: Arc<dyn SelectionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// 使用自定义负载均衡客户端，设置后忽略 discovery 和 strategy
    pub fn balancer(mut self, balancer: Arc<dyn LoadBalancerClient>) -> Self {
        self.balancer = Some(balancer);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 使用自定义重试工厂（默认基于 `retry` 配置），提供后总是启用重试拦截器
    pub fn retry_factory(mut self, factory: Arc<dyn LoadBalancedRetryFactory>) -> Self {
        self.retry_factory = Some(factory);
        self
    }

    /// 追加请求转换器，按追加顺序执行
    pub fn transformer(mut self, transformer: Arc<dyn RequestTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// 追加在负载均衡之前执行的拦截器（每次逻辑调用执行一次）
    pub fn interceptor(mut self, interceptor: Arc<dyn ClientHttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// 对每次尝试记录日志
    pub fn with_attempt_logging(mut self, enable: bool) -> Self {
        self.attempt_logging = enable;
        self
    }

    pub fn build(self) -> Result<LoadBalancedClient> {
        let config = self.config;
        config.retry.validate()?;

        let balancer: Arc<dyn LoadBalancerClient> = match self.balancer {
            Some(balancer) => balancer,
            None => {
                let discovery: Arc<dyn DiscoveryClient> = match self.discovery {
                    Some(discovery) => discovery,
                    None => Arc::new(SimpleDiscoveryClient::from_config(&config.services)?),
                };
                let strategy = self
                    .strategy
                    .unwrap_or_else(|| strategy_for(config.load_balancer.strategy));
                Arc::new(DiscoveryLoadBalancerClient::new(discovery, strategy))
            }
        };

        let mut transformers: Vec<Arc<dyn RequestTransformer>> = Vec::new();
        let mut headers = InstanceHeaderTransformer::new();
        if config.load_balancer.instance_id_header {
            headers = headers.with_instance_id();
        }
        for key in &config.load_balancer.forward_metadata {
            headers = headers.with_metadata_key(key);
        }
        if !headers.is_empty() {
            transformers.push(Arc::new(headers));
        }
        transformers.extend(self.transformers);
        let request_factory = LoadBalancerRequestFactory::new(transformers);

        // 显式提供的重试工厂优先于 retry.enabled
        let retry_factory: Option<Arc<dyn LoadBalancedRetryFactory>> = match self.retry_factory {
            Some(factory) => {
                if !config.retry.enabled {
                    info!("retry.enabled is false, using the explicitly supplied retry factory");
                }
                Some(factory)
            }
            None if config.retry.enabled => {
                let factory = ConfigRetryFactory::new(config.retry.clone())?;
                Some(Arc::new(factory) as Arc<dyn LoadBalancedRetryFactory>)
            }
            None => None,
        };

        let load_balancing: Arc<dyn ClientHttpInterceptor> = if let Some(retry_factory) =
            retry_factory
        {
            Arc::new(RetryLoadBalancerInterceptor::new(
                balancer.clone(),
                request_factory,
                retry_factory,
            ))
        } else {
            Arc::new(LoadBalancerInterceptor::new(balancer.clone(), request_factory))
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let mut interceptors = self.interceptors;
        interceptors.push(load_balancing);
        if self.attempt_logging {
            interceptors.push(Arc::new(LoggingInterceptor::new()));
        }

        let chain = InterceptorChain::new(interceptors, transport);
        info!(
            interceptors = ?chain.names(),
            strategy = ?config.load_balancer.strategy,
            retry = config.retry.enabled,
            "Load balanced client ready"
        );

        Ok(LoadBalancedClient { chain, balancer })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()?))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn Transport>> {
    Err(crate::error::LoadBalancerError::Configuration(
        "no transport configured and the reqwest feature is disabled".to_string(),
    ))
}

/// 负载均衡 HTTP 客户端
///
/// 请求 URI 的 host 写逻辑服务名，例如 `http://orders-service/api/orders`。
#[derive(Clone)]
pub struct LoadBalancedClient {
    chain: InterceptorChain,
    balancer: Arc<dyn LoadBalancerClient>,
}

impl LoadBalancedClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// 处理一次逻辑调用，返回成功响应或唯一的终止错误
    pub async fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        self.chain.execute(request).await
    }

    pub fn balancer(&self) -> &Arc<dyn LoadBalancerClient> {
        &self.balancer
    }

    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }
}

impl std::fmt::Debug for LoadBalancedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancedClient")
            .field("interceptors", &self.chain.names())
            .finish()
    }
}

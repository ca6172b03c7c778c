//! Flare Client Load Balancer
//!
//! Client-side load balancing for outgoing HTTP calls: a request addressed to a logical
//! service name (`http://orders-service/...`) is resolved to a live instance at call time,
//! rewritten against it, and optionally retried against other instances on failure.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod interceptor;
pub mod loadbalancer;
pub mod request;
pub mod retry;
pub mod telemetry;
pub mod transport;

// Re-exports
pub use client::{ClientBuilder, LoadBalancedClient};
pub use config::{
    BackoffConfig, Config, InstanceConfig, LoadBalancerConfig, LogFormat, LoggingConfig,
    RetryConfig, ServiceConfig, StrategyKind,
};
pub use discovery::{
    CompositeDiscoveryClient, DiscoveryClient, ServiceInstance, SimpleDiscoveryClient,
};
pub use error::{
    ErrorCategory, ErrorCode, LoadBalancerError, Result, TransportError, TransportErrorKind,
};
pub use interceptor::{
    ClientHttpInterceptor, Execution, InterceptorChain, LoadBalancerInterceptor,
    LoggingInterceptor, RetryLoadBalancerInterceptor,
};
pub use loadbalancer::{
    DiscoveryLoadBalancerClient, LoadBalancerClient, RandomStrategy, RoundRobinStrategy,
    SelectionStrategy, ServiceInstanceChooser, WeightedRandomStrategy, reconstruct_uri,
};
pub use request::{
    InstanceHeaderTransformer, LoadBalancerRequest, LoadBalancerRequestFactory,
    RequestTransformer,
};
pub use retry::{
    BackOffPolicy, ConfigRetryFactory, DefaultRetryPolicy, LoadBalancedRetryFactory,
    LoadBalancedRetryPolicy, NoRetryFactory, Outcome, RetryState,
};
pub use telemetry::init_tracing;
pub use transport::Transport;

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;

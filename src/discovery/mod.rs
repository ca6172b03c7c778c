//! 服务发现模块
//!
//! 负载均衡只消费发现结果，不关心实例从哪里来。发现客户端可以缓存，
//! 返回的数据可能是过期的，这里不做任何新鲜度假设。

pub mod composite;
pub mod instance;
pub mod simple;

pub use composite::CompositeDiscoveryClient;
pub use instance::{InstanceSpec, ServiceInstance};
pub use simple::SimpleDiscoveryClient;

use async_trait::async_trait;

/// 默认排序值
pub const DEFAULT_ORDER: i32 = 0;

/// 服务发现客户端 trait
///
/// 只读接口。未知服务返回空列表而不是错误。
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// 可读描述，用于日志
    fn description(&self) -> &str;

    /// 获取指定服务的全部实例
    async fn instances(&self, service_id: &str) -> Vec<ServiceInstance>;

    /// 获取全部已知服务名
    async fn services(&self) -> Vec<String>;

    /// 组合多个客户端时的优先级，值越小越优先
    fn order(&self) -> i32 {
        DEFAULT_ORDER
    }
}

//! 传输层抽象
//!
//! 负载均衡层只需要一个能执行完全解析后请求的能力，连接池等由实现自行负责。

#[cfg(feature = "reqwest")]
pub mod http_client;

#[cfg(feature = "reqwest")]
pub use http_client::ReqwestTransport;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::error::TransportError;

/// 传输层 trait
#[async_trait]
pub trait Transport: Send + Sync {
    /// 执行已解析的请求，只执行一次
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError>;
}

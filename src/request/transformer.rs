//! 请求转换器
//!
//! 转换器按注册顺序执行，每个转换器看到的是前一个的输出。

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Request;

use crate::discovery::ServiceInstance;
use crate::error::{LoadBalancerError, Result};

/// 携带所选实例 ID 的请求头
pub const INSTANCE_ID_HEADER: &str = "x-lb-instance-id";

/// 元数据请求头前缀
pub const METADATA_HEADER_PREFIX: &str = "x-lb-meta-";

/// 请求转换器 trait
pub trait RequestTransformer: Send + Sync {
    fn transform(
        &self,
        request: Request<Bytes>,
        instance: &ServiceInstance,
    ) -> Result<Request<Bytes>>;
}

impl<F> RequestTransformer for F
where
    F: Fn(Request<Bytes>, &ServiceInstance) -> Result<Request<Bytes>> + Send + Sync,
{
    fn transform(
        &self,
        request: Request<Bytes>,
        instance: &ServiceInstance,
    ) -> Result<Request<Bytes>> {
        self(request, instance)
    }
}

/// 把所选实例的信息写入请求头
#[derive(Debug, Clone, Default)]
pub struct InstanceHeaderTransformer {
    instance_id: bool,
    metadata_keys: Vec<String>,
}

impl InstanceHeaderTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入 `x-lb-instance-id`
    pub fn with_instance_id(mut self) -> Self {
        self.instance_id = true;
        self
    }

    /// 写入 `x-lb-meta-<key>`，实例没有该键时跳过
    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_keys.push(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.instance_id && self.metadata_keys.is_empty()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| LoadBalancerError::InvalidInstance(format!("header value {:?}: {}", value, e)))
}

impl RequestTransformer for InstanceHeaderTransformer {
    fn transform(
        &self,
        mut request: Request<Bytes>,
        instance: &ServiceInstance,
    ) -> Result<Request<Bytes>> {
        let headers = request.headers_mut();

        if self.instance_id {
            let id = instance.key();
            headers.insert(INSTANCE_ID_HEADER, header_value(&id)?);
        }

        for key in &self.metadata_keys {
            let Some(value) = instance.metadata().get(key) else {
                continue;
            };
            let name = format!("{}{}", METADATA_HEADER_PREFIX, key.to_ascii_lowercase());
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                LoadBalancerError::InvalidInstance(format!("metadata key {:?}: {}", key, e))
            })?;
            headers.insert(name, header_value(value)?);
        }

        Ok(request)
    }
}

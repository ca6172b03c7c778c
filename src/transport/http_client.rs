//! 基于 reqwest 的传输实现

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::trace;

use super::Transport;
use crate::error::{LoadBalancerError, Result, TransportError, TransportErrorKind};

/// reqwest 传输
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 使用默认超时创建
    pub fn new() -> Result<Self> {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(30))
    }

    pub fn with_timeouts(connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                LoadBalancerError::Configuration(format!("failed to build http client: {}", e))
            })?;
        Ok(Self { client })
    }

    /// 使用已有的 reqwest 客户端（共享连接池）
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Reset
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string()).with_source(err)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: Request<Bytes>,
    ) -> std::result::Result<Response<Bytes>, TransportError> {
        let (parts, body) = request.into_parts();
        trace!(method = %parts.method, uri = %parts.uri, "Sending request");

        let response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify)?;

        let mut result = Response::new(body);
        *result.status_mut() = status;
        *result.version_mut() = version;
        *result.headers_mut() = headers;
        Ok(result)
    }
}

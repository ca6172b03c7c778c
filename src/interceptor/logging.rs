use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::{info, warn};

use super::{ClientHttpInterceptor, Execution};
use crate::error::Result;

/// 日志拦截器
///
/// 放在负载均衡拦截器之后时，每次尝试都会记录一条，URI 为重建后的地址。
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientHttpInterceptor for LoggingInterceptor {
    async fn intercept(
        &self,
        request: Request<Bytes>,
        next: Arc<dyn Execution>,
    ) -> Result<Response<Bytes>> {
        let start = Instant::now();
        let method = request.method().clone();
        let uri = request.uri().clone();

        let result = next.execute(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => info!(
                %method,
                %uri,
                status = response.status().as_u16(),
                elapsed_ms,
                "HTTP request completed"
            ),
            Err(err) => warn!(
                %method,
                %uri,
                code = %err.code(),
                error = %err,
                elapsed_ms,
                "HTTP request failed"
            ),
        }
        result
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}

//! tower::Service 适配
//!
//! 让 `LoadBalancedClient` 可以放进 tower 中间件栈（超时、并发限制等）。

use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Response};
use tower::Service;

use super::LoadBalancedClient;
use crate::error::LoadBalancerError;

impl Service<Request<Bytes>> for LoadBalancedClient {
    type Response = Response<Bytes>;
    type Error = LoadBalancerError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // 没有需要预留的资源
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.handle(request).await })
    }
}

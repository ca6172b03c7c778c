//! 集成测试公共工具

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use flare_client_lb::{ServiceInstance, SimpleDiscoveryClient, Transport, TransportError};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};

/// 传输层看到的一次调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedCall {
    pub fn authority(&self) -> String {
        self.uri
            .authority()
            .map(|a| a.to_string())
            .unwrap_or_default()
    }
}

type Handler =
    dyn Fn(&RecordedCall, usize) -> Result<Response<Bytes>, TransportError> + Send + Sync;

/// 按脚本应答的传输层，记录每次调用
pub struct ScriptedTransport {
    calls: Mutex<Vec<RecordedCall>>,
    handler: Box<Handler>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&RecordedCall, usize) -> Result<Response<Bytes>, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    /// 始终返回 200
    pub fn ok() -> Arc<Self> {
        Self::new(|_, _| Ok(response(StatusCode::OK, "ok")))
    }

    /// 始终连接失败
    pub fn refusing() -> Arc<Self> {
        Self::new(|call, _| {
            Err(TransportError::connect(format!(
                "connection refused: {}",
                call.authority()
            )))
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn authorities(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::authority).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let (parts, body) = request.into_parts();
        let call = RecordedCall {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        };
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };
        (self.handler)(&call, index)
    }
}

pub fn response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from_static(body.as_bytes()));
    *response.status_mut() = status;
    response
}

pub fn request(method: Method, uri: &str) -> Request<Bytes> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::from_static(b"payload"))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Bytes> {
    request(Method::GET, uri)
}

pub fn instances(service_id: &str, count: usize) -> Vec<ServiceInstance> {
    (0..count)
        .map(|i| {
            ServiceInstance::new(service_id, format!("10.0.0.{}", i + 1), 8080)
                .unwrap()
                .with_instance_id(format!("{}-{}", service_id, i + 1))
        })
        .collect()
}

pub async fn discovery(service_id: &str, count: usize) -> Arc<SimpleDiscoveryClient> {
    let discovery = SimpleDiscoveryClient::new();
    discovery
        .set_instances(service_id, instances(service_id, count))
        .await
        .unwrap();
    Arc::new(discovery)
}

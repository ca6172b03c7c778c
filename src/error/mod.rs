//! 错误处理模块
//!
//! 一次逻辑调用对调用方只暴露一个终止错误：前置条件错误立即返回，
//! 可重试的失败在重试拦截器内部消化，耗尽后仅返回最后一次失败。

pub mod code;

pub use code::{ErrorCategory, ErrorCode};

use bytes::Bytes;
use http::{Response, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 统一结果类型
pub type Result<T> = std::result::Result<T, LoadBalancerError>;

/// 基础设施层（配置、日志初始化）使用的结果类型
pub type InfraResult<T> = anyhow::Result<T>;

/// 传输层错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// 建立连接失败（拒绝连接、DNS 失败等）
    Connect,
    /// 超时
    Timeout,
    /// 连接被重置或提前关闭
    Reset,
    /// 其他 IO 级错误
    Other,
}

impl TransportErrorKind {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            TransportErrorKind::Connect => ErrorCode::ConnectionFailed,
            TransportErrorKind::Timeout => ErrorCode::ConnectionTimeout,
            TransportErrorKind::Reset => ErrorCode::ConnectionReset,
            TransportErrorKind::Other => ErrorCode::TransportFailure,
        }
    }
}

/// 传输层错误
#[derive(Error, Debug)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Reset, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// 附加底层错误
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 负载均衡错误
#[derive(Error, Debug)]
pub enum LoadBalancerError {
    /// 请求 URI 中没有可用的服务名（前置条件错误，不重试）
    #[error("request URI does not contain a valid hostname: {uri}")]
    MissingServiceName { uri: String },

    /// 指定服务没有可用实例
    #[error("no instance available for service '{service_id}'")]
    NoInstanceAvailable { service_id: String },

    /// 传输层错误
    #[error("transport failure at {uri}: {source}")]
    Transport {
        uri: String,
        #[source]
        source: TransportError,
    },

    /// 已收到响应，但状态码被重试策略判定为失败
    #[error("upstream '{service_id}' responded with retryable status {}", .response.status())]
    UpstreamErrorResponse {
        service_id: String,
        response: Box<Response<Bytes>>,
    },

    /// URI 无法重建
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    /// 服务实例数据不合法
    #[error("invalid service instance: {0}")]
    InvalidInstance(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LoadBalancerError {
    pub fn missing_service_name(uri: &Uri) -> Self {
        LoadBalancerError::MissingServiceName {
            uri: uri.to_string(),
        }
    }

    pub fn no_instance(service_id: impl Into<String>) -> Self {
        LoadBalancerError::NoInstanceAvailable {
            service_id: service_id.into(),
        }
    }

    pub fn transport(uri: impl ToString, source: TransportError) -> Self {
        LoadBalancerError::Transport {
            uri: uri.to_string(),
            source,
        }
    }

    pub fn upstream(service_id: impl Into<String>, response: Response<Bytes>) -> Self {
        LoadBalancerError::UpstreamErrorResponse {
            service_id: service_id.into(),
            response: Box::new(response),
        }
    }

    /// 错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            LoadBalancerError::MissingServiceName { .. } => ErrorCode::MissingServiceName,
            LoadBalancerError::NoInstanceAvailable { .. } => ErrorCode::NoInstanceAvailable,
            LoadBalancerError::Transport { source, .. } => source.kind().error_code(),
            LoadBalancerError::UpstreamErrorResponse { .. } => ErrorCode::UpstreamErrorResponse,
            LoadBalancerError::InvalidUri(_) => ErrorCode::InvalidUri,
            LoadBalancerError::InvalidInstance(_) => ErrorCode::InvalidInstance,
            LoadBalancerError::Configuration(_) => ErrorCode::ConfigurationError,
        }
    }

    /// 前置条件类错误，任何情况下都不重试
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LoadBalancerError::MissingServiceName { .. }
                | LoadBalancerError::InvalidUri(_)
                | LoadBalancerError::InvalidInstance(_)
                | LoadBalancerError::Configuration(_)
        )
    }

    /// 传输错误的分类
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            LoadBalancerError::Transport { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// 上游错误响应的状态码
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            LoadBalancerError::UpstreamErrorResponse { response, .. } => Some(response.status()),
            _ => None,
        }
    }

    /// 取出上游错误响应
    pub fn into_response(self) -> Option<Response<Bytes>> {
        match self {
            LoadBalancerError::UpstreamErrorResponse { response, .. } => Some(*response),
            _ => None,
        }
    }
}

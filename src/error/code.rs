//! 错误代码定义
//!
//! 错误代码按类别分组，每个类别占用1000个代码范围：
//! - 1000-1999: 请求相关错误（前置条件）
//! - 2000-2999: 实例选择相关错误
//! - 3000-3999: 传输相关错误
//! - 4000-4999: 上游响应相关错误
//! - 9000-9999: 通用错误

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Request,
    Selection,
    Transport,
    Upstream,
    General,
}

/// 错误代码枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 请求相关错误 (1000-1999)
    // ============================================================
    MissingServiceName = 1000,
    InvalidUri = 1001,

    // ============================================================
    // 实例选择相关错误 (2000-2999)
    // ============================================================
    NoInstanceAvailable = 2000,
    InvalidInstance = 2001,

    // ============================================================
    // 传输相关错误 (3000-3999)
    // ============================================================
    ConnectionFailed = 3000,
    ConnectionTimeout = 3001,
    ConnectionReset = 3002,
    TransportFailure = 3003,

    // ============================================================
    // 上游响应相关错误 (4000-4999)
    // ============================================================
    UpstreamErrorResponse = 4000,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    ConfigurationError = 9000,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::MissingServiceName),
            1001 => Some(ErrorCode::InvalidUri),
            2000 => Some(ErrorCode::NoInstanceAvailable),
            2001 => Some(ErrorCode::InvalidInstance),
            3000 => Some(ErrorCode::ConnectionFailed),
            3001 => Some(ErrorCode::ConnectionTimeout),
            3002 => Some(ErrorCode::ConnectionReset),
            3003 => Some(ErrorCode::TransportFailure),
            4000 => Some(ErrorCode::UpstreamErrorResponse),
            9000 => Some(ErrorCode::ConfigurationError),
            _ => None,
        }
    }

    /// 获取错误代码的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingServiceName => "MISSING_SERVICE_NAME",
            ErrorCode::InvalidUri => "INVALID_URI",
            ErrorCode::NoInstanceAvailable => "NO_INSTANCE_AVAILABLE",
            ErrorCode::InvalidInstance => "INVALID_INSTANCE",
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ErrorCode::ConnectionReset => "CONNECTION_RESET",
            ErrorCode::TransportFailure => "TRANSPORT_FAILURE",
            ErrorCode::UpstreamErrorResponse => "UPSTREAM_ERROR_RESPONSE",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Request,
            2000..=2999 => ErrorCategory::Selection,
            3000..=3999 => ErrorCategory::Transport,
            4000..=4999 => ErrorCategory::Upstream,
            _ => ErrorCategory::General,
        }
    }
}

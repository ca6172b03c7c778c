//! URI 重建
//!
//! 纯函数，无副作用。同样的 (instance, uri) 输入总是得到逐字节相同的结果，
//! 每次重试都会针对新实例重新计算，不缓存。

use http::Uri;

use crate::discovery::ServiceInstance;
use crate::error::{LoadBalancerError, Result};

/// 根据实例和原始 scheme 计算目标 scheme
///
/// 实例显式 scheme 优先；否则按 secure 取加密或明文变体，
/// websocket 请求保持在 ws/wss 家族内。
pub fn resolve_scheme<'a>(instance: &'a ServiceInstance, original: Option<&str>) -> &'a str {
    if let Some(scheme) = instance.scheme() {
        return scheme;
    }
    let websocket = matches!(
        original.map(str::to_ascii_lowercase).as_deref(),
        Some("ws") | Some("wss")
    );
    match (websocket, instance.is_secure()) {
        (true, true) => "wss",
        (true, false) => "ws",
        (false, true) => "https",
        (false, false) => "http",
    }
}

/// 用实例的 scheme/host/port 替换原始 URI 的 authority，保留 path 与 query
pub fn reconstruct_uri(instance: &ServiceInstance, original: &Uri) -> Result<Uri> {
    let scheme = resolve_scheme(instance, original.scheme_str());
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    let authority = instance.authority();

    Uri::builder()
        .scheme(scheme)
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| {
            LoadBalancerError::InvalidUri(format!(
                "cannot rebuild {} against {}: {}",
                original, instance, e
            ))
        })
}

/// 从请求 URI 的 host 部分提取逻辑服务名
pub fn service_name(uri: &Uri) -> Result<String> {
    uri.host()
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LoadBalancerError::missing_service_name(uri))
}

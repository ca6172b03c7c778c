//! 服务实例定义

use std::collections::HashMap;
use std::fmt;

use http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{LoadBalancerError, Result};

/// 服务实例
///
/// 构造后不可变。`uri()` 始终由 host/port/secure/scheme 推导，不单独存储。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "InstanceSpec", into = "InstanceSpec")]
pub struct ServiceInstance {
    instance_id: Option<String>,
    service_id: String,
    host: String,
    port: u16,
    secure: bool,
    scheme: Option<String>,
    metadata: HashMap<String, String>,
}

/// 序列化形态（反序列化时经过校验）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub service_id: String,
    pub host: String,
    pub port: u32,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// 创建新的服务实例
    ///
    /// `service_id` 与 `host` 不能为空，`port` 必须在 1-65535 之间。
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u32) -> Result<Self> {
        let service_id = service_id.into();
        let host = host.into();

        if service_id.trim().is_empty() {
            return Err(LoadBalancerError::InvalidInstance(
                "service id must not be empty".to_string(),
            ));
        }
        if host.trim().is_empty() {
            return Err(LoadBalancerError::InvalidInstance(format!(
                "host must not be empty (service '{}')",
                service_id
            )));
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                LoadBalancerError::InvalidInstance(format!(
                    "port {} out of range 1-65535 (service '{}')",
                    port, service_id
                ))
            })?;

        Ok(Self {
            instance_id: None,
            service_id,
            host,
            port,
            secure: false,
            scheme: None,
            metadata: HashMap::new(),
        })
    }

    /// 设置实例 ID
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// 设置是否走加密传输
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// 显式指定 scheme（优先于 secure）
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into().to_ascii_lowercase());
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// 显式 scheme
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// 生效的 scheme：显式 scheme 优先，否则由 secure 推导
    pub fn effective_scheme(&self) -> &str {
        match self.scheme.as_deref() {
            Some(scheme) => scheme,
            None if self.secure => "https",
            None => "http",
        }
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// `host:port` 形式的 authority，IPv6 地址加方括号
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// 规范地址 scheme://host:port
    pub fn uri(&self) -> Result<Uri> {
        let raw = format!("{}://{}", self.effective_scheme(), self.authority());
        raw.parse::<Uri>()
            .map_err(|e| LoadBalancerError::InvalidUri(format!("{}: {}", raw, e)))
    }

    /// 单次调用内用于排除已尝试实例的身份标识
    pub fn key(&self) -> String {
        match &self.instance_id {
            Some(id) => id.clone(),
            None => self.authority(),
        }
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}://{}",
            self.service_id,
            self.effective_scheme(),
            self.authority()
        )
    }
}

impl TryFrom<InstanceSpec> for ServiceInstance {
    type Error = LoadBalancerError;

    fn try_from(spec: InstanceSpec) -> Result<Self> {
        let mut instance = ServiceInstance::new(spec.service_id, spec.host, spec.port)?
            .with_secure(spec.secure);
        if let Some(id) = spec.instance_id {
            instance = instance.with_instance_id(id);
        }
        if let Some(scheme) = spec.scheme {
            instance = instance.with_scheme(scheme);
        }
        instance.metadata = spec.metadata;
        Ok(instance)
    }
}

impl From<ServiceInstance> for InstanceSpec {
    fn from(instance: ServiceInstance) -> Self {
        Self {
            instance_id: instance.instance_id,
            service_id: instance.service_id,
            host: instance.host,
            port: u32::from(instance.port),
            secure: instance.secure,
            scheme: instance.scheme,
            metadata: instance.metadata,
        }
    }
}

use crate::error::Result;
use crate::service::DEFAULT_PARALLEL_THRESHOLD;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub lookup: LookupTuning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 引擎运行参数 (匹配/计费配置本身随每次请求传入，不从这里读)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTuning {
    /// 用量记录数达到该值时改为并行处理
    pub parallel_threshold: usize,
}

impl Default for LookupTuning {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            lookup: LookupTuning::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置
    ///
    /// 优先级 (低 -> 高)：内置默认值、price-lookup.toml、APP__ 前缀环境变量、
    /// SERVER_HOST / SERVER_PORT
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("server.host", defaults.server.host.as_str())?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("lookup.parallel_threshold", defaults.lookup.parallel_threshold as i64)?
            .add_source(File::with_name("price-lookup").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        Ok(config.with_env_overrides())
    }

    /// 从环境变量加载配置 (加载失败时退回默认值)
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[Config] 配置加载失败，使用默认值: {}", e);
                Self::default().with_env_overrides()
            }
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.lookup.parallel_threshold, 512);
    }

    #[test]
    fn test_lookup_section_optional() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "server": { "host": "0.0.0.0", "port": 9000 } }"#).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.lookup, LookupTuning::default());
    }
}

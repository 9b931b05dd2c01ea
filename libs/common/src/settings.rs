//! HTTP server settings shared by every service binary

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Listen address and CORS settings for one service
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated list of allowed browser origins
    #[serde(default)]
    pub cors_origins: Option<String>,
}

impl ServerConfig {
    /// Load settings from `<PREFIX>_HOST`, `<PREFIX>_PORT` and
    /// `<PREFIX>_CORS_ORIGINS`
    pub fn from_env(prefix: &str, default_port: u16) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", i64::from(default_port))?
            .add_source(Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// CORS layer allowing the configured origins, or any origin when none
    /// are configured
    pub fn cors_layer(&self) -> CorsLayer {
        let origins = self.allowed_origins();
        if origins.is_empty() {
            return CorsLayer::permissive();
        }

        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin, _| {
                origins
                    .iter()
                    .any(|allowed| allowed.as_bytes() == origin.as_bytes())
            }))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_server_config_defaults() {
        unsafe {
            std::env::remove_var("TESTSVC_HOST");
            std::env::remove_var("TESTSVC_PORT");
            std::env::remove_var("TESTSVC_CORS_ORIGINS");
        }

        let config = ServerConfig::from_env("TESTSVC", 3001).unwrap();
        assert_eq!(config.address(), "0.0.0.0:3001");
        assert!(config.allowed_origins().is_empty());
    }

    #[test]
    #[serial]
    fn test_server_config_overrides() {
        unsafe {
            std::env::set_var("TESTSVC_HOST", "127.0.0.1");
            std::env::set_var("TESTSVC_PORT", "8080");
            std::env::set_var(
                "TESTSVC_CORS_ORIGINS",
                "http://localhost:3000, https://dragonauto.example ,",
            );
        }

        let config = ServerConfig::from_env("TESTSVC", 3001).unwrap();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(
            config.allowed_origins(),
            vec![
                "http://localhost:3000".to_string(),
                "https://dragonauto.example".to_string()
            ]
        );

        unsafe {
            std::env::remove_var("TESTSVC_HOST");
            std::env::remove_var("TESTSVC_PORT");
            std::env::remove_var("TESTSVC_CORS_ORIGINS");
        }
    }
}

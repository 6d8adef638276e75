use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub matrix: MatrixConfig,
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Engine settings injected into every editing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Largest number of combinations a selection may produce
    pub combination_cap: usize,
    /// Prefix of the form field carrying a row's image bytes; the row's
    /// client index is appended
    pub image_field_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle editing sessions are evicted after this many seconds
    pub ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            combination_cap: 200,
            image_field_prefix: "variant_image_".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("variant-matrix").required(false));

        // Environment variables, e.g. VARIANT_MATRIX__COMBINATION_CAP=500
        config = config.add_source(
            config::Environment::with_prefix("VARIANT")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.matrix.combination_cap, 200);
        assert_eq!(config.matrix.image_field_prefix, "variant_image_");
        assert_eq!(config.sessions.ttl_secs, 3600);
        assert_eq!(config.server_address(), "127.0.0.1:3001");
    }
}

/*!
 * Configuration Module
 *
 * Handles application configuration loading from environment variables
 * and provides structured access to configuration values.
 */

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Medication catalog bootstrap configuration
    pub catalog: CatalogConfig,
    /// Validation engine feature toggles
    pub engine: EngineConfig,
    /// Default webhook subscriber (optional)
    pub webhook: WebhookConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
    /// Environment (development, production)
    pub environment: String,
}

/// Medication catalog bootstrap configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Candidate paths for the processed catalog JSON, tried in order at
    /// startup; the first existing file wins.
    pub auto_load_paths: Vec<String>,
}

/// Validation engine feature toggles
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable the embedding-based ensemble DDI path
    pub ensemble_ddi: bool,
}

/// Default webhook subscriber wiring
///
/// When a URL is configured, a subscription for blocked-prescription and
/// major-interaction events is registered at startup.
#[derive(Clone)]
pub struct WebhookConfig {
    pub default_url: Option<String>,
    default_secret: String,
}

impl WebhookConfig {
    /// Get the default webhook secret
    /// This method exists to make secret access explicit and auditable
    pub fn default_secret(&self) -> &str {
        &self.default_secret
    }
}

// Custom Debug implementation to prevent secret leakage in logs
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("default_url", &self.default_url)
            .field("default_secret", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
                environment: std::env::var("ENVIRONMENT")
                    .unwrap_or_else(|_| "development".to_string()),
            },

            catalog: CatalogConfig {
                auto_load_paths: std::env::var("CATALOG_JSON_PATHS")
                    .map(|paths| {
                        paths
                            .split(',')
                            .map(|p| p.trim().to_string())
                            .filter(|p| !p.is_empty())
                            .collect()
                    })
                    .unwrap_or_else(|_| {
                        vec![
                            "data/processed/medications.json".to_string(),
                            "/data/processed/medications.json".to_string(),
                        ]
                    }),
            },

            engine: EngineConfig {
                ensemble_ddi: std::env::var("ENSEMBLE_DDI")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },

            webhook: WebhookConfig {
                default_url: std::env::var("DEFAULT_WEBHOOK_URL").ok(),
                default_secret: std::env::var("DEFAULT_WEBHOOK_SECRET")
                    .unwrap_or_else(|_| "rxgate-webhook-secret".to_string()),
            },
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        std::env::remove_var("SERVER_HOST");
        std::env::remove_var("SERVER_PORT");

        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        assert_eq!(host, "0.0.0.0");
        assert_eq!(port, 8000);
    }

    #[test]
    fn test_webhook_config_debug_redacts_secret() {
        let config = WebhookConfig {
            default_url: Some("https://example.com/hook".to_string()),
            default_secret: "very-secret".to_string(),
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}

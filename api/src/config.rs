/// Environment-driven configuration for the broker service.
///
/// Vimeo API base used when `VIMEO_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "https://api.vimeo.com";

/// Provider settings handed to the session broker.
#[derive(Clone)]
pub struct BrokerConfig {
    /// Vimeo personal access token. `None` makes every request fail with a
    /// configuration error instead of stopping the server.
    pub access_token: Option<String>,
    pub api_base: String,
}

impl BrokerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let access_token = lookup("VIMEO_ACCESS_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let api_base = lookup("VIMEO_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            access_token,
            api_base,
        }
    }
}

// Never print the token itself
impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);
        Self { host, port }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

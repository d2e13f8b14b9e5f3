use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub paystack: PaystackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign access tokens (HS256)
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_seconds: default_token_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    // Random per-process secret if not provided; tokens won't survive a
    // restart in that case
    uuid::Uuid::new_v4().to_string()
}

fn default_token_ttl() -> i64 {
    4 * 3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// One-time-code lifetime in seconds
    #[serde(default = "default_otp_ttl")]
    pub ttl_seconds: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_otp_ttl(),
        }
    }
}

fn default_otp_ttl() -> u64 {
    900
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Jobgate".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaystackConfig {
    /// API secret key, sent as a bearer token on outbound calls
    #[serde(default)]
    pub secret_key: String,
    /// Secret for verifying webhook signatures (HMAC-SHA512). Distinct from
    /// the access-token secret.
    #[serde(default)]
    pub webhook_secret: String,
    /// Where the gateway redirects the user's browser after checkout
    pub callback_url: Option<String>,
    #[serde(default = "default_paystack_base_url")]
    pub base_url: String,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            callback_url: None,
            base_url: default_paystack_base_url(),
        }
    }
}

fn default_paystack_base_url() -> String {
    "https://api.paystack.co".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            otp: OtpConfig::default(),
            email: EmailConfig::default(),
            paystack: PaystackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.api_port, 8080);
        assert_eq!(config.auth.token_ttl_seconds, 4 * 3600);
        assert_eq!(config.otp.ttl_seconds, 900);
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            jwt_secret = "test-secret"

            [paystack]
            secret_key = "sk_test_abc"
            webhook_secret = "whsec_abc"
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.jwt_secret, "test-secret");
        assert_eq!(config.paystack.secret_key, "sk_test_abc");
        assert_eq!(config.paystack.base_url, "https://api.paystack.co");
        assert_eq!(config.server.host, "0.0.0.0");
    }
}

use crate::core::kernel::envelope::ContentFilter;
use crate::core::types::SignType;
use reqwest::Url;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openapi.beyondh.com";
pub const DEFAULT_POOL_SIZE: usize = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "beyondh-rs/0.1";

/// How outgoing requests reach the network. Chosen once, at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStrategy {
    /// At most `max_connections` requests in flight; the rest wait for a slot
    Pooled { max_connections: usize },
    /// Plain HTTP client without a concurrency ceiling
    Simple,
}

impl Default for TransportStrategy {
    fn default() -> Self {
        Self::Pooled {
            max_connections: DEFAULT_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub channel_key: String,
    pub secret_key: Secret<String>,
    /// Tenant identifier sent as the `domain` header
    pub domain: Option<String>,
    pub sign_type: SignType,
    pub transport: TransportStrategy,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub content_filter: ContentFilter,
    pub log_payloads: bool,
}

// Never expose the secret in serialization
impl Serialize for ClientConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ClientConfig", 10)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("channel_key", &self.channel_key)?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("domain", &self.domain)?;
        state.serialize_field("sign_type", &self.sign_type)?;
        state.serialize_field("transport", &self.transport)?;
        state.serialize_field("request_timeout_secs", &self.request_timeout.as_secs())?;
        state.serialize_field("user_agent", &self.user_agent)?;
        state.serialize_field("content_filter", &self.content_filter)?;
        state.serialize_field("log_payloads", &self.log_payloads)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClientConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClientConfigHelper {
            base_url: Option<String>,
            channel_key: String,
            secret_key: String,
            domain: Option<String>,
            #[serde(default)]
            sign_type: SignType,
            #[serde(default)]
            transport: TransportStrategy,
            request_timeout_secs: Option<u64>,
            user_agent: Option<String>,
            #[serde(default)]
            content_filter: ContentFilter,
            #[serde(default)]
            log_payloads: bool,
        }

        let helper = ClientConfigHelper::deserialize(deserializer)?;
        let mut config = Self::new(helper.channel_key, helper.secret_key);
        if let Some(base_url) = helper.base_url {
            config.base_url = base_url;
        }
        if let Some(secs) = helper.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(user_agent) = helper.user_agent {
            config.user_agent = user_agent;
        }
        config.domain = helper.domain;
        config.sign_type = helper.sign_type;
        config.transport = helper.transport;
        config.content_filter = helper.content_filter;
        config.log_payloads = helper.log_payloads;
        Ok(config)
    }
}

impl ClientConfig {
    /// Create a configuration for the production endpoint
    #[must_use]
    pub fn new(channel_key: String, secret_key: String) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            channel_key,
            secret_key: Secret::new(secret_key),
            domain: None,
            sign_type: SignType::default(),
            transport: TransportStrategy::default(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            content_filter: ContentFilter::default(),
            log_payloads: false,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_CHANNEL_KEY`
    /// - `{PREFIX}_KEY` (shared signing secret)
    /// - `{PREFIX}_URL` (optional, defaults to the production endpoint)
    /// - `{PREFIX}_DOMAIN` (optional tenant header)
    /// - `{PREFIX}_POOL_SIZE` (optional, `0` selects the simple transport)
    /// - `{PREFIX}_SIGN_TYPE` (optional, `MD5` or `SHA256`)
    /// - `{PREFIX}_LOG_PAYLOADS` (optional, defaults to false)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let var = |suffix: &str| format!("{}_{}", prefix.to_uppercase(), suffix);

        let channel_key_var = var("CHANNEL_KEY");
        let channel_key = env::var(&channel_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(channel_key_var))?;

        let secret_var = var("KEY");
        let secret_key =
            env::var(&secret_var).map_err(|_| ConfigError::MissingEnvironmentVariable(secret_var))?;

        let mut config = Self::new(channel_key, secret_key);

        if let Ok(base_url) = env::var(var("URL")) {
            config.base_url = base_url;
        }
        config.domain = env::var(var("DOMAIN")).ok().filter(|d| !d.is_empty());

        if let Ok(pool_size) = env::var(var("POOL_SIZE")) {
            let max_connections = pool_size.trim().parse::<usize>().map_err(|e| {
                ConfigError::InvalidConfiguration(format!(
                    "{} is not a valid pool size: {}",
                    pool_size, e
                ))
            })?;
            config.transport = if max_connections == 0 {
                TransportStrategy::Simple
            } else {
                TransportStrategy::Pooled { max_connections }
            };
        }

        if let Ok(sign_type) = env::var(var("SIGN_TYPE")) {
            config.sign_type = sign_type.parse()?;
        }

        config.log_payloads = env::var(var("LOG_PAYLOADS"))
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        Ok(config)
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// A missing file is not an error; system environment variables are used.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// Check every field the pipeline depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("base_url"));
        }
        let url = Url::parse(&self.base_url).map_err(|e| {
            ConfigError::InvalidConfiguration(format!("invalid base_url '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidConfiguration(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.channel_key.trim().is_empty() {
            return Err(ConfigError::MissingField("channel_key"));
        }
        if self.secret_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingField("secret_key"));
        }
        if let TransportStrategy::Pooled { max_connections: 0 } = self.transport {
            return Err(ConfigError::InvalidConfiguration(
                "pool size must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidConfiguration(
                "request_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub const fn sign_type(mut self, sign_type: SignType) -> Self {
        self.sign_type = sign_type;
        self
    }

    #[must_use]
    pub const fn transport(mut self, transport: TransportStrategy) -> Self {
        self.transport = transport;
        self
    }

    /// Shorthand for a pooled transport with the given ceiling
    #[must_use]
    pub const fn pool_size(self, max_connections: usize) -> Self {
        self.transport(TransportStrategy::Pooled { max_connections })
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub const fn content_filter(mut self, content_filter: ContentFilter) -> Self {
        self.content_filter = content_filter;
        self
    }

    #[must_use]
    pub const fn log_payloads(mut self, enabled: bool) -> Self {
        self.log_payloads = enabled;
        self
    }

    /// Get the signing secret (use carefully - exposes secret)
    pub fn secret(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Missing required setting: {0}")]
    MissingField(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("CH1".to_string(), "K1".to_string());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            config.transport,
            TransportStrategy::Pooled {
                max_connections: 50
            }
        );
        assert_eq!(config.sign_type, SignType::Md5);
        assert_eq!(config.content_filter, ContentFilter::NullOnly);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let no_secret = ClientConfig::new("CH1".to_string(), String::new());
        assert!(matches!(
            no_secret.validate(),
            Err(ConfigError::MissingField("secret_key"))
        ));

        let no_channel = ClientConfig::new(String::new(), "K1".to_string());
        assert!(matches!(
            no_channel.validate(),
            Err(ConfigError::MissingField("channel_key"))
        ));

        let no_url = ClientConfig::new("CH1".to_string(), "K1".to_string()).base_url("");
        assert!(matches!(
            no_url.validate(),
            Err(ConfigError::MissingField("base_url"))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = || ClientConfig::new("CH1".to_string(), "K1".to_string());

        assert!(base().base_url("not a url").validate().is_err());
        assert!(base().base_url("ftp://example.com").validate().is_err());
        assert!(base().pool_size(0).validate().is_err());
        assert!(base().request_timeout(Duration::ZERO).validate().is_err());
        assert!(base().transport(TransportStrategy::Simple).validate().is_ok());
    }

    #[test]
    fn test_serialization_redacts_secret() {
        let config = ClientConfig::new("CH1".to_string(), "super-secret".to_string());
        let text = serde_json::to_string(&config).unwrap();
        assert!(!text.contains("super-secret"));
        assert!(text.contains("[REDACTED]"));
        assert!(!format!("{:?}", config).contains("super-secret"));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"channel_key":"CH1","secret_key":"K1","domain":"tenant-a","transport":{"pooled":{"max_connections":8}}}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.secret(), "K1");
        assert_eq!(config.domain.as_deref(), Some("tenant-a"));
        assert_eq!(
            config.transport,
            TransportStrategy::Pooled { max_connections: 8 }
        );
    }

    #[test]
    fn test_from_env() {
        env::set_var("BEYONDH_CFGTEST_CHANNEL_KEY", "CH9");
        env::set_var("BEYONDH_CFGTEST_KEY", "K9");
        env::set_var("BEYONDH_CFGTEST_POOL_SIZE", "0");
        env::set_var("BEYONDH_CFGTEST_SIGN_TYPE", "sha256");

        let config = ClientConfig::from_env("beyondh_cfgtest").unwrap();
        assert_eq!(config.channel_key, "CH9");
        assert_eq!(config.secret(), "K9");
        assert_eq!(config.transport, TransportStrategy::Simple);
        assert_eq!(config.sign_type, SignType::Sha256);
        assert!(config.domain.is_none());

        assert!(matches!(
            ClientConfig::from_env("beyondh_cfgtest_missing"),
            Err(ConfigError::MissingEnvironmentVariable(_))
        ));
    }
}

use serde::{Deserialize, Serialize};

pub const LETSENCRYPT_PRODUCTION_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppSettings {
    pub acme: AcmeSettings,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
    pub server: ServerSettings,
}

/// ACME account and lifecycle tuning.
///
/// The timing fields bound the verification loop: `poll_attempts` checks
/// `poll_interval_secs` apart per domain, and up to `bad_nonce_retries`
/// re-runs of a domain when the CA rejects a stale nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcmeSettings {
    pub email: Option<String>,
    pub environment: String,
    /// Overrides the directory picked from `environment` (e.g. Pebble in tests)
    pub directory_url: Option<String>,
    /// Serialized instant-acme account credentials, reused across restarts
    pub account_credentials: Option<String>,
    pub key_bits: u32,
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
    pub bad_nonce_retries: u32,
    pub retry_interval_secs: u64,
    pub renewal_lead_days: i64,
    pub renewal_jitter_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub redis_url: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_address: String,
    pub renewal_interval_secs: u64,
}

impl Default for AcmeSettings {
    fn default() -> Self {
        Self {
            email: None,
            environment: "production".to_string(),
            directory_url: None,
            account_credentials: None,
            key_bits: 4096,
            poll_attempts: 30,
            poll_interval_secs: 1,
            bad_nonce_retries: 5,
            retry_interval_secs: 1,
            renewal_lead_days: 30,
            renewal_jitter_days: 10,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "certificate".to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://certrail.db?mode=rwc".to_string(),
            max_connections: 10,
            min_connections: 1,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:80".to_string(),
            renewal_interval_secs: 12 * 3600,
        }
    }
}

impl AcmeSettings {
    /// Directory URL to talk to, honouring an explicit override first
    pub fn directory_url(&self) -> String {
        if let Some(url) = &self.directory_url {
            return url.clone();
        }

        if self.environment == "production" {
            LETSENCRYPT_PRODUCTION_URL.to_string()
        } else {
            LETSENCRYPT_STAGING_URL.to_string()
        }
    }
}

impl AppSettings {
    /// Create settings from JSON value, using defaults for missing fields
    pub fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Convert settings to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// Defaults overlaid with `CERTRAIL_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(email) = lookup("CERTRAIL_ACME_EMAIL") {
            self.acme.email = Some(email);
        }
        if let Some(environment) = lookup("CERTRAIL_ACME_ENVIRONMENT") {
            self.acme.environment = environment;
        }
        if let Some(url) = lookup("CERTRAIL_ACME_DIRECTORY_URL") {
            self.acme.directory_url = Some(url);
        }
        if let Some(credentials) = lookup("CERTRAIL_ACME_ACCOUNT_CREDENTIALS") {
            self.acme.account_credentials = Some(credentials);
        }
        if let Some(bits) = lookup("CERTRAIL_ACME_KEY_BITS").and_then(|v| v.parse().ok()) {
            self.acme.key_bits = bits;
        }
        if let Some(url) = lookup("CERTRAIL_REDIS_URL") {
            self.cache.redis_url = url;
        }
        if let Some(enabled) = lookup("CERTRAIL_CACHE_ENABLED").and_then(|v| v.parse().ok()) {
            self.cache.enabled = enabled;
        }
        if let Some(url) = lookup("CERTRAIL_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(address) = lookup("CERTRAIL_LISTEN_ADDRESS") {
            self.server.listen_address = address;
        }
        self
    }
}

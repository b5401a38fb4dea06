use certrail_core::AcmeSettings;
use std::time::Duration;

/// Timing and sizing knobs for the lifecycle orchestrators
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub key_bits: u32,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub bad_nonce_retries: u32,
    pub retry_interval: Duration,
    pub renewal_lead: chrono::Duration,
    pub renewal_jitter: chrono::Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::from(&AcmeSettings::default())
    }
}

impl From<&AcmeSettings> for LifecycleConfig {
    fn from(settings: &AcmeSettings) -> Self {
        Self {
            key_bits: settings.key_bits,
            poll_attempts: settings.poll_attempts,
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            bad_nonce_retries: settings.bad_nonce_retries,
            retry_interval: Duration::from_secs(settings.retry_interval_secs),
            renewal_lead: chrono::Duration::days(settings.renewal_lead_days),
            renewal_jitter: chrono::Duration::days(settings.renewal_jitter_days),
        }
    }
}

//! Best-effort mirror of certificate material into the shared key-value store.
//!
//! For every domain a certificate covers, three keys are written:
//! `{prefix}.{domain}.key`, `{prefix}.{domain}.crt` (the leaf certificate) and
//! `{prefix}.{domain}.status`. Write failures are logged and never reach
//! the caller.

use certrail_kv::KvStore;
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::Certificate;

pub const DEFAULT_CACHE_PREFIX: &str = "certificate";

pub fn cache_key(prefix: &str, domain: &str, field: &str) -> String {
    format!("{}.{}.{}", prefix, domain, field)
}

#[derive(Clone)]
pub struct CachePublisher {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl CachePublisher {
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Returns how many writes failed
    pub async fn publish(&self, certificate: &Certificate) -> usize {
        let status = certificate.status().as_str();
        let mut failures = 0;

        for domain in certificate.all_domains() {
            let entries = [
                ("key", certificate.private_key_pem.as_str()),
                ("crt", certificate.certificate_pem.as_str()),
                ("status", status),
            ];

            for (field, value) in entries {
                let key = cache_key(&self.prefix, &domain, field);
                if let Err(e) = self.store.set(&key, value).await {
                    warn!("Failed to cache {}: {}", key, e);
                    failures += 1;
                }
            }
        }

        debug!(
            "Cached certificate {} ({} failed writes)",
            certificate.domain, failures
        );
        failures
    }
}

//! HTTP-01 challenge publishing and status polling.
//!
//! Published key authorizations live in the shared key-value store under
//! `verification_path.{filename}` so any process behind the same hostname
//! can answer the CA's GET.

use certrail_kv::{KvError, KvStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::acme::{ChallengeStatus, Http01Challenge};
use super::errors::AcmeError;

pub const VERIFICATION_KEY_PREFIX: &str = "verification_path";

/// Key under which the content for a challenge filename is stored
pub fn verification_key(filename: &str) -> String {
    format!("{}.{}", VERIFICATION_KEY_PREFIX, filename)
}

/// How a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The challenge left `pending`
    Settled(ChallengeStatus),
    /// Still pending after every allowed check
    TimedOut,
    Cancelled,
}

#[derive(Clone)]
pub struct ChallengeCoordinator {
    store: Arc<dyn KvStore>,
}

impl ChallengeCoordinator {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn publish(&self, challenge: &dyn Http01Challenge) -> Result<(), KvError> {
        let filename = challenge.filename();
        debug!("Publishing challenge content for {}", filename);
        self.store
            .set(&verification_key(&filename), &challenge.file_content())
            .await
    }

    /// Remove a published token. Missing keys and store errors are not fatal.
    pub async fn clear(&self, filename: &str) {
        if let Err(e) = self.store.delete(&verification_key(filename)).await {
            warn!("Failed to clear challenge {}: {}", filename, e);
        }
    }

    /// Content currently published for `filename`, if any
    pub async fn lookup(&self, filename: &str) -> Result<Option<String>, KvError> {
        self.store.get(&verification_key(filename)).await
    }

    /// Check the challenge status up to `attempts` times, `interval` apart,
    /// until it is no longer pending
    pub async fn poll(
        &self,
        challenge: &dyn Http01Challenge,
        attempts: u32,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, AcmeError> {
        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }

            let status = challenge.verify_status().await?;
            if status != ChallengeStatus::Pending {
                debug!("Challenge settled as {} after {} check(s)", status, attempt);
                return Ok(PollOutcome::Settled(status));
            }

            if attempt < attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        Ok(PollOutcome::TimedOut)
    }
}

//! Proves control of every domain on a certificate via HTTP-01.
//!
//! Domains are checked one at a time, primary first, and the first failure
//! ends the run. A `badNonce` from the CA re-runs the failing domain after
//! `retry_interval`; the retry budget is shared by all domains in one run.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::acme::{AcmeClient, ChallengeStatus};
use super::challenge::{ChallengeCoordinator, PollOutcome};
use super::config::LifecycleConfig;
use super::errors::{AcmeError, CertificateError};
use super::models::Certificate;
use super::store::CertificateStore;

pub struct VerificationOrchestrator {
    acme: Arc<dyn AcmeClient>,
    challenges: ChallengeCoordinator,
    store: CertificateStore,
    config: LifecycleConfig,
}

/// Per-run bookkeeping
struct VerificationRun {
    retries_left: u32,
    /// Filename of the challenge currently published, if any
    published: Option<String>,
}

impl VerificationOrchestrator {
    pub fn new(
        acme: Arc<dyn AcmeClient>,
        challenges: ChallengeCoordinator,
        store: CertificateStore,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            acme,
            challenges,
            store,
            config,
        }
    }

    /// Verify every domain of `certificate` and persist the outcome in its
    /// `verified` flag. Only persistence errors are returned as `Err`.
    pub async fn verify(
        &self,
        certificate: &mut Certificate,
        cancel: &CancellationToken,
    ) -> Result<bool, CertificateError> {
        let mut run = VerificationRun {
            retries_left: self.config.bad_nonce_retries,
            published: None,
        };

        let mut verified = true;
        for domain in certificate.all_domains() {
            if !self.verify_domain(&domain, &mut run, cancel).await {
                info!("Verification of {} failed, skipping remaining domains", domain);
                verified = false;
                break;
            }
        }

        certificate.verified = verified;
        self.store.persist(certificate).await?;
        Ok(verified)
    }

    async fn verify_domain(
        &self,
        domain: &str,
        run: &mut VerificationRun,
        cancel: &CancellationToken,
    ) -> bool {
        loop {
            match self.attempt_domain(domain, run, cancel).await {
                Ok(valid) => {
                    self.clear_published(run).await;
                    return valid;
                }
                Err(e) if e.is_bad_nonce() && run.retries_left > 0 => {
                    run.retries_left -= 1;
                    warn!(
                        "Bad nonce while verifying {}, retrying ({} retries left)",
                        domain, run.retries_left
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.clear_published(run).await;
                            return false;
                        }
                        _ = tokio::time::sleep(self.config.retry_interval) => {}
                    }
                }
                Err(e) => {
                    error!("Verification of {} failed ({}): {}", domain, e.kind(), e);
                    self.clear_published(run).await;
                    return false;
                }
            }
        }
    }

    async fn attempt_domain(
        &self,
        domain: &str,
        run: &mut VerificationRun,
        cancel: &CancellationToken,
    ) -> Result<bool, AcmeError> {
        let authorization = self.acme.authorize(domain).await?;
        let challenge = authorization.http01;

        self.clear_published(run).await;
        if let Err(e) = self.challenges.publish(challenge.as_ref()).await {
            error!("Could not publish challenge for {}: {}", domain, e);
            return Ok(false);
        }
        run.published = Some(challenge.filename());

        challenge.request_verification().await?;

        let outcome = self
            .challenges
            .poll(
                challenge.as_ref(),
                self.config.poll_attempts,
                self.config.poll_interval,
                cancel,
            )
            .await?;

        match outcome {
            PollOutcome::Settled(ChallengeStatus::Valid) => {
                debug!("Domain {} verified", domain);
                Ok(true)
            }
            PollOutcome::Settled(status) => {
                warn!("Challenge for {} ended as {}", domain, status);
                Ok(false)
            }
            PollOutcome::TimedOut => {
                warn!(
                    "Challenge for {} still pending after {} checks",
                    domain, self.config.poll_attempts
                );
                Ok(false)
            }
            PollOutcome::Cancelled => {
                info!("Verification of {} cancelled", domain);
                Ok(false)
            }
        }
    }

    async fn clear_published(&self, run: &mut VerificationRun) {
        if let Some(filename) = run.published.take() {
            self.challenges.clear(&filename).await;
        }
    }
}

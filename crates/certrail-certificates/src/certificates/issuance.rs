use certrail_core::UtcDateTime;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info};

use super::acme::AcmeClient;
use super::config::LifecycleConfig;
use super::csr::build_csr;
use super::errors::CertificateError;
use super::models::Certificate;
use super::store::CertificateStore;

/// `expires_at - lead + uniform jitter in [0, jitter)`, so renewals of
/// certificates issued together spread out
pub fn renew_after_from<R: Rng>(
    expires_at: UtcDateTime,
    lead: chrono::Duration,
    jitter: chrono::Duration,
    rng: &mut R,
) -> UtcDateTime {
    let jitter_secs = jitter.num_seconds();
    let offset = if jitter_secs > 0 {
        rng.gen_range(0..jitter_secs)
    } else {
        0
    };
    expires_at - lead + chrono::Duration::seconds(offset)
}

pub struct IssuanceOrchestrator {
    acme: Arc<dyn AcmeClient>,
    store: CertificateStore,
    config: LifecycleConfig,
}

impl IssuanceOrchestrator {
    pub fn new(acme: Arc<dyn AcmeClient>, store: CertificateStore, config: LifecycleConfig) -> Self {
        Self { acme, store, config }
    }

    /// Request a certificate for every domain and store it.
    ///
    /// CA failures are logged and reported as `Ok(false)`; the record is
    /// left unchanged in that case. The new material, expiry and renewal
    /// point are written together or not at all.
    pub async fn issue(&self, certificate: &mut Certificate) -> Result<bool, CertificateError> {
        let csr = build_csr(
            &certificate.domain,
            &certificate.alternative_names,
            &certificate.private_key_pem,
        )?;

        let issued = match self.acme.new_certificate(&csr).await {
            Ok(issued) => issued,
            Err(e) => {
                error!(
                    "Certificate request for {} failed ({}): {}",
                    certificate.domain,
                    e.kind(),
                    e
                );
                return Ok(false);
            }
        };

        let expires_at = match issued.not_after() {
            Ok(expires_at) => expires_at,
            Err(e) => {
                error!("CA returned an unusable certificate for {}: {}", certificate.domain, e);
                return Ok(false);
            }
        };

        let renew_after = renew_after_from(
            expires_at,
            self.config.renewal_lead,
            self.config.renewal_jitter,
            &mut rand::thread_rng(),
        );

        let mut updated = certificate.clone();
        updated.certificate_pem = issued.certificate_pem;
        updated.intermediaries_pem = issued.chain_pem;
        updated.expires_at = Some(expires_at);
        updated.renew_after = Some(renew_after);

        self.store.persist(&updated).await?;
        *certificate = updated;

        info!(
            "Certificate issued for {} (expires on {}, will renew after {})",
            certificate.domain, expires_at, renew_after
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificates::errors::AcmeError;
    use crate::certificates::repository::{CertificateRepository, InMemoryCertificateRepository};
    use crate::certificates::test_utils::{
        issued_certificate, test_private_key, FailingSaveRepository, MockAcmeClient,
    };
    use chrono::{Duration, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_renew_after_window() {
        let expires_at = Utc::now() + Duration::days(90);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let renew_after =
                renew_after_from(expires_at, Duration::days(30), Duration::days(10), &mut rng);
            assert!(renew_after >= expires_at - Duration::days(30));
            assert!(renew_after < expires_at - Duration::days(20));
        }
    }

    #[test]
    fn test_renew_after_without_jitter() {
        let expires_at = Utc::now();
        let renew_after = renew_after_from(
            expires_at,
            Duration::days(30),
            Duration::zero(),
            &mut rand::thread_rng(),
        );
        assert_eq!(renew_after, expires_at - Duration::days(30));
    }

    async fn stored(repository: &dyn CertificateRepository) -> Certificate {
        repository
            .create(Certificate::new(
                "a.com",
                vec!["www.a.com".to_string()],
                test_private_key().to_string(),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_issue_stores_material() {
        let expires_at = Utc::now() + Duration::days(90);
        let issued = issued_certificate("a.com", expires_at);
        let acme = MockAcmeClient::new().with_certificate(issued.clone());
        let repository = Arc::new(InMemoryCertificateRepository::new());
        let issuer = IssuanceOrchestrator::new(
            Arc::new(acme.clone()),
            CertificateStore::new(repository.clone(), None),
            LifecycleConfig::default(),
        );
        let mut cert = stored(repository.as_ref()).await;

        assert!(issuer.issue(&mut cert).await.unwrap());

        assert_eq!(cert.certificate_pem, issued.certificate_pem);
        assert_eq!(cert.intermediaries_pem, issued.chain_pem);
        assert_eq!(cert.expires_at.map(|t| t.timestamp()), Some(expires_at.timestamp()));
        let renew_after = cert.renew_after.unwrap();
        assert!(renew_after >= cert.expires_at.unwrap() - Duration::days(30));
        assert!(renew_after < cert.expires_at.unwrap() - Duration::days(20));

        let stored = repository.find("a.com").await.unwrap().unwrap();
        assert_eq!(stored.certificate_pem, issued.certificate_pem);
        assert_eq!(stored.renew_after, cert.renew_after);

        let csrs = acme.csrs();
        assert_eq!(csrs.len(), 1);
        assert_eq!(csrs[0].domains, vec!["a.com", "www.a.com"]);
    }

    #[tokio::test]
    async fn test_ca_error_leaves_record_untouched() {
        let acme = MockAcmeClient::new().with_certificate_error(AcmeError::Protocol {
            kind: "urn:ietf:params:acme:error:rateLimited".to_string(),
            message: "too many certificates".to_string(),
        });
        let repository = Arc::new(InMemoryCertificateRepository::new());
        let issuer = IssuanceOrchestrator::new(
            Arc::new(acme),
            CertificateStore::new(repository.clone(), None),
            LifecycleConfig::default(),
        );
        let mut cert = stored(repository.as_ref()).await;
        let before = cert.clone();

        assert!(!issuer.issue(&mut cert).await.unwrap());
        assert_eq!(cert, before);
        assert_eq!(repository.find("a.com").await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_old_material() {
        let acme = MockAcmeClient::new()
            .with_certificate(issued_certificate("a.com", Utc::now() + Duration::days(90)));
        let repository = Arc::new(FailingSaveRepository::default());
        let issuer = IssuanceOrchestrator::new(
            Arc::new(acme),
            CertificateStore::new(repository.clone(), None),
            LifecycleConfig::default(),
        );
        let mut cert = stored(repository.as_ref()).await;
        let before = cert.clone();

        repository.set_fail_saves(true);
        assert!(matches!(
            issuer.issue(&mut cert).await,
            Err(CertificateError::Repository(_))
        ));
        assert_eq!(cert, before);
    }

    #[tokio::test]
    async fn test_corrupt_private_key_is_an_error() {
        let repository = Arc::new(InMemoryCertificateRepository::new());
        let issuer = IssuanceOrchestrator::new(
            Arc::new(MockAcmeClient::new()),
            CertificateStore::new(repository, None),
            LifecycleConfig::default(),
        );
        let mut cert = Certificate::new("a.com", vec![], "not a key".to_string());

        assert!(matches!(
            issuer.issue(&mut cert).await,
            Err(CertificateError::Csr(_))
        ));
    }
}

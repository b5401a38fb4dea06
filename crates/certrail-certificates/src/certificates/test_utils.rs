//! Scripted collaborators for lifecycle tests

use async_trait::async_trait;
use certrail_core::UtcDateTime;
use certrail_kv::{KvError, KvStore};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};

use super::acme::{
    challenge_filename, AcmeClient, Authorization, ChallengeStatus, Http01Challenge,
    IssuedCertificate,
};
use super::csr::{generate_private_key, CertificateSigningRequest};
use super::errors::{AcmeError, RepositoryError};
use super::models::{AcmeAccount, Certificate};
use super::repository::{CertificateRepository, InMemoryCertificateRepository};

/// A 2048-bit key shared by every test in the process
pub fn test_private_key() -> &'static str {
    static KEY: OnceLock<String> = OnceLock::new();
    KEY.get_or_init(|| generate_private_key(2048).unwrap())
}

/// A self-signed leaf for `domain` expiring at `not_after`, plus a separate issuer cert
pub fn issued_certificate(domain: &str, not_after: UtcDateTime) -> IssuedCertificate {
    let self_signed = |name: &str| {
        let mut params = rcgen::CertificateParams::new(vec![name.to_string()]).unwrap();
        params.not_before = time::OffsetDateTime::now_utc() - time::Duration::days(1);
        params.not_after =
            time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().pem()
    };

    IssuedCertificate {
        certificate_pem: self_signed(domain),
        chain_pem: self_signed("Test Intermediate"),
    }
}

#[derive(Default)]
struct MockState {
    statuses: HashMap<String, VecDeque<ChallengeStatus>>,
    authorize_failures: HashMap<String, VecDeque<AcmeError>>,
    verification_failures: HashMap<String, VecDeque<AcmeError>>,
    authorize_calls: HashMap<String, usize>,
    status_checks: HashMap<String, usize>,
    verification_requests: HashMap<String, usize>,
    certificate: Option<Result<IssuedCertificate, AcmeError>>,
    csrs: Vec<CertificateSigningRequest>,
}

/// [`AcmeClient`] whose challenge outcomes are scripted per domain.
///
/// Each domain's status script is consumed one entry per status check; the
/// last entry repeats. Domains without a script report `valid` right away.
#[derive(Clone, Default)]
pub struct MockAcmeClient {
    state: Arc<Mutex<MockState>>,
}

impl MockAcmeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, domain: &str, statuses: Vec<ChallengeStatus>) -> Self {
        self.lock().statuses.insert(domain.to_string(), statuses.into());
        self
    }

    /// The next `authorize` calls for `domain` fail with these errors, in order
    pub fn with_authorize_failures(self, domain: &str, errors: Vec<AcmeError>) -> Self {
        self.lock()
            .authorize_failures
            .insert(domain.to_string(), errors.into());
        self
    }

    /// The next `request_verification` calls for `domain` fail with these errors
    pub fn with_verification_failures(self, domain: &str, errors: Vec<AcmeError>) -> Self {
        self.lock()
            .verification_failures
            .insert(domain.to_string(), errors.into());
        self
    }

    pub fn with_certificate(self, certificate: IssuedCertificate) -> Self {
        self.lock().certificate = Some(Ok(certificate));
        self
    }

    pub fn with_certificate_error(self, error: AcmeError) -> Self {
        self.lock().certificate = Some(Err(error));
        self
    }

    pub fn authorize_calls(&self, domain: &str) -> usize {
        self.lock().authorize_calls.get(domain).copied().unwrap_or(0)
    }

    pub fn status_checks(&self, domain: &str) -> usize {
        self.lock().status_checks.get(domain).copied().unwrap_or(0)
    }

    pub fn verification_requests(&self, domain: &str) -> usize {
        self.lock()
            .verification_requests
            .get(domain)
            .copied()
            .unwrap_or(0)
    }

    pub fn csrs(&self) -> Vec<CertificateSigningRequest> {
        self.lock().csrs.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl AcmeClient for MockAcmeClient {
    async fn authorize(&self, domain: &str) -> Result<Authorization, AcmeError> {
        let attempt = {
            let mut state = self.lock();
            let calls = state.authorize_calls.entry(domain.to_string()).or_insert(0);
            *calls += 1;
            let attempt = *calls;

            if let Some(error) = state
                .authorize_failures
                .get_mut(domain)
                .and_then(|errors| errors.pop_front())
            {
                return Err(error);
            }
            attempt
        };

        Ok(Authorization {
            domain: domain.to_string(),
            http01: Box::new(MockChallenge {
                domain: domain.to_string(),
                token: format!("token-{}-{}", domain, attempt),
                state: self.state.clone(),
            }),
        })
    }

    async fn new_certificate(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<IssuedCertificate, AcmeError> {
        let mut state = self.lock();
        state.csrs.push(csr.clone());
        match &state.certificate {
            Some(result) => result.clone(),
            None => Err(AcmeError::Protocol {
                kind: "urn:ietf:params:acme:error:serverInternal".to_string(),
                message: "no certificate scripted".to_string(),
            }),
        }
    }
}

struct MockChallenge {
    domain: String,
    token: String,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl Http01Challenge for MockChallenge {
    fn filename(&self) -> String {
        challenge_filename(&self.token)
    }

    fn file_content(&self) -> String {
        format!("{}.thumbprint", self.token)
    }

    async fn request_verification(&self) -> Result<(), AcmeError> {
        let mut state = self.state.lock().unwrap();
        *state
            .verification_requests
            .entry(self.domain.clone())
            .or_insert(0) += 1;

        match state
            .verification_failures
            .get_mut(&self.domain)
            .and_then(|errors| errors.pop_front())
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn verify_status(&self) -> Result<ChallengeStatus, AcmeError> {
        let mut state = self.state.lock().unwrap();
        *state.status_checks.entry(self.domain.clone()).or_insert(0) += 1;

        let status = match state.statuses.get_mut(&self.domain) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().copied(),
            None => None,
        };
        Ok(status.unwrap_or(ChallengeStatus::Valid))
    }
}

/// KV store that is always down
pub struct FailingKvStore;

#[async_trait]
impl KvStore for FailingKvStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
        Err(KvError::ConnectionFailed("store unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), KvError> {
        Err(KvError::ConnectionFailed("store unavailable".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), KvError> {
        Err(KvError::ConnectionFailed("store unavailable".to_string()))
    }
}

/// In-memory repository whose `save` can be switched to fail
#[derive(Default)]
pub struct FailingSaveRepository {
    inner: InMemoryCertificateRepository,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl FailingSaveRepository {
    /// Saves fail from the start
    pub fn new() -> Self {
        let repo = Self::default();
        repo.set_fail_saves(true);
        repo
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl CertificateRepository for FailingSaveRepository {
    async fn create(&self, cert: Certificate) -> Result<Certificate, RepositoryError> {
        self.inner.create(cert).await
    }

    async fn find(&self, domain: &str) -> Result<Option<Certificate>, RepositoryError> {
        self.inner.find(domain).await
    }

    async fn save(&self, cert: &Certificate) -> Result<(), RepositoryError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RepositoryError::Connection("database went away".to_string()));
        }
        self.inner.save(cert).await
    }

    async fn list_all(&self) -> Result<Vec<Certificate>, RepositoryError> {
        self.inner.list_all().await
    }

    async fn list_active(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        self.inner.list_active(now).await
    }

    async fn list_renewable(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        self.inner.list_renewable(now).await
    }

    async fn list_expired(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        self.inner.list_expired(now).await
    }

    async fn save_acme_account(&self, account: AcmeAccount) -> Result<(), RepositoryError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RepositoryError::Connection("database went away".to_string()));
        }
        self.inner.save_acme_account(account).await
    }

    async fn find_acme_account(
        &self,
        email: &str,
        directory_url: &str,
    ) -> Result<Option<AcmeAccount>, RepositoryError> {
        self.inner.find_acme_account(email, directory_url).await
    }
}

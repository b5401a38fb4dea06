pub mod acme;
pub mod cache;
pub mod challenge;
pub mod config;
pub mod csr;
pub mod errors;
pub mod issuance;
pub mod letsencrypt;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod store;
pub mod verification;

#[cfg(test)]
pub mod test_utils;

pub use acme::{
    challenge_filename, AcmeClient, Authorization, ChallengeStatus, Http01Challenge,
    IssuedCertificate,
};
pub use cache::{cache_key, CachePublisher, DEFAULT_CACHE_PREFIX};
pub use challenge::{verification_key, ChallengeCoordinator, PollOutcome};
pub use config::LifecycleConfig;
pub use csr::{build_csr, generate_private_key, CertificateSigningRequest};
pub use errors::{AcmeError, BuilderError, CertificateError, CsrError, RepositoryError};
pub use issuance::{renew_after_from, IssuanceOrchestrator};
pub use letsencrypt::LetsEncryptClient;
pub use models::{AcmeAccount, Certificate, CertificateStatus, RenewalFailure, RenewalReport};
pub use repository::{CertificateRepository, DbCertificateRepository, InMemoryCertificateRepository};
pub use scheduler::RenewalScheduler;
pub use service::{CertificateService, CertificateServiceBuilder};
pub use state::StateEvent;
pub use store::CertificateStore;
pub use verification::VerificationOrchestrator;

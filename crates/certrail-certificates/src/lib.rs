//! Certificate lifecycle: domain verification over HTTP-01, issuance and
//! renewal through an ACME CA, and publication of the results

pub mod certificates;
pub mod handlers;

pub use certificates::{
    AcmeClient, AcmeError, Certificate, CertificateError, CertificateRepository,
    CertificateService, CertificateServiceBuilder, CertificateStatus, DbCertificateRepository,
    InMemoryCertificateRepository, LetsEncryptClient, LifecycleConfig, RenewalReport,
    RenewalScheduler, StateEvent,
};

pub use handlers::{configure_routes, create_challenge_app_state, ChallengeAppState};

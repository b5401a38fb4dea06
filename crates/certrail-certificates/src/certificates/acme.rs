//! The ACME seam the orchestrators talk to.
//!
//! [`AcmeClient`] covers just what the lifecycle needs: one HTTP-01
//! challenge per domain and a signed certificate for a CSR.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use certrail_core::UtcDateTime;
use std::fmt;

use super::csr::CertificateSigningRequest;
use super::errors::AcmeError;

/// Where an HTTP-01 challenge file is served from, relative to the web root
pub fn challenge_filename(token: &str) -> String {
    format!(".well-known/acme-challenge/{}", token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Pending,
    Valid,
    Invalid,
    Expired,
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Valid => "valid",
            ChallengeStatus::Invalid => "invalid",
            ChallengeStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait Http01Challenge: Send + Sync {
    /// Relative path the CA will fetch, e.g. `.well-known/acme-challenge/{token}`
    fn filename(&self) -> String;

    /// Key authorization the CA expects in the response body
    fn file_content(&self) -> String;

    /// Tell the CA the file is in place
    async fn request_verification(&self) -> Result<(), AcmeError>;

    /// Re-fetch the challenge and report its current status
    async fn verify_status(&self) -> Result<ChallengeStatus, AcmeError>;
}

/// An authorization for one DNS name, reduced to its HTTP-01 challenge
pub struct Authorization {
    pub domain: String,
    pub http01: Box<dyn Http01Challenge>,
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("domain", &self.domain)
            .field("filename", &self.http01.filename())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuedCertificate {
    pub certificate_pem: String,
    pub chain_pem: String,
}

impl IssuedCertificate {
    /// Expiry of the leaf certificate
    pub fn not_after(&self) -> Result<UtcDateTime, AcmeError> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(self.certificate_pem.as_bytes())
            .map_err(|e| AcmeError::InvalidCertificate(format!("Failed to parse PEM: {}", e)))?;

        let x509 = pem
            .parse_x509()
            .map_err(|e| AcmeError::InvalidCertificate(format!("Failed to parse X509: {}", e)))?;

        let not_after = x509.validity().not_after;

        Utc.timestamp_opt(not_after.timestamp(), 0)
            .single()
            .ok_or_else(|| AcmeError::InvalidCertificate("Invalid expiration timestamp".to_string()))
    }
}

#[async_trait]
pub trait AcmeClient: Send + Sync {
    async fn authorize(&self, domain: &str) -> Result<Authorization, AcmeError>;

    async fn new_certificate(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<IssuedCertificate, AcmeError>;
}

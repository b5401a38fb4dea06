use certrail_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::CertificateError;
use super::state::StateEvent;

/// Lifecycle state of a certificate record.
///
/// Only changed through [`Certificate::apply`]; see [`CertificateStatus::transition`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Unverified,
    Verified,
    Issued,
    Broken,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Unverified => "unverified",
            CertificateStatus::Verified => "verified",
            CertificateStatus::Issued => "issued",
            CertificateStatus::Broken => "broken",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unverified" => Some(CertificateStatus::Unverified),
            "verified" => Some(CertificateStatus::Verified),
            "issued" => Some(CertificateStatus::Issued),
            "broken" => Some(CertificateStatus::Broken),
            _ => None,
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certificate {
    pub id: i32,
    pub domain: String,
    pub alternative_names: Vec<String>,
    pub private_key_pem: String,
    pub certificate_pem: String,
    pub intermediaries_pem: String,
    pub expires_at: Option<UtcDateTime>,
    pub renew_after: Option<UtcDateTime>,
    /// Outcome of the most recent verification attempt
    pub verified: bool,
    status: CertificateStatus,
}

impl Certificate {
    /// A fresh, unverified record with no certificate material yet
    pub fn new(domain: impl Into<String>, alternative_names: Vec<String>, private_key_pem: String) -> Self {
        Self {
            id: 0,
            domain: domain.into(),
            alternative_names,
            private_key_pem,
            certificate_pem: String::new(),
            intermediaries_pem: String::new(),
            expires_at: None,
            renew_after: None,
            verified: false,
            status: CertificateStatus::Unverified,
        }
    }

    /// Rebuild a record from storage with its persisted status
    pub(crate) fn with_status(mut self, status: CertificateStatus) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> CertificateStatus {
        self.status
    }

    /// Apply a lifecycle event, leaving the status untouched when the
    /// transition is not allowed
    pub fn apply(&mut self, event: StateEvent) -> Result<(), CertificateError> {
        self.status = self.status.transition(event)?;
        Ok(())
    }

    /// The primary domain followed by every alternative name
    pub fn all_domains(&self) -> Vec<String> {
        std::iter::once(self.domain.clone())
            .chain(self.alternative_names.iter().cloned())
            .collect()
    }

    /// Intermediaries followed by the leaf, newline separated
    pub fn bundle(&self) -> String {
        [self.intermediaries_pem.as_str(), self.certificate_pem.as_str()].join("\n")
    }

    pub fn has_certificate(&self) -> bool {
        !self.certificate_pem.is_empty()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now())
    }

    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// Issued and not expired
    pub fn is_active(&self) -> bool {
        self.is_active_at(chrono::Utc::now())
    }

    pub fn is_active_at(&self, now: UtcDateTime) -> bool {
        self.status == CertificateStatus::Issued && !self.is_expired_at(now)
    }

    /// Holds certificate material that has not expired yet, whatever the status
    pub fn is_serving_at(&self, now: UtcDateTime) -> bool {
        self.has_certificate() && matches!(self.expires_at, Some(expires_at) if expires_at > now)
    }

    /// Issued and past its renewal point (or missing one)
    pub fn is_renewable_at(&self, now: UtcDateTime) -> bool {
        self.status == CertificateStatus::Issued
            && self.renew_after.map(|renew_after| renew_after <= now).unwrap_or(true)
    }
}

/// Summary of one pass over the renewable certificates
#[derive(Debug, Default, Clone, Serialize)]
pub struct RenewalReport {
    pub total_checked: usize,
    pub renewed: Vec<String>,
    pub failed: Vec<RenewalFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalFailure {
    pub domain: String,
    pub error: String,
}

/// Stored ACME account registration
#[derive(Debug, Clone, PartialEq)]
pub struct AcmeAccount {
    /// Empty when the account has no contact address
    pub email: String,
    pub directory_url: String,
    pub credentials: String,
    pub created_at: UtcDateTime,
}

use thiserror::Error;

use super::models::CertificateStatus;
use super::state::StateEvent;

#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("Cannot {event} a certificate in state {from}")]
    InvalidStateTransition {
        from: CertificateStatus,
        event: StateEvent,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Certificate not found: {0}")]
    NotFound(String),

    #[error("Another lifecycle operation is running for {0}")]
    OperationInProgress(String),

    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    #[error("CSR error: {0}")]
    Csr(#[from] CsrError),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for RepositoryError {
    fn from(err: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) = err.sql_err() {
            return RepositoryError::DuplicateEntry(msg);
        }

        match err {
            sea_orm::DbErr::RecordNotFound(msg) => RepositoryError::NotFound(msg),
            sea_orm::DbErr::RecordNotInserted => {
                RepositoryError::DuplicateEntry("Record not inserted".to_string())
            }
            sea_orm::DbErr::ConnectionAcquire(err) => {
                RepositoryError::Connection(err.to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

/// Errors surfaced by the ACME client collaborator.
///
/// `BadNonce` is the only transient class; verification retries it in place.
#[derive(Error, Debug, Clone)]
pub enum AcmeError {
    #[error("Bad nonce: {0}")]
    BadNonce(String),

    #[error("ACME error ({kind}): {message}")]
    Protocol { kind: String, message: String },

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),
}

impl AcmeError {
    pub fn is_bad_nonce(&self) -> bool {
        matches!(self, AcmeError::BadNonce(_))
    }

    /// Short error kind used in log lines
    pub fn kind(&self) -> &str {
        match self {
            AcmeError::BadNonce(_) => "badNonce",
            AcmeError::Protocol { kind, .. } => kind,
            AcmeError::InvalidCertificate(_) => "invalidCertificate",
        }
    }
}

const BAD_NONCE_PROBLEM: &str = "urn:ietf:params:acme:error:badNonce";

impl From<instant_acme::Error> for AcmeError {
    fn from(err: instant_acme::Error) -> Self {
        match err {
            instant_acme::Error::Api(problem) => {
                let kind = problem.r#type.clone().unwrap_or_else(|| "unknown".to_string());
                let message = problem.detail.clone().unwrap_or_default();
                if kind == BAD_NONCE_PROBLEM {
                    AcmeError::BadNonce(message)
                } else {
                    AcmeError::Protocol { kind, message }
                }
            }
            other => AcmeError::Protocol {
                kind: "transport".to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum CsrError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("DER encoding error: {0}")]
    Der(#[from] x509_cert::der::Error),

    #[error("Invalid DNS name: {0:?}")]
    InvalidName(String),

    #[error("Unsupported key type")]
    UnsupportedKey,
}

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("Missing certificate repository")]
    MissingRepository,

    #[error("Missing ACME client")]
    MissingAcmeClient,

    #[error("Missing challenge key-value store")]
    MissingChallengeStore,
}

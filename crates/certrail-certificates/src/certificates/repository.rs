use async_trait::async_trait;
use certrail_core::UtcDateTime;
use certrail_database::DbConnection;
use certrail_entities::{acme_accounts, certificates};
use chrono::Utc;
use sea_orm::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::errors::RepositoryError;
use super::models::*;

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Insert a new record. Domains are unique.
    async fn create(&self, cert: Certificate) -> Result<Certificate, RepositoryError>;
    async fn find(&self, domain: &str) -> Result<Option<Certificate>, RepositoryError>;
    /// Write every mutable field of an existing record in one statement
    async fn save(&self, cert: &Certificate) -> Result<(), RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Certificate>, RepositoryError>;
    /// Records holding certificate material that has not expired
    async fn list_active(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError>;
    /// Issued records whose renewal point has passed
    async fn list_renewable(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError>;
    async fn list_expired(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError>;

    // ACME account operations
    async fn save_acme_account(&self, account: AcmeAccount) -> Result<(), RepositoryError>;
    async fn find_acme_account(
        &self,
        email: &str,
        directory_url: &str,
    ) -> Result<Option<AcmeAccount>, RepositoryError>;
}

impl TryFrom<certificates::Model> for Certificate {
    type Error = RepositoryError;

    fn try_from(model: certificates::Model) -> Result<Self, Self::Error> {
        let status = CertificateStatus::parse(&model.status).ok_or_else(|| {
            RepositoryError::InvalidData(format!(
                "Unknown status {:?} for {}",
                model.status, model.domain
            ))
        })?;

        let alternative_names: Vec<String> = serde_json::from_value(model.alternative_names)
            .map_err(|e| {
                RepositoryError::InvalidData(format!(
                    "Invalid alternative names for {}: {}",
                    model.domain, e
                ))
            })?;

        let mut cert = Certificate::new(model.domain, alternative_names, model.private_key);
        cert.id = model.id;
        cert.certificate_pem = model.certificate.unwrap_or_default();
        cert.intermediaries_pem = model.intermediaries.unwrap_or_default();
        cert.expires_at = model.expires_at;
        cert.renew_after = model.renew_after;
        cert.verified = model.verified;

        Ok(cert.with_status(status))
    }
}

impl From<acme_accounts::Model> for AcmeAccount {
    fn from(model: acme_accounts::Model) -> Self {
        Self {
            email: model.email,
            directory_url: model.directory_url,
            credentials: model.credentials,
            created_at: model.created_at,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn to_models(models: Vec<certificates::Model>) -> Result<Vec<Certificate>, RepositoryError> {
    models.into_iter().map(Certificate::try_from).collect()
}

pub struct DbCertificateRepository {
    db: Arc<DbConnection>,
}

impl DbCertificateRepository {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CertificateRepository for DbCertificateRepository {
    async fn create(&self, cert: Certificate) -> Result<Certificate, RepositoryError> {
        if self.find(&cert.domain).await?.is_some() {
            return Err(RepositoryError::DuplicateEntry(cert.domain));
        }

        let alternative_names = serde_json::to_value(&cert.alternative_names)
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

        let model = certificates::ActiveModel {
            domain: Set(cert.domain.clone()),
            alternative_names: Set(alternative_names),
            private_key: Set(cert.private_key_pem.clone()),
            certificate: Set(non_empty(&cert.certificate_pem)),
            intermediaries: Set(non_empty(&cert.intermediaries_pem)),
            expires_at: Set(cert.expires_at),
            renew_after: Set(cert.renew_after),
            verified: Set(cert.verified),
            status: Set(cert.status().as_str().to_string()),
            ..Default::default()
        };

        let inserted = model.insert(self.db.as_ref()).await?;
        Certificate::try_from(inserted)
    }

    async fn find(&self, domain: &str) -> Result<Option<Certificate>, RepositoryError> {
        certificates::Entity::find()
            .filter(certificates::Column::Domain.eq(domain))
            .one(self.db.as_ref())
            .await?
            .map(Certificate::try_from)
            .transpose()
    }

    async fn save(&self, cert: &Certificate) -> Result<(), RepositoryError> {
        let alternative_names = serde_json::to_value(&cert.alternative_names)
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

        let changes = certificates::ActiveModel {
            alternative_names: Set(alternative_names),
            private_key: Set(cert.private_key_pem.clone()),
            certificate: Set(non_empty(&cert.certificate_pem)),
            intermediaries: Set(non_empty(&cert.intermediaries_pem)),
            expires_at: Set(cert.expires_at),
            renew_after: Set(cert.renew_after),
            verified: Set(cert.verified),
            status: Set(cert.status().as_str().to_string()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = certificates::Entity::update_many()
            .set(changes)
            .filter(certificates::Column::Domain.eq(cert.domain.as_str()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(cert.domain.clone()));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Certificate>, RepositoryError> {
        let models = certificates::Entity::find()
            .order_by_asc(certificates::Column::Domain)
            .all(self.db.as_ref())
            .await?;
        to_models(models)
    }

    async fn list_active(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        let models = certificates::Entity::find()
            .filter(certificates::Column::Certificate.is_not_null())
            .filter(certificates::Column::ExpiresAt.gt(now))
            .order_by_asc(certificates::Column::Domain)
            .all(self.db.as_ref())
            .await?;
        to_models(models)
    }

    async fn list_renewable(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        let models = certificates::Entity::find()
            .filter(certificates::Column::Status.eq(CertificateStatus::Issued.as_str()))
            .filter(
                Condition::any()
                    .add(certificates::Column::RenewAfter.is_null())
                    .add(certificates::Column::RenewAfter.lte(now)),
            )
            .order_by_asc(certificates::Column::RenewAfter)
            .all(self.db.as_ref())
            .await?;
        to_models(models)
    }

    async fn list_expired(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        let models = certificates::Entity::find()
            .filter(certificates::Column::ExpiresAt.lte(now))
            .order_by_asc(certificates::Column::Domain)
            .all(self.db.as_ref())
            .await?;
        to_models(models)
    }

    async fn save_acme_account(&self, account: AcmeAccount) -> Result<(), RepositoryError> {
        let model = acme_accounts::ActiveModel {
            email: Set(account.email),
            directory_url: Set(account.directory_url),
            credentials: Set(account.credentials),
            created_at: Set(account.created_at),
            ..Default::default()
        };

        acme_accounts::Entity::insert(model)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn find_acme_account(
        &self,
        email: &str,
        directory_url: &str,
    ) -> Result<Option<AcmeAccount>, RepositoryError> {
        let found = acme_accounts::Entity::find()
            .filter(acme_accounts::Column::Email.eq(email))
            .filter(acme_accounts::Column::DirectoryUrl.eq(directory_url))
            .one(self.db.as_ref())
            .await?;
        Ok(found.map(AcmeAccount::from))
    }
}

/// Process-local repository for single-node setups and tests
#[derive(Default)]
pub struct InMemoryCertificateRepository {
    certificates: RwLock<HashMap<String, Certificate>>,
    accounts: RwLock<HashMap<(String, String), AcmeAccount>>,
    next_id: AtomicI32,
}

impl InMemoryCertificateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn collect<F>(&self, keep: F) -> Vec<Certificate>
    where
        F: Fn(&Certificate) -> bool,
    {
        let certs = self.certificates.read().await;
        let mut found: Vec<Certificate> = certs.values().filter(|c| keep(c)).cloned().collect();
        found.sort_by(|a, b| a.domain.cmp(&b.domain));
        found
    }
}

#[async_trait]
impl CertificateRepository for InMemoryCertificateRepository {
    async fn create(&self, mut cert: Certificate) -> Result<Certificate, RepositoryError> {
        let mut certs = self.certificates.write().await;
        if certs.contains_key(&cert.domain) {
            return Err(RepositoryError::DuplicateEntry(cert.domain));
        }
        cert.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        certs.insert(cert.domain.clone(), cert.clone());
        Ok(cert)
    }

    async fn find(&self, domain: &str) -> Result<Option<Certificate>, RepositoryError> {
        let certs = self.certificates.read().await;
        Ok(certs.get(domain).cloned())
    }

    async fn save(&self, cert: &Certificate) -> Result<(), RepositoryError> {
        let mut certs = self.certificates.write().await;
        match certs.get_mut(&cert.domain) {
            Some(existing) => {
                let id = existing.id;
                *existing = cert.clone();
                existing.id = id;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(cert.domain.clone())),
        }
    }

    async fn list_all(&self) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(self.collect(|_| true).await)
    }

    async fn list_active(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(self.collect(|c| c.is_serving_at(now)).await)
    }

    async fn list_renewable(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(self.collect(|c| c.is_renewable_at(now)).await)
    }

    async fn list_expired(&self, now: UtcDateTime) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(self.collect(|c| c.is_expired_at(now)).await)
    }

    async fn save_acme_account(&self, account: AcmeAccount) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.write().await;
        let key = (account.email.clone(), account.directory_url.clone());
        if accounts.contains_key(&key) {
            return Err(RepositoryError::DuplicateEntry(format!(
                "ACME account {} at {}",
                key.0, key.1
            )));
        }
        accounts.insert(key, account);
        Ok(())
    }

    async fn find_acme_account(
        &self,
        email: &str,
        directory_url: &str,
    ) -> Result<Option<AcmeAccount>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(&(email.to_string(), directory_url.to_string()))
            .cloned())
    }
}

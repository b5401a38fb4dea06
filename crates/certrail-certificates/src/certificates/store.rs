use std::sync::Arc;

use super::cache::CachePublisher;
use super::errors::RepositoryError;
use super::models::Certificate;
use super::repository::CertificateRepository;

/// Persistence handle handed to the orchestrators: every successful write
/// to the repository is mirrored to the cache when one is configured.
#[derive(Clone)]
pub struct CertificateStore {
    repository: Arc<dyn CertificateRepository>,
    cache: Option<CachePublisher>,
}

impl CertificateStore {
    pub fn new(repository: Arc<dyn CertificateRepository>, cache: Option<CachePublisher>) -> Self {
        Self { repository, cache }
    }

    pub fn repository(&self) -> &Arc<dyn CertificateRepository> {
        &self.repository
    }

    pub async fn create(&self, certificate: Certificate) -> Result<Certificate, RepositoryError> {
        let created = self.repository.create(certificate).await?;
        self.publish(&created).await;
        Ok(created)
    }

    pub async fn persist(&self, certificate: &Certificate) -> Result<(), RepositoryError> {
        self.repository.save(certificate).await?;
        self.publish(certificate).await;
        Ok(())
    }

    async fn publish(&self, certificate: &Certificate) {
        if let Some(cache) = &self.cache {
            cache.publish(certificate).await;
        }
    }
}

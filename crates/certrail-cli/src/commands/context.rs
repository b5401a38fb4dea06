use certrail_certificates::certificates::{CachePublisher, DEFAULT_CACHE_PREFIX};
use certrail_certificates::{
    CertificateRepository, CertificateService, CertificateServiceBuilder, DbCertificateRepository,
    LetsEncryptClient, LifecycleConfig,
};
use certrail_core::{AppSettings, ServiceError};
use certrail_kv::{InMemoryKvStore, KvStore, RedisKvStore};
use clap::Args;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Connection options shared by every command
#[derive(Args, Clone, Debug, Default)]
pub struct ConnectionArgs {
    /// Database connection URL
    #[arg(long, env = "CERTRAIL_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Redis URL for challenge tokens and the certificate cache
    #[arg(long, env = "CERTRAIL_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Keep challenge tokens in process memory and skip the certificate cache
    #[arg(long)]
    pub no_cache: bool,

    /// Contact email for the ACME account
    #[arg(long, env = "CERTRAIL_ACME_EMAIL")]
    pub acme_email: Option<String>,

    /// ACME directory URL (defaults to Let's Encrypt production)
    #[arg(long, env = "CERTRAIL_ACME_DIRECTORY_URL")]
    pub acme_directory_url: Option<String>,
}

impl ConnectionArgs {
    /// Environment-derived settings with command line values on top
    pub fn settings(&self) -> AppSettings {
        self.apply(AppSettings::from_env())
    }

    fn apply(&self, mut settings: AppSettings) -> AppSettings {
        if let Some(url) = &self.database_url {
            settings.database.url = url.clone();
        }
        if let Some(url) = &self.redis_url {
            settings.cache.redis_url = url.clone();
        }
        if self.no_cache {
            settings.cache.enabled = false;
        }
        if let Some(email) = &self.acme_email {
            settings.acme.email = Some(email.clone());
        }
        if let Some(url) = &self.acme_directory_url {
            settings.acme.directory_url = Some(url.clone());
        }
        settings
    }
}

pub struct AppContext {
    pub settings: AppSettings,
    pub service: Arc<CertificateService>,
    /// Store the challenge endpoint reads tokens from
    pub challenge_store: Arc<dyn KvStore>,
}

pub async fn build_context(settings: AppSettings) -> anyhow::Result<AppContext> {
    if settings.acme.key_bits < 2048 {
        return Err(ServiceError::Configuration {
            message: format!("acme.key_bits must be at least 2048, got {}", settings.acme.key_bits),
        }
        .into());
    }

    debug!("Initializing database connection...");
    let db = certrail_database::establish_connection(&settings.database).await?;

    let (challenge_store, cache): (Arc<dyn KvStore>, Option<CachePublisher>) =
        if settings.cache.enabled {
            let redis = RedisKvStore::connect(&settings.cache.redis_url)
                .await
                .map_err(|e| ServiceError::ExternalService {
                    service: "redis".to_string(),
                    message: e.to_string(),
                })?;
            let redis: Arc<dyn KvStore> = Arc::new(redis);
            let prefix = if settings.cache.key_prefix.is_empty() {
                DEFAULT_CACHE_PREFIX.to_string()
            } else {
                settings.cache.key_prefix.clone()
            };
            info!("Using Redis for challenges and cache (prefix {})", prefix);
            (redis.clone(), Some(CachePublisher::new(redis, prefix)))
        } else {
            warn!("Cache disabled: challenge tokens are only served by this process");
            (Arc::new(InMemoryKvStore::new()), None)
        };

    let repository: Arc<dyn CertificateRepository> = Arc::new(DbCertificateRepository::new(db));
    let acme = LetsEncryptClient::new(&settings.acme).with_account_store(repository.clone());

    let mut builder = CertificateServiceBuilder::new()
        .with_repository(repository)
        .with_acme_client(Arc::new(acme))
        .with_challenge_store(challenge_store.clone())
        .with_config(LifecycleConfig::from(&settings.acme));
    if let Some(cache) = cache {
        builder = builder.with_cache(cache);
    }

    Ok(AppContext {
        settings,
        service: Arc::new(builder.build()?),
        challenge_store,
    })
}

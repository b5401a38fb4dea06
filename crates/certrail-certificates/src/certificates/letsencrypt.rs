use async_trait::async_trait;
use certrail_core::AcmeSettings;
use chrono::Utc;
use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType as AcmeChallengeType,
    Identifier, NewAccount, NewOrder, Order, OrderStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use super::acme::{
    challenge_filename, AcmeClient, Authorization, ChallengeStatus, Http01Challenge,
    IssuedCertificate,
};
use super::csr::CertificateSigningRequest;
use super::errors::AcmeError;
use super::models::AcmeAccount;
use super::repository::CertificateRepository;

const CERTIFICATE_DOWNLOAD_ATTEMPTS: u32 = 30;

/// [`AcmeClient`] backed by instant-acme, talking to Let's Encrypt or any
/// RFC 8555 directory
pub struct LetsEncryptClient {
    directory_url: String,
    email: Option<String>,
    credentials: Option<String>,
    accounts: Option<Arc<dyn CertificateRepository>>,
    account: OnceCell<Account>,
}

impl LetsEncryptClient {
    pub fn new(settings: &AcmeSettings) -> Self {
        Self {
            directory_url: settings.directory_url(),
            email: settings.email.clone(),
            credentials: settings.account_credentials.clone(),
            accounts: None,
            account: OnceCell::new(),
        }
    }

    /// Persist registered accounts so later runs reuse them
    pub fn with_account_store(mut self, accounts: Arc<dyn CertificateRepository>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    async fn account(&self) -> Result<&Account, AcmeError> {
        self.account
            .get_or_try_init(|| async { self.load_or_create_account().await })
            .await
    }

    async fn load_or_create_account(&self) -> Result<Account, AcmeError> {
        if let Some(raw) = &self.credentials {
            debug!("Loading ACME account from configured credentials");
            return load_account(raw).await;
        }

        let email = self.email.clone().unwrap_or_default();
        if let Some(accounts) = &self.accounts {
            match accounts.find_acme_account(&email, &self.directory_url).await {
                Ok(Some(stored)) => {
                    info!("Reusing ACME account registered on {}", stored.created_at);
                    return load_account(&stored.credentials).await;
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to look up stored ACME account: {}", e),
            }
        }

        info!("Creating ACME account at {}", self.directory_url);
        let contact: Vec<String> = self
            .email
            .iter()
            .map(|email| format!("mailto:{}", email))
            .collect();
        let contact_refs: Vec<&str> = contact.iter().map(String::as_str).collect();

        let (account, credentials) = Account::create(
            &NewAccount {
                contact: &contact_refs,
                terms_of_service_agreed: true,
                only_return_existing: false,
            },
            &self.directory_url,
            None,
        )
        .await?;

        match &self.accounts {
            Some(accounts) => {
                let credentials =
                    serde_json::to_string(&credentials).map_err(|e| AcmeError::Protocol {
                        kind: "configuration".to_string(),
                        message: format!("Failed to serialize account: {}", e),
                    })?;
                let record = AcmeAccount {
                    email,
                    directory_url: self.directory_url.clone(),
                    credentials,
                    created_at: Utc::now(),
                };
                match accounts.save_acme_account(record).await {
                    Ok(()) => info!("Stored ACME account for {}", self.directory_url),
                    Err(e) => warn!("ACME account created but not stored: {}", e),
                }
            }
            None => warn!(
                "ACME account is not persisted; the next run registers a new one unless acme.account_credentials is set"
            ),
        }

        Ok(account)
    }

    async fn wait_for_order_ready(&self, order: &mut Order) -> Result<(), AcmeError> {
        const MAX_ATTEMPTS: u8 = 6;
        const BASE_DELAY_SECS: u64 = 1;
        const MAX_DELAY_SECS: u64 = 30;

        if order.state().status == OrderStatus::Ready {
            return Ok(());
        }

        for attempt in 1..=MAX_ATTEMPTS {
            // 1s, 2s, 4s, 8s, 16s, 30s
            let delay_secs = std::cmp::min(
                BASE_DELAY_SECS * 2u64.pow((attempt - 1) as u32),
                MAX_DELAY_SECS,
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            let state = order.refresh().await?;

            match state.status {
                OrderStatus::Ready => {
                    info!("Order is ready after {} attempt(s)", attempt);
                    return Ok(());
                }
                OrderStatus::Invalid => {
                    error!("Order became invalid after {} attempt(s)", attempt);
                    return Err(AcmeError::Protocol {
                        kind: "orderInvalid".to_string(),
                        message: format!("Order validation failed after {} attempt(s)", attempt),
                    });
                }
                _ => debug!("Order not ready yet (attempt {}/{})", attempt, MAX_ATTEMPTS),
            }
        }

        Err(AcmeError::Protocol {
            kind: "orderTimeout".to_string(),
            message: format!("Order not ready after {} attempts", MAX_ATTEMPTS),
        })
    }
}

#[async_trait]
impl AcmeClient for LetsEncryptClient {
    async fn authorize(&self, domain: &str) -> Result<Authorization, AcmeError> {
        let account = self.account().await?;
        let identifiers = [Identifier::Dns(domain.to_string())];
        let mut order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        let authorization = order
            .authorizations()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AcmeError::Protocol {
                kind: "authorization".to_string(),
                message: format!("No authorization returned for {}", domain),
            })?;

        let challenge = authorization
            .challenges
            .iter()
            .find(|c| c.r#type == AcmeChallengeType::Http01)
            .ok_or_else(|| AcmeError::Protocol {
                kind: "authorization".to_string(),
                message: format!("No HTTP-01 challenge offered for {}", domain),
            })?;

        let key_authorization = order.key_authorization(challenge).as_str().to_string();
        debug!("HTTP-01 challenge for {} at {}", domain, challenge.url);

        Ok(Authorization {
            domain: domain.to_string(),
            http01: Box::new(LetsEncryptChallenge {
                token: challenge.token.clone(),
                url: challenge.url.clone(),
                key_authorization,
                order: Mutex::new(order),
            }),
        })
    }

    async fn new_certificate(
        &self,
        csr: &CertificateSigningRequest,
    ) -> Result<IssuedCertificate, AcmeError> {
        let account = self.account().await?;
        let identifiers: Vec<Identifier> = csr
            .domains
            .iter()
            .map(|domain| Identifier::Dns(domain.clone()))
            .collect();

        let mut order = account
            .new_order(&NewOrder {
                identifiers: &identifiers,
            })
            .await?;

        self.wait_for_order_ready(&mut order).await?;
        order.finalize(&csr.der).await?;

        for _ in 0..CERTIFICATE_DOWNLOAD_ATTEMPTS {
            if let Some(chain) = order.certificate().await? {
                let (certificate_pem, chain_pem) = split_pem_chain(&chain);
                return Ok(IssuedCertificate {
                    certificate_pem,
                    chain_pem,
                });
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        Err(AcmeError::Protocol {
            kind: "certificateTimeout".to_string(),
            message: "Certificate was not issued in time".to_string(),
        })
    }
}

struct LetsEncryptChallenge {
    token: String,
    url: String,
    key_authorization: String,
    order: Mutex<Order>,
}

#[async_trait]
impl Http01Challenge for LetsEncryptChallenge {
    fn filename(&self) -> String {
        challenge_filename(&self.token)
    }

    fn file_content(&self) -> String {
        self.key_authorization.clone()
    }

    async fn request_verification(&self) -> Result<(), AcmeError> {
        let mut order = self.order.lock().await;
        order.set_challenge_ready(&self.url).await?;
        Ok(())
    }

    async fn verify_status(&self) -> Result<ChallengeStatus, AcmeError> {
        let mut order = self.order.lock().await;
        let authorizations = order.authorizations().await?;

        let authorization = authorizations
            .iter()
            .find(|authorization| authorization.challenges.iter().any(|c| c.url == self.url))
            .ok_or_else(|| AcmeError::Protocol {
                kind: "challenge".to_string(),
                message: format!("Challenge {} disappeared from its order", self.url),
            })?;

        let problem = authorization
            .challenges
            .iter()
            .filter(|c| c.url == self.url)
            .find_map(|c| c.error.as_ref());
        if let Some(problem) = problem {
            debug!(
                "Challenge {} reported {:?}: {:?}",
                self.url, problem.r#type, problem.detail
            );
        }

        Ok(challenge_status(&authorization.status))
    }
}

async fn load_account(raw: &str) -> Result<Account, AcmeError> {
    let credentials: AccountCredentials =
        serde_json::from_str(raw).map_err(|e| AcmeError::Protocol {
            kind: "configuration".to_string(),
            message: format!("Failed to deserialize account: {}", e),
        })?;
    Ok(Account::from_credentials(credentials).await?)
}

/// The authorization stays pending while the CA is still checking
fn challenge_status(status: &AuthorizationStatus) -> ChallengeStatus {
    match status {
        AuthorizationStatus::Pending => ChallengeStatus::Pending,
        AuthorizationStatus::Valid => ChallengeStatus::Valid,
        AuthorizationStatus::Invalid | AuthorizationStatus::Revoked => ChallengeStatus::Invalid,
        AuthorizationStatus::Expired => ChallengeStatus::Expired,
    }
}

/// Split a PEM chain into the leaf and whatever follows it
fn split_pem_chain(chain: &str) -> (String, String) {
    const END: &str = "-----END CERTIFICATE-----";

    match chain.find(END) {
        Some(index) => {
            let cut = index + END.len();
            let leaf = format!("{}\n", chain[..cut].trim());
            let rest = chain[cut..].trim();
            let rest = if rest.is_empty() {
                String::new()
            } else {
                format!("{}\n", rest)
            };
            (leaf, rest)
        }
        None => (chain.to_string(), String::new()),
    }
}

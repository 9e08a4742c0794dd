use std::time::Duration;

use tokio::time::timeout;

use crate::configuration::{ProviderKind, ProviderSettings};
use crate::domain::email::EmailResult;

use super::providers::{ApolloClient, GetProspectClient, HunterClient, ProviderClient, ProviderError};

/// One email lookup backend. The real implementation is [`ProviderClient`];
/// tests swap in scripted lookups.
#[allow(async_fn_in_trait)]
pub trait EmailLookup {
    fn label(&self) -> &str;
    async fn lookup(&self, name: &str, company: &str) -> Result<Option<String>, ProviderError>;
}

impl EmailLookup for ProviderClient {
    fn label(&self) -> &str {
        ProviderClient::label(self)
    }

    async fn lookup(&self, name: &str, company: &str) -> Result<Option<String>, ProviderError> {
        ProviderClient::lookup(self, name, company).await
    }
}

/// Tries providers in priority order and stops at the first hit. A provider
/// failing is never surfaced to the caller; exhausting every provider is a
/// valid miss, not an error.
pub struct EmailResolver<P = ProviderClient> {
    providers: Vec<P>,
    lookup_timeout: Duration,
}

impl EmailResolver {
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        if settings.order.is_empty() {
            return Err(ProviderError::NoProviders);
        }

        let mut providers = Vec::with_capacity(settings.order.len());
        for kind in &settings.order {
            let client = match kind {
                ProviderKind::Getprospect => ProviderClient::GetProspect(GetProspectClient::new(
                    require_key(&settings.getprospect_api_key, *kind)?,
                )),
                ProviderKind::Hunter => ProviderClient::Hunter(HunterClient::new(require_key(
                    &settings.hunter_api_key,
                    *kind,
                )?)),
                ProviderKind::Apollo => ProviderClient::Apollo(ApolloClient::new(require_key(
                    &settings.apollo_api_key,
                    *kind,
                )?)),
            };
            providers.push(client);
        }

        Ok(EmailResolver::new(providers, settings.lookup_timeout()))
    }
}

impl<P: EmailLookup> EmailResolver<P> {
    pub fn new(providers: Vec<P>, lookup_timeout: Duration) -> Self {
        EmailResolver {
            providers,
            lookup_timeout,
        }
    }

    pub async fn resolve(&self, name: &str, company: &str) -> EmailResult {
        for provider in &self.providers {
            match timeout(self.lookup_timeout, provider.lookup(name, company)).await {
                Ok(Ok(Some(email))) => {
                    log::info!("{} found email for {}: {}", provider.label(), name, email);
                    return EmailResult::found(email);
                }
                Ok(Ok(None)) => {
                    log::info!("{} has no email for {}", provider.label(), name);
                }
                Ok(Err(e)) => {
                    log::error!("{} lookup failed for {}: {}", provider.label(), name, e);
                }
                Err(_) => {
                    log::error!(
                        "{} lookup for {} timed out after {:?}",
                        provider.label(),
                        name,
                        self.lookup_timeout
                    );
                }
            }
        }

        EmailResult::not_found()
    }
}

fn require_key(api_key: &Option<String>, kind: ProviderKind) -> Result<String, ProviderError> {
    api_key.clone().ok_or(ProviderError::MissingApiKey(kind))
}

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::configuration::ProviderKind;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("{provider} returned a malformed payload: {source}")]
    Malformed {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider {0:?} is listed in the lookup order but has no api key configured")]
    MissingApiKey(ProviderKind),
    #[error("no email providers configured")]
    NoProviders,
}

/// One variant per third-party lookup API. Response shapes differ per
/// provider and are absorbed here; callers only ever see `Option<String>`.
pub enum ProviderClient {
    GetProspect(GetProspectClient),
    Hunter(HunterClient),
    Apollo(ApolloClient),
}

impl ProviderClient {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderClient::GetProspect(_) => "getprospect",
            ProviderClient::Hunter(_) => "hunter",
            ProviderClient::Apollo(_) => "apollo",
        }
    }

    pub async fn lookup(&self, name: &str, company: &str) -> Result<Option<String>, ProviderError> {
        match self {
            ProviderClient::GetProspect(client) => client.lookup(name, company).await,
            ProviderClient::Hunter(client) => client.lookup(name, company).await,
            ProviderClient::Apollo(client) => client.lookup(name, company).await,
        }
    }
}

/// Flat GET with query parameters, api key in a header, flat `email` field in
/// the response.
pub struct GetProspectClient {
    client: Client,
    api_key: String,
    url: String,
}

#[derive(Serialize)]
struct GetProspectQuery {
    name: String,
    company: String,
}

#[derive(Deserialize)]
struct GetProspectResponse {
    email: Option<String>,
}

impl GetProspectClient {
    pub fn new(api_key: String) -> Self {
        GetProspectClient {
            client: Client::new(),
            api_key,
            url: "https://api.getprospect.com/public/v1/email/find".to_string(),
        }
    }

    async fn lookup(&self, name: &str, company: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .get(self.url.clone())
            .header("apiKey", self.api_key.clone())
            .query(&GetProspectQuery {
                name: name.to_string(),
                company: company.to_string(),
            })
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: "getprospect",
                source,
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: "getprospect",
                status: response.status().as_u16(),
            });
        }

        let payload: GetProspectResponse =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Malformed {
                    provider: "getprospect",
                    source,
                })?;

        Ok(non_empty(payload.email))
    }
}

/// GET with the api key as a query parameter; the email sits behind a nested
/// `data` object together with a confidence score.
pub struct HunterClient {
    client: Client,
    api_key: String,
    url: String,
}

#[derive(Serialize)]
struct HunterQuery {
    full_name: String,
    company: String,
    api_key: String,
}

#[derive(Deserialize)]
struct HunterResponse {
    data: Option<HunterData>,
}

#[derive(Deserialize)]
struct HunterData {
    email: Option<String>,
    #[allow(dead_code)]
    score: Option<i64>,
}

impl HunterClient {
    pub fn new(api_key: String) -> Self {
        HunterClient {
            client: Client::new(),
            api_key,
            url: "https://api.hunter.io/v2/email-finder".to_string(),
        }
    }

    async fn lookup(&self, name: &str, company: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&HunterQuery {
                full_name: name.to_string(),
                company: company.to_string(),
                api_key: self.api_key.clone(),
            })
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: "hunter",
                source,
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: "hunter",
                status: response.status().as_u16(),
            });
        }

        let payload: HunterResponse =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Malformed {
                    provider: "hunter",
                    source,
                })?;

        Ok(non_empty(payload.data.and_then(|data| data.email)))
    }
}

/// JSON POST body; the match comes back as an enrichment object with the
/// email buried among other person fields.
pub struct ApolloClient {
    client: Client,
    api_key: String,
    url: String,
}

#[derive(Serialize)]
struct ApolloRequest {
    api_key: String,
    name: String,
    organization_name: String,
}

#[derive(Deserialize)]
struct ApolloResponse {
    person: Option<ApolloPerson>,
}

#[derive(Deserialize)]
struct ApolloPerson {
    email: Option<String>,
}

impl ApolloClient {
    pub fn new(api_key: String) -> Self {
        ApolloClient {
            client: Client::new(),
            api_key,
            url: "https://api.apollo.io/v1/people/match".to_string(),
        }
    }

    async fn lookup(&self, name: &str, company: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&ApolloRequest {
                api_key: self.api_key.clone(),
                name: name.to_string(),
                organization_name: company.to_string(),
            })
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                provider: "apollo",
                source,
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: "apollo",
                status: response.status().as_u16(),
            });
        }

        let payload: ApolloResponse =
            response
                .json()
                .await
                .map_err(|source| ProviderError::Malformed {
                    provider: "apollo",
                    source,
                })?;

        Ok(non_empty(payload.person.and_then(|person| person.email)))
    }
}

fn non_empty(email: Option<String>) -> Option<String> {
    email.filter(|email| !email.trim().is_empty())
}

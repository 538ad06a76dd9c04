/// DID resolution collaborator
use crate::{
    config::ResolverConfig,
    error::{ValidatorError, ValidatorResult},
    identity::ResolutionResult,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// Resolves an identifier to its current identity document.
///
/// An `Err` is a transport failure. An identifier that does not exist is an
/// `Ok` result whose document is `None`.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, did: &str) -> ValidatorResult<ResolutionResult>;
}

/// Resolver backed by a DID resolution HTTP endpoint (`<url>/<did>`)
#[derive(Clone)]
pub struct HttpResolver {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpResolver {
    pub fn new(config: &ResolverConfig) -> ValidatorResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ValidatorError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn resolution_url(&self, did: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(did))
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self, did: &str) -> ValidatorResult<ResolutionResult> {
        let url = self.resolution_url(did);
        debug!("Resolving {} via {}", did, url);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ValidatorError::Resolution(format!("Failed to reach resolver: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            return response
                .json::<ResolutionResult>()
                .await
                .map_err(|e| ValidatorError::Resolution(format!("Invalid resolution response: {}", e)));
        }

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            // Resolvers answer unknown DIDs with a result carrying a null document
            let body = response.text().await.unwrap_or_default();
            let result = serde_json::from_str::<ResolutionResult>(&body)
                .unwrap_or_else(|_| ResolutionResult::not_found("notFound"));
            warn!("Resolver reports {} as not found", did);
            return Ok(ResolutionResult {
                document: None,
                ..result
            });
        }

        Err(ValidatorError::Resolution(format!(
            "Resolver returned error: {}",
            status
        )))
    }
}

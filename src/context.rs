/// Application context and dependency injection
use crate::{
    allow_list::LegacyAllowList,
    cache::ResolutionCache,
    config::{CacheBackend, ServerConfig},
    error::ValidatorResult,
    identity::HttpResolver,
    pipeline::VerificationPipeline,
    verify::JwtVerifier,
};
use std::sync::Arc;
use tracing::info;

/// Shared services handed to every handler
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub pipeline: Arc<VerificationPipeline>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: ServerConfig) -> ValidatorResult<Self> {
        config.validate()?;

        // Redis is connected lazily on the first cache access
        let cache = ResolutionCache::from_config(&config.cache)?;
        if cache.is_enabled() {
            match config.cache.backend {
                CacheBackend::Redis => info!(
                    "Resolution cache enabled (redis {}:{}, ttl {}s)",
                    config.cache.redis_host, config.cache.redis_port, config.cache.expiry_secs
                ),
                CacheBackend::Memory => info!(
                    "Resolution cache enabled (in-process, ttl {}s)",
                    config.cache.expiry_secs
                ),
            }
        } else {
            info!("Resolution cache disabled");
        }

        let resolver = Arc::new(HttpResolver::new(&config.resolver)?);
        let verifier = Arc::new(JwtVerifier::default());
        let allow_list = LegacyAllowList::from_config(&config.allow_list, &config.service);

        let pipeline = VerificationPipeline::new(cache, resolver, verifier, allow_list);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Context around an already assembled pipeline
    pub fn with_pipeline(config: ServerConfig, pipeline: VerificationPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }

    /// Release the cache connection
    pub async fn shutdown(&self) {
        self.pipeline.cache().close().await;
        info!("Resolution cache closed");
    }
}

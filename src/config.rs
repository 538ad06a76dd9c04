/// Configuration management for the ORGiD validator
use crate::{
    error::{ValidatorError, ValidatorResult},
    identity::IdentityDocument,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env};

/// Fixed namespace for every cache key
pub const CACHE_KEY_PREFIX: &str = "orgId_";

/// Default cache TTL (30 days)
pub const DEFAULT_CACHE_EXPIRY_SECS: u64 = 2_592_000;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub allow_list: AllowListConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    /// Deployment environment (`development`, `staging`, `production`, ...)
    pub environment: String,
    /// CORS origins, `*` means any
    pub allowed_origins: Vec<String>,
}

impl ServiceConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Where cached resolutions live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Shared Redis instance
    Redis,
    /// Process-local map, for single-instance deployments
    Memory,
}

/// Resolution cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_username: String,
    pub redis_password: String,
    pub key_prefix: String,
    pub expiry_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: CacheBackend::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_username: String::new(),
            redis_password: String::new(),
            key_prefix: CACHE_KEY_PREFIX.to_string(),
            expiry_secs: DEFAULT_CACHE_EXPIRY_SECS,
            connect_timeout_secs: 10,
        }
    }
}

impl CacheConfig {
    /// Connection string assembled from the credentials, host and port
    pub fn redis_url(&self) -> String {
        if self.redis_username.is_empty() && self.redis_password.is_empty() {
            format!("redis://{}:{}", self.redis_host, self.redis_port)
        } else {
            format!(
                "redis://{}:{}@{}:{}",
                urlencoding::encode(&self.redis_username),
                urlencoding::encode(&self.redis_password),
                self.redis_host,
                self.redis_port
            )
        }
    }
}

/// DID resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Base URL, the identifier is appended as the last path segment
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081/1.0/identifiers".to_string(),
            timeout_secs: 10,
            user_agent: format!("orgid-validator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Legacy allow-list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowListConfig {
    pub enabled: bool,
    /// `orgid=comment` pairs; `None` means the built-in entries
    pub entries: Option<Vec<(String, String)>>,
    /// Substitute documents by organisation id
    #[serde(default)]
    pub documents: HashMap<String, IdentityDocument>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ValidatorResult<Self> {
        dotenv::dotenv().ok();

        let name = env::var("APP_NAME").unwrap_or_else(|_| "orgid-validator".to_string());
        let hostname = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ValidatorError::Config("Invalid port number".to_string()))?;
        let environment = env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string());
        let allowed_origins = parse_list(
            &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            '|',
        );

        let cache = CacheConfig {
            enabled: parse_flag(env::var("REDIS_CACHE_ENABLED").ok()),
            backend: parse_cache_backend(env::var("CACHE_STORE").ok())?,
            redis_host: env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
            redis_port: env::var("REDIS_PORT")
                .unwrap_or_else(|_| "6379".to_string())
                .parse()
                .map_err(|_| ValidatorError::Config("Invalid REDIS_PORT".to_string()))?,
            redis_username: env::var("REDIS_USERNAME").unwrap_or_default(),
            redis_password: env::var("REDIS_PASSWORD").unwrap_or_default(),
            key_prefix: CACHE_KEY_PREFIX.to_string(),
            expiry_secs: parse_expiry(env::var("REDIS_CACHE_EXPIRY_TIME").ok()),
            connect_timeout_secs: env::var("REDIS_CONNECT_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        };

        let resolver = ResolverConfig {
            url: env::var("RESOLVER_URL").unwrap_or_else(|_| ResolverConfig::default().url),
            timeout_secs: env::var("RESOLVER_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            ..ResolverConfig::default()
        };

        let allow_list = AllowListConfig {
            enabled: parse_flag(env::var("WHITELIST_ENABLED").ok()),
            entries: env::var("WHITELIST_ORGIDS").ok().map(|raw| parse_allow_list(&raw)),
            documents: match env::var("WHITELIST_DOCUMENTS") {
                Ok(raw) => parse_allow_list_documents(&raw)?,
                Err(_) => HashMap::new(),
            },
        };

        let level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .to_lowercase();
        let json = !environment.eq_ignore_ascii_case("development");

        Ok(ServerConfig {
            service: ServiceConfig {
                name,
                hostname,
                port,
                environment,
                allowed_origins,
            },
            cache,
            resolver,
            allow_list,
            logging: LoggingConfig { level, json },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ValidatorResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ValidatorError::Config("Hostname cannot be empty".to_string()));
        }

        if self.service.port == 0 {
            return Err(ValidatorError::Config("Port cannot be 0".to_string()));
        }

        match self.logging.level.as_str() {
            "info" | "warn" | "debug" => {}
            other => {
                return Err(ValidatorError::Config(format!("Unknown LOG_LEVEL: {}", other)));
            }
        }

        if self.resolver.url.is_empty() {
            return Err(ValidatorError::Config("RESOLVER_URL cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value.map(|v| v.trim() == "true").unwrap_or(false)
}

fn parse_expiry(value: Option<String>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_CACHE_EXPIRY_SECS)
}

fn parse_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `orgid=comment|orgid=comment`
fn parse_allow_list(raw: &str) -> Vec<(String, String)> {
    parse_list(raw, '|')
        .into_iter()
        .map(|entry| match entry.split_once('=') {
            Some((org_id, comment)) => (org_id.trim().to_string(), comment.trim().to_string()),
            None => (entry, String::new()),
        })
        .collect()
}

fn parse_cache_backend(value: Option<String>) -> ValidatorResult<CacheBackend> {
    match value.as_deref().map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("redis") => Ok(CacheBackend::Redis),
        Some("memory") => Ok(CacheBackend::Memory),
        Some(other) => Err(ValidatorError::Config(format!("Unknown CACHE_STORE: {}", other))),
    }
}

/// Parse `{"<orgid>": <document>, ...}`
fn parse_allow_list_documents(raw: &str) -> ValidatorResult<HashMap<String, IdentityDocument>> {
    if raw.trim().is_empty() {
        return Ok(HashMap::new());
    }

    serde_json::from_str(raw)
        .map_err(|e| ValidatorError::Config(format!("Invalid WHITELIST_DOCUMENTS: {}", e)))
}

//! Shared fakes for router tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::to_bytes, body::Body, http::Request, response::Response, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use orgid_validator::{
    allow_list::LegacyAllowList,
    cache::{CacheStore, MemoryStore, ResolutionCache},
    config::{
        AllowListConfig, CacheConfig, LoggingConfig, ResolverConfig, ServerConfig, ServiceConfig,
    },
    crypto::account::{address_from_verifying_key, personal_message_hash},
    identity::{IdentityDocument, ResolutionResult, Resolver, VerificationMethod},
    pipeline::VerificationPipeline,
    server::build_router,
    token::TokenClaims,
    verify::{JwtVerifier, SignatureVerifier, VerificationRequest, VerifyError},
    AppContext, ValidatorError, ValidatorResult,
};
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tower::ServiceExt;

pub const ORG_A: &str = "did:orgid:0xA";
pub const ORG_B: &str = "did:orgid:0xB";
pub const ORG_D: &str = "did:orgid:0xD";

/// Resolver answering from a fixed table
#[derive(Default)]
pub struct CountingResolver {
    documents: HashMap<String, ResolutionResult>,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn with(mut self, did: &str, result: ResolutionResult) -> Self {
        self.documents.insert(did.to_string(), result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for CountingResolver {
    async fn resolve(&self, did: &str) -> ValidatorResult<ResolutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(did)
            .cloned()
            .ok_or_else(|| ValidatorError::Resolution(format!("resolver unreachable for {}", did)))
    }
}

/// Real verifier that counts invocations
#[derive(Default)]
pub struct CountingVerifier {
    inner: JwtVerifier,
    calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignatureVerifier for CountingVerifier {
    async fn verify_with_account(
        &self,
        request: VerificationRequest<'_>,
        account_id: &str,
    ) -> Result<TokenClaims, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_with_account(request, account_id).await
    }

    async fn verify_with_public_key(
        &self,
        request: VerificationRequest<'_>,
        jwk: &Value,
    ) -> Result<TokenClaims, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify_with_public_key(request, jwk).await
    }
}

/// Memory store that records every write
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    written: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    pub fn wrote(&self, key: &str) -> bool {
        self.written.lock().unwrap().iter().any(|k| k == key)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> ValidatorResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> ValidatorResult<()> {
        self.written.lock().unwrap().push(key.to_string());
        self.inner.set_ex(key, value, ttl_secs).await
    }
}

/// Store that fails every operation
pub struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &str) -> ValidatorResult<Option<String>> {
        Err(ValidatorError::Cache("connection refused".to_string()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> ValidatorResult<()> {
        Err(ValidatorError::Cache("connection refused".to_string()))
    }
}

/// Blockchain account key signing EIP-191 personal messages
pub struct TestSigner(SigningKey);

impl TestSigner {
    pub fn new(seed: u8) -> Self {
        Self(SigningKey::from_slice(&[seed; 32]).unwrap())
    }

    pub fn address(&self) -> String {
        address_from_verifying_key(self.0.verifying_key())
    }

    /// `r || s || v` with `v` in {27, 28}
    pub fn sign_message(&self, message: &[u8]) -> [u8; 65] {
        let (signature, recovery_id) = self
            .0
            .sign_prehash_recoverable(&personal_message_hash(message))
            .unwrap();

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte() + 27;
        out
    }

    /// Public half as a secp256k1 JWK
    pub fn jwk(&self) -> Value {
        let point = self.0.verifying_key().to_encoded_point(false);
        json!({
            "kty": "EC",
            "crv": "secp256k1",
            "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
            "y": URL_SAFE_NO_PAD.encode(point.y().unwrap())
        })
    }
}

pub fn signer() -> TestSigner {
    TestSigner::new(42)
}

/// Key published as a JWK in `0xD`
pub fn jwk_signer() -> TestSigner {
    TestSigner::new(7)
}

fn compact(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    format!("{}.{}", header, payload)
}

/// ES256K-R token over `payload`, signed as a personal message
pub fn signed_token(signer: &TestSigner, payload: Value) -> String {
    let signing_input = compact(&payload);
    let signature = signer.sign_message(signing_input.as_bytes());
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
}

/// Plain ES256K token (SHA-256, `r || s`) for JWK-published keys
pub fn es256k_token(signer: &TestSigner, payload: Value) -> String {
    let signing_input = compact(&payload);
    let signature: Signature = signer.0.sign(signing_input.as_bytes());
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// `0xA` has `key1` bound to the test signer, `0xB` does not resolve,
/// `0xD` publishes `key1` as a JWK
pub fn resolver() -> CountingResolver {
    let document = IdentityDocument::new(ORG_A).with_method(VerificationMethod::blockchain_account(
        "did:orgid:0xA#key1",
        format!("eip155:100:{}", signer().address()),
    ));
    let jwk_document = IdentityDocument::new(ORG_D)
        .with_method(VerificationMethod::public_key("did:orgid:0xD#key1", jwk_signer().jwk()));

    CountingResolver::default()
        .with(ORG_A, ResolutionResult::resolved(document))
        .with(ORG_B, ResolutionResult::not_found("notFound"))
        .with(ORG_D, ResolutionResult::resolved(jwk_document))
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            name: "orgid-validator-test".to_string(),
            hostname: "127.0.0.1".to_string(),
            port: 8080,
            environment: "test".to_string(),
            allowed_origins: vec!["*".to_string()],
        },
        cache: CacheConfig::default(),
        resolver: ResolverConfig::default(),
        allow_list: AllowListConfig {
            enabled: false,
            entries: None,
            documents: HashMap::new(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            json: false,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub resolver: Arc<CountingResolver>,
    pub verifier: Arc<CountingVerifier>,
}

impl TestApp {
    pub fn new(cache: ResolutionCache, allow_list: LegacyAllowList) -> Self {
        let resolver = Arc::new(resolver());
        let verifier = Arc::new(CountingVerifier::default());
        let pipeline = VerificationPipeline::new(cache, resolver.clone(), verifier.clone(), allow_list);
        let ctx = AppContext::with_pipeline(test_config(), pipeline);

        Self {
            router: build_router(ctx),
            resolver,
            verifier,
        }
    }

    pub fn with_memory_cache(store: Arc<dyn CacheStore>) -> Self {
        Self::new(
            ResolutionCache::new(store, "orgId_", 60),
            LegacyAllowList::disabled(),
        )
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

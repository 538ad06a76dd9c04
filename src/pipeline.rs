/// Verification pipeline
///
/// Request-time orchestration behind `/jwt` and `/orgid`:
/// decode -> allow-list bypass -> cache / resolve -> select key ->
/// verify signature -> caller audience policy.
use crate::{
    allow_list::LegacyAllowList,
    cache::ResolutionCache,
    error::ValidatorResult,
    identity::{
        normalize_identifier, select_verification_method, KeyMaterial, ResolutionResult, Resolver,
    },
    metrics,
    token::{decode_token, TokenClaims},
    verify::{SignatureVerifier, VerificationRequest},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Trust decision for a token
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Valid {
        claims: TokenClaims,
        resolution: ResolutionResult,
    },
    /// Resolver returned no document for the issuer
    Unresolvable {
        identifier: String,
        /// Unverified claims, for diagnostics only
        claims: TokenClaims,
        resolution: ResolutionResult,
    },
    KeyNotFound {
        identifier: String,
        reason: String,
    },
    KeyMaterialMissing {
        identifier: String,
    },
    SignatureInvalid {
        reason: String,
    },
    /// Signature valid, caller-supplied audience not matched
    AudienceMismatch {
        claims: TokenClaims,
        resolution: ResolutionResult,
    },
}

impl VerificationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid { .. } => "valid",
            VerificationOutcome::Unresolvable { .. } => "unresolvable",
            VerificationOutcome::KeyNotFound { .. } => "key_not_found",
            VerificationOutcome::KeyMaterialMissing { .. } => "key_material_missing",
            VerificationOutcome::SignatureInvalid { .. } => "signature_invalid",
            VerificationOutcome::AudienceMismatch { .. } => "audience_mismatch",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid { .. })
    }
}

#[derive(Clone)]
pub struct VerificationPipeline {
    cache: ResolutionCache,
    resolver: Arc<dyn Resolver>,
    verifier: Arc<dyn SignatureVerifier>,
    allow_list: LegacyAllowList,
}

impl VerificationPipeline {
    pub fn new(
        cache: ResolutionCache,
        resolver: Arc<dyn Resolver>,
        verifier: Arc<dyn SignatureVerifier>,
        allow_list: LegacyAllowList,
    ) -> Self {
        Self {
            cache,
            resolver,
            verifier,
            allow_list,
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Verify a token.
    ///
    /// `Err` is returned for malformed tokens, a missing issuer and resolver
    /// transport failures; every other result is a `VerificationOutcome`.
    pub async fn verify_jwt(
        &self,
        token: &str,
        audience: Option<&str>,
        scope: &[String],
    ) -> ValidatorResult<VerificationOutcome> {
        let outcome = self.run_jwt(token, audience, scope).await;

        match &outcome {
            Ok(outcome) => {
                metrics::record_verification(outcome.label());
                if outcome.is_valid() {
                    debug!("JWT successfully validated");
                } else {
                    warn!("JWT not validated: {}", outcome.label());
                }
            }
            Err(e) => {
                metrics::record_verification("error");
                warn!("Cannot validate JWT, got error: {}", e);
            }
        }

        outcome
    }

    async fn run_jwt(
        &self,
        token: &str,
        audience: Option<&str>,
        scope: &[String],
    ) -> ValidatorResult<VerificationOutcome> {
        let decoded = decode_token(token)?;
        let issuer = decoded.issuer()?.to_string();

        if let Some(entry) = self.allow_list.get(&issuer) {
            warn!(
                "Issuer {} is allow-listed ({}), skipping signature verification",
                issuer, entry.comment
            );
            let resolution = entry.substitute_resolution();
            return Ok(apply_audience_policy(decoded.claims, resolution, audience));
        }

        let did = normalize_identifier(&issuer);
        let resolution = self.resolve_cached(did).await?;

        let Some(document) = resolution.document.as_ref() else {
            return Ok(VerificationOutcome::Unresolvable {
                identifier: did.to_string(),
                claims: decoded.claims,
                resolution,
            });
        };

        let method = match select_verification_method(document, &issuer) {
            Ok(method) => method,
            Err(e) => {
                return Ok(VerificationOutcome::KeyNotFound {
                    identifier: issuer,
                    reason: e.to_string(),
                })
            }
        };

        // Caller audience is a policy check applied after verification
        let request = VerificationRequest {
            token,
            issuer: &issuer,
            audience: None,
            scope,
        };

        let verified = match method.key_material() {
            KeyMaterial::BlockchainAccount(account_id) => {
                self.verifier.verify_with_account(request, account_id).await
            }
            KeyMaterial::PublicKeyJwk(jwk) => self.verifier.verify_with_public_key(request, jwk).await,
            KeyMaterial::Missing => {
                return Ok(VerificationOutcome::KeyMaterialMissing {
                    identifier: method.id.clone(),
                })
            }
        };

        match verified {
            Ok(claims) => Ok(apply_audience_policy(claims, resolution, audience)),
            Err(e) => Ok(VerificationOutcome::SignatureInvalid {
                reason: e.to_string(),
            }),
        }
    }

    /// Direct resolution for `/orgid`, no signature step
    pub async fn resolve_orgid(&self, identifier: &str) -> ValidatorResult<ResolutionResult> {
        let did = normalize_identifier(identifier);

        if let Some(entry) = self.allow_list.get(did) {
            info!("ORGiD {} is allow-listed ({})", did, entry.comment);
            return Ok(entry.substitute_resolution());
        }

        let result = self.resolve_cached(did).await;
        match &result {
            Ok(_) => debug!("ORGiD successfully retrieved"),
            Err(e) => warn!("Cannot retrieve orgID, got error: {}", e),
        }
        result
    }

    /// Cache-aside resolution. Whatever the resolver answers is cached,
    /// including a null document.
    async fn resolve_cached(&self, did: &str) -> ValidatorResult<ResolutionResult> {
        if let Some(cached) = self.cache.get(did).await {
            return Ok(cached);
        }

        let result = match self.resolver.resolve(did).await {
            Ok(result) => result,
            Err(e) => {
                metrics::record_resolution("error");
                return Err(e);
            }
        };

        metrics::record_resolution(if result.is_resolved() {
            "resolved"
        } else {
            "not_found"
        });

        self.cache.put(did, &result).await;
        Ok(result)
    }
}

/// Case-insensitive, trimmed comparison of the caller's audience against
/// the trusted claims. An empty parameter means no policy.
fn apply_audience_policy(
    claims: TokenClaims,
    resolution: ResolutionResult,
    audience: Option<&str>,
) -> VerificationOutcome {
    let expected = audience.map(str::trim).filter(|aud| !aud.is_empty());

    match expected {
        Some(expected)
            if !claims
                .audience
                .as_ref()
                .map(|aud| aud.matches(expected))
                .unwrap_or(false) =>
        {
            VerificationOutcome::AudienceMismatch { claims, resolution }
        }
        _ => VerificationOutcome::Valid { claims, resolution },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        allow_list::AllowListEntry,
        cache::MemoryStore,
        crypto::account::AccountSigner,
        error::ValidatorError,
        identity::{IdentityDocument, VerificationMethod},
        verify::{JwtVerifier, VerifyError},
    };
    use async_trait::async_trait;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use k256::ecdsa::{signature::Signer, Signature, SigningKey};
    use serde_json::{json, Value};
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct CountingResolver {
        documents: HashMap<String, ResolutionResult>,
        calls: AtomicUsize,
    }

    impl CountingResolver {
        fn with(mut self, did: &str, result: ResolutionResult) -> Self {
            self.documents.insert(did.to_string(), result);
            self
        }

        fn calls(&self) -> usize {
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
                .ok_or_else(|| ValidatorError::Resolution(format!("unknown {}", did)))
        }
    }

    #[derive(Default)]
    struct CountingVerifier {
        inner: JwtVerifier,
        calls: AtomicUsize,
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

    const ORG_A: &str = "did:orgid:0xA";
    const ORG_B: &str = "did:orgid:0xB";

    fn signer() -> AccountSigner {
        AccountSigner::new(&[42u8; 32]).unwrap()
    }

    fn signed_token(signer: &AccountSigner, payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let signing_input = format!("{}.{}", header, payload);
        let signature = signer.sign_message(signing_input.as_bytes()).unwrap();
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
    }

    fn jwk_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    fn secp256k1_jwk(key: &SigningKey) -> Value {
        let point = key.verifying_key().to_encoded_point(false);
        json!({
            "kty": "EC",
            "crv": "secp256k1",
            "x": URL_SAFE_NO_PAD.encode(point.x().unwrap()),
            "y": URL_SAFE_NO_PAD.encode(point.y().unwrap())
        })
    }

    fn es256k_token(key: &SigningKey, payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        let signing_input = format!("{}.{}", header, payload);
        let signature: Signature = key.sign(signing_input.as_bytes());
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    fn org_a_document(signer: &AccountSigner) -> ResolutionResult {
        ResolutionResult::resolved(
            IdentityDocument::new(ORG_A)
                .with_method(VerificationMethod::blockchain_account(
                    "did:orgid:0xA#key1",
                    format!("eip155:100:{}", signer.address()),
                ))
                .with_method(VerificationMethod::public_key(
                    "did:orgid:0xA#jwk",
                    secp256k1_jwk(&jwk_key()),
                ))
                .with_method(VerificationMethod {
                    blockchain_account_id: None,
                    ..VerificationMethod::blockchain_account("did:orgid:0xA#empty", "")
                }),
        )
    }

    struct Harness {
        resolver: Arc<CountingResolver>,
        verifier: Arc<CountingVerifier>,
        store: Arc<MemoryStore>,
        pipeline: VerificationPipeline,
    }

    fn harness(allow_list: LegacyAllowList) -> Harness {
        let resolver = Arc::new(
            CountingResolver::default()
                .with(ORG_A, org_a_document(&signer()))
                .with(ORG_B, ResolutionResult::not_found("notFound")),
        );
        let verifier = Arc::new(CountingVerifier::default());
        let store = Arc::new(MemoryStore::new());
        let cache = ResolutionCache::new(store.clone(), "orgId_", 60);
        let pipeline = VerificationPipeline::new(cache, resolver.clone(), verifier.clone(), allow_list);
        Harness {
            resolver,
            verifier,
            store,
            pipeline,
        }
    }

    #[tokio::test]
    async fn test_valid_token_with_matching_audience() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xA#key1", "aud": "X"}));

        let outcome = h.pipeline.verify_jwt(&token, Some("x "), &[]).await.unwrap();
        assert!(outcome.is_valid());
    }

    #[tokio::test]
    async fn test_audience_mismatch_downgrades_valid_signature() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xA#key1", "aud": "X"}));

        let outcome = h.pipeline.verify_jwt(&token, Some("Y"), &[]).await.unwrap();
        assert_eq!(outcome.label(), "audience_mismatch");
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_verification_hits_cache() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xA#key1"}));

        h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        assert_eq!(h.resolver.calls(), 1);
        assert!(h.store.contains("orgId_did:orgid:0xA"));
    }

    #[tokio::test]
    async fn test_unresolvable_issuer_is_cached_and_terminal() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xB#key1"}));

        for _ in 0..2 {
            let outcome = h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
            match outcome {
                VerificationOutcome::Unresolvable { identifier, claims, .. } => {
                    assert_eq!(identifier, ORG_B);
                    assert_eq!(claims.issuer.as_deref(), Some("did:orgid:0xB#key1"));
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
        assert_eq!(h.resolver.calls(), 1);
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_key_fragment() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xA#key9"}));

        let outcome = h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        assert_eq!(outcome.label(), "key_not_found");
    }

    #[tokio::test]
    async fn test_method_without_key_material_fails_closed() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xA#empty"}));

        let outcome = h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        assert_eq!(outcome.label(), "key_material_missing");
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forged_signature() {
        let h = harness(LegacyAllowList::disabled());
        let impostor = AccountSigner::new(&[9u8; 32]).unwrap();
        let token = signed_token(&impostor, json!({"iss": "did:orgid:0xA#key1"}));

        let outcome = h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        assert_eq!(outcome.label(), "signature_invalid");
    }

    #[tokio::test]
    async fn test_public_key_jwk_method() {
        let h = harness(LegacyAllowList::disabled());
        let token = es256k_token(&jwk_key(), json!({"iss": "did:orgid:0xA#jwk", "aud": "X"}));

        let outcome = h.pipeline.verify_jwt(&token, Some("X"), &[]).await.unwrap();
        assert!(outcome.is_valid());
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 1);

        let outcome = h.pipeline.verify_jwt(&token, Some("Y"), &[]).await.unwrap();
        assert_eq!(outcome.label(), "audience_mismatch");
    }

    #[tokio::test]
    async fn test_public_key_jwk_method_rejects_other_key() {
        let h = harness(LegacyAllowList::disabled());
        let other = SigningKey::from_slice(&[8u8; 32]).unwrap();
        let token = es256k_token(&other, json!({"iss": "did:orgid:0xA#jwk"}));

        let outcome = h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        assert_eq!(outcome.label(), "signature_invalid");
    }

    #[tokio::test]
    async fn test_missing_scope_is_signature_invalid() {
        let h = harness(LegacyAllowList::disabled());
        let token = signed_token(&signer(), json!({"iss": "did:orgid:0xA#key1", "scope": ["read"]}));

        let outcome = h
            .pipeline
            .verify_jwt(&token, None, &["write".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.label(), "signature_invalid");
    }

    #[tokio::test]
    async fn test_decode_errors_skip_resolution() {
        let h = harness(LegacyAllowList::disabled());

        assert!(matches!(
            h.pipeline.verify_jwt("garbage", None, &[]).await,
            Err(ValidatorError::Decode(_))
        ));

        let no_issuer = signed_token(&signer(), json!({"aud": "X"}));
        assert!(matches!(
            h.pipeline.verify_jwt(&no_issuer, None, &[]).await,
            Err(ValidatorError::MissingIssuer)
        ));
        assert_eq!(h.resolver.calls(), 0);
    }

    #[tokio::test]
    async fn test_allow_listed_issuer_bypasses_verification() {
        let h = harness(LegacyAllowList::with_entries(vec![AllowListEntry::new("0xLEGACY", "sunset")]));
        let token = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256K"}"#),
            URL_SAFE_NO_PAD.encode(br#"{"iss":"did:orgid:0xLEGACY#key1"}"#),
            URL_SAFE_NO_PAD.encode(b"not a signature")
        );

        let outcome = h.pipeline.verify_jwt(&token, None, &[]).await.unwrap();
        assert!(outcome.is_valid());
        assert_eq!(h.resolver.calls(), 0);
        assert_eq!(h.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_orgid_paths() {
        let h = harness(LegacyAllowList::with_entries(vec![AllowListEntry::new("0xLEGACY", "sunset")]));

        let resolved = h.pipeline.resolve_orgid(ORG_A).await.unwrap();
        assert!(resolved.is_resolved());

        let missing = h.pipeline.resolve_orgid(ORG_B).await.unwrap();
        assert!(!missing.is_resolved());

        let legacy = h.pipeline.resolve_orgid("did:orgid:0xLEGACY").await.unwrap();
        assert_eq!(legacy.document.unwrap().id, "did:orgid:0xLEGACY");

        assert!(matches!(
            h.pipeline.resolve_orgid("did:orgid:0xC").await,
            Err(ValidatorError::Resolution(_))
        ));
        assert_eq!(h.resolver.calls(), 3);
    }

    #[tokio::test]
    async fn test_disabled_cache_resolves_every_time() {
        let resolver = Arc::new(CountingResolver::default().with(ORG_A, org_a_document(&signer())));
        let pipeline = VerificationPipeline::new(
            ResolutionCache::disabled(),
            resolver.clone(),
            Arc::new(JwtVerifier::default()),
            LegacyAllowList::disabled(),
        );

        pipeline.resolve_orgid(ORG_A).await.unwrap();
        pipeline.resolve_orgid(ORG_A).await.unwrap();
        assert_eq!(resolver.calls(), 2);
    }

    #[test]
    fn test_empty_audience_parameter_is_no_policy() {
        let claims: TokenClaims = serde_json::from_value(json!({"iss": "x"})).unwrap();
        let outcome = apply_audience_policy(claims, ResolutionResult::not_found("n/a"), Some("  "));
        assert!(outcome.is_valid());
    }
}

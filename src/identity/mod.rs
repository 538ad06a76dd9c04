/// ORGiD identity model
///
/// Identifiers, identity documents, verification methods and the resolution
/// results produced by the resolver and stored in the cache.

pub mod resolver;
pub mod selector;

pub use resolver::{HttpResolver, Resolver};
pub use selector::{select_verification_method, SelectionError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known DID method prefix for ORGiDs
pub const ORGID_DID_PREFIX: &str = "did:orgid:";

/// Split `did:orgid:0x..#key` into the bare DID and its fragment.
///
/// An empty fragment (`did:orgid:0x..#`) counts as no fragment.
pub fn split_fragment(did: &str) -> (&str, Option<&str>) {
    match did.split_once('#') {
        Some((base, fragment)) if !fragment.is_empty() => (base, Some(fragment)),
        Some((base, _)) => (base, None),
        None => (did, None),
    }
}

/// Fragment carried by an identifier, if any
pub fn fragment_of(did: &str) -> Option<&str> {
    split_fragment(did).1
}

/// Identifier used for resolution and as the cache key: trimmed, no fragment
pub fn normalize_identifier(did: &str) -> &str {
    split_fragment(did.trim()).0
}

/// Strip the `did:orgid:` prefix, leaving the bare organisation id
pub fn strip_orgid_prefix(did: &str) -> &str {
    did.strip_prefix(ORGID_DID_PREFIX).unwrap_or(did)
}

/// Outcome of resolving an identifier.
///
/// `document == None` marks an unresolvable identifier. It is a terminal
/// result and is cached like any other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    #[serde(alias = "didDocument", default)]
    pub document: Option<IdentityDocument>,
    #[serde(alias = "didResolutionMetadata", default)]
    pub metadata: Map<String, Value>,
    /// Anything else the resolver returned, e.g. `didDocumentMetadata`
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ResolutionResult {
    pub fn resolved(document: IdentityDocument) -> Self {
        Self {
            document: Some(document),
            metadata: Map::new(),
            other: Map::new(),
        }
    }

    /// Explicit "not found" answer from the resolver
    pub fn not_found(error: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::String(error.into()));
        Self {
            document: None,
            metadata,
            other: Map::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.document.is_some()
    }
}

/// Identity document of an organisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityDocument {
    pub id: String,
    /// Document order is authoritative for key selection
    #[serde(rename = "verificationMethod", default)]
    pub verification_methods: Vec<VerificationMethod>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl IdentityDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            verification_methods: Vec::new(),
            other: Map::new(),
        }
    }

    pub fn with_method(mut self, method: VerificationMethod) -> Self {
        self.verification_methods.push(method);
        self
    }
}

/// Key binding inside an identity document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub method_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Which key material a verification method carries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyMaterial<'a> {
    BlockchainAccount(&'a str),
    PublicKeyJwk(&'a Value),
    Missing,
}

impl VerificationMethod {
    pub fn blockchain_account(id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method_type: Some("EcdsaSecp256k1RecoveryMethod2020".to_string()),
            controller: None,
            blockchain_account_id: Some(account_id.into()),
            public_key_jwk: None,
            other: Map::new(),
        }
    }

    pub fn public_key(id: impl Into<String>, jwk: Value) -> Self {
        Self {
            id: id.into(),
            method_type: Some("JsonWebKey2020".to_string()),
            controller: None,
            blockchain_account_id: None,
            public_key_jwk: Some(jwk),
            other: Map::new(),
        }
    }

    /// Blockchain account takes precedence when both are present
    pub fn key_material(&self) -> KeyMaterial<'_> {
        match (&self.blockchain_account_id, &self.public_key_jwk) {
            (Some(account), _) if !account.trim().is_empty() => {
                KeyMaterial::BlockchainAccount(account)
            }
            (_, Some(jwk)) if !jwk.is_null() => KeyMaterial::PublicKeyJwk(jwk),
            _ => KeyMaterial::Missing,
        }
    }
}

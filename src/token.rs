/// Unverified JWT decoding
///
/// Splits a compact JWS and decodes header and claims without checking the
/// signature. Nothing decoded here is trusted.
use crate::error::{ValidatorError, ValidatorResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// JOSE header fields the validator looks at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// `aud` claim, either a single string or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Case-insensitive, whitespace-trimmed comparison
    pub fn matches(&self, expected: &str) -> bool {
        let expected = expected.trim().to_uppercase();
        match self {
            Audience::One(aud) => aud.trim().to_uppercase() == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud.trim().to_uppercase() == expected),
        }
    }

    /// Exact comparison
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// `scope` claim, either a list or a space/comma separated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scope {
    List(Vec<String>),
    Text(String),
}

impl Scope {
    pub fn items(&self) -> Vec<&str> {
        match self {
            Scope::List(items) => items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()).collect(),
            Scope::Text(text) => text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(rename = "aud", default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A decoded but unverified token
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: TokenHeader,
    pub claims: TokenClaims,
    /// `header.payload`, the bytes covered by the signature
    pub signing_input: String,
    /// Base64url signature segment
    pub signature: String,
}

impl UnverifiedToken {
    pub fn issuer(&self) -> ValidatorResult<&str> {
        self.claims
            .issuer
            .as_deref()
            .map(str::trim)
            .filter(|iss| !iss.is_empty())
            .ok_or(ValidatorError::MissingIssuer)
    }
}

/// Decode a compact JWS without verifying it
pub fn decode_token(token: &str) -> ValidatorResult<UnverifiedToken> {
    let token = token.trim();
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(ValidatorError::Decode(
            "expected three dot-separated segments".to_string(),
        ));
    }

    let header: TokenHeader = decode_segment(parts[0], "header")?;
    let claims: TokenClaims = decode_segment(parts[1], "payload")?;

    if parts[2].is_empty() {
        return Err(ValidatorError::Decode("signature segment is empty".to_string()));
    }

    Ok(UnverifiedToken {
        header,
        claims,
        signing_input: format!("{}.{}", parts[0], parts[1]),
        signature: parts[2].to_string(),
    })
}

/// Decode a base64url segment, tolerating padding
pub fn decode_base64url(segment: &str) -> ValidatorResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| ValidatorError::Decode(format!("invalid base64url: {}", e)))
}

fn decode_segment<T: DeserializeOwned>(segment: &str, name: &str) -> ValidatorResult<T> {
    let bytes = decode_base64url(segment)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ValidatorError::Decode(format!("invalid {}: {}", name, e)))
}

/// Split the `scope` query parameter (comma separated)
pub fn parse_scope_param(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

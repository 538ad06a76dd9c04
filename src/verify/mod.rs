/// Token signature verification
///
/// Two variants, chosen by the key material of the selected verification
/// method: blockchain account (signer recovery) and public key (JWK).
/// Both check issuer, expiry, audience and scope and hand back the verified
/// claims.

pub mod jwk;

use crate::{
    crypto::account::{parse_account_address, recover_address},
    token::{decode_base64url, decode_token, TokenClaims},
};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Default clock skew allowance
pub const DEFAULT_LEEWAY_SECS: u64 = 300;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("Invalid token signature: {0}")]
    InvalidSignature(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),

    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),
}

/// What a token must satisfy besides its signature
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    pub token: &'a str,
    /// Expected `iss`, including the key fragment
    pub issuer: &'a str,
    /// Exact `aud` to require, if any
    pub audience: Option<&'a str>,
    /// Scopes that must all be present in the `scope` claim
    pub scope: &'a [String],
}

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify_with_account(
        &self,
        request: VerificationRequest<'_>,
        account_id: &str,
    ) -> Result<TokenClaims, VerifyError>;

    async fn verify_with_public_key(
        &self,
        request: VerificationRequest<'_>,
        jwk: &Value,
    ) -> Result<TokenClaims, VerifyError>;
}

/// Default verifier
#[derive(Debug, Clone)]
pub struct JwtVerifier {
    leeway_secs: u64,
}

impl Default for JwtVerifier {
    fn default() -> Self {
        Self {
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }
}

impl JwtVerifier {
    pub fn with_leeway(leeway_secs: u64) -> Self {
        Self { leeway_secs }
    }
}

#[async_trait]
impl SignatureVerifier for JwtVerifier {
    async fn verify_with_account(
        &self,
        request: VerificationRequest<'_>,
        account_id: &str,
    ) -> Result<TokenClaims, VerifyError> {
        let decoded = decode_token(request.token)
            .map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;

        match decoded.header.alg.as_str() {
            "ES256K" | "ES256K-R" => {}
            other => {
                return Err(VerifyError::UnsupportedKey(format!(
                    "algorithm {} cannot be used with a blockchain account",
                    other
                )))
            }
        }

        let expected = parse_account_address(account_id)
            .map_err(|e| VerifyError::UnsupportedKey(e.to_string()))?;
        let signature = decode_base64url(&decoded.signature)
            .map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;
        let signer = recover_address(decoded.signing_input.as_bytes(), &signature)
            .map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;

        if signer != expected {
            return Err(VerifyError::InvalidSignature(format!(
                "signer {} does not match account {}",
                signer, expected
            )));
        }

        check_claims(&decoded.claims, &request, now_secs(), self.leeway_secs)?;
        Ok(decoded.claims)
    }

    async fn verify_with_public_key(
        &self,
        request: VerificationRequest<'_>,
        jwk: &Value,
    ) -> Result<TokenClaims, VerifyError> {
        let claims = jwk::verify(&request, jwk, self.leeway_secs)?;
        check_scope(&claims, request.scope)?;
        Ok(claims)
    }
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Issuer, time window, audience and scope checks on already verified claims
pub fn check_claims(
    claims: &TokenClaims,
    request: &VerificationRequest<'_>,
    now: i64,
    leeway_secs: u64,
) -> Result<(), VerifyError> {
    let leeway = leeway_secs as i64;

    if claims.issuer.as_deref().map(str::trim) != Some(request.issuer) {
        return Err(VerifyError::InvalidClaims(format!(
            "issuer does not match {}",
            request.issuer
        )));
    }

    if let Some(exp) = claims.exp {
        if now > exp + leeway {
            return Err(VerifyError::Expired);
        }
    }

    if let Some(nbf) = claims.nbf {
        if now + leeway < nbf {
            return Err(VerifyError::NotYetValid);
        }
    }

    if let Some(expected) = request.audience {
        let matches = claims
            .audience
            .as_ref()
            .map(|aud| aud.contains(expected))
            .unwrap_or(false);
        if !matches {
            return Err(VerifyError::InvalidClaims(format!(
                "audience does not include {}",
                expected
            )));
        }
    }

    check_scope(claims, request.scope)
}

/// Every requested scope must be granted by the token
pub fn check_scope(claims: &TokenClaims, required: &[String]) -> Result<(), VerifyError> {
    if required.is_empty() {
        return Ok(());
    }

    let granted = claims.scope.as_ref().map(|s| s.items()).unwrap_or_default();
    match required.iter().find(|scope| !granted.contains(&scope.as_str())) {
        Some(missing) => Err(VerifyError::InvalidClaims(format!(
            "scope {} not granted",
            missing
        ))),
        None => Ok(()),
    }
}

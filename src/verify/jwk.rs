/// JWK-based verification
///
/// Keys come from a public identity document, so only asymmetric key
/// families are accepted. secp256k1 keys (ES256K) are verified with k256,
/// everything else through jsonwebtoken.
use crate::{
    token::{decode_base64url, decode_token, TokenClaims},
    verify::{check_claims, now_secs, VerificationRequest, VerifyError},
};
use jsonwebtoken::{
    decode, decode_header,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk},
    Algorithm, DecodingKey, Validation,
};
use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use serde_json::Value;
use std::collections::HashSet;

/// Algorithms usable with a key, by key family.
///
/// Symmetric (`oct`) keys are refused: a secret published in a document is
/// no secret.
fn allowed_algorithms(jwk: &Jwk) -> Result<Vec<Algorithm>, VerifyError> {
    match &jwk.algorithm {
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => Ok(vec![Algorithm::ES256]),
            EllipticCurve::P384 => Ok(vec![Algorithm::ES384]),
            ref other => Err(VerifyError::UnsupportedKey(format!(
                "unsupported curve {:?}",
                other
            ))),
        },
        AlgorithmParameters::RSA(_) => Ok(vec![
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ]),
        AlgorithmParameters::OctetKeyPair(_) => Ok(vec![Algorithm::EdDSA]),
        AlgorithmParameters::OctetKey(_) => Err(VerifyError::UnsupportedKey(
            "symmetric keys cannot be used for public key verification".to_string(),
        )),
    }
}

fn is_secp256k1(jwk: &Value) -> bool {
    jwk.get("kty").and_then(Value::as_str) == Some("EC")
        && jwk.get("crv").and_then(Value::as_str) == Some("secp256k1")
}

/// Verify `request.token` against a public key JWK
pub fn verify(
    request: &VerificationRequest<'_>,
    jwk: &Value,
    leeway_secs: u64,
) -> Result<TokenClaims, VerifyError> {
    if is_secp256k1(jwk) {
        return verify_es256k(request, jwk, leeway_secs);
    }

    let jwk: Jwk = serde_json::from_value(jwk.clone())
        .map_err(|e| VerifyError::UnsupportedKey(format!("invalid JWK: {}", e)))?;
    let algorithms = allowed_algorithms(&jwk)?;
    let key = DecodingKey::from_jwk(&jwk)
        .map_err(|e| VerifyError::UnsupportedKey(format!("invalid JWK: {}", e)))?;

    let header = decode_header(request.token)
        .map_err(|e| VerifyError::InvalidSignature(format!("invalid header: {}", e)))?;
    if !algorithms.contains(&header.alg) {
        return Err(VerifyError::UnsupportedKey(format!(
            "algorithm {:?} does not match key type",
            header.alg
        )));
    }

    let mut validation = Validation::new(header.alg);
    validation.algorithms = algorithms;
    validation.leeway = leeway_secs;
    validation.required_spec_claims = HashSet::new();
    validation.validate_nbf = true;
    validation.set_issuer(&[request.issuer]);
    match request.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    decode::<TokenClaims>(request.token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    VerifyError::InvalidClaims("issuer does not match".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    VerifyError::InvalidClaims("audience does not match".to_string())
                }
                _ => VerifyError::InvalidSignature(e.to_string()),
            }
        })
}

/// Uncompressed SEC1 point from the `x` / `y` coordinates
fn secp256k1_key(jwk: &Value) -> Result<VerifyingKey, VerifyError> {
    let coordinate = |name: &str| -> Result<Vec<u8>, VerifyError> {
        let encoded = jwk
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| VerifyError::UnsupportedKey(format!("JWK is missing {}", name)))?;
        let bytes = decode_base64url(encoded)
            .map_err(|e| VerifyError::UnsupportedKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(VerifyError::UnsupportedKey(format!(
                "JWK coordinate {} must be 32 bytes",
                name
            )));
        }
        Ok(bytes)
    };

    let mut point = Vec::with_capacity(65);
    point.push(0x04);
    point.extend_from_slice(&coordinate("x")?);
    point.extend_from_slice(&coordinate("y")?);

    VerifyingKey::from_sec1_bytes(&point)
        .map_err(|e| VerifyError::UnsupportedKey(format!("invalid secp256k1 key: {}", e)))
}

/// ES256K: SHA-256 over `header.payload`, 64-byte `r || s` signature
fn verify_es256k(
    request: &VerificationRequest<'_>,
    jwk: &Value,
    leeway_secs: u64,
) -> Result<TokenClaims, VerifyError> {
    let key = secp256k1_key(jwk)?;
    let decoded =
        decode_token(request.token).map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;

    if decoded.header.alg != "ES256K" {
        return Err(VerifyError::UnsupportedKey(format!(
            "algorithm {} does not match key type",
            decoded.header.alg
        )));
    }

    let raw = decode_base64url(&decoded.signature)
        .map_err(|e| VerifyError::InvalidSignature(e.to_string()))?;
    let signature = Signature::from_slice(&raw)
        .map_err(|e| VerifyError::InvalidSignature(format!("invalid signature: {}", e)))?;
    // k256 only accepts low-s signatures
    let signature = signature.normalize_s().unwrap_or(signature);

    key.verify(decoded.signing_input.as_bytes(), &signature)
        .map_err(|_| VerifyError::InvalidSignature("signature does not match key".to_string()))?;

    check_claims(&decoded.claims, request, now_secs(), leeway_secs)?;
    Ok(decoded.claims)
}

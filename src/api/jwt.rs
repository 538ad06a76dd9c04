/// JWT validation endpoint
use crate::{
    context::AppContext,
    error::{FailedResponse, ValidatorError, ValidatorResult},
    identity::ResolutionResult,
    pipeline::VerificationOutcome,
    token::{parse_scope_param, TokenClaims},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/jwt", get(validate_jwt))
}

#[derive(Debug, Deserialize)]
pub struct JwtParams {
    pub jwt: Option<String>,
    pub audience: Option<String>,
    /// Comma-separated
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<TokenClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_response: Option<ResolutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JwtResponse {
    fn ok(payload: TokenClaims, resolution: ResolutionResult) -> Self {
        Self {
            status: "OK",
            payload: Some(payload),
            resolution_response: Some(resolution),
            error: None,
        }
    }

    fn not_ok() -> Self {
        Self {
            status: "NOT_OK",
            payload: None,
            resolution_response: None,
            error: None,
        }
    }
}

/// GET /jwt?jwt=<token>&audience=<aud>&scope=<a,b>
pub async fn validate_jwt(
    State(ctx): State<AppContext>,
    Query(params): Query<JwtParams>,
) -> ValidatorResult<Response> {
    let token = params
        .jwt
        .as_deref()
        .map(str::trim)
        .filter(|jwt| !jwt.is_empty())
        .ok_or_else(|| ValidatorError::MissingParameter("Missing JWT parameter".to_string()))?;

    debug!(
        "Request to validate JWT:{}, audience:{:?}, scope:{:?}",
        token, params.audience, params.scope
    );

    let scope = params
        .scope
        .as_deref()
        .map(parse_scope_param)
        .unwrap_or_default();

    let outcome = ctx
        .pipeline
        .verify_jwt(token, params.audience.as_deref(), &scope)
        .await?;

    Ok(outcome_response(outcome))
}

/// Map a trust decision onto the HTTP contract
pub fn outcome_response(outcome: VerificationOutcome) -> Response {
    match outcome {
        VerificationOutcome::Valid { claims, resolution } => {
            (StatusCode::OK, Json(JwtResponse::ok(claims, resolution))).into_response()
        }
        VerificationOutcome::AudienceMismatch { .. } => {
            (StatusCode::OK, Json(JwtResponse::not_ok())).into_response()
        }
        VerificationOutcome::Unresolvable {
            identifier,
            claims,
            resolution,
        } => (
            StatusCode::NOT_FOUND,
            Json(JwtResponse {
                status: "FAILED",
                payload: Some(claims),
                resolution_response: Some(resolution),
                error: Some(format!("Could not resolve {}", identifier)),
            }),
        )
            .into_response(),
        VerificationOutcome::KeyNotFound { identifier, reason } => failed(format!(
            "Key not found for {}: {}",
            identifier, reason
        )),
        VerificationOutcome::KeyMaterialMissing { identifier } => failed(format!(
            "Verification method {} has neither blockchainAccountId nor publicKeyJwk",
            identifier
        )),
        VerificationOutcome::SignatureInvalid { reason } => failed(reason),
    }
}

fn failed(error: String) -> Response {
    (StatusCode::NOT_FOUND, Json(FailedResponse::new(error))).into_response()
}

/// Direct ORGiD resolution
use crate::{
    context::AppContext,
    error::{ValidatorError, ValidatorResult},
    identity::ResolutionResult,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/orgid", get(resolve_orgid))
}

#[derive(Debug, Deserialize)]
pub struct OrgIdParams {
    pub orgid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgIdResponse {
    pub resolution_response: ResolutionResult,
}

/// GET /orgid?orgid=<identifier>
///
/// A null document is still a 200; only transport failures are 404.
pub async fn resolve_orgid(
    State(ctx): State<AppContext>,
    Query(params): Query<OrgIdParams>,
) -> ValidatorResult<Json<OrgIdResponse>> {
    let orgid = params
        .orgid
        .as_deref()
        .map(str::trim)
        .filter(|orgid| !orgid.is_empty())
        .ok_or_else(|| ValidatorError::MissingParameter("Missing orgid parameter".to_string()))?;

    debug!("Request to retrieve ORGiD:{}", orgid);

    let resolution_response = ctx.pipeline.resolve_orgid(orgid).await?;
    Ok(Json(OrgIdResponse {
        resolution_response,
    }))
}

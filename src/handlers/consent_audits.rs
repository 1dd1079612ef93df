//! # Data Sharing Consent Audit Handlers

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{QueryParams, list_query};
use crate::error::{ApiError, not_found};
use crate::filters::{FieldKind, QueryField};
use crate::models::consent_audit::{self, Entity as ConsentAudit};
use crate::pagination::{Page, RequestUrl};
use crate::repositories::list_page;
use crate::server::AppState;

pub const CONSENT_FIELDS: &[QueryField<consent_audit::Column>] = &[
    QueryField::new("user", consent_audit::Column::UserId, FieldKind::Integer),
    QueryField::new("state", consent_audit::Column::State, FieldKind::Text),
];

/// Consent state of one learner link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConsentAuditResponse {
    /// Enterprise customer user id
    pub user: i32,
    /// `not_set`, `enabled` or `disabled`
    pub state: String,
}

impl From<consent_audit::Model> for ConsentAuditResponse {
    fn from(model: consent_audit::Model) -> Self {
        Self {
            user: model.user_id,
            state: model.state,
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/user-data-sharing-consent/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("user" = Option<i32>, Query, description = "Filter by enterprise customer user id"),
        ("state" = Option<String>, Query, description = "Filter by consent state"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of consent audits", body = Page<ConsentAuditResponse>),
        (status = 400, description = "Invalid filter value", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "consent"
)]
pub async fn list_consent_audits(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<ConsentAuditResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let page = list_page(&state.db, ConsentAudit::find(), CONSENT_FIELDS, query).await?;
    Ok(Json(page.map(ConsentAuditResponse::from)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/user-data-sharing-consent/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Consent audit id")),
    responses(
        (status = 200, description = "Consent audit", body = ConsentAuditResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "consent"
)]
pub async fn get_consent_audit(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ConsentAuditResponse>, ApiError> {
    let audit = ConsentAudit::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(audit.into()))
}

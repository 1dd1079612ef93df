//! # Site Handlers

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
use crate::models::site::{self, Entity as Site};
use crate::pagination::{Page, RequestUrl};
use crate::repositories::list_page;
use crate::server::AppState;

pub const SITE_FIELDS: &[QueryField<site::Column>] = &[
    QueryField::new("domain", site::Column::Domain, FieldKind::Text),
    QueryField::new("name", site::Column::Name, FieldKind::Text),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SiteResponse {
    pub domain: String,
    pub name: String,
}

impl From<site::Model> for SiteResponse {
    fn from(model: site::Model) -> Self {
        Self {
            domain: model.domain,
            name: model.name,
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/site/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("domain" = Option<String>, Query, description = "Filter by domain"),
        ("name" = Option<String>, Query, description = "Filter by name"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of sites", body = Page<SiteResponse>),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 429, description = "Throttled", body = ApiError)
    ),
    tag = "sites"
)]
pub async fn list_sites(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<SiteResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let page = list_page(&state.db, Site::find(), SITE_FIELDS, query).await?;
    Ok(Json(page.map(SiteResponse::from)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/site/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Site id")),
    responses(
        (status = 200, description = "Site", body = SiteResponse),
        (status = 404, description = "No such site", body = ApiError)
    ),
    tag = "sites"
)]
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SiteResponse>, ApiError> {
    let site = Site::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(site.into()))
}

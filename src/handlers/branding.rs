//! # Branding Configuration Handlers

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{QueryParams, list_query};
use crate::error::{ApiError, not_found};
use crate::filters::{FieldKind, QueryField};
use crate::models::branding_configuration::{self, Entity as BrandingConfiguration};
use crate::pagination::{Page, RequestUrl};
use crate::repositories::list_page;
use crate::server::AppState;

pub const BRANDING_FIELDS: &[QueryField<branding_configuration::Column>] = &[QueryField::new(
    "enterprise_customer",
    branding_configuration::Column::EnterpriseCustomerId,
    FieldKind::Uuid,
)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BrandingResponse {
    #[schema(value_type = String)]
    pub enterprise_customer: Uuid,
    pub logo: Option<String>,
}

impl From<branding_configuration::Model> for BrandingResponse {
    fn from(model: branding_configuration::Model) -> Self {
        Self {
            enterprise_customer: model.enterprise_customer_id,
            logo: model.logo,
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer-branding/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("enterprise_customer" = Option<String>, Query, description = "Filter by customer UUID"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of branding configurations", body = Page<BrandingResponse>),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "branding"
)]
pub async fn list_branding(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<BrandingResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let page = list_page(&state.db, BrandingConfiguration::find(), BRANDING_FIELDS, query).await?;
    Ok(Json(page.map(BrandingResponse::from)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer-branding/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Branding configuration id")),
    responses(
        (status = 200, description = "Branding configuration", body = BrandingResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "branding"
)]
pub async fn get_branding(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<BrandingResponse>, ApiError> {
    let branding = BrandingConfiguration::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(branding.into()))
}

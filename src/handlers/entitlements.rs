//! # Enterprise Customer Entitlement Handlers

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
use crate::models::enterprise_customer_entitlement::{self, Entity as EnterpriseCustomerEntitlement};
use crate::pagination::{Page, RequestUrl};
use crate::repositories::list_page;
use crate::server::AppState;

pub const ENTITLEMENT_FIELDS: &[QueryField<enterprise_customer_entitlement::Column>] = &[
    QueryField::new(
        "enterprise_customer",
        enterprise_customer_entitlement::Column::EnterpriseCustomerId,
        FieldKind::Uuid,
    ),
    QueryField::new(
        "entitlement_id",
        enterprise_customer_entitlement::Column::EntitlementId,
        FieldKind::Integer,
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntitlementResponse {
    #[schema(value_type = String)]
    pub enterprise_customer: Uuid,
    pub entitlement_id: i32,
}

impl From<enterprise_customer_entitlement::Model> for EntitlementResponse {
    fn from(model: enterprise_customer_entitlement::Model) -> Self {
        Self {
            enterprise_customer: model.enterprise_customer_id,
            entitlement_id: model.entitlement_id,
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer-entitlements/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("enterprise_customer" = Option<String>, Query, description = "Filter by customer UUID"),
        ("entitlement_id" = Option<i32>, Query, description = "Filter by entitlement id"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of entitlements", body = Page<EntitlementResponse>),
        (status = 400, description = "Invalid filter value", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "entitlements"
)]
pub async fn list_entitlements(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<EntitlementResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let page = list_page(
        &state.db,
        EnterpriseCustomerEntitlement::find(),
        ENTITLEMENT_FIELDS,
        query,
    )
    .await?;
    Ok(Json(page.map(EntitlementResponse::from)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer-entitlements/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Entitlement row id")),
    responses(
        (status = 200, description = "Entitlement", body = EntitlementResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "entitlements"
)]
pub async fn get_entitlement(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let entitlement = EnterpriseCustomerEntitlement::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(entitlement.into()))
}

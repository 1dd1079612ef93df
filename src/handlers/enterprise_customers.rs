//! # Enterprise Customer Handlers
//!
//! Active enterprise customers and the courses of their catalog.

use axum::{
    extract::{Path, State},
    http::Method,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::branding::BrandingResponse;
use super::catalogs::{course_context, enterprise_catalog_courses};
use super::entitlements::EntitlementResponse;
use super::sites::SiteResponse;
use super::{QueryParams, list_query};
use crate::auth::CurrentUser;
use crate::catalog::EnterpriseCourse;
use crate::error::{ApiError, not_found};
use crate::filters::{FieldKind, QueryField};
use crate::models::enterprise_customer;
use crate::pagination::{Page, RequestUrl};
use crate::permissions::{ENTERPRISE_COURSES, ObjectRef};
use crate::repositories::EnterpriseCustomerRepository;
use crate::repositories::enterprise_customer::CustomerDetails;
use crate::server::AppState;

pub const CUSTOMER_FIELDS: &[QueryField<enterprise_customer::Column>] = &[
    QueryField::new("uuid", enterprise_customer::Column::Uuid, FieldKind::Uuid),
    QueryField::new("name", enterprise_customer::Column::Name, FieldKind::Text),
    QueryField::new("catalog", enterprise_customer::Column::Catalog, FieldKind::Integer),
    QueryField::new("active", enterprise_customer::Column::Active, FieldKind::Boolean),
    QueryField::new("site", enterprise_customer::Column::SiteId, FieldKind::Integer),
    QueryField::new(
        "enable_data_sharing_consent",
        enterprise_customer::Column::EnableDataSharingConsent,
        FieldKind::Boolean,
    ),
    QueryField::new(
        "enforce_data_sharing_consent",
        enterprise_customer::Column::EnforceDataSharingConsent,
        FieldKind::Text,
    ),
];

/// Full customer representation, also embedded in learner links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnterpriseCustomerResponse {
    #[schema(value_type = String)]
    pub uuid: Uuid,
    pub name: String,
    pub catalog: Option<i32>,
    pub active: bool,
    pub site: Option<SiteResponse>,
    pub enable_data_sharing_consent: bool,
    pub enforce_data_sharing_consent: String,
    /// Ids of the customer's learner links
    pub enterprise_customer_users: Vec<i32>,
    pub branding_configuration: Option<BrandingResponse>,
    pub enterprise_customer_entitlements: Vec<EntitlementResponse>,
}

impl From<CustomerDetails> for EnterpriseCustomerResponse {
    fn from(details: CustomerDetails) -> Self {
        let CustomerDetails {
            customer,
            site,
            enterprise_customer_user_ids,
            branding,
            entitlements,
        } = details;
        Self {
            uuid: customer.uuid,
            name: customer.name,
            catalog: customer.catalog,
            active: customer.active,
            site: site.map(SiteResponse::from),
            enable_data_sharing_consent: customer.enable_data_sharing_consent,
            enforce_data_sharing_consent: customer.enforce_data_sharing_consent,
            enterprise_customer_users: enterprise_customer_user_ids,
            branding_configuration: branding.map(BrandingResponse::from),
            enterprise_customer_entitlements: entitlements
                .into_iter()
                .map(EntitlementResponse::from)
                .collect(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("uuid" = Option<String>, Query, description = "Filter by UUID"),
        ("name" = Option<String>, Query, description = "Filter by name"),
        ("catalog" = Option<i32>, Query, description = "Filter by catalog id"),
        ("site" = Option<i32>, Query, description = "Filter by site id"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of active enterprise customers", body = Page<EnterpriseCustomerResponse>),
        (status = 400, description = "Invalid filter value", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "enterprise-customers"
)]
pub async fn list_enterprise_customers(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<EnterpriseCustomerResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let repo = EnterpriseCustomerRepository::new(&state.db);

    let page = repo.list_active(CUSTOMER_FIELDS, query).await?;
    let Page {
        count,
        next,
        previous,
        results,
    } = page;
    let results = repo
        .load_details(results)
        .await?
        .into_iter()
        .map(EnterpriseCustomerResponse::from)
        .collect();

    Ok(Json(Page {
        count,
        next,
        previous,
        results,
    }))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer/{uuid}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("uuid" = String, Path, description = "Enterprise customer UUID")),
    responses(
        (status = 200, description = "Enterprise customer", body = EnterpriseCustomerResponse),
        (status = 404, description = "No active customer with this UUID", body = ApiError)
    ),
    tag = "enterprise-customers"
)]
pub async fn get_enterprise_customer(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<EnterpriseCustomerResponse>, ApiError> {
    let repo = EnterpriseCustomerRepository::new(&state.db);
    let customer = repo
        .find_active(uuid)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(repo.load_detail(customer).await?.into()))
}

/// Courses in the customer's catalog, with enterprise enrollment links.
#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-customer/{uuid}/courses/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("uuid" = String, Path, description = "Enterprise customer UUID"),
        ("page" = Option<u64>, Query, description = "Forwarded to the catalog service")
    ),
    responses(
        (status = 200, description = "Page of catalog courses with enterprise context"),
        (status = 403, description = "Caller is neither staff nor linked to the customer", body = ApiError),
        (status = 404, description = "Unknown customer, no catalog, or nothing returned by the catalog service", body = ApiError)
    ),
    tag = "enterprise-customers"
)]
pub async fn list_enterprise_courses(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(uuid): Path<Uuid>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<EnterpriseCourse>>, ApiError> {
    let customer = EnterpriseCustomerRepository::new(&state.db)
        .find_active(uuid)
        .await?
        .ok_or_else(|| not_found("Not found."))?;

    ENTERPRISE_COURSES
        .check_object(&state, &user, &method, ObjectRef::EnterpriseCustomer(uuid))
        .await?;

    let path = url.full_path();
    let Some(catalog_id) = customer.catalog.filter(|id| *id != 0) else {
        let message = format!(
            "No catalog is associated with Enterprise {} from endpoint '{}'.",
            customer.name, path
        );
        tracing::error!(enterprise_customer = %customer.uuid, "{message}");
        return Err(not_found(message));
    };

    let log_message = format!(
        "Unable to fetch API response for catalog courses for Enterprise {} from endpoint '{}'.",
        customer.name, path
    );
    enterprise_catalog_courses(
        &state,
        &user,
        course_context(&state, &customer, catalog_id),
        &params,
        &url,
        log_message,
        None,
    )
    .await
}

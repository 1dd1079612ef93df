//! # Catalog Proxy Handlers
//!
//! Listing and detail of catalogs come straight from the catalog service.
//! Catalog courses are reshaped for the caller's enterprise customer. Any
//! upstream failure surfaces as a 404 after being logged with the path.

use axum::{
    extract::{Path, State},
    response::Json,
};

use super::QueryParams;
use crate::auth::CurrentUser;
use crate::catalog::{Catalog, EnterpriseCourse, EnterpriseCourseContext};
use crate::error::{ApiError, forbidden, not_found};
use crate::models::enterprise_customer;
use crate::pagination::{Page, RequestUrl};
use crate::repositories::EnterpriseCustomerRepository;
use crate::server::AppState;

pub const RESOURCE_NOT_FOUND: &str = "The resource you are looking for does not exist.";

pub(crate) fn course_context<'a>(
    state: &'a AppState,
    customer: &'a enterprise_customer::Model,
    catalog_id: i32,
) -> EnterpriseCourseContext<'a> {
    EnterpriseCourseContext {
        customer,
        catalog_id,
        lms_root_url: &state.config.lms_root_url,
    }
}

/// Fetch and reshape one page of courses for `context`.
///
/// On an empty upstream answer, `log_message` is logged and the caller gets
/// a 404 carrying `response_message`.
pub(crate) async fn enterprise_catalog_courses(
    state: &AppState,
    user: &CurrentUser,
    context: EnterpriseCourseContext<'_>,
    params: &QueryParams,
    url: &RequestUrl,
    log_message: String,
    response_message: Option<&str>,
) -> Result<Json<Page<EnterpriseCourse>>, ApiError> {
    match context
        .fetch(state.catalog_api.as_ref(), user, &params.0, url)
        .await
    {
        Some(page) => Ok(Json(page)),
        None => {
            tracing::error!(
                enterprise_customer = %context.customer.uuid,
                catalog_id = context.catalog_id,
                "{log_message}"
            );
            Err(not_found(response_message.map_or(log_message, str::to_string)))
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-catalogs/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("page" = Option<u64>, Query, description = "Forwarded to the catalog service")),
    responses(
        (status = 200, description = "Page of catalogs", body = Page<Catalog>),
        (status = 401, description = "Missing or invalid credentials", body = ApiError),
        (status = 404, description = "Catalog service returned nothing", body = ApiError)
    ),
    tag = "catalogs"
)]
pub async fn list_catalogs(
    State(state): State<AppState>,
    user: CurrentUser,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<Catalog>>, ApiError> {
    let Some(page) = state
        .catalog_api
        .get_paginated_catalogs(&user, &params.0)
        .await
    else {
        tracing::error!("Unable to fetch API response from endpoint \"/catalogs/\".");
        return Err(not_found(RESOURCE_NOT_FOUND));
    };

    Ok(Json(page.relink(&url)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-catalogs/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Catalog id")),
    responses(
        (status = 200, description = "Catalog", body = Catalog),
        (status = 404, description = "Catalog service returned nothing", body = ApiError)
    ),
    tag = "catalogs"
)]
pub async fn get_catalog(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<Catalog>, ApiError> {
    let Some(catalog) = state.catalog_api.get_catalog(&user, id).await else {
        tracing::error!(
            "Unable to fetch API response for given catalog from endpoint '/catalog/{id}/'."
        );
        return Err(not_found(RESOURCE_NOT_FOUND));
    };

    Ok(Json(catalog))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-catalogs/{id}/courses/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("id" = i32, Path, description = "Catalog id"),
        ("page" = Option<u64>, Query, description = "Forwarded to the catalog service")
    ),
    responses(
        (status = 200, description = "Page of courses with enterprise context"),
        (status = 403, description = "Caller has no enterprise customer", body = ApiError),
        (status = 404, description = "Catalog service returned nothing", body = ApiError)
    ),
    tag = "catalogs"
)]
pub async fn list_catalog_courses(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i32>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<EnterpriseCourse>>, ApiError> {
    let Some(customer) = EnterpriseCustomerRepository::new(&state.db)
        .find_for_user(user.id)
        .await?
    else {
        let message = format!(
            "User {} is not associated with an EnterpriseCustomer.",
            user.username
        );
        tracing::info!(username = %user.username, "catalog courses requested without enterprise");
        return Err(forbidden(Some(&message)));
    };

    enterprise_catalog_courses(
        &state,
        &user,
        course_context(&state, &customer, id),
        &params,
        &url,
        format!(
            "Unable to fetch API response for catalog courses from endpoint '{}'.",
            url.full_path()
        ),
        Some(RESOURCE_NOT_FOUND),
    )
    .await
}

//! # API Handlers
//!
//! One module per resource under `/enterprise/api/v1/`, plus the service
//! root and health check.

use axum::{
    extract::{FromRequestParts, State},
    http::{Method, StatusCode, request::Parts},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::pagination::{PageRequest, RequestUrl};
use crate::repositories::ListQuery;
use crate::server::AppState;

pub mod branding;
pub mod catalogs;
pub mod consent_audits;
pub mod enterprise_course_enrollments;
pub mod enterprise_customer_users;
pub mod enterprise_customers;
pub mod entitlements;
pub mod sites;
pub mod users;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
}

/// Database connectivity check
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Database reachable", body = HealthStatus),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "root"
)]
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    crate::db::health_check(&state.db).await.map_err(|error| {
        tracing::error!(?error, "health check failed");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database service unavailable",
        )
    })?;

    Ok(Json(HealthStatus {
        status: "ok".to_string(),
    }))
}

/// Which representation of a read-write resource a request works with.
///
/// Reads get the denormalized shape; every other method reads and writes
/// the normalized one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerKind {
    Read,
    Write,
}

impl SerializerKind {
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::GET {
            SerializerKind::Read
        } else {
            SerializerKind::Write
        }
    }
}

/// Raw query-string pairs in request order.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(pub Vec<(String, String)>);

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pairs = parts
            .uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self(pairs))
    }
}

pub(crate) fn list_query<'q>(
    state: &AppState,
    params: &'q QueryParams,
    url: &'q RequestUrl,
) -> Result<ListQuery<'q>, ApiError> {
    Ok(ListQuery {
        params: &params.0,
        page: PageRequest::from_params(&params.0, &state.config.pagination)?,
        url,
    })
}

/// Timestamps are rendered as RFC 3339 strings.
pub(crate) fn timestamp(value: &sea_orm::prelude::DateTimeWithTimeZone) -> String {
    value.to_rfc3339()
}

//! # Enterprise Course Enrollment Handlers
//!
//! Reads return the stored row. Writes take a username, which is resolved
//! to the user's enterprise customer user link before anything is stored.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::{Method, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::{QueryParams, SerializerKind, list_query};
use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found, validation_error};
use crate::filters::{FieldKind, QueryField};
use crate::models::enterprise_course_enrollment;
use crate::pagination::{Page, RequestUrl};
use crate::permissions::{ObjectRef, READ_WRITE};
use crate::repositories::enrollment::EnrollmentWrite;
use crate::repositories::{EnrollmentRepository, EnterpriseCustomerUserRepository, UserRepository};
use crate::server::AppState;

pub const ENROLLMENT_FIELDS: &[QueryField<enterprise_course_enrollment::Column>] = &[
    QueryField::new(
        "enterprise_customer_user",
        enterprise_course_enrollment::Column::EnterpriseCustomerUserId,
        FieldKind::Integer,
    ),
    QueryField::new(
        "consent_granted",
        enterprise_course_enrollment::Column::ConsentGranted,
        FieldKind::Boolean,
    ),
    QueryField::new(
        "course_id",
        enterprise_course_enrollment::Column::CourseId,
        FieldKind::Text,
    ),
];

/// Read shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    pub id: i32,
    pub enterprise_customer_user: i32,
    pub consent_granted: Option<bool>,
    pub course_id: String,
}

impl From<enterprise_course_enrollment::Model> for EnrollmentResponse {
    fn from(model: enterprise_course_enrollment::Model) -> Self {
        Self {
            id: model.id,
            enterprise_customer_user: model.enterprise_customer_user_id,
            consent_granted: model.consent_granted,
            course_id: model.course_id,
        }
    }
}

/// Write shape, accepted on create and full update and returned by every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentWriteRequest {
    pub username: String,
    pub course_id: String,
    #[serde(default)]
    pub consent_granted: Option<bool>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EnrollmentPatchRequest {
    pub username: Option<String>,
    pub course_id: Option<String>,
    pub consent_granted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnrollmentBody {
    Read(EnrollmentResponse),
    Write(EnrollmentWriteRequest),
}

/// A validated write and the platform user that will own the enrollment.
struct ResolvedWrite {
    write: EnrollmentWrite,
    owner: i32,
}

async fn resolve(state: &AppState, request: &EnrollmentWriteRequest) -> Result<ResolvedWrite, ApiError> {
    let mut errors = serde_json::Map::new();
    if request.username.trim().is_empty() {
        errors.insert("username".into(), json!(["This field may not be blank."]));
    }
    if request.course_id.trim().is_empty() {
        errors.insert("course_id".into(), json!(["This field may not be blank."]));
    }
    if !errors.is_empty() {
        return Err(validation_error("Invalid enrollment", errors.into()));
    }

    let user = UserRepository::new(&state.db)
        .find_by_username(&request.username)
        .await?
        .ok_or_else(|| {
            validation_error(
                "Invalid enrollment",
                json!({ "username": ["User does not exist"] }),
            )
        })?;

    let link = EnterpriseCustomerUserRepository::new(&state.db)
        .find_first_for_user(user.id)
        .await?
        .ok_or_else(|| {
            validation_error(
                "Invalid enrollment",
                json!({ "username": ["User has no EnterpriseCustomerUser"] }),
            )
        })?;

    Ok(ResolvedWrite {
        write: EnrollmentWrite {
            enterprise_customer_user_id: link.id,
            course_id: request.course_id.clone(),
            consent_granted: request.consent_granted,
        },
        owner: user.id,
    })
}

/// Platform user behind an enrollment, and their username.
async fn owner_of(
    state: &AppState,
    enrollment: &enterprise_course_enrollment::Model,
) -> Result<(i32, String), ApiError> {
    let link = EnterpriseCustomerUserRepository::new(&state.db)
        .find_visible(enrollment.enterprise_customer_user_id, None)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    let username = UserRepository::new(&state.db)
        .find_by_id(link.user_id)
        .await?
        .map(|user| user.username)
        .unwrap_or_default();
    Ok((link.user_id, username))
}

async fn represent(
    state: &AppState,
    method: &Method,
    enrollment: enterprise_course_enrollment::Model,
) -> Result<EnrollmentBody, ApiError> {
    match SerializerKind::for_method(method) {
        SerializerKind::Read => Ok(EnrollmentBody::Read(enrollment.into())),
        SerializerKind::Write => {
            let (_, username) = owner_of(state, &enrollment).await?;
            Ok(EnrollmentBody::Write(EnrollmentWriteRequest {
                username,
                course_id: enrollment.course_id,
                consent_granted: enrollment.consent_granted,
            }))
        }
    }
}

async fn load_owned(
    state: &AppState,
    user: &CurrentUser,
    method: &Method,
    id: i32,
) -> Result<(enterprise_course_enrollment::Model, String), ApiError> {
    let enrollment = EnrollmentRepository::new(&state.db)
        .find(id)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    let (owner, username) = owner_of(state, &enrollment).await?;
    READ_WRITE
        .check_object(state, user, method, ObjectRef::OwnedBy(owner))
        .await?;
    Ok((enrollment, username))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-course-enrollment/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("enterprise_customer_user" = Option<i32>, Query, description = "Filter by learner link id"),
        ("consent_granted" = Option<bool>, Query, description = "Filter by consent"),
        ("course_id" = Option<String>, Query, description = "Filter by course id"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of enrollments", body = Page<EnrollmentResponse>),
        (status = 400, description = "Invalid filter value", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "enrollments"
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<EnrollmentResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let page = EnrollmentRepository::new(&state.db)
        .list(ENROLLMENT_FIELDS, query)
        .await?;
    Ok(Json(page.map(EnrollmentResponse::from)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-course-enrollment/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Enrollment", body = EnrollmentResponse),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "enrollments"
)]
pub async fn get_enrollment(
    State(state): State<AppState>,
    method: Method,
    Path(id): Path<i32>,
) -> Result<Json<EnrollmentBody>, ApiError> {
    let enrollment = EnrollmentRepository::new(&state.db)
        .find(id)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(represent(&state, &method, enrollment).await?))
}

#[utoipa::path(
    post,
    path = "/enterprise/api/v1/enterprise-course-enrollment/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    request_body = EnrollmentWriteRequest,
    responses(
        (status = 201, description = "Enrollment recorded", body = EnrollmentWriteRequest),
        (status = 400, description = "Unknown user or user without enterprise link", body = ApiError),
        (status = 403, description = "Caller may not write this enrollment", body = ApiError)
    ),
    tag = "enrollments"
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    payload: Result<Json<EnrollmentWriteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EnrollmentBody>), ApiError> {
    let Json(request) = payload?;
    let resolved = resolve(&state, &request).await?;
    READ_WRITE
        .check_object(&state, &user, &method, ObjectRef::OwnedBy(resolved.owner))
        .await?;

    let (enrollment, created) = EnrollmentRepository::new(&state.db)
        .upsert(resolved.write)
        .await?;
    tracing::info!(
        enrollment_id = enrollment.id,
        course_id = %enrollment.course_id,
        created,
        "enterprise course enrollment recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(represent(&state, &method, enrollment).await?),
    ))
}

#[utoipa::path(
    put,
    path = "/enterprise/api/v1/enterprise-course-enrollment/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enrollment id")),
    request_body = EnrollmentWriteRequest,
    responses(
        (status = 200, description = "Enrollment updated", body = EnrollmentWriteRequest),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 403, description = "Caller may not write this enrollment", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "enrollments"
)]
pub async fn update_enrollment(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
    payload: Result<Json<EnrollmentWriteRequest>, JsonRejection>,
) -> Result<Json<EnrollmentBody>, ApiError> {
    let (enrollment, _) = load_owned(&state, &user, &method, id).await?;
    let Json(request) = payload?;
    apply_update(&state, &user, &method, enrollment, request).await
}

#[utoipa::path(
    patch,
    path = "/enterprise/api/v1/enterprise-course-enrollment/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enrollment id")),
    request_body = EnrollmentPatchRequest,
    responses(
        (status = 200, description = "Enrollment updated", body = EnrollmentWriteRequest),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 403, description = "Caller may not write this enrollment", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "enrollments"
)]
pub async fn partial_update_enrollment(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
    payload: Result<Json<EnrollmentPatchRequest>, JsonRejection>,
) -> Result<Json<EnrollmentBody>, ApiError> {
    let (enrollment, username) = load_owned(&state, &user, &method, id).await?;
    let Json(patch) = payload?;
    let request = EnrollmentWriteRequest {
        username: patch.username.unwrap_or(username),
        course_id: patch
            .course_id
            .unwrap_or_else(|| enrollment.course_id.clone()),
        consent_granted: patch.consent_granted.or(enrollment.consent_granted),
    };
    apply_update(&state, &user, &method, enrollment, request).await
}

async fn apply_update(
    state: &AppState,
    user: &CurrentUser,
    method: &Method,
    enrollment: enterprise_course_enrollment::Model,
    request: EnrollmentWriteRequest,
) -> Result<Json<EnrollmentBody>, ApiError> {
    let resolved = resolve(state, &request).await?;
    // Moving an enrollment to another learner needs that learner's ownership too.
    READ_WRITE
        .check_object(state, user, method, ObjectRef::OwnedBy(resolved.owner))
        .await?;

    let updated = EnrollmentRepository::new(&state.db)
        .update(enrollment, resolved.write)
        .await?;
    Ok(Json(represent(state, method, updated).await?))
}

#[utoipa::path(
    delete,
    path = "/enterprise/api/v1/enterprise-course-enrollment/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enrollment id")),
    responses(
        (status = 204, description = "Enrollment deleted"),
        (status = 403, description = "Caller may not delete this enrollment", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "enrollments"
)]
pub async fn delete_enrollment(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let (enrollment, _) = load_owned(&state, &user, &method, id).await?;
    EnrollmentRepository::new(&state.db).delete(enrollment).await?;
    Ok(StatusCode::NO_CONTENT)
}

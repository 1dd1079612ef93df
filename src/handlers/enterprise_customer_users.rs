//! # Enterprise Customer User Handlers
//!
//! Learner links between platform users and enterprise customers. Staff
//! see every link; other callers see only their own.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::{Method, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::consent_audits::ConsentAuditResponse;
use super::enterprise_customers::EnterpriseCustomerResponse;
use super::users::UserResponse;
use super::{QueryParams, SerializerKind, list_query};
use crate::auth::CurrentUser;
use crate::error::{ApiError, not_found, validation_error};
use crate::filters::{FieldKind, QueryField};
use crate::models::enterprise_customer_user;
use crate::pagination::{Page, RequestUrl};
use crate::permissions::{ObjectRef, READ_WRITE};
use crate::repositories::enterprise_customer_user::{LearnerDetails, LearnerEntitlement};
use crate::repositories::{
    EnterpriseCustomerRepository, EnterpriseCustomerUserRepository, UserRepository,
};
use crate::server::AppState;

pub const LEARNER_FIELDS: &[QueryField<enterprise_customer_user::Column>] = &[
    QueryField::new(
        "enterprise_customer",
        enterprise_customer_user::Column::EnterpriseCustomerId,
        FieldKind::Uuid,
    ),
    QueryField::new(
        "user_id",
        enterprise_customer_user::Column::UserId,
        FieldKind::Integer,
    ),
];

/// Read shape, with the customer, user and consent history embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LearnerResponse {
    pub id: i32,
    pub enterprise_customer: EnterpriseCustomerResponse,
    pub user: Option<UserResponse>,
    pub data_sharing_consent: Vec<ConsentAuditResponse>,
}

impl From<LearnerDetails> for LearnerResponse {
    fn from(details: LearnerDetails) -> Self {
        Self {
            id: details.link.id,
            enterprise_customer: details.customer.into(),
            user: details.user.map(UserResponse::from),
            data_sharing_consent: details
                .consent_audits
                .into_iter()
                .map(ConsentAuditResponse::from)
                .collect(),
        }
    }
}

/// Write shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LearnerWriteRequest {
    #[schema(value_type = String)]
    pub enterprise_customer: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LearnerPatchRequest {
    #[schema(value_type = Option<String>)]
    pub enterprise_customer: Option<Uuid>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LearnerBody {
    Read(Box<LearnerResponse>),
    Write(LearnerWriteRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntitlementEntry {
    pub entitlement_id: i32,
    pub requires_consent: bool,
}

impl From<LearnerEntitlement> for EntitlementEntry {
    fn from(entitlement: LearnerEntitlement) -> Self {
        Self {
            entitlement_id: entitlement.entitlement_id,
            requires_consent: entitlement.requires_consent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LearnerEntitlementsResponse {
    pub entitlements: Vec<EntitlementEntry>,
}

/// `None` for staff, who see every link.
fn visibility(user: &CurrentUser) -> Option<i32> {
    (!user.is_staff).then_some(user.id)
}

/// Validate a write and return the platform user it names.
async fn resolve(state: &AppState, request: &LearnerWriteRequest) -> Result<i32, ApiError> {
    let customer = EnterpriseCustomerRepository::new(&state.db)
        .find(request.enterprise_customer)
        .await?;
    let user = UserRepository::new(&state.db)
        .find_by_username(&request.username)
        .await?;

    let mut errors = serde_json::Map::new();
    if customer.is_none() {
        errors.insert(
            "enterprise_customer".into(),
            json!([format!(
                "Invalid pk \"{}\" - object does not exist.",
                request.enterprise_customer
            )]),
        );
    }
    match &user {
        None if request.username.trim().is_empty() => {
            errors.insert("username".into(), json!(["This field may not be blank."]));
        }
        None => {
            errors.insert("username".into(), json!(["User does not exist"]));
        }
        Some(_) => {}
    }

    match user {
        Some(user) if errors.is_empty() => Ok(user.id),
        _ => Err(validation_error("Invalid enterprise customer user", errors.into())),
    }
}

async fn represent(
    state: &AppState,
    method: &Method,
    link: enterprise_customer_user::Model,
) -> Result<LearnerBody, ApiError> {
    match SerializerKind::for_method(method) {
        SerializerKind::Read => {
            let details = EnterpriseCustomerUserRepository::new(&state.db)
                .load_details(vec![link])
                .await?
                .pop()
                .ok_or_else(|| not_found("Not found."))?;
            Ok(LearnerBody::Read(Box::new(details.into())))
        }
        SerializerKind::Write => {
            let username = UserRepository::new(&state.db)
                .find_by_id(link.user_id)
                .await?
                .map(|user| user.username)
                .unwrap_or_default();
            Ok(LearnerBody::Write(LearnerWriteRequest {
                enterprise_customer: link.enterprise_customer_id,
                username,
            }))
        }
    }
}

async fn load_visible(
    state: &AppState,
    user: &CurrentUser,
    id: i32,
) -> Result<enterprise_customer_user::Model, ApiError> {
    EnterpriseCustomerUserRepository::new(&state.db)
        .find_visible(id, visibility(user))
        .await?
        .ok_or_else(|| not_found("Not found."))
}

async fn load_owned(
    state: &AppState,
    user: &CurrentUser,
    method: &Method,
    id: i32,
) -> Result<enterprise_customer_user::Model, ApiError> {
    let link = load_visible(state, user, id).await?;
    READ_WRITE
        .check_object(state, user, method, ObjectRef::OwnedBy(link.user_id))
        .await?;
    Ok(link)
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-learner/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("enterprise_customer" = Option<String>, Query, description = "Filter by customer UUID"),
        ("user_id" = Option<i32>, Query, description = "Filter by platform user id"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of learner links visible to the caller", body = Page<LearnerResponse>),
        (status = 400, description = "Invalid filter value", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn list_learners(
    State(state): State<AppState>,
    user: CurrentUser,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<LearnerResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let repo = EnterpriseCustomerUserRepository::new(&state.db);

    let Page {
        count,
        next,
        previous,
        results,
    } = repo.list(LEARNER_FIELDS, query, visibility(&user)).await?;
    let results = repo
        .load_details(results)
        .await?
        .into_iter()
        .map(LearnerResponse::from)
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
    path = "/enterprise/api/v1/enterprise-learner/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enterprise customer user id")),
    responses(
        (status = 200, description = "Learner link", body = LearnerResponse),
        (status = 404, description = "Not found or not visible to the caller", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn get_learner(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<LearnerBody>, ApiError> {
    let link = load_visible(&state, &user, id).await?;
    Ok(Json(represent(&state, &method, link).await?))
}

#[utoipa::path(
    post,
    path = "/enterprise/api/v1/enterprise-learner/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    request_body = LearnerWriteRequest,
    responses(
        (status = 201, description = "Learner linked", body = LearnerWriteRequest),
        (status = 400, description = "Unknown customer or user", body = ApiError),
        (status = 403, description = "Caller may not link this user", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn create_learner(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    payload: Result<Json<LearnerWriteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LearnerBody>), ApiError> {
    let Json(request) = payload?;
    let owner = resolve(&state, &request).await?;
    READ_WRITE
        .check_object(&state, &user, &method, ObjectRef::OwnedBy(owner))
        .await?;

    let (link, _) = EnterpriseCustomerUserRepository::new(&state.db)
        .get_or_create(request.enterprise_customer, owner)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(represent(&state, &method, link).await?),
    ))
}

#[utoipa::path(
    put,
    path = "/enterprise/api/v1/enterprise-learner/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enterprise customer user id")),
    request_body = LearnerWriteRequest,
    responses(
        (status = 200, description = "Learner link updated", body = LearnerWriteRequest),
        (status = 400, description = "Unknown customer or user", body = ApiError),
        (status = 403, description = "Caller may not write this link", body = ApiError),
        (status = 404, description = "Not found", body = ApiError),
        (status = 409, description = "User already linked to that customer", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn update_learner(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
    payload: Result<Json<LearnerWriteRequest>, JsonRejection>,
) -> Result<Json<LearnerBody>, ApiError> {
    let link = load_owned(&state, &user, &method, id).await?;
    let Json(request) = payload?;
    apply_update(&state, &user, &method, link, request).await
}

#[utoipa::path(
    patch,
    path = "/enterprise/api/v1/enterprise-learner/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enterprise customer user id")),
    request_body = LearnerPatchRequest,
    responses(
        (status = 200, description = "Learner link updated", body = LearnerWriteRequest),
        (status = 400, description = "Unknown customer or user", body = ApiError),
        (status = 403, description = "Caller may not write this link", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn partial_update_learner(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
    payload: Result<Json<LearnerPatchRequest>, JsonRejection>,
) -> Result<Json<LearnerBody>, ApiError> {
    let link = load_owned(&state, &user, &method, id).await?;
    let Json(patch) = payload?;

    let username = match patch.username {
        Some(username) => username,
        None => UserRepository::new(&state.db)
            .find_by_id(link.user_id)
            .await?
            .map(|user| user.username)
            .unwrap_or_default(),
    };
    let request = LearnerWriteRequest {
        enterprise_customer: patch
            .enterprise_customer
            .unwrap_or(link.enterprise_customer_id),
        username,
    };
    apply_update(&state, &user, &method, link, request).await
}

async fn apply_update(
    state: &AppState,
    user: &CurrentUser,
    method: &Method,
    link: enterprise_customer_user::Model,
    request: LearnerWriteRequest,
) -> Result<Json<LearnerBody>, ApiError> {
    let owner = resolve(state, &request).await?;
    READ_WRITE
        .check_object(state, user, method, ObjectRef::OwnedBy(owner))
        .await?;

    let updated = EnterpriseCustomerUserRepository::new(&state.db)
        .update(link, request.enterprise_customer, owner)
        .await?;
    Ok(Json(represent(state, method, updated).await?))
}

#[utoipa::path(
    delete,
    path = "/enterprise/api/v1/enterprise-learner/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enterprise customer user id")),
    responses(
        (status = 204, description = "Learner link removed"),
        (status = 403, description = "Caller may not delete this link", body = ApiError),
        (status = 404, description = "Not found", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn delete_learner(
    State(state): State<AppState>,
    method: Method,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let link = load_owned(&state, &user, &method, id).await?;
    EnterpriseCustomerUserRepository::new(&state.db)
        .delete(link)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Entitlements the learner can use, given the customer's consent policy.
#[utoipa::path(
    get,
    path = "/enterprise/api/v1/enterprise-learner/{id}/entitlements/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "Enterprise customer user id")),
    responses(
        (status = 200, description = "Entitlements of the learner", body = LearnerEntitlementsResponse),
        (status = 404, description = "Not found or not visible to the caller", body = ApiError)
    ),
    tag = "enterprise-learners"
)]
pub async fn get_learner_entitlements(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<LearnerEntitlementsResponse>, ApiError> {
    let link = load_visible(&state, &user, id).await?;
    let entitlements = EnterpriseCustomerUserRepository::new(&state.db)
        .entitlements(&link)
        .await?;

    Ok(Json(LearnerEntitlementsResponse {
        entitlements: entitlements.into_iter().map(EntitlementEntry::from).collect(),
    }))
}

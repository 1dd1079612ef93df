//! # Platform User Handlers
//!
//! Read-only access to platform user accounts.

use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{QueryParams, list_query, timestamp};
use crate::error::{ApiError, not_found};
use crate::filters::{FieldKind, QueryField};
use crate::models::user::{self, Entity as User};
use crate::pagination::{Page, RequestUrl};
use crate::repositories::list_page;
use crate::server::AppState;

pub const USER_FIELDS: &[QueryField<user::Column>] = &[
    QueryField::new("username", user::Column::Username, FieldKind::Text),
    QueryField::new("first_name", user::Column::FirstName, FieldKind::Text),
    QueryField::new("last_name", user::Column::LastName, FieldKind::Text),
    QueryField::new("email", user::Column::Email, FieldKind::Text),
    QueryField::new("is_staff", user::Column::IsStaff, FieldKind::Boolean),
    QueryField::new("is_active", user::Column::IsActive, FieldKind::Boolean),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    /// RFC 3339 timestamp
    pub date_joined: String,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            date_joined: timestamp(&model.date_joined),
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            is_staff: model.is_staff,
            is_active: model.is_active,
        }
    }
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/auth-user/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(
        ("username" = Option<String>, Query, description = "Filter by username"),
        ("email" = Option<String>, Query, description = "Filter by email"),
        ("is_staff" = Option<bool>, Query, description = "Filter by staff flag"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("ordering" = Option<String>, Query, description = "Comma-separated fields, `-` for descending"),
        ("page" = Option<u64>, Query, description = "Page number")
    ),
    responses(
        (status = 200, description = "Page of users", body = Page<UserResponse>),
        (status = 400, description = "Invalid filter value", body = ApiError),
        (status = 401, description = "Missing or invalid credentials", body = ApiError)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    params: QueryParams,
    url: RequestUrl,
) -> Result<Json<Page<UserResponse>>, ApiError> {
    let query = list_query(&state, &params, &url)?;
    let page = list_page(&state.db, User::find(), USER_FIELDS, query).await?;
    Ok(Json(page.map(UserResponse::from)))
}

#[utoipa::path(
    get,
    path = "/enterprise/api/v1/auth-user/{id}/",
    security(("jwt_auth" = []), ("bearer_auth" = []), ("session_auth" = [])),
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "No such user", body = ApiError)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = User::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| not_found("Not found."))?;
    Ok(Json(user.into()))
}

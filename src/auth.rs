//! # Authentication
//!
//! Resolves the caller from one of three credentials, tried in the order a
//! route's [`AccessPolicy`](crate::permissions::AccessPolicy) lists them:
//!
//! - `Authorization: JWT <token>`, an HS256 token from the identity provider
//! - `Authorization: Bearer <token>`, an opaque access token
//! - the `sessionid` cookie of a browser session
//!
//! A scheme whose credential is absent is skipped. A credential that is
//! present but invalid fails the request immediately. Session-authenticated
//! requests with an unsafe method must also pass the CSRF check.

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap, Method,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::config::AppConfig;
use crate::error::{ApiError, forbidden, unauthorized};
use crate::models::user;
use crate::repositories::{CredentialRepository, UserRepository, user::JwtIdentity};
use crate::permissions::is_safe;
use crate::server::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Credential kinds accepted by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Jwt,
    Bearer,
    Session,
}

/// The authenticated caller, stored in request extensions by the policy middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
}

impl From<user::Model> for CurrentUser {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            is_active: user.is_active,
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| unauthorized(None))
    }
}

/// Claims carried by JWTs in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtClaims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    /// Older tokens carry `username` instead of `preferred_username`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub administrator: bool,
}

impl JwtClaims {
    /// Short-lived claims identifying `user`, for calls to internal services.
    pub fn for_user(config: &AppConfig, user: &CurrentUser) -> Self {
        let now = Utc::now().timestamp();
        Self {
            iss: config.jwt.issuer.clone(),
            aud: config.jwt.audience.clone(),
            exp: now.saturating_add(
                i64::try_from(config.jwt.expiration_seconds).unwrap_or(i64::MAX),
            ),
            iat: now,
            preferred_username: Some(user.username.clone()),
            username: None,
            email: Some(user.email.clone()),
            administrator: user.is_staff,
        }
    }

    fn identity(&self) -> Option<JwtIdentity> {
        let username = self
            .preferred_username
            .as_deref()
            .or(self.username.as_deref())
            .filter(|name| !name.is_empty())?;
        Some(JwtIdentity {
            username: username.to_string(),
            email: self.email.clone(),
            administrator: self.administrator,
        })
    }
}

pub fn encode_jwt(config: &AppConfig, claims: &JwtClaims) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.jwt_secret().as_bytes()),
    )
}

pub fn decode_jwt(config: &AppConfig, token: &str) -> Result<JwtClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[config.jwt.issuer.as_str()]);
    match &config.jwt.audience {
        Some(audience) => validation.set_audience(&[audience.as_str()]),
        None => validation.validate_aud = false,
    }

    decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// Outcome of trying a single scheme.
enum SchemeResult {
    Absent,
    Authenticated(user::Model),
}

/// `Authorization` value after `prefix `, matched case-insensitively.
fn authorization_credential<'h>(headers: &'h HeaderMap, prefix: &str) -> Result<Option<&'h str>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case(prefix) {
        return Ok(None);
    }

    match parts.next().map(str::trim) {
        Some(credential) if !credential.is_empty() && !credential.contains(' ') => Ok(Some(credential)),
        _ => Err(unauthorized(Some("Invalid Authorization header. Credentials string should not contain spaces."))),
    }
}

fn cookie<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    cookie(headers, SESSION_COOKIE)
}

/// Double-submit check for cookie-authenticated writes: the `X-CSRFToken`
/// header must repeat the `csrftoken` cookie.
pub fn verify_csrf(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = cookie(headers, CSRF_COOKIE) else {
        return Err(forbidden(Some("CSRF Failed: CSRF cookie not set.")));
    };
    let provided = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(forbidden(Some("CSRF Failed: CSRF token missing or incorrect.")))
    }
}

async fn try_scheme(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    scheme: AuthScheme,
) -> Result<SchemeResult, ApiError> {
    match scheme {
        AuthScheme::Jwt => {
            let Some(token) = authorization_credential(headers, "JWT")? else {
                return Ok(SchemeResult::Absent);
            };
            let claims = decode_jwt(&state.config, token).map_err(|err| {
                tracing::debug!(error = %err, "JWT rejected");
                unauthorized(Some("Invalid JWT token."))
            })?;
            let identity = claims
                .identity()
                .ok_or_else(|| unauthorized(Some("JWT token does not identify a user.")))?;
            let user = UserRepository::new(&state.db)
                .get_or_create_from_jwt(&identity)
                .await?;
            Ok(SchemeResult::Authenticated(user))
        }
        AuthScheme::Bearer => {
            let Some(token) = authorization_credential(headers, "Bearer")? else {
                return Ok(SchemeResult::Absent);
            };
            CredentialRepository::new(&state.db)
                .find_user_by_access_token(token)
                .await?
                .map(SchemeResult::Authenticated)
                .ok_or_else(|| unauthorized(Some("Invalid token.")))
        }
        AuthScheme::Session => {
            let Some(session_key) = session_cookie(headers) else {
                return Ok(SchemeResult::Absent);
            };
            let user = CredentialRepository::new(&state.db)
                .find_user_by_session(session_key)
                .await?
                .ok_or_else(|| unauthorized(Some("Session expired or invalid.")))?;
            if !is_safe(method) {
                verify_csrf(headers).inspect_err(|_| {
                    tracing::info!(username = %user.username, %method, "CSRF check failed");
                })?;
            }
            Ok(SchemeResult::Authenticated(user))
        }
    }
}

/// Authenticate with the first scheme whose credential is present.
pub async fn authenticate(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    schemes: &[AuthScheme],
) -> Result<CurrentUser, ApiError> {
    for scheme in schemes {
        if let SchemeResult::Authenticated(user) = try_scheme(state, method, headers, *scheme).await? {
            if !user.is_active {
                tracing::info!(username = %user.username, ?scheme, "inactive user rejected");
                return Err(unauthorized(Some("User inactive or deleted.")));
            }
            tracing::debug!(username = %user.username, ?scheme, "request authenticated");
            return Ok(user.into());
        }
    }

    Err(unauthorized(None))
}

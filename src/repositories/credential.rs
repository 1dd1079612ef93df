//! # Credential Repository
//!
//! Resolves opaque bearer tokens and browser sessions to users, and issues
//! new bearer tokens for the command line tool.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use sha2::{Digest, Sha256};

use crate::models::{
    access_token::{self, Entity as AccessToken},
    session::{self, Entity as Session},
    user::{self, Entity as User},
};

/// Lowercase hex SHA-256 of an opaque token.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A freshly issued bearer token. `token` is only ever available here.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub record: access_token::Model,
}

pub struct CredentialRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> CredentialRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// User owning an unexpired access token.
    pub async fn find_user_by_access_token(&self, token: &str) -> Result<Option<user::Model>, DbErr> {
        let now = Utc::now();
        let Some(record) = AccessToken::find()
            .filter(access_token::Column::TokenDigest.eq(token_digest(token)))
            .one(self.db)
            .await?
        else {
            return Ok(None);
        };

        if record.expires_at <= now {
            tracing::debug!(token_id = record.id, "access token expired");
            return Ok(None);
        }

        User::find_by_id(record.user_id).one(self.db).await
    }

    /// User owning an unexpired session.
    pub async fn find_user_by_session(&self, session_key: &str) -> Result<Option<user::Model>, DbErr> {
        let Some(record) = Session::find_by_id(session_key.to_string()).one(self.db).await? else {
            return Ok(None);
        };

        if record.expires_at <= Utc::now() {
            return Ok(None);
        }

        User::find_by_id(record.user_id).one(self.db).await
    }

    /// Mint a random 256-bit token for `user_id`, storing only its digest.
    pub async fn issue_access_token(
        &self,
        user_id: i32,
        ttl: Duration,
    ) -> Result<IssuedToken, DbErr> {
        let token = hex::encode(rand::random::<[u8; 32]>());
        let now = Utc::now();

        let record = access_token::ActiveModel {
            token_digest: Set(token_digest(&token)),
            user_id: Set(user_id),
            expires_at: Set((now + ttl).into()),
            created_at: Set(now.into()),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        Ok(IssuedToken { token, record })
    }

    /// Store a browser session. Sessions are normally written by the LMS;
    /// this exists for tooling and tests.
    pub async fn create_session(
        &self,
        session_key: &str,
        user_id: i32,
        ttl: Duration,
    ) -> Result<session::Model, DbErr> {
        session::ActiveModel {
            session_key: Set(session_key.to_string()),
            user_id: Set(user_id),
            expires_at: Set((Utc::now() + ttl).into()),
        }
        .insert(self.db)
        .await
    }
}

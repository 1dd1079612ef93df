//! # User Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set,
};

use crate::models::user::{self, Entity as User};

/// Identity asserted by a verified JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtIdentity {
    pub username: String,
    pub email: Option<String>,
    pub administrator: bool,
}

pub struct UserRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, DbErr> {
        User::find_by_id(id).one(self.db).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, DbErr> {
        User::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db)
            .await
    }

    /// Fetch the user named by a JWT, creating it on first sight. The staff
    /// flag and email follow the token on every login.
    pub async fn get_or_create_from_jwt(&self, identity: &JwtIdentity) -> Result<user::Model, DbErr> {
        if let Some(existing) = self.find_by_username(&identity.username).await? {
            let email_changed = identity
                .email
                .as_ref()
                .is_some_and(|email| *email != existing.email);
            if !email_changed && existing.is_staff == identity.administrator {
                return Ok(existing);
            }

            let mut active = existing.into_active_model();
            if let Some(email) = &identity.email {
                active.email = Set(email.clone());
            }
            active.is_staff = Set(identity.administrator);
            return active.update(self.db).await;
        }

        tracing::info!(username = %identity.username, "creating user from JWT");
        user::ActiveModel {
            username: Set(identity.username.clone()),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            email: Set(identity.email.clone().unwrap_or_default()),
            is_staff: Set(identity.administrator),
            is_active: Set(true),
            date_joined: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.db)
        .await
    }
}

//! User entity model
//!
//! Platform user accounts. Exposed read-only and used to resolve the
//! authenticated caller.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique login name
    #[sea_orm(unique)]
    pub username: String,

    pub first_name: String,

    pub last_name: String,

    pub email: String,

    /// Staff users bypass per-enterprise visibility restrictions
    pub is_staff: bool,

    /// Inactive users cannot authenticate
    pub is_active: bool,

    pub date_joined: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

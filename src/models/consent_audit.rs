//! User data sharing consent audit entity model

use std::fmt;
use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_data_sharing_consent_audits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Enterprise customer user this audit record belongs to
    pub user_id: i32,

    /// One of `not_set`, `enabled`, `disabled`
    pub state: String,

    pub created: DateTimeWithTimeZone,

    pub modified: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enterprise_customer_user::Entity",
        from = "Column::UserId",
        to = "super::enterprise_customer_user::Column::Id"
    )]
    EnterpriseCustomerUser,
}

impl Related<super::enterprise_customer_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCustomerUser.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Recorded consent decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    NotSet,
    Enabled,
    Disabled,
}

impl ConsentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentState::NotSet => "not_set",
            ConsentState::Enabled => "enabled",
            ConsentState::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "not_set" => Ok(ConsentState::NotSet),
            "enabled" => Ok(ConsentState::Enabled),
            "disabled" => Ok(ConsentState::Disabled),
            other => Err(format!("unknown consent state '{other}'")),
        }
    }
}

impl Model {
    pub fn enabled(&self) -> bool {
        self.state == ConsentState::Enabled.as_str()
    }
}

//! Site entity model
//!
//! Read-only passthrough of platform site records.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Fully qualified domain name of the site
    pub domain: String,

    /// Human readable site name
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::enterprise_customer::Entity")]
    EnterpriseCustomer,
}

impl Related<super::enterprise_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCustomer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

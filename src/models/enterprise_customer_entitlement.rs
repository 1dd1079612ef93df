//! Enterprise customer entitlement entity model
//!
//! An externally computed benefit that a customer makes available to its
//! learners.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enterprise_customer_entitlements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub enterprise_customer_id: Uuid,

    /// Identifier of the entitlement in the ecommerce system
    #[sea_orm(unique)]
    pub entitlement_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enterprise_customer::Entity",
        from = "Column::EnterpriseCustomerId",
        to = "super::enterprise_customer::Column::Uuid"
    )]
    EnterpriseCustomer,
}

impl Related<super::enterprise_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCustomer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

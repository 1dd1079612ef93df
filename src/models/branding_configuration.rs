//! Enterprise customer branding configuration entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enterprise_customer_branding_configurations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub enterprise_customer_id: Uuid,

    /// Path or URL of the customer logo
    pub logo: Option<String>,
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

//! Enterprise customer user entity model
//!
//! Links a platform user id to an enterprise customer.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enterprise_customer_users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Customer this learner belongs to
    pub enterprise_customer_id: Uuid,

    /// Platform user id (not enforced as a foreign key; users may live elsewhere)
    pub user_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enterprise_customer::Entity",
        from = "Column::EnterpriseCustomerId",
        to = "super::enterprise_customer::Column::Uuid"
    )]
    EnterpriseCustomer,
    #[sea_orm(has_many = "super::consent_audit::Entity")]
    ConsentAudit,
    #[sea_orm(has_many = "super::enterprise_course_enrollment::Entity")]
    EnterpriseCourseEnrollment,
}

impl Related<super::enterprise_customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCustomer.def()
    }
}

impl Related<super::consent_audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsentAudit.def()
    }
}

impl Related<super::enterprise_course_enrollment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCourseEnrollment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Enterprise course enrollment entity model
//!
//! Records that an enterprise learner enrolled in a course, together with
//! the consent decision captured at enrollment time.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enterprise_course_enrollments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub enterprise_customer_user_id: i32,

    /// Course key in the external catalog (e.g. `course-v1:edX+DemoX+Demo_Course`)
    pub course_id: String,

    /// `None` until the learner is asked
    pub consent_granted: Option<bool>,

    pub created: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::enterprise_customer_user::Entity",
        from = "Column::EnterpriseCustomerUserId",
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

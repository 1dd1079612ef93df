//! # Enterprise Course Enrollment Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, Set,
};

use crate::error::ApiError;
use crate::filters::QueryField;
use crate::models::enterprise_course_enrollment::{self, Entity as EnterpriseCourseEnrollment};
use crate::pagination::Page;

use super::{ListQuery, list_page};

/// Validated write payload, with the username already resolved to a learner link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentWrite {
    pub enterprise_customer_user_id: i32,
    pub course_id: String,
    pub consent_granted: Option<bool>,
}

pub struct EnrollmentRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> EnrollmentRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        fields: &[QueryField<enterprise_course_enrollment::Column>],
        query: ListQuery<'_>,
    ) -> Result<Page<enterprise_course_enrollment::Model>, ApiError> {
        list_page(self.db, EnterpriseCourseEnrollment::find(), fields, query).await
    }

    pub async fn find(&self, id: i32) -> Result<Option<enterprise_course_enrollment::Model>, DbErr> {
        EnterpriseCourseEnrollment::find_by_id(id).one(self.db).await
    }

    /// Get or create the enrollment for `(link, course)` and record the
    /// consent decision on it. Returns the enrollment and whether it was created.
    pub async fn upsert(
        &self,
        write: EnrollmentWrite,
    ) -> Result<(enterprise_course_enrollment::Model, bool), DbErr> {
        let existing = EnterpriseCourseEnrollment::find()
            .filter(
                enterprise_course_enrollment::Column::EnterpriseCustomerUserId
                    .eq(write.enterprise_customer_user_id),
            )
            .filter(enterprise_course_enrollment::Column::CourseId.eq(write.course_id.as_str()))
            .one(self.db)
            .await?;

        match existing {
            Some(enrollment) => {
                let mut active = enrollment.into_active_model();
                active.consent_granted = Set(write.consent_granted);
                Ok((active.update(self.db).await?, false))
            }
            None => {
                let created = enterprise_course_enrollment::ActiveModel {
                    enterprise_customer_user_id: Set(write.enterprise_customer_user_id),
                    course_id: Set(write.course_id),
                    consent_granted: Set(write.consent_granted),
                    created: Set(Utc::now().into()),
                    ..Default::default()
                }
                .insert(self.db)
                .await?;
                Ok((created, true))
            }
        }
    }

    pub async fn update(
        &self,
        enrollment: enterprise_course_enrollment::Model,
        write: EnrollmentWrite,
    ) -> Result<enterprise_course_enrollment::Model, DbErr> {
        let mut active = enrollment.into_active_model();
        active.enterprise_customer_user_id = Set(write.enterprise_customer_user_id);
        active.course_id = Set(write.course_id);
        active.consent_granted = Set(write.consent_granted);
        active.update(self.db).await
    }

    pub async fn delete(&self, enrollment: enterprise_course_enrollment::Model) -> Result<(), DbErr> {
        enrollment.delete(self.db).await.map(|_| ())
    }
}

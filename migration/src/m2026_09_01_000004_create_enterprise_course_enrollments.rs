//! Migration to create the enterprise course enrollments table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnterpriseCourseEnrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnterpriseCourseEnrollments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCourseEnrollments::EnterpriseCustomerUserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCourseEnrollments::CourseId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCourseEnrollments::ConsentGranted)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCourseEnrollments::Created)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrollments_enterprise_customer_user_id")
                            .from(
                                EnterpriseCourseEnrollments::Table,
                                EnterpriseCourseEnrollments::EnterpriseCustomerUserId,
                            )
                            .to(EnterpriseCustomerUsers::Table, EnterpriseCustomerUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uniq_enrollments_customer_user_course")
                    .table(EnterpriseCourseEnrollments::Table)
                    .col(EnterpriseCourseEnrollments::EnterpriseCustomerUserId)
                    .col(EnterpriseCourseEnrollments::CourseId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(EnterpriseCourseEnrollments::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum EnterpriseCourseEnrollments {
    Table,
    Id,
    EnterpriseCustomerUserId,
    CourseId,
    ConsentGranted,
    Created,
}

#[derive(DeriveIden)]
enum EnterpriseCustomerUsers {
    Table,
    Id,
}

//! Migration to create the enterprise customer user link table and the
//! data sharing consent audit table keyed on it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnterpriseCustomerUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnterpriseCustomerUsers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomerUsers::EnterpriseCustomerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomerUsers::UserId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enterprise_customer_users_customer_id")
                            .from(
                                EnterpriseCustomerUsers::Table,
                                EnterpriseCustomerUsers::EnterpriseCustomerId,
                            )
                            .to(EnterpriseCustomers::Table, EnterpriseCustomers::Uuid)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uniq_enterprise_customer_users_customer_user")
                    .table(EnterpriseCustomerUsers::Table)
                    .col(EnterpriseCustomerUsers::EnterpriseCustomerId)
                    .col(EnterpriseCustomerUsers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserDataSharingConsentAudits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserDataSharingConsentAudits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserDataSharingConsentAudits::UserId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserDataSharingConsentAudits::State)
                            .string_len(8)
                            .not_null()
                            .default("not_set"),
                    )
                    .col(
                        ColumnDef::new(UserDataSharingConsentAudits::Created)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(UserDataSharingConsentAudits::Modified)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_audits_enterprise_customer_user_id")
                            .from(
                                UserDataSharingConsentAudits::Table,
                                UserDataSharingConsentAudits::UserId,
                            )
                            .to(EnterpriseCustomerUsers::Table, EnterpriseCustomerUsers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(UserDataSharingConsentAudits::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(EnterpriseCustomerUsers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EnterpriseCustomerUsers {
    Table,
    Id,
    EnterpriseCustomerId,
    UserId,
}

#[derive(DeriveIden)]
enum UserDataSharingConsentAudits {
    Table,
    Id,
    UserId,
    State,
    Created,
    Modified,
}

#[derive(DeriveIden)]
enum EnterpriseCustomers {
    Table,
    Uuid,
}

//! Migration to create the enterprise customer tables.
//!
//! Creates `enterprise_customers` along with the per-customer branding
//! configuration and entitlement tables that hang off it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnterpriseCustomers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnterpriseCustomers::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomers::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EnterpriseCustomers::Catalog).integer().null())
                    .col(
                        ColumnDef::new(EnterpriseCustomers::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(EnterpriseCustomers::SiteId).integer().not_null())
                    .col(
                        ColumnDef::new(EnterpriseCustomers::EnableDataSharingConsent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomers::EnforceDataSharingConsent)
                            .string_len(25)
                            .not_null()
                            .default("at_login"),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomers::Created)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomers::Modified)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enterprise_customers_site_id")
                            .from(EnterpriseCustomers::Table, EnterpriseCustomers::SiteId)
                            .to(Sites::Table, Sites::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EnterpriseCustomerBrandingConfigurations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnterpriseCustomerBrandingConfigurations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomerBrandingConfigurations::EnterpriseCustomerId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomerBrandingConfigurations::Logo)
                            .string_len(255)
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_branding_enterprise_customer_id")
                            .from(
                                EnterpriseCustomerBrandingConfigurations::Table,
                                EnterpriseCustomerBrandingConfigurations::EnterpriseCustomerId,
                            )
                            .to(EnterpriseCustomers::Table, EnterpriseCustomers::Uuid)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EnterpriseCustomerEntitlements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnterpriseCustomerEntitlements::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomerEntitlements::EnterpriseCustomerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnterpriseCustomerEntitlements::EntitlementId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_entitlements_enterprise_customer_id")
                            .from(
                                EnterpriseCustomerEntitlements::Table,
                                EnterpriseCustomerEntitlements::EnterpriseCustomerId,
                            )
                            .to(EnterpriseCustomers::Table, EnterpriseCustomers::Uuid)
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
                    .table(EnterpriseCustomerEntitlements::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(EnterpriseCustomerBrandingConfigurations::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(EnterpriseCustomers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EnterpriseCustomers {
    Table,
    Uuid,
    Name,
    Catalog,
    Active,
    SiteId,
    EnableDataSharingConsent,
    EnforceDataSharingConsent,
    Created,
    Modified,
}

#[derive(DeriveIden)]
enum EnterpriseCustomerBrandingConfigurations {
    Table,
    Id,
    EnterpriseCustomerId,
    Logo,
}

#[derive(DeriveIden)]
enum EnterpriseCustomerEntitlements {
    Table,
    Id,
    EnterpriseCustomerId,
    EntitlementId,
}

#[derive(DeriveIden)]
enum Sites {
    Table,
    Id,
}

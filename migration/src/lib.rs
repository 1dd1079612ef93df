//! Database migrations for the Enterprise API.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_09_01_000001_create_sites_and_users;
mod m2026_09_01_000002_create_enterprise_customers;
mod m2026_09_01_000003_create_enterprise_customer_users;
mod m2026_09_01_000004_create_enterprise_course_enrollments;
mod m2026_09_14_000001_create_access_tokens_and_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_09_01_000001_create_sites_and_users::Migration),
            Box::new(m2026_09_01_000002_create_enterprise_customers::Migration),
            Box::new(m2026_09_01_000003_create_enterprise_customer_users::Migration),
            Box::new(m2026_09_01_000004_create_enterprise_course_enrollments::Migration),
            Box::new(m2026_09_14_000001_create_access_tokens_and_sessions::Migration),
        ]
    }
}

//! # Repository Layer
//!
//! Repositories wrap the SeaORM queries behind each resource. List methods
//! share [`list_page`], which applies the resource's filter whitelist,
//! ordering and pagination in one place.

pub mod credential;
pub mod enrollment;
pub mod enterprise_customer;
pub mod enterprise_customer_user;
pub mod user;

pub use credential::CredentialRepository;
pub use enrollment::EnrollmentRepository;
pub use enterprise_customer::EnterpriseCustomerRepository;
pub use enterprise_customer_user::EnterpriseCustomerUserRepository;
pub use user::UserRepository;

use sea_orm::{DatabaseConnection, EntityTrait, Select};

use crate::error::ApiError;
use crate::filters::{QueryField, filter_and_order};
use crate::pagination::{Page, PageRequest, RequestUrl, paginate};

/// Everything a list endpoint takes from the request.
#[derive(Debug, Clone, Copy)]
pub struct ListQuery<'q> {
    pub params: &'q [(String, String)],
    pub page: PageRequest,
    pub url: &'q RequestUrl,
}

/// Filter, order and paginate `select` for a list endpoint.
pub async fn list_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    fields: &[QueryField<E::Column>],
    query: ListQuery<'_>,
) -> Result<Page<E::Model>, ApiError>
where
    E: EntityTrait,
    E::Model: Send + Sync,
{
    let select = filter_and_order(select, query.params, fields)?;
    paginate(db, select, query.page, query.url).await
}

//! # Data Models
//!
//! This module contains the SeaORM entities used throughout the Enterprise API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod access_token;
pub mod branding_configuration;
pub mod consent_audit;
pub mod enterprise_course_enrollment;
pub mod enterprise_customer;
pub mod enterprise_customer_entitlement;
pub mod enterprise_customer_user;
pub mod session;
pub mod site;
pub mod user;

pub use access_token::Entity as AccessToken;
pub use branding_configuration::Entity as BrandingConfiguration;
pub use consent_audit::Entity as ConsentAudit;
pub use enterprise_course_enrollment::Entity as EnterpriseCourseEnrollment;
pub use enterprise_customer::Entity as EnterpriseCustomer;
pub use enterprise_customer_entitlement::Entity as EnterpriseCustomerEntitlement;
pub use enterprise_customer_user::Entity as EnterpriseCustomerUser;
pub use session::Entity as Session;
pub use site::Entity as Site;
pub use user::Entity as User;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "enterprise-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

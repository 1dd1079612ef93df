//! Enterprise customer entity model
//!
//! An organizational account in the platform. Carries the catalog link and
//! the data sharing consent settings that shape learner-facing responses.

use std::fmt;
use std::str::FromStr;

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Enterprise customer entity
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enterprise_customers")]
pub struct Model {
    /// Unique identifier for the customer (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub uuid: Uuid,

    /// Display name of the customer
    pub name: String,

    /// Identifier of the course catalog in the external catalog service
    pub catalog: Option<i32>,

    /// Inactive customers are hidden from the API
    pub active: bool,

    pub site_id: i32,

    /// Whether the customer asks learners for data sharing consent at all
    pub enable_data_sharing_consent: bool,

    /// When consent is enforced (see [`ConsentEnforcement`])
    pub enforce_data_sharing_consent: String,

    pub created: DateTimeWithTimeZone,

    pub modified: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::site::Entity",
        from = "Column::SiteId",
        to = "super::site::Column::Id"
    )]
    Site,
    #[sea_orm(has_many = "super::enterprise_customer_user::Entity")]
    EnterpriseCustomerUser,
    #[sea_orm(has_many = "super::enterprise_customer_entitlement::Entity")]
    EnterpriseCustomerEntitlement,
    #[sea_orm(has_one = "super::branding_configuration::Entity")]
    BrandingConfiguration,
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl Related<super::enterprise_customer_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCustomerUser.def()
    }
}

impl Related<super::enterprise_customer_entitlement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EnterpriseCustomerEntitlement.def()
    }
}

impl Related<super::branding_configuration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BrandingConfiguration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Point in the learner journey at which data sharing consent is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsentEnforcement {
    AtLogin,
    AtEnrollment,
    ExternallyManaged,
}

impl ConsentEnforcement {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentEnforcement::AtLogin => "at_login",
            ConsentEnforcement::AtEnrollment => "at_enrollment",
            ConsentEnforcement::ExternallyManaged => "externally_managed",
        }
    }
}

impl fmt::Display for ConsentEnforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentEnforcement {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "at_login" => Ok(ConsentEnforcement::AtLogin),
            "at_enrollment" => Ok(ConsentEnforcement::AtEnrollment),
            "externally_managed" => Ok(ConsentEnforcement::ExternallyManaged),
            other => Err(format!("unknown consent enforcement '{other}'")),
        }
    }
}

impl Model {
    /// Parsed enforcement policy. Unknown stored values are treated as
    /// `at_login`, the strictest policy.
    pub fn consent_enforcement(&self) -> ConsentEnforcement {
        self.enforce_data_sharing_consent
            .parse()
            .unwrap_or(ConsentEnforcement::AtLogin)
    }

    /// True when consent is enabled and enforced at the given point.
    pub fn enforces_data_sharing_consent(&self, enforcement: ConsentEnforcement) -> bool {
        self.enable_data_sharing_consent && self.consent_enforcement() == enforcement
    }

    /// True when this customer asks the platform to collect consent.
    pub fn requests_data_sharing_consent(&self) -> bool {
        self.enable_data_sharing_consent
            && self.consent_enforcement() != ConsentEnforcement::ExternallyManaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(enabled: bool, enforcement: &str) -> Model {
        let now = chrono::Utc::now().into();
        Model {
            uuid: Uuid::new_v4(),
            name: "Acme".to_string(),
            catalog: Some(1),
            active: true,
            site_id: 1,
            enable_data_sharing_consent: enabled,
            enforce_data_sharing_consent: enforcement.to_string(),
            created: now,
            modified: now,
        }
    }

    #[test]
    fn enforcement_requires_consent_enabled() {
        let disabled = customer(false, "at_login");
        assert!(!disabled.enforces_data_sharing_consent(ConsentEnforcement::AtLogin));
        assert!(!disabled.requests_data_sharing_consent());

        let enabled = customer(true, "at_login");
        assert!(enabled.enforces_data_sharing_consent(ConsentEnforcement::AtLogin));
        assert!(!enabled.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment));
        assert!(enabled.requests_data_sharing_consent());
    }

    #[test]
    fn externally_managed_consent_is_not_requested() {
        let external = customer(true, "externally_managed");
        assert!(!external.requests_data_sharing_consent());
        assert!(external.enforces_data_sharing_consent(ConsentEnforcement::ExternallyManaged));
    }

    #[test]
    fn unknown_enforcement_falls_back_to_at_login() {
        let odd = customer(true, "sometimes");
        assert_eq!(odd.consent_enforcement(), ConsentEnforcement::AtLogin);
    }
}

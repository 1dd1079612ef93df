//! # Enterprise Customer User Repository
//!
//! Learner links between platform users and enterprise customers, their
//! consent history and the entitlements that consent unlocks.

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    ModelTrait, QueryFilter, QueryOrder, Select, Set,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::filters::QueryField;
use crate::models::{
    consent_audit::{self, Entity as ConsentAudit},
    enterprise_customer::{ConsentEnforcement, Entity as EnterpriseCustomer},
    enterprise_customer_entitlement::{self, Entity as EnterpriseCustomerEntitlement},
    enterprise_customer_user::{self, Entity as EnterpriseCustomerUser},
    user::{self, Entity as User},
};
use crate::pagination::Page;

use super::enterprise_customer::{CustomerDetails, EnterpriseCustomerRepository};
use super::{ListQuery, list_page};

/// A learner link with the customer, user and consent history it embeds.
#[derive(Debug, Clone)]
pub struct LearnerDetails {
    pub link: enterprise_customer_user::Model,
    pub customer: CustomerDetails,
    pub user: Option<user::Model>,
    pub consent_audits: Vec<consent_audit::Model>,
}

/// An entitlement as offered to one learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnerEntitlement {
    pub entitlement_id: i32,
    pub requires_consent: bool,
}

pub struct EnterpriseCustomerUserRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> EnterpriseCustomerUserRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Links visible to a caller: everything, or only the caller's own links
    /// when `restrict_to_user` is set.
    fn visible(restrict_to_user: Option<i32>) -> Select<EnterpriseCustomerUser> {
        let select = EnterpriseCustomerUser::find();
        match restrict_to_user {
            Some(user_id) => select.filter(enterprise_customer_user::Column::UserId.eq(user_id)),
            None => select,
        }
    }

    pub async fn list(
        &self,
        fields: &[QueryField<enterprise_customer_user::Column>],
        query: ListQuery<'_>,
        restrict_to_user: Option<i32>,
    ) -> Result<Page<enterprise_customer_user::Model>, ApiError> {
        list_page(self.db, Self::visible(restrict_to_user), fields, query).await
    }

    pub async fn find_visible(
        &self,
        id: i32,
        restrict_to_user: Option<i32>,
    ) -> Result<Option<enterprise_customer_user::Model>, DbErr> {
        Self::visible(restrict_to_user)
            .filter(enterprise_customer_user::Column::Id.eq(id))
            .one(self.db)
            .await
    }

    /// Oldest link of a platform user, if any.
    pub async fn find_first_for_user(
        &self,
        user_id: i32,
    ) -> Result<Option<enterprise_customer_user::Model>, DbErr> {
        EnterpriseCustomerUser::find()
            .filter(enterprise_customer_user::Column::UserId.eq(user_id))
            .order_by_asc(enterprise_customer_user::Column::Id)
            .one(self.db)
            .await
    }

    /// Returns the link and whether it was created.
    pub async fn get_or_create(
        &self,
        customer: Uuid,
        user_id: i32,
    ) -> Result<(enterprise_customer_user::Model, bool), DbErr> {
        if let Some(existing) = EnterpriseCustomerUser::find()
            .filter(enterprise_customer_user::Column::EnterpriseCustomerId.eq(customer))
            .filter(enterprise_customer_user::Column::UserId.eq(user_id))
            .one(self.db)
            .await?
        {
            return Ok((existing, false));
        }

        let created = enterprise_customer_user::ActiveModel {
            enterprise_customer_id: Set(customer),
            user_id: Set(user_id),
            ..Default::default()
        }
        .insert(self.db)
        .await?;

        tracing::info!(
            enterprise_customer_user_id = created.id,
            enterprise_customer = %customer,
            user_id,
            "linked learner to enterprise customer"
        );
        Ok((created, true))
    }

    pub async fn update(
        &self,
        link: enterprise_customer_user::Model,
        customer: Uuid,
        user_id: i32,
    ) -> Result<enterprise_customer_user::Model, DbErr> {
        let mut active = link.into_active_model();
        active.enterprise_customer_id = Set(customer);
        active.user_id = Set(user_id);
        active.update(self.db).await
    }

    pub async fn delete(&self, link: enterprise_customer_user::Model) -> Result<(), DbErr> {
        link.delete(self.db).await.map(|_| ())
    }

    /// Embed customer, user and consent history for a batch of links.
    pub async fn load_details(
        &self,
        links: Vec<enterprise_customer_user::Model>,
    ) -> Result<Vec<LearnerDetails>, DbErr> {
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let mut customer_ids: Vec<Uuid> = links.iter().map(|l| l.enterprise_customer_id).collect();
        customer_ids.sort();
        customer_ids.dedup();
        let customers = EnterpriseCustomer::find()
            .filter(crate::models::enterprise_customer::Column::Uuid.is_in(customer_ids))
            .all(self.db)
            .await?;
        let customers: HashMap<Uuid, CustomerDetails> = EnterpriseCustomerRepository::new(self.db)
            .load_details(customers)
            .await?
            .into_iter()
            .map(|details| (details.customer.uuid, details))
            .collect();

        let users: HashMap<i32, user::Model> = User::find()
            .filter(user::Column::Id.is_in(links.iter().map(|l| l.user_id).collect::<Vec<_>>()))
            .all(self.db)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut audits: HashMap<i32, Vec<consent_audit::Model>> = HashMap::new();
        for audit in ConsentAudit::find()
            .filter(consent_audit::Column::UserId.is_in(links.iter().map(|l| l.id).collect::<Vec<_>>()))
            .order_by_asc(consent_audit::Column::Id)
            .all(self.db)
            .await?
        {
            audits.entry(audit.user_id).or_default().push(audit);
        }

        let mut details = Vec::with_capacity(links.len());
        for link in links {
            // The foreign key guarantees the customer exists.
            let Some(customer) = customers.get(&link.enterprise_customer_id).cloned() else {
                return Err(DbErr::RecordNotFound(format!(
                    "enterprise customer {}",
                    link.enterprise_customer_id
                )));
            };
            details.push(LearnerDetails {
                customer,
                user: users.get(&link.user_id).cloned(),
                consent_audits: audits.remove(&link.id).unwrap_or_default(),
                link,
            });
        }
        Ok(details)
    }

    /// A learner has consented when their first consent audit is `enabled`.
    pub async fn has_consented(&self, link_id: i32) -> Result<bool, DbErr> {
        let first = ConsentAudit::find()
            .filter(consent_audit::Column::UserId.eq(link_id))
            .order_by_asc(consent_audit::Column::Id)
            .one(self.db)
            .await?;
        Ok(first.is_some_and(|audit| audit.enabled()))
    }

    /// Entitlements the learner may use, given the customer's consent policy.
    pub async fn entitlements(
        &self,
        link: &enterprise_customer_user::Model,
    ) -> Result<Vec<LearnerEntitlement>, DbErr> {
        let customer = EnterpriseCustomer::find_by_id(link.enterprise_customer_id)
            .one(self.db)
            .await?
            .ok_or_else(|| {
                DbErr::RecordNotFound(format!("enterprise customer {}", link.enterprise_customer_id))
            })?;
        let consented = self.has_consented(link.id).await?;

        if customer.enforces_data_sharing_consent(ConsentEnforcement::AtLogin) && !consented {
            return Ok(Vec::new());
        }

        let requires_consent =
            customer.enforces_data_sharing_consent(ConsentEnforcement::AtEnrollment) && !consented;

        let entitlements = EnterpriseCustomerEntitlement::find()
            .filter(enterprise_customer_entitlement::Column::EnterpriseCustomerId.eq(customer.uuid))
            .order_by_asc(enterprise_customer_entitlement::Column::Id)
            .all(self.db)
            .await?;

        Ok(entitlements
            .into_iter()
            .map(|entitlement| LearnerEntitlement {
                entitlement_id: entitlement.entitlement_id,
                requires_consent,
            })
            .collect())
    }
}

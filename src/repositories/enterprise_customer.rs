//! # Enterprise Customer Repository
//!
//! Only active customers are visible through the API. Related rows needed
//! by the customer representation are batch-loaded per page.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Select,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::filters::QueryField;
use crate::models::{
    branding_configuration::{self, Entity as BrandingConfiguration},
    enterprise_customer::{self, Entity as EnterpriseCustomer},
    enterprise_customer_entitlement::{self, Entity as EnterpriseCustomerEntitlement},
    enterprise_customer_user::{self, Entity as EnterpriseCustomerUser},
    site::{self, Entity as Site},
};
use crate::pagination::Page;

use super::{ListQuery, list_page};

/// A customer together with everything its representation embeds.
#[derive(Debug, Clone)]
pub struct CustomerDetails {
    pub customer: enterprise_customer::Model,
    pub site: Option<site::Model>,
    pub enterprise_customer_user_ids: Vec<i32>,
    pub branding: Option<branding_configuration::Model>,
    pub entitlements: Vec<enterprise_customer_entitlement::Model>,
}

pub struct EnterpriseCustomerRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> EnterpriseCustomerRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    fn active() -> Select<EnterpriseCustomer> {
        EnterpriseCustomer::find().filter(enterprise_customer::Column::Active.eq(true))
    }

    /// Any customer, active or not. Used to validate references in writes.
    pub async fn find(&self, uuid: Uuid) -> Result<Option<enterprise_customer::Model>, DbErr> {
        EnterpriseCustomer::find_by_id(uuid).one(self.db).await
    }

    pub async fn find_active(&self, uuid: Uuid) -> Result<Option<enterprise_customer::Model>, DbErr> {
        Self::active()
            .filter(enterprise_customer::Column::Uuid.eq(uuid))
            .one(self.db)
            .await
    }

    pub async fn list_active(
        &self,
        fields: &[QueryField<enterprise_customer::Column>],
        query: ListQuery<'_>,
    ) -> Result<Page<enterprise_customer::Model>, ApiError> {
        list_page(self.db, Self::active(), fields, query).await
    }

    /// Whether `user_id` has an enterprise customer user link to `customer`.
    pub async fn is_user_linked(&self, user_id: i32, customer: Uuid) -> Result<bool, DbErr> {
        let count = EnterpriseCustomerUser::find()
            .filter(enterprise_customer_user::Column::UserId.eq(user_id))
            .filter(enterprise_customer_user::Column::EnterpriseCustomerId.eq(customer))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }

    /// The customer a learner belongs to, taken from their oldest link.
    pub async fn find_for_user(&self, user_id: i32) -> Result<Option<enterprise_customer::Model>, DbErr> {
        let Some(link) = EnterpriseCustomerUser::find()
            .filter(enterprise_customer_user::Column::UserId.eq(user_id))
            .order_by_asc(enterprise_customer_user::Column::Id)
            .one(self.db)
            .await?
        else {
            return Ok(None);
        };

        EnterpriseCustomer::find_by_id(link.enterprise_customer_id)
            .one(self.db)
            .await
    }

    pub async fn load_detail(
        &self,
        customer: enterprise_customer::Model,
    ) -> Result<CustomerDetails, DbErr> {
        let mut details = self.load_details(vec![customer]).await?;
        details
            .pop()
            .ok_or_else(|| DbErr::RecordNotFound("enterprise customer".to_string()))
    }

    /// Load sites, learner links, branding and entitlements for a batch of
    /// customers with one query per relation.
    pub async fn load_details(
        &self,
        customers: Vec<enterprise_customer::Model>,
    ) -> Result<Vec<CustomerDetails>, DbErr> {
        if customers.is_empty() {
            return Ok(Vec::new());
        }

        let uuids: Vec<Uuid> = customers.iter().map(|c| c.uuid).collect();
        let site_ids: Vec<i32> = customers.iter().map(|c| c.site_id).collect();

        let sites: HashMap<i32, site::Model> = Site::find()
            .filter(site::Column::Id.is_in(site_ids))
            .all(self.db)
            .await?
            .into_iter()
            .map(|site| (site.id, site))
            .collect();

        let mut links: HashMap<Uuid, Vec<i32>> = HashMap::new();
        for link in EnterpriseCustomerUser::find()
            .filter(enterprise_customer_user::Column::EnterpriseCustomerId.is_in(uuids.clone()))
            .order_by_asc(enterprise_customer_user::Column::Id)
            .all(self.db)
            .await?
        {
            links.entry(link.enterprise_customer_id).or_default().push(link.id);
        }

        let mut brandings: HashMap<Uuid, branding_configuration::Model> = BrandingConfiguration::find()
            .filter(branding_configuration::Column::EnterpriseCustomerId.is_in(uuids.clone()))
            .all(self.db)
            .await?
            .into_iter()
            .map(|branding| (branding.enterprise_customer_id, branding))
            .collect();

        let mut entitlements: HashMap<Uuid, Vec<enterprise_customer_entitlement::Model>> =
            HashMap::new();
        for entitlement in EnterpriseCustomerEntitlement::find()
            .filter(enterprise_customer_entitlement::Column::EnterpriseCustomerId.is_in(uuids))
            .order_by_asc(enterprise_customer_entitlement::Column::Id)
            .all(self.db)
            .await?
        {
            entitlements
                .entry(entitlement.enterprise_customer_id)
                .or_default()
                .push(entitlement);
        }

        Ok(customers
            .into_iter()
            .map(|customer| CustomerDetails {
                // Several customers may share a site.
                site: sites.get(&customer.site_id).cloned(),
                enterprise_customer_user_ids: links.remove(&customer.uuid).unwrap_or_default(),
                branding: brandings.remove(&customer.uuid),
                entitlements: entitlements.remove(&customer.uuid).unwrap_or_default(),
                customer,
            })
            .collect())
    }
}

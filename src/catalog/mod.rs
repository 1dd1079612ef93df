//! # Course catalog service
//!
//! Read access to the external course catalog, and the enterprise-specific
//! shaping applied to the courses it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::pagination::Page;

pub mod client;
pub mod courses;

pub use client::{CatalogClientError, CourseCatalogApiClient};
pub use courses::{EnterpriseCourse, EnterpriseCourseContext};

/// A course catalog as described by the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Catalog {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub courses_count: u64,
    #[serde(default)]
    pub viewers: Vec<String>,
}

/// A course inside a catalog. Fields this service does not interpret are
/// passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCourse {
    pub key: String,
    #[serde(default)]
    pub course_runs: Vec<CourseRun>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRun {
    pub key: String,
    #[serde(default)]
    pub enrollment_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read operations against the catalog service on behalf of a user.
///
/// `None` means the service produced nothing usable: a transport failure,
/// an error status or an undecodable body. Implementations log the cause.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn get_paginated_catalogs(
        &self,
        user: &CurrentUser,
        params: &[(String, String)],
    ) -> Option<Page<Catalog>>;

    async fn get_catalog(&self, user: &CurrentUser, catalog_id: i32) -> Option<Catalog>;

    async fn get_paginated_catalog_courses(
        &self,
        user: &CurrentUser,
        catalog_id: i32,
        params: &[(String, String)],
    ) -> Option<Page<CatalogCourse>>;
}

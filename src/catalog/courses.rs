//! Enterprise view of catalog courses.
//!
//! Courses fetched for an enterprise customer carry the customer's context,
//! lose runs whose enrollment window has closed and gain an enterprise
//! enrollment link per run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{CatalogApi, CatalogCourse, CourseRun};
use crate::auth::CurrentUser;
use crate::models::enterprise_customer;
use crate::pagination::{Page, RequestUrl};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnterpriseCourse {
    #[serde(flatten)]
    pub course: CatalogCourse,
    pub enterprise_id: Uuid,
    pub catalog_id: i32,
    pub data_sharing_consent_required: bool,
}

/// The customer a set of courses is being shown for.
#[derive(Debug, Clone, Copy)]
pub struct EnterpriseCourseContext<'a> {
    pub customer: &'a enterprise_customer::Model,
    pub catalog_id: i32,
    pub lms_root_url: &'a str,
}

impl EnterpriseCourseContext<'_> {
    pub fn enrollment_url(&self, course_run_key: &str) -> String {
        format!(
            "{}/enterprise/{}/course/{}/enroll/",
            self.lms_root_url, self.customer.uuid, course_run_key
        )
    }

    fn shape(&self, mut course: CatalogCourse, now: DateTime<Utc>) -> EnterpriseCourse {
        course.course_runs = std::mem::take(&mut course.course_runs)
            .into_iter()
            .filter(|run| enrollment_open(run, now))
            .map(|mut run| {
                run.enrollment_url = Some(self.enrollment_url(&run.key));
                run
            })
            .collect();

        EnterpriseCourse {
            course,
            enterprise_id: self.customer.uuid,
            catalog_id: self.catalog_id,
            data_sharing_consent_required: self.customer.requests_data_sharing_consent(),
        }
    }

    /// Reshape a page of catalog courses and point its links at `request_url`.
    pub fn shape_page(
        &self,
        page: Page<CatalogCourse>,
        request_url: &RequestUrl,
        now: DateTime<Utc>,
    ) -> Page<EnterpriseCourse> {
        page.map(|course| self.shape(course, now)).relink(request_url)
    }

    /// Fetch one page of the catalog's courses, forwarding `params` untouched.
    pub async fn fetch(
        &self,
        api: &dyn CatalogApi,
        user: &CurrentUser,
        params: &[(String, String)],
        request_url: &RequestUrl,
    ) -> Option<Page<EnterpriseCourse>> {
        let page = api
            .get_paginated_catalog_courses(user, self.catalog_id, params)
            .await?;
        Some(self.shape_page(page, request_url, Utc::now()))
    }
}

/// Runs without an end date, or with one we cannot read, stay open.
fn enrollment_open(run: &CourseRun, now: DateTime<Utc>) -> bool {
    match run.enrollment_end.as_deref().map(DateTime::parse_from_rfc3339) {
        Some(Ok(end)) => end.with_timezone(&Utc) > now,
        Some(Err(_)) | None => true,
    }
}

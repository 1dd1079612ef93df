//! Test utilities shared by the integration tests.
//!
//! Sets up an in-memory SQLite database with migrations applied, inserts
//! fixtures and builds the router against a scripted catalog API.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use enterprise_api::{
    auth::{CurrentUser, JwtClaims, encode_jwt},
    catalog::{Catalog, CatalogApi, CatalogCourse},
    config::AppConfig,
    models::{
        branding_configuration, consent_audit, enterprise_customer,
        enterprise_customer_entitlement, enterprise_customer_user, site, user,
    },
    pagination::Page,
    server::{AppState, create_app},
    throttle::Throttle,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        profile: "test".to_string(),
        lms_root_url: "http://lms.example.com".to_string(),
        ..AppConfig::default()
    };
    config.throttle.user_rate = "1000/minute".to_string();
    config.throttle.service_user_rate = "1000/minute".to_string();
    config
}

/// A catalog call as seen by [`FakeCatalogApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCall {
    pub method: &'static str,
    pub username: String,
    pub catalog_id: Option<i32>,
    pub params: Vec<(String, String)>,
}

/// Returns canned answers and records every call.
#[derive(Default)]
pub struct FakeCatalogApi {
    pub catalogs: Option<Page<Catalog>>,
    pub catalog: Option<Catalog>,
    pub courses: Option<Page<CatalogCourse>>,
    pub calls: Mutex<Vec<CatalogCall>>,
}

impl FakeCatalogApi {
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, user: &CurrentUser, catalog_id: Option<i32>, params: &[(String, String)]) {
        self.calls.lock().unwrap().push(CatalogCall {
            method,
            username: user.username.clone(),
            catalog_id,
            params: params.to_vec(),
        });
    }
}

#[async_trait]
impl CatalogApi for FakeCatalogApi {
    async fn get_paginated_catalogs(
        &self,
        user: &CurrentUser,
        params: &[(String, String)],
    ) -> Option<Page<Catalog>> {
        self.record("get_paginated_catalogs", user, None, params);
        self.catalogs.clone()
    }

    async fn get_catalog(&self, user: &CurrentUser, catalog_id: i32) -> Option<Catalog> {
        self.record("get_catalog", user, Some(catalog_id), &[]);
        self.catalog.clone()
    }

    async fn get_paginated_catalog_courses(
        &self,
        user: &CurrentUser,
        catalog_id: i32,
        params: &[(String, String)],
    ) -> Option<Page<CatalogCourse>> {
        self.record("get_paginated_catalog_courses", user, Some(catalog_id), params);
        self.courses.clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub catalog: Arc<FakeCatalogApi>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with(test_config(), FakeCatalogApi::default()).await
    }

    pub async fn with(config: AppConfig, catalog: FakeCatalogApi) -> Result<Self> {
        let db = setup_test_db().await?;
        let config = Arc::new(config);
        let catalog = Arc::new(catalog);
        let state = AppState {
            config: config.clone(),
            db: db.clone(),
            catalog_api: catalog.clone(),
            throttle: Arc::new(Throttle::from_config(&config)?),
        };
        Ok(Self {
            router: create_app(state),
            db,
            config,
            catalog,
        })
    }

    /// `Authorization` value carrying a JWT for `user`.
    pub fn jwt_header(&self, user: &user::Model) -> String {
        let current = CurrentUser::from(user.clone());
        let token = encode_jwt(&self.config, &JwtClaims::for_user(&self.config, &current)).unwrap();
        format!("JWT {token}")
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        auth: Option<&user::Model>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "testserver");
        if let Some(user) = auth {
            builder = builder.header(header::AUTHORIZATION, self.jwt_header(user));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Send a prepared request and decode the JSON body, if any.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, auth: &user::Model) -> (StatusCode, Value) {
        self.request("GET", uri, Some(auth), None).await
    }
}

pub async fn create_site(db: &DatabaseConnection, domain: &str) -> Result<site::Model> {
    Ok(site::ActiveModel {
        domain: Set(domain.to_string()),
        name: Set(domain.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn create_user(db: &DatabaseConnection, username: &str, is_staff: bool) -> Result<user::Model> {
    Ok(user::ActiveModel {
        username: Set(username.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        email: Set(format!("{username}@example.com")),
        is_staff: Set(is_staff),
        is_active: Set(true),
        date_joined: Set(Utc::now().into()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub struct CustomerFixture<'a> {
    pub name: &'a str,
    pub catalog: Option<i32>,
    pub active: bool,
    pub enable_data_sharing_consent: bool,
    pub enforce_data_sharing_consent: &'a str,
}

impl Default for CustomerFixture<'_> {
    fn default() -> Self {
        Self {
            name: "Acme Corp",
            catalog: Some(1),
            active: true,
            enable_data_sharing_consent: false,
            enforce_data_sharing_consent: "at_login",
        }
    }
}

pub async fn create_customer(
    db: &DatabaseConnection,
    site_id: i32,
    fixture: CustomerFixture<'_>,
) -> Result<enterprise_customer::Model> {
    let now = Utc::now();
    Ok(enterprise_customer::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        name: Set(fixture.name.to_string()),
        catalog: Set(fixture.catalog),
        active: Set(fixture.active),
        site_id: Set(site_id),
        enable_data_sharing_consent: Set(fixture.enable_data_sharing_consent),
        enforce_data_sharing_consent: Set(fixture.enforce_data_sharing_consent.to_string()),
        created: Set(now.into()),
        modified: Set(now.into()),
    }
    .insert(db)
    .await?)
}

pub async fn link_user(
    db: &DatabaseConnection,
    customer: &enterprise_customer::Model,
    user: &user::Model,
) -> Result<enterprise_customer_user::Model> {
    Ok(enterprise_customer_user::ActiveModel {
        enterprise_customer_id: Set(customer.uuid),
        user_id: Set(user.id),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn record_consent(
    db: &DatabaseConnection,
    link: &enterprise_customer_user::Model,
    state: &str,
) -> Result<consent_audit::Model> {
    let now = Utc::now();
    Ok(consent_audit::ActiveModel {
        user_id: Set(link.id),
        state: Set(state.to_string()),
        created: Set(now.into()),
        modified: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn add_entitlement(
    db: &DatabaseConnection,
    customer: &enterprise_customer::Model,
    entitlement_id: i32,
) -> Result<enterprise_customer_entitlement::Model> {
    Ok(enterprise_customer_entitlement::ActiveModel {
        enterprise_customer_id: Set(customer.uuid),
        entitlement_id: Set(entitlement_id),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn add_branding(
    db: &DatabaseConnection,
    customer: &enterprise_customer::Model,
    logo: &str,
) -> Result<branding_configuration::Model> {
    Ok(branding_configuration::ActiveModel {
        enterprise_customer_id: Set(customer.uuid),
        logo: Set(Some(logo.to_string())),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Log output captured by [`capture_logs`].
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events into a buffer until the guard drops. Works
/// with the current-thread runtime `#[tokio::test]` uses.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

//! # Server Configuration
//!
//! Router assembly, shared state and the OpenAPI document for the
//! Enterprise API.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::get,
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::catalog::CatalogApi;
use crate::config::AppConfig;
use crate::handlers::{
    self, branding, catalogs, consent_audits, enterprise_course_enrollments,
    enterprise_customer_users, enterprise_customers, entitlements, sites, users,
};
use crate::permissions::{
    AccessPolicy, CATALOGS, ENTERPRISE_COURSES, PolicyState, READ_ONLY, READ_WRITE, enforce_policy,
};
use crate::telemetry::trace_context_middleware;
use crate::throttle::Throttle;

pub const API_PREFIX: &str = "/enterprise/api/v1";

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub catalog_api: Arc<dyn CatalogApi>,
    pub throttle: Arc<Throttle>,
}

/// Put `routes` behind `policy`. Unmatched paths stay 404 without authentication.
fn guarded(
    state: &AppState,
    policy: &'static AccessPolicy,
    routes: Router<AppState>,
) -> Router<AppState> {
    routes.route_layer(middleware::from_fn_with_state(
        PolicyState {
            app: state.clone(),
            policy,
        },
        enforce_policy,
    ))
}

fn read_only_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/enterprise-customer/",
            get(enterprise_customers::list_enterprise_customers),
        )
        .route(
            "/enterprise-customer/{uuid}/",
            get(enterprise_customers::get_enterprise_customer),
        )
        .route("/site/", get(sites::list_sites))
        .route("/site/{id}/", get(sites::get_site))
        .route("/auth-user/", get(users::list_users))
        .route("/auth-user/{id}/", get(users::get_user))
        .route(
            "/enterprise-customer-branding/",
            get(branding::list_branding),
        )
        .route(
            "/enterprise-customer-branding/{id}/",
            get(branding::get_branding),
        )
        .route(
            "/user-data-sharing-consent/",
            get(consent_audits::list_consent_audits),
        )
        .route(
            "/user-data-sharing-consent/{id}/",
            get(consent_audits::get_consent_audit),
        )
        .route(
            "/enterprise-customer-entitlements/",
            get(entitlements::list_entitlements),
        )
        .route(
            "/enterprise-customer-entitlements/{id}/",
            get(entitlements::get_entitlement),
        )
}

fn read_write_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/enterprise-course-enrollment/",
            get(enterprise_course_enrollments::list_enrollments)
                .post(enterprise_course_enrollments::create_enrollment),
        )
        .route(
            "/enterprise-course-enrollment/{id}/",
            get(enterprise_course_enrollments::get_enrollment)
                .put(enterprise_course_enrollments::update_enrollment)
                .patch(enterprise_course_enrollments::partial_update_enrollment)
                .delete(enterprise_course_enrollments::delete_enrollment),
        )
        .route(
            "/enterprise-learner/",
            get(enterprise_customer_users::list_learners)
                .post(enterprise_customer_users::create_learner),
        )
        .route(
            "/enterprise-learner/{id}/",
            get(enterprise_customer_users::get_learner)
                .put(enterprise_customer_users::update_learner)
                .patch(enterprise_customer_users::partial_update_learner)
                .delete(enterprise_customer_users::delete_learner),
        )
        .route(
            "/enterprise-learner/{id}/entitlements/",
            get(enterprise_customer_users::get_learner_entitlements),
        )
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/enterprise-catalogs/", get(catalogs::list_catalogs))
        .route("/enterprise-catalogs/{id}/", get(catalogs::get_catalog))
        .route(
            "/enterprise-catalogs/{id}/courses/",
            get(catalogs::list_catalog_courses),
        )
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(guarded(&state, &READ_ONLY, read_only_routes()))
        .merge(guarded(&state, &READ_WRITE, read_write_routes()))
        .merge(guarded(
            &state,
            &ENTERPRISE_COURSES,
            Router::new().route(
                "/enterprise-customer/{uuid}/courses/",
                get(enterprise_customers::list_enterprise_courses),
            ),
        ))
        .merge(guarded(&state, &CATALOGS, catalog_routes()));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest(API_PREFIX, api)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    catalog_api: Arc<dyn CatalogApi>,
) -> Result<(), Box<dyn std::error::Error>> {
    let throttle = Throttle::from_config(&config)?;
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let state = AppState {
        config: config.clone(),
        db,
        catalog_api,
        throttle: Arc::new(throttle),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_auth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "`JWT <token>` signed with the shared secret",
                ))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Opaque access token issued by `issue_access_token`"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "session_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::auth::SESSION_COOKIE,
                ))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::enterprise_customers::list_enterprise_customers,
        crate::handlers::enterprise_customers::get_enterprise_customer,
        crate::handlers::enterprise_customers::list_enterprise_courses,
        crate::handlers::enterprise_course_enrollments::list_enrollments,
        crate::handlers::enterprise_course_enrollments::get_enrollment,
        crate::handlers::enterprise_course_enrollments::create_enrollment,
        crate::handlers::enterprise_course_enrollments::update_enrollment,
        crate::handlers::enterprise_course_enrollments::partial_update_enrollment,
        crate::handlers::enterprise_course_enrollments::delete_enrollment,
        crate::handlers::sites::list_sites,
        crate::handlers::sites::get_site,
        crate::handlers::users::list_users,
        crate::handlers::users::get_user,
        crate::handlers::enterprise_customer_users::list_learners,
        crate::handlers::enterprise_customer_users::get_learner,
        crate::handlers::enterprise_customer_users::create_learner,
        crate::handlers::enterprise_customer_users::update_learner,
        crate::handlers::enterprise_customer_users::partial_update_learner,
        crate::handlers::enterprise_customer_users::delete_learner,
        crate::handlers::enterprise_customer_users::get_learner_entitlements,
        crate::handlers::branding::list_branding,
        crate::handlers::branding::get_branding,
        crate::handlers::consent_audits::list_consent_audits,
        crate::handlers::consent_audits::get_consent_audit,
        crate::handlers::entitlements::list_entitlements,
        crate::handlers::entitlements::get_entitlement,
        crate::handlers::catalogs::list_catalogs,
        crate::handlers::catalogs::get_catalog,
        crate::handlers::catalogs::list_catalog_courses,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::HealthStatus,
            crate::handlers::sites::SiteResponse,
            crate::handlers::users::UserResponse,
            crate::handlers::branding::BrandingResponse,
            crate::handlers::entitlements::EntitlementResponse,
            crate::handlers::consent_audits::ConsentAuditResponse,
            crate::handlers::enterprise_customers::EnterpriseCustomerResponse,
            crate::handlers::enterprise_course_enrollments::EnrollmentResponse,
            crate::handlers::enterprise_course_enrollments::EnrollmentWriteRequest,
            crate::handlers::enterprise_course_enrollments::EnrollmentPatchRequest,
            crate::handlers::enterprise_customer_users::LearnerResponse,
            crate::handlers::enterprise_customer_users::LearnerWriteRequest,
            crate::handlers::enterprise_customer_users::LearnerPatchRequest,
            crate::handlers::enterprise_customer_users::LearnerEntitlementsResponse,
            crate::catalog::Catalog,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Enterprise API",
        description = "Enterprise customers, learners and enrollments, with catalog proxies",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

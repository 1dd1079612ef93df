//! # Access policies
//!
//! Each route group carries an [`AccessPolicy`]: the authentication schemes
//! it accepts, the permissions it checks and whether callers are throttled.
//! [`enforce_policy`] applies the request-level part before any handler
//! runs; handlers apply the object-level part once the object is loaded.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{AuthScheme, CurrentUser, authenticate};
use crate::error::{ApiError, forbidden, throttled};
use crate::repositories::EnterpriseCustomerRepository;
use crate::server::AppState;
use crate::throttle::retry_after_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    IsAuthenticated,
    /// Reads are open; writes need the service worker or the object's owner.
    IsServiceUserOrReadOnly,
    /// Staff, or a learner linked to the enterprise customer in question.
    IsStaffUserOrLinkedToEnterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Allow,
    Deny,
    /// Cannot be decided until the object is known.
    Defer,
}

/// The object a handler is about to expose or change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    EnterpriseCustomer(Uuid),
    /// Any object owned by a platform user (learner links, enrollments).
    OwnedBy(i32),
}

#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub authentication: &'static [AuthScheme],
    pub permissions: &'static [Permission],
    pub throttle: bool,
}

const ALL_SCHEMES: &[AuthScheme] = &[AuthScheme::Jwt, AuthScheme::Bearer, AuthScheme::Session];

/// Read-only resources.
pub const READ_ONLY: AccessPolicy = AccessPolicy {
    authentication: ALL_SCHEMES,
    permissions: &[Permission::IsAuthenticated],
    throttle: true,
};

/// Read-write resources.
pub const READ_WRITE: AccessPolicy = AccessPolicy {
    authentication: ALL_SCHEMES,
    permissions: &[Permission::IsAuthenticated, Permission::IsServiceUserOrReadOnly],
    throttle: true,
};

/// Catalog courses of a single enterprise customer.
pub const ENTERPRISE_COURSES: AccessPolicy = AccessPolicy {
    authentication: ALL_SCHEMES,
    permissions: &[
        Permission::IsAuthenticated,
        Permission::IsServiceUserOrReadOnly,
        Permission::IsStaffUserOrLinkedToEnterprise,
    ],
    throttle: true,
};

/// Catalog listing and detail proxies.
pub const CATALOGS: AccessPolicy = READ_ONLY;

pub(crate) fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

impl Permission {
    fn check_request(self, user: &CurrentUser, method: &Method, service_worker: &str) -> Decision {
        match self {
            Permission::IsAuthenticated if user.is_active => Decision::Allow,
            Permission::IsAuthenticated => Decision::Deny,
            Permission::IsServiceUserOrReadOnly => {
                if is_safe(method) || user.username == service_worker {
                    Decision::Allow
                } else {
                    Decision::Defer
                }
            }
            Permission::IsStaffUserOrLinkedToEnterprise => Decision::Defer,
        }
    }
}

impl AccessPolicy {
    fn check_request(&self, user: &CurrentUser, method: &Method, service_worker: &str) -> bool {
        self.permissions
            .iter()
            .all(|permission| permission.check_request(user, method, service_worker) != Decision::Deny)
    }

    /// Object-level check for `object`, run by handlers after loading it.
    pub async fn check_object(
        &self,
        state: &AppState,
        user: &CurrentUser,
        method: &Method,
        object: ObjectRef,
    ) -> Result<(), ApiError> {
        for permission in self.permissions {
            let allowed = match (permission, object) {
                (Permission::IsAuthenticated, _) => user.is_active,
                (Permission::IsServiceUserOrReadOnly, ObjectRef::OwnedBy(owner)) => {
                    is_safe(method)
                        || user.username == state.config.service_worker_username
                        || user.id == owner
                }
                (Permission::IsServiceUserOrReadOnly, ObjectRef::EnterpriseCustomer(_)) => {
                    is_safe(method) || user.username == state.config.service_worker_username
                }
                (Permission::IsStaffUserOrLinkedToEnterprise, ObjectRef::EnterpriseCustomer(uuid)) => {
                    user.is_staff
                        || EnterpriseCustomerRepository::new(&state.db)
                            .is_user_linked(user.id, uuid)
                            .await?
                }
                (Permission::IsStaffUserOrLinkedToEnterprise, ObjectRef::OwnedBy(_)) => true,
            };

            if !allowed {
                tracing::info!(
                    username = %user.username,
                    ?permission,
                    ?object,
                    "object permission denied"
                );
                return Err(forbidden(None));
            }
        }
        Ok(())
    }
}

/// State handed to [`enforce_policy`] for one route group.
#[derive(Clone)]
pub struct PolicyState {
    pub app: AppState,
    pub policy: &'static AccessPolicy,
}

/// Authenticate, check request-level permissions, then throttle.
pub async fn enforce_policy(
    State(PolicyState { app, policy }): State<PolicyState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(
        &app,
        request.method(),
        request.headers(),
        policy.authentication,
    )
    .await?;

    if !policy.check_request(&user, request.method(), &app.config.service_worker_username) {
        tracing::info!(username = %user.username, method = %request.method(), "permission denied");
        return Err(forbidden(None));
    }

    if policy.throttle
        && let Err(wait) = app.throttle.check(&user.username)
    {
        return Err(throttled(retry_after_secs(wait)));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str) -> CurrentUser {
        CurrentUser {
            id: 3,
            username: username.to_string(),
            email: String::new(),
            is_staff: false,
            is_active: true,
        }
    }

    #[test]
    fn test_reads_always_pass_request_level() {
        for policy in [READ_ONLY, READ_WRITE, ENTERPRISE_COURSES] {
            assert!(policy.check_request(&user("learner"), &Method::GET, "enterprise_worker"));
        }
    }

    #[test]
    fn test_writes_defer_for_non_service_users() {
        assert_eq!(
            Permission::IsServiceUserOrReadOnly.check_request(
                &user("learner"),
                &Method::POST,
                "enterprise_worker"
            ),
            Decision::Defer
        );
        assert_eq!(
            Permission::IsServiceUserOrReadOnly.check_request(
                &user("enterprise_worker"),
                &Method::DELETE,
                "enterprise_worker"
            ),
            Decision::Allow
        );
        assert!(READ_WRITE.check_request(&user("learner"), &Method::POST, "enterprise_worker"));
    }

    #[test]
    fn test_inactive_user_denied() {
        let mut inactive = user("learner");
        inactive.is_active = false;
        assert!(!READ_ONLY.check_request(&inactive, &Method::GET, "enterprise_worker"));
    }
}

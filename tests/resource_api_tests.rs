//! Integration tests for the local resources under /enterprise/api/v1/.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use enterprise_api::repositories::CredentialRepository;
use serde_json::{Value, json};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{
    CustomerFixture, TestApp, add_branding, add_entitlement, create_customer, create_site,
    create_user, link_user, record_consent,
};

const API: &str = "/enterprise/api/v1";

#[tokio::test]
async fn unauthenticated_requests_are_rejected_on_every_resource() {
    let app = TestApp::new().await.unwrap();

    let customer = "6ae013d4-c5c4-474d-8da9-0e559b2448e2";
    let paths = [
        "enterprise-customer/".to_string(),
        format!("enterprise-customer/{customer}/"),
        format!("enterprise-customer/{customer}/courses/"),
        "enterprise-course-enrollment/".to_string(),
        "enterprise-course-enrollment/1/".to_string(),
        "site/".to_string(),
        "site/1/".to_string(),
        "auth-user/".to_string(),
        "auth-user/1/".to_string(),
        "enterprise-learner/".to_string(),
        "enterprise-learner/1/".to_string(),
        "enterprise-learner/1/entitlements/".to_string(),
        "enterprise-customer-branding/".to_string(),
        "enterprise-customer-branding/1/".to_string(),
        "user-data-sharing-consent/".to_string(),
        "user-data-sharing-consent/1/".to_string(),
        "enterprise-customer-entitlements/".to_string(),
        "enterprise-customer-entitlements/1/".to_string(),
        "enterprise-catalogs/".to_string(),
        "enterprise-catalogs/1/".to_string(),
        "enterprise-catalogs/1/courses/".to_string(),
    ];
    for path in &paths {
        let (status, body) = app
            .request("GET", &format!("{API}/{path}"), None, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    let (status, _) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            None,
            Some(json!({"username": "x", "course_id": "y"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.catalog.calls().is_empty());
}

#[tokio::test]
async fn bearer_tokens_and_sessions_authenticate() {
    let app = TestApp::new().await.unwrap();
    let user = create_user(&app.db, "learner", false).await.unwrap();
    let credentials = CredentialRepository::new(&app.db);
    let issued = credentials
        .issue_access_token(user.id, chrono::Duration::hours(1))
        .await
        .unwrap();
    credentials
        .create_session("abc123", user.id, chrono::Duration::hours(1))
        .await
        .unwrap();

    let bearer = axum::http::Request::builder()
        .uri(format!("{API}/site/"))
        .header("authorization", format!("Bearer {}", issued.token))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), bearer)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session = axum::http::Request::builder()
        .uri(format!("{API}/site/"))
        .header("cookie", "csrftoken=x; sessionid=abc123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), session)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bad = axum::http::Request::builder()
        .uri(format!("{API}/site/"))
        .header("authorization", "Bearer not-a-token")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), bad)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

fn session_post(path: &str, cookie: &str, csrf_header: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("{API}/{path}"))
        .header(header::HOST, "testserver")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = csrf_header {
        builder = builder.header("x-csrftoken", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn session_writes_need_a_matching_csrf_token() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let learner = create_user(&app.db, "learner", false).await.unwrap();
    let customer = create_customer(&app.db, site.id, CustomerFixture::default())
        .await
        .unwrap();
    link_user(&app.db, &customer, &learner).await.unwrap();
    CredentialRepository::new(&app.db)
        .create_session("abc123", learner.id, chrono::Duration::hours(1))
        .await
        .unwrap();
    let enrollment = json!({
        "username": "learner",
        "course_id": "course-v1:edX+DemoX+Demo",
        "consent_granted": true,
    });

    let (status, body) = app
        .send(session_post(
            "enterprise-course-enrollment/",
            "sessionid=abc123",
            None,
            enrollment.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert!(body["message"].as_str().unwrap().starts_with("CSRF Failed"));

    let (status, body) = app
        .send(session_post(
            "enterprise-course-enrollment/",
            "csrftoken=tok; sessionid=abc123",
            Some("forged"),
            enrollment.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().starts_with("CSRF Failed"));

    let (status, listed) = app
        .get(&format!("{API}/enterprise-course-enrollment/"), &learner)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["count"], 0);

    let (status, body) = app
        .send(session_post(
            "enterprise-course-enrollment/",
            "csrftoken=tok; sessionid=abc123",
            Some("tok"),
            enrollment.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body, enrollment);
}

#[tokio::test]
async fn rejected_requests_do_not_use_up_the_rate() {
    let mut config = test_utils::test_config();
    config.throttle.user_rate = "1/minute".to_string();
    let app = TestApp::with(config, test_utils::FakeCatalogApi::default())
        .await
        .unwrap();
    let learner = create_user(&app.db, "learner", false).await.unwrap();
    CredentialRepository::new(&app.db)
        .create_session("abc123", learner.id, chrono::Duration::hours(1))
        .await
        .unwrap();

    for _ in 0..3 {
        let (status, _) = app
            .send(session_post(
                "enterprise-learner/",
                "sessionid=abc123",
                None,
                json!({}),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, _) = app.get(&format!("{API}/site/"), &learner).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("{API}/site/"), &learner).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn customer_list_hides_inactive_and_embeds_relations() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let user = create_user(&app.db, "learner", false).await.unwrap();
    let active = create_customer(&app.db, site.id, CustomerFixture::default())
        .await
        .unwrap();
    create_customer(
        &app.db,
        site.id,
        CustomerFixture {
            name: "Dormant",
            active: false,
            ..CustomerFixture::default()
        },
    )
    .await
    .unwrap();
    let link = link_user(&app.db, &active, &user).await.unwrap();
    add_branding(&app.db, &active, "logo.png").await.unwrap();
    add_entitlement(&app.db, &active, 42).await.unwrap();

    let (status, body) = app.get(&format!("{API}/enterprise-customer/"), &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let customer = &body["results"][0];
    assert_eq!(customer["uuid"], active.uuid.to_string());
    assert_eq!(customer["site"]["domain"], "example.com");
    assert_eq!(customer["enterprise_customer_users"], json!([link.id]));
    assert_eq!(customer["branding_configuration"]["logo"], "logo.png");
    assert_eq!(
        customer["enterprise_customer_entitlements"][0]["entitlement_id"],
        42
    );

    let (status, _) = app
        .get(&format!("{API}/enterprise-customer/{}/", uuid::Uuid::new_v4()), &user)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn filters_outside_whitelist_are_ignored() {
    let app = TestApp::new().await.unwrap();
    create_site(&app.db, "a.example.com").await.unwrap();
    create_site(&app.db, "b.example.com").await.unwrap();
    let user = create_user(&app.db, "learner", false).await.unwrap();

    let (status, body) = app
        .get(&format!("{API}/site/?domain=b.example.com"), &user)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["domain"], "b.example.com");

    let (status, body) = app
        .get(&format!("{API}/site/?id=1&ordering=-id"), &user)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["domain"], "a.example.com");

    let (status, body) = app
        .get(&format!("{API}/site/?ordering=-domain"), &user)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["domain"], "b.example.com");
}

#[tokio::test]
async fn invalid_whitelisted_filter_value_is_a_validation_error() {
    let app = TestApp::new().await.unwrap();
    let user = create_user(&app.db, "learner", false).await.unwrap();

    let (status, body) = app
        .get(&format!("{API}/auth-user/?is_staff=perhaps"), &user)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["details"]["is_staff"].is_array());
}

#[tokio::test]
async fn lists_are_paginated_with_absolute_links() {
    let app = TestApp::new().await.unwrap();
    for i in 0..3 {
        create_site(&app.db, &format!("site{i}.example.com")).await.unwrap();
    }
    let user = create_user(&app.db, "learner", false).await.unwrap();

    let (status, body) = app
        .get(&format!("{API}/site/?page_size=2"), &user)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(
        body["next"],
        "http://testserver/enterprise/api/v1/site/?page=2&page_size=2"
    );
    assert_eq!(body["previous"], json!(null));

    let (status, _) = app
        .get(&format!("{API}/site/?page=9"), &user)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enrollment_read_and_write_shapes_differ() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let worker = create_user(&app.db, "enterprise_worker", false).await.unwrap();
    let learner = create_user(&app.db, "learner", false).await.unwrap();
    let customer = create_customer(&app.db, site.id, CustomerFixture::default())
        .await
        .unwrap();
    let link = link_user(&app.db, &customer, &learner).await.unwrap();

    let payload = json!({
        "username": "learner",
        "course_id": "course-v1:edX+DemoX+Demo",
        "consent_granted": true
    });
    let (status, written) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            Some(&worker),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(written, payload);

    let (status, listed) = app
        .get(&format!("{API}/enterprise-course-enrollment/"), &worker)
        .await;
    assert_eq!(status, StatusCode::OK);
    let read = &listed["results"][0];
    assert_eq!(read["enterprise_customer_user"], link.id);
    assert_eq!(read["course_id"], "course-v1:edX+DemoX+Demo");
    assert_eq!(read["consent_granted"], true);
    assert!(read.get("username").is_none());

    // Posting again updates consent on the same enrollment.
    let (status, _) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            Some(&worker),
            Some(json!({
                "username": "learner",
                "course_id": "course-v1:edX+DemoX+Demo",
                "consent_granted": false
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, listed) = app
        .get(&format!("{API}/enterprise-course-enrollment/?consent_granted=false"), &worker)
        .await;
    assert_eq!(listed["count"], 1);

    let id = listed["results"][0]["id"].as_i64().unwrap();
    let (status, patched) = app
        .request(
            "PATCH",
            &format!("{API}/enterprise-course-enrollment/{id}/"),
            Some(&worker),
            Some(json!({"consent_granted": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["username"], "learner");
    assert_eq!(patched["consent_granted"], true);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("{API}/enterprise-course-enrollment/{id}/"),
            Some(&worker),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn enrollment_write_validates_username() {
    let app = TestApp::new().await.unwrap();
    let worker = create_user(&app.db, "enterprise_worker", false).await.unwrap();
    create_user(&app.db, "unlinked", false).await.unwrap();

    let (status, body) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            Some(&worker),
            Some(json!({"username": "ghost", "course_id": "c"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["username"], json!(["User does not exist"]));

    let (status, body) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            Some(&worker),
            Some(json!({"username": "unlinked", "course_id": "c"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["details"]["username"],
        json!(["User has no EnterpriseCustomerUser"])
    );
}

#[tokio::test]
async fn learners_cannot_write_for_other_users() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let alice = create_user(&app.db, "alice", false).await.unwrap();
    let bob = create_user(&app.db, "bob", false).await.unwrap();
    let customer = create_customer(&app.db, site.id, CustomerFixture::default())
        .await
        .unwrap();
    link_user(&app.db, &customer, &alice).await.unwrap();
    link_user(&app.db, &customer, &bob).await.unwrap();

    let (status, _) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            Some(&alice),
            Some(json!({"username": "bob", "course_id": "c"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            "POST",
            &format!("{API}/enterprise-course-enrollment/"),
            Some(&alice),
            Some(json!({"username": "alice", "course_id": "c"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn learner_links_are_scoped_to_the_caller() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let alice = create_user(&app.db, "alice", false).await.unwrap();
    let bob = create_user(&app.db, "bob", false).await.unwrap();
    let staff = create_user(&app.db, "staff", true).await.unwrap();
    let customer = create_customer(&app.db, site.id, CustomerFixture::default())
        .await
        .unwrap();
    let alice_link = link_user(&app.db, &customer, &alice).await.unwrap();
    let bob_link = link_user(&app.db, &customer, &bob).await.unwrap();
    record_consent(&app.db, &alice_link, "enabled").await.unwrap();

    let (status, body) = app.get(&format!("{API}/enterprise-learner/"), &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let own = &body["results"][0];
    assert_eq!(own["id"], alice_link.id);
    assert_eq!(own["enterprise_customer"]["name"], "Acme Corp");
    assert_eq!(own["user"]["username"], "alice");
    assert_eq!(own["data_sharing_consent"][0]["state"], "enabled");

    let (status, _) = app
        .get(&format!("{API}/enterprise-learner/{}/", bob_link.id), &alice)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get(&format!("{API}/enterprise-learner/"), &staff).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn learner_write_shape_and_validation() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let worker = create_user(&app.db, "enterprise_worker", false).await.unwrap();
    create_user(&app.db, "carol", false).await.unwrap();
    let customer = create_customer(&app.db, site.id, CustomerFixture::default())
        .await
        .unwrap();

    let payload = json!({"enterprise_customer": customer.uuid, "username": "carol"});
    let (status, body) = app
        .request(
            "POST",
            &format!("{API}/enterprise-learner/"),
            Some(&worker),
            Some(payload.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, payload);

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .request(
            "POST",
            &format!("{API}/enterprise-learner/"),
            Some(&worker),
            Some(json!({"enterprise_customer": missing, "username": "nobody"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["username"], json!(["User does not exist"]));
    assert_eq!(
        body["details"]["enterprise_customer"],
        json!([format!("Invalid pk \"{missing}\" - object does not exist.")])
    );
}

#[tokio::test]
async fn entitlements_follow_consent_enforcement() {
    let app = TestApp::new().await.unwrap();
    let site = create_site(&app.db, "example.com").await.unwrap();
    let learner = create_user(&app.db, "learner", false).await.unwrap();

    let at_login = create_customer(
        &app.db,
        site.id,
        CustomerFixture {
            name: "Strict",
            enable_data_sharing_consent: true,
            enforce_data_sharing_consent: "at_login",
            ..CustomerFixture::default()
        },
    )
    .await
    .unwrap();
    add_entitlement(&app.db, &at_login, 7).await.unwrap();
    let strict_link = link_user(&app.db, &at_login, &learner).await.unwrap();

    let (status, body) = app
        .get(
            &format!("{API}/enterprise-learner/{}/entitlements/", strict_link.id),
            &learner,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"entitlements": []}));

    record_consent(&app.db, &strict_link, "enabled").await.unwrap();
    let (_, body) = app
        .get(
            &format!("{API}/enterprise-learner/{}/entitlements/", strict_link.id),
            &learner,
        )
        .await;
    assert_eq!(
        body,
        json!({"entitlements": [{"entitlement_id": 7, "requires_consent": false}]})
    );

    let at_enrollment = create_customer(
        &app.db,
        site.id,
        CustomerFixture {
            name: "Lenient",
            enable_data_sharing_consent: true,
            enforce_data_sharing_consent: "at_enrollment",
            ..CustomerFixture::default()
        },
    )
    .await
    .unwrap();
    add_entitlement(&app.db, &at_enrollment, 8).await.unwrap();
    let lenient_link = link_user(&app.db, &at_enrollment, &learner).await.unwrap();

    let (_, body) = app
        .get(
            &format!("{API}/enterprise-learner/{}/entitlements/", lenient_link.id),
            &learner,
        )
        .await;
    assert_eq!(
        body,
        json!({"entitlements": [{"entitlement_id": 8, "requires_consent": true}]})
    );
}

#[tokio::test]
async fn requests_over_the_rate_are_throttled() {
    let mut config = test_utils::test_config();
    config.throttle.user_rate = "2/minute".to_string();
    let app = TestApp::with(config, test_utils::FakeCatalogApi::default())
        .await
        .unwrap();
    let user = create_user(&app.db, "learner", false).await.unwrap();

    for _ in 0..2 {
        let (status, _) = app.get(&format!("{API}/site/"), &user).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.get(&format!("{API}/site/"), &user).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert!(body["retry_after"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn service_root_and_health_need_no_credentials() {
    let app = TestApp::new().await.unwrap();

    let (status, body) = app.request("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "enterprise-api");

    let (status, body) = app.request("GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

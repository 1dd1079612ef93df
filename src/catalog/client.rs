//! HTTP implementation of [`CatalogApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use super::{Catalog, CatalogApi, CatalogCourse};
use crate::auth::{CurrentUser, JwtClaims, encode_jwt};
use crate::config::AppConfig;
use crate::pagination::Page;

#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("invalid catalog API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to sign request token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("catalog API request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("catalog API returned status {0}")]
    Status(StatusCode),
    #[error("catalog API response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Calls the catalog service with a short-lived JWT minted for the caller.
pub struct CourseCatalogApiClient {
    http: Client,
    base_url: Url,
    config: Arc<AppConfig>,
}

impl CourseCatalogApiClient {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, CatalogClientError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.catalog_api_timeout_ms))
            .build()
            .map_err(CatalogClientError::Transport)?;
        Self::with_http_client(config, http)
    }

    pub fn with_http_client(config: Arc<AppConfig>, http: Client) -> Result<Self, CatalogClientError> {
        let base_url = Url::parse(&config.course_catalog_api_url)?;
        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CatalogClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        user: &CurrentUser,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, CatalogClientError> {
        let url = self.endpoint(path)?;
        let token = encode_jwt(&self.config, &JwtClaims::for_user(&self.config, user))?;

        let response = self
            .http
            .get(url)
            .query(params)
            .header(reqwest::header::AUTHORIZATION, format!("JWT {token}"))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(CatalogClientError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogClientError::Status(status));
        }

        response.json::<T>().await.map_err(CatalogClientError::Decode)
    }

    /// Collapse failures to `None`, logging why.
    async fn fetch<T: DeserializeOwned>(
        &self,
        user: &CurrentUser,
        path: &str,
        params: &[(String, String)],
    ) -> Option<T> {
        match self.get(user, path, params).await {
            Ok(body) => Some(body),
            Err(error) => {
                tracing::warn!(
                    %error,
                    path,
                    username = %user.username,
                    "catalog API call failed"
                );
                None
            }
        }
    }
}

#[async_trait]
impl CatalogApi for CourseCatalogApiClient {
    async fn get_paginated_catalogs(
        &self,
        user: &CurrentUser,
        params: &[(String, String)],
    ) -> Option<Page<Catalog>> {
        self.fetch(user, "catalogs/", params).await
    }

    async fn get_catalog(&self, user: &CurrentUser, catalog_id: i32) -> Option<Catalog> {
        self.fetch(user, &format!("catalogs/{catalog_id}/"), &[]).await
    }

    async fn get_paginated_catalog_courses(
        &self,
        user: &CurrentUser,
        catalog_id: i32,
        params: &[(String, String)],
    ) -> Option<Page<CatalogCourse>> {
        self.fetch(user, &format!("catalogs/{catalog_id}/courses/"), params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::decode_jwt;
    use serde_json::json;
    use wiremock::matchers::{header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn caller() -> CurrentUser {
        CurrentUser {
            id: 1,
            username: "learner".to_string(),
            email: "learner@example.com".to_string(),
            is_staff: false,
            is_active: true,
        }
    }

    fn client_for(server: &MockServer) -> CourseCatalogApiClient {
        let config = AppConfig {
            course_catalog_api_url: format!("{}/api/v1/", server.uri()),
            ..AppConfig::default()
        };
        CourseCatalogApiClient::new(Arc::new(config)).unwrap()
    }

    #[tokio::test]
    async fn test_catalog_courses_forward_params_and_sign_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/catalogs/4/courses/"))
            .and(query_param("page", "2"))
            .and(header_regex("authorization", "^JWT .+"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "next": null,
                "previous": "http://catalog/api/v1/catalogs/4/courses/",
                "results": [{"key": "edX+DemoX", "title": "Demo", "course_runs": []}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let page = client
            .get_paginated_catalog_courses(&caller(), 4, &[("page".to_string(), "2".to_string())])
            .await
            .unwrap();

        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].key, "edX+DemoX");
        assert_eq!(page.results[0].extra["title"], "Demo");

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let auth = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
        let claims = decode_jwt(&client.config, auth.trim_start_matches("JWT ")).unwrap();
        assert_eq!(claims.preferred_username.as_deref(), Some("learner"));
    }

    #[tokio::test]
    async fn test_error_status_collapses_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/catalogs/9/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(client_for(&server).get_catalog(&caller(), 9).await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_body_collapses_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/catalogs/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "odd"})))
            .mount(&server)
            .await;

        assert!(
            client_for(&server)
                .get_paginated_catalogs(&caller(), &[])
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_catalog_detail_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/catalogs/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "name": "All Courses",
                "query": "*:*",
                "courses_count": 3,
                "viewers": []
            })))
            .mount(&server)
            .await;

        let catalog = client_for(&server).get_catalog(&caller(), 1).await.unwrap();
        assert_eq!(catalog.name, "All Courses");
        assert_eq!(catalog.courses_count, 3);
    }
}

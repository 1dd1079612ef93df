//! Page-number pagination and the `{count, next, previous, results}` envelope.

use axum::{
    extract::FromRequestParts,
    http::{header::HOST, request::Parts},
};
use sea_orm::{ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::config::PaginationConfig;
use crate::error::{ApiError, not_found, validation_error};

pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "page_size";

/// Paginated list envelope shared by local and proxied listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    /// Point upstream `next`/`previous` links at `request_url`, keeping only the
    /// upstream query string.
    pub fn relink(mut self, request_url: &RequestUrl) -> Self {
        self.next = self.next.as_deref().map(|link| request_url.rebase(link));
        self.previous = self.previous.as_deref().map(|link| request_url.rebase(link));
        self
    }
}

/// Absolute URL of the current request, reconstructed from `Host` and
/// `X-Forwarded-Proto`.
#[derive(Debug, Clone)]
pub struct RequestUrl(pub Url);

impl RequestUrl {
    pub fn parse(raw: &str) -> Option<Self> {
        Url::parse(raw).ok().map(Self)
    }

    /// Path plus query, as the caller sent it.
    pub fn full_path(&self) -> String {
        match self.0.query() {
            Some(query) => format!("{}?{}", self.0.path(), query),
            None => self.0.path().to_string(),
        }
    }

    /// Current URL with `key` set to `value`, other parameters kept in sorted order.
    pub fn with_param(&self, key: &str, value: &str) -> String {
        let mut pairs: Vec<(String, String)> = self
            .0
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.push((key.to_string(), value.to_string()));
        pairs.sort();
        self.with_pairs(pairs)
    }

    /// Current URL without `key`.
    pub fn without_param(&self, key: &str) -> String {
        let pairs: Vec<(String, String)> = self
            .0
            .query_pairs()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        self.with_pairs(pairs)
    }

    fn with_pairs(&self, pairs: Vec<(String, String)>) -> String {
        let mut url = self.0.clone();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
        url.to_string()
    }

    /// This request's URL without its query, carrying `link`'s query instead.
    pub fn rebase(&self, link: &str) -> String {
        let mut base = self.0.clone();
        base.set_query(None);
        base.set_fragment(None);

        let query = Url::parse(link)
            .ok()
            .and_then(|url| url.query().map(str::to_string))
            .or_else(|| link.split_once('?').map(|(_, query)| query.to_string()))
            .filter(|query| !query.is_empty());

        match query {
            Some(query) => format!("{}?{}", base, query),
            None => base.to_string(),
        }
    }
}

impl<S> FromRequestParts<S> for RequestUrl
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
            .unwrap_or("localhost");
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .filter(|value| matches!(*value, "http" | "https"))
            .unwrap_or("http");
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        RequestUrl::parse(&format!("{scheme}://{host}{path_and_query}"))
            .ok_or_else(|| {
                validation_error(
                    "Invalid request URL",
                    serde_json::json!({ "Host": ["Host header does not form a valid URL."] }),
                )
            })
    }
}

/// Resolved `page`/`page_size` for a local listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// A `page` that is not a positive integer is a 404. An invalid
    /// `page_size` falls back to the default; oversized ones are capped.
    pub fn from_params(
        params: &[(String, String)],
        config: &PaginationConfig,
    ) -> Result<Self, ApiError> {
        let lookup = |key: &str| {
            params
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim())
        };

        let page = match lookup(PAGE_PARAM) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|page| *page > 0)
                .ok_or_else(|| not_found("Invalid page."))?,
        };

        let page_size = lookup(PAGE_SIZE_PARAM)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(config.max_page_size))
            .unwrap_or(config.page_size);

        Ok(Self { page, page_size })
    }
}

/// Fetch one page of `select` and wrap it in the envelope with absolute links.
pub async fn paginate<E, C>(
    db: &C,
    select: Select<E>,
    request: PageRequest,
    url: &RequestUrl,
) -> Result<Page<E::Model>, ApiError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
{
    let paginator = select.paginate(db, request.page_size);
    let count = paginator.num_items().await?;
    let num_pages = count.div_ceil(request.page_size).max(1);

    if request.page > num_pages {
        return Err(not_found("Invalid page."));
    }

    let results = paginator.fetch_page(request.page - 1).await?;

    let next = (request.page < num_pages)
        .then(|| url.with_param(PAGE_PARAM, &(request.page + 1).to_string()));
    let previous = match request.page {
        1 => None,
        2 => Some(url.without_param(PAGE_PARAM)),
        page => Some(url.with_param(PAGE_PARAM, &(page - 1).to_string())),
    };

    Ok(Page {
        count,
        next,
        previous,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> RequestUrl {
        RequestUrl::parse(raw).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_page_request_defaults_and_caps() {
        let config = PaginationConfig::default();

        let request = PageRequest::from_params(&[], &config).unwrap();
        assert_eq!(request, PageRequest { page: 1, page_size: 10 });

        let request =
            PageRequest::from_params(&params(&[("page", "3"), ("page_size", "1000")]), &config)
                .unwrap();
        assert_eq!(request, PageRequest { page: 3, page_size: 100 });

        let request = PageRequest::from_params(&params(&[("page_size", "abc")]), &config).unwrap();
        assert_eq!(request.page_size, 10);
    }

    #[test]
    fn test_invalid_page_is_not_found() {
        let config = PaginationConfig::default();
        for raw in ["0", "-1", "last-ish"] {
            let err = PageRequest::from_params(&params(&[("page", raw)]), &config).unwrap_err();
            assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_page_links() {
        let current = url("http://testserver/enterprise/api/v1/site/?page=2&name=edx");
        assert_eq!(
            current.with_param("page", "3"),
            "http://testserver/enterprise/api/v1/site/?name=edx&page=3"
        );
        assert_eq!(
            current.without_param("page"),
            "http://testserver/enterprise/api/v1/site/?name=edx"
        );

        let bare = url("http://testserver/enterprise/api/v1/site/?page=2");
        assert_eq!(
            bare.without_param("page"),
            "http://testserver/enterprise/api/v1/site/"
        );
    }

    #[test]
    fn test_relink_keeps_upstream_query_only() {
        let current = url("http://testserver/enterprise/api/v1/enterprise-catalogs/?page=1");
        let page = Page {
            count: 3,
            next: Some("http://catalog.internal/api/v1/catalogs/?page=3".to_string()),
            previous: Some("http://catalog.internal/api/v1/catalogs/".to_string()),
            results: vec![1, 2],
        }
        .relink(&current);

        assert_eq!(
            page.next.as_deref(),
            Some("http://testserver/enterprise/api/v1/enterprise-catalogs/?page=3")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("http://testserver/enterprise/api/v1/enterprise-catalogs/")
        );
    }

    #[test]
    fn test_full_path() {
        let current = url("http://testserver/enterprise/api/v1/enterprise-customer/x/courses/?page=2");
        assert_eq!(
            current.full_path(),
            "/enterprise/api/v1/enterprise-customer/x/courses/?page=2"
        );
    }
}

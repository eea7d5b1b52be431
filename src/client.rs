//! Pobo API client: request construction, bulk validation, response
//! interpretation, and page-by-page export streams.

use std::cmp::min;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::PoboClientConfig;
use crate::error::{ApiError, Error, ValidationError};
use crate::types::{Blog, Category, ImportResult, PaginatedResponse, Product};

/// Ceiling on bulk import batches and on `per_page` for list operations.
pub const MAX_BULK_ITEMS: usize = 100;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const PRODUCTS_PATH: &str = "/api/v2/rest/products";
const CATEGORIES_PATH: &str = "/api/v2/rest/categories";
const PARAMETERS_PATH: &str = "/api/v2/rest/parameters";
const BLOGS_PATH: &str = "/api/v2/rest/blogs";

/// A client for the Pobo catalog API.
///
/// Owns its configuration and a reusable HTTP handle; every public operation
/// performs at most one network round trip and nothing is retried or cached.
pub struct PoboClient {
    http: reqwest::Client,
    config: PoboClientConfig,
}

impl Debug for PoboClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoboClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl PoboClient {
    /// Create a new client from configuration.
    pub fn new(config: PoboClientConfig) -> Result<Self, Error> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    /// Get the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    // -----------------------------------------------------------------------
    // Import operations
    // -----------------------------------------------------------------------

    /// Import a batch of products as a single request.
    ///
    /// Items are generic over [`Serialize`]: typed [`Product`]s and raw
    /// [`serde_json::Value`]s in wire form take the same encode path.
    pub async fn import_products<T: Serialize>(
        &self,
        products: &[T],
    ) -> Result<ImportResult, Error> {
        self.import(PRODUCTS_PATH, products).await
    }

    /// Import a batch of categories as a single request.
    pub async fn import_categories<T: Serialize>(
        &self,
        categories: &[T],
    ) -> Result<ImportResult, Error> {
        self.import(CATEGORIES_PATH, categories).await
    }

    /// Import a batch of parameters as a single request.
    pub async fn import_parameters<T: Serialize>(
        &self,
        parameters: &[T],
    ) -> Result<ImportResult, Error> {
        self.import(PARAMETERS_PATH, parameters).await
    }

    /// Import a batch of blogs as a single request.
    pub async fn import_blogs<T: Serialize>(&self, blogs: &[T]) -> Result<ImportResult, Error> {
        self.import(BLOGS_PATH, blogs).await
    }

    #[instrument(skip_all, fields(path = %path, n_items = items.len()))]
    async fn import<T: Serialize>(
        &self,
        path: &str,
        items: &[T],
    ) -> Result<ImportResult, Error> {
        validate_bulk_size(items.len())?;
        let body = self.post_json(path, items).await?;
        let result = serde_json::from_value(body).map_err(ApiError::InvalidResponsePayload)?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Export operations
    // -----------------------------------------------------------------------

    /// Fetch one page of products.
    pub async fn get_products(
        &self,
        query: &ListQuery,
    ) -> Result<PaginatedResponse<Product>, Error> {
        self.get_page(PRODUCTS_PATH, query).await
    }

    /// Fetch one page of categories.
    pub async fn get_categories(
        &self,
        query: &ListQuery,
    ) -> Result<PaginatedResponse<Category>, Error> {
        self.get_page(CATEGORIES_PATH, query).await
    }

    /// Fetch one page of blogs.
    pub async fn get_blogs(&self, query: &ListQuery) -> Result<PaginatedResponse<Blog>, Error> {
        self.get_page(BLOGS_PATH, query).await
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &ListQuery,
    ) -> Result<PaginatedResponse<T>, Error> {
        let body = self.get(path, query).await?;
        let page = serde_json::from_value(body).map_err(ApiError::InvalidResponsePayload)?;
        Ok(page)
    }

    // -----------------------------------------------------------------------
    // Streaming exports
    // -----------------------------------------------------------------------

    /// Stream all products matching `filter`, page by page.
    ///
    /// The stream is lazy (no request is issued until first polled) and
    /// single-pass. Entities are yielded in server-page order, one page of
    /// [`MAX_BULK_ITEMS`] at a time, with no prefetch of the next page.
    /// Termination relies on server-reported pagination metadata; a server
    /// that keeps reporting further pages streams without bound.
    pub fn stream_products(
        &self,
        filter: ExportFilter,
    ) -> impl Stream<Item = Result<Product, Error>> + '_ {
        paginate(move |page| {
            let query = filter.page_query(page);
            async move { self.get_products(&query).await }
        })
    }

    /// Stream all categories matching `filter`, page by page.
    ///
    /// Same laziness and ordering guarantees as [`PoboClient::stream_products`].
    pub fn stream_categories(
        &self,
        filter: ExportFilter,
    ) -> impl Stream<Item = Result<Category, Error>> + '_ {
        paginate(move |page| {
            let query = filter.page_query(page);
            async move { self.get_categories(&query).await }
        })
    }

    /// Stream all blogs matching `filter`, page by page.
    ///
    /// Same laziness and ordering guarantees as [`PoboClient::stream_products`].
    pub fn stream_blogs(
        &self,
        filter: ExportFilter,
    ) -> impl Stream<Item = Result<Blog, Error>> + '_ {
        paginate(move |page| {
            let query = filter.page_query(page);
            async move { self.get_blogs(&query).await }
        })
    }

    // -----------------------------------------------------------------------
    // Request pipeline
    // -----------------------------------------------------------------------

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint_url(path);
        debug!(%url, "sending import request");
        let response = self.http.post(&url).json(body).send().await?;
        handle_response(response).await
    }

    async fn get(&self, path: &str, query: &ListQuery) -> Result<Value, ApiError> {
        let url = self.endpoint_url(path);
        let params = query.to_query_pairs();
        debug!(%url, ?params, "sending export request");
        let response = self.http.get(&url).query(&params).send().await?;
        handle_response(response).await
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Query parameters accepted by the list operations. All optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub page: Option<u32>,
    /// Requested page size; values above [`MAX_BULK_ITEMS`] are silently
    /// clamped, never rejected.
    pub per_page: Option<u32>,
    pub last_update_from: Option<DateTime<Utc>>,
    pub is_edited: Option<bool>,
}

impl ListQuery {
    fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            let clamped = min(per_page, MAX_BULK_ITEMS as u32);
            params.push(("per_page", clamped.to_string()));
        }
        if let Some(last_update_from) = self.last_update_from {
            params.push((
                "last_update_time_from",
                last_update_from.format("%Y-%m-%d %H:%M:%S").to_string(),
            ));
        }
        if let Some(is_edited) = self.is_edited {
            params.push(("is_edited", is_edited.to_string()));
        }
        params
    }
}

/// Filters shared by the streaming export operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFilter {
    pub last_update_from: Option<DateTime<Utc>>,
    pub is_edited: Option<bool>,
}

impl ExportFilter {
    fn page_query(&self, page: u32) -> ListQuery {
        ListQuery {
            page: Some(page),
            per_page: Some(MAX_BULK_ITEMS as u32),
            last_update_from: self.last_update_from,
            is_edited: self.is_edited,
        }
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn validate_bulk_size(len: usize) -> Result<(), ValidationError> {
    if len == 0 {
        return Err(ValidationError::EmptyPayload);
    }
    if len > MAX_BULK_ITEMS {
        return Err(ValidationError::TooManyItems {
            count: len,
            max: MAX_BULK_ITEMS,
        });
    }
    Ok(())
}

/// Create a lazy depaging stream from a page-fetching function.
///
/// Starts at page 1 and keeps fetching while the returned page reports more
/// pages, yielding entities in page order. Nothing is fetched until the
/// stream is first polled.
fn paginate<'a, T, F, Fut>(fetch_page: F) -> impl Stream<Item = Result<T, Error>> + 'a
where
    T: 'a,
    F: Fn(u32) -> Fut + 'a,
    Fut: Future<Output = Result<PaginatedResponse<T>, Error>> + 'a,
{
    try_stream! {
        let mut page = 1u32;
        loop {
            let response = fetch_page(page).await?;
            let more = response.more_pages();
            for entity in response.data {
                yield entity;
            }
            if !more {
                break;
            }
            page += 1;
        }
    }
}

/// Interpret an HTTP response per the shared rules of both operation
/// families.
///
/// An empty body decodes to an empty object; a body that is not valid JSON is
/// an error on any status; 401 wins over any body content.
async fn handle_response(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;

    let body: Value = if text.is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) => {
                return Err(ApiError::InvalidJson {
                    http_code: status.as_u16(),
                    response_body: text,
                })
            },
        }
    };

    if status.is_success() {
        return Ok(body);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }

    debug!(status = status.as_u16(), "API returned error response");
    Err(ApiError::from_response(status.as_u16(), body))
}

/// Build the HTTP client with bearer token auth and fixed timeouts.
fn build_http_client(config: &PoboClientConfig) -> Result<reqwest::Client, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", config.api_token))
            .map_err(|e| ApiError::Other(e.to_string()))?,
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    debug!(base_url = %config.base_url, "building Pobo HTTP client");

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.timeout)
        .build()
        .map_err(|e| ApiError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use futures::TryStreamExt;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::types::LocalizedString;

    fn test_client(base_url: &str) -> PoboClient {
        let config = PoboClientConfig {
            base_url: base_url.to_string(),
            ..PoboClientConfig::new("test-token")
        };
        PoboClient::new(config).unwrap()
    }

    fn product(id: &str) -> Product {
        Product {
            id: id.to_string(),
            is_visible: true,
            name: LocalizedString::new("Product"),
            url: LocalizedString::new("https://example.com"),
            ..Default::default()
        }
    }

    fn product_json(id: &str) -> Value {
        json!({
            "id": id,
            "is_visible": true,
            "name": {"default": "Product"},
            "url": {"default": "https://example.com"},
        })
    }

    #[tokio::test]
    async fn import_products_sends_single_batch_in_order() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/rest/products")
                .header("authorization", "Bearer test-token")
                .json_body(json!([product_json("PROD-001"), product_json("PROD-002")]));
            then.status(200).json_body(json!({
                "success": true, "imported": 2, "updated": 0, "skipped": 0, "errors": [],
            }));
        });

        let client = test_client(&server.base_url());
        let result = client
            .import_products(&[product("PROD-001"), product("PROD-002")])
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.imported, 2);
        assert!(!result.has_errors());
        mock.assert();
    }

    #[tokio::test]
    async fn import_accepts_raw_wire_values() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v2/rest/blogs")
                .json_body(json!([{"id": "BLOG-001", "is_visible": true}]));
            then.status(200)
                .json_body(json!({"success": true, "imported": 1}));
        });

        let client = test_client(&server.base_url());
        let items = vec![json!({"id": "BLOG-001", "is_visible": true})];
        let result = client.import_blogs(&items).await.unwrap();

        assert_eq!(result.imported, 1);
        mock.assert();
    }

    #[tokio::test]
    async fn import_rejects_empty_payload_before_any_request() {
        let client = test_client("http://127.0.0.1:9");
        let result = client.import_products::<Product>(&[]).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::EmptyPayload))
        ));
    }

    #[tokio::test]
    async fn import_rejects_oversized_batch_before_any_request() {
        let client = test_client("http://127.0.0.1:9");
        let items: Vec<Value> = (0..101).map(|i| json!({"id": format!("PROD-{i}")})).collect();

        let result = client.import_products(&items).await;
        match result {
            Err(Error::Validation(err @ ValidationError::TooManyItems { .. })) => {
                assert_eq!(
                    err.to_string(),
                    "Too many items: 101 provided, maximum is 100"
                );
            },
            other => panic!("expected TooManyItems, found: {other:?}"),
        }
    }

    #[tokio::test]
    async fn import_decodes_empty_body_to_defaults() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/v2/rest/parameters");
            then.status(200);
        });

        let client = test_client(&server.base_url());
        let items = vec![json!({"id": "PARAM-1"})];
        let result = client.import_parameters(&items).await.unwrap();

        assert!(result.success);
        assert_eq!(result.imported, 0);
        mock.assert();
    }

    #[tokio::test]
    async fn get_products_fetches_page() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/products")
                .header("authorization", "Bearer test-token")
                .query_param("page", "1")
                .query_param("per_page", "50");
            then.status(200).json_body(json!({
                "data": [product_json("PROD-001")],
                "meta": {"current_page": 1, "per_page": 50, "total": 1},
            }));
        });

        let client = test_client(&server.base_url());
        let response = client
            .get_products(&ListQuery {
                page: Some(1),
                per_page: Some(50),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].id, "PROD-001");
        assert_eq!(response.current_page, 1);
        assert_eq!(response.total, 1);
        assert!(!response.more_pages());
        mock.assert();
    }

    #[tokio::test]
    async fn get_clamps_per_page_to_ceiling() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/categories")
                .query_param("per_page", "100");
            then.status(200).json_body(json!({"data": []}));
        });

        let client = test_client(&server.base_url());
        let response = client
            .get_categories(&ListQuery {
                per_page: Some(250),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(response.data.is_empty());
        mock.assert();
    }

    #[tokio::test]
    async fn get_serializes_filter_params() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/blogs")
                .query_param("last_update_time_from", "2024-01-02 03:04:05")
                .query_param("is_edited", "true");
            then.status(200).json_body(json!({"data": []}));
        });

        let last_update_from = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
            .and_utc();

        let client = test_client(&server.base_url());
        client
            .get_blogs(&ListQuery {
                last_update_from: Some(last_update_from),
                is_edited: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        mock.assert();
    }

    #[test]
    fn query_omits_absent_params() {
        let query = ListQuery::default();
        assert_eq!(query.to_query_pairs(), vec![]);

        let query = ListQuery {
            is_edited: Some(false),
            ..Default::default()
        };
        assert_eq!(
            query.to_query_pairs(),
            vec![("is_edited", "false".to_string())]
        );
    }

    #[tokio::test]
    async fn unauthorized_response_wins_over_body() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v2/rest/products");
            then.status(401)
                .json_body(json!({"error": "some other message"}));
        });

        let client = test_client(&server.base_url());
        let result = client.get_products(&ListQuery::default()).await;

        match result {
            Err(Error::Api(err @ ApiError::Unauthorized)) => {
                assert_eq!(err.to_string(), "Authorization token required");
                assert_eq!(err.http_code(), Some(401));
            },
            other => panic!("expected Unauthorized, found: {other:?}"),
        }
        mock.assert();
    }

    #[tokio::test]
    async fn server_error_takes_message_from_error_field() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v2/rest/products");
            then.status(500).json_body(json!({"error": "boom"}));
        });

        let client = test_client(&server.base_url());
        let result = client.get_products(&ListQuery::default()).await;

        match result {
            Err(Error::Api(err @ ApiError::Response { .. })) => {
                assert_eq!(err.to_string(), "boom");
                assert_eq!(err.http_code(), Some(500));
            },
            other => panic!("expected Response error, found: {other:?}"),
        }
        mock.assert();
    }

    #[tokio::test]
    async fn non_json_body_is_an_error_on_any_status() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v2/rest/products");
            then.status(200).body("<html>not json</html>");
        });

        let client = test_client(&server.base_url());
        let result = client.get_products(&ListQuery::default()).await;

        match result {
            Err(Error::Api(ApiError::InvalidJson {
                http_code,
                response_body,
            })) => {
                assert_eq!(http_code, 200);
                assert_eq!(response_body, "<html>not json</html>");
            },
            other => panic!("expected InvalidJson, found: {other:?}"),
        }
        mock.assert();
    }

    #[tokio::test]
    async fn stream_yields_all_pages_in_order() {
        let server = MockServer::start_async().await;

        let page_one: Vec<Value> = (0..100).map(|i| product_json(&format!("P-{i}"))).collect();
        let page_two: Vec<Value> = (100..130).map(|i| product_json(&format!("P-{i}"))).collect();

        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/products")
                .query_param("page", "1")
                .query_param("per_page", "100");
            then.status(200).json_body(json!({
                "data": page_one,
                "meta": {"current_page": 1, "per_page": 100, "total": 130},
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/products")
                .query_param("page", "2")
                .query_param("per_page", "100");
            then.status(200).json_body(json!({
                "data": page_two,
                "meta": {"current_page": 2, "per_page": 100, "total": 130},
            }));
        });

        let client = test_client(&server.base_url());
        let products: Vec<Product> = client
            .stream_products(ExportFilter::default())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(products.len(), 130);
        let ids: Vec<String> = products.into_iter().map(|p| p.id).collect();
        let expected: Vec<String> = (0..130).map(|i| format!("P-{i}")).collect();
        assert_eq!(ids, expected);

        first.assert_hits(1);
        second.assert_hits(1);
    }

    #[tokio::test]
    async fn stream_is_lazy_until_first_poll() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v2/rest/blogs");
            then.status(200).json_body(json!({
                "data": [],
                "meta": {"current_page": 1, "per_page": 100, "total": 0},
            }));
        });

        let client = test_client(&server.base_url());
        let stream = client.stream_blogs(ExportFilter::default());
        assert_eq!(mock.hits(), 0);

        let blogs: Vec<Blog> = stream.try_collect().await.unwrap();
        assert!(blogs.is_empty());
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn stream_surfaces_mid_iteration_errors() {
        let server = MockServer::start_async().await;

        let page_one: Vec<Value> = (0..100).map(|i| product_json(&format!("P-{i}"))).collect();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/products")
                .query_param("page", "1");
            then.status(200).json_body(json!({
                "data": page_one,
                "meta": {"current_page": 1, "per_page": 100, "total": 130},
            }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v2/rest/products")
                .query_param("page", "2");
            then.status(500).json_body(json!({"error": "boom"}));
        });

        let client = test_client(&server.base_url());
        let result: Result<Vec<Product>, Error> = client
            .stream_products(ExportFilter::default())
            .try_collect()
            .await;

        match result {
            Err(Error::Api(err)) => assert_eq!(err.to_string(), "boom"),
            other => panic!("expected mid-stream ApiError, found: {other:?}"),
        }
    }
}

//! HTTP request handlers

use super::state::AppState;
use crate::search::{FindError, FindRequest};
use axum::{
    extract::{RawQuery, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Header carrying the number of rows before pagination
pub const TOTAL_COUNT: &str = "x-total-count";

/// Page size of the instances endpoint when `_end` is absent
const DEFAULT_PAGE_END: usize = 10;

/// Query parameters shared by the API endpoints.
///
/// `backend` and `key` may repeat, so the query string is parsed by hand
/// rather than through a serde struct.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApiParams {
    pub filter: String,
    pub backends: Vec<String>,
    pub keys: Vec<String>,
    pub start: usize,
    pub end: Option<usize>,
    pub no_cache: bool,
}

impl ApiParams {
    pub fn parse(query: Option<&str>) -> Result<Self, ApiError> {
        let mut params = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match &*key {
                "filter" => params.filter = value.into_owned(),
                "backend" => params.backends.extend(split_list(&value)),
                "key" => params.keys.extend(split_list(&value)),
                "_start" => params.start = parse_index("_start", &value)?,
                "_end" => params.end = Some(parse_index("_end", &value)?),
                "no_cache" => params.no_cache = matches!(&*value, "" | "1" | "true"),
                _ => {}
            }
        }

        Ok(params)
    }

    fn request(&self) -> FindRequest {
        let mut request = FindRequest::new(&self.filter).with_backends(self.backends.iter().cloned());
        request.no_cache = self.no_cache;
        request
    }

    /// Requested keys, or `defaults` when none were given
    fn keys_or(&self, defaults: Vec<String>) -> Vec<String> {
        if self.keys.is_empty() {
            defaults
        } else {
            self.keys.clone()
        }
    }

    fn memo_key(&self) -> String {
        let mut backends = self.backends.clone();
        backends.sort();
        format!("{}|{}", self.filter, backends.join(","))
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_index(name: &str, value: &str) -> Result<usize, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{} must be a non-negative integer", name)))
}

/// JSON error body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<FindError> for ApiError {
    fn from(err: FindError) -> Self {
        tracing::warn!("Find failed: {}", err);
        Self::bad_request(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Failed to flatten results: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// JSON response with the total row count header
fn with_total<T: Serialize>(total: usize, body: T) -> Response {
    let mut response = Json(body).into_response();
    response
        .headers_mut()
        .insert(HeaderName::from_static(TOTAL_COUNT), HeaderValue::from(total));
    response
}

/// Find and project onto the requested keys
pub async fn search(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let params = ApiParams::parse(query.as_deref())?;
    let printable = state.finder.find(&params.request()).await?;

    let keys = params.keys_or(printable.headers());
    let rows = printable.flatten_data()?.filter(&keys);

    Ok(with_total(rows.len(), rows))
}

/// Paginated find with `raw` always included, memoized per filter and backends
pub async fn instances(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let params = ApiParams::parse(query.as_deref())?;
    let memo_key = params.memo_key();

    let cached = if params.no_cache {
        None
    } else {
        state.responses.get(&memo_key).await
    };

    let data = match cached {
        Some(data) => {
            tracing::debug!("Serving instances for {} from response cache", memo_key);
            data
        }
        None => {
            let printable = state.finder.find(&params.request()).await?;
            let data = Arc::new(printable.flatten_data()?);
            state.responses.set(memo_key, data.clone()).await;
            data
        }
    };

    let mut keys = params.keys_or(crate::results::INSTANCE_FIELDS.iter().map(|f| f.to_string()).collect());
    if !keys.iter().any(|k| k == "raw") {
        keys.push("raw".to_string());
    }

    let rows = data.filter(&keys);
    let total = rows.len();
    let end = params.end.unwrap_or(DEFAULT_PAGE_END).min(total);
    let start = params.start.min(end);
    let page: Vec<Map<String, Value>> = rows.into_iter().skip(start).take(end - start).collect();

    Ok(with_total(total, page))
}

#[derive(Debug, Serialize)]
struct BackendEntry<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

/// Configured sections with a type, then every registered backend
pub async fn backends(State(state): State<AppState>) -> Response {
    let mut entries: Vec<BackendEntry> = state
        .settings()
        .typed_sections()
        .map(|(name, kind)| BackendEntry { id: name, name, kind })
        .collect();

    entries.extend(state.registry().iter().map(|descriptor| BackendEntry {
        id: &descriptor.name,
        name: &descriptor.name,
        kind: &descriptor.name,
    }));

    with_total(entries.len(), entries)
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Backend, BackendDescriptor, BackendRegistry};
    use crate::config::{ConfigResolver, Settings};
    use crate::network::HttpClient;
    use crate::results::{Instance, Printable};
    use crate::search::Finder;
    use crate::web::create_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    struct Fleet {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Backend for Fleet {
        fn name(&self) -> &str {
            "fleet"
        }

        async fn list(&self, pattern: &str, _cancel: &CancellationToken) -> anyhow::Result<Printable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..15)
                .map(|i| {
                    Instance::new("fleet", format!("i-{:02}", i), format!("{}-{}", pattern, i))
                        .with_status("running")
                        .with_raw(json!({"zone": "eu-1"}))
                })
                .collect())
        }
    }

    fn app(yaml: &str) -> (axum::Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut registry = BackendRegistry::new();
        registry
            .register(BackendDescriptor::new("fleet", move |_, _| {
                Ok(Box::new(Fleet { calls: counter.clone() }))
            }))
            .unwrap();

        let settings = Arc::new(Settings::from_yaml(yaml).unwrap());
        let resolver = ConfigResolver::with_env(settings, |_| None);
        let finder = Finder::new(Arc::new(registry), resolver, HttpClient::new().unwrap());

        (create_router(AppState::new(finder)), calls)
    }

    async fn get(router: axum::Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let total = response
            .headers()
            .get(TOTAL_COUNT)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, total, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_parse_params() {
        let params = ApiParams::parse(Some("filter=web&backend=a,b&backend=c&key=id&key=name&_start=2&_end=5")).unwrap();
        assert_eq!(params.filter, "web");
        assert_eq!(params.backends, vec!["a", "b", "c"]);
        assert_eq!(params.keys, vec!["id", "name"]);
        assert_eq!(params.start, 2);
        assert_eq!(params.end, Some(5));
        assert!(!params.no_cache);

        assert!(ApiParams::parse(Some("_start=-1")).is_err());
        assert_eq!(ApiParams::parse(None).unwrap(), ApiParams::default());
    }

    #[tokio::test]
    async fn test_search_projects_keys() {
        let (router, _) = app("{}");
        let (status, total, body) = get(router, "/api/search?filter=web&backend=fleet&key=id&key=zone").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(total.as_deref(), Some("15"));
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0]["id"], json!("i-00"));
        assert_eq!(rows[0]["zone"], Value::Null);
        assert_eq!(rows[0].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_defaults_to_headers() {
        let (router, _) = app("{}");
        let (_, _, body) = get(router, "/api/search?filter=web&backend=fleet").await;

        let row = body[0].as_object().unwrap();
        assert!(row.contains_key("backend_name"));
        assert!(!row.contains_key("raw"));
    }

    #[tokio::test]
    async fn test_search_errors_are_bad_requests() {
        let (router, _) = app("{}");
        let (status, _, body) = get(router.clone(), "/api/search?filter=web&backend=nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("nope"));

        let (status, _, _) = get(router, "/api/search?filter=web").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_instances_paginates_and_memoizes() {
        let (router, calls) = app("{}");

        let (status, total, body) = get(router.clone(), "/api/instances?filter=web&backend=fleet").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(total.as_deref(), Some("15"));
        assert_eq!(body.as_array().unwrap().len(), DEFAULT_PAGE_END);
        assert_eq!(body[0]["raw"]["zone"], json!("eu-1"));

        let (_, total, body) = get(router, "/api/instances?filter=web&backend=fleet&_start=10&_end=20").await;
        assert_eq!(total.as_deref(), Some("15"));
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["id"], json!("i-10"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backends_lists_sections_then_registry() {
        let (router, _) = app("backends:\n  fleet-eu:\n    type: fleet\n  plain:\n    token: x\n");
        let (status, total, body) = get(router, "/api/backends").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(total.as_deref(), Some("2"));
        assert_eq!(body[0], json!({"id": "fleet-eu", "name": "fleet-eu", "type": "fleet"}));
        assert_eq!(body[1], json!({"id": "fleet", "name": "fleet", "type": "fleet"}));
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app("{}");
        let (status, _, body) = get(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
    }
}

//! HTTP tests for the browser routes.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use indexbrowser::api::ApiServer;
use indexbrowser::config::Config;
use indexbrowser::{MemoryBackend, ResultsBrowser};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const SECURE: &str = r#"
[browser]
mount_path = "/"

[search]
search_engine = "solr"

[security]
enabled = true

[[security.api_keys]]
key = "root-key"
name = "ops"
superuser = true

[[security.api_keys]]
key = "staff-key"
name = "staff"
"#;

fn app(toml: &str) -> Router {
    let config = Config::from_toml(toml).unwrap();
    let browser =
        ResultsBrowser::from_config(&config, Arc::new(MemoryBackend::sample())).unwrap();
    ApiServer::new(browser, &config).router()
}

async fn get(app: Router, uri: &str, key: Option<&str>) -> (StatusCode, Option<String>, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(key) = key {
        request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, location, body)
}

#[tokio::test]
async fn test_index_requires_superuser() {
    let (status, _, _) = get(app(SECURE), "/?models=blog.post", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = get(app(SECURE), "/?models=blog.post", Some("bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = get(app(SECURE), "/?models=blog.post", Some("staff-key")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "permission_denied");
}

#[tokio::test]
async fn test_index_renders_json_context() {
    let (status, _, body) = get(
        app(SECURE),
        "/?models=blog.post&possible_facets=author",
        Some("root-key"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result_count"], 5);
    assert_eq!(body["page_num"], 1);
    assert_eq!(body["version"], "V1");
    assert_eq!(body["search_var"], "q");
    assert_eq!(body["page_var"], "p");
    assert_eq!(body["facets"]["fields"]["author"][0]["value"], "ann");
    assert_eq!(body["results"][0]["detail_url"], "/blog.post/1/");
}

#[tokio::test]
async fn test_index_redirect_is_found() {
    let (status, location, _) = get(app(SECURE), "/?q=rust", Some("root-key")).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    assert!(location.starts_with("/?q=rust&p=0&models="));
    assert!(location.contains("models=blog.post"));
}

#[tokio::test]
async fn test_invalid_page_is_not_found() {
    let (status, _, body) = get(app(SECURE), "/?models=blog.post&p=40", Some("root-key")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"]["type"], "invalid_page");
}

#[tokio::test]
async fn test_detail_routes() {
    let (status, _, body) = get(app(SECURE), "/blog.post/2/", Some("root-key")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["original"]["pk"], "2");
    assert_eq!(body["original"]["stored_fields"]["title"]["raw"], "Rust ownership");
    assert_eq!(body["title"], "View stored data for this post");

    let (status, _, body) = get(app(SECURE), "/blog.post/99/", Some("root-key")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let reason = body["error"]["reason"].as_str().unwrap();
    assert!(reason.contains("(\"blog.post\", \"99\")"));
}

#[tokio::test]
async fn test_object_lookup_route() {
    let (status, _, body) = get(app(SECURE), "/_object/blog/comment/1", Some("root-key")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["content_type"], "blog.comment");

    let (status, _, body) = get(app(SECURE), "/_object/blog/comment/9", Some("root-key")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"].is_null());
}

#[tokio::test]
async fn test_security_disabled_serves_local_superuser() {
    let (status, _, _) = get(app("[browser]\nmount_path = \"/\""), "/?models=blog.post", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_detail_pk_with_encoded_slash() {
    let (status, _, body) = get(app(SECURE), "/blog.post/2024%2F01/", Some("root-key")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let reason = body["error"]["reason"].as_str().unwrap();
    assert!(reason.contains("(\"blog.post\", \"2024/01\")"));
}

#[tokio::test]
async fn test_mount_under_health_prefix_requires_key() {
    let config = SECURE.replace("mount_path = \"/\"", "mount_path = \"/health-index/\"");
    let (status, _, _) = get(app(&config), "/health-index/?models=blog.post", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = get(app(&config), "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

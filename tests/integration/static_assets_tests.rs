//! Static asset integration tests.
//!
//! Tests for CSS, JS, and favicon served from the embedded frontend

use crate::common::test_server;
use axum::http::{HeaderValue, StatusCode, header};

#[tokio::test]
async fn test_css_served() {
    let (server, _backend) = test_server().await;

    let response = server.get("/style.css").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), "text/css");
    assert_eq!(response.header("cache-control"), "no-cache");
    assert!(response.text().contains(".snackbar"));
}

#[tokio::test]
async fn test_js_served() {
    let (server, _backend) = test_server().await;

    let response = server.get("/app.js").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("content-type"), "application/javascript");
    assert!(response.text().contains("data-add-step"));
}

#[tokio::test]
async fn test_favicon_served_on_both_paths() {
    let (server, _backend) = test_server().await;

    for path in ["/favicon.svg", "/favicon.ico"] {
        let response = server.get(path).await;
        assert_eq!(response.status_code(), StatusCode::OK, "{}", path);
        assert_eq!(response.header("content-type"), "image/svg+xml");
    }
}

#[tokio::test]
async fn test_etag_revalidation() {
    let (server, _backend) = test_server().await;

    let first = server.get("/style.css").await;
    let etag = first.header("etag");

    let second = server
        .get("/style.css")
        .add_header(header::IF_NONE_MATCH, etag)
        .await;
    assert_eq!(second.status_code(), StatusCode::NOT_MODIFIED);

    let stale = server
        .get("/style.css")
        .add_header(header::IF_NONE_MATCH, HeaderValue::from_static("\"0.0.0-0\""))
        .await;
    assert_eq!(stale.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_etag_revalidation_accepts_weak_tag_lists() {
    let (server, _backend) = test_server().await;

    let etag = server.get("/app.js").await.header("etag");
    let etag = etag.to_str().unwrap();

    let listed = HeaderValue::from_str(&format!("\"other\", W/{}", etag)).unwrap();
    let response = server
        .get("/app.js")
        .add_header(header::IF_NONE_MATCH, listed)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_MODIFIED);

    let any = server
        .get("/app.js")
        .add_header(header::IF_NONE_MATCH, HeaderValue::from_static("*"))
        .await;
    assert_eq!(any.status_code(), StatusCode::NOT_MODIFIED);
}

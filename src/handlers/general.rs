use axum::{
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use include_dir::{Dir, include_dir};
use sha2::{Digest, Sha256};

// Embed static assets at compile time
static PUBLIC: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/frontend/public");

pub async fn health_check() -> &'static str {
    "OK"
}

/// Strong validator for an embedded file: a digest of its bytes.
fn etag(contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = format!("{:x}", hasher.finalize());
    format!("\"{}\"", &digest[..32])
}

/// `If-None-Match` is a comma-separated list of entity tags, possibly weak,
/// or `*`. Comparison is weak, as RFC 9110 requires for this header.
fn etag_matches(if_none_match: &str, tag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == tag
    })
}

fn serve_asset(name: &str, content_type: &'static str, headers: &HeaderMap) -> Response {
    let Some(file) = PUBLIC.get_file(name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let contents = file.contents();
    let tag = etag(contents);

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(if_none_match) = if_none_match.to_str()
        && etag_matches(if_none_match, &tag)
    {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::ETAG, tag),
        ],
        contents,
    )
        .into_response()
}

pub async fn serve_css(headers: HeaderMap) -> Response {
    serve_asset("style.css", "text/css", &headers)
}

pub async fn serve_js(headers: HeaderMap) -> Response {
    serve_asset("app.js", "application/javascript", &headers)
}

pub async fn serve_favicon(headers: HeaderMap) -> Response {
    serve_asset("favicon.svg", "image/svg+xml", &headers)
}

use std::path::Path;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;

/// The UI bundle is fetched once per session; nothing along the way may
/// cache it.
const CACHE_NEVER: &str = "no-cache, no-store, must-revalidate";

#[derive(Debug, thiserror::Error)]
pub enum StaticResponseError {
    #[error("static file '{0}' was not found")]
    NotFound(String),
    #[error("static file read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid content type '{0}'")]
    InvalidHeader(String),
}

/// Normalizes a requested path into a root-relative one, rejecting anything
/// that could escape the asset root. This is the sole injection-safety
/// boundary for file serving.
pub fn normalize_asset_path(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let mut normalized_parts = Vec::new();
    for part in trimmed.split(['/', '\\']) {
        let segment = part.trim();
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        normalized_parts.push(segment);
    }

    Some(normalized_parts.join("/"))
}

/// Serves one file from the asset root. Directories are never listed and
/// traversal attempts report as not-found.
pub async fn serve_asset(root: &Path, requested: &str) -> Result<Response, StaticResponseError> {
    let relative = normalize_asset_path(requested)
        .ok_or_else(|| StaticResponseError::NotFound(requested.to_string()))?;

    let file_path = root.join(&relative);
    if !file_path.is_file() {
        return Err(StaticResponseError::NotFound(relative));
    }

    let bytes = tokio::fs::read(&file_path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StaticResponseError::NotFound(relative.clone())
        } else {
            StaticResponseError::Io(source)
        }
    })?;

    let content_type = mime_guess::from_path(&file_path).first_or_octet_stream();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .map_err(|_| StaticResponseError::InvalidHeader(content_type.to_string()))?,
    );
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_NEVER));
    response
        .headers_mut()
        .insert(PRAGMA, HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert(EXPIRES, HeaderValue::from_static("0"));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_segments_are_rejected() {
        assert_eq!(normalize_asset_path("/../../etc/passwd"), None);
        assert_eq!(normalize_asset_path("assets/../secret"), None);
        assert_eq!(normalize_asset_path("..\\windows\\system32"), None);
        assert_eq!(normalize_asset_path("/"), None);
        assert_eq!(normalize_asset_path("  "), None);
    }

    #[test]
    fn plain_paths_normalize() {
        assert_eq!(
            normalize_asset_path("/assets/app.js").as_deref(),
            Some("assets/app.js")
        );
        assert_eq!(normalize_asset_path("index.html").as_deref(), Some("index.html"));
    }

    #[tokio::test]
    async fn serves_file_with_mime_and_no_cache_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let response = serve_asset(dir.path(), "/index.html").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/html"
        );
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }

    #[tokio::test]
    async fn unknown_extension_defaults_to_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.weird"), b"\x00\x01").unwrap();

        let response = serve_asset(dir.path(), "blob.weird").await.unwrap();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn directories_and_escapes_report_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert!(matches!(
            serve_asset(dir.path(), "nested").await,
            Err(StaticResponseError::NotFound(_))
        ));
        assert!(matches!(
            serve_asset(dir.path(), "../outside.txt").await,
            Err(StaticResponseError::NotFound(_))
        ));
        assert!(matches!(
            serve_asset(dir.path(), "missing.html").await,
            Err(StaticResponseError::NotFound(_))
        ));
    }
}

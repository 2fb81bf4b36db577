//! Publication serving routes
//!
//! Serves the manifest JSON and byte-ranged resources of bound publications:
//!
//! - `GET /{prefix}/manifest.json` — the Web Publication manifest
//! - `GET /{prefix}/{path}` — resource bytes, honoring `Range` headers
//!
//! Publication resources are immutable for the lifetime of a binding, so
//! successful responses allow client-side caching for two hours.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

const MANIFEST_MEDIA_TYPE: &str = "application/webpub+json; charset=utf-8";
const CACHE_CONTROL_VALUE: &str = "public, max-age=7200";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:prefix/manifest.json", get(manifest))
        .route("/:prefix/*path", get(resource))
}

/// Serve the manifest of a bound publication
async fn manifest(State(state): State<AppState>, Path(prefix): Path<String>) -> Result<Response> {
    let binding = state
        .publications()
        .binding(&prefix)
        .await
        .ok_or_else(|| AppError::ResourceNotFound(format!("/{prefix}/manifest.json")))?;

    let body = serde_json::to_vec(&binding.manifest)
        .map_err(|e| AppError::Fetch(format!("manifest serialization failed: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, MANIFEST_MEDIA_TYPE)
        .header(header::CACHE_CONTROL, CACHE_CONTROL_VALUE)
        .body(Body::from(body))
        .map_err(|e| AppError::Fetch(e.to_string()))
}

/// Serve a publication resource, honoring a single-span `Range` header
async fn resource(
    State(state): State<AppState>,
    Path((prefix, path)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let binding = state
        .publications()
        .binding(&prefix)
        .await
        .ok_or_else(|| AppError::ResourceNotFound(format!("/{prefix}/{path}")))?;

    let href = format!("/{}", path.trim_start_matches('/'));
    let media_type = binding
        .manifest
        .link_with_href(&href)
        .and_then(|link| link.media_type.clone())
        .or_else(|| mime_guess::from_path(&href).first_raw().map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    // The binding Arc is cloned out of the registry already; reads below
    // never hold the registry lock.
    let fetcher = Arc::clone(&binding.fetcher);

    match parse_range(&headers) {
        None => {
            let read_href = href.clone();
            let data = tokio::task::spawn_blocking(move || fetcher.read(&read_href, None))
                .await
                .map_err(|e| AppError::Fetch(format!("fetch task panicked: {e}")))??;
            resource_response(StatusCode::OK, &media_type, None, data)
        }
        Some(requested) => {
            let read_href = href.clone();
            let (data, start, total) = tokio::task::spawn_blocking(move || {
                let total = fetcher.length(&read_href)?;
                let (start, end) = requested.resolve(total).ok_or_else(|| {
                    AppError::Fetch(format!(
                        "unsatisfiable range {requested:?} for {read_href} ({total} bytes)"
                    ))
                })?;
                let data = fetcher.read(&read_href, Some(start..end))?;
                Ok::<_, AppError>((data, start, total))
            })
            .await
            .map_err(|e| AppError::Fetch(format!("fetch task panicked: {e}")))??;

            let end = start + data.len() as u64 - 1;
            let content_range = format!("bytes {start}-{end}/{total}");
            resource_response(
                StatusCode::PARTIAL_CONTENT,
                &media_type,
                Some(content_range),
                data,
            )
        }
    }
}

fn resource_response(
    status: StatusCode,
    media_type: &str,
    content_range: Option<String>,
    data: Vec<u8>,
) -> Result<Response> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, media_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CACHE_CONTROL, CACHE_CONTROL_VALUE);
    if let Some(content_range) = content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }
    builder
        .body(Body::from(data))
        .map_err(|e| AppError::Fetch(e.to_string()))
}

/// A single byte span requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestedRange {
    /// `bytes=s-e`, inclusive on both ends.
    Bounded(u64, u64),
    /// `bytes=s-`, from an offset to the end.
    From(u64),
    /// `bytes=-n`, the last `n` bytes.
    Suffix(u64),
}

impl RequestedRange {
    /// Turn the request into a half-open `start..end` against a resource of
    /// `total` bytes. `None` when the span starts past the end.
    fn resolve(self, total: u64) -> Option<(u64, u64)> {
        let (start, end) = match self {
            RequestedRange::Bounded(start, end) => (start, end.saturating_add(1).min(total)),
            RequestedRange::From(start) => (start, total),
            RequestedRange::Suffix(n) => (total.saturating_sub(n), total),
        };
        (start < total).then_some((start, end))
    }
}

/// Parse a `Range` header. Unparsable or multi-span headers are ignored,
/// falling back to a full 200 response.
fn parse_range(headers: &HeaderMap) -> Option<RequestedRange> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?.trim();
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    match (start.trim(), end.trim()) {
        ("", suffix) => suffix.parse().ok().map(RequestedRange::Suffix),
        (start, "") => start.parse().ok().map(RequestedRange::From),
        (start, end) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            (start <= end).then_some(RequestedRange::Bounded(start, end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, value.parse().unwrap());
        headers
    }

    #[test]
    fn parses_the_three_range_forms() {
        assert_eq!(
            parse_range(&range_headers("bytes=0-499")),
            Some(RequestedRange::Bounded(0, 499))
        );
        assert_eq!(
            parse_range(&range_headers("bytes=500-")),
            Some(RequestedRange::From(500))
        );
        assert_eq!(
            parse_range(&range_headers("bytes=-200")),
            Some(RequestedRange::Suffix(200))
        );
    }

    #[test]
    fn malformed_or_multi_span_ranges_are_ignored() {
        assert_eq!(parse_range(&HeaderMap::new()), None);
        assert_eq!(parse_range(&range_headers("bytes=5-2")), None);
        assert_eq!(parse_range(&range_headers("bytes=abc-def")), None);
        assert_eq!(parse_range(&range_headers("bytes=0-1,5-9")), None);
        assert_eq!(parse_range(&range_headers("items=0-5")), None);
    }

    #[test]
    fn resolve_clamps_to_the_resource_length() {
        assert_eq!(RequestedRange::Bounded(2, 5).resolve(10), Some((2, 6)));
        assert_eq!(RequestedRange::Bounded(2, 500).resolve(10), Some((2, 10)));
        assert_eq!(RequestedRange::From(7).resolve(10), Some((7, 10)));
        assert_eq!(RequestedRange::Suffix(3).resolve(10), Some((7, 10)));
        assert_eq!(RequestedRange::Suffix(300).resolve(10), Some((0, 10)));
        assert_eq!(RequestedRange::Bounded(10, 12).resolve(10), None);
        assert_eq!(RequestedRange::Suffix(0).resolve(10), None);
    }
}

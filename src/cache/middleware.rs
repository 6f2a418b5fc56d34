//! Rendered-page cache middleware.
//!
//! Caches successful GET responses on the routes it wraps. Non-GET requests
//! pass straight through and deliberately do not invalidate anything: stale
//! pages are served until TTL expiry or an explicit flush.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, instrument};

use super::{
    CacheConfig, PageStore,
    store::{CachedPage, PageKey},
};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub store: Arc<PageStore>,
}

/// Middleware for rendered-page caching.
///
/// Only caches GET requests that return 200 OK.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.is_enabled() {
        return next.run(request).await;
    }

    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("");
    let key = PageKey::new(path, query);

    if let Some(cached) = cache.store.get(&key) {
        counter!("yatube_cache_hit_total").increment(1);
        debug!(outcome = "hit", "serving cached page");
        return build_response(cached);
    }

    counter!("yatube_cache_miss_total").increment(1);
    debug!(outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;

    if response.status() == StatusCode::OK {
        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(error = %err, "failed to read response body, dropping it");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        // Oversize pages are served as rendered, just never cached.
        if bytes.len() <= MAX_CACHED_BODY_BYTES {
            let cached = CachedPage::new(
                parts.status.as_u16(),
                parts
                    .headers
                    .iter()
                    .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
                    .collect(),
                bytes.clone(),
            );

            if cache.store.set(key, cached).is_some() {
                counter!("yatube_cache_evict_total").increment(1);
            }
        } else {
            debug!(
                body_bytes = bytes.len(),
                "response exceeds cacheable size, serving uncached"
            );
        }

        Response::from_parts(parts, Body::from(bytes))
    } else {
        response
    }
}

/// Build a response from cached data.
fn build_response(cached: CachedPage) -> Response {
    use axum::http::HeaderValue;

    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

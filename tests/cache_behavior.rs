mod support;

use axum::http::{Method, Request, StatusCode, header};

use support::{MultipartField, TestApp, body_string, get_request, multipart_request};

fn flush_request() -> Request<axum::body::Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/cache/flush")
        .body(axum::body::Body::empty())
        .expect("request built")
}

#[tokio::test]
async fn homepage_stays_stale_across_writes_until_flushed() {
    let app = TestApp::spawn(true);
    let session = app.signup("leo").await;

    let first = app.send(get_request("/", None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = body_string(first).await;
    assert!(!first_body.contains("Свежая запись"));

    // A write lands in the store but must not touch the cached page.
    app.seed_post(&session.user, "Свежая запись").await;
    assert_eq!(app.store.posts_len(), 1);

    let second = app.send(get_request("/", None)).await;
    let second_body = body_string(second).await;
    assert_eq!(second_body, first_body);

    let flushed = app.send_admin(flush_request()).await;
    assert_eq!(flushed.status(), StatusCode::NO_CONTENT);

    let third = app.send(get_request("/", None)).await;
    let third_body = body_string(third).await;
    assert!(third_body.contains("Свежая запись"));
}

#[tokio::test]
async fn post_creation_through_the_form_does_not_invalidate() {
    let app = TestApp::spawn(true);
    let session = app.signup("leo").await;

    let before = body_string(app.send(get_request("/", None)).await).await;

    let request = multipart_request(
        "/new/",
        vec![MultipartField::text("text", "Новая запись")],
        Some(&session.cookie),
    );
    let created = app.send(request).await;
    assert_eq!(created.status(), StatusCode::SEE_OTHER);

    let after = body_string(app.send(get_request("/", None)).await).await;
    assert_eq!(after, before);
}

#[tokio::test]
async fn other_pages_are_never_cached() {
    let app = TestApp::spawn(true);
    let session = app.signup("leo").await;

    let profile_before = body_string(app.send(get_request("/leo/", None)).await).await;
    assert!(!profile_before.contains("Запись в профиле"));

    app.seed_post(&session.user, "Запись в профиле").await;

    let profile_after = body_string(app.send(get_request("/leo/", None)).await).await;
    assert!(profile_after.contains("Запись в профиле"));
}

#[tokio::test]
async fn distinct_query_strings_are_distinct_cache_entries() {
    let app = TestApp::spawn(true);

    let bare = app.send(get_request("/", None)).await;
    assert_eq!(bare.status(), StatusCode::OK);
    let paged = app.send(get_request("/?page=1", None)).await;
    assert_eq!(paged.status(), StatusCode::OK);

    let metrics = app.send_admin(get_request("/metrics", None)).await;
    let body = body_string(metrics).await;
    let parsed: serde_json::Value = serde_json::from_str(&body).expect("metrics json");
    assert_eq!(parsed["cached_pages"], 2);
}

#[tokio::test]
async fn oversized_homepage_is_served_fresh_and_never_cached() {
    let app = TestApp::spawn(true);
    let session = app.signup("leo").await;
    app.seed_post(&session.user, &"я".repeat(1_100_000)).await;

    let first = app.send(get_request("/", None)).await;
    assert_eq!(first.status(), StatusCode::OK);

    let metrics = app.send_admin(get_request("/metrics", None)).await;
    let body = body_string(metrics).await;
    let parsed: serde_json::Value = serde_json::from_str(&body).expect("metrics json");
    assert_eq!(parsed["cached_pages"], 0);

    // Still a miss on every request, but never a failure.
    let second = app.send(get_request("/", None)).await;
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_cache_serves_fresh_pages() {
    let app = TestApp::spawn(false);
    let session = app.signup("leo").await;

    let before = body_string(app.send(get_request("/", None)).await).await;
    assert!(!before.contains("Сразу видно"));

    app.seed_post(&session.user, "Сразу видно").await;

    let after = body_string(app.send(get_request("/", None)).await).await;
    assert!(after.contains("Сразу видно"));
}

#[tokio::test]
async fn flush_without_a_cache_still_succeeds() {
    let app = TestApp::spawn(false);

    let response = app.send_admin(flush_request()).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn cached_pages_keep_their_content_type() {
    let app = TestApp::spawn(true);

    app.send(get_request("/", None)).await;
    let cached = app.send(get_request("/", None)).await;

    let content_type = cached
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
}

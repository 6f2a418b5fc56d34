mod support;

use axum::http::StatusCode;

use support::{TestApp, body_string, form_request, get_request, location_header};

#[tokio::test]
async fn following_twice_leaves_a_single_edge() {
    let app = TestApp::spawn(false);
    let reader = app.signup("sofia").await;
    app.signup("leo").await;

    for _ in 0..2 {
        let response = app
            .send(form_request("/leo/follow/", "", Some(&reader.cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location_header(&response), "/leo/");
    }

    assert_eq!(app.store.follows_len(), 1);
}

#[tokio::test]
async fn self_follow_is_rejected_without_creating_an_edge() {
    let app = TestApp::spawn(false);
    let session = app.signup("leo").await;

    let response = app
        .send(form_request("/leo/follow/", "", Some(&session.cookie)))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_header(&response), "/leo/");
    assert_eq!(app.store.follows_len(), 0);
}

#[tokio::test]
async fn anonymous_follow_redirects_to_login() {
    let app = TestApp::spawn(false);
    app.signup("leo").await;

    let response = app.send(form_request("/leo/follow/", "", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_header(&response), "/auth/login/?next=/leo/follow/");
    assert_eq!(app.store.follows_len(), 0);
}

#[tokio::test]
async fn following_an_unknown_author_renders_not_found() {
    let app = TestApp::spawn(false);
    let session = app.signup("sofia").await;

    let response = app
        .send(form_request("/nobody/follow/", "", Some(&session.cookie)))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_is_empty_without_subscriptions() {
    let app = TestApp::spawn(false);
    let reader = app.signup("sofia").await;
    let author = app.signup("leo").await;
    app.seed_post(&author.user, "Запись без подписчиков").await;

    let response = app
        .send(get_request("/follow/", Some(&reader.cookie)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(!body.contains("Запись без подписчиков"));
}

#[tokio::test]
async fn feed_shows_posts_from_followed_authors_only() {
    let app = TestApp::spawn(false);
    let reader = app.signup("sofia").await;
    let followed = app.signup("leo").await;
    let ignored = app.signup("fyodor").await;
    app.seed_post(&followed.user, "Запись Льва").await;
    app.seed_post(&ignored.user, "Запись Фёдора").await;

    app.send(form_request("/leo/follow/", "", Some(&reader.cookie)))
        .await;

    let response = app
        .send(get_request("/follow/", Some(&reader.cookie)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Запись Льва"));
    assert!(!body.contains("Запись Фёдора"));
}

#[tokio::test]
async fn unfollow_removes_the_edge_and_empties_the_feed() {
    let app = TestApp::spawn(false);
    let reader = app.signup("sofia").await;
    let author = app.signup("leo").await;
    app.seed_post(&author.user, "Запись Льва").await;

    app.send(form_request("/leo/follow/", "", Some(&reader.cookie)))
        .await;
    assert_eq!(app.store.follows_len(), 1);

    let response = app
        .send(form_request("/leo/unfollow/", "", Some(&reader.cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.follows_len(), 0);

    let feed = app
        .send(get_request("/follow/", Some(&reader.cookie)))
        .await;
    let body = body_string(feed).await;
    assert!(!body.contains("Запись Льва"));
}

#[tokio::test]
async fn unfollow_without_an_edge_is_a_noop() {
    let app = TestApp::spawn(false);
    let reader = app.signup("sofia").await;
    app.signup("leo").await;

    let response = app
        .send(form_request("/leo/unfollow/", "", Some(&reader.cookie)))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.store.follows_len(), 0);
}

#[tokio::test]
async fn anonymous_feed_redirects_to_login() {
    let app = TestApp::spawn(false);

    let response = app.send(get_request("/follow/", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_header(&response), "/auth/login/?next=/follow/");
}

#[tokio::test]
async fn profile_shows_subscription_state() {
    let app = TestApp::spawn(false);
    let reader = app.signup("sofia").await;
    app.signup("leo").await;

    let before = app.send(get_request("/leo/", Some(&reader.cookie))).await;
    let body = body_string(before).await;
    assert!(body.contains("Подписаться"));

    app.send(form_request("/leo/follow/", "", Some(&reader.cookie)))
        .await;

    let after = app.send(get_request("/leo/", Some(&reader.cookie))).await;
    let body = body_string(after).await;
    assert!(body.contains("Отписаться"));
}

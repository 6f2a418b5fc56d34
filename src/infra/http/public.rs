use std::{collections::HashMap, io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        auth::{AuthService, SESSION_COOKIE, SessionUser},
        comments::CommentService,
        error::HttpError,
        feed::FeedService,
        follows::FollowService,
        posts::PostService,
        repos::{GroupsRepo, HealthRepo},
    },
    cache::{CacheState, page_cache_layer},
    domain::entities::UserRecord,
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FeedPageContext, FollowTemplate, GroupPageContext, GroupTemplate, IndexTemplate,
        LayoutContext, PostCard, PostPageContext, PostTemplate, ProfilePageContext,
        ProfileTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    auth as auth_routes, comments as comment_routes, db_health_response, follows as follow_routes,
    middleware::{log_responses, set_request_context},
    posts as post_routes,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub groups: Arc<dyn GroupsRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: Option<CacheState>,
    pub upload_limit_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // The homepage is the only cached route. Writes never invalidate it;
    // staleness is bounded by the TTL and the admin flush endpoint.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
    } else {
        cached_routes
    };

    let upload_limit = state.upload_limit_bytes;

    cached_routes
        .route("/follow/", get(follow_index))
        .route("/group/{slug}/", get(group_index))
        .merge(post_routes::router(upload_limit))
        .merge(auth_routes::router())
        .route("/{username}/", get(profile))
        .route("/{username}/{post_id}/", get(post_detail))
        .route(
            "/{username}/{post_id}/comment/",
            post(comment_routes::add_comment),
        )
        .route("/{username}/follow/", post(follow_routes::follow_author))
        .route(
            "/{username}/unfollow/",
            post(follow_routes::unfollow_author),
        )
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(public_health))
        .fallback(fallback_404)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Session principal from the cookie jar, without touching the database.
pub(super) fn session_viewer(state: &HttpState, jar: &CookieJar) -> Option<SessionUser> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| state.auth.session_user(cookie.value()))
}

/// Full user record behind the session cookie, for handlers that write.
pub(super) async fn current_viewer(
    state: &HttpState,
    jar: &CookieJar,
) -> Result<Option<UserRecord>, HttpError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    state.auth.current_user(cookie.value()).await.map_err(|err| {
        HttpError::from_error(
            "infra::http::public::current_viewer",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            &err,
        )
    })
}

pub(super) fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("/auth/login/?next={next}")).into_response()
}

fn page_param(query: &HashMap<String, String>) -> Option<&str> {
    query.get("page").map(String::as_str)
}

async fn index(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let viewer = session_viewer(&state, &jar);

    match state.feed.index_page(page_param(&query)).await {
        Ok(paged) => {
            let content = FeedPageContext::new(paged, "/");
            let view = LayoutContext::new("Последние обновления", viewer, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn group_index(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let viewer = session_viewer(&state, &jar);

    match state.feed.group_page(&slug, page_param(&query)).await {
        Ok(Some((group, paged))) => {
            let base_path = format!("/group/{}/", group.slug);
            let paginator =
                crate::presentation::views::PaginatorView::from_paged(&paged, base_path);
            let content = GroupPageContext {
                title: group.title.clone(),
                slug: group.slug,
                description: group.description,
                posts: paged.items.into_iter().map(PostCard::from).collect(),
                paginator,
            };
            let view = LayoutContext::new(group.title, viewer, content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path(username): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let viewer = session_viewer(&state, &jar);
    let viewer_id = viewer.as_ref().map(|session| session.id);

    match state
        .feed
        .profile_page(&username, viewer_id, page_param(&query))
        .await
    {
        Ok(Some(feed)) => {
            let base_path = format!("/{}/", feed.author.username);
            let paginator =
                crate::presentation::views::PaginatorView::from_paged(&feed.posts, base_path);
            let content = ProfilePageContext {
                author_username: feed.author.username.clone(),
                post_count: feed.posts.total,
                posts: feed.posts.items.into_iter().map(PostCard::from).collect(),
                paginator,
                show_follow_button: viewer.is_some() && !feed.viewer_is_author,
                subscribed: feed.subscribed,
            };
            let title = format!("Профайл пользователя {}", feed.author.username);
            let view = LayoutContext::new(title, viewer, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    jar: CookieJar,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let viewer = session_viewer(&state, &jar);
    let Ok(post_id) = post_id.parse::<Uuid>() else {
        return render_not_found_response(viewer);
    };

    match state.feed.post_detail(&username, post_id).await {
        Ok(Some(detail)) => {
            let viewer_can_edit = viewer
                .as_ref()
                .is_some_and(|session| session.id == detail.author.id);
            let content = PostPageContext {
                post: PostCard::from(detail.post),
                author_username: detail.author.username,
                author_post_count: detail.author_post_count,
                comments: detail.comments.into_iter().map(Into::into).collect(),
                viewer_can_edit,
                viewer_can_comment: viewer.is_some(),
            };
            let title = format!("Запись {}", username);
            let view = LayoutContext::new(title, viewer, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(viewer),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some(viewer) = session_viewer(&state, &jar) else {
        return login_redirect("/follow/");
    };

    match state.feed.follow_page(viewer.id, page_param(&query)).await {
        Ok(paged) => {
            let content = FeedPageContext::new(paged, "/follow/");
            let view = LayoutContext::new("Избранные авторы", Some(viewer), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback_404(State(state): State<HttpState>, jar: CookieJar) -> Response {
    let viewer = session_viewer(&state, &jar);
    render_not_found_response(viewer)
}

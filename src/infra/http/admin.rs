//! Administrative surface, served on its own listener.
//!
//! Listing panels for every entity, group creation, the explicit page-cache
//! flush, a health probe, and a small JSON metrics endpoint.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Form, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    application::{
        pagination::{PageRequest, Paged},
        repos::{
            CommentQueryFilter, CommentsRepo, CreateGroupParams, FollowsRepo, GroupsRepo,
            HealthRepo, PostQueryFilter, PostsRepo, RepoError, UsersRepo,
        },
    },
    cache::CacheState,
    domain::slug::{SlugError, derive_slug, validate_slug},
    presentation::{
        admin::{
            AdminCommentRow, AdminCommentsContext, AdminCommentsTemplate, AdminDashboardContext,
            AdminDashboardTemplate, AdminFollowRow, AdminFollowsContext, AdminFollowsTemplate,
            AdminGroupFilterOption, AdminGroupRow, AdminGroupsContext, AdminGroupsTemplate,
            AdminPostRow, AdminPostsContext, AdminPostsTemplate, display_or_empty, excerpt,
        },
        views::{PaginatorView, format_datetime, render_template_response},
    },
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

const ADMIN_PAGE_SIZE: u32 = 50;
const EXCERPT_CHARS: usize = 80;

#[derive(Clone)]
pub struct AdminState {
    pub users: Arc<dyn UsersRepo>,
    pub posts: Arc<dyn PostsRepo>,
    pub groups: Arc<dyn GroupsRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub follows: Arc<dyn FollowsRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub cache: Option<CacheState>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/posts", get(posts_panel))
        .route("/groups", get(groups_panel))
        .route("/groups/create", post(group_create))
        .route("/comments", get(comments_panel))
        .route("/follows", get(follows_panel))
        .route("/cache/flush", post(flush_cache))
        .route("/metrics", get(metrics))
        .route("/_health/db", get(admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelQuery {
    page: Option<String>,
    q: Option<String>,
    group: Option<String>,
}

fn panel_page(raw: Option<&str>) -> Result<PageRequest, RepoError> {
    Ok(PageRequest::parse(raw, ADMIN_PAGE_SIZE)?)
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn dashboard(State(state): State<AdminState>) -> Response {
    let counts = async {
        Ok::<_, RepoError>((
            state.users.count_users().await?,
            state.posts.count_posts(&PostQueryFilter::default()).await?,
            state.groups.count_groups(None).await?,
            state
                .comments
                .count_comments(&CommentQueryFilter::default())
                .await?,
            state.follows.count_follows().await?,
        ))
    }
    .await;

    match counts {
        Ok((users, posts, groups, comments, follows)) => {
            let view = AdminDashboardContext {
                users,
                posts,
                groups,
                comments,
                follows,
                cached_pages: state
                    .cache
                    .as_ref()
                    .map(|cache| cache.store.len())
                    .unwrap_or(0),
            };
            render_template_response(AdminDashboardTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http("infra::http::admin::dashboard", err).into_response(),
    }
}

async fn posts_panel(
    State(state): State<AdminState>,
    Query(query): Query<PanelQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::posts_panel";

    let result = async {
        let search = non_empty(query.q.as_ref());
        let group_slug = non_empty(query.group.as_ref());

        let group_id = match group_slug.as_deref() {
            Some(slug) => state.groups.find_group_by_slug(slug).await?.map(|g| g.id),
            None => None,
        };

        let filter = PostQueryFilter {
            group_id,
            search: search.clone(),
            ..Default::default()
        };

        let request = panel_page(query.page.as_deref())?;
        let total = state.posts.count_posts(&filter).await?;
        let request = request.clamp_to_total(total);
        let items = state.posts.list_posts(&filter, request).await?;
        let paged = Paged::new(items, request, total);

        let groups = state
            .groups
            .list_groups(None, PageRequest::new(1, 200))
            .await?;

        Ok::<_, RepoError>((paged, groups, search, group_slug))
    }
    .await;

    match result {
        Ok((paged, groups, search, group_slug)) => {
            let paginator = PaginatorView::from_paged(&paged, "/posts");
            let rows = paged
                .items
                .into_iter()
                .map(|post| AdminPostRow {
                    id: post.id.to_string(),
                    author: post.author_username,
                    group: display_or_empty(post.group.as_ref().map(|g| g.title.as_str())),
                    excerpt: excerpt(&post.text, EXCERPT_CHARS),
                    published: format_datetime(post.pub_date),
                })
                .collect();
            let groups = groups
                .into_iter()
                .map(|group| AdminGroupFilterOption {
                    selected: group_slug.as_deref() == Some(group.slug.as_str()),
                    slug: group.slug,
                    title: group.title,
                })
                .collect();
            let view = AdminPostsContext {
                rows,
                search: search.unwrap_or_default(),
                groups,
                paginator,
            };
            render_template_response(AdminPostsTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn groups_panel(
    State(state): State<AdminState>,
    Query(query): Query<PanelQuery>,
) -> Response {
    match load_groups_context(&state, &query, None).await {
        Ok(view) => render_template_response(AdminGroupsTemplate { view }, StatusCode::OK),
        Err(err) => repo_error_to_http("infra::http::admin::groups_panel", err).into_response(),
    }
}

async fn load_groups_context(
    state: &AdminState,
    query: &PanelQuery,
    form_error: Option<String>,
) -> Result<AdminGroupsContext, RepoError> {
    let search = non_empty(query.q.as_ref());

    let request = panel_page(query.page.as_deref())?;
    let total = state.groups.count_groups(search.as_deref()).await?;
    let request = request.clamp_to_total(total);
    let items = state.groups.list_groups(search.as_deref(), request).await?;
    let paged = Paged::new(items, request, total);

    let paginator = PaginatorView::from_paged(&paged, "/groups");
    let rows = paged
        .items
        .into_iter()
        .map(|group| AdminGroupRow {
            title: group.title,
            slug: group.slug,
            description: display_or_empty(Some(&group.description)),
        })
        .collect();

    Ok(AdminGroupsContext {
        rows,
        search: search.unwrap_or_default(),
        paginator,
        form_error,
    })
}

#[derive(Debug, Deserialize)]
struct GroupCreateForm {
    #[serde(default)]
    title: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    description: String,
}

async fn group_create(
    State(state): State<AdminState>,
    Form(form): Form<GroupCreateForm>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::group_create";

    let title = form.title.trim().to_string();
    if title.is_empty() {
        return rerender_groups(&state, Some("Название группы обязательно.".to_string())).await;
    }

    // A supplied slug is taken verbatim but must already be well formed;
    // only an absent one is derived from the title.
    let supplied = form.slug.trim();
    let slug = if supplied.is_empty() {
        match derive_slug(&title) {
            Ok(slug) => slug,
            Err(SlugError::Unrepresentable { .. } | SlugError::EmptyInput) => {
                return rerender_groups(
                    &state,
                    Some("Не удалось построить адрес группы из названия.".to_string()),
                )
                .await;
            }
            Err(err) => {
                return rerender_groups(&state, Some(format!("Некорректный адрес группы: {err}")))
                    .await;
            }
        }
    } else {
        if let Err(err) = validate_slug(supplied) {
            return rerender_groups(&state, Some(format!("Некорректный адрес группы: {err}")))
                .await;
        }
        supplied.to_string()
    };

    match state
        .groups
        .create_group(CreateGroupParams {
            title: title.clone(),
            slug: slug.clone(),
            description: form.description.trim().to_string(),
        })
        .await
    {
        Ok(group) => {
            info!(
                target = "yatube::admin",
                slug = %group.slug,
                "group created"
            );
            rerender_groups(&state, None).await
        }
        Err(RepoError::Duplicate { .. }) => {
            rerender_groups(
                &state,
                Some(format!("Группа с адресом «{slug}» уже существует.")),
            )
            .await
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn rerender_groups(state: &AdminState, form_error: Option<String>) -> Response {
    match load_groups_context(state, &PanelQuery::default(), form_error).await {
        Ok(view) => render_template_response(AdminGroupsTemplate { view }, StatusCode::OK),
        Err(err) => repo_error_to_http("infra::http::admin::groups_panel", err).into_response(),
    }
}

async fn comments_panel(
    State(state): State<AdminState>,
    Query(query): Query<PanelQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::comments_panel";

    let result = async {
        let search = non_empty(query.q.as_ref());
        let filter = CommentQueryFilter {
            search: search.clone(),
            ..Default::default()
        };

        let request = panel_page(query.page.as_deref())?;
        let total = state.comments.count_comments(&filter).await?;
        let request = request.clamp_to_total(total);
        let items = state.comments.list_comments(&filter, request).await?;

        Ok::<_, RepoError>((Paged::new(items, request, total), search))
    }
    .await;

    match result {
        Ok((paged, search)) => {
            let paginator = PaginatorView::from_paged(&paged, "/comments");
            let rows = paged
                .items
                .into_iter()
                .map(|comment| AdminCommentRow {
                    id: comment.id.to_string(),
                    post_id: comment.post_id.to_string(),
                    author: comment.author_username,
                    excerpt: excerpt(&comment.text, EXCERPT_CHARS),
                    created: format_datetime(comment.created),
                })
                .collect();
            let view = AdminCommentsContext {
                rows,
                search: search.unwrap_or_default(),
                paginator,
            };
            render_template_response(AdminCommentsTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

async fn follows_panel(
    State(state): State<AdminState>,
    Query(query): Query<PanelQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::admin::follows_panel";

    let result = async {
        let request = panel_page(query.page.as_deref())?;
        let total = state.follows.count_follows().await?;
        let request = request.clamp_to_total(total);
        let items = state.follows.list_follows(request).await?;
        Ok::<_, RepoError>(Paged::new(items, request, total))
    }
    .await;

    match result {
        Ok(paged) => {
            let paginator = PaginatorView::from_paged(&paged, "/follows");
            let rows = paged
                .items
                .into_iter()
                .map(|follow| AdminFollowRow {
                    user: follow.user_username,
                    author: follow.author_username,
                    created: format_datetime(follow.created_at),
                })
                .collect();
            let view = AdminFollowsContext { rows, paginator };
            render_template_response(AdminFollowsTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

/// The only way besides TTL expiry that cached pages are dropped.
async fn flush_cache(State(state): State<AdminState>) -> Response {
    match state.cache.as_ref() {
        Some(cache) => {
            cache.store.invalidate_all();
            info!(target = "yatube::admin", "page cache flushed");
            StatusCode::NO_CONTENT.into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn metrics(State(state): State<AdminState>) -> Response {
    let counts = async {
        Ok::<_, RepoError>(json!({
            "users": state.users.count_users().await?,
            "posts": state.posts.count_posts(&PostQueryFilter::default()).await?,
            "groups": state.groups.count_groups(None).await?,
            "comments": state.comments.count_comments(&CommentQueryFilter::default()).await?,
            "follows": state.follows.count_follows().await?,
            "cached_pages": state.cache.as_ref().map(|cache| cache.store.len()).unwrap_or(0),
        }))
    }
    .await;

    match counts {
        Ok(body) => Json(body).into_response(),
        Err(err) => repo_error_to_http("infra::http::admin::metrics", err).into_response(),
    }
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.ping().await)
}

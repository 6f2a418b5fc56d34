use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::application::auth::SessionUser;
use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::Paged;
use crate::domain::entities::{CommentRecord, PostRecord};

const DATE_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[day].[month].[year] [hour]:[minute]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<SessionUser>) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new("Страница не найдена", viewer, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Everyone's page shares the same layout: page title and the signed-in
/// viewer (or not) for the navigation bar.
#[derive(Clone)]
pub struct LayoutContext<T> {
    pub title: String,
    pub viewer: Option<ViewerContext>,
    pub content: T,
}

#[derive(Clone)]
pub struct ViewerContext {
    pub username: String,
}

impl<T> LayoutContext<T> {
    pub fn new(title: impl Into<String>, viewer: Option<SessionUser>, content: T) -> Self {
        Self {
            title: title.into(),
            viewer: viewer.map(|session| ViewerContext {
                username: session.username,
            }),
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub slug: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: String,
    pub author_username: String,
    pub text: String,
    pub published: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
}

impl From<PostRecord> for PostCard {
    fn from(post: PostRecord) -> Self {
        Self {
            id: post.id.to_string(),
            author_username: post.author_username,
            text: post.text,
            published: format_datetime(post.pub_date),
            group: post.group.map(|group| GroupBadge {
                title: group.title,
                slug: group.slug,
            }),
            image_url: post.image_path.map(|path| format!("/media/{path}")),
        }
    }
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub created: String,
    pub text: String,
}

impl From<CommentRecord> for CommentView {
    fn from(comment: CommentRecord) -> Self {
        Self {
            author_username: comment.author_username,
            created: format_datetime(comment.created),
            text: comment.text,
        }
    }
}

/// Numbers and flags for the page-number navigation block.
#[derive(Clone)]
pub struct PaginatorView {
    pub base_path: String,
    pub page: u32,
    pub total_pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: u32,
    pub next_page: u32,
}

impl PaginatorView {
    pub fn from_paged<T>(paged: &Paged<T>, base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            page: paged.page,
            total_pages: paged.total_pages(),
            has_prev: paged.has_prev(),
            has_next: paged.has_next(),
            prev_page: paged.page.saturating_sub(1).max(1),
            next_page: paged.page.saturating_add(1),
        }
    }
}

pub struct FeedPageContext {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl FeedPageContext {
    pub fn new(paged: Paged<PostRecord>, base_path: impl Into<String>) -> Self {
        let paginator = PaginatorView::from_paged(&paged, base_path);
        Self {
            posts: paged.items.into_iter().map(PostCard::from).collect(),
            paginator,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedPageContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedPageContext>,
}

pub struct GroupPageContext {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageContext>,
}

pub struct ProfilePageContext {
    pub author_username: String,
    pub post_count: u64,
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
    pub show_follow_button: bool,
    pub subscribed: bool,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfilePageContext>,
}

pub struct PostPageContext {
    pub post: PostCard,
    pub author_username: String,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub viewer_can_edit: bool,
    pub viewer_can_comment: bool,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostPageContext>,
}

#[derive(Clone)]
pub struct GroupOption {
    pub id: String,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormContext {
    pub heading: String,
    pub submit_label: String,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormContext>,
}

pub struct AuthFormContext {
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<AuthFormContext>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<AuthFormContext>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Страница не найдена".to_string(),
            message: "Запрошенная страница не существует. Вернитесь на главную, чтобы продолжить."
                .to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn format_datetime(moment: OffsetDateTime) -> String {
    moment
        .format(DATE_FORMAT)
        .unwrap_or_else(|_| moment.to_string())
}

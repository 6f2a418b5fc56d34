//! Admin panel view structs.

use askama::Template;

use super::views::PaginatorView;

/// Russian-locale placeholder shown for absent values in admin listings.
pub const EMPTY_PLACEHOLDER: &str = "-пусто-";

pub fn display_or_empty(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => EMPTY_PLACEHOLDER.to_string(),
    }
}

pub struct AdminDashboardContext {
    pub users: u64,
    pub posts: u64,
    pub groups: u64,
    pub comments: u64,
    pub follows: u64,
    pub cached_pages: usize,
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardTemplate {
    pub view: AdminDashboardContext,
}

pub struct AdminPostRow {
    pub id: String,
    pub author: String,
    pub group: String,
    pub excerpt: String,
    pub published: String,
}

pub struct AdminGroupFilterOption {
    pub slug: String,
    pub title: String,
    pub selected: bool,
}

pub struct AdminPostsContext {
    pub rows: Vec<AdminPostRow>,
    pub search: String,
    pub groups: Vec<AdminGroupFilterOption>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "admin/posts.html")]
pub struct AdminPostsTemplate {
    pub view: AdminPostsContext,
}

pub struct AdminGroupRow {
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub struct AdminGroupsContext {
    pub rows: Vec<AdminGroupRow>,
    pub search: String,
    pub paginator: PaginatorView,
    pub form_error: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/groups.html")]
pub struct AdminGroupsTemplate {
    pub view: AdminGroupsContext,
}

pub struct AdminCommentRow {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub excerpt: String,
    pub created: String,
}

pub struct AdminCommentsContext {
    pub rows: Vec<AdminCommentRow>,
    pub search: String,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "admin/comments.html")]
pub struct AdminCommentsTemplate {
    pub view: AdminCommentsContext,
}

pub struct AdminFollowRow {
    pub user: String,
    pub author: String,
    pub created: String,
}

pub struct AdminFollowsContext {
    pub rows: Vec<AdminFollowRow>,
    pub paginator: PaginatorView,
}

#[derive(Template)]
#[template(path = "admin/follows.html")]
pub struct AdminFollowsTemplate {
    pub view: AdminFollowsContext,
}

/// Trim listing text down to a single-line excerpt.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let truncated: String = line.chars().take(max_chars).collect();
    format!("{truncated}…")
}

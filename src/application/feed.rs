//! Feed composition over the repository traits.
//!
//! Every public listing (index, group, profile, subscriptions) goes through
//! this service so pagination and ordering stay consistent: newest first,
//! `pub_date DESC, id DESC` as the tiebreak, fixed page size.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paged, PaginationError};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostQueryFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    InvalidPage(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Profile page payload: the author, their posts, and subscription state.
#[derive(Debug)]
pub struct ProfileFeed {
    pub author: UserRecord,
    pub posts: Paged<PostRecord>,
    /// Whether the authenticated viewer follows this author. Always false
    /// for anonymous viewers and for the author's own profile.
    pub subscribed: bool,
    pub viewer_is_author: bool,
}

#[derive(Debug)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author: UserRecord,
    pub author_post_count: u64,
    pub comments: Vec<CommentRecord>,
}

pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: u32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: u32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// All posts, newest first.
    pub async fn index_page(&self, page: Option<&str>) -> Result<Paged<PostRecord>, FeedError> {
        self.paged(PostQueryFilter::default(), page).await
    }

    /// Posts in one group. `None` when the slug is unknown.
    pub async fn group_page(
        &self,
        slug: &str,
        page: Option<&str>,
    ) -> Result<Option<(GroupRecord, Paged<PostRecord>)>, FeedError> {
        let Some(group) = self.groups.find_group_by_slug(slug).await? else {
            return Ok(None);
        };

        let filter = PostQueryFilter {
            group_id: Some(group.id),
            ..Default::default()
        };
        let posts = self.paged(filter, page).await?;
        Ok(Some((group, posts)))
    }

    /// One author's posts plus the viewer's subscription state. `None` when
    /// the username is unknown.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        page: Option<&str>,
    ) -> Result<Option<ProfileFeed>, FeedError> {
        let Some(author) = self.users.find_user_by_username(username).await? else {
            return Ok(None);
        };

        let filter = PostQueryFilter {
            author_id: Some(author.id),
            ..Default::default()
        };
        let posts = self.paged(filter, page).await?;

        let viewer_is_author = viewer == Some(author.id);
        let subscribed = match viewer {
            Some(viewer_id) if !viewer_is_author => {
                self.follows.is_following(viewer_id, author.id).await?
            }
            _ => false,
        };

        Ok(Some(ProfileFeed {
            author,
            posts,
            subscribed,
            viewer_is_author,
        }))
    }

    /// Posts by authors the viewer follows. Following nobody yields an empty
    /// page, not an error.
    pub async fn follow_page(
        &self,
        viewer: Uuid,
        page: Option<&str>,
    ) -> Result<Paged<PostRecord>, FeedError> {
        let filter = PostQueryFilter {
            followed_by: Some(viewer),
            ..Default::default()
        };
        self.paged(filter, page).await
    }

    /// One post with its comments, oldest first. `None` when the post does
    /// not exist or does not belong to the named author.
    pub async fn post_detail(
        &self,
        username: &str,
        post_id: Uuid,
    ) -> Result<Option<PostDetail>, FeedError> {
        let Some(post) = self.posts.find_post_by_id(post_id).await? else {
            return Ok(None);
        };
        if post.author_username != username {
            return Ok(None);
        }

        let Some(author) = self.users.find_user_by_username(username).await? else {
            return Ok(None);
        };

        let author_post_count = self
            .posts
            .count_posts(&PostQueryFilter {
                author_id: Some(author.id),
                ..Default::default()
            })
            .await?;
        let comments = self.comments.list_comments_for_post(post.id).await?;

        Ok(Some(PostDetail {
            post,
            author,
            author_post_count,
            comments,
        }))
    }

    async fn paged(
        &self,
        filter: PostQueryFilter,
        raw_page: Option<&str>,
    ) -> Result<Paged<PostRecord>, FeedError> {
        let request = PageRequest::parse(raw_page, self.page_size)?;
        let total = self.posts.count_posts(&filter).await?;
        let request = request.clamp_to_total(total);
        let items = self.posts.list_posts(&filter, request).await?;
        Ok(Paged::new(items, request, total))
    }
}

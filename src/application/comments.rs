//! Comments on posts.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::{CommentRecord, UserRecord};

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment text is empty")]
    EmptyText,
    #[error("post does not exist")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    posts: Arc<dyn PostsRepo>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentsRepo>, posts: Arc<dyn PostsRepo>) -> Self {
        Self { comments, posts }
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: Uuid,
        text: &str,
    ) -> Result<CommentRecord, CommentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentError::EmptyText);
        }

        if self.posts.find_post_by_id(post_id).await?.is_none() {
            return Err(CommentError::UnknownPost);
        }

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await?;
        Ok(comment)
    }
}

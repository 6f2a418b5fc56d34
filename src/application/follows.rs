//! The follow graph: author subscriptions.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author does not exist")]
    UnknownAuthor,
    #[error("users cannot follow themselves")]
    SelfFollow,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    /// Subscribe `user` to `author_username`. Following an author twice is a
    /// no-op: at most one edge exists per (user, author) pair.
    pub async fn follow(
        &self,
        user: &UserRecord,
        author_username: &str,
    ) -> Result<(), FollowError> {
        let author = self.resolve_author(author_username).await?;
        if author.id == user.id {
            return Err(FollowError::SelfFollow);
        }

        let created = self.follows.insert_follow(user.id, author.id).await?;
        debug!(
            target = "yatube::follows",
            user = %user.username,
            author = %author.username,
            created,
            "follow requested"
        );
        Ok(())
    }

    /// Remove the subscription if present. Unfollowing an author the user
    /// never followed is a no-op.
    pub async fn unfollow(
        &self,
        user: &UserRecord,
        author_username: &str,
    ) -> Result<(), FollowError> {
        let author = self.resolve_author(author_username).await?;
        if author.id == user.id {
            return Ok(());
        }

        self.follows.delete_follow(user.id, author.id).await?;
        Ok(())
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, FollowError> {
        Ok(self.follows.is_following(user_id, author_id).await?)
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}

//! Post creation and editing.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostRecord, UserRecord};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

/// Form-level validation message shown when an upload does not decode as an
/// image. The wording is part of the user-facing contract.
pub const INVALID_IMAGE_MESSAGE: &str = "Загрузите правильное изображение. \
     Файл, который вы загрузили, поврежден или не является изображением.";

pub const EMPTY_TEXT_MESSAGE: &str = "Текст записи не может быть пустым.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post text is empty")]
    EmptyText,
    #[error("uploaded file is not a decodable image")]
    InvalidImage,
    #[error("group does not exist")]
    UnknownGroup,
    #[error("post does not exist")]
    NotFound,
    #[error("only the author may edit a post")]
    NotAuthor,
    #[error(transparent)]
    Upload(#[from] UploadStorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl PostError {
    /// Message for re-rendering the post form, when the error is one the
    /// user can fix. Infrastructure failures return `None`.
    pub fn form_message(&self) -> Option<&'static str> {
        match self {
            PostError::EmptyText => Some(EMPTY_TEXT_MESSAGE),
            PostError::InvalidImage => Some(INVALID_IMAGE_MESSAGE),
            PostError::UnknownGroup => Some("Выберите существующую группу."),
            _ => None,
        }
    }
}

/// An uploaded image as received from the multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<UploadedImage>,
}

pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            groups,
            storage,
        }
    }

    /// Insert exactly one post. Validation failures persist nothing.
    pub async fn create_post(
        &self,
        author: &UserRecord,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let text = self.validate(&input).await?;
        let image_path = match input.image {
            Some(image) => Some(self.store_image(image).await?),
            None => None,
        };

        let post = self
            .posts_write
            .create_post(CreatePostParams {
                text,
                author_id: author.id,
                group_id: input.group_id,
                image_path,
            })
            .await?;

        info!(
            target = "yatube::posts",
            post_id = %post.id,
            author = %author.username,
            "post created"
        );
        Ok(post)
    }

    /// Update a post owned by `editor`. A non-author attempt is rejected
    /// without touching the row.
    pub async fn edit_post(
        &self,
        editor: &UserRecord,
        post_id: Uuid,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let existing = self
            .posts
            .find_post_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)?;
        if existing.author_id != editor.id {
            return Err(PostError::NotAuthor);
        }

        let text = self.validate(&input).await?;
        let image_path = match input.image {
            Some(image) => {
                let stored = self.store_image(image).await?;
                if let Some(previous) = existing.image_path.as_deref() {
                    self.storage.delete(previous).await?;
                }
                Some(stored)
            }
            None => existing.image_path,
        };

        let post = self
            .posts_write
            .update_post(UpdatePostParams {
                id: post_id,
                text,
                group_id: input.group_id,
                image_path,
            })
            .await?;
        Ok(post)
    }

    pub async fn find_post(&self, post_id: Uuid) -> Result<Option<PostRecord>, PostError> {
        Ok(self.posts.find_post_by_id(post_id).await?)
    }

    async fn validate(&self, input: &PostInput) -> Result<String, PostError> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(PostError::EmptyText);
        }

        if let Some(group_id) = input.group_id
            && self.groups.find_group_by_id(group_id).await?.is_none()
        {
            return Err(PostError::UnknownGroup);
        }

        Ok(text.to_string())
    }

    /// Validate the payload decodes as an image, then persist it. The check
    /// runs before any write so a rejected upload leaves no file behind.
    async fn store_image(&self, image: UploadedImage) -> Result<String, PostError> {
        if imagesize::blob_size(&image.data).is_err() {
            return Err(PostError::InvalidImage);
        }

        let stored = self.storage.store(&image.filename, image.data).await?;
        Ok(stored.stored_path)
    }
}

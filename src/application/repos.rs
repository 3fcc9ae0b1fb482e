//! Repository traits describing persistence adapters.
//!
//! Every method is a single atomic operation against the backing store; the
//! services compose them without holding any in-process lock.

use std::collections::HashMap;

use async_trait::async_trait;
use murmur_api_types::AuthorSummary;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{CommentRecord, PostSummary};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub depth: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// Administrative listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CommentQueryFilter {
    pub post_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub is_deleted: Option<bool>,
    pub sort_by: CommentSortField,
    pub order: SortOrder,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    /// Records for the given ids, in no particular order. Unknown ids are skipped.
    async fn find_comments(&self, ids: &[Uuid]) -> Result<Vec<CommentRecord>, RepoError>;

    /// Top-level comments of a post, newest first.
    async fn list_top_level(
        &self,
        post_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn count_top_level(&self, post_id: Uuid) -> Result<u64, RepoError>;

    /// Direct children of a comment, oldest first.
    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    /// Comments of a post with `is_deleted == false`.
    async fn count_live(&self, post_id: Uuid) -> Result<u64, RepoError>;

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn count_comments(&self, filter: &CommentQueryFilter) -> Result<u64, RepoError>;

    async fn insert_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Append `child_id` to the parent's reply list.
    async fn push_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError>;

    /// Remove `child_id` from the parent's reply list.
    async fn pull_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError>;

    async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<CommentRecord, RepoError>;

    /// Set the deleted flag and content together, but only if the flag
    /// actually flips. Returns `None` when the record is missing or already
    /// in the requested state.
    async fn set_deleted(
        &self,
        id: Uuid,
        is_deleted: bool,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<Option<CommentRecord>, RepoError>;

    /// Returns whether a record was removed.
    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError>;

    /// Remove every comment of a post, returning how many were removed.
    async fn delete_comments_for_post(&self, post_id: Uuid) -> Result<u64, RepoError>;
}

/// Post collaborator: existence, publication state, and the denormalized
/// comment counter.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post(&self, post_id: Uuid) -> Result<Option<PostSummary>, RepoError>;

    async fn increment_comments_count(&self, post_id: Uuid, delta: i64) -> Result<(), RepoError>;

    async fn set_comments_count(&self, post_id: Uuid, count: i64) -> Result<(), RepoError>;

    async fn exists(&self, post_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.find_post(post_id).await?.is_some())
    }

    async fn is_published(&self, post_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .find_post(post_id)
            .await?
            .is_some_and(|post| post.published))
    }

    async fn author_of(&self, post_id: Uuid) -> Result<Option<Uuid>, RepoError> {
        Ok(self.find_post(post_id).await?.map(|post| post.author_id))
    }
}

/// Author collaborator used to denormalize comment authorship in responses.
#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn resolve_author_summaries(
        &self,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AuthorSummary>, RepoError>;

    async fn resolve_author_summary(
        &self,
        user_id: Uuid,
    ) -> Result<Option<AuthorSummary>, RepoError> {
        Ok(self
            .resolve_author_summaries(&[user_id])
            .await?
            .remove(&user_id))
    }
}

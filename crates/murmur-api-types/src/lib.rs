//! Request and response payloads exchanged with comment API clients.
//!
//! These types are also the cached representation of comment reads, so every
//! response type round-trips through `serde_json`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Public identity of a comment author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

impl AuthorSummary {
    /// Placeholder used when the author record no longer exists.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: "[unknown]".to_string(),
            avatar: None,
        }
    }
}

/// A comment with its author resolved and, for tree reads, its replies
/// materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: AuthorSummary,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub depth: u8,
    pub is_deleted: bool,
    pub reply_ids: Vec<Uuid>,
    #[serde(default)]
    pub replies: Vec<CommentView>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl CommentView {
    /// Total number of comments in this subtree, including the root.
    pub fn subtree_len(&self) -> usize {
        1 + self.replies.iter().map(CommentView::subtree_len).sum::<usize>()
    }
}

/// Offset pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of top-level comments with their reply trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub pagination: PageMeta,
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreCommentRequest {
    pub original_content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCommentsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteCommentQuery {
    #[serde(default)]
    pub hard: bool,
}

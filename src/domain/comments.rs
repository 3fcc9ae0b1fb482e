//! Comment invariants: content bounds, nesting depth, ownership and the
//! soft/hard deletion policy.

use murmur_api_types::DeleteCommentQuery;
use uuid::Uuid;

use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;

pub const MAX_DEPTH: u8 = 5;
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Content left behind when an author removes a comment that still has replies.
pub const TOMBSTONE: &str = "[deleted]";
/// Content left behind when an administrator removes someone else's comment.
pub const ADMIN_TOMBSTONE: &str = "[This comment has been removed by admin]";

pub const ALREADY_DELETED: &str = "Comment is already deleted";
pub const NOT_DELETED: &str = "Comment is not deleted";

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn member(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Soft delete when replies exist, otherwise remove the leaf.
    #[default]
    Standard,
    /// Remove the comment and its entire subtree. Administrators only.
    Hard,
}

impl From<&DeleteCommentQuery> for DeleteMode {
    fn from(query: &DeleteCommentQuery) -> Self {
        if query.hard {
            DeleteMode::Hard
        } else {
            DeleteMode::Standard
        }
    }
}

/// What a delete request resolves to once structure and permissions are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePlan {
    SoftDelete { tombstone: &'static str },
    RemoveLeaf,
    Cascade,
}

/// Tunable comment limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentRules {
    pub max_depth: u8,
    pub max_content_chars: usize,
}

impl Default for CommentRules {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_content_chars: MAX_CONTENT_CHARS,
        }
    }
}

impl CommentRules {
    /// Trim and bound-check comment content.
    pub fn normalize_content(&self, raw: &str) -> Result<String, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Comment cannot be empty"));
        }
        if trimmed.chars().count() > self.max_content_chars {
            return Err(DomainError::validation(format!(
                "Comment must not exceed {} characters",
                self.max_content_chars
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Depth for a new reply under `parent`, rejecting cross-post and too-deep replies.
    pub fn reply_depth(&self, post_id: Uuid, parent: &CommentRecord) -> Result<u8, DomainError> {
        if parent.post_id != post_id {
            return Err(DomainError::validation(
                "Parent comment does not belong to this post",
            ));
        }
        if parent.depth >= self.max_depth {
            return Err(DomainError::validation(format!(
                "Maximum comment depth of {} reached",
                self.max_depth
            )));
        }
        parent
            .depth
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("comment depth overflow"))
    }
}

pub fn ensure_editable(comment: &CommentRecord, actor: &Actor) -> Result<(), DomainError> {
    if !comment.is_authored_by(actor.user_id) {
        return Err(DomainError::forbidden("You can only edit your own comments"));
    }
    if comment.is_deleted {
        return Err(DomainError::validation("Cannot edit a deleted comment"));
    }
    Ok(())
}

pub fn ensure_restorable(comment: &CommentRecord) -> Result<(), DomainError> {
    if !comment.is_deleted {
        return Err(DomainError::validation(NOT_DELETED));
    }
    Ok(())
}

pub fn plan_delete(
    comment: &CommentRecord,
    actor: &Actor,
    mode: DeleteMode,
) -> Result<DeletePlan, DomainError> {
    let is_author = comment.is_authored_by(actor.user_id);
    if !is_author && !actor.is_admin {
        return Err(DomainError::forbidden(
            "You can only delete your own comments",
        ));
    }

    match mode {
        DeleteMode::Hard if !actor.is_admin => Err(DomainError::forbidden(
            "Only administrators can permanently delete comments",
        )),
        DeleteMode::Hard => Ok(DeletePlan::Cascade),
        DeleteMode::Standard if comment.is_deleted => {
            Err(DomainError::validation(ALREADY_DELETED))
        }
        DeleteMode::Standard if comment.has_replies() => {
            let tombstone = if is_author {
                TOMBSTONE
            } else {
                ADMIN_TOMBSTONE
            };
            Ok(DeletePlan::SoftDelete { tombstone })
        }
        DeleteMode::Standard => Ok(DeletePlan::RemoveLeaf),
    }
}

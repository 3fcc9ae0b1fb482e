use murmur_api_types::{CommentView, CreateCommentRequest, DeleteOutcome, UpdateCommentRequest};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::CreateCommentParams;
use crate::domain::comments::{
    ALREADY_DELETED, Actor, DeleteMode, DeletePlan, ensure_editable, plan_delete,
};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;

use super::service::CommentService;

const DELETED_MESSAGE: &str = "Comment deleted successfully";
const PURGED_MESSAGE: &str = "Comment permanently deleted";

impl CommentService {
    /// Post a new top-level comment or reply on a published post.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        request: CreateCommentRequest,
    ) -> Result<CommentView, AppError> {
        let content = self.rules.normalize_content(&request.content)?;

        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post"))?;
        if !post.published {
            return Err(DomainError::forbidden("Cannot comment on unpublished posts").into());
        }

        let depth = match request.parent_id {
            Some(parent_id) => {
                let parent = self
                    .comments
                    .find_comment(parent_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("parent comment"))?;
                self.rules.reply_depth(post_id, &parent)?
            }
            None => 0,
        };

        let comment = self
            .comments
            .insert_comment(CreateCommentParams {
                post_id,
                author_id,
                content,
                parent_id: request.parent_id,
                depth,
            })
            .await?;
        if let Some(parent_id) = comment.parent_id {
            self.comments.push_reply(parent_id, comment.id).await?;
        }
        self.posts.increment_comments_count(post_id, 1).await?;

        self.cache
            .comment_changed(post_id, comment.id, comment.parent_id)
            .await;
        self.cache.post_changed(post_id, Some(post.author_id)).await;

        info!(
            comment_id = %comment.id,
            depth = comment.depth,
            "comment created"
        );
        self.single_view(comment).await
    }

    /// Replace the content of a live comment. Only its author may do this.
    #[instrument(skip(self, actor, request), fields(actor = %actor.user_id))]
    pub async fn update(
        &self,
        comment_id: Uuid,
        actor: &Actor,
        request: UpdateCommentRequest,
    ) -> Result<CommentView, AppError> {
        let comment = self.require_comment(comment_id).await?;
        ensure_editable(&comment, actor)?;
        let content = self.rules.normalize_content(&request.content)?;

        let updated = self
            .comments
            .update_content(comment_id, &content, OffsetDateTime::now_utc())
            .await?;

        self.cache
            .comment_changed(updated.post_id, updated.id, updated.parent_id)
            .await;

        self.single_view(updated).await
    }

    /// Delete a comment.
    ///
    /// A comment with replies becomes a tombstone so its subtree stays
    /// reachable; a leaf is removed outright. [`DeleteMode::Hard`] is
    /// admin-only and removes the whole subtree.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id, admin = actor.is_admin))]
    pub async fn delete(
        &self,
        comment_id: Uuid,
        actor: &Actor,
        mode: DeleteMode,
    ) -> Result<DeleteOutcome, AppError> {
        let comment = self.require_comment(comment_id).await?;
        let plan = plan_delete(&comment, actor, mode)?;

        let message = match plan {
            DeletePlan::SoftDelete { tombstone } => {
                self.comments
                    .set_deleted(comment.id, true, tombstone, OffsetDateTime::now_utc())
                    .await?
                    .ok_or_else(|| DomainError::validation(ALREADY_DELETED))?;
                self.posts
                    .increment_comments_count(comment.post_id, -1)
                    .await?;
                DELETED_MESSAGE
            }
            DeletePlan::RemoveLeaf => {
                self.remove_leaf(&comment).await?;
                DELETED_MESSAGE
            }
            DeletePlan::Cascade => {
                let removed = self.remove_subtree(&comment).await?;
                self.reconcile_count(comment.post_id).await?;
                let descendants: Vec<_> = removed
                    .into_iter()
                    .filter(|id| *id != comment.id)
                    .collect();
                self.forget_comments(&descendants).await;
                PURGED_MESSAGE
            }
        };

        self.cache
            .comment_changed(comment.post_id, comment.id, comment.parent_id)
            .await;
        self.post_counter_changed(comment.post_id).await?;

        info!(comment_id = %comment.id, ?plan, "comment deleted");
        Ok(DeleteOutcome {
            message: message.to_string(),
        })
    }

    pub(super) async fn require_comment(&self, comment_id: Uuid) -> Result<CommentRecord, AppError> {
        self.comments
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment").into())
    }

    /// Only the caller that actually removed the row touches the parent and
    /// the counter.
    async fn remove_leaf(&self, comment: &CommentRecord) -> Result<(), AppError> {
        if !self.comments.delete_comment(comment.id).await? {
            return Err(DomainError::not_found("comment").into());
        }
        if let Some(parent_id) = comment.parent_id {
            self.comments.pull_reply(parent_id, comment.id).await?;
        }
        self.posts
            .increment_comments_count(comment.post_id, -1)
            .await?;
        Ok(())
    }
}

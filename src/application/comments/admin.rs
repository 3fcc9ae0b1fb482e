//! Moderation operations. Callers are expected to have authorized the
//! administrator already; these methods perform no ownership checks.

use std::collections::HashSet;

use murmur_api_types::{CommentPage, CommentView, ListCommentsQuery, RestoreCommentRequest};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::PageRequest;
use crate::application::repos::CommentQueryFilter;
use crate::cache::{CacheKey, KeyPattern};
use crate::domain::comments::{NOT_DELETED, ensure_restorable};
use crate::domain::entities::CommentRecord;
use crate::domain::error::DomainError;

use super::service::CommentService;
use super::views::record_view;

impl CommentService {
    /// Flat, filterable listing across all posts. Not cached.
    #[instrument(skip(self, filter, query))]
    pub async fn list_all(
        &self,
        filter: &CommentQueryFilter,
        query: &ListCommentsQuery,
    ) -> Result<CommentPage, AppError> {
        let request = PageRequest::from_query(query, self.page_limits)?;
        let records = self
            .comments
            .list_comments(filter, request.offset(), request.limit())
            .await?;
        let total = self.comments.count_comments(filter).await?;

        let authors = self
            .resolve_authors(records.iter().map(|record| record.author_id))
            .await?;
        let comments = records
            .into_iter()
            .map(|record| record_view(record, &authors))
            .collect();

        Ok(CommentPage {
            comments,
            pagination: request.meta(total),
        })
    }

    /// Rewrite a comment's content regardless of author or deleted state.
    #[instrument(skip(self, content))]
    pub async fn admin_update(
        &self,
        comment_id: Uuid,
        content: &str,
    ) -> Result<CommentView, AppError> {
        self.require_comment(comment_id).await?;
        let content = self.rules.normalize_content(content)?;

        let updated = self
            .comments
            .update_content(comment_id, &content, OffsetDateTime::now_utc())
            .await?;
        self.cache
            .comment_changed(updated.post_id, updated.id, updated.parent_id)
            .await;

        self.single_view(updated).await
    }

    /// Bring a soft-deleted comment back with the supplied content.
    #[instrument(skip(self, request))]
    pub async fn restore(
        &self,
        comment_id: Uuid,
        request: RestoreCommentRequest,
    ) -> Result<CommentView, AppError> {
        let comment = self.require_comment(comment_id).await?;
        ensure_restorable(&comment)?;
        let content = self.rules.normalize_content(&request.original_content)?;

        let restored = self
            .comments
            .set_deleted(comment_id, false, &content, OffsetDateTime::now_utc())
            .await?
            .ok_or_else(|| DomainError::validation(NOT_DELETED))?;
        self.posts
            .increment_comments_count(restored.post_id, 1)
            .await?;

        self.cache
            .comment_changed(restored.post_id, restored.id, restored.parent_id)
            .await;
        self.post_counter_changed(restored.post_id).await?;

        info!(comment_id = %restored.id, "comment restored");
        self.single_view(restored).await
    }

    /// Remove every comment of a post and zero its counter.
    #[instrument(skip(self))]
    pub async fn purge_post(&self, post_id: Uuid) -> Result<u64, AppError> {
        if !self.posts.exists(post_id).await? {
            return Err(DomainError::not_found("post").into());
        }

        let removed = self.comments.delete_comments_for_post(post_id).await?;
        self.posts.set_comments_count(post_id, 0).await?;

        // Single-comment and reply entries of the purged ids are not
        // addressable by post, so drop those families wholesale.
        self.cache
            .invalidate_pattern(&KeyPattern::PostComments(post_id))
            .await;
        self.cache.invalidate_pattern(&KeyPattern::AllComments).await;
        self.cache
            .invalidate_pattern(&KeyPattern::AllCommentLists)
            .await;
        self.post_counter_changed(post_id).await?;

        info!(removed, "post comments purged");
        Ok(removed)
    }

    /// Recompute a post's counter from its live comments.
    #[instrument(skip(self))]
    pub async fn recount(&self, post_id: Uuid) -> Result<u64, AppError> {
        let previous = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post"))?
            .comments_count;

        let live = self.reconcile_count(post_id).await?;
        if u64::try_from(previous).ok() != Some(live) {
            warn!(post_id = %post_id, previous, live, "comment counter had drifted");
        }
        self.post_counter_changed(post_id).await?;
        Ok(live)
    }

    /// Delete `root` and every descendant, children before parents, then
    /// detach `root` from its parent. Returns the removed ids.
    pub(super) async fn remove_subtree(
        &self,
        root: &CommentRecord,
    ) -> Result<Vec<Uuid>, AppError> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root.id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            let children = self.comments.list_children(id).await?;
            stack.extend(children.into_iter().map(|child| child.id));
        }

        for id in order.iter().rev() {
            if !self.comments.delete_comment(*id).await? {
                warn!(comment_id = %id, "comment vanished during cascade delete");
            }
        }
        if let Some(parent_id) = root.parent_id {
            self.comments.pull_reply(parent_id, root.id).await?;
        }

        Ok(order)
    }

    pub(super) async fn reconcile_count(&self, post_id: Uuid) -> Result<u64, AppError> {
        let live = self.comments.count_live(post_id).await?;
        let count = i64::try_from(live)
            .map_err(|_| AppError::unexpected("live comment count exceeds i64"))?;
        self.posts.set_comments_count(post_id, count).await?;
        info!(post_id = %post_id, live, "comment counter reconciled");
        Ok(live)
    }

    pub(super) async fn forget_comments(&self, ids: &[Uuid]) {
        let keys: Vec<CacheKey> = ids
            .iter()
            .flat_map(|id| [CacheKey::Comment(*id), CacheKey::CommentReplies(*id)])
            .collect();
        self.cache.invalidate_many(&keys).await;
    }

    /// The post's counter moved, so its cached entries are stale.
    pub(super) async fn post_counter_changed(&self, post_id: Uuid) -> Result<(), AppError> {
        let author = self.posts.author_of(post_id).await?;
        self.cache.post_changed(post_id, author).await;
        Ok(())
    }
}

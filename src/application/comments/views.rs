//! Record to response conversion with author denormalization.

use std::collections::HashMap;

use murmur_api_types::{AuthorSummary, CommentView};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::domain::entities::CommentRecord;
use crate::domain::tree::CommentNode;

use super::service::CommentService;

pub(super) type AuthorMap = HashMap<Uuid, AuthorSummary>;

impl CommentService {
    /// Resolve authors in one batch. Ids the user store does not know are
    /// rendered as an unknown author rather than failing the read.
    pub(super) async fn resolve_authors(
        &self,
        ids: impl IntoIterator<Item = Uuid>,
    ) -> Result<AuthorMap, AppError> {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(AuthorMap::new());
        }
        Ok(self.users.resolve_author_summaries(&ids).await?)
    }

    pub(super) async fn single_view(&self, record: CommentRecord) -> Result<CommentView, AppError> {
        let authors = self.resolve_authors([record.author_id]).await?;
        Ok(record_view(record, &authors))
    }
}

fn author_for(authors: &AuthorMap, id: Uuid) -> AuthorSummary {
    authors
        .get(&id)
        .cloned()
        .unwrap_or_else(|| AuthorSummary::unknown(id))
}

pub(super) fn record_view(record: CommentRecord, authors: &AuthorMap) -> CommentView {
    with_replies(record, Vec::new(), authors)
}

pub(super) fn with_replies(
    record: CommentRecord,
    replies: Vec<CommentView>,
    authors: &AuthorMap,
) -> CommentView {
    CommentView {
        author: author_for(authors, record.author_id),
        id: record.id,
        post_id: record.post_id,
        content: record.content,
        parent_id: record.parent_id,
        depth: record.depth,
        is_deleted: record.is_deleted,
        reply_ids: record.reply_ids,
        replies,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

pub(super) fn node_view(node: CommentNode, authors: &AuthorMap) -> CommentView {
    let replies = node
        .children
        .into_iter()
        .map(|child| node_view(child, authors))
        .collect();
    with_replies(node.record, replies, authors)
}

use murmur_api_types::{CommentPage, CommentView, ListCommentsQuery};
use tracing::instrument;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::PageRequest;
use crate::cache::CacheKey;
use crate::domain::error::DomainError;
use crate::domain::tree::CommentArena;

use super::service::CommentService;
use super::views::{node_view, record_view, with_replies};

impl CommentService {
    /// One page of a post's top-level comments, newest first, each with its
    /// full reply tree. The page is cached as a single snapshot.
    #[instrument(skip(self, query))]
    pub async fn list_for_post(
        &self,
        post_id: Uuid,
        query: &ListCommentsQuery,
    ) -> Result<CommentPage, AppError> {
        let request = PageRequest::from_query(query, self.page_limits)?;
        let key = CacheKey::PostComments {
            post_id,
            page: request.page(),
            limit: request.limit(),
        };

        self.cache
            .get_or_compute(&key, || self.load_page(post_id, request))
            .await
    }

    /// A single comment with its direct replies in reply order.
    #[instrument(skip(self))]
    pub async fn get(&self, comment_id: Uuid) -> Result<CommentView, AppError> {
        self.cache
            .get_or_compute(&CacheKey::Comment(comment_id), || {
                self.load_comment(comment_id)
            })
            .await
    }

    /// Direct replies of a comment, oldest first.
    #[instrument(skip(self))]
    pub async fn get_replies(&self, comment_id: Uuid) -> Result<Vec<CommentView>, AppError> {
        self.cache
            .get_or_compute(&CacheKey::CommentReplies(comment_id), || {
                self.load_replies(comment_id)
            })
            .await
    }

    async fn load_page(&self, post_id: Uuid, request: PageRequest) -> Result<CommentPage, AppError> {
        if !self.posts.exists(post_id).await? {
            return Err(DomainError::not_found("post").into());
        }

        let top_level = self
            .comments
            .list_top_level(post_id, request.offset(), request.limit())
            .await?;
        let total = self.comments.count_top_level(post_id).await?;
        let roots: Vec<Uuid> = top_level.iter().map(|comment| comment.id).collect();

        let mut arena = CommentArena::new();
        arena.extend(top_level);

        // Load one tree level per round trip. Ids already in the arena are
        // never requested again, so the loop ends even on corrupted data.
        let mut frontier = roots.clone();
        let mut levels: u8 = 0;
        loop {
            let pending = arena.pending_children(&frontier);
            if pending.is_empty() {
                break;
            }
            let children = self.comments.find_comments(&pending).await?;
            if children.is_empty() {
                break;
            }
            frontier = children.iter().map(|comment| comment.id).collect();
            arena.extend(children);
            levels = levels.saturating_add(1);
        }

        let authors = self.resolve_authors(arena.author_ids()).await?;
        let comments = roots
            .into_iter()
            .filter_map(|root| arena.assemble(root, levels))
            .map(|node| node_view(node, &authors))
            .collect();

        Ok(CommentPage {
            comments,
            pagination: request.meta(total),
        })
    }

    async fn load_comment(&self, comment_id: Uuid) -> Result<CommentView, AppError> {
        let comment = self
            .comments
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment"))?;

        let mut replies = self.comments.find_comments(&comment.reply_ids).await?;
        replies.sort_by_key(|reply| {
            comment
                .reply_ids
                .iter()
                .position(|id| *id == reply.id)
                .unwrap_or(usize::MAX)
        });

        let authors = self
            .resolve_authors(
                std::iter::once(comment.author_id).chain(replies.iter().map(|r| r.author_id)),
            )
            .await?;
        let replies = replies
            .into_iter()
            .map(|reply| record_view(reply, &authors))
            .collect();

        Ok(with_replies(comment, replies, &authors))
    }

    async fn load_replies(&self, comment_id: Uuid) -> Result<Vec<CommentView>, AppError> {
        if self.comments.find_comment(comment_id).await?.is_none() {
            return Err(DomainError::not_found("comment").into());
        }

        let replies = self.comments.list_children(comment_id).await?;
        let authors = self
            .resolve_authors(replies.iter().map(|reply| reply.author_id))
            .await?;

        Ok(replies
            .into_iter()
            .map(|reply| record_view(reply, &authors))
            .collect())
    }
}

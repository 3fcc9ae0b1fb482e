//! In-process repository implementations.
//!
//! Every trait call takes the state lock once, so each operation is atomic in
//! the same way a single Postgres statement is. Used by the integration tests
//! and for running the services without a database.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use murmur_api_types::AuthorSummary;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{
    CommentQueryFilter, CommentSortField, CommentsRepo, CreateCommentParams, PostsRepo, RepoError,
    SortOrder, UsersRepo,
};
use crate::domain::entities::{CommentRecord, PostSummary};

#[derive(Default)]
struct MemoryState {
    comments: HashMap<Uuid, CommentRecord>,
    posts: HashMap<Uuid, PostSummary>,
    users: HashMap<Uuid, AuthorSummary>,
    last_created_at: Option<OffsetDateTime>,
}

impl MemoryState {
    /// Creation timestamps are strictly increasing so that ordering by time
    /// is deterministic even for inserts within the same clock tick.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(next);
        next
    }

    fn comments_matching<'a>(
        &'a self,
        filter: &'a CommentQueryFilter,
    ) -> impl Iterator<Item = &'a CommentRecord> + 'a {
        self.comments.values().filter(move |comment| {
            filter.post_id.is_none_or(|id| comment.post_id == id)
                && filter.author_id.is_none_or(|id| comment.author_id == id)
                && filter.is_deleted.is_none_or(|flag| comment.is_deleted == flag)
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, name: impl Into<String>, avatar: Option<String>) -> Uuid {
        let id = Uuid::new_v4();
        let user = AuthorSummary {
            id,
            name: name.into(),
            avatar,
        };
        self.state.write().await.users.insert(id, user);
        id
    }

    pub async fn insert_post(&self, author_id: Uuid, published: bool) -> Uuid {
        let id = Uuid::new_v4();
        let post = PostSummary {
            id,
            author_id,
            published,
            comments_count: 0,
        };
        self.state.write().await.posts.insert(id, post);
        id
    }

    pub async fn set_published(&self, post_id: Uuid, published: bool) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        post.published = published;
        Ok(())
    }

    pub async fn comment_total(&self) -> usize {
        self.state.read().await.comments.len()
    }
}

fn page<'a>(
    records: impl Iterator<Item = &'a CommentRecord>,
    offset: u64,
    limit: u32,
) -> Vec<CommentRecord> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    records
        .skip(offset)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.state.read().await.comments.get(&id).cloned())
    }

    async fn find_comments(&self, ids: &[Uuid]) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.comments.get(id).cloned())
            .collect())
    }

    async fn list_top_level(
        &self,
        post_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        let mut top_level: Vec<&CommentRecord> = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id && comment.is_top_level())
            .collect();
        top_level.sort_by_key(|comment| Reverse((comment.created_at, comment.id)));
        Ok(page(top_level.into_iter(), offset, limit))
    }

    async fn count_top_level(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id && comment.is_top_level())
            .count() as u64)
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        let mut children: Vec<CommentRecord> = state
            .comments
            .values()
            .filter(|comment| comment.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|comment| (comment.created_at, comment.id));
        Ok(children)
    }

    async fn count_live(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id && !comment.is_deleted)
            .count() as u64)
    }

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        let mut matching: Vec<&CommentRecord> = state.comments_matching(filter).collect();
        matching.sort_by_key(|comment| match filter.sort_by {
            CommentSortField::CreatedAt => (comment.created_at, comment.id),
            CommentSortField::UpdatedAt => (comment.updated_at, comment.id),
        });
        if filter.order == SortOrder::Desc {
            matching.reverse();
        }
        Ok(page(matching.into_iter(), offset, limit))
    }

    async fn count_comments(&self, filter: &CommentQueryFilter) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state.comments_matching(filter).count() as u64)
    }

    async fn insert_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("post `{}` does not exist", params.post_id),
            });
        }
        if let Some(parent_id) = params.parent_id {
            if !state.comments.contains_key(&parent_id) {
                return Err(RepoError::InvalidInput {
                    message: format!("parent comment `{parent_id}` does not exist"),
                });
            }
        }

        let now = state.next_timestamp();
        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            author_id: params.author_id,
            content: params.content,
            parent_id: params.parent_id,
            reply_ids: Vec::new(),
            depth: params.depth,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn push_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let parent = state
            .comments
            .get_mut(&parent_id)
            .ok_or(RepoError::NotFound)?;
        parent.reply_ids.push(child_id);
        Ok(())
    }

    async fn pull_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if let Some(parent) = state.comments.get_mut(&parent_id) {
            parent.reply_ids.retain(|id| *id != child_id);
        }
        Ok(())
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        let comment = state.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        comment.content = content.to_string();
        comment.updated_at = updated_at;
        Ok(comment.clone())
    }

    async fn set_deleted(
        &self,
        id: Uuid,
        is_deleted: bool,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<Option<CommentRecord>, RepoError> {
        let mut state = self.state.write().await;
        let Some(comment) = state.comments.get_mut(&id) else {
            return Ok(None);
        };
        if comment.is_deleted == is_deleted {
            return Ok(None);
        }
        comment.is_deleted = is_deleted;
        comment.content = content.to_string();
        comment.updated_at = updated_at;
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.state.write().await.comments.remove(&id).is_some())
    }

    async fn delete_comments_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.state.write().await;
        let before = state.comments.len();
        state.comments.retain(|_, comment| comment.post_id != post_id);
        Ok((before - state.comments.len()) as u64)
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn find_post(&self, post_id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        Ok(self.state.read().await.posts.get(&post_id).cloned())
    }

    async fn increment_comments_count(&self, post_id: Uuid, delta: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        post.comments_count = (post.comments_count + delta).max(0);
        Ok(())
    }

    async fn set_comments_count(&self, post_id: Uuid, count: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&post_id).ok_or(RepoError::NotFound)?;
        post.comments_count = count;
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepositories {
    async fn resolve_author_summaries(
        &self,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AuthorSummary>, RepoError> {
        let state = self.state.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.users.get(id).map(|user| (*id, user.clone())))
            .collect())
    }
}

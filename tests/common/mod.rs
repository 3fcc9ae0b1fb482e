#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use murmur::application::comments::CommentService;
use murmur::application::repos::{
    CommentQueryFilter, CommentsRepo, CreateCommentParams, PostsRepo, RepoError,
};
use murmur::cache::{CacheBackend, CacheConfig, CacheCoordinator, CacheError, MemoryCacheBackend};
use murmur::domain::entities::CommentRecord;
use murmur::infra::memory::InMemoryRepositories;
use time::OffsetDateTime;
use tokio::sync::Barrier;
use uuid::Uuid;

/// Service wired to in-memory repositories and a caller-chosen cache.
pub struct Harness {
    pub repos: InMemoryRepositories,
    pub service: CommentService,
    pub post_author: Uuid,
    pub alice: Uuid,
    pub bob: Uuid,
    pub admin: Uuid,
    pub post_id: Uuid,
}

impl Harness {
    pub async fn with_cache(cache: CacheCoordinator) -> Self {
        let repos = InMemoryRepositories::new();
        let comments = Arc::new(repos.clone());
        Self::seed(repos, comments, cache).await
    }

    /// Comment lookups go through a [`LockstepComments`] gate, which starts
    /// disarmed.
    pub async fn lockstep() -> (Self, Arc<LockstepComments>) {
        let repos = InMemoryRepositories::new();
        let gate = Arc::new(LockstepComments::new(repos.clone()));
        let cache = CacheCoordinator::from_config(CacheConfig::default());
        (Self::seed(repos, gate.clone(), cache).await, gate)
    }

    async fn seed(
        repos: InMemoryRepositories,
        comments: Arc<dyn CommentsRepo>,
        cache: CacheCoordinator,
    ) -> Self {
        let post_author = repos.insert_user("Writer", None).await;
        let alice = repos
            .insert_user("Alice", Some("https://img.example/alice.png".to_string()))
            .await;
        let bob = repos.insert_user("Bob", None).await;
        let admin = repos.insert_user("Moderator", None).await;
        let post_id = repos.insert_post(post_author, true).await;

        let shared = Arc::new(repos.clone());
        let service = CommentService::new(comments, shared.clone(), shared, cache);

        Self {
            repos,
            service,
            post_author,
            alice,
            bob,
            admin,
            post_id,
        }
    }

    /// Backed by a fresh in-memory LRU with default TTLs.
    pub async fn cached() -> Self {
        Self::with_cache(CacheCoordinator::from_config(CacheConfig::default())).await
    }

    pub async fn uncached() -> Self {
        Self::with_cache(CacheCoordinator::disabled()).await
    }

    pub async fn failing_cache() -> (Self, Arc<FailingBackend>) {
        let backend = Arc::new(FailingBackend::default());
        let cache = CacheCoordinator::new(backend.clone(), CacheConfig::default());
        (Self::with_cache(cache).await, backend)
    }

    /// Shares the backend with the caller so tests can inspect entries.
    pub async fn with_memory_backend() -> (Self, Arc<MemoryCacheBackend>) {
        let config = CacheConfig::default();
        let backend = Arc::new(MemoryCacheBackend::new(&config));
        let cache = CacheCoordinator::new(backend.clone(), config);
        (Self::with_cache(cache).await, backend)
    }

    pub async fn comments_count(&self) -> i64 {
        self.repos
            .find_post(self.post_id)
            .await
            .expect("post lookup")
            .expect("post exists")
            .comments_count
    }

    pub async fn live_count(&self) -> i64 {
        let live = self.repos.count_live(self.post_id).await.expect("live count");
        i64::try_from(live).expect("live count fits i64")
    }
}

/// Comments repository whose next two `find_comment` calls, once armed,
/// wait for each other. Two racing operations therefore read the same
/// state before either of them writes.
pub struct LockstepComments {
    inner: InMemoryRepositories,
    barrier: Barrier,
    pending: AtomicUsize,
}

impl LockstepComments {
    const PARTIES: usize = 2;

    fn new(inner: InMemoryRepositories) -> Self {
        Self {
            inner,
            barrier: Barrier::new(Self::PARTIES),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.pending.store(Self::PARTIES, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommentsRepo for LockstepComments {
    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let gated = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let found = self.inner.find_comment(id).await;
        if gated {
            self.barrier.wait().await;
        }
        found
    }

    async fn find_comments(&self, ids: &[Uuid]) -> Result<Vec<CommentRecord>, RepoError> {
        self.inner.find_comments(ids).await
    }

    async fn list_top_level(
        &self,
        post_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.inner.list_top_level(post_id, offset, limit).await
    }

    async fn count_top_level(&self, post_id: Uuid) -> Result<u64, RepoError> {
        self.inner.count_top_level(post_id).await
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        self.inner.list_children(parent_id).await
    }

    async fn count_live(&self, post_id: Uuid) -> Result<u64, RepoError> {
        self.inner.count_live(post_id).await
    }

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.inner.list_comments(filter, offset, limit).await
    }

    async fn count_comments(&self, filter: &CommentQueryFilter) -> Result<u64, RepoError> {
        self.inner.count_comments(filter).await
    }

    async fn insert_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.inner.insert_comment(params).await
    }

    async fn push_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError> {
        self.inner.push_reply(parent_id, child_id).await
    }

    async fn pull_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError> {
        self.inner.pull_reply(parent_id, child_id).await
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<CommentRecord, RepoError> {
        self.inner.update_content(id, content, updated_at).await
    }

    async fn set_deleted(
        &self,
        id: Uuid,
        is_deleted: bool,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<Option<CommentRecord>, RepoError> {
        self.inner.set_deleted(id, is_deleted, content, updated_at).await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        self.inner.delete_comment(id).await
    }

    async fn delete_comments_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        self.inner.delete_comments_for_post(post_id).await
    }
}

/// Backend that fails every call, counting attempts.
#[derive(Default)]
pub struct FailingBackend {
    pub calls: AtomicUsize,
}

impl FailingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::unavailable("connection refused"))
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.fail()
    }

    async fn set_with_ttl(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        self.fail()
    }

    async fn list_keys(&self, _pattern: &str) -> Result<Vec<String>, CacheError> {
        self.fail()
    }
}

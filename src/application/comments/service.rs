use std::sync::Arc;

use crate::application::pagination::PageLimits;
use crate::application::repos::{CommentsRepo, PostsRepo, UsersRepo};
use crate::cache::CacheCoordinator;
use crate::domain::comments::CommentRules;

/// Threaded comments for posts.
///
/// Reads go through the cache coordinator; every mutation writes to the
/// store first and invalidates the affected cache families afterwards.
#[derive(Clone)]
pub struct CommentService {
    pub(crate) comments: Arc<dyn CommentsRepo>,
    pub(crate) posts: Arc<dyn PostsRepo>,
    pub(crate) users: Arc<dyn UsersRepo>,
    pub(crate) cache: CacheCoordinator,
    pub(crate) rules: CommentRules,
    pub(crate) page_limits: PageLimits,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        cache: CacheCoordinator,
    ) -> Self {
        Self {
            comments,
            posts,
            users,
            cache,
            rules: CommentRules::default(),
            page_limits: PageLimits::default(),
        }
    }

    pub fn with_rules(mut self, rules: CommentRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.page_limits = limits;
        self
    }

    pub fn rules(&self) -> &CommentRules {
        &self.rules
    }

    pub fn cache(&self) -> &CacheCoordinator {
        &self.cache
    }
}

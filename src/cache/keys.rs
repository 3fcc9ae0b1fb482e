//! Cache key-space.
//!
//! Keys render to colon-separated strings so that a family of entries can be
//! dropped with one glob pattern. Comment, post and user stores share this
//! key-space, which is why invalidation for one entity class may reach keys
//! owned by another.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use super::config::CacheConfig;

const PREFIX_POST: &str = "post";
const PREFIX_POST_LIST: &str = "posts";
const PREFIX_COMMENT: &str = "comment";
const PREFIX_COMMENTS: &str = "comments";
const PREFIX_USER_POSTS: &str = "user_posts";

/// A single cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `comment:<id>`
    Comment(Uuid),
    /// `comments:post:<postId>:p<page>:l<limit>`
    PostComments { post_id: Uuid, page: u32, limit: u32 },
    /// `comments:replies:<commentId>`
    CommentReplies(Uuid),
}

impl CacheKey {
    pub fn ttl(&self, config: &CacheConfig) -> Duration {
        config.comment_ttl()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Comment(id) => write!(f, "{PREFIX_COMMENT}:{id}"),
            CacheKey::PostComments {
                post_id,
                page,
                limit,
            } => write!(f, "{PREFIX_COMMENTS}:post:{post_id}:p{page}:l{limit}"),
            CacheKey::CommentReplies(id) => write!(f, "{PREFIX_COMMENTS}:replies:{id}"),
        }
    }
}

/// A glob selecting a family of cache entries.
///
/// The post families are owned by the post store; comment mutations that
/// change a post's counter still have to drop them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPattern {
    /// Exactly one key.
    Exact(CacheKey),
    /// Every page of a post's comment listing.
    PostComments(Uuid),
    /// The reply cache of one comment.
    CommentReplies(Uuid),
    /// Every comment listing and reply cache.
    AllCommentLists,
    /// Every single-comment entry.
    AllComments,
    /// The id-addressed entry of one post.
    Post(Uuid),
    /// Every slug-addressed post entry.
    AllPostSlugs,
    /// Every post list.
    AllPostLists,
    /// Every post list of one author.
    UserPosts(Uuid),
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPattern::Exact(key) => write!(f, "{key}"),
            KeyPattern::PostComments(post_id) => write!(f, "{PREFIX_COMMENTS}:post:{post_id}*"),
            KeyPattern::CommentReplies(id) => write!(f, "{PREFIX_COMMENTS}:replies:{id}*"),
            KeyPattern::AllCommentLists => write!(f, "{PREFIX_COMMENTS}:*"),
            KeyPattern::AllComments => write!(f, "{PREFIX_COMMENT}:*"),
            KeyPattern::Post(post_id) => write!(f, "{PREFIX_POST}:{post_id}"),
            KeyPattern::AllPostSlugs => write!(f, "{PREFIX_POST}:slug:*"),
            KeyPattern::AllPostLists => write!(f, "{PREFIX_POST_LIST}:*"),
            KeyPattern::UserPosts(user_id) => write!(f, "{PREFIX_USER_POSTS}:{user_id}*"),
        }
    }
}

impl From<CacheKey> for KeyPattern {
    fn from(key: CacheKey) -> Self {
        KeyPattern::Exact(key)
    }
}

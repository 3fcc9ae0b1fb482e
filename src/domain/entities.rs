//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub reply_ids: Vec<Uuid>,
    pub depth: u8,
    pub is_deleted: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl CommentRecord {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_replies(&self) -> bool {
        !self.reply_ids.is_empty()
    }

    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }
}

/// The slice of a post the comment subsystem depends on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: Uuid,
    pub author_id: Uuid,
    pub published: bool,
    pub comments_count: i64,
}

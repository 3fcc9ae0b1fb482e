use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::PostSummary;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostSummaryRow {
    id: Uuid,
    author_id: Uuid,
    published: bool,
    comments_count: i64,
}

impl From<PostSummaryRow> for PostSummary {
    fn from(row: PostSummaryRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            published: row.published,
            comments_count: row.comments_count,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post(&self, post_id: Uuid) -> Result<Option<PostSummary>, RepoError> {
        let row = sqlx::query_as::<_, PostSummaryRow>(
            "SELECT id, author_id, published, comments_count FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostSummary::from))
    }

    async fn increment_comments_count(&self, post_id: Uuid, delta: i64) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE posts SET comments_count = GREATEST(comments_count + $2, 0) WHERE id = $1",
        )
        .bind(post_id)
        .bind(delta)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_comments_count(&self, post_id: Uuid, count: i64) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE posts SET comments_count = $2 WHERE id = $1")
            .bind(post_id)
            .bind(count)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn exists(&self, post_id: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}

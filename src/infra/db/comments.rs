use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentQueryFilter, CommentSortField, CommentsRepo, CreateCommentParams, RepoError, SortOrder,
};
use crate::domain::entities::CommentRecord;

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str = "id, post_id, author_id, content, parent_id, reply_ids, depth, \
    is_deleted, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    parent_id: Option<Uuid>,
    reply_ids: Vec<Uuid>,
    depth: i16,
    is_deleted: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CommentRow> for CommentRecord {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let depth = u8::try_from(row.depth).map_err(|_| RepoError::Integrity {
            message: format!("comment `{}` has out-of-range depth {}", row.id, row.depth),
        })?;

        Ok(Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            content: row.content,
            parent_id: row.parent_id,
            reply_ids: row.reply_ids,
            depth,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<CommentRow>) -> Result<Vec<CommentRecord>, RepoError> {
    rows.into_iter().map(CommentRecord::try_from).collect()
}

fn push_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q CommentQueryFilter) {
    qb.push(" WHERE TRUE");
    if let Some(post_id) = filter.post_id {
        qb.push(" AND post_id = ");
        qb.push_bind(post_id);
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND author_id = ");
        qb.push_bind(author_id);
    }
    if let Some(is_deleted) = filter.is_deleted {
        qb.push(" AND is_deleted = ");
        qb.push_bind(is_deleted);
    }
}

fn order_clause(filter: &CommentQueryFilter) -> &'static str {
    match (filter.sort_by, filter.order) {
        (CommentSortField::CreatedAt, SortOrder::Desc) => " ORDER BY created_at DESC, id DESC",
        (CommentSortField::CreatedAt, SortOrder::Asc) => " ORDER BY created_at ASC, id ASC",
        (CommentSortField::UpdatedAt, SortOrder::Desc) => " ORDER BY updated_at DESC, id DESC",
        (CommentSortField::UpdatedAt, SortOrder::Asc) => " ORDER BY updated_at ASC, id ASC",
    }
}

impl PostgresRepositories {
    async fn fetch_one_comment(
        &self,
        sql: &str,
        id: Uuid,
    ) -> Result<Option<CommentRecord>, RepoError> {
        sqlx::query_as::<_, CommentRow>(sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .map(CommentRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        self.fetch_one_comment(&sql, id).await
    }

    async fn find_comments(&self, ids: &[Uuid]) -> Result<Vec<CommentRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn list_top_level(
        &self,
        post_id: Uuid,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE post_id = $1 AND parent_id IS NULL \
             ORDER BY created_at DESC, id DESC \
             OFFSET $2 LIMIT $3"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .bind(to_i64(offset)?)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn count_top_level(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND parent_id IS NULL",
        )
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE parent_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(parent_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn count_live(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND is_deleted = FALSE",
        )
        .bind(post_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn list_comments(
        &self,
        filter: &CommentQueryFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(COMMENT_COLUMNS);
        qb.push(" FROM comments");
        push_filter(&mut qb, filter);
        qb.push(order_clause(filter));
        qb.push(" OFFSET ");
        qb.push_bind(to_i64(offset)?);
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        into_records(rows)
    }

    async fn count_comments(&self, filter: &CommentQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM comments");
        push_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Self::convert_count(count)
    }

    async fn insert_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO comments (id, post_id, author_id, content, parent_id, depth) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(params.post_id)
            .bind(params.author_id)
            .bind(&params.content)
            .bind(params.parent_id)
            .bind(i16::from(params.depth))
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.try_into()
    }

    async fn push_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE comments SET reply_ids = array_append(reply_ids, $2) WHERE id = $1",
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        ensure_affected(result.rows_affected())
    }

    async fn pull_reply(&self, parent_id: Uuid, child_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("UPDATE comments SET reply_ids = array_remove(reply_ids, $2) WHERE id = $1")
            .bind(parent_id)
            .bind(child_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<CommentRecord, RepoError> {
        let sql = format!(
            "UPDATE comments SET content = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(content)
            .bind(updated_at)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        row.try_into()
    }

    async fn set_deleted(
        &self,
        id: Uuid,
        is_deleted: bool,
        content: &str,
        updated_at: OffsetDateTime,
    ) -> Result<Option<CommentRecord>, RepoError> {
        let sql = format!(
            "UPDATE comments SET is_deleted = $2, content = $3, updated_at = $4 \
             WHERE id = $1 AND is_deleted <> $2 \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .bind(is_deleted)
            .bind(content)
            .bind(updated_at)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.map(CommentRecord::try_from).transpose()
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_comments_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(post_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

fn to_i64(value: u64) -> Result<i64, RepoError> {
    i64::try_from(value).map_err(|_| RepoError::InvalidInput {
        message: format!("offset {value} exceeds supported range"),
    })
}

fn ensure_affected(rows: u64) -> Result<(), RepoError> {
    if rows == 0 {
        Err(RepoError::NotFound)
    } else {
        Ok(())
    }
}

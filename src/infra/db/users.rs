use std::collections::HashMap;

use async_trait::async_trait;
use murmur_api_types::AuthorSummary;
use uuid::Uuid;

use crate::application::repos::{RepoError, UsersRepo};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: Uuid,
    name: String,
    avatar: Option<String>,
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn resolve_author_summaries(
        &self,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, AuthorSummary>, RepoError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, name, avatar FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    AuthorSummary {
                        id: row.id,
                        name: row.name,
                        avatar: row.avatar,
                    },
                )
            })
            .collect())
    }
}

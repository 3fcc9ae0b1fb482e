//! Comment service against a real Postgres database.
//!
//! Run with `DATABASE_URL` pointing at a scratch server and `--ignored`.

use std::collections::HashSet;
use std::sync::Arc;

use murmur::application::comments::CommentService;
use murmur::application::repos::{CommentsRepo, PostsRepo};
use murmur::cache::{CacheConfig, CacheCoordinator};
use murmur::domain::comments::{Actor, DeleteMode};
use murmur::infra::db::PostgresRepositories;
use murmur_api_types::{CreateCommentRequest, ListCommentsQuery};
use sqlx::PgPool;
use uuid::Uuid;

async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .expect("insert user");
    id
}

async fn seed_post(pool: &PgPool, author_id: Uuid, published: bool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO posts (id, author_id, slug, published) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(author_id)
        .bind(format!("post-{id}"))
        .bind(published)
        .execute(pool)
        .await
        .expect("insert post");
    id
}

fn service(pool: PgPool) -> (CommentService, Arc<PostgresRepositories>) {
    let repos = Arc::new(PostgresRepositories::new(pool));
    let service = CommentService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        CacheCoordinator::from_config(CacheConfig::default()),
    );
    (service, repos)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn comment_indexes_exist(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'comments'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch comment indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    for name in [
        "comments_top_level_idx",
        "comments_parent_idx",
        "comments_post_live_idx",
        "comments_author_idx",
    ] {
        assert!(indexes.contains(name), "missing {name}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn reply_lifecycle_round_trips_through_postgres(pool: PgPool) {
    let writer = seed_user(&pool, "Writer").await;
    let reader = seed_user(&pool, "Reader").await;
    let admin = seed_user(&pool, "Moderator").await;
    let post_id = seed_post(&pool, writer, true).await;
    let (service, repos) = service(pool);

    let c1 = service
        .create(
            post_id,
            reader,
            CreateCommentRequest {
                content: "hello".to_string(),
                parent_id: None,
            },
        )
        .await
        .expect("c1");
    let c2 = service
        .create(
            post_id,
            writer,
            CreateCommentRequest {
                content: "hi".to_string(),
                parent_id: Some(c1.id),
            },
        )
        .await
        .expect("c2");
    assert_eq!(c2.depth, 1);
    assert_eq!(c2.author.name, "Writer");

    let stored = repos.find_comment(c1.id).await.expect("find").expect("c1");
    assert_eq!(stored.reply_ids, vec![c2.id]);
    let post = repos.find_post(post_id).await.expect("find").expect("post");
    assert_eq!(post.comments_count, 2);

    service
        .delete(c1.id, &Actor::member(reader), DeleteMode::Standard)
        .await
        .expect("soft delete");
    let page = service
        .list_for_post(post_id, &ListCommentsQuery::default())
        .await
        .expect("page");
    assert!(page.comments[0].is_deleted);
    assert_eq!(page.comments[0].replies[0].id, c2.id);

    service
        .delete(c2.id, &Actor::admin(admin), DeleteMode::Hard)
        .await
        .expect("hard delete");
    let stored = repos.find_comment(c1.id).await.expect("find").expect("c1");
    assert!(stored.reply_ids.is_empty());
    let post = repos.find_post(post_id).await.expect("find").expect("post");
    assert_eq!(post.comments_count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unpublished_post_rejects_comments(pool: PgPool) {
    let writer = seed_user(&pool, "Writer").await;
    let post_id = seed_post(&pool, writer, false).await;
    let (service, repos) = service(pool);

    let result = service
        .create(
            post_id,
            writer,
            CreateCommentRequest {
                content: "draft".to_string(),
                parent_id: None,
            },
        )
        .await;
    assert!(result.is_err());
    assert!(!repos.is_published(post_id).await.expect("published flag"));
}

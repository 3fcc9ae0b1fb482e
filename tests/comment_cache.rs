//! Read-through cache behaviour as seen through the comment service.

mod common;

use std::time::Duration;

use common::Harness;
use murmur::application::repos::CommentsRepo;
use murmur::cache::{CacheBackend, CacheKey};
use murmur::domain::comments::{Actor, DeleteMode};
use murmur_api_types::{
    CreateCommentRequest, ListCommentsQuery, RestoreCommentRequest, UpdateCommentRequest,
};
use time::OffsetDateTime;
use uuid::Uuid;

fn top_level(content: &str) -> CreateCommentRequest {
    CreateCommentRequest {
        content: content.to_string(),
        parent_id: None,
    }
}

fn reply(content: &str, parent_id: Uuid) -> CreateCommentRequest {
    CreateCommentRequest {
        content: content.to_string(),
        parent_id: Some(parent_id),
    }
}

fn first_page_key(post_id: Uuid) -> String {
    CacheKey::PostComments {
        post_id,
        page: 1,
        limit: 20,
    }
    .to_string()
}

#[tokio::test]
async fn page_reads_are_served_from_cache_until_a_mutation() {
    let (h, backend) = Harness::with_memory_backend().await;
    let root = h
        .service
        .create(h.post_id, h.alice, top_level("root"))
        .await
        .expect("root");

    let first = h
        .service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("first read");
    assert!(
        backend
            .get(&first_page_key(h.post_id))
            .await
            .expect("backend read")
            .is_some()
    );

    // A direct store write bypasses invalidation, so the cached page wins.
    h.repos
        .update_content(root.id, "behind the cache", OffsetDateTime::now_utc())
        .await
        .expect("direct write");
    let cached = h
        .service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("cached read");
    assert_eq!(cached, first);

    h.service
        .create(h.post_id, h.bob, reply("reply", root.id))
        .await
        .expect("reply");
    assert!(
        backend
            .get(&first_page_key(h.post_id))
            .await
            .expect("backend read")
            .is_none()
    );

    let fresh = h
        .service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("fresh read");
    assert_eq!(fresh.comments[0].content, "behind the cache");
    assert_eq!(fresh.comments[0].replies.len(), 1);
}

#[tokio::test]
async fn every_mutation_is_visible_to_the_next_read() {
    let h = Harness::cached().await;
    let query = ListCommentsQuery::default();
    let root = h
        .service
        .create(h.post_id, h.alice, top_level("root"))
        .await
        .expect("root");
    let child = h
        .service
        .create(h.post_id, h.bob, reply("child", root.id))
        .await
        .expect("child");

    // Warm every cache family touched below.
    h.service.list_for_post(h.post_id, &query).await.expect("page");
    h.service.get(root.id).await.expect("root");
    h.service.get(child.id).await.expect("child");
    h.service.get_replies(root.id).await.expect("replies");

    h.service
        .update(
            child.id,
            &Actor::member(h.bob),
            UpdateCommentRequest {
                content: "child v2".to_string(),
            },
        )
        .await
        .expect("update");
    let page = h.service.list_for_post(h.post_id, &query).await.expect("page");
    assert_eq!(page.comments[0].replies[0].content, "child v2");
    assert_eq!(
        h.service.get(child.id).await.expect("child").content,
        "child v2"
    );
    assert_eq!(
        h.service.get_replies(root.id).await.expect("replies")[0].content,
        "child v2"
    );
    assert_eq!(
        h.service.get(root.id).await.expect("root").replies[0].content,
        "child v2"
    );

    let second = h
        .service
        .create(h.post_id, h.alice, reply("second", root.id))
        .await
        .expect("second reply");
    let replies = h.service.get_replies(root.id).await.expect("replies");
    assert_eq!(replies.len(), 2);
    assert_eq!(
        h.service.get(root.id).await.expect("root").reply_ids,
        vec![child.id, second.id]
    );

    h.service
        .delete(root.id, &Actor::member(h.alice), DeleteMode::Standard)
        .await
        .expect("soft delete");
    let page = h.service.list_for_post(h.post_id, &query).await.expect("page");
    assert!(page.comments[0].is_deleted);
    assert!(h.service.get(root.id).await.expect("root").is_deleted);

    h.service
        .restore(
            root.id,
            RestoreCommentRequest {
                original_content: "root again".to_string(),
            },
        )
        .await
        .expect("restore");
    let page = h.service.list_for_post(h.post_id, &query).await.expect("page");
    assert_eq!(page.comments[0].content, "root again");
    assert!(!page.comments[0].is_deleted);

    h.service
        .delete(second.id, &Actor::member(h.alice), DeleteMode::Standard)
        .await
        .expect("leaf delete");
    let replies = h.service.get_replies(root.id).await.expect("replies");
    assert_eq!(replies.len(), 1);
    assert_eq!(
        h.service.get(root.id).await.expect("root").reply_ids,
        vec![child.id]
    );

    h.service
        .delete(root.id, &Actor::admin(h.admin), DeleteMode::Hard)
        .await
        .expect("cascade");
    let page = h.service.list_for_post(h.post_id, &query).await.expect("page");
    assert!(page.comments.is_empty());
    assert!(h.service.get(child.id).await.is_err());
    assert!(h.service.get_replies(root.id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn stale_entries_heal_once_the_ttl_elapses() {
    let (h, _backend) = Harness::with_memory_backend().await;
    let ttl = Duration::from_secs(h.service.cache().config().comment_ttl_seconds);
    let root = h
        .service
        .create(h.post_id, h.alice, top_level("before"))
        .await
        .expect("root");

    h.service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("warm");
    h.repos
        .update_content(root.id, "after", OffsetDateTime::now_utc())
        .await
        .expect("direct write");

    tokio::time::advance(ttl - Duration::from_secs(1)).await;
    let stale = h
        .service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("stale read");
    assert_eq!(stale.comments[0].content, "before");

    tokio::time::advance(Duration::from_secs(2)).await;
    let healed = h
        .service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("healed read");
    assert_eq!(healed.comments[0].content, "after");
}

#[tokio::test]
async fn failing_backend_never_fails_the_caller() {
    let (h, backend) = Harness::failing_cache().await;
    let query = ListCommentsQuery::default();

    let root = h
        .service
        .create(h.post_id, h.alice, top_level("root"))
        .await
        .expect("create despite cache outage");
    let child = h
        .service
        .create(h.post_id, h.bob, reply("child", root.id))
        .await
        .expect("reply despite cache outage");

    let page = h.service.list_for_post(h.post_id, &query).await.expect("list");
    assert_eq!(page.comments.len(), 1);
    assert_eq!(page.comments[0].replies[0].id, child.id);
    assert_eq!(h.service.get(root.id).await.expect("get").reply_ids, vec![child.id]);
    assert_eq!(h.service.get_replies(root.id).await.expect("replies").len(), 1);

    h.service
        .update(
            child.id,
            &Actor::member(h.bob),
            UpdateCommentRequest {
                content: "edited".to_string(),
            },
        )
        .await
        .expect("update");
    h.service
        .delete(root.id, &Actor::member(h.alice), DeleteMode::Standard)
        .await
        .expect("soft delete");
    h.service
        .restore(
            root.id,
            RestoreCommentRequest {
                original_content: "root".to_string(),
            },
        )
        .await
        .expect("restore");
    h.service
        .delete(root.id, &Actor::admin(h.admin), DeleteMode::Hard)
        .await
        .expect("cascade");

    let page = h.service.list_for_post(h.post_id, &query).await.expect("list");
    assert!(page.comments.is_empty());
    assert_eq!(h.comments_count().await, 0);
    assert!(backend.calls() > 0);
}

#[tokio::test]
async fn disabled_cache_reads_straight_from_the_store() {
    let h = Harness::uncached().await;
    assert!(!h.service.cache().is_enabled());

    let root = h
        .service
        .create(h.post_id, h.alice, top_level("root"))
        .await
        .expect("root");
    h.service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("read");

    h.repos
        .update_content(root.id, "direct", OffsetDateTime::now_utc())
        .await
        .expect("direct write");
    let page = h
        .service
        .list_for_post(h.post_id, &ListCommentsQuery::default())
        .await
        .expect("read");
    assert_eq!(page.comments[0].content, "direct");
}

#[tokio::test]
async fn failed_reads_are_not_cached() {
    let (h, backend) = Harness::with_memory_backend().await;
    let missing = Uuid::new_v4();

    assert!(h.service.get(missing).await.is_err());
    assert!(
        backend
            .get(&CacheKey::Comment(missing).to_string())
            .await
            .expect("backend read")
            .is_none()
    );
    assert!(backend.is_empty());
}

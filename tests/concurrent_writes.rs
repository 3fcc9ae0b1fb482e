//! Racing writes against the same comment. Each case lets both callers read
//! the comment before either writes, then checks that the post counter still
//! matches the live count.

mod common;

use std::fmt::Debug;

use common::Harness;
use murmur::application::error::AppError;
use murmur::application::repos::CommentsRepo;
use murmur::domain::comments::{Actor, DeleteMode, TOMBSTONE};
use murmur::domain::error::DomainError;
use murmur_api_types::{CreateCommentRequest, RestoreCommentRequest};
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

/// Exactly one of the two calls must win; returns the loser's error.
fn single_winner<T: Debug>(first: Result<T, AppError>, second: Result<T, AppError>) -> AppError {
    match (first, second) {
        (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
        other => panic!("expected exactly one success, got {other:?}"),
    }
}

async fn assert_counter_matches_live(h: &Harness, expected: i64) {
    assert_eq!(h.live_count().await, expected);
    assert_eq!(
        h.comments_count().await,
        expected,
        "counter drifted from live count"
    );
}

#[tokio::test]
async fn racing_soft_deletes_apply_once() {
    let (h, gate) = Harness::lockstep().await;
    let parent = h
        .service
        .create(h.post_id, h.alice, top_level("parent"))
        .await
        .expect("parent");
    h.service
        .create(h.post_id, h.bob, reply("child", parent.id))
        .await
        .expect("child");
    h.service
        .create(h.post_id, h.bob, top_level("bystander"))
        .await
        .expect("bystander");
    assert_counter_matches_live(&h, 3).await;

    let actor = Actor::member(h.alice);
    gate.arm();
    let (first, second) = tokio::join!(
        h.service.delete(parent.id, &actor, DeleteMode::Standard),
        h.service.delete(parent.id, &actor, DeleteMode::Standard),
    );

    let err = single_winner(first, second);
    assert!(
        matches!(err, AppError::Domain(DomainError::Validation { .. })),
        "expected validation failure, got {err:?}"
    );
    let stored = h
        .repos
        .find_comment(parent.id)
        .await
        .expect("find")
        .expect("tombstone kept");
    assert!(stored.is_deleted);
    assert_eq!(stored.content, TOMBSTONE);
    assert_counter_matches_live(&h, 2).await;
}

#[tokio::test]
async fn racing_leaf_deletes_decrement_once() {
    let (h, gate) = Harness::lockstep().await;
    let leaf = h
        .service
        .create(h.post_id, h.alice, top_level("leaf"))
        .await
        .expect("leaf");
    h.service
        .create(h.post_id, h.bob, top_level("other"))
        .await
        .expect("other");
    assert_counter_matches_live(&h, 2).await;

    let actor = Actor::member(h.alice);
    gate.arm();
    let (first, second) = tokio::join!(
        h.service.delete(leaf.id, &actor, DeleteMode::Standard),
        h.service.delete(leaf.id, &actor, DeleteMode::Standard),
    );

    match single_winner(first, second) {
        AppError::Domain(DomainError::NotFound { entity }) => assert_eq!(entity, "comment"),
        other => panic!("expected comment not found, got {other:?}"),
    }
    assert_eq!(h.repos.comment_total().await, 1);
    assert_counter_matches_live(&h, 1).await;
}

#[tokio::test]
async fn racing_leaf_deletes_of_a_reply_detach_it_once() {
    let (h, gate) = Harness::lockstep().await;
    let parent = h
        .service
        .create(h.post_id, h.alice, top_level("parent"))
        .await
        .expect("parent");
    let child = h
        .service
        .create(h.post_id, h.bob, reply("child", parent.id))
        .await
        .expect("child");

    let actor = Actor::member(h.bob);
    gate.arm();
    let (first, second) = tokio::join!(
        h.service.delete(child.id, &actor, DeleteMode::Standard),
        h.service.delete(child.id, &actor, DeleteMode::Standard),
    );

    single_winner(first, second);
    let stored = h
        .repos
        .find_comment(parent.id)
        .await
        .expect("find")
        .expect("parent");
    assert!(stored.reply_ids.is_empty());
    assert_counter_matches_live(&h, 1).await;
}

#[tokio::test]
async fn racing_restores_increment_once() {
    let (h, gate) = Harness::lockstep().await;
    let parent = h
        .service
        .create(h.post_id, h.alice, top_level("parent"))
        .await
        .expect("parent");
    h.service
        .create(h.post_id, h.bob, reply("child", parent.id))
        .await
        .expect("child");
    h.service
        .delete(parent.id, &Actor::member(h.alice), DeleteMode::Standard)
        .await
        .expect("soft delete");
    assert_counter_matches_live(&h, 1).await;

    let restore = || RestoreCommentRequest {
        original_content: "parent again".to_string(),
    };
    gate.arm();
    let (first, second) = tokio::join!(
        h.service.restore(parent.id, restore()),
        h.service.restore(parent.id, restore()),
    );

    let err = single_winner(first, second);
    assert!(
        matches!(err, AppError::Domain(DomainError::Validation { .. })),
        "expected validation failure, got {err:?}"
    );
    assert_counter_matches_live(&h, 2).await;
}

#[tokio::test]
async fn racing_replies_to_one_parent_are_both_recorded() {
    let (h, gate) = Harness::lockstep().await;
    let parent = h
        .service
        .create(h.post_id, h.alice, top_level("parent"))
        .await
        .expect("parent");

    gate.arm();
    let (first, second) = tokio::join!(
        h.service.create(h.post_id, h.alice, reply("first", parent.id)),
        h.service.create(h.post_id, h.bob, reply("second", parent.id)),
    );
    let first = first.expect("first reply");
    let second = second.expect("second reply");

    let stored = h
        .repos
        .find_comment(parent.id)
        .await
        .expect("find")
        .expect("parent");
    assert_eq!(stored.reply_ids.len(), 2);
    assert!(stored.reply_ids.contains(&first.id));
    assert!(stored.reply_ids.contains(&second.id));
    assert_eq!(
        h.service.get_replies(parent.id).await.expect("replies").len(),
        2
    );
    assert_counter_matches_live(&h, 3).await;
}

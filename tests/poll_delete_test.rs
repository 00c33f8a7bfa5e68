//! Integration tests for poll deletion

mod common;
use serial_test::serial;

use common::{database::*, fixtures::*};
use sea_orm::{entity::*, query::*};
use votesphere::orm::{comments, poll_options, polls, votes};
use votesphere::poll::{self, PollError};
use votesphere::vote;

#[actix_rt::test]
#[serial]
async fn test_delete_removes_poll_votes_comments_and_options() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let creator = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");
    let voter = create_test_user(&db, "voter", "password123")
        .await
        .expect("Failed to create voter");

    let poll_id = create_test_poll(&db, creator.id, "Doomed poll", &["Red", "Blue"])
        .await
        .expect("Failed to create poll");
    let options = option_ids(&db, poll_id).await.expect("Failed to fetch options");

    vote::cast_vote(&db, poll_id, voter.id, options[0])
        .await
        .expect("Failed to cast vote");
    poll::add_comment(&db, poll_id, voter.id, "Great poll")
        .await
        .expect("Failed to add comment");

    // An unrelated poll that must survive the deletion.
    let other_poll = create_test_poll(&db, creator.id, "Bystander poll", &["Cats", "Dogs"])
        .await
        .expect("Failed to create poll");

    poll::delete_poll(&db, poll_id, creator.id)
        .await
        .expect("Delete should succeed");

    assert!(polls::Entity::find_by_id(poll_id)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .is_none());

    for count in [
        votes::Entity::find()
            .filter(votes::Column::PollId.eq(poll_id))
            .count(&db)
            .await
            .expect("Failed to count votes"),
        comments::Entity::find()
            .filter(comments::Column::PollId.eq(poll_id))
            .count(&db)
            .await
            .expect("Failed to count comments"),
        poll_options::Entity::find()
            .filter(poll_options::Column::PollId.eq(poll_id))
            .count(&db)
            .await
            .expect("Failed to count options"),
    ] {
        assert_eq!(count, 0, "Nothing belonging to the poll survives");
    }

    assert!(polls::Entity::find_by_id(other_poll)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .is_some());

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_only_the_creator_may_delete() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let creator = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");
    let stranger = create_test_user(&db, "stranger", "password123")
        .await
        .expect("Failed to create user");

    let poll_id = create_test_poll(&db, creator.id, "Sturdy poll", &["Red", "Blue"])
        .await
        .expect("Failed to create poll");
    vote::cast_vote(
        &db,
        poll_id,
        stranger.id,
        option_ids(&db, poll_id).await.expect("Failed to fetch options")[0],
    )
    .await
    .expect("Failed to cast vote");

    match poll::delete_poll(&db, poll_id, stranger.id).await {
        Err(PollError::Forbidden) => {}
        other => panic!("Expected Forbidden, got {:?}", other),
    }

    // Everything is still there, the stranger's vote included.
    assert!(polls::Entity::find_by_id(poll_id)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .is_some());
    assert!(vote::has_voted(&db, poll_id, stranger.id)
        .await
        .expect("has_voted failed"));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_delete_missing_poll_is_not_found() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");

    match poll::delete_poll(&db, 999_999, user.id).await {
        Err(PollError::NotFound) => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

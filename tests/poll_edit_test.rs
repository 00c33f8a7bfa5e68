//! Integration tests for poll editing and option protection

mod common;
use sea_orm::EntityTrait;
use serial_test::serial;

use common::{database::*, fixtures::*};
use votesphere::orm::polls;
use votesphere::poll::{self, PollError, PollForm};
use votesphere::vote;

fn edit_form(title: &str, options: &[&str]) -> PollForm {
    PollForm {
        title: title.to_string(),
        description: None,
        end_time: None,
        options: options.iter().map(|s| s.to_string()).collect(),
    }
}

#[actix_rt::test]
#[serial]
async fn test_removing_voted_option_fails_and_changes_nothing() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let creator = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");

    let poll_id = create_test_poll(&db, creator.id, "Keep or drop?", &["X", "Y"])
        .await
        .expect("Failed to create poll");
    let options = option_ids(&db, poll_id).await.expect("Failed to fetch options");

    // Three votes for "X".
    for name in ["voter1", "voter2", "voter3"] {
        let voter = create_test_user(&db, name, "password123")
            .await
            .expect("Failed to create voter");
        vote::cast_vote(&db, poll_id, voter.id, options[0])
            .await
            .expect("Failed to cast vote");
    }

    // Submit an edit that keeps only "Y".
    match poll::edit_poll(&db, poll_id, creator.id, &edit_form("Keep or drop?", &["Y"])).await {
        Err(PollError::CannotRemoveVotedOption(blocked)) => {
            assert_eq!(blocked.len(), 1);
            assert_eq!(blocked[0].option_text, "X");
            assert_eq!(blocked[0].vote_count, 3);
        }
        other => panic!("Expected CannotRemoveVotedOption, got {:?}", other),
    }

    // Poll and options are exactly as before.
    let current = poll::options_with_votes(&db, poll_id)
        .await
        .expect("Failed to fetch options");
    assert_eq!(current.len(), 2);
    assert_eq!(current[0].option_text, "X");
    assert_eq!(current[0].vote_count, 3);
    assert_eq!(current[1].option_text, "Y");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_edit_can_add_options_to_voted_poll() {
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

    let poll_id = create_test_poll(&db, creator.id, "Keep or drop?", &["X", "Y"])
        .await
        .expect("Failed to create poll");
    let options = option_ids(&db, poll_id).await.expect("Failed to fetch options");
    vote::cast_vote(&db, poll_id, voter.id, options[0])
        .await
        .expect("Failed to cast vote");

    poll::edit_poll(&db, poll_id, creator.id, &edit_form("New title here", &["X", "Y", "Z"]))
        .await
        .expect("Edit should succeed");

    let poll = polls::Entity::find_by_id(poll_id)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .expect("Poll not found");
    assert_eq!(poll.title, "New title here");

    let current = poll::options_with_votes(&db, poll_id)
        .await
        .expect("Failed to fetch options");
    let texts: Vec<&str> = current.iter().map(|o| o.option_text.as_str()).collect();
    assert_eq!(texts, vec!["X", "Y", "Z"]);
    // The vote on "X" survived, and the kept options keep their ids.
    assert_eq!(current[0].id, options[0]);
    assert_eq!(current[0].vote_count, 1);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_edit_without_votes_replaces_option_set() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let creator = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");

    let poll_id = create_test_poll(&db, creator.id, "Keep or drop?", &["X", "Y"])
        .await
        .expect("Failed to create poll");

    poll::edit_poll(&db, poll_id, creator.id, &edit_form("Keep or drop?", &["A", "B", "C"]))
        .await
        .expect("Edit should succeed");

    let current = poll::options_with_votes(&db, poll_id)
        .await
        .expect("Failed to fetch options");
    let texts: Vec<&str> = current.iter().map(|o| o.option_text.as_str()).collect();
    assert_eq!(texts, vec!["A", "B", "C"]);
    assert!(current.iter().all(|o| o.vote_count == 0));

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_only_the_creator_may_edit() {
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

    let poll_id = create_test_poll(&db, creator.id, "Keep or drop?", &["X", "Y"])
        .await
        .expect("Failed to create poll");

    match poll::edit_poll(&db, poll_id, stranger.id, &edit_form("Hijacked title", &["X", "Y"])).await
    {
        Err(PollError::Forbidden) => {}
        other => panic!("Expected Forbidden, got {:?}", other),
    }

    let poll = polls::Entity::find_by_id(poll_id)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .expect("Poll not found");
    assert_eq!(poll.title, "Keep or drop?");

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_edit_missing_poll_is_not_found() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let user = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");

    match poll::edit_poll(&db, 999_999, user.id, &edit_form("Whatever here", &["X", "Y"])).await {
        Err(PollError::NotFound) => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

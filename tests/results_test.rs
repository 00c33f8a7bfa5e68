//! Integration tests for tallying and results visibility

mod common;
use serial_test::serial;

use chrono::{Duration, Utc};
use common::{database::*, fixtures::*};
use sea_orm::entity::*;
use votesphere::orm::polls;
use votesphere::vote;

#[actix_rt::test]
#[serial]
async fn test_tally_counts_and_percentages() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    cleanup_test_data(&db).await.expect("Failed to cleanup");

    let creator = create_test_user(&db, "creator", "password123")
        .await
        .expect("Failed to create user");

    let poll_id = create_test_poll(&db, creator.id, "Favorite color?", &["Red", "Blue", "Green"])
        .await
        .expect("Failed to create poll");
    let options = option_ids(&db, poll_id).await.expect("Failed to fetch options");

    // Two for Blue, one for Red, none for Green.
    for (name, option_id) in [
        ("voter1", options[1]),
        ("voter2", options[1]),
        ("voter3", options[0]),
    ] {
        let voter = create_test_user(&db, name, "password123")
            .await
            .expect("Failed to create voter");
        vote::cast_vote(&db, poll_id, voter.id, option_id)
            .await
            .expect("Failed to cast vote");
    }

    let rows = vote::tally(&db, poll_id).await.expect("Tally failed");
    assert_eq!(rows.len(), 3, "Zero-vote options still get a row");

    assert_eq!(rows[0].option_text, "Blue");
    assert_eq!(rows[0].vote_count, 2);
    assert_eq!(rows[0].percentage, 66.7);

    assert_eq!(rows[1].option_text, "Red");
    assert_eq!(rows[1].vote_count, 1);
    assert_eq!(rows[1].percentage, 33.3);

    assert_eq!(rows[2].option_text, "Green");
    assert_eq!(rows[2].vote_count, 0);
    assert_eq!(rows[2].percentage, 0.0);

    // Tallying is read-only; a second run returns the same rows.
    let again = vote::tally(&db, poll_id).await.expect("Tally failed");
    assert_eq!(rows, again);

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_results_hidden_until_vote_or_close() {
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
    let stranger = create_test_user(&db, "stranger", "password123")
        .await
        .expect("Failed to create user");

    let poll_id = create_test_poll(&db, creator.id, "Favorite color?", &["Red", "Blue"])
        .await
        .expect("Failed to create poll");
    let poll = polls::Entity::find_by_id(poll_id)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .expect("Poll not found");

    let options = option_ids(&db, poll_id).await.expect("Failed to fetch options");
    vote::cast_vote(&db, poll_id, voter.id, options[0])
        .await
        .expect("Failed to cast vote");

    // Open poll: creator and voter see results, stranger and guest do not.
    for (viewer, expected) in [
        (Some(creator.id), true),
        (Some(voter.id), true),
        (Some(stranger.id), false),
        (None, false),
    ] {
        let visible = vote::can_view_results(&db, &poll, viewer)
            .await
            .expect("can_view_results failed");
        assert_eq!(visible, expected, "viewer {:?}", viewer);
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

#[actix_rt::test]
#[serial]
async fn test_closed_poll_results_are_public() {
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

    let ended = Utc::now().naive_utc() - Duration::hours(1);
    let poll_id = insert_poll_raw(&db, creator.id, "Old poll", Some(ended), &["Red", "Blue"])
        .await
        .expect("Failed to insert poll");
    let poll = polls::Entity::find_by_id(poll_id)
        .one(&db)
        .await
        .expect("Failed to fetch poll")
        .expect("Poll not found");

    for viewer in [Some(stranger.id), None] {
        assert!(vote::can_view_results(&db, &poll, viewer)
            .await
            .expect("can_view_results failed"));
    }

    cleanup_test_data(&db).await.expect("Failed to cleanup");
}

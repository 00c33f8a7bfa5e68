//! Test fixtures for creating test data
#![allow(dead_code)]

use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection, DbErr};
use votesphere::orm::{poll_options, polls, users};

/// Test user fixture
pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub password: String, // Plain text password for testing
}

/// Create a test user with known credentials
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
) -> Result<TestUser, DbErr> {
    let password_hash = votesphere::session::hash_password(password)
        .map_err(|e| DbErr::Custom(format!("Password hashing failed: {}", e)))?;

    let user = users::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@test.com", username)),
        password: Set(password_hash),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(TestUser {
        id: user.id,
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Create a poll with the given options through the repository, returning
/// the new poll id.
pub async fn create_test_poll(
    db: &DatabaseConnection,
    creator_id: i32,
    title: &str,
    options: &[&str],
) -> Result<i32, DbErr> {
    let form = votesphere::poll::PollForm {
        title: title.to_string(),
        description: None,
        end_time: None,
        options: options.iter().map(|s| s.to_string()).collect(),
    };

    votesphere::poll::create_poll(db, creator_id, &form)
        .await
        .map_err(|e| DbErr::Custom(format!("Poll creation failed: {}", e)))
}

/// Insert a poll row directly, bypassing form validation. Needed for states
/// validation would refuse to create, like an already-closed poll.
pub async fn insert_poll_raw(
    db: &DatabaseConnection,
    creator_id: i32,
    title: &str,
    end_time: Option<NaiveDateTime>,
    options: &[&str],
) -> Result<i32, DbErr> {
    let now = Utc::now().naive_utc();

    let poll = polls::ActiveModel {
        creator_id: Set(creator_id),
        title: Set(title.to_string()),
        description: Set(None),
        end_time: Set(end_time),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for option_text in options {
        poll_options::ActiveModel {
            poll_id: Set(poll.id),
            option_text: Set(option_text.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(poll.id)
}

/// The poll's options in id order.
pub async fn option_ids(db: &DatabaseConnection, poll_id: i32) -> Result<Vec<i32>, DbErr> {
    use sea_orm::{ColumnTrait, QueryFilter, QueryOrder};

    Ok(poll_options::Entity::find()
        .filter(poll_options::Column::PollId.eq(poll_id))
        .order_by_asc(poll_options::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|o| o.id)
        .collect())
}

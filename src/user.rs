//! User lookups and account creation.

use crate::orm::users;
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr};

pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id).one(db).await
}

pub async fn get_by_username(
    db: &DatabaseConnection,
    username: &str,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await
}

pub async fn username_taken(db: &DatabaseConnection, username: &str) -> Result<bool, DbErr> {
    Ok(get_by_username(db, username).await?.is_some())
}

pub async fn email_taken(db: &DatabaseConnection, email: &str) -> Result<bool, DbErr> {
    Ok(users::Entity::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await?
        .is_some())
}

/// Insert a new user row. `password` must already be an Argon2 PHC string.
pub async fn insert_new_user(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<users::Model, DbErr> {
    users::ActiveModel {
        username: Set(username.to_owned()),
        email: Set(email.to_owned()),
        password: Set(password.to_owned()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}

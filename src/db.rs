//! Database connection construction.
//!
//! The pool is built once in `main` and shared through `web::Data`; core
//! operations receive it as an explicit parameter rather than a global.

use sea_orm::{Database, DatabaseConnection, DbErr};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}
